//! JSON file member store with atomic writes.

use crate::error::{Result, TierError};
use crate::store::memory::LadderTables;
use crate::store::MemberStore;
use crate::types::MemberRating;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

const SNAPSHOT_FILE: &str = "ladder.json";

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    saved_at: DateTime<Utc>,
    tables: LadderTables,
}

/// JSON file store. Loaded to memory on open, rewritten after every change.
#[derive(Debug)]
pub struct JsonFileMemberStore {
    path: PathBuf,
    tables: RwLock<LadderTables>,
}

impl JsonFileMemberStore {
    /// Open the store in `data_dir`, creating the directory if needed
    pub fn open(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;

        let path = data_dir.join(SNAPSHOT_FILE);
        let tables = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            LadderTables::default()
        };

        Ok(Self {
            path,
            tables: RwLock::new(tables),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_file(path: &Path) -> Result<LadderTables> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(snapshot.tables)
    }

    fn save_to_file(&self, tables: &LadderTables) -> Result<()> {
        let snapshot = Snapshot {
            saved_at: Utc::now(),
            tables: tables.clone(),
        };

        // Write to temp file first, then rename (atomic)
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let file = File::create(&tmp_path).map_err(store_failure)?;
            serde_json::to_writer(BufWriter::new(file), &snapshot).map_err(store_failure)?;
        }
        fs::rename(&tmp_path, &self.path).map_err(store_failure)?;

        debug!("Saved ladder snapshot to {}", self.path.display());
        Ok(())
    }

    fn write<T>(&self, apply: impl FnOnce(&mut LadderTables) -> Result<T>) -> Result<T> {
        let mut tables = self.tables.write().map_err(|_| TierError::InternalError {
            message: "Failed to acquire tables write lock".to_string(),
        })?;
        let result = apply(&mut tables)?;
        self.save_to_file(&tables)?;
        Ok(result)
    }

    fn read<T>(&self, query: impl FnOnce(&LadderTables) -> Result<T>) -> Result<T> {
        let tables = self.tables.read().map_err(|_| TierError::InternalError {
            message: "Failed to acquire tables read lock".to_string(),
        })?;
        query(&tables)
    }
}

fn store_failure(e: impl std::fmt::Display) -> TierError {
    TierError::StoreFailure {
        message: e.to_string(),
    }
}

impl MemberStore for JsonFileMemberStore {
    fn ensure_table(&self, table: &str) -> Result<bool> {
        self.write(|tables| Ok(tables.ensure_table(table)))
    }

    fn select_member(&self, table: &str, name: &str) -> Result<Option<MemberRating>> {
        self.read(|tables| tables.select_member(table, name))
    }

    fn insert_member(&self, table: &str, member: &MemberRating) -> Result<()> {
        self.write(|tables| tables.insert_member(table, member))
    }

    fn update_member(&self, table: &str, member: &MemberRating) -> Result<()> {
        self.write(|tables| tables.update_member(table, member).map(|_| ()))
    }

    fn insert_members(&self, table: &str, members: &[MemberRating]) -> Result<usize> {
        self.write(|tables| tables.insert_members(table, members))
    }

    fn count_members(&self, table: &str) -> Result<usize> {
        self.read(|tables| tables.count_members(table))
    }

    fn count_ranked_at_or_above(&self, table: &str, rating: i32, name: &str) -> Result<usize> {
        self.read(|tables| tables.count_ranked_at_or_above(table, rating, name))
    }
}
