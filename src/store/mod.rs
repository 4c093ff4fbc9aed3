//! Persistent member store interface and implementations
//!
//! This module defines the query backend the worker drives: a set of ladder
//! tables keyed by member name, with in-memory and JSON-file implementations.

pub mod json;
pub mod memory;
pub mod seed;

use crate::config::StoreSettings;
use crate::error::{Result, TierError};
use crate::types::MemberRating;
use std::sync::Arc;
use tracing::info;

// Re-export commonly used types
pub use json::JsonFileMemberStore;
pub use memory::{InMemoryMemberStore, MockMemberStore, StoreCall};
pub use seed::import_seed_file;

/// Trait for ladder table operations.
///
/// Every table has the columns `(id, name unique, rating, matches)` and is
/// indexed on `name` and `rating`.
pub trait MemberStore: Send + Sync {
    /// Create the table if it does not exist. Returns `true` when the table
    /// was created by this call.
    fn ensure_table(&self, table: &str) -> Result<bool>;

    /// Get a member's row
    fn select_member(&self, table: &str, name: &str) -> Result<Option<MemberRating>>;

    /// Insert a new member row; fails if the name is already present
    fn insert_member(&self, table: &str, member: &MemberRating) -> Result<()>;

    /// Update an existing member row; a missing row is left untouched
    fn update_member(&self, table: &str, member: &MemberRating) -> Result<()>;

    /// Insert many rows in one transaction, skipping names already present.
    /// Returns the number of rows inserted.
    fn insert_members(&self, table: &str, members: &[MemberRating]) -> Result<usize>;

    /// Number of rows in the table
    fn count_members(&self, table: &str) -> Result<usize>;

    /// Count rows with a rating above `rating`, or equal to it with a name
    /// sorting at or before `name`
    fn count_ranked_at_or_above(&self, table: &str, rating: i32, name: &str) -> Result<usize>;

    /// Persist buffered changes, if the backend buffers any
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for dyn MemberStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MemberStore")
    }
}

/// Open the store selected by configuration
pub fn open_store(settings: &StoreSettings) -> Result<Arc<dyn MemberStore>> {
    match settings.backend.to_lowercase().as_str() {
        "memory" => {
            info!("Using in-memory member store");
            Ok(Arc::new(InMemoryMemberStore::new()))
        }
        "json" => {
            info!(
                "Using JSON member store in {}",
                settings.data_dir.display()
            );
            Ok(Arc::new(JsonFileMemberStore::open(&settings.data_dir)?))
        }
        other => Err(TierError::StoreUnsupported {
            backend: other.to_string(),
        }
        .into()),
    }
}
