//! Legacy ladder import
//!
//! Before ladders lived in the store, each tier was dumped to a flat file
//! named `tier_<Name>.txt` with one `name%matches%rating` member per line.
//! The file is imported once, when a tier's table is first created.

use crate::error::Result;
use crate::store::MemberStore;
use crate::types::MemberRating;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Path of the legacy dump for a tier
pub fn seed_file_path(seed_dir: &Path, tier_name: &str) -> PathBuf {
    seed_dir.join(format!("tier_{}.txt", tier_name))
}

/// Parse a legacy dump, skipping lines that are not `name%matches%rating`
pub fn parse_seed(contents: &str) -> Vec<MemberRating> {
    contents
        .lines()
        .filter_map(MemberRating::parse_legacy)
        .collect()
}

/// Import the legacy dump for `tier_name` into `table`.
///
/// A missing file imports nothing. Returns the number of rows inserted.
pub fn import_seed_file(
    store: &dyn MemberStore,
    table: &str,
    seed_dir: &Path,
    tier_name: &str,
) -> Result<usize> {
    let path = seed_file_path(seed_dir, tier_name);
    let contents = match fs::read(&path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            debug!("No legacy ladder at {}: {}", path.display(), e);
            return Ok(0);
        }
    };

    info!(
        "Importing old database for tier {} to table {}",
        tier_name, table
    );
    let started = Instant::now();

    let members = parse_seed(&contents);
    let inserted = store.insert_members(table, &members)?;

    info!(
        "Imported {} members into {} in {:.3} secs",
        inserted,
        table,
        started.elapsed().as_secs_f64()
    );
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryMemberStore;

    #[test]
    fn test_parse_seed_skips_malformed_lines() {
        let members = parse_seed("Ash%00003%01200\nbroken line\nmisty%0%1000%x\n\nBrock%10%990\n");
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].name, "ash");
        assert_eq!(members[1].rating, 990);
    }

    #[test]
    fn test_import_seed_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            seed_file_path(dir.path(), "OU"),
            "ash%3%1200\nmisty%0%1000\njunk\n",
        )
        .unwrap();

        let store = InMemoryMemberStore::new();
        store.ensure_table("tier_ou").unwrap();
        let inserted = import_seed_file(&store, "tier_ou", dir.path(), "OU").unwrap();

        assert_eq!(inserted, 2);
        let ash = store.select_member("tier_ou", "ash").unwrap().unwrap();
        assert_eq!(ash.rating, 1200);
        assert_eq!(ash.matches, 3);
    }

    #[test]
    fn test_missing_seed_file_imports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryMemberStore::new();
        store.ensure_table("tier_ou").unwrap();
        assert_eq!(import_seed_file(&store, "tier_ou", dir.path(), "OU").unwrap(), 0);
    }
}
