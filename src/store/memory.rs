//! In-memory ladder tables
//!
//! `LadderTables` holds the table data shared by the in-memory and JSON
//! backends; `MockMemberStore` wraps it and records every call for tests.

use crate::error::{Result, TierError};
use crate::store::MemberStore;
use crate::types::MemberRating;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

/// One persisted row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LadderRow {
    pub id: u64,
    pub rating: i32,
    pub matches: u32,
}

/// One ladder table; rows are keyed (and unique) by lowercased name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LadderTable {
    next_id: u64,
    rows: BTreeMap<String, LadderRow>,
}

impl LadderTable {
    fn insert(&mut self, member: &MemberRating) -> bool {
        if self.rows.contains_key(&member.name) {
            return false;
        }
        self.next_id += 1;
        self.rows.insert(
            member.name.clone(),
            LadderRow {
                id: self.next_id,
                rating: member.rating,
                matches: member.matches,
            },
        );
        true
    }

    fn ranked_at_or_above(&self, rating: i32, name: &str) -> usize {
        self.rows
            .iter()
            .filter(|(row_name, row)| {
                row.rating > rating || (row.rating == rating && row_name.as_str() <= name)
            })
            .count()
    }
}

/// All ladder tables of a store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LadderTables {
    tables: HashMap<String, LadderTable>,
}

impl LadderTables {
    fn table(&self, table: &str) -> Result<&LadderTable> {
        self.tables.get(table).ok_or_else(|| missing_table(table))
    }

    fn table_mut(&mut self, table: &str) -> Result<&mut LadderTable> {
        self.tables.get_mut(table).ok_or_else(|| missing_table(table))
    }

    pub(crate) fn ensure_table(&mut self, table: &str) -> bool {
        if self.tables.contains_key(table) {
            return false;
        }
        self.tables.insert(table.to_string(), LadderTable::default());
        true
    }

    pub(crate) fn select_member(&self, table: &str, name: &str) -> Result<Option<MemberRating>> {
        Ok(self.table(table)?.rows.get(name).map(|row| MemberRating {
            name: name.to_string(),
            rating: row.rating,
            matches: row.matches,
        }))
    }

    pub(crate) fn insert_member(&mut self, table: &str, member: &MemberRating) -> Result<()> {
        if !self.table_mut(table)?.insert(member) {
            return Err(TierError::StoreFailure {
                message: format!("Duplicate name '{}' in {}", member.name, table),
            }
            .into());
        }
        Ok(())
    }

    pub(crate) fn update_member(&mut self, table: &str, member: &MemberRating) -> Result<bool> {
        match self.table_mut(table)?.rows.get_mut(&member.name) {
            Some(row) => {
                row.rating = member.rating;
                row.matches = member.matches;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub(crate) fn insert_members(&mut self, table: &str, members: &[MemberRating]) -> Result<usize> {
        let target = self.table_mut(table)?;
        Ok(members.iter().filter(|member| target.insert(member)).count())
    }

    pub(crate) fn count_members(&self, table: &str) -> Result<usize> {
        Ok(self.table(table)?.rows.len())
    }

    pub(crate) fn count_ranked_at_or_above(
        &self,
        table: &str,
        rating: i32,
        name: &str,
    ) -> Result<usize> {
        Ok(self.table(table)?.ranked_at_or_above(rating, name))
    }
}

fn missing_table(table: &str) -> anyhow::Error {
    TierError::StoreFailure {
        message: format!("No such table: {}", table),
    }
    .into()
}

fn read_lock_error() -> TierError {
    TierError::InternalError {
        message: "Failed to acquire tables read lock".to_string(),
    }
}

fn write_lock_error() -> TierError {
    TierError::InternalError {
        message: "Failed to acquire tables write lock".to_string(),
    }
}

/// In-memory member store, lost on restart
#[derive(Debug, Default)]
pub struct InMemoryMemberStore {
    tables: RwLock<LadderTables>,
}

impl InMemoryMemberStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemberStore for InMemoryMemberStore {
    fn ensure_table(&self, table: &str) -> Result<bool> {
        let mut tables = self.tables.write().map_err(|_| write_lock_error())?;
        Ok(tables.ensure_table(table))
    }

    fn select_member(&self, table: &str, name: &str) -> Result<Option<MemberRating>> {
        let tables = self.tables.read().map_err(|_| read_lock_error())?;
        tables.select_member(table, name)
    }

    fn insert_member(&self, table: &str, member: &MemberRating) -> Result<()> {
        let mut tables = self.tables.write().map_err(|_| write_lock_error())?;
        tables.insert_member(table, member)
    }

    fn update_member(&self, table: &str, member: &MemberRating) -> Result<()> {
        let mut tables = self.tables.write().map_err(|_| write_lock_error())?;
        tables.update_member(table, member)?;
        Ok(())
    }

    fn insert_members(&self, table: &str, members: &[MemberRating]) -> Result<usize> {
        let mut tables = self.tables.write().map_err(|_| write_lock_error())?;
        tables.insert_members(table, members)
    }

    fn count_members(&self, table: &str) -> Result<usize> {
        let tables = self.tables.read().map_err(|_| read_lock_error())?;
        tables.count_members(table)
    }

    fn count_ranked_at_or_above(&self, table: &str, rating: i32, name: &str) -> Result<usize> {
        let tables = self.tables.read().map_err(|_| read_lock_error())?;
        tables.count_ranked_at_or_above(table, rating, name)
    }
}

/// A store call recorded by `MockMemberStore`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    EnsureTable(String),
    Select { table: String, name: String },
    Insert { table: String, member: MemberRating },
    Update { table: String, member: MemberRating },
    InsertMany { table: String, rows: usize },
    Count(String),
    Rank { table: String, rating: i32, name: String },
}

/// Mock member store for testing
#[derive(Debug, Default)]
pub struct MockMemberStore {
    inner: InMemoryMemberStore,
    calls: RwLock<Vec<StoreCall>>,
    fail_writes: RwLock<bool>,
    failing_selects: RwLock<usize>,
}

impl MockMemberStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all calls made (for testing)
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls
            .read()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Number of `select_member` calls made
    pub fn select_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, StoreCall::Select { .. }))
            .count()
    }

    /// Clear recorded calls (for testing)
    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.calls.write() {
            calls.clear();
        }
    }

    /// Make the next `count` calls to `select_member` fail
    pub fn fail_next_selects(&self, count: usize) {
        if let Ok(mut remaining) = self.failing_selects.write() {
            *remaining = count;
        }
    }

    /// Make every insert, batch insert and update fail until reset
    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut flag) = self.fail_writes.write() {
            *flag = fail;
        }
    }

    /// Preset rows for testing, creating the table if needed
    pub fn preset_members(&self, table: &str, members: &[MemberRating]) -> Result<()> {
        self.inner.ensure_table(table)?;
        self.inner.insert_members(table, members)?;
        Ok(())
    }

    fn record(&self, call: StoreCall) {
        if let Ok(mut calls) = self.calls.write() {
            calls.push(call);
        }
    }

    fn check_selectable(&self) -> Result<()> {
        if let Ok(mut remaining) = self.failing_selects.write() {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(TierError::StoreFailure {
                    message: "Injected select failure".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.read().map(|flag| *flag).unwrap_or(false) {
            return Err(TierError::StoreFailure {
                message: "Injected write failure".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl MemberStore for MockMemberStore {
    fn ensure_table(&self, table: &str) -> Result<bool> {
        self.record(StoreCall::EnsureTable(table.to_string()));
        self.inner.ensure_table(table)
    }

    fn select_member(&self, table: &str, name: &str) -> Result<Option<MemberRating>> {
        self.record(StoreCall::Select {
            table: table.to_string(),
            name: name.to_string(),
        });
        self.check_selectable()?;
        self.inner.select_member(table, name)
    }

    fn insert_member(&self, table: &str, member: &MemberRating) -> Result<()> {
        self.record(StoreCall::Insert {
            table: table.to_string(),
            member: member.clone(),
        });
        self.check_writable()?;
        self.inner.insert_member(table, member)
    }

    fn update_member(&self, table: &str, member: &MemberRating) -> Result<()> {
        self.record(StoreCall::Update {
            table: table.to_string(),
            member: member.clone(),
        });
        self.check_writable()?;
        self.inner.update_member(table, member)
    }

    fn insert_members(&self, table: &str, members: &[MemberRating]) -> Result<usize> {
        self.record(StoreCall::InsertMany {
            table: table.to_string(),
            rows: members.len(),
        });
        self.check_writable()?;
        self.inner.insert_members(table, members)
    }

    fn count_members(&self, table: &str) -> Result<usize> {
        self.record(StoreCall::Count(table.to_string()));
        self.inner.count_members(table)
    }

    fn count_ranked_at_or_above(&self, table: &str, rating: i32, name: &str) -> Result<usize> {
        self.record(StoreCall::Rank {
            table: table.to_string(),
            rating,
            name: name.to_string(),
        });
        self.inner.count_ranked_at_or_above(table, rating, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_table_reports_creation_once() {
        let store = InMemoryMemberStore::new();
        assert!(store.ensure_table("tier_ou").unwrap());
        assert!(!store.ensure_table("tier_ou").unwrap());
    }

    #[test]
    fn test_basic_operations() {
        let store = InMemoryMemberStore::new();
        store.ensure_table("tier_ou").unwrap();

        assert!(store.select_member("tier_ou", "ash").unwrap().is_none());

        store
            .insert_member("tier_ou", &MemberRating::with_values("ash", 1100, 1))
            .unwrap();
        let ash = store.select_member("tier_ou", "ash").unwrap().unwrap();
        assert_eq!(ash.rating, 1100);

        store
            .update_member("tier_ou", &MemberRating::with_values("ash", 1150, 2))
            .unwrap();
        let ash = store.select_member("tier_ou", "ash").unwrap().unwrap();
        assert_eq!(ash.rating, 1150);
        assert_eq!(ash.matches, 2);
    }

    #[test]
    fn test_insert_duplicate_name_fails() {
        let store = InMemoryMemberStore::new();
        store.ensure_table("tier_ou").unwrap();
        let ash = MemberRating::new("ash");
        store.insert_member("tier_ou", &ash).unwrap();
        assert!(store.insert_member("tier_ou", &ash).is_err());
    }

    #[test]
    fn test_update_missing_row_is_noop() {
        let store = InMemoryMemberStore::new();
        store.ensure_table("tier_ou").unwrap();
        store
            .update_member("tier_ou", &MemberRating::new("ghost"))
            .unwrap();
        assert_eq!(store.count_members("tier_ou").unwrap(), 0);
    }

    #[test]
    fn test_missing_table_is_an_error() {
        let store = InMemoryMemberStore::new();
        assert!(store.select_member("tier_nope", "ash").is_err());
        assert!(store.count_members("tier_nope").is_err());
    }

    #[test]
    fn test_batch_insert_skips_existing() {
        let store = InMemoryMemberStore::new();
        store.ensure_table("tier_ou").unwrap();
        store.insert_member("tier_ou", &MemberRating::new("ash")).unwrap();

        let inserted = store
            .insert_members(
                "tier_ou",
                &[MemberRating::new("ash"), MemberRating::new("misty"), MemberRating::new("brock")],
            )
            .unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(store.count_members("tier_ou").unwrap(), 3);
    }

    #[test]
    fn test_rank_count_breaks_ties_by_name() {
        let store = InMemoryMemberStore::new();
        store.ensure_table("tier_ou").unwrap();
        store
            .insert_members(
                "tier_ou",
                &[
                    MemberRating::with_values("zed", 1300, 5),
                    MemberRating::with_values("amy", 1200, 5),
                    MemberRating::with_values("bob", 1200, 5),
                    MemberRating::with_values("cat", 1000, 5),
                ],
            )
            .unwrap();

        assert_eq!(store.count_ranked_at_or_above("tier_ou", 1300, "zed").unwrap(), 1);
        assert_eq!(store.count_ranked_at_or_above("tier_ou", 1200, "amy").unwrap(), 2);
        assert_eq!(store.count_ranked_at_or_above("tier_ou", 1200, "bob").unwrap(), 3);
        assert_eq!(store.count_ranked_at_or_above("tier_ou", 1000, "cat").unwrap(), 4);
    }

    #[test]
    fn test_mock_store_records_calls() {
        let store = MockMemberStore::new();
        store.ensure_table("tier_ou").unwrap();
        store.select_member("tier_ou", "ash").unwrap();
        store.insert_member("tier_ou", &MemberRating::new("ash")).unwrap();

        let calls = store.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], StoreCall::EnsureTable("tier_ou".to_string()));
        assert_eq!(store.select_count(), 1);

        store.clear_calls();
        assert!(store.calls().is_empty());
    }

    #[test]
    fn test_mock_store_write_failure() {
        let store = MockMemberStore::new();
        store.ensure_table("tier_ou").unwrap();
        store.set_fail_writes(true);
        assert!(store.insert_member("tier_ou", &MemberRating::new("ash")).is_err());
        store.set_fail_writes(false);
        assert!(store.insert_member("tier_ou", &MemberRating::new("ash")).is_ok());
    }

    #[test]
    fn test_mock_store_select_failure() {
        let store = MockMemberStore::new();
        store.ensure_table("tier_ou").unwrap();
        store.fail_next_selects(1);
        assert!(store.select_member("tier_ou", "ash").is_err());
        assert_eq!(store.select_member("tier_ou", "ash").unwrap(), None);
        assert_eq!(store.select_count(), 2);
    }
}
