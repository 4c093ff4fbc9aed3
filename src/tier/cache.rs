//! Per-tier member cache
//!
//! Maps lowercased member names to their standing, or to a confirmed-absent
//! marker so a known miss does not trigger another store lookup. Eviction
//! drops every entry at once.

use crate::types::MemberRating;
use crate::utils::normalize_name;
use std::collections::HashMap;
use tracing::debug;

/// Default number of entries kept before the cache is cleared
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

#[derive(Debug, Clone)]
pub struct MemberCache {
    entries: HashMap<String, Option<MemberRating>>,
    capacity: usize,
}

impl MemberCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Whether the name resolves from memory, present or confirmed absent
    pub fn is_in_memory(&self, name: &str) -> bool {
        self.entries.contains_key(&normalize_name(name))
    }

    /// Whether the name is cached as an existing member
    pub fn exists(&self, name: &str) -> bool {
        matches!(self.entries.get(&normalize_name(name)), Some(Some(_)))
    }

    /// Cached standing of an existing member; `None` if the name is not in
    /// memory or is confirmed absent
    pub fn member(&self, name: &str) -> Option<&MemberRating> {
        self.entries.get(&normalize_name(name)).and_then(Option::as_ref)
    }

    pub fn add_member_in_memory(&mut self, member: MemberRating) {
        let key = normalize_name(&member.name);
        self.make_room(&key);
        self.entries.insert(key, Some(member));
    }

    /// Record that the store has no row for this name
    pub fn add_non_existent(&mut self, name: &str) {
        let key = normalize_name(name);
        self.make_room(&key);
        self.entries.insert(key, None);
    }

    /// Evict every entry
    pub fn clean_cache(&mut self) {
        if !self.entries.is_empty() {
            debug!("Evicting {} cached members", self.entries.len());
        }
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn make_room(&mut self, key: &str) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(key) {
            self.clean_cache();
        }
    }
}

impl Default for MemberCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_and_absent_entries() {
        let mut cache = MemberCache::default();
        assert!(!cache.is_in_memory("ash"));

        cache.add_member_in_memory(MemberRating::with_values("Ash", 1200, 3));
        cache.add_non_existent("Gary");

        assert!(cache.is_in_memory("ASH"));
        assert!(cache.exists("ash"));
        assert_eq!(cache.member("ash").unwrap().rating, 1200);

        assert!(cache.is_in_memory("gary"));
        assert!(!cache.exists("gary"));
        assert!(cache.member("gary").is_none());
    }

    #[test]
    fn test_member_replaces_absent_marker() {
        let mut cache = MemberCache::default();
        cache.add_non_existent("ash");
        cache.add_member_in_memory(MemberRating::new("ash"));
        assert!(cache.exists("ash"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clean_cache_evicts_everything() {
        let mut cache = MemberCache::default();
        cache.add_member_in_memory(MemberRating::new("ash"));
        cache.add_non_existent("gary");
        cache.clean_cache();

        assert!(cache.is_empty());
        assert!(!cache.is_in_memory("ash"));
        assert!(!cache.is_in_memory("gary"));
    }

    #[test]
    fn test_full_cache_is_invalidated_on_insert() {
        let mut cache = MemberCache::new(2);
        cache.add_member_in_memory(MemberRating::new("a"));
        cache.add_member_in_memory(MemberRating::new("b"));

        // Overwriting an existing key does not evict
        cache.add_member_in_memory(MemberRating::with_values("b", 1010, 1));
        assert_eq!(cache.len(), 2);

        cache.add_member_in_memory(MemberRating::new("c"));
        assert_eq!(cache.len(), 1);
        assert!(cache.is_in_memory("c"));
        assert!(!cache.is_in_memory("a"));
    }
}
