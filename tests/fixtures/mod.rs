//! Test fixtures shared by the integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use tier_ladder::config::AppConfig;
use tier_ladder::store::{InMemoryMemberStore, MemberStore, MockMemberStore};
use tier_ladder::tier::{RegistrySettings, TierRegistry};
use tier_ladder::{Dex, PokeSlot, Team};

pub const SPECIES: &[&str] = &[
    "Mewtwo",
    "Mew",
    "Alakazam",
    "Wobbuffet",
    "Pikachu",
    "Garchomp",
    "Snorlax",
];

pub const ITEMS: &[&str] = &["Leftovers", "Choice Specs", "Soul Dew", "Life Orb"];

/// Small dex covering every name used by the fixtures
pub fn test_dex() -> Arc<Dex> {
    Arc::new(Dex::from_names(SPECIES, ITEMS))
}

/// A three-level hierarchy: Uber <- OU <- UU
pub fn standard_tiers() -> Vec<String> {
    vec![
        "Uber=".to_string(),
        "OU=Uber+Mewtwo, Mew, Garchomp@Life Orb".to_string(),
        "UU=OU+Alakazam@Choice Specs, Snorlax".to_string(),
    ]
}

fn build_registry(store: Arc<dyn MemberStore>, lines: &[String], seed_dir: &Path) -> TierRegistry {
    let settings = RegistrySettings {
        seed_dir: seed_dir.to_path_buf(),
        cache_capacity: 100,
    };
    let mut registry = TierRegistry::new(store, test_dex(), settings).unwrap();
    registry.reload(lines).unwrap();
    registry
}

/// Registry over a fresh in-memory store
pub fn memory_registry(lines: &[String]) -> TierRegistry {
    let seed_dir = tempfile::tempdir().unwrap();
    build_registry(Arc::new(InMemoryMemberStore::new()), lines, seed_dir.path())
}

/// Registry over a call-recording store, returned alongside the store
pub fn mock_registry(lines: &[String]) -> (TierRegistry, Arc<MockMemberStore>) {
    let store = Arc::new(MockMemberStore::new());
    let seed_dir = tempfile::tempdir().unwrap();
    let registry = build_registry(store.clone(), lines, seed_dir.path());
    (registry, store)
}

/// Registry over a call-recording store that imports legacy ladders from
/// `seed_dir`
pub fn seeded_registry(lines: &[String], seed_dir: &Path) -> (TierRegistry, Arc<MockMemberStore>) {
    let store = Arc::new(MockMemberStore::new());
    let registry = build_registry(store.clone(), lines, seed_dir);
    (registry, store)
}

/// Configuration for a JSON-backed registry rooted in `dir`
pub fn json_config(dir: &Path, lines: &[String]) -> AppConfig {
    let mut config = AppConfig::default();
    config.store.backend = "json".to_string();
    config.store.data_dir = dir.join("data");
    config.store.seed_dir = dir.to_path_buf();
    config.tiers.definitions = lines.to_vec();
    config
}

/// Parse `Species` or `Species@Item` against the test dex
pub fn slot(member: &str) -> PokeSlot {
    let dex = test_dex();
    let (species, item) = match member.split_once('@') {
        Some((species, item)) => (species, dex.item_id(item).unwrap()),
        None => (member, 0),
    };
    PokeSlot::new(dex.species_id(species).unwrap(), item)
}

pub fn team(members: &[&str]) -> Team {
    Team::from_slots(members.iter().map(|member| slot(member)))
}
