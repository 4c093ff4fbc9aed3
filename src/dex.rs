//! Species and item name resolution
//!
//! Tier definitions name species and items in plain text; this module maps
//! those names to the numeric ids used by legality checks and back again.

use crate::types::{ItemId, SpeciesId};
use anyhow::Context;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default)]
struct NameTable {
    /// Display names, index `i` holds id `i + 1`
    names: Vec<String>,
    ids: HashMap<String, u16>,
}

impl NameTable {
    fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::default();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            let key = name.to_lowercase();
            if table.ids.contains_key(&key) {
                continue;
            }
            table.names.push(name.to_string());
            table.ids.insert(key, table.names.len() as u16);
        }
        table
    }

    fn id(&self, name: &str) -> Option<u16> {
        self.ids.get(&name.trim().to_lowercase()).copied()
    }

    fn name(&self, id: u16) -> Option<&str> {
        if id == 0 {
            return None;
        }
        self.names.get(id as usize - 1).map(String::as_str)
    }
}

/// Name/id lookup tables for species and held items
#[derive(Debug, Clone, Default)]
pub struct Dex {
    species: NameTable,
    items: NameTable,
}

impl Dex {
    /// Build a dex from ordered name lists. The first name of each list gets
    /// id 1; id 0 stays reserved for "none".
    pub fn from_names<S, I, T, J>(species: S, items: I) -> Self
    where
        S: IntoIterator<Item = T>,
        I: IntoIterator<Item = J>,
        T: AsRef<str>,
        J: AsRef<str>,
    {
        Self {
            species: NameTable::from_names(species),
            items: NameTable::from_names(items),
        }
    }

    /// Load a dex from one-name-per-line files
    pub fn load(species_file: &Path, items_file: &Path) -> crate::error::Result<Self> {
        let species = fs::read_to_string(species_file)
            .with_context(|| format!("Failed to read species file {}", species_file.display()))?;
        let items = fs::read_to_string(items_file)
            .with_context(|| format!("Failed to read items file {}", items_file.display()))?;

        Ok(Self::from_names(species.lines(), items.lines()))
    }

    pub fn species_id(&self, name: &str) -> Option<SpeciesId> {
        self.species.id(name)
    }

    pub fn item_id(&self, name: &str) -> Option<ItemId> {
        self.items.id(name)
    }

    pub fn species_name(&self, id: SpeciesId) -> Option<&str> {
        self.species.name(id)
    }

    pub fn item_name(&self, id: ItemId) -> Option<&str> {
        self.items.name(id)
    }

    pub fn species_count(&self) -> usize {
        self.species.names.len()
    }

    pub fn item_count(&self) -> usize {
        self.items.names.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dex() -> Dex {
        Dex::from_names(["Bulbasaur", "Mewtwo", "", "mewtwo"], ["Leftovers", "Soul Dew"])
    }

    #[test]
    fn test_ids_start_at_one() {
        let dex = sample_dex();
        assert_eq!(dex.species_id("Bulbasaur"), Some(1));
        assert_eq!(dex.species_id("Mewtwo"), Some(2));
        assert_eq!(dex.item_id("Soul Dew"), Some(2));
        assert_eq!(dex.species_count(), 2);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let dex = sample_dex();
        assert_eq!(dex.species_id("  mEWTWO "), Some(2));
        assert_eq!(dex.item_id("leftovers"), Some(1));
        assert_eq!(dex.species_id("Pikachu"), None);
    }

    #[test]
    fn test_names_by_id() {
        let dex = sample_dex();
        assert_eq!(dex.species_name(2), Some("Mewtwo"));
        assert_eq!(dex.species_name(0), None);
        assert_eq!(dex.item_name(3), None);
    }

    #[test]
    fn test_load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let species = dir.path().join("species.txt");
        let items = dir.path().join("items.txt");
        fs::write(&species, "Bulbasaur\nIvysaur\n").unwrap();
        fs::write(&items, "Leftovers\n").unwrap();

        let dex = Dex::load(&species, &items).unwrap();
        assert_eq!(dex.species_id("ivysaur"), Some(2));
        assert_eq!(dex.item_count(), 1);

        assert!(Dex::load(&dir.path().join("missing.txt"), &items).is_err());
    }
}
