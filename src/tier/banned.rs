//! Banned combinations and the tier definition format
//!
//! A tier is configured with a single line:
//!
//! ```text
//! Name=Parent+Species1@Item1, Species2, Species3@Item3
//! ```
//!
//! The `Parent+` section is optional. A species without `@Item` is banned
//! whatever it holds.

use crate::dex::Dex;
use crate::types::{BannedCombo, PokeSlot, SpeciesId};
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

/// Banned combinations of one tier, indexed by species
#[derive(Debug, Clone, Default)]
pub struct BannedSet {
    /// Bans in definition order
    combos: Vec<BannedCombo>,
    by_species: HashMap<SpeciesId, Vec<BannedCombo>>,
}

impl BannedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, combo: BannedCombo) {
        self.combos.push(combo);
        self.by_species.entry(combo.species).or_default().push(combo);
    }

    /// Whether a ban of this tier alone covers the slot
    pub fn bans(&self, slot: &PokeSlot) -> bool {
        self.by_species
            .get(&slot.species)
            .map(|combos| combos.iter().any(|combo| combo.matches(slot)))
            .unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BannedCombo> {
        self.combos.iter()
    }

    pub fn len(&self) -> usize {
        self.combos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combos.is_empty()
    }

    /// Distinct combinations, ignoring order and repeats
    pub fn distinct(&self) -> BTreeSet<BannedCombo> {
        self.combos.iter().copied().collect()
    }
}

impl FromIterator<BannedCombo> for BannedSet {
    fn from_iter<I: IntoIterator<Item = BannedCombo>>(iter: I) -> Self {
        let mut set = Self::new();
        for combo in iter {
            set.insert(combo);
        }
        set
    }
}

/// Set equality
impl PartialEq for BannedSet {
    fn eq(&self, other: &Self) -> bool {
        self.distinct() == other.distinct()
    }
}

impl Eq for BannedSet {}

/// Name, parent and bans of a tier, as written in configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierDefinition {
    pub name: String,
    pub parent: Option<String>,
    pub banned: BannedSet,
}

impl TierDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            ..Self::default()
        }
    }

    /// Parse a definition line.
    ///
    /// A line without `=` yields an empty definition. Ban tokens naming an
    /// unknown species or item are dropped.
    pub fn parse(line: &str, dex: &Dex) -> Self {
        let Some((name, rest)) = line.split_once('=') else {
            return Self::default();
        };

        let mut sections = rest.split('+');
        let first = sections.next().unwrap_or_default();
        let (parent, bans) = match sections.next() {
            Some(bans) => (Some(first.trim()), bans),
            None => (None, first),
        };

        let banned = bans
            .split(',')
            .filter_map(|token| parse_ban(token, dex))
            .collect();

        Self {
            name: name.trim().to_string(),
            parent: parent.filter(|p| !p.is_empty()).map(str::to_string),
            banned,
        }
    }

    /// Format the definition line; the inverse of [`TierDefinition::parse`]
    pub fn format(&self, dex: &Dex) -> String {
        let mut line = format!("{}=", self.name);

        if let Some(parent) = &self.parent {
            line.push_str(parent);
            line.push('+');
        }

        let bans: Vec<String> = self
            .banned
            .iter()
            .map(|combo| format_ban(combo, dex))
            .collect();
        line.push_str(&bans.join(", "));

        line
    }
}

fn parse_ban(token: &str, dex: &Dex) -> Option<BannedCombo> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    let (species_name, item_name) = match token.split_once('@') {
        Some((species, item)) => (species.trim(), item.trim()),
        None => (token, ""),
    };

    let Some(species) = dex.species_id(species_name) else {
        warn!("Dropping ban '{}': unknown species", token);
        return None;
    };

    let item = match item_name {
        "" | "0" => 0,
        name => match dex.item_id(name) {
            Some(item) => item,
            None => {
                warn!("Dropping ban '{}': unknown item", token);
                return None;
            }
        },
    };

    Some(BannedCombo::new(species, item))
}

fn format_ban(combo: &BannedCombo, dex: &Dex) -> String {
    let species = dex
        .species_name(combo.species)
        .map(str::to_string)
        .unwrap_or_else(|| combo.species.to_string());

    if combo.is_wildcard() {
        return species;
    }

    match dex.item_name(combo.item) {
        Some(item) => format!("{}@{}", species, item),
        None => format!("{}@{}", species, combo.item),
    }
}
