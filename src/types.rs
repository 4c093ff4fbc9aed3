//! Common types used throughout the tier ladder

use crate::utils::normalize_name;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric species identifier; 0 marks an empty team slot
pub type SpeciesId = u16;

/// Numeric held-item identifier; 0 means no item (or any item, in a ban)
pub type ItemId = u16;

/// Identifier a registry assigns to each tier
pub type TierId = u32;

/// Rating given to a member that has never been recorded
pub const DEFAULT_RATING: i32 = 1000;

/// Number of slots in a battle team
pub const TEAM_SIZE: usize = 6;

/// Ladder standing of one member within one tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRating {
    /// Lowercased member name
    pub name: String,
    pub rating: i32,
    pub matches: u32,
}

impl MemberRating {
    /// Create the default standing for a member that was never seen
    pub fn new(name: &str) -> Self {
        Self {
            name: normalize_name(name),
            rating: DEFAULT_RATING,
            matches: 0,
        }
    }

    /// Create a standing with explicit values
    pub fn with_values(name: &str, rating: i32, matches: u32) -> Self {
        Self {
            name: normalize_name(name),
            rating,
            matches,
        }
    }

    /// Parse one line of the legacy `name%matches%rating` ladder dump.
    ///
    /// Returns `None` for lines that do not carry exactly three fields or
    /// whose numeric fields do not parse.
    pub fn parse_legacy(line: &str) -> Option<Self> {
        let line = line.trim().to_lowercase();
        let fields: Vec<&str> = line.split('%').collect();
        if fields.len() != 3 || fields[0].is_empty() {
            return None;
        }

        let matches = fields[1].trim().parse().ok()?;
        let rating = fields[2].trim().parse().ok()?;
        Some(Self::with_values(fields[0], rating, matches))
    }
}

/// Legacy dump format, numbers zero-padded to five digits
impl fmt::Display for MemberRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%{:05}%{:05}", self.name, self.matches, self.rating)
    }
}

/// A species, optionally paired with a held item, disallowed in a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BannedCombo {
    pub species: SpeciesId,
    /// 0 bans the species whatever it holds
    pub item: ItemId,
}

impl BannedCombo {
    pub fn new(species: SpeciesId, item: ItemId) -> Self {
        Self { species, item }
    }

    /// Ban a species regardless of its held item
    pub fn species(species: SpeciesId) -> Self {
        Self { species, item: 0 }
    }

    pub fn is_wildcard(&self) -> bool {
        self.item == 0
    }

    /// Check whether this ban covers the given team slot
    pub fn matches(&self, slot: &PokeSlot) -> bool {
        self.species == slot.species && (self.item == 0 || self.item == slot.item)
    }
}

/// One team member as seen by legality checks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PokeSlot {
    pub species: SpeciesId,
    pub item: ItemId,
}

impl PokeSlot {
    pub fn new(species: SpeciesId, item: ItemId) -> Self {
        Self { species, item }
    }

    pub fn is_empty(&self) -> bool {
        self.species == 0
    }
}

/// A battle team of up to six members; unused slots stay empty
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub slots: [PokeSlot; TEAM_SIZE],
}

impl Team {
    /// Build a team from the first six given members
    pub fn from_slots<I: IntoIterator<Item = PokeSlot>>(slots: I) -> Self {
        let mut team = Self::default();
        for (index, slot) in slots.into_iter().take(TEAM_SIZE).enumerate() {
            team.slots[index] = slot;
        }
        team
    }

    /// Iterate over the occupied slots
    pub fn members(&self) -> impl Iterator<Item = &PokeSlot> {
        self.slots.iter().filter(|slot| !slot.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_defaults() {
        let member = MemberRating::new("Ash");
        assert_eq!(member.name, "ash");
        assert_eq!(member.rating, DEFAULT_RATING);
        assert_eq!(member.matches, 0);
    }

    #[test]
    fn test_legacy_display() {
        let member = MemberRating::with_values("Ash", 1200, 3);
        assert_eq!(member.to_string(), "ash%00003%01200");
    }

    #[test]
    fn test_parse_legacy() {
        let member = MemberRating::parse_legacy("Brock%00012%01034").unwrap();
        assert_eq!(member.name, "brock");
        assert_eq!(member.matches, 12);
        assert_eq!(member.rating, 1034);

        assert!(MemberRating::parse_legacy("brock%12").is_none());
        assert!(MemberRating::parse_legacy("brock%12%1000%7").is_none());
        assert!(MemberRating::parse_legacy("").is_none());
        assert!(MemberRating::parse_legacy("brock%x%1000").is_none());
    }

    #[test]
    fn test_banned_combo_matching() {
        let wildcard = BannedCombo::species(150);
        assert!(wildcard.matches(&PokeSlot::new(150, 0)));
        assert!(wildcard.matches(&PokeSlot::new(150, 42)));
        assert!(!wildcard.matches(&PokeSlot::new(151, 0)));

        let specific = BannedCombo::new(65, 7);
        assert!(specific.matches(&PokeSlot::new(65, 7)));
        assert!(!specific.matches(&PokeSlot::new(65, 8)));
        assert!(!specific.matches(&PokeSlot::new(65, 0)));
    }

    #[test]
    fn test_team_members_skip_empty_slots() {
        let team = Team::from_slots(vec![PokeSlot::new(1, 0), PokeSlot::default(), PokeSlot::new(4, 2)]);
        assert_eq!(team.members().count(), 2);
        assert_eq!(team.slots[3], PokeSlot::default());
    }
}
