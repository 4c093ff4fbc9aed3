//! Tiers: format legality and per-tier rating ladders
//!
//! A tier bans species (optionally only while holding a given item) and
//! inherits every ban of its parent tier. Each tier keeps its own ladder in a
//! dedicated store table, fronted by a member cache.

pub mod banned;
pub mod cache;
pub mod instance;
pub mod registry;

pub use banned::{BannedSet, TierDefinition};
pub use cache::{MemberCache, DEFAULT_CACHE_CAPACITY};
pub use instance::{Continuation, RatingUpdate, Tier, TierLookup};
pub use registry::{RegistrySettings, TierRegistry};
