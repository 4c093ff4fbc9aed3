//! Tier Ladder - format legality and Elo ladders for a battle server
//!
//! This crate keeps the tier hierarchy (banned species and items, inherited
//! from parent tiers) and a per-tier rating ladder backed by a member store.
//! Store access runs on a dedicated worker thread so battle handling never
//! waits on storage.

pub mod config;
pub mod dex;
pub mod error;
pub mod rating;
pub mod store;
pub mod tier;
pub mod types;
pub mod utils;
pub mod worker;

// Re-export commonly used types and traits
pub use error::{Result, TierError};
pub use types::*;

// Re-export key components
pub use dex::Dex;
pub use store::MemberStore;
pub use tier::{Tier, TierLookup, TierRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
