//! Rating system using a variable K-factor Elo update
//!
//! This module provides the rating delta computation applied after each
//! ladder battle.

pub mod calculator;

// Re-export commonly used types
pub use calculator::{
    apply_result, expected_score, k_factor, point_change_estimate, PointChange,
};
