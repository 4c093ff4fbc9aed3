//! Variable K-factor rating calculator
//!
//! The K-factor shrinks as a member accumulates recorded matches, so new
//! members settle quickly while established ratings move slowly. Expected
//! score follows the logistic Elo model on a 400-point scale.

use crate::types::MemberRating;
use serde::{Deserialize, Serialize};

/// K-factors for members with 0 to 5 recorded matches
const PROVISIONAL_K_FACTORS: [i32; 6] = [200, 100, 80, 70, 60, 50];

/// K-factor once a member has six or more recorded matches
const ESTABLISHED_K_FACTOR: i32 = 32;

/// Rating deltas for the two possible outcomes of a battle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointChange {
    /// Points gained on a win (non-negative)
    pub win: i32,
    /// Points lost on a loss (non-positive)
    pub loss: i32,
}

/// Maximum rating swing for a member with `matches` recorded matches
pub fn k_factor(matches: u32) -> i32 {
    PROVISIONAL_K_FACTORS
        .get(matches as usize)
        .copied()
        .unwrap_or(ESTABLISHED_K_FACTOR)
}

/// Expected score of `rating` against `opponent_rating`, in `[0, 1]`
pub fn expected_score(rating: i32, opponent_rating: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf(f64::from(opponent_rating - rating) / 400.0))
}

/// Compute the win and loss deltas for a member facing `opponent_rating`
pub fn point_change_estimate(rating: i32, opponent_rating: i32, matches: u32) -> PointChange {
    let expected = expected_score(rating, opponent_rating);
    let k = f64::from(k_factor(matches));

    PointChange {
        win: ((1.0 - expected) * k).round() as i32,
        loss: ((0.0 - expected) * k).round() as i32,
    }
}

/// Apply a battle result, returning the updated winner and loser.
///
/// Both deltas are computed from the pre-battle ratings, so the outcome does
/// not depend on which side is evaluated first.
pub fn apply_result(winner: &MemberRating, loser: &MemberRating) -> (MemberRating, MemberRating) {
    let winner_change = point_change_estimate(winner.rating, loser.rating, winner.matches);
    let loser_change = point_change_estimate(loser.rating, winner.rating, loser.matches);

    let updated_winner = MemberRating {
        name: winner.name.clone(),
        rating: winner.rating + winner_change.win,
        matches: winner.matches + 1,
    };
    let updated_loser = MemberRating {
        name: loser.name.clone(),
        rating: loser.rating + loser_change.loss,
        matches: loser.matches + 1,
    };

    (updated_winner, updated_loser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_k_factor_schedule() {
        let expected = [200, 100, 80, 70, 60, 50, 32];
        for (matches, k) in expected.iter().enumerate() {
            assert_eq!(k_factor(matches as u32), *k);
        }
        assert_eq!(k_factor(7), 32);
        assert_eq!(k_factor(10_000), 32);
    }

    #[test]
    fn test_expected_score_symmetry() {
        assert_eq!(expected_score(1000, 1000), 0.5);
        let a = expected_score(1200, 1000);
        let b = expected_score(1000, 1200);
        assert!((a + b - 1.0).abs() < 1e-12);
        assert!(a > 0.75 && a < 0.77);
    }

    #[test]
    fn test_equal_ratings_first_match() {
        let change = point_change_estimate(1000, 1000, 0);
        assert_eq!(change, PointChange { win: 100, loss: -100 });
    }

    #[test]
    fn test_established_member_uses_k_32() {
        assert_eq!(point_change_estimate(1500, 1500, 6), PointChange { win: 16, loss: -16 });
        assert_eq!(point_change_estimate(1500, 1500, 600), PointChange { win: 16, loss: -16 });
    }

    #[test]
    fn test_loss_delta_never_positive() {
        for opponent in [0, 500, 1000, 1500, 3000] {
            let change = point_change_estimate(1000, opponent, 2);
            assert!(change.win >= 0);
            assert!(change.loss <= 0);
        }
    }

    #[test]
    fn test_apply_result_new_members() {
        let (winner, loser) = apply_result(&MemberRating::new("a"), &MemberRating::new("b"));
        assert_eq!(winner.rating, 1100);
        assert_eq!(loser.rating, 900);
        assert_eq!(winner.matches, 1);
        assert_eq!(loser.matches, 1);
    }

    #[test]
    fn test_apply_result_uses_pre_battle_ratings() {
        let ash = MemberRating::with_values("ash", 1200, 3);
        let misty = MemberRating::with_values("misty", 1000, 0);

        let (winner, loser) = apply_result(&ash, &misty);

        let expected_ash = expected_score(1200, 1000);
        let ash_gain = ((1.0 - expected_ash) * 70.0).round() as i32;
        let misty_loss = ((0.0 - (1.0 - expected_ash)) * 200.0).round() as i32;

        assert_eq!(winner.rating, 1200 + ash_gain);
        assert_eq!(loser.rating, 1000 + misty_loss);
        assert_eq!(winner.rating, 1217);
        assert_eq!(loser.rating, 952);
        assert_eq!(winner.matches, 4);
        assert_eq!(loser.matches, 1);
    }
}
