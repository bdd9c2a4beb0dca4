//! Reputation model
//!
//! Pure functions: score deltas per vote outcome and the tier step function
//! that scales payouts. Scores are floored at `MIN_REPUTATION` and unbounded
//! above.

use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::Vote;

/// Reputation floor
pub const MIN_REPUTATION: i64 = -100;

const LABEL_VERIFIED_DELTA: i64 = 10;
const LABEL_REJECTED_DELTA: i64 = -15;

/// What a single vote says about the labeler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReputationOutcome {
    LabelVerified,
    LabelRejected,
}

impl ReputationOutcome {
    pub fn delta(&self) -> i64 {
        match self {
            ReputationOutcome::LabelVerified => LABEL_VERIFIED_DELTA,
            ReputationOutcome::LabelRejected => LABEL_REJECTED_DELTA,
        }
    }

    pub fn from_vote(vote: Vote) -> Self {
        match vote {
            Vote::Yes => ReputationOutcome::LabelVerified,
            Vote::No => ReputationOutcome::LabelRejected,
        }
    }
}

/// New score after an outcome, clamped at the floor
pub fn apply_outcome(current: i64, outcome: ReputationOutcome) -> i64 {
    current.saturating_add(outcome.delta()).max(MIN_REPUTATION)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReputationTier {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
    Master,
}

impl ReputationTier {
    pub fn for_score(score: i64) -> Self {
        match score {
            s if s >= 2500 => ReputationTier::Master,
            s if s >= 1001 => ReputationTier::Expert,
            s if s >= 501 => ReputationTier::Advanced,
            s if s >= 101 => ReputationTier::Intermediate,
            _ => ReputationTier::Beginner,
        }
    }

    /// Payout multiplier for this tier
    pub fn multiplier(&self) -> Decimal {
        match self {
            ReputationTier::Master => Decimal::new(25, 1),
            ReputationTier::Expert => Decimal::new(20, 1),
            ReputationTier::Advanced => Decimal::new(15, 1),
            ReputationTier::Intermediate => Decimal::new(12, 1),
            ReputationTier::Beginner => Decimal::ONE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReputationTier::Master => "MASTER",
            ReputationTier::Expert => "EXPERT",
            ReputationTier::Advanced => "ADVANCED",
            ReputationTier::Intermediate => "INTERMEDIATE",
            ReputationTier::Beginner => "BEGINNER",
        }
    }
}

impl fmt::Display for ReputationTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_deltas() {
        assert_eq!(apply_outcome(0, ReputationOutcome::LabelVerified), 10);
        assert_eq!(apply_outcome(0, ReputationOutcome::LabelRejected), -15);
        assert_eq!(apply_outcome(-90, ReputationOutcome::LabelRejected), -100);
        assert_eq!(apply_outcome(-100, ReputationOutcome::LabelRejected), -100);
        assert_eq!(apply_outcome(-100, ReputationOutcome::LabelVerified), -90);
    }

    #[test]
    fn test_outcome_from_vote() {
        assert_eq!(ReputationOutcome::from_vote(Vote::Yes), ReputationOutcome::LabelVerified);
        assert_eq!(ReputationOutcome::from_vote(Vote::No), ReputationOutcome::LabelRejected);
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(ReputationTier::for_score(-100), ReputationTier::Beginner);
        assert_eq!(ReputationTier::for_score(100), ReputationTier::Beginner);
        assert_eq!(ReputationTier::for_score(101), ReputationTier::Intermediate);
        assert_eq!(ReputationTier::for_score(500), ReputationTier::Intermediate);
        assert_eq!(ReputationTier::for_score(501), ReputationTier::Advanced);
        assert_eq!(ReputationTier::for_score(600), ReputationTier::Advanced);
        assert_eq!(ReputationTier::for_score(1000), ReputationTier::Advanced);
        assert_eq!(ReputationTier::for_score(1001), ReputationTier::Expert);
        assert_eq!(ReputationTier::for_score(2499), ReputationTier::Expert);
        assert_eq!(ReputationTier::for_score(2500), ReputationTier::Master);
        assert_eq!(ReputationTier::for_score(1_000_000), ReputationTier::Master);
    }

    #[test]
    fn test_multipliers() {
        assert_eq!(ReputationTier::Advanced.multiplier(), Decimal::new(15, 1));
        assert_eq!(ReputationTier::Beginner.multiplier(), Decimal::ONE);
        assert_eq!(ReputationTier::Master.multiplier().to_string(), "2.5");
    }

    proptest! {
        /// Property: no sequence of outcomes drops a score below the floor
        #[test]
        fn prop_floor_holds(start in MIN_REPUTATION..5000i64, votes in prop::collection::vec(any::<bool>(), 0..64)) {
            let mut score = start;
            for yes in votes {
                let outcome = if yes { ReputationOutcome::LabelVerified } else { ReputationOutcome::LabelRejected };
                score = apply_outcome(score, outcome);
                prop_assert!(score >= MIN_REPUTATION);
            }
        }

        /// Property: the multiplier never decreases as the score grows
        #[test]
        fn prop_multiplier_monotonic(a in -100i64..5000, b in -100i64..5000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(ReputationTier::for_score(lo).multiplier() <= ReputationTier::for_score(hi).multiplier());
        }
    }
}
