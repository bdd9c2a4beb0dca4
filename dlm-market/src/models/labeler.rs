//! Labeler aggregate
//!
//! Counters and balances change only through the increment/credit queries in
//! `db::labelers`; this struct is a read snapshot.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::reputation::ReputationTier;

#[derive(Debug, Clone, Serialize)]
pub struct Labeler {
    pub id: Uuid,
    pub wallet_address: String,
    pub reputation: i64,
    pub labels_submitted: i64,
    pub labels_verified_correct: i64,
    pub labels_verified_incorrect: i64,
    pub verifications_done: i64,
    /// Informational running total; settlement math recomputes earnings
    pub tokens_earned: Decimal,
    /// Authoritative sum of confirmed withdrawals
    pub tokens_claimed: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Labeler {
    pub fn tier(&self) -> ReputationTier {
        ReputationTier::for_score(self.reputation)
    }

    pub fn multiplier(&self) -> Decimal {
        self.tier().multiplier()
    }
}
