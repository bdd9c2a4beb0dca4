//! Reward ledger
//!
//! Earnings are recomputed from persisted counts on every call. The only
//! stored floor is the withdrawal history in `settlements`.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::config::MarketConfig;
use crate::db;
use crate::error::{MarketError, MarketResult};
use crate::models::{Dataset, Labeler};
use crate::reputation::ReputationTier;
use crate::rewards::{calculate_earnings, pending_amount, EarningsInputs};

/// Claimable amount for one dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingBalance {
    pub dataset_id: Uuid,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct EarningsSummary {
    pub labeler_id: Uuid,
    pub total_earned: Decimal,
    pub tokens_claimed: Decimal,
    pub pending_claim: Decimal,
    pub reputation: i64,
    pub tier: ReputationTier,
    pub multiplier: Decimal,
    pub labels_submitted: i64,
    pub labels_verified_correct: i64,
    pub labels_verified_incorrect: i64,
    pub verifications_done: i64,
}

/// Earnings of `labeler` on `dataset` at the labeler's current multiplier
pub async fn dataset_earnings(
    conn: &mut SqliteConnection,
    config: &MarketConfig,
    labeler: &Labeler,
    dataset: &Dataset,
) -> MarketResult<Decimal> {
    let verified_labels = db::items::count_verified_by(conn, labeler.id, dataset.id).await?;
    let verifications = db::votes::count_by_verifier_in_dataset(conn, labeler.id, dataset.id).await?;

    let inputs = EarningsInputs {
        labeling_pool: dataset.labeling_pool,
        verification_pool: dataset.verification_pool,
        total_items: dataset.total_items,
        verified_labels,
        verifications,
        multiplier: labeler.multiplier(),
    };
    calculate_earnings(&inputs, &config.reward_rates()).ok_or_else(|| {
        MarketError::Corrupt(format!("earnings overflow on dataset {}", dataset.id))
    })
}

/// Total earnings across every dataset the labeler took part in
pub async fn total_earnings(
    conn: &mut SqliteConnection,
    config: &MarketConfig,
    labeler: &Labeler,
) -> MarketResult<Decimal> {
    let mut total = Decimal::ZERO;
    for dataset_id in db::datasets::touched_by(conn, labeler.id).await? {
        let dataset = db::datasets::get(conn, dataset_id).await?;
        let earned = dataset_earnings(conn, config, labeler, &dataset).await?;
        total = total
            .checked_add(earned)
            .ok_or_else(|| MarketError::Corrupt(format!("earnings overflow for labeler {}", labeler.id)))?;
    }
    Ok(total)
}

/// Per-dataset pending balances, strictly positive entries only
pub async fn pending_balances(
    conn: &mut SqliteConnection,
    config: &MarketConfig,
    labeler: &Labeler,
) -> MarketResult<Vec<PendingBalance>> {
    let mut balances = Vec::new();
    for dataset_id in db::datasets::touched_by(conn, labeler.id).await? {
        let dataset = db::datasets::get(conn, dataset_id).await?;
        let earned = dataset_earnings(conn, config, labeler, &dataset).await?;
        let withdrawn = db::settlements::withdrawn_for(conn, labeler.id, dataset_id).await?;
        let amount = pending_amount(earned, withdrawn, config.base_unit_decimals);
        if amount > Decimal::ZERO {
            balances.push(PendingBalance { dataset_id, amount });
        }
    }
    Ok(balances)
}

pub async fn earnings_summary(
    conn: &mut SqliteConnection,
    config: &MarketConfig,
    labeler: &Labeler,
) -> MarketResult<EarningsSummary> {
    let total_earned = total_earnings(conn, config, labeler).await?;
    let pending_claim = pending_balances(conn, config, labeler)
        .await?
        .iter()
        .try_fold(Decimal::ZERO, |sum, b| sum.checked_add(b.amount))
        .ok_or_else(|| MarketError::Corrupt(format!("pending overflow for labeler {}", labeler.id)))?;

    Ok(EarningsSummary {
        labeler_id: labeler.id,
        total_earned,
        tokens_claimed: labeler.tokens_claimed,
        pending_claim,
        reputation: labeler.reputation,
        tier: labeler.tier(),
        multiplier: labeler.multiplier(),
        labels_submitted: labeler.labels_submitted,
        labels_verified_correct: labeler.labels_verified_correct,
        labels_verified_incorrect: labeler.labels_verified_incorrect,
        verifications_done: labeler.verifications_done,
    })
}
