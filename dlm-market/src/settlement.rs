//! Claim/settlement coordinator
//!
//! `initiate_claim` turns every positive pending balance into a signed claim
//! and a PENDING withdrawal in one transaction. Pending balances subtract
//! non-failed withdrawals, so a second claim started before the first is
//! confirmed finds nothing left. The transaction begins by touching the
//! labeler row, which serializes claims per labeler. Signing happens before
//! commit: a signing failure leaves no settlement behind.
//!
//! `confirm_claim` applies an external confirmation exactly once.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::MarketConfig;
use crate::db;
use crate::error::{MarketError, MarketResult};
use crate::ledger;
use crate::models::{Caller, Settlement, SettlementKind, SettlementMetadata, SettlementStatus};
use crate::rewards::to_base_units;
use crate::signer::{parse_wallet_address, ClaimMessage, ClaimSigner};
use crate::utils::begin_monitored;

/// Process-unique, strictly increasing claim nonces.
///
/// Seeded from wall-clock milliseconds so nonces keep increasing across
/// restarts as long as fewer than one claim per millisecond is issued.
#[derive(Debug)]
pub struct NonceSource {
    last: AtomicU64,
}

impl NonceSource {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(last: u64) -> Self {
        Self {
            last: AtomicU64::new(last),
        }
    }

    pub fn next(&self) -> u64 {
        let now_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let mut current = self.last.load(Ordering::SeqCst);
        loop {
            let candidate = current.saturating_add(1).max(now_ms);
            match self
                .last
                .compare_exchange(current, candidate, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return candidate,
                Err(observed) => current = observed,
            }
        }
    }
}

impl Default for NonceSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Signed claim handed to the labeler for submission to the external ledger
#[derive(Debug, Clone, Serialize)]
pub struct ClaimTicket {
    pub settlement_id: Uuid,
    pub dataset_id: Uuid,
    pub external_dataset_id: String,
    pub amount: Decimal,
    /// Decimal string; may exceed the JSON safe-integer range
    pub base_unit_amount: String,
    pub nonce: u64,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmedSettlement {
    pub settlement_id: Uuid,
    pub status: SettlementStatus,
    pub external_tx_ref: String,
    pub confirmed_at: DateTime<Utc>,
}

/// Issue one signed claim per dataset with a positive pending balance
pub async fn initiate_claim(
    pool: &SqlitePool,
    config: &MarketConfig,
    signer: &dyn ClaimSigner,
    nonces: &NonceSource,
    labeler_id: Uuid,
) -> MarketResult<Vec<ClaimTicket>> {
    let mut tx = begin_monitored(pool, "settlement::initiate_claim").await?;

    if !db::labelers::lock(&mut tx, labeler_id).await? {
        return Err(MarketError::not_found("Labeler", labeler_id));
    }
    let labeler = db::labelers::get(&mut tx, labeler_id).await?;

    let balances = ledger::pending_balances(&mut tx, config, &labeler).await?;
    if balances.is_empty() {
        return Err(MarketError::NothingToClaim);
    }
    let wallet = parse_wallet_address(&labeler.wallet_address)?;

    let mut tickets = Vec::with_capacity(balances.len());
    for balance in balances {
        let dataset = db::datasets::get(&mut tx, balance.dataset_id).await?;
        let base_units = to_base_units(balance.amount, config.base_unit_decimals).ok_or_else(|| {
            MarketError::InvalidState(format!(
                "amount {} cannot be expressed in base units",
                balance.amount
            ))
        })?;
        let nonce = nonces.next();

        let signature = signer.sign_claim(&ClaimMessage {
            wallet,
            external_dataset_id: dataset.external_id.clone(),
            base_unit_amount: base_units,
            nonce,
        })?;

        let settlement = Settlement {
            id: Uuid::new_v4(),
            labeler_id: Some(labeler_id),
            company_id: None,
            dataset_id: Some(dataset.id),
            kind: SettlementKind::Withdrawal,
            amount: balance.amount,
            status: SettlementStatus::Pending,
            external_tx_ref: None,
            metadata: SettlementMetadata {
                nonce: Some(nonce),
                base_unit_amount: Some(base_units.to_string()),
                external_dataset_id: Some(dataset.external_id.clone()),
            },
            created_at: dlm_common::time::now(),
            confirmed_at: None,
        };
        db::settlements::insert(&mut tx, &settlement).await?;

        tickets.push(ClaimTicket {
            settlement_id: settlement.id,
            dataset_id: dataset.id,
            external_dataset_id: dataset.external_id,
            amount: balance.amount,
            base_unit_amount: base_units.to_string(),
            nonce,
            signature,
        });
    }

    tx.commit().await?;

    let total: Decimal = tickets.iter().map(|t| t.amount).sum();
    info!(%labeler_id, claims = tickets.len(), %total, "Claims issued");
    Ok(tickets)
}

/// Apply an external confirmation to a pending settlement.
///
/// Errors, in check order: `NotFound`, `NotPending`, `Forbidden`.
pub async fn confirm_claim(
    pool: &SqlitePool,
    caller: Caller,
    settlement_id: Uuid,
    external_tx_ref: &str,
) -> MarketResult<ConfirmedSettlement> {
    let external_tx_ref = external_tx_ref.trim();
    if external_tx_ref.is_empty() {
        return Err(MarketError::InvalidInput(
            "external transaction reference is required".to_string(),
        ));
    }

    let mut tx = begin_monitored(pool, "settlement::confirm_claim").await?;

    if !db::settlements::lock(&mut tx, settlement_id).await? {
        return Err(MarketError::not_found("Settlement", settlement_id));
    }
    let settlement = db::settlements::get(&mut tx, settlement_id).await?;
    let status = settlement.status.complete(settlement_id)?;
    if !settlement.owned_by(&caller) {
        warn!(%settlement_id, ?caller, "Confirmation attempted by non-owner");
        return Err(MarketError::Forbidden(
            "settlement belongs to another account".to_string(),
        ));
    }

    let confirmed_at = dlm_common::time::now();
    if !db::settlements::complete(&mut tx, settlement_id, external_tx_ref, confirmed_at).await? {
        return Err(MarketError::NotPending(settlement_id));
    }

    if settlement.kind == SettlementKind::Withdrawal {
        if let Some(labeler_id) = settlement.labeler_id {
            db::labelers::credit_claimed(&mut tx, labeler_id, settlement.amount).await?;
        }
        if let Some(dataset_id) = settlement.dataset_id {
            db::datasets::add_distributed(&mut tx, dataset_id, settlement.amount).await?;
        }
    }

    tx.commit().await?;

    info!(
        %settlement_id,
        kind = settlement.kind.as_str(),
        amount = %settlement.amount,
        external_tx_ref,
        "Settlement confirmed"
    );

    Ok(ConfirmedSettlement {
        settlement_id,
        status,
        external_tx_ref: external_tx_ref.to_string(),
        confirmed_at,
    })
}

/// Read one settlement; only its owning labeler or company may see it
pub async fn get_settlement(
    pool: &SqlitePool,
    caller: Caller,
    settlement_id: Uuid,
) -> MarketResult<Settlement> {
    let mut conn = pool.acquire().await?;
    let settlement = db::settlements::get(&mut conn, settlement_id).await?;
    if !settlement.owned_by(&caller) {
        return Err(MarketError::Forbidden(
            "settlement belongs to another account".to_string(),
        ));
    }
    Ok(settlement)
}

/// A labeler's settlements, newest first
pub async fn list_settlements(pool: &SqlitePool, labeler_id: Uuid) -> MarketResult<Vec<Settlement>> {
    let mut conn = pool.acquire().await?;
    db::labelers::get(&mut conn, labeler_id).await?;
    db::settlements::list_for_labeler(&mut conn, labeler_id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonces_strictly_increase() {
        let nonces = NonceSource::new();
        let mut last = nonces.next();
        for _ in 0..1000 {
            let next = nonces.next();
            assert!(next > last);
            last = next;
        }
    }

    #[test]
    fn test_nonces_seeded_from_clock() {
        let before = Utc::now().timestamp_millis() as u64;
        assert!(NonceSource::new().next() >= before);
    }

    #[test]
    fn test_nonces_continue_past_seed() {
        let nonces = NonceSource::starting_at(u64::MAX - 2);
        assert_eq!(nonces.next(), u64::MAX - 1);
    }
}
