//! Entry points for the ingest pipeline and identity provider
//!
//! Labelers, datasets and items are created here before any lifecycle or
//! quorum operation touches them.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::config::MarketConfig;
use crate::db;
use crate::error::{MarketError, MarketResult};
use crate::models::{
    Dataset, DatasetStatus, Item, ItemState, Labeler, Settlement, SettlementKind,
    SettlementMetadata, SettlementStatus,
};
use crate::rewards::{per_item_reward, split_pool};
use crate::signer::parse_wallet_address;
use crate::utils::begin_monitored;

/// A dataset as requested by a company
#[derive(Debug, Clone)]
pub struct NewDataset {
    pub company_id: Uuid,
    pub name: String,
    pub labels: Vec<String>,
    pub instructions: Option<String>,
    pub amount_locked: Decimal,
    pub verification_required: bool,
    /// Identifier on the external ledger; defaults to the dataset id
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedDataset {
    pub dataset: Dataset,
    /// PENDING until the company confirms the on-chain lock
    pub lock_settlement: Settlement,
}

/// Register a labeler by wallet address (stored lowercase)
pub async fn register_labeler(pool: &SqlitePool, wallet_address: &str) -> MarketResult<Labeler> {
    let wallet_address = wallet_address.trim();
    parse_wallet_address(wallet_address).map_err(|e| MarketError::InvalidInput(e.to_string()))?;

    let labeler = Labeler {
        id: Uuid::new_v4(),
        wallet_address: wallet_address.to_ascii_lowercase(),
        reputation: 0,
        labels_submitted: 0,
        labels_verified_correct: 0,
        labels_verified_incorrect: 0,
        verifications_done: 0,
        tokens_earned: Decimal::ZERO,
        tokens_claimed: Decimal::ZERO,
        created_at: dlm_common::time::now(),
    };

    let mut conn = pool.acquire().await?;
    db::labelers::insert(&mut conn, &labeler).await?;

    info!(labeler_id = %labeler.id, wallet = %labeler.wallet_address, "Labeler registered");
    Ok(labeler)
}

fn normalize_labels(labels: &[String]) -> MarketResult<Vec<String>> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(labels.len());
    for label in labels {
        let label = label.trim();
        if label.is_empty() {
            return Err(MarketError::InvalidInput("labels must not be empty".to_string()));
        }
        if !seen.insert(label.to_string()) {
            return Err(MarketError::InvalidInput(format!("duplicate label '{}'", label)));
        }
        normalized.push(label.to_string());
    }
    if normalized.len() < 2 {
        return Err(MarketError::InvalidInput(
            "at least two labels are required".to_string(),
        ));
    }
    Ok(normalized)
}

/// Create a dataset and record the company's pending fund lock
pub async fn create_dataset(
    pool: &SqlitePool,
    config: &MarketConfig,
    request: NewDataset,
) -> MarketResult<CreatedDataset> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(MarketError::InvalidInput("dataset name is required".to_string()));
    }
    let labels = normalize_labels(&request.labels)?;
    if request.amount_locked <= Decimal::ZERO {
        return Err(MarketError::InvalidInput(
            "locked amount must be positive".to_string(),
        ));
    }

    let (labeling_pool, verification_pool) = split_pool(request.amount_locked, config.labeling_pool_percent)
        .ok_or_else(|| MarketError::InvalidInput("locked amount too large".to_string()))?;
    let id = Uuid::new_v4();
    let now = dlm_common::time::now();
    let external_id = request
        .external_id
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| id.to_string());

    let dataset = Dataset {
        id,
        company_id: request.company_id,
        external_id: external_id.clone(),
        name: name.to_string(),
        labels,
        instructions: request.instructions.filter(|i| !i.trim().is_empty()),
        total_items: 0,
        amount_locked: request.amount_locked,
        labeling_pool,
        verification_pool,
        amount_distributed: Decimal::ZERO,
        verification_required: request.verification_required,
        status: DatasetStatus::Active,
        created_at: now,
        completed_at: None,
    };
    let lock_settlement = Settlement {
        id: Uuid::new_v4(),
        labeler_id: None,
        company_id: Some(request.company_id),
        dataset_id: Some(id),
        kind: SettlementKind::DatasetLock,
        amount: request.amount_locked,
        status: SettlementStatus::Pending,
        external_tx_ref: None,
        metadata: SettlementMetadata {
            external_dataset_id: Some(external_id),
            ..Default::default()
        },
        created_at: now,
        confirmed_at: None,
    };

    let mut tx = begin_monitored(pool, "ingest::create_dataset").await?;
    db::datasets::insert(&mut tx, &dataset).await?;
    db::settlements::insert(&mut tx, &lock_settlement).await?;
    tx.commit().await?;

    info!(
        dataset_id = %id,
        company_id = %request.company_id,
        amount = %request.amount_locked,
        %labeling_pool,
        %verification_pool,
        "Dataset created"
    );
    Ok(CreatedDataset {
        dataset,
        lock_settlement,
    })
}

/// Attach the dataset's items. Allowed once, while the dataset is active.
pub async fn add_items(
    pool: &SqlitePool,
    company_id: Uuid,
    dataset_id: Uuid,
    image_urls: &[String],
) -> MarketResult<Vec<Item>> {
    if image_urls.is_empty() {
        return Err(MarketError::InvalidInput("no items supplied".to_string()));
    }
    if image_urls.iter().any(|u| u.trim().is_empty()) {
        return Err(MarketError::InvalidInput("image URL must not be empty".to_string()));
    }

    let mut tx = begin_monitored(pool, "ingest::add_items").await?;

    if !db::datasets::lock(&mut tx, dataset_id).await? {
        return Err(MarketError::not_found("Dataset", dataset_id));
    }
    let dataset = db::datasets::get(&mut tx, dataset_id).await?;
    if dataset.company_id != company_id {
        return Err(MarketError::Forbidden(
            "dataset belongs to another company".to_string(),
        ));
    }
    if dataset.status != DatasetStatus::Active {
        return Err(MarketError::InvalidState(format!(
            "dataset {} is {}",
            dataset_id, dataset.status
        )));
    }
    if db::datasets::count_items(&mut tx, dataset_id).await? > 0 {
        return Err(MarketError::InvalidState(format!(
            "dataset {} already has items",
            dataset_id
        )));
    }

    let reward_value = per_item_reward(dataset.labeling_pool, image_urls.len())
        .ok_or_else(|| MarketError::InvalidInput("too many items for the labeling pool".to_string()))?;
    let now = dlm_common::time::now();
    let mut items = Vec::with_capacity(image_urls.len());
    for url in image_urls {
        let item = Item {
            id: Uuid::new_v4(),
            dataset_id,
            reward_value,
            image_url: url.trim().to_string(),
            state: ItemState::Unlabeled,
            created_at: now,
        };
        db::items::insert(&mut tx, &item).await?;
        items.push(item);
    }
    db::datasets::set_total_items(&mut tx, dataset_id, items.len() as i64).await?;

    tx.commit().await?;

    info!(%dataset_id, count = items.len(), %reward_value, "Items added");
    Ok(items)
}

/// ACTIVE → EXPIRED. Earned rewards stay claimable.
pub async fn expire_dataset(
    pool: &SqlitePool,
    company_id: Uuid,
    dataset_id: Uuid,
) -> MarketResult<Dataset> {
    let mut tx = begin_monitored(pool, "ingest::expire_dataset").await?;

    if !db::datasets::lock(&mut tx, dataset_id).await? {
        return Err(MarketError::not_found("Dataset", dataset_id));
    }
    let dataset = db::datasets::get(&mut tx, dataset_id).await?;
    if dataset.company_id != company_id {
        return Err(MarketError::Forbidden(
            "dataset belongs to another company".to_string(),
        ));
    }
    if !db::datasets::expire(&mut tx, dataset_id).await? {
        return Err(MarketError::InvalidState(format!(
            "dataset {} is {}",
            dataset_id, dataset.status
        )));
    }
    let expired = db::datasets::get(&mut tx, dataset_id).await?;
    tx.commit().await?;

    info!(%dataset_id, "Dataset expired");
    Ok(expired)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_normalize_labels() {
        assert_eq!(
            normalize_labels(&labels(&[" cat", "dog "])).unwrap(),
            labels(&["cat", "dog"])
        );
        assert!(normalize_labels(&labels(&["cat"])).is_err());
        assert!(normalize_labels(&labels(&["cat", "cat"])).is_err());
        assert!(normalize_labels(&labels(&["cat", "  "])).is_err());
    }
}
