//! Shared fixtures for dlm-market integration tests
//!
//! Every test gets its own on-disk database in a temporary directory, seeded
//! through the same ingest operations the service exposes.

#![allow(dead_code)]

use std::sync::Arc;

use dlm_market::config::MarketConfig;
use dlm_market::db;
use dlm_market::ingest::NewDataset;
use dlm_market::models::{Item, Labeler, Settlement};
use dlm_market::signer::{ClaimSigner, EcdsaClaimSigner};
use dlm_market::Market;
use rust_decimal::Decimal;
use tempfile::TempDir;
use uuid::Uuid;

/// Well-known test key; address 0x2c7536e3605d9c16a7a3d7b1898e529396a65c23
pub const TEST_SIGNER_KEY: &str =
    "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

pub struct TestMarket {
    pub market: Market,
    // Dropped last; removes the database
    _temp_dir: TempDir,
}

pub async fn setup() -> TestMarket {
    setup_with(MarketConfig::default(), Arc::new(test_signer())).await
}

pub async fn setup_with(config: MarketConfig, signer: Arc<dyn ClaimSigner>) -> TestMarket {
    let temp_dir = TempDir::new().expect("Should create temp dir");
    let pool = dlm_common::db::init_database(&temp_dir.path().join("dlm.db"))
        .await
        .expect("Should initialize database");
    TestMarket {
        market: Market::new(pool, config, signer),
        _temp_dir: temp_dir,
    }
}

pub fn test_signer() -> EcdsaClaimSigner {
    EcdsaClaimSigner::from_hex(TEST_SIGNER_KEY).expect("Test key should parse")
}

/// A fresh, well-formed wallet address
pub fn wallet() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("0x{}{}", hex, &hex[..8])
}

pub async fn labeler(market: &Market) -> Uuid {
    market
        .register_labeler(&wallet())
        .await
        .expect("Should register labeler")
        .id
}

pub async fn labelers(market: &Market, count: usize) -> Vec<Uuid> {
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        ids.push(labeler(market).await);
    }
    ids
}

/// Dataset with labels ["cat", "dog"] and one item per entry in `item_count`
pub async fn dataset(
    market: &Market,
    company_id: Uuid,
    amount_locked: Decimal,
    item_count: usize,
    verification_required: bool,
) -> (Uuid, Vec<Uuid>) {
    let created = market
        .create_dataset(NewDataset {
            company_id,
            name: "Pets".to_string(),
            labels: vec!["cat".to_string(), "dog".to_string()],
            instructions: Some("Pick the animal in the picture".to_string()),
            amount_locked,
            verification_required,
            external_id: None,
        })
        .await
        .expect("Should create dataset");

    let urls: Vec<String> = (0..item_count)
        .map(|i| format!("https://images.example/pets/{}.jpg", i))
        .collect();
    let items = market
        .add_items(company_id, created.dataset.id, &urls)
        .await
        .expect("Should add items");

    (created.dataset.id, items.into_iter().map(|i| i.id).collect())
}

/// 2 items, pools 7 / 3, verification required
pub async fn pets_dataset(market: &Market) -> (Uuid, Vec<Uuid>) {
    dataset(market, Uuid::new_v4(), Decimal::from(10), 2, true).await
}

pub async fn fetch_labeler(market: &Market, id: Uuid) -> Labeler {
    let mut conn = market.db().acquire().await.unwrap();
    db::labelers::get(&mut conn, id).await.unwrap()
}

pub async fn fetch_item(market: &Market, id: Uuid) -> Item {
    let mut conn = market.db().acquire().await.unwrap();
    db::items::get(&mut conn, id).await.unwrap()
}

pub async fn vote_count(market: &Market, item_id: Uuid) -> usize {
    let mut conn = market.db().acquire().await.unwrap();
    db::votes::for_item(&mut conn, item_id).await.unwrap().len()
}

pub async fn settlements_of(market: &Market, labeler_id: Uuid) -> Vec<Settlement> {
    market.list_settlements(labeler_id).await.unwrap()
}

/// Overwrite a labeler's reputation directly
pub async fn set_reputation(market: &Market, labeler_id: Uuid, reputation: i64) {
    sqlx::query("UPDATE labelers SET reputation = ? WHERE id = ?")
        .bind(reputation)
        .bind(labeler_id.to_string())
        .execute(market.db())
        .await
        .unwrap();
}
