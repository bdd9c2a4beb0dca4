//! Service facade
//!
//! Bundles the pool, validated configuration, claim signer and nonce source
//! so handlers call one object. Mutating operations are re-run from the start
//! when SQLite reports a lock conflict.

use std::sync::Arc;

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::config::MarketConfig;
use crate::db;
use crate::error::MarketResult;
use crate::ingest::{self, CreatedDataset, NewDataset};
use crate::ledger::{self, EarningsSummary, PendingBalance};
use crate::lifecycle::{self, ItemForLabeling, LabelReceipt};
use crate::models::{Caller, Dataset, Item, Labeler, Settlement, Vote};
use crate::quorum::{self, ItemForVerification, VoteReceipt};
use crate::settlement::{self, ClaimTicket, ConfirmedSettlement, NonceSource};
use crate::signer::ClaimSigner;
use crate::utils::retry_on_busy;

#[derive(Clone)]
pub struct Market {
    db: SqlitePool,
    config: Arc<MarketConfig>,
    signer: Arc<dyn ClaimSigner>,
    nonces: Arc<NonceSource>,
}

impl Market {
    pub fn new(db: SqlitePool, config: MarketConfig, signer: Arc<dyn ClaimSigner>) -> Self {
        Self {
            db,
            config: Arc::new(config),
            signer,
            nonces: Arc::new(NonceSource::new()),
        }
    }

    pub fn db(&self) -> &SqlitePool {
        &self.db
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    fn max_wait(&self) -> u64 {
        self.config.max_lock_wait_ms
    }

    pub async fn request_labeling_work(
        &self,
        labeler_id: Uuid,
    ) -> MarketResult<Option<ItemForLabeling>> {
        lifecycle::request_labeling_work(&self.db, labeler_id).await
    }

    pub async fn submit_label(
        &self,
        labeler_id: Uuid,
        item_id: Uuid,
        label: &str,
    ) -> MarketResult<LabelReceipt> {
        let db = &self.db;
        retry_on_busy("submit_label", self.max_wait(), || {
            lifecycle::submit_label(db, labeler_id, item_id, label)
        })
        .await
    }

    pub async fn request_verification_work(
        &self,
        verifier_id: Uuid,
    ) -> MarketResult<Option<ItemForVerification>> {
        quorum::request_verification_work(&self.db, &self.config.quorum, verifier_id).await
    }

    pub async fn submit_vote(
        &self,
        verifier_id: Uuid,
        item_id: Uuid,
        vote: Vote,
    ) -> MarketResult<VoteReceipt> {
        let db = &self.db;
        let quorum = &self.config.quorum;
        retry_on_busy("submit_vote", self.max_wait(), || {
            quorum::submit_vote(db, quorum, verifier_id, item_id, vote)
        })
        .await
    }

    pub async fn pending_balance(&self, labeler_id: Uuid) -> MarketResult<Vec<PendingBalance>> {
        let mut conn = self.db.acquire().await?;
        let labeler = db::labelers::get(&mut conn, labeler_id).await?;
        ledger::pending_balances(&mut conn, &self.config, &labeler).await
    }

    pub async fn earnings_summary(&self, labeler_id: Uuid) -> MarketResult<EarningsSummary> {
        let mut conn = self.db.acquire().await?;
        let labeler = db::labelers::get(&mut conn, labeler_id).await?;
        ledger::earnings_summary(&mut conn, &self.config, &labeler).await
    }

    pub async fn initiate_claim(&self, labeler_id: Uuid) -> MarketResult<Vec<ClaimTicket>> {
        let db = &self.db;
        let config = self.config.as_ref();
        let signer = self.signer.as_ref();
        let nonces = self.nonces.as_ref();
        retry_on_busy("initiate_claim", self.max_wait(), || {
            settlement::initiate_claim(db, config, signer, nonces, labeler_id)
        })
        .await
    }

    pub async fn confirm_claim(
        &self,
        caller: Caller,
        settlement_id: Uuid,
        external_tx_ref: &str,
    ) -> MarketResult<ConfirmedSettlement> {
        let db = &self.db;
        retry_on_busy("confirm_claim", self.max_wait(), || {
            settlement::confirm_claim(db, caller, settlement_id, external_tx_ref)
        })
        .await
    }

    pub async fn get_settlement(&self, caller: Caller, settlement_id: Uuid) -> MarketResult<Settlement> {
        settlement::get_settlement(&self.db, caller, settlement_id).await
    }

    pub async fn list_settlements(&self, labeler_id: Uuid) -> MarketResult<Vec<Settlement>> {
        settlement::list_settlements(&self.db, labeler_id).await
    }

    pub async fn register_labeler(&self, wallet_address: &str) -> MarketResult<Labeler> {
        let db = &self.db;
        retry_on_busy("register_labeler", self.max_wait(), || {
            ingest::register_labeler(db, wallet_address)
        })
        .await
    }

    pub async fn create_dataset(&self, request: NewDataset) -> MarketResult<CreatedDataset> {
        let db = &self.db;
        let config = self.config.as_ref();
        retry_on_busy("create_dataset", self.max_wait(), || {
            ingest::create_dataset(db, config, request.clone())
        })
        .await
    }

    pub async fn add_items(
        &self,
        company_id: Uuid,
        dataset_id: Uuid,
        image_urls: &[String],
    ) -> MarketResult<Vec<Item>> {
        let db = &self.db;
        retry_on_busy("add_items", self.max_wait(), || {
            ingest::add_items(db, company_id, dataset_id, image_urls)
        })
        .await
    }

    pub async fn expire_dataset(&self, company_id: Uuid, dataset_id: Uuid) -> MarketResult<Dataset> {
        let db = &self.db;
        retry_on_busy("expire_dataset", self.max_wait(), || {
            ingest::expire_dataset(db, company_id, dataset_id)
        })
        .await
    }
}
