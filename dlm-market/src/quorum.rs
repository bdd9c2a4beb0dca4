//! Verification quorum engine
//!
//! Votes are recorded one at a time. Each vote nudges the labeler's
//! reputation immediately; the item itself is resolved only once exactly
//! `required_votes` votes exist, by majority over those votes.
//!
//! Recording, tallying and resolving happen in a single transaction that
//! starts by touching the item row, so two votes arriving together are
//! serialized and only one of them can be the deciding vote.

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db;
use crate::error::{MarketError, MarketResult};
use crate::lifecycle::{complete_dataset_if_done, reset_item};
use crate::models::{ItemState, ItemStatus, TransitionError, Vote, VoteRecord};
use crate::reputation::ReputationOutcome;

/// Votes needed to resolve an item
pub const REQUIRED_VOTES: u32 = 3;

/// Same-direction votes needed within the quorum
pub const MAJORITY_THRESHOLD: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuorumConfig {
    pub required_votes: u32,
    pub majority_threshold: u32,
}

impl Default for QuorumConfig {
    fn default() -> Self {
        Self {
            required_votes: REQUIRED_VOTES,
            majority_threshold: MAJORITY_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TallyOutcome {
    AwaitingVotes,
    Verified,
    Rejected,
    /// Quorum reached without a majority either way
    Deadlocked,
}

/// Tally the first `required_votes` votes in cast order
pub fn tally(votes: &[Vote], config: &QuorumConfig) -> TallyOutcome {
    let required = config.required_votes as usize;
    if votes.len() < required {
        return TallyOutcome::AwaitingVotes;
    }

    let counted = &votes[..required];
    let yes = counted.iter().filter(|v| **v == Vote::Yes).count() as u32;
    let no = counted.len() as u32 - yes;

    if yes >= config.majority_threshold {
        TallyOutcome::Verified
    } else if no >= config.majority_threshold {
        TallyOutcome::Rejected
    } else {
        TallyOutcome::Deadlocked
    }
}

/// A pending item offered for verification
#[derive(Debug, Clone, Serialize)]
pub struct ItemForVerification {
    pub item_id: Uuid,
    pub dataset_id: Uuid,
    pub dataset_name: String,
    pub image_url: String,
    pub labels: Vec<String>,
    pub instructions: Option<String>,
    pub assigned_label: String,
    pub votes_recorded: usize,
    pub required_votes: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct VoteReceipt {
    pub item_id: Uuid,
    pub outcome: TallyOutcome,
    pub votes_recorded: usize,
    pub required_votes: u32,
    pub dataset_completed: bool,
    pub message: String,
}

/// Next item `verifier_id` may vote on: pending, labeled by someone else, not
/// yet voted on by this verifier, short of quorum, oldest label first
pub async fn request_verification_work(
    pool: &SqlitePool,
    config: &QuorumConfig,
    verifier_id: Uuid,
) -> MarketResult<Option<ItemForVerification>> {
    let mut conn = pool.acquire().await?;
    db::labelers::get(&mut conn, verifier_id).await?;

    let Some(item) = db::items::next_pending_for(&mut conn, verifier_id, config.required_votes).await?
    else {
        debug!(%verifier_id, "No verification work available");
        return Ok(None);
    };
    let dataset = db::datasets::get(&mut conn, item.dataset_id).await?;
    let votes_recorded = db::votes::for_item(&mut conn, item.id).await?.len();

    let assigned_label = match &item.state {
        ItemState::PendingVerification(labeling) => labeling.label.clone(),
        other => {
            return Err(MarketError::Corrupt(format!(
                "item {} offered for verification while {}",
                item.id,
                other.status()
            )))
        }
    };

    Ok(Some(ItemForVerification {
        item_id: item.id,
        dataset_id: dataset.id,
        dataset_name: dataset.name,
        image_url: item.image_url,
        labels: dataset.labels,
        instructions: dataset.instructions,
        assigned_label,
        votes_recorded,
        required_votes: config.required_votes,
    }))
}

/// Record one verifier's vote and resolve the item if quorum is reached.
///
/// Errors, in check order: `NotFound` (item, then verifier), `InvalidState`,
/// `SelfVerification`, `DatasetInactive`, `DuplicateVote`.
pub async fn submit_vote(
    pool: &SqlitePool,
    config: &QuorumConfig,
    verifier_id: Uuid,
    item_id: Uuid,
    vote: Vote,
) -> MarketResult<VoteReceipt> {
    let mut tx = crate::utils::begin_monitored(pool, "quorum::submit_vote").await?;

    if !db::items::lock(&mut tx, item_id).await? {
        return Err(MarketError::not_found("Item", item_id));
    }
    let item = db::items::get(&mut tx, item_id).await?;
    db::labelers::get(&mut tx, verifier_id).await?;
    let dataset = db::datasets::get(&mut tx, item.dataset_id).await?;

    let labeler_id = match &item.state {
        ItemState::PendingVerification(labeling) => labeling.labeled_by,
        other => {
            return Err(TransitionError {
                from: other.status(),
                action: "vote on",
            }
            .into())
        }
    };
    if labeler_id == verifier_id {
        return Err(MarketError::SelfVerification);
    }
    dataset.ensure_active()?;
    if db::votes::exists(&mut tx, item_id, verifier_id).await? {
        return Err(MarketError::DuplicateVote {
            item_id,
            verifier_id,
        });
    }
    let prior = db::votes::for_item(&mut tx, item_id).await?;
    if prior.len() >= config.required_votes as usize {
        return Err(MarketError::InvalidState(format!(
            "item {} already has {} votes",
            item_id,
            prior.len()
        )));
    }

    db::votes::insert(
        &mut tx,
        &VoteRecord {
            id: Uuid::new_v4(),
            item_id,
            verifier_id,
            vote,
            created_at: dlm_common::time::now(),
        },
    )
    .await?;
    db::labelers::record_verification(&mut tx, verifier_id).await?;
    let reputation =
        db::labelers::apply_reputation(&mut tx, labeler_id, ReputationOutcome::from_vote(vote)).await?;

    let votes: Vec<Vote> = db::votes::for_item(&mut tx, item_id)
        .await?
        .into_iter()
        .map(|v| v.vote)
        .collect();
    let votes_recorded = votes.len();
    let outcome = tally(&votes, config);

    let mut dataset_completed = false;
    match outcome {
        TallyOutcome::AwaitingVotes => {}
        TallyOutcome::Verified => {
            let reward = item.reward_value;
            let next = item.state.approve()?;
            if !db::items::write_state(&mut tx, item_id, ItemStatus::PendingVerification, &next).await? {
                return Err(MarketError::InvalidState(format!(
                    "item {} changed during verification",
                    item_id
                )));
            }
            db::labelers::record_verified_correct(&mut tx, labeler_id, reward).await?;
            dataset_completed = complete_dataset_if_done(&mut tx, dataset.id).await?;
        }
        TallyOutcome::Rejected => {
            db::labelers::record_verified_incorrect(&mut tx, labeler_id).await?;
            reset_item(&mut tx, item).await?;
        }
        TallyOutcome::Deadlocked => {
            reset_item(&mut tx, item).await?;
        }
    }

    tx.commit().await?;

    info!(
        %item_id,
        %verifier_id,
        vote = vote.as_str(),
        votes = votes_recorded,
        ?outcome,
        labeler_reputation = reputation,
        "Vote recorded"
    );

    let message = match outcome {
        TallyOutcome::AwaitingVotes => format!(
            "Vote recorded, {} of {} votes in",
            votes_recorded, config.required_votes
        ),
        TallyOutcome::Verified => "Label verified by majority".to_string(),
        TallyOutcome::Rejected => "Label rejected by majority, item returned to the pool".to_string(),
        TallyOutcome::Deadlocked => "No majority reached, item returned to the pool".to_string(),
    };

    Ok(VoteReceipt {
        item_id,
        outcome,
        votes_recorded,
        required_votes: config.required_votes,
        dataset_completed,
        message,
    })
}
