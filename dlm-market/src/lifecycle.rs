//! Item lifecycle operations
//!
//! Labeling work is handed out FIFO without a reservation: two labelers may
//! be offered the same item, and the first `submit_label` to commit wins.
//! Every mutation runs in one transaction whose first statement touches the
//! item row, so the database write lock is held before anything is read.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::db;
use crate::error::{MarketError, MarketResult};
use crate::models::{Item, ItemState, ItemStatus, Labeling, TransitionError};
use crate::utils::begin_monitored;

/// An item offered for labeling
#[derive(Debug, Clone, Serialize)]
pub struct ItemForLabeling {
    pub item_id: Uuid,
    pub dataset_id: Uuid,
    pub dataset_name: String,
    pub image_url: String,
    pub labels: Vec<String>,
    pub instructions: Option<String>,
    pub reward_value: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelReceipt {
    pub item_id: Uuid,
    pub status: ItemStatus,
    pub dataset_completed: bool,
    pub message: String,
}

/// Oldest unlabeled item of any active dataset, or `None` when the pool is empty
pub async fn request_labeling_work(
    pool: &SqlitePool,
    labeler_id: Uuid,
) -> MarketResult<Option<ItemForLabeling>> {
    let mut conn = pool.acquire().await?;
    db::labelers::get(&mut conn, labeler_id).await?;

    let Some(item) = db::items::next_unlabeled(&mut conn).await? else {
        debug!(%labeler_id, "No labeling work available");
        return Ok(None);
    };
    let dataset = db::datasets::get(&mut conn, item.dataset_id).await?;

    Ok(Some(ItemForLabeling {
        item_id: item.id,
        dataset_id: dataset.id,
        dataset_name: dataset.name,
        image_url: item.image_url,
        labels: dataset.labels,
        instructions: dataset.instructions,
        reward_value: item.reward_value,
    }))
}

/// Attach `label` to an unlabeled item.
///
/// Errors, in check order: `NotFound` (item, then labeler), `InvalidState`,
/// `DatasetInactive`, `InvalidLabel`.
pub async fn submit_label(
    pool: &SqlitePool,
    labeler_id: Uuid,
    item_id: Uuid,
    label: &str,
) -> MarketResult<LabelReceipt> {
    let mut tx = begin_monitored(pool, "lifecycle::submit_label").await?;

    if !db::items::lock(&mut tx, item_id).await? {
        return Err(MarketError::not_found("Item", item_id));
    }
    let item = db::items::get(&mut tx, item_id).await?;
    db::labelers::get(&mut tx, labeler_id).await?;
    let dataset = db::datasets::get(&mut tx, item.dataset_id).await?;

    let expected = item.status();
    if expected != ItemStatus::Unlabeled {
        return Err(TransitionError {
            from: expected,
            action: "label",
        }
        .into());
    }
    dataset.ensure_active()?;
    dataset.check_label(label)?;

    let labeling = Labeling {
        label: label.to_string(),
        labeled_by: labeler_id,
        labeled_at: dlm_common::time::now(),
    };
    let next = item.state.submit_label(labeling, dataset.verification_required)?;

    if !db::items::write_state(&mut tx, item_id, expected, &next).await? {
        return Err(MarketError::InvalidState(format!(
            "item {} was labeled concurrently",
            item_id
        )));
    }
    db::labelers::record_label_submitted(&mut tx, labeler_id).await?;

    let mut dataset_completed = false;
    if matches!(next, ItemState::Verified(_)) {
        db::labelers::record_verified_correct(&mut tx, labeler_id, item.reward_value).await?;
        dataset_completed = complete_dataset_if_done(&mut tx, dataset.id).await?;
    }

    tx.commit().await?;

    let status = next.status();
    info!(%item_id, %labeler_id, %status, "Label submitted");

    let message = match status {
        ItemStatus::Verified => "Label accepted".to_string(),
        _ => "Label submitted, awaiting verification".to_string(),
    };
    Ok(LabelReceipt {
        item_id,
        status,
        dataset_completed,
        message,
    })
}

/// Return a rejected item to the work pool, discarding its votes
pub(crate) async fn reset_item(conn: &mut SqliteConnection, item: Item) -> MarketResult<u64> {
    let expected = item.status();
    let next = item.state.reject()?;

    if !db::items::write_state(conn, item.id, expected, &next).await? {
        return Err(MarketError::InvalidState(format!(
            "item {} changed during reset",
            item.id
        )));
    }
    let discarded = db::votes::delete_for_item(conn, item.id).await?;
    debug!(item_id = %item.id, discarded, "Item reset to unlabeled");
    Ok(discarded)
}

/// Mark the dataset COMPLETED if every item is verified. True only for the
/// call that flipped it.
pub(crate) async fn complete_dataset_if_done(
    conn: &mut SqliteConnection,
    dataset_id: Uuid,
) -> MarketResult<bool> {
    let completed = db::datasets::complete_if_done(conn, dataset_id, dlm_common::time::now()).await?;
    if completed {
        info!(%dataset_id, "Dataset completed");
    }
    Ok(completed)
}
