//! Item queries
//!
//! `write_state` is the only statement that changes an item's lifecycle
//! columns. It is a compare-and-swap on the current status.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{
    decimal_text, parse_decimal, parse_opt_timestamp, parse_opt_uuid, parse_timestamp, parse_uuid,
    timestamp_text,
};
use crate::error::{MarketError, MarketResult};
use crate::models::{Item, ItemState, ItemStatus};

const ITEM_COLUMNS: &str = r#"
    i.id AS id, i.dataset_id AS dataset_id, i.reward_value AS reward_value,
    i.image_url AS image_url, i.status AS status, i.assigned_label AS assigned_label,
    i.labeled_by AS labeled_by, i.labeled_at AS labeled_at, i.created_at AS created_at
"#;

fn item_from_row(row: &SqliteRow) -> MarketResult<Item> {
    let id: String = row.try_get("id")?;
    let dataset_id: String = row.try_get("dataset_id")?;
    let reward_value: String = row.try_get("reward_value")?;
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;

    let id = parse_uuid(&id, "items.id")?;
    let state = ItemState::from_columns(
        &status,
        row.try_get("assigned_label")?,
        parse_opt_uuid(row.try_get("labeled_by")?, "items.labeled_by")?,
        parse_opt_timestamp(row.try_get("labeled_at")?)?,
    )
    .map_err(|e| MarketError::Corrupt(format!("item {}: {}", id, e)))?;

    Ok(Item {
        id,
        dataset_id: parse_uuid(&dataset_id, "items.dataset_id")?,
        reward_value: parse_decimal(&reward_value, "items.reward_value")?,
        image_url: row.try_get("image_url")?,
        state,
        created_at: parse_timestamp(&created_at)?,
    })
}

pub async fn insert(conn: &mut SqliteConnection, item: &Item) -> MarketResult<()> {
    let labeling = item.state.labeling();
    sqlx::query(
        r#"
        INSERT INTO items (
            id, dataset_id, reward_value, image_url, status, assigned_label,
            labeled_by, labeled_at, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(item.id.to_string())
    .bind(item.dataset_id.to_string())
    .bind(decimal_text(item.reward_value))
    .bind(&item.image_url)
    .bind(item.status().as_str())
    .bind(labeling.map(|l| l.label.clone()))
    .bind(labeling.map(|l| l.labeled_by.to_string()))
    .bind(labeling.map(|l| timestamp_text(l.labeled_at)))
    .bind(timestamp_text(item.created_at))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn fetch(conn: &mut SqliteConnection, id: Uuid) -> MarketResult<Option<Item>> {
    let sql = format!("SELECT {} FROM items i WHERE i.id = ?", ITEM_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(item_from_row).transpose()
}

/// Fetch or fail with `NotFound`
pub async fn get(conn: &mut SqliteConnection, id: Uuid) -> MarketResult<Item> {
    fetch(conn, id)
        .await?
        .ok_or_else(|| MarketError::not_found("Item", id))
}

/// Take the write lock on the item's row. Returns false if absent.
pub async fn lock(conn: &mut SqliteConnection, id: Uuid) -> MarketResult<bool> {
    let result = sqlx::query("UPDATE items SET revision = revision + 1 WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Persist `state` if the item is still in `expected`. Returns false when
/// another writer moved it first.
pub async fn write_state(
    conn: &mut SqliteConnection,
    id: Uuid,
    expected: ItemStatus,
    state: &ItemState,
) -> MarketResult<bool> {
    let labeling = state.labeling();
    let result = sqlx::query(
        r#"
        UPDATE items
        SET status = ?, assigned_label = ?, labeled_by = ?, labeled_at = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(state.status().as_str())
    .bind(labeling.map(|l| l.label.clone()))
    .bind(labeling.map(|l| l.labeled_by.to_string()))
    .bind(labeling.map(|l| timestamp_text(l.labeled_at)))
    .bind(id.to_string())
    .bind(expected.as_str())
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Oldest unlabeled item of an active dataset
pub async fn next_unlabeled(conn: &mut SqliteConnection) -> MarketResult<Option<Item>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM items i JOIN datasets d ON d.id = i.dataset_id
        WHERE i.status = 'UNLABELED' AND i.labeled_by IS NULL AND d.status = 'ACTIVE'
        ORDER BY i.created_at ASC, i.rowid ASC
        LIMIT 1
        "#,
        ITEM_COLUMNS
    );
    let row = sqlx::query(&sql).fetch_optional(&mut *conn).await?;
    row.as_ref().map(item_from_row).transpose()
}

/// Oldest-labeled pending item this verifier may still vote on
pub async fn next_pending_for(
    conn: &mut SqliteConnection,
    verifier_id: Uuid,
    required_votes: u32,
) -> MarketResult<Option<Item>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM items i JOIN datasets d ON d.id = i.dataset_id
        WHERE i.status = 'PENDING_VERIFICATION'
          AND d.status = 'ACTIVE'
          AND i.labeled_by <> ?1
          AND NOT EXISTS (SELECT 1 FROM votes v WHERE v.item_id = i.id AND v.verifier_id = ?1)
          AND (SELECT COUNT(*) FROM votes v WHERE v.item_id = i.id) < ?2
        ORDER BY i.labeled_at ASC, i.rowid ASC
        LIMIT 1
        "#,
        ITEM_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(verifier_id.to_string())
        .bind(i64::from(required_votes))
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(item_from_row).transpose()
}

/// Verified labels credited to a labeler within one dataset
pub async fn count_verified_by(
    conn: &mut SqliteConnection,
    labeler_id: Uuid,
    dataset_id: Uuid,
) -> MarketResult<i64> {
    let count = sqlx::query_scalar(
        "SELECT COUNT(*) FROM items WHERE labeled_by = ? AND dataset_id = ? AND status = 'VERIFIED'",
    )
    .bind(labeler_id.to_string())
    .bind(dataset_id.to_string())
    .fetch_one(&mut *conn)
    .await?;
    Ok(count)
}
