//! Dataset queries

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{
    add_to_amount, decimal_text, parse_decimal, parse_opt_timestamp, parse_timestamp, parse_uuid,
    timestamp_text,
};
use crate::error::{MarketError, MarketResult};
use crate::models::{Dataset, DatasetStatus};

const SELECT_DATASET: &str = r#"
    SELECT id, company_id, external_id, name, labels, instructions, total_items,
           amount_locked, labeling_pool, verification_pool, amount_distributed,
           verification_required, status, created_at, completed_at
    FROM datasets
"#;

fn dataset_from_row(row: &SqliteRow) -> MarketResult<Dataset> {
    let id: String = row.try_get("id")?;
    let company_id: String = row.try_get("company_id")?;
    let labels: String = row.try_get("labels")?;
    let status: String = row.try_get("status")?;
    let amount_locked: String = row.try_get("amount_locked")?;
    let labeling_pool: String = row.try_get("labeling_pool")?;
    let verification_pool: String = row.try_get("verification_pool")?;
    let amount_distributed: String = row.try_get("amount_distributed")?;
    let created_at: String = row.try_get("created_at")?;

    let labels: Vec<String> = serde_json::from_str(&labels)
        .map_err(|e| MarketError::Corrupt(format!("datasets.labels: {}", e)))?;
    let status = DatasetStatus::parse(&status)
        .ok_or_else(|| MarketError::Corrupt(format!("unknown dataset status '{}'", status)))?;

    Ok(Dataset {
        id: parse_uuid(&id, "datasets.id")?,
        company_id: parse_uuid(&company_id, "datasets.company_id")?,
        external_id: row.try_get("external_id")?,
        name: row.try_get("name")?,
        labels,
        instructions: row.try_get("instructions")?,
        total_items: row.try_get("total_items")?,
        amount_locked: parse_decimal(&amount_locked, "datasets.amount_locked")?,
        labeling_pool: parse_decimal(&labeling_pool, "datasets.labeling_pool")?,
        verification_pool: parse_decimal(&verification_pool, "datasets.verification_pool")?,
        amount_distributed: parse_decimal(&amount_distributed, "datasets.amount_distributed")?,
        verification_required: row.try_get("verification_required")?,
        status,
        created_at: parse_timestamp(&created_at)?,
        completed_at: parse_opt_timestamp(row.try_get("completed_at")?)?,
    })
}

pub async fn insert(conn: &mut SqliteConnection, dataset: &Dataset) -> MarketResult<()> {
    let labels = serde_json::to_string(&dataset.labels)
        .map_err(|e| MarketError::InvalidInput(format!("labels: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO datasets (
            id, company_id, external_id, name, labels, instructions, total_items,
            amount_locked, labeling_pool, verification_pool, amount_distributed,
            verification_required, status, created_at, completed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(dataset.id.to_string())
    .bind(dataset.company_id.to_string())
    .bind(&dataset.external_id)
    .bind(&dataset.name)
    .bind(labels)
    .bind(dataset.instructions.as_deref())
    .bind(dataset.total_items)
    .bind(decimal_text(dataset.amount_locked))
    .bind(decimal_text(dataset.labeling_pool))
    .bind(decimal_text(dataset.verification_pool))
    .bind(decimal_text(dataset.amount_distributed))
    .bind(dataset.verification_required)
    .bind(dataset.status.as_str())
    .bind(timestamp_text(dataset.created_at))
    .bind(dataset.completed_at.map(timestamp_text))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn fetch(conn: &mut SqliteConnection, id: Uuid) -> MarketResult<Option<Dataset>> {
    let sql = format!("{} WHERE id = ?", SELECT_DATASET);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(dataset_from_row).transpose()
}

/// Fetch or fail with `NotFound`
pub async fn get(conn: &mut SqliteConnection, id: Uuid) -> MarketResult<Dataset> {
    fetch(conn, id)
        .await?
        .ok_or_else(|| MarketError::not_found("Dataset", id))
}

/// Take the write lock on the dataset's row. Returns false if absent.
pub async fn lock(conn: &mut SqliteConnection, id: Uuid) -> MarketResult<bool> {
    let result = sqlx::query("UPDATE datasets SET revision = revision + 1 WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn set_total_items(conn: &mut SqliteConnection, id: Uuid, total: i64) -> MarketResult<()> {
    sqlx::query("UPDATE datasets SET total_items = ? WHERE id = ?")
        .bind(total)
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn count_items(conn: &mut SqliteConnection, id: Uuid) -> MarketResult<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE dataset_id = ?")
        .bind(id.to_string())
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

/// Flip ACTIVE → COMPLETED when every item is verified.
///
/// Returns true only for the call that performed the flip.
pub async fn complete_if_done(
    conn: &mut SqliteConnection,
    id: Uuid,
    now: DateTime<Utc>,
) -> MarketResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE datasets
        SET status = 'COMPLETED', completed_at = ?
        WHERE id = ?
          AND status = 'ACTIVE'
          AND total_items > 0
          AND (SELECT COUNT(*) FROM items
               WHERE items.dataset_id = datasets.id AND items.status = 'VERIFIED') >= total_items
        "#,
    )
    .bind(timestamp_text(now))
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// ACTIVE → EXPIRED. Returns false if the dataset was not active.
pub async fn expire(conn: &mut SqliteConnection, id: Uuid) -> MarketResult<bool> {
    let result = sqlx::query("UPDATE datasets SET status = 'EXPIRED' WHERE id = ? AND status = 'ACTIVE'")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn add_distributed(
    conn: &mut SqliteConnection,
    id: Uuid,
    amount: Decimal,
) -> MarketResult<Decimal> {
    add_to_amount(conn, "datasets", "amount_distributed", id, amount).await
}

/// Datasets the labeler labeled in, voted in or withdrew from
pub async fn touched_by(conn: &mut SqliteConnection, labeler_id: Uuid) -> MarketResult<Vec<Uuid>> {
    let ids: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT dataset_id FROM items WHERE labeled_by = ?1
        UNION
        SELECT i.dataset_id FROM votes v JOIN items i ON i.id = v.item_id WHERE v.verifier_id = ?1
        UNION
        SELECT dataset_id FROM settlements
        WHERE labeler_id = ?1 AND kind = 'WITHDRAWAL' AND dataset_id IS NOT NULL
        ORDER BY 1
        "#,
    )
    .bind(labeler_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    ids.iter()
        .map(|id| parse_uuid(id, "items.dataset_id"))
        .collect()
}
