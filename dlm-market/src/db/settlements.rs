//! Settlement queries

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{
    decimal_text, parse_decimal, parse_opt_timestamp, parse_opt_uuid, parse_timestamp, parse_uuid,
    timestamp_text,
};
use crate::error::{MarketError, MarketResult};
use crate::models::{Settlement, SettlementKind, SettlementMetadata, SettlementStatus};

const SELECT_SETTLEMENT: &str = r#"
    SELECT id, labeler_id, company_id, dataset_id, kind, amount, status,
           external_tx_ref, metadata, created_at, confirmed_at
    FROM settlements
"#;

fn settlement_from_row(row: &SqliteRow) -> MarketResult<Settlement> {
    let id: String = row.try_get("id")?;
    let kind: String = row.try_get("kind")?;
    let status: String = row.try_get("status")?;
    let amount: String = row.try_get("amount")?;
    let metadata: String = row.try_get("metadata")?;
    let created_at: String = row.try_get("created_at")?;

    let id = parse_uuid(&id, "settlements.id")?;
    let metadata: SettlementMetadata = serde_json::from_str(&metadata)
        .map_err(|e| MarketError::Corrupt(format!("settlement {} metadata: {}", id, e)))?;

    Ok(Settlement {
        id,
        labeler_id: parse_opt_uuid(row.try_get("labeler_id")?, "settlements.labeler_id")?,
        company_id: parse_opt_uuid(row.try_get("company_id")?, "settlements.company_id")?,
        dataset_id: parse_opt_uuid(row.try_get("dataset_id")?, "settlements.dataset_id")?,
        kind: SettlementKind::parse(&kind)
            .ok_or_else(|| MarketError::Corrupt(format!("unknown settlement kind '{}'", kind)))?,
        amount: parse_decimal(&amount, "settlements.amount")?,
        status: SettlementStatus::parse(&status)
            .ok_or_else(|| MarketError::Corrupt(format!("unknown settlement status '{}'", status)))?,
        external_tx_ref: row.try_get("external_tx_ref")?,
        metadata,
        created_at: parse_timestamp(&created_at)?,
        confirmed_at: parse_opt_timestamp(row.try_get("confirmed_at")?)?,
    })
}

pub async fn insert(conn: &mut SqliteConnection, settlement: &Settlement) -> MarketResult<()> {
    let metadata = serde_json::to_string(&settlement.metadata)
        .map_err(|e| MarketError::Corrupt(format!("settlement metadata: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO settlements (
            id, labeler_id, company_id, dataset_id, kind, amount, status,
            external_tx_ref, metadata, created_at, confirmed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(settlement.id.to_string())
    .bind(settlement.labeler_id.map(|id| id.to_string()))
    .bind(settlement.company_id.map(|id| id.to_string()))
    .bind(settlement.dataset_id.map(|id| id.to_string()))
    .bind(settlement.kind.as_str())
    .bind(decimal_text(settlement.amount))
    .bind(settlement.status.as_str())
    .bind(settlement.external_tx_ref.as_deref())
    .bind(metadata)
    .bind(timestamp_text(settlement.created_at))
    .bind(settlement.confirmed_at.map(timestamp_text))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn fetch(conn: &mut SqliteConnection, id: Uuid) -> MarketResult<Option<Settlement>> {
    let sql = format!("{} WHERE id = ?", SELECT_SETTLEMENT);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(settlement_from_row).transpose()
}

/// Fetch or fail with `NotFound`
pub async fn get(conn: &mut SqliteConnection, id: Uuid) -> MarketResult<Settlement> {
    fetch(conn, id)
        .await?
        .ok_or_else(|| MarketError::not_found("Settlement", id))
}

/// Take the write lock on the settlement's row. Returns false if absent.
pub async fn lock(conn: &mut SqliteConnection, id: Uuid) -> MarketResult<bool> {
    let result = sqlx::query("UPDATE settlements SET status = status WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// PENDING → COMPLETED. Returns false if the settlement was no longer pending.
pub async fn complete(
    conn: &mut SqliteConnection,
    id: Uuid,
    external_tx_ref: &str,
    confirmed_at: DateTime<Utc>,
) -> MarketResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE settlements
        SET status = ?, external_tx_ref = ?, confirmed_at = ?
        WHERE id = ? AND status = 'PENDING'
        "#,
    )
    .bind(SettlementStatus::Completed.as_str())
    .bind(external_tx_ref)
    .bind(timestamp_text(confirmed_at))
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Sum of a labeler's non-failed withdrawals scoped to one dataset
pub async fn withdrawn_for(
    conn: &mut SqliteConnection,
    labeler_id: Uuid,
    dataset_id: Uuid,
) -> MarketResult<Decimal> {
    let amounts: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT amount FROM settlements
        WHERE labeler_id = ? AND dataset_id = ? AND kind = 'WITHDRAWAL' AND status <> 'FAILED'
        "#,
    )
    .bind(labeler_id.to_string())
    .bind(dataset_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    amounts.iter().try_fold(Decimal::ZERO, |total, amount| {
        Ok(total + parse_decimal(amount, "settlements.amount")?)
    })
}

/// A labeler's settlements, newest first
pub async fn list_for_labeler(
    conn: &mut SqliteConnection,
    labeler_id: Uuid,
) -> MarketResult<Vec<Settlement>> {
    let sql = format!(
        "{} WHERE labeler_id = ? ORDER BY created_at DESC, rowid DESC",
        SELECT_SETTLEMENT
    );
    let rows = sqlx::query(&sql)
        .bind(labeler_id.to_string())
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(settlement_from_row).collect()
}
