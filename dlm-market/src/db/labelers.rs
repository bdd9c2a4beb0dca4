//! Labeler queries
//!
//! Counters only move through the increment and credit functions here.

use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{
    add_to_amount, decimal_text, is_unique_violation, parse_decimal, parse_timestamp, parse_uuid,
    timestamp_text,
};
use crate::error::{MarketError, MarketResult};
use crate::models::Labeler;
use crate::reputation::{apply_outcome, ReputationOutcome};

const SELECT_LABELER: &str = r#"
    SELECT id, wallet_address, reputation, labels_submitted, labels_verified_correct,
           labels_verified_incorrect, verifications_done, tokens_earned, tokens_claimed,
           created_at
    FROM labelers
"#;

fn labeler_from_row(row: &SqliteRow) -> MarketResult<Labeler> {
    let id: String = row.try_get("id")?;
    let tokens_earned: String = row.try_get("tokens_earned")?;
    let tokens_claimed: String = row.try_get("tokens_claimed")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Labeler {
        id: parse_uuid(&id, "labelers.id")?,
        wallet_address: row.try_get("wallet_address")?,
        reputation: row.try_get("reputation")?,
        labels_submitted: row.try_get("labels_submitted")?,
        labels_verified_correct: row.try_get("labels_verified_correct")?,
        labels_verified_incorrect: row.try_get("labels_verified_incorrect")?,
        verifications_done: row.try_get("verifications_done")?,
        tokens_earned: parse_decimal(&tokens_earned, "labelers.tokens_earned")?,
        tokens_claimed: parse_decimal(&tokens_claimed, "labelers.tokens_claimed")?,
        created_at: parse_timestamp(&created_at)?,
    })
}

/// Insert a new labeler; a taken wallet address is a `Conflict`
pub async fn insert(conn: &mut SqliteConnection, labeler: &Labeler) -> MarketResult<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO labelers (
            id, wallet_address, reputation, labels_submitted, labels_verified_correct,
            labels_verified_incorrect, verifications_done, tokens_earned, tokens_claimed,
            created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(labeler.id.to_string())
    .bind(&labeler.wallet_address)
    .bind(labeler.reputation)
    .bind(labeler.labels_submitted)
    .bind(labeler.labels_verified_correct)
    .bind(labeler.labels_verified_incorrect)
    .bind(labeler.verifications_done)
    .bind(decimal_text(labeler.tokens_earned))
    .bind(decimal_text(labeler.tokens_claimed))
    .bind(timestamp_text(labeler.created_at))
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(e) if is_unique_violation(&e) => Err(MarketError::Conflict(format!(
            "wallet {} is already registered",
            labeler.wallet_address
        ))),
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch(conn: &mut SqliteConnection, id: Uuid) -> MarketResult<Option<Labeler>> {
    let sql = format!("{} WHERE id = ?", SELECT_LABELER);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(labeler_from_row).transpose()
}

/// Fetch or fail with `NotFound`
pub async fn get(conn: &mut SqliteConnection, id: Uuid) -> MarketResult<Labeler> {
    fetch(conn, id)
        .await?
        .ok_or_else(|| MarketError::not_found("Labeler", id))
}

/// Take the write lock on the labeler's row. Returns false if absent.
pub async fn lock(conn: &mut SqliteConnection, id: Uuid) -> MarketResult<bool> {
    let result = sqlx::query("UPDATE labelers SET revision = revision + 1 WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

async fn increment(conn: &mut SqliteConnection, id: Uuid, column: &'static str) -> MarketResult<()> {
    let sql = format!("UPDATE labelers SET {0} = {0} + 1 WHERE id = ?", column);
    let result = sqlx::query(&sql)
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(MarketError::not_found("Labeler", id));
    }
    Ok(())
}

pub async fn record_label_submitted(conn: &mut SqliteConnection, id: Uuid) -> MarketResult<()> {
    increment(conn, id, "labels_submitted").await
}

pub async fn record_verification(conn: &mut SqliteConnection, id: Uuid) -> MarketResult<()> {
    increment(conn, id, "verifications_done").await
}

pub async fn record_verified_incorrect(conn: &mut SqliteConnection, id: Uuid) -> MarketResult<()> {
    increment(conn, id, "labels_verified_incorrect").await
}

/// Count a verified label and credit its reward to the running total
pub async fn record_verified_correct(
    conn: &mut SqliteConnection,
    id: Uuid,
    credit: Decimal,
) -> MarketResult<()> {
    increment(conn, id, "labels_verified_correct").await?;
    add_to_amount(conn, "labelers", "tokens_earned", id, credit).await?;
    Ok(())
}

/// Apply one vote outcome to the labeler's reputation; returns the new score
pub async fn apply_reputation(
    conn: &mut SqliteConnection,
    id: Uuid,
    outcome: ReputationOutcome,
) -> MarketResult<i64> {
    let current: Option<i64> = sqlx::query_scalar("SELECT reputation FROM labelers WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    let current = current.ok_or_else(|| MarketError::not_found("Labeler", id))?;
    let updated = apply_outcome(current, outcome);

    sqlx::query("UPDATE labelers SET reputation = ? WHERE id = ?")
        .bind(updated)
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(updated)
}

/// Raise the authoritative claimed floor after a confirmed withdrawal
pub async fn credit_claimed(
    conn: &mut SqliteConnection,
    id: Uuid,
    amount: Decimal,
) -> MarketResult<Decimal> {
    add_to_amount(conn, "labelers", "tokens_claimed", id, amount).await
}
