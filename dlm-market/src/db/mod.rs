//! Persistence queries
//!
//! Every function takes `&mut SqliteConnection` so callers decide the
//! transaction boundary. Ids are stored as hyphenated UUID text, amounts as
//! canonical decimal text and timestamps as RFC 3339 text.

pub mod datasets;
pub mod items;
pub mod labelers;
pub mod settlements;
pub mod votes;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{MarketError, MarketResult};

pub(crate) fn parse_uuid(value: &str, column: &str) -> MarketResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| MarketError::Corrupt(format!("{} '{}' is not a UUID: {}", column, value, e)))
}

pub(crate) fn parse_opt_uuid(value: Option<String>, column: &str) -> MarketResult<Option<Uuid>> {
    value.map(|v| parse_uuid(&v, column)).transpose()
}

pub(crate) fn parse_decimal(value: &str, column: &str) -> MarketResult<Decimal> {
    value
        .parse::<Decimal>()
        .map_err(|e| MarketError::Corrupt(format!("{} '{}' is not a decimal: {}", column, value, e)))
}

pub(crate) fn parse_timestamp(value: &str) -> MarketResult<DateTime<Utc>> {
    dlm_common::time::parse_db_timestamp(value).map_err(|e| MarketError::Corrupt(e.to_string()))
}

pub(crate) fn parse_opt_timestamp(value: Option<String>) -> MarketResult<Option<DateTime<Utc>>> {
    value.map(|v| parse_timestamp(&v)).transpose()
}

pub(crate) fn decimal_text(value: Decimal) -> String {
    value.normalize().to_string()
}

pub(crate) fn timestamp_text(value: DateTime<Utc>) -> String {
    dlm_common::time::to_db_timestamp(value)
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|e| e.is_unique_violation())
        .unwrap_or(false)
}

/// Add `amount` to a decimal TEXT column and return the new value.
///
/// Read-modify-write; callers hold the row's write lock.
pub(crate) async fn add_to_amount(
    conn: &mut sqlx::SqliteConnection,
    table: &'static str,
    column: &'static str,
    id: Uuid,
    amount: Decimal,
) -> MarketResult<Decimal> {
    let select = format!("SELECT {} FROM {} WHERE id = ?", column, table);
    let current: Option<String> = sqlx::query_scalar(&select)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    let current = current.ok_or_else(|| MarketError::not_found(table, id))?;
    let updated = parse_decimal(&current, column)?
        .checked_add(amount)
        .ok_or_else(|| MarketError::Corrupt(format!("{}.{} overflow for {}", table, column, id)))?;

    let update = format!("UPDATE {} SET {} = ? WHERE id = ?", table, column);
    sqlx::query(&update)
        .bind(decimal_text(updated))
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(updated)
}
