//! Vote queries

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{is_unique_violation, parse_timestamp, parse_uuid, timestamp_text};
use crate::error::{MarketError, MarketResult};
use crate::models::{Vote, VoteRecord};

fn vote_from_row(row: &SqliteRow) -> MarketResult<VoteRecord> {
    let id: String = row.try_get("id")?;
    let item_id: String = row.try_get("item_id")?;
    let verifier_id: String = row.try_get("verifier_id")?;
    let vote: String = row.try_get("vote")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(VoteRecord {
        id: parse_uuid(&id, "votes.id")?,
        item_id: parse_uuid(&item_id, "votes.item_id")?,
        verifier_id: parse_uuid(&verifier_id, "votes.verifier_id")?,
        vote: Vote::parse(&vote)
            .ok_or_else(|| MarketError::Corrupt(format!("unknown vote '{}'", vote)))?,
        created_at: parse_timestamp(&created_at)?,
    })
}

/// Record a vote; a second vote by the same verifier is `DuplicateVote`
pub async fn insert(conn: &mut SqliteConnection, vote: &VoteRecord) -> MarketResult<()> {
    let result = sqlx::query(
        "INSERT INTO votes (id, item_id, verifier_id, vote, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(vote.id.to_string())
    .bind(vote.item_id.to_string())
    .bind(vote.verifier_id.to_string())
    .bind(vote.vote.as_str())
    .bind(timestamp_text(vote.created_at))
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(e) if is_unique_violation(&e) => Err(MarketError::DuplicateVote {
            item_id: vote.item_id,
            verifier_id: vote.verifier_id,
        }),
        Err(e) => Err(e.into()),
    }
}

/// Votes on an item in the order they were cast
pub async fn for_item(conn: &mut SqliteConnection, item_id: Uuid) -> MarketResult<Vec<VoteRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, item_id, verifier_id, vote, created_at
        FROM votes
        WHERE item_id = ?
        ORDER BY created_at ASC, rowid ASC
        "#,
    )
    .bind(item_id.to_string())
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(vote_from_row).collect()
}

pub async fn exists(conn: &mut SqliteConnection, item_id: Uuid, verifier_id: Uuid) -> MarketResult<bool> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM votes WHERE item_id = ? AND verifier_id = ?")
            .bind(item_id.to_string())
            .bind(verifier_id.to_string())
            .fetch_optional(&mut *conn)
            .await?;
    Ok(found.is_some())
}

pub async fn delete_for_item(conn: &mut SqliteConnection, item_id: Uuid) -> MarketResult<u64> {
    let result = sqlx::query("DELETE FROM votes WHERE item_id = ?")
        .bind(item_id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Votes a verifier has on record within one dataset
pub async fn count_by_verifier_in_dataset(
    conn: &mut SqliteConnection,
    verifier_id: Uuid,
    dataset_id: Uuid,
) -> MarketResult<i64> {
    let count = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM votes v JOIN items i ON i.id = v.item_id
        WHERE v.verifier_id = ? AND i.dataset_id = ?
        "#,
    )
    .bind(verifier_id.to_string())
    .bind(dataset_id.to_string())
    .fetch_one(&mut *conn)
    .await?;
    Ok(count)
}
