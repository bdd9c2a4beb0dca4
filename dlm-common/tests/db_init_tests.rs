//! Tests for database creation and schema constraints

use dlm_common::db::init::{init_database, SCHEMA_VERSION};
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("sub").join("dlm.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("dlm.db");

    let pool1 = init_database(&db_path).await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());

    let versions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
        .fetch_one(&pool2.unwrap())
        .await
        .unwrap();
    assert_eq!(versions, 1);
}

#[tokio::test]
async fn test_all_tables_created() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("dlm.db")).await.unwrap();

    for table in ["labelers", "datasets", "items", "votes", "settlements", "schema_version"] {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1, "table {} missing", table);
    }

    let version: i64 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(version, SCHEMA_VERSION);
}

#[tokio::test]
async fn test_wal_and_foreign_keys_enabled_on_every_connection() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("dlm.db")).await.unwrap();

    let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");

    let mut conn = pool.acquire().await.unwrap();
    let fk: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
        .fetch_one(&mut *conn)
        .await
        .unwrap();
    assert_eq!(fk, 1);
}

#[tokio::test]
async fn test_unlabeled_item_cannot_carry_label() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("dlm.db")).await.unwrap();

    sqlx::query(
        "INSERT INTO datasets (id, company_id, external_id, name, labels, amount_locked, \
         labeling_pool, verification_pool, created_at) \
         VALUES ('d1', 'c1', 'd1', 'pets', '[\"cat\",\"dog\"]', '10', '7', '3', '2024-01-01T00:00:00.000Z')",
    )
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO labelers (id, wallet_address, created_at) \
         VALUES ('l1', '0x0000000000000000000000000000000000000001', '2024-01-01T00:00:00.000Z')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let result = sqlx::query(
        "INSERT INTO items (id, dataset_id, reward_value, image_url, status, assigned_label, \
         labeled_by, labeled_at, created_at) \
         VALUES ('i1', 'd1', '3.5', 'u', 'UNLABELED', 'cat', 'l1', '2024-01-01T00:00:00.000Z', \
         '2024-01-01T00:00:00.000Z')",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err(), "schema accepted a labeled UNLABELED item");
}

#[tokio::test]
async fn test_duplicate_vote_rejected_by_schema() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("dlm.db")).await.unwrap();

    let ts = "2024-01-01T00:00:00.000Z";
    sqlx::query(
        "INSERT INTO datasets (id, company_id, external_id, name, labels, amount_locked, \
         labeling_pool, verification_pool, created_at) \
         VALUES ('d1', 'c1', 'd1', 'pets', '[]', '10', '7', '3', ?)",
    )
    .bind(ts)
    .execute(&pool)
    .await
    .unwrap();
    for (id, wallet) in [("l1", "0x01"), ("l2", "0x02")] {
        sqlx::query("INSERT INTO labelers (id, wallet_address, created_at) VALUES (?, ?, ?)")
            .bind(id)
            .bind(wallet)
            .bind(ts)
            .execute(&pool)
            .await
            .unwrap();
    }
    sqlx::query(
        "INSERT INTO items (id, dataset_id, reward_value, image_url, status, assigned_label, \
         labeled_by, labeled_at, created_at) \
         VALUES ('i1', 'd1', '3.5', 'u', 'PENDING_VERIFICATION', 'cat', 'l1', ?, ?)",
    )
    .bind(ts)
    .bind(ts)
    .execute(&pool)
    .await
    .unwrap();

    let insert_vote = |id: &'static str| {
        sqlx::query(
            "INSERT INTO votes (id, item_id, verifier_id, vote, created_at) VALUES (?, 'i1', 'l2', 'YES', ?)",
        )
        .bind(id)
        .bind(ts)
    };

    insert_vote("v1").execute(&pool).await.unwrap();
    assert!(insert_vote("v2").execute(&pool).await.is_err());
}
