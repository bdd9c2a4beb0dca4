//! Database initialization
//!
//! Creates the database on first run and brings the schema up to date.
//! Every table is created with `IF NOT EXISTS`, so opening an existing
//! database is a no-op apart from the connection pragmas.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

/// SQLite busy timeout applied to every pooled connection
pub const BUSY_TIMEOUT_MS: u64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Pragmas are per-connection, so they go on the connect options rather
    // than being executed once against the pool.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_labelers_table(pool).await?;
    create_datasets_table(pool).await?;
    create_items_table(pool).await?;
    create_votes_table(pool).await?;
    create_settlements_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_labelers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS labelers (
            id TEXT PRIMARY KEY,
            wallet_address TEXT NOT NULL UNIQUE,
            reputation INTEGER NOT NULL DEFAULT 0 CHECK (reputation >= -100),
            labels_submitted INTEGER NOT NULL DEFAULT 0,
            labels_verified_correct INTEGER NOT NULL DEFAULT 0,
            labels_verified_incorrect INTEGER NOT NULL DEFAULT 0,
            verifications_done INTEGER NOT NULL DEFAULT 0,
            tokens_earned TEXT NOT NULL DEFAULT '0',
            tokens_claimed TEXT NOT NULL DEFAULT '0',
            revision INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_datasets_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS datasets (
            id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL,
            external_id TEXT NOT NULL,
            name TEXT NOT NULL,
            labels TEXT NOT NULL,
            instructions TEXT,
            total_items INTEGER NOT NULL DEFAULT 0,
            amount_locked TEXT NOT NULL,
            labeling_pool TEXT NOT NULL,
            verification_pool TEXT NOT NULL,
            amount_distributed TEXT NOT NULL DEFAULT '0',
            verification_required INTEGER NOT NULL DEFAULT 1,
            status TEXT NOT NULL DEFAULT 'ACTIVE'
                CHECK (status IN ('ACTIVE', 'COMPLETED', 'EXPIRED')),
            revision INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            completed_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_datasets_company ON datasets(company_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            dataset_id TEXT NOT NULL REFERENCES datasets(id) ON DELETE CASCADE,
            reward_value TEXT NOT NULL,
            image_url TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'UNLABELED'
                CHECK (status IN ('UNLABELED', 'PENDING_VERIFICATION', 'VERIFIED')),
            assigned_label TEXT,
            labeled_by TEXT REFERENCES labelers(id),
            labeled_at TEXT,
            revision INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            CHECK ((assigned_label IS NULL) = (labeled_by IS NULL)),
            CHECK ((assigned_label IS NULL) = (labeled_at IS NULL)),
            CHECK (status <> 'UNLABELED' OR assigned_label IS NULL),
            CHECK (status = 'UNLABELED' OR assigned_label IS NOT NULL)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_status_created ON items(status, created_at)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_dataset_status ON items(dataset_id, status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_labeled_by ON items(labeled_by)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_votes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS votes (
            id TEXT PRIMARY KEY,
            item_id TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
            verifier_id TEXT NOT NULL REFERENCES labelers(id),
            vote TEXT NOT NULL CHECK (vote IN ('YES', 'NO')),
            created_at TEXT NOT NULL,
            UNIQUE (item_id, verifier_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_votes_verifier ON votes(verifier_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_settlements_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settlements (
            id TEXT PRIMARY KEY,
            labeler_id TEXT REFERENCES labelers(id),
            company_id TEXT,
            dataset_id TEXT REFERENCES datasets(id),
            kind TEXT NOT NULL
                CHECK (kind IN ('LABELING', 'VERIFICATION', 'WITHDRAWAL', 'DATASET_LOCK')),
            amount TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'PENDING'
                CHECK (status IN ('PENDING', 'COMPLETED', 'FAILED')),
            external_tx_ref TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            confirmed_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_settlements_labeler ON settlements(labeler_id, kind, status)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
