use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::DatabaseConfig;

/// Idempotent schema bootstrap, applied statement by statement at startup.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS reports (
        id                 UUID PRIMARY KEY,
        kind               TEXT NOT NULL CHECK (kind IN ('lost', 'found')),
        canonical_item_key TEXT NOT NULL,
        item_tokens        TEXT[] NOT NULL DEFAULT '{}',
        description        TEXT NOT NULL,
        location           TEXT NOT NULL,
        secret_detail_1    TEXT NOT NULL,
        secret_detail_2    TEXT,
        drop_off_point     TEXT,
        reporter_identity  TEXT NOT NULL,
        match_status       TEXT NOT NULL DEFAULT 'open'
                           CHECK (match_status IN ('open', 'pending_approval', 'approved', 'resolved')),
        claim_code         TEXT,
        matched_report_id  UUID,
        created_at         TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS reports_open_kind_idx ON reports (kind, match_status)",
    "CREATE INDEX IF NOT EXISTS reports_reporter_idx ON reports (reporter_identity, created_at DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        identity   TEXT PRIMARY KEY,
        state_blob JSONB NOT NULL,
        version    BIGINT NOT NULL DEFAULT 1,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS sessions_updated_at_idx ON sessions (updated_at)",
];

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.url)
        .await
}

pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!("Database schema ready");
    Ok(())
}

pub async fn health_check(pool: &PgPool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT version()").fetch_one(pool).await?;
    Ok(row.0)
}
