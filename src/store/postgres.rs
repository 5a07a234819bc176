//! PostgreSQL-backed entity store.
//! Every entity kind shares one JSONB table keyed by (kind, id).

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, Connection, Pool, Postgres, Row};
use std::time::Duration;

use super::{EntityStore, StoreResult};
use crate::error::StoreError;

/// PostgreSQL connection pool type alias.
pub type DbPool = Pool<Postgres>;

/// Database schema name
pub const SCHEMA: &str = "staking_indexer";

const MIGRATION_LOCK_ID: i64 = 0x5354414B494E4753; // "STAKINGS" in hex
const MAX_CONNECT_ATTEMPTS: u32 = 10;

pub struct PgEntityStore {
    pool: DbPool,
}

impl PgEntityStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Connects with exponential backoff and makes sure the schema exists.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let mut last_err: Option<StoreError> = None;
        for attempt in 1..=MAX_CONNECT_ATTEMPTS {
            match PgPoolOptions::new()
                .max_connections(max_connections)
                .acquire_timeout(Duration::from_secs(5))
                .connect(database_url)
                .await
            {
                Ok(pool) => {
                    log::info!(
                        "Connected to database (attempt {}/{}).",
                        attempt,
                        MAX_CONNECT_ATTEMPTS
                    );
                    match initialize_database(&pool).await {
                        Ok(()) => return Ok(Self::new(pool)),
                        Err(e) => last_err = Some(e),
                    }
                }
                Err(e) => last_err = Some(e.into()),
            }
            // 200ms, 400ms, 800ms, ... capped at ~12.8s
            let delay_ms = (1u64 << attempt.min(6)) * 200;
            log::warn!(
                "DB connect/init attempt {}/{} failed. Retrying in {} ms...",
                attempt,
                MAX_CONNECT_ATTEMPTS,
                delay_ms
            );
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        Err(last_err.unwrap_or(StoreError::Database(sqlx::Error::PoolTimedOut)))
    }
}

pub async fn initialize_database(pool: &DbPool) -> StoreResult<()> {
    let mut conn = pool.acquire().await?;
    let mut tx = conn.begin().await?;

    log::info!("Acquiring database migration lock...");
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(MIGRATION_LOCK_ID)
        .execute(tx.as_mut())
        .await?;

    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", SCHEMA))
        .execute(tx.as_mut())
        .await?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {}.entities (
            kind VARCHAR(64) NOT NULL,
            id VARCHAR(80) NOT NULL,
            data JSONB NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (kind, id)
        )",
        SCHEMA
    ))
    .execute(tx.as_mut())
    .await?;

    tx.commit().await?;
    log::info!("Database initialization complete, transaction committed.");
    Ok(())
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn load(&self, kind: &'static str, id: &str) -> StoreResult<Option<Value>> {
        let row = sqlx::query(&format!(
            "SELECT data FROM {}.entities WHERE kind = $1 AND id = $2",
            SCHEMA
        ))
        .bind(kind)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row.try_get::<Value, _>("data")?)),
            None => Ok(None),
        }
    }

    async fn load_all(&self, kind: &'static str) -> StoreResult<Vec<Value>> {
        let rows = sqlx::query(&format!(
            "SELECT data FROM {}.entities WHERE kind = $1 ORDER BY id",
            SCHEMA
        ))
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| row.try_get::<Value, _>("data").map_err(StoreError::from))
            .collect()
    }

    async fn save(&self, kind: &'static str, id: &str, data: Value) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO {}.entities (kind, id, data, updated_at)
             VALUES ($1, $2, $3, NOW())
             ON CONFLICT (kind, id) DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()",
            SCHEMA
        ))
        .bind(kind)
        .bind(id)
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
