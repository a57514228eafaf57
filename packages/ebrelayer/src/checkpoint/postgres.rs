//! Postgres-backed checkpoint store

use alloy::primitives::U256;
use async_trait::async_trait;
use bridge_types::ProphecyId;
use chrono::{DateTime, Utc};
use eyre::{eyre, Result, WrapErr};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::error;

use super::{Checkpoint, CheckpointStore, PendingClaim};

/// Create a database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .wrap_err("Failed to connect to database")
}

/// Run pending migrations (uses the migration files in migrations/)
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .wrap_err("Failed to run database migrations")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PgCheckpointStore {
    pool: PgPool,
}

impl PgCheckpointStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and apply migrations
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl CheckpointStore for PgCheckpointStore {
    async fn load(&self, chain: &str) -> Result<Option<Checkpoint>> {
        // NUMERIC is read back as TEXT; sqlx has no U256 mapping
        let row = sqlx::query(
            "SELECT height, last_nonce::TEXT AS last_nonce FROM checkpoints WHERE chain = $1",
        )
        .bind(chain)
        .fetch_optional(&self.pool)
        .await
        .wrap_err("Failed to load checkpoint")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let height: i64 = row.get("height");
        let last_nonce: Option<String> = row.get("last_nonce");
        let last_nonce = last_nonce
            .map(|n| U256::from_str_radix(&n, 10))
            .transpose()
            .map_err(|e| eyre!("Corrupt nonce in checkpoint for {}: {}", chain, e))?;

        Ok(Some(Checkpoint {
            height: height as u64,
            last_nonce,
        }))
    }

    async fn commit(&self, chain: &str, checkpoint: &Checkpoint) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO checkpoints (chain, height, last_nonce, updated_at)
            VALUES ($1, $2, $3::NUMERIC, NOW())
            ON CONFLICT (chain) DO UPDATE
                SET height = EXCLUDED.height,
                    last_nonce = EXCLUDED.last_nonce,
                    updated_at = NOW()
            "#,
        )
        .bind(chain)
        .bind(checkpoint.height as i64)
        .bind(checkpoint.last_nonce.map(|n| n.to_string()))
        .execute(&self.pool)
        .await
        .wrap_err("Failed to commit checkpoint")?;
        Ok(())
    }

    async fn save_pending(&self, chain: &str, pending: &PendingClaim) -> Result<()> {
        let claim = serde_json::to_string(&pending.claim).wrap_err("Failed to encode claim")?;
        sqlx::query(
            r#"
            INSERT INTO pending_claims (chain, prophecy_id, claim, attempts, last_error, deferred_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (chain, prophecy_id) DO UPDATE
                SET claim = EXCLUDED.claim,
                    attempts = EXCLUDED.attempts,
                    last_error = EXCLUDED.last_error,
                    deferred_at = EXCLUDED.deferred_at
            "#,
        )
        .bind(chain)
        .bind(pending.claim.prophecy_id.to_hex())
        .bind(claim)
        .bind(pending.attempts as i32)
        .bind(&pending.last_error)
        .bind(pending.deferred_at)
        .execute(&self.pool)
        .await
        .wrap_err("Failed to save pending claim")?;
        Ok(())
    }

    async fn remove_pending(&self, chain: &str, prophecy_id: &ProphecyId) -> Result<()> {
        sqlx::query("DELETE FROM pending_claims WHERE chain = $1 AND prophecy_id = $2")
            .bind(chain)
            .bind(prophecy_id.to_hex())
            .execute(&self.pool)
            .await
            .wrap_err("Failed to remove pending claim")?;
        Ok(())
    }

    async fn load_pending(&self, chain: &str) -> Result<Vec<PendingClaim>> {
        let rows = sqlx::query(
            r#"SELECT claim, attempts, last_error, deferred_at
               FROM pending_claims WHERE chain = $1 ORDER BY deferred_at"#,
        )
        .bind(chain)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("SQL error loading pending claims: {:?}", e);
            e
        })
        .wrap_err("Failed to load pending claims")?;

        rows.into_iter()
            .map(|row| {
                let claim: String = row.get("claim");
                let attempts: i32 = row.get("attempts");
                let deferred_at: DateTime<Utc> = row.get("deferred_at");
                Ok(PendingClaim {
                    claim: serde_json::from_str(&claim).wrap_err("Corrupt pending claim")?,
                    attempts: attempts.max(0) as u32,
                    last_error: row.get("last_error"),
                    deferred_at,
                })
            })
            .collect()
    }
}
