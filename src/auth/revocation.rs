use std::{sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// Denylist of token ids that must no longer authorize requests.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Revokes `jti` until `expires_at`, after which the token is dead anyway.
    async fn revoke(&self, jti: Uuid, expires_at: OffsetDateTime) -> anyhow::Result<()>;
    async fn is_revoked(&self, jti: Uuid) -> anyhow::Result<bool>;
    /// Drops entries that expired before `now`; returns how many were removed.
    async fn purge_expired(&self, now: OffsetDateTime) -> anyhow::Result<u64>;
}

#[derive(Clone)]
pub struct PgRevocationStore {
    db: PgPool,
}

impl PgRevocationStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RevocationStore for PgRevocationStore {
    async fn revoke(&self, jti: Uuid, expires_at: OffsetDateTime) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO revoked_tokens (jti, expires_at)
            VALUES ($1, $2)
            ON CONFLICT (jti) DO NOTHING
            "#,
        )
        .bind(jti)
        .bind(expires_at)
        .execute(&self.db)
        .await
        .context("insert revoked token")?;
        Ok(())
    }

    async fn is_revoked(&self, jti: Uuid) -> anyhow::Result<bool> {
        let revoked: bool =
            sqlx::query_scalar(r#"SELECT EXISTS (SELECT 1 FROM revoked_tokens WHERE jti = $1)"#)
                .bind(jti)
                .fetch_one(&self.db)
                .await
                .context("lookup revoked token")?;
        Ok(revoked)
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> anyhow::Result<u64> {
        let res = sqlx::query(r#"DELETE FROM revoked_tokens WHERE expires_at < $1"#)
            .bind(now)
            .execute(&self.db)
            .await
            .context("purge revoked tokens")?;
        Ok(res.rows_affected())
    }
}

pub fn spawn_purge_task(store: Arc<dyn RevocationStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        loop {
            tick.tick().await;
            match store.purge_expired(OffsetDateTime::now_utc()).await {
                Ok(0) => {}
                Ok(removed) => debug!(removed, "purged expired revocations"),
                Err(e) => warn!(error = %e, "revocation purge failed"),
            }
        }
    })
}
