//! Postgres/Redis persistence for the chat-sync engine, mirrored on
//! `openibank_db`'s connection-pool-plus-repository-factory shape.
//!
//! # Architecture
//!
//! - **PostgreSQL**: `chat_sync_*` tables plus the Hazel-message and
//!   shadow-identity tables the engine reads and writes through.
//! - **Redis**: gateway session-state cache (spec §4.7) so a worker restart
//!   resumes instead of re-identifying.
//!
//! Every repository here implements a `chatsync_core::repos` trait; the
//! worker binary wires concrete `Pg*` types behind those trait objects so
//! `chatsync-core` itself never depends on `sqlx`.

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod repos;

use deadpool_redis::{Config as RedisConfig, Pool as RedisPool, Runtime};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

pub use cache::GatewaySessionCache;
pub use config::DatabaseConfig;
pub use error::{DbError, DbResult};
pub use repos::*;

pub struct Database {
    pub pg: PgPool,
    pub redis: RedisPool,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        info!(url = %config.postgres_url_masked(), "connecting to postgres");

        let pg = PgPoolOptions::new()
            .max_connections(config.pg_max_connections)
            .min_connections(config.pg_min_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.pg_acquire_timeout_secs))
            .connect(&config.postgres_url)
            .await
            .map_err(|e| DbError::Connection(format!("postgres: {e}")))?;

        info!("connected to postgres");
        info!(url = %config.redis_url_masked(), "connecting to redis");

        let redis_cfg = RedisConfig::from_url(&config.redis_url);
        let redis = redis_cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| DbError::Connection(format!("redis: {e}")))?;

        let mut conn = redis
            .get()
            .await
            .map_err(|e| DbError::Connection(format!("redis pool: {e}")))?;
        let _: String = deadpool_redis::redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| DbError::Connection(format!("redis ping: {e}")))?;

        info!("connected to redis");

        Ok(Self { pg, redis })
    }

    pub async fn migrate(&self) -> DbResult<()> {
        info!("running migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pg)
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;
        info!("migrations complete");
        Ok(())
    }

    pub async fn health_check(&self) -> DbResult<HealthStatus> {
        let pg_ok = sqlx::query("SELECT 1").fetch_one(&self.pg).await.is_ok();

        let redis_ok = async {
            let mut conn = self.redis.get().await.ok()?;
            let result: Result<String, _> = deadpool_redis::redis::cmd("PING")
                .query_async(&mut *conn)
                .await;
            result.ok()
        }
        .await
        .is_some();

        Ok(HealthStatus {
            postgres: pg_ok,
            redis: redis_ok,
            healthy: pg_ok && redis_ok,
        })
    }

    pub fn sync_connection_repo(&self) -> PgSyncConnectionRepo {
        PgSyncConnectionRepo::new(self.pg.clone())
    }

    pub fn sync_channel_link_repo(&self) -> PgSyncChannelLinkRepo {
        PgSyncChannelLinkRepo::new(self.pg.clone())
    }

    pub fn sync_message_link_repo(&self) -> PgSyncMessageLinkRepo {
        PgSyncMessageLinkRepo::new(self.pg.clone())
    }

    pub fn event_receipt_repo(&self) -> PgEventReceiptRepo {
        PgEventReceiptRepo::new(self.pg.clone())
    }

    pub fn message_repo(&self) -> PgMessageRepo {
        PgMessageRepo::new(self.pg.clone())
    }

    pub fn user_repo(&self) -> PgUserRepo {
        PgUserRepo::new(self.pg.clone())
    }

    pub fn organization_member_repo(&self) -> PgOrganizationMemberRepo {
        PgOrganizationMemberRepo::new(self.pg.clone())
    }

    pub fn integration_connection_repo(&self) -> PgIntegrationConnectionRepo {
        PgIntegrationConnectionRepo::new(self.pg.clone())
    }

    pub fn integration_bot_service(&self) -> PgIntegrationBotService {
        PgIntegrationBotService::new(self.pg.clone())
    }

    pub fn gateway_session_cache(&self) -> GatewaySessionCache {
        GatewaySessionCache::new(self.redis.clone())
    }
}

#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub postgres: bool,
    pub redis: bool,
    pub healthy: bool,
}
