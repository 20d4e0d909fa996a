//! Redis-backed gateway session cache (SPEC_FULL §0): persists the Discord
//! gateway's `sessionId`/`sequence`/`resumeGatewayUrl` triple so a process
//! restart can `RESUME` instead of re-`IDENTIFY`ing.

use deadpool_redis::{redis::AsyncCommands, Pool as RedisPool};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{DbError, DbResult};

const KEY_PREFIX: &str = "chatsync:gateway-session:";
const TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySessionState {
    pub session_id: String,
    pub sequence: Option<u64>,
    pub resume_gateway_url: String,
}

pub struct GatewaySessionCache {
    pool: RedisPool,
}

impl GatewaySessionCache {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    fn key(provider: &str) -> String {
        format!("{KEY_PREFIX}{provider}")
    }

    pub async fn save(&self, provider: &str, state: &GatewaySessionState) -> DbResult<()> {
        let mut conn = self.pool.get().await.map_err(DbError::from)?;
        let json = serde_json::to_string(state).map_err(DbError::from)?;
        conn.set_ex::<_, _, ()>(Self::key(provider), json, TTL.as_secs())
            .await
            .map_err(|e| DbError::Redis(e.to_string()))?;
        Ok(())
    }

    pub async fn load(&self, provider: &str) -> DbResult<Option<GatewaySessionState>> {
        let mut conn = self.pool.get().await.map_err(DbError::from)?;
        let raw: Option<String> = conn
            .get(Self::key(provider))
            .await
            .map_err(|e| DbError::Redis(e.to_string()))?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json).map_err(DbError::from)?)),
            None => Ok(None),
        }
    }

    pub async fn clear(&self, provider: &str) -> DbResult<()> {
        let mut conn = self.pool.get().await.map_err(DbError::from)?;
        conn.del::<_, ()>(Self::key(provider))
            .await
            .map_err(|e| DbError::Redis(e.to_string()))?;
        Ok(())
    }
}
