//! Database error types, mirrored on `openibank_db::error::DbError`.
//!
//! `DbError` converts into `chatsync_types::SyncError::Database` at the
//! crate boundary (spec §4.2, §7: "any other database error is fatal and
//! propagates"), keeping `chatsync-core` dependency-free of `sqlx`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("query error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("redis error: {0}")]
    Redis(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<deadpool_redis::PoolError> for DbError {
    fn from(e: deadpool_redis::PoolError) -> Self {
        DbError::Redis(e.to_string())
    }
}

impl From<deadpool_redis::redis::RedisError> for DbError {
    fn from(e: deadpool_redis::redis::RedisError) -> Self {
        DbError::Redis(e.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(e: serde_json::Error) -> Self {
        DbError::Serialization(e.to_string())
    }
}

impl From<DbError> for chatsync_types::SyncError {
    fn from(e: DbError) -> Self {
        chatsync_types::SyncError::Database(e.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
