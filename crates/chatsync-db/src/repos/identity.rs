//! Shadow-user identity repositories: `UserRepo`, `OrganizationMemberRepo`,
//! `IntegrationConnectionRepo`, and the `IntegrationBotService` collaborator
//! (spec §4.3).

use async_trait::async_trait;
use sqlx::PgPool;

use chatsync_core::repos::{
    IntegrationBotService, IntegrationConnectionRepo, OrganizationMemberRepo, ShadowUserUpsert,
    UserRepo,
};
use chatsync_types::{HazelOrganizationId, HazelUserId, Provider, SyncResult};

use crate::error::DbError;

pub struct PgUserRepo {
    pool: PgPool,
}

impl PgUserRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    /// `ON CONFLICT (synthetic_external_id) DO UPDATE` with the avatar
    /// column guarded by `sync_avatar_url` so a repeat upsert with no
    /// avatar in the payload never clobbers a previously stored one
    /// (spec §4.3 step 2).
    async fn upsert_by_external_id(
        &self,
        row: ShadowUserUpsert,
        sync_avatar_url: bool,
    ) -> SyncResult<HazelUserId> {
        let id: String = sqlx::query_scalar(
            r#"
            INSERT INTO hazel_users (id, synthetic_external_id, email, first_name, avatar_url)
            VALUES (gen_random_uuid()::text, $1, $2, $3, $4)
            ON CONFLICT (synthetic_external_id) DO UPDATE
            SET email = EXCLUDED.email,
                first_name = EXCLUDED.first_name,
                avatar_url = CASE WHEN $5 THEN EXCLUDED.avatar_url ELSE hazel_users.avatar_url END
            RETURNING id
            "#,
        )
        .bind(&row.synthetic_external_id)
        .bind(&row.email)
        .bind(&row.first_name)
        .bind(&row.avatar_url)
        .bind(sync_avatar_url)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(HazelUserId::new(id))
    }
}

pub struct PgOrganizationMemberRepo {
    pool: PgPool,
}

impl PgOrganizationMemberRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrganizationMemberRepo for PgOrganizationMemberRepo {
    async fn upsert_by_org_and_user(
        &self,
        organization_id: &HazelOrganizationId,
        user_id: &HazelUserId,
    ) -> SyncResult<()> {
        sqlx::query(
            r#"
            INSERT INTO hazel_organization_members (organization_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (organization_id, user_id) DO NOTHING
            "#,
        )
        .bind(organization_id.as_str())
        .bind(user_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(())
    }
}

pub struct PgIntegrationConnectionRepo {
    pool: PgPool,
}

impl PgIntegrationConnectionRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IntegrationConnectionRepo for PgIntegrationConnectionRepo {
    async fn find_active_user_by_external_account_id(
        &self,
        organization_id: &HazelOrganizationId,
        provider: Provider,
        external_user_id: &str,
    ) -> SyncResult<Option<HazelUserId>> {
        let id: Option<String> = sqlx::query_scalar(
            r#"
            SELECT user_id FROM integration_connections
            WHERE organization_id = $1 AND provider = $2 AND external_user_id = $3 AND is_active
            "#,
        )
        .bind(organization_id.as_str())
        .bind(provider.tag())
        .bind(external_user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(id.map(HazelUserId::new))
    }
}

/// Creates (and thereafter reuses) one bot `HazelUser` per
/// `(organizationId, provider)` pair (spec §4.3, last paragraph).
pub struct PgIntegrationBotService {
    pool: PgPool,
}

impl PgIntegrationBotService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IntegrationBotService for PgIntegrationBotService {
    async fn get_or_create_bot_user(
        &self,
        provider: Provider,
        organization_id: &HazelOrganizationId,
    ) -> SyncResult<HazelUserId> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let existing: Option<String> = sqlx::query_scalar(
            "SELECT user_id FROM integration_bot_users WHERE organization_id = $1 AND provider = $2",
        )
        .bind(organization_id.as_str())
        .bind(provider.tag())
        .fetch_optional(&mut *tx)
        .await
        .map_err(DbError::from)?;

        if let Some(id) = existing {
            tx.commit().await.map_err(DbError::from)?;
            return Ok(HazelUserId::new(id));
        }

        let synthetic_id = format!("{}-bot-{}", provider.tag(), organization_id.as_str());
        let bot_name = format!("{} bot", provider.tag());

        let user_id: String = sqlx::query_scalar(
            r#"
            INSERT INTO hazel_users (id, synthetic_external_id, email, first_name, is_bot)
            VALUES (gen_random_uuid()::text, $1, $2, $3, TRUE)
            ON CONFLICT (synthetic_external_id) DO UPDATE SET first_name = EXCLUDED.first_name
            RETURNING id
            "#,
        )
        .bind(&synthetic_id)
        .bind(format!("{synthetic_id}@bots.invalid"))
        .bind(&bot_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(DbError::from)?;

        sqlx::query(
            r#"
            INSERT INTO integration_bot_users (organization_id, provider, user_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (organization_id, provider) DO NOTHING
            "#,
        )
        .bind(organization_id.as_str())
        .bind(provider.tag())
        .bind(&user_id)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        tx.commit().await.map_err(DbError::from)?;

        Ok(HazelUserId::new(user_id))
    }
}
