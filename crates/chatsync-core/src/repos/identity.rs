//! `UserRepo`, `OrganizationMemberRepo`, `IntegrationConnectionRepo`, and the
//! `IntegrationBotService` collaborator (spec §6, §4.3).

use async_trait::async_trait;

use chatsync_types::{HazelOrganizationId, HazelUserId, Provider, SyncResult};

/// Fields for `UserRepo::upsert_by_external_id` (spec §4.3 step 2).
#[derive(Debug, Clone)]
pub struct ShadowUserUpsert {
    /// Synthetic external id: `"{provider}-user-{externalUserId}"`.
    pub synthetic_external_id: String,
    pub email: String,
    pub first_name: String,
    pub avatar_url: Option<String>,
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Insert-or-update a machine-typed user keyed by `synthetic_external_id`.
    /// When `sync_avatar_url` is `false` (no avatar was supplied this call),
    /// a repeat upsert must not overwrite a previously stored avatar; when
    /// `true`, it must overwrite (spec §4.3 step 2).
    async fn upsert_by_external_id(
        &self,
        row: ShadowUserUpsert,
        sync_avatar_url: bool,
    ) -> SyncResult<HazelUserId>;
}

#[async_trait]
pub trait OrganizationMemberRepo: Send + Sync {
    /// Upsert an organization membership with `role = member`,
    /// `joinedAt = now` (spec §4.3 step 3).
    async fn upsert_by_org_and_user(
        &self,
        organization_id: &HazelOrganizationId,
        user_id: &HazelUserId,
    ) -> SyncResult<()>;
}

#[async_trait]
pub trait IntegrationConnectionRepo: Send + Sync {
    /// An *active* integration connection for `(organizationId, provider,
    /// externalUserId)` with a bound `userId`, if one exists (spec §4.3
    /// step 1).
    async fn find_active_user_by_external_account_id(
        &self,
        organization_id: &HazelOrganizationId,
        provider: Provider,
        external_user_id: &str,
    ) -> SyncResult<Option<HazelUserId>>;
}

/// External collaborator used when no author metadata accompanies an event
/// (spec §4.3, last paragraph).
#[async_trait]
pub trait IntegrationBotService: Send + Sync {
    async fn get_or_create_bot_user(
        &self,
        provider: Provider,
        organization_id: &HazelOrganizationId,
    ) -> SyncResult<HazelUserId>;
}
