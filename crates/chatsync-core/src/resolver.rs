//! Identity Resolver (spec §2.3, §4.3).
//!
//! Maps an external user id to an internal Hazel user id, preferring an
//! existing integration connection over materializing a shadow user.

use std::sync::Arc;

use chatsync_types::{HazelOrganizationId, HazelUserId, Provider, SyncResult};

use crate::repos::{IntegrationConnectionRepo, OrganizationMemberRepo, ShadowUserUpsert, UserRepo};

pub struct IdentityResolver {
    integration_connections: Arc<dyn IntegrationConnectionRepo>,
    users: Arc<dyn UserRepo>,
    org_members: Arc<dyn OrganizationMemberRepo>,
}

impl IdentityResolver {
    pub fn new(
        integration_connections: Arc<dyn IntegrationConnectionRepo>,
        users: Arc<dyn UserRepo>,
        org_members: Arc<dyn OrganizationMemberRepo>,
    ) -> Self {
        Self {
            integration_connections,
            users,
            org_members,
        }
    }

    /// `resolveAuthor` (spec §4.3 steps 1-4).
    pub async fn resolve_author(
        &self,
        provider: Provider,
        organization_id: &HazelOrganizationId,
        external_user_id: &str,
        display_name: Option<&str>,
        avatar_url: Option<&str>,
    ) -> SyncResult<HazelUserId> {
        if let Some(user_id) = self
            .integration_connections
            .find_active_user_by_external_account_id(organization_id, provider, external_user_id)
            .await?
        {
            return Ok(user_id);
        }

        let synthetic_external_id = format!("{}-user-{}", provider.tag(), external_user_id);
        let row = ShadowUserUpsert {
            synthetic_external_id,
            email: format!("{}@{}.internal", external_user_id, provider.tag()),
            first_name: display_name.unwrap_or("External User").to_string(),
            avatar_url: avatar_url.map(|s| s.to_string()),
        };
        // When no avatar was supplied this call, disable the avatar
        // overwrite on repeat upserts (spec §4.3 step 2).
        let sync_avatar_url = avatar_url.is_some();
        let user_id = self.users.upsert_by_external_id(row, sync_avatar_url).await?;

        self.org_members
            .upsert_by_org_and_user(organization_id, &user_id)
            .await?;

        Ok(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::fakes::{FakeIntegrationConnectionRepo, FakeOrgMemberRepo, FakeUserRepo};

    fn org() -> HazelOrganizationId {
        HazelOrganizationId::new("org-1")
    }

    #[tokio::test]
    async fn prefers_existing_integration_connection() {
        let integ = Arc::new(FakeIntegrationConnectionRepo::with_mapping(
            org(),
            Provider::Discord,
            "ext-1",
            HazelUserId::new("hazel-user-1"),
        ));
        let users = Arc::new(FakeUserRepo::new());
        let members = Arc::new(FakeOrgMemberRepo::new());
        let resolver = IdentityResolver::new(integ, users.clone(), members);

        let resolved = resolver
            .resolve_author(Provider::Discord, &org(), "ext-1", Some("Display"), None)
            .await
            .unwrap();

        assert_eq!(resolved, HazelUserId::new("hazel-user-1"));
        assert!(users.upserts().is_empty(), "shadow upsert must be skipped");
    }

    #[tokio::test]
    async fn materializes_shadow_user_when_no_connection_exists() {
        let integ = Arc::new(FakeIntegrationConnectionRepo::new());
        let users = Arc::new(FakeUserRepo::new());
        let members = Arc::new(FakeOrgMemberRepo::new());
        let resolver = IdentityResolver::new(integ, users.clone(), members.clone());

        let user_id = resolver
            .resolve_author(Provider::Discord, &org(), "ext-2", None, None)
            .await
            .unwrap();

        let upserts = users.upserts();
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0].synthetic_external_id, "discord-user-ext-2");
        assert_eq!(upserts[0].first_name, "External User");
        assert!(members.memberships().contains(&(org(), user_id)));
    }

    #[tokio::test]
    async fn disables_avatar_overwrite_when_no_avatar_supplied() {
        let integ = Arc::new(FakeIntegrationConnectionRepo::new());
        let users = Arc::new(FakeUserRepo::new());
        let members = Arc::new(FakeOrgMemberRepo::new());
        let resolver = IdentityResolver::new(integ, users.clone(), members);

        resolver
            .resolve_author(Provider::Discord, &org(), "ext-3", Some("Name"), None)
            .await
            .unwrap();

        assert_eq!(users.sync_avatar_flags(), vec![false]);

        resolver
            .resolve_author(
                Provider::Discord,
                &org(),
                "ext-3",
                Some("Name"),
                Some("https://example.com/a.png"),
            )
            .await
            .unwrap();

        assert_eq!(users.sync_avatar_flags(), vec![false, true]);
    }
}
