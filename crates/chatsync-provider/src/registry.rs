//! Maps a provider tag to its adapter; rejects unknown providers with a
//! tagged error rather than a nil return (spec §4.1).

use std::collections::HashMap;
use std::sync::Arc;

use chatsync_types::{Provider, ProviderError, ProviderResult};

use crate::adapter::Adapter;

/// Built once, holds all adapters by static tag.
pub struct AdapterRegistry {
    adapters: HashMap<Provider, Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Register an adapter for a provider tag. Later registrations for the
    /// same tag replace earlier ones.
    pub fn register(&mut self, provider: Provider, adapter: Arc<dyn Adapter>) -> &mut Self {
        self.adapters.insert(provider, adapter);
        self
    }

    pub fn get(&self, provider: Provider) -> ProviderResult<Arc<dyn Adapter>> {
        self.adapters
            .get(&provider)
            .cloned()
            .ok_or_else(|| ProviderError::NotSupported(provider.to_string()))
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{
        CreateMessageRequest, CreateThreadRequest, DeleteMessageRequest, ReactionRequest,
        UpdateMessageRequest,
    };
    use async_trait::async_trait;
    use chatsync_types::ExternalMessageId;

    struct NoopAdapter;

    #[async_trait]
    impl Adapter for NoopAdapter {
        async fn create_message(
            &self,
            _req: CreateMessageRequest,
        ) -> chatsync_types::ProviderResult<ExternalMessageId> {
            Ok(ExternalMessageId::new("e1"))
        }
        async fn update_message(&self, _req: UpdateMessageRequest) -> chatsync_types::ProviderResult<()> {
            Ok(())
        }
        async fn delete_message(&self, _req: DeleteMessageRequest) -> chatsync_types::ProviderResult<()> {
            Ok(())
        }
        async fn add_reaction(&self, _req: ReactionRequest) -> chatsync_types::ProviderResult<()> {
            Ok(())
        }
        async fn remove_reaction(&self, _req: ReactionRequest) -> chatsync_types::ProviderResult<()> {
            Ok(())
        }
        async fn create_thread(&self, _req: CreateThreadRequest) -> chatsync_types::ProviderResult<String> {
            Ok("t1".to_string())
        }
    }

    #[test]
    fn unknown_provider_is_a_tagged_error_not_a_panic() {
        let registry = AdapterRegistry::new();
        let err = registry.get(Provider::Discord).unwrap_err();
        match err {
            ProviderError::NotSupported(tag) => assert_eq!(tag, "discord"),
            other => panic!("expected NotSupported, got {other:?}"),
        }
    }

    #[test]
    fn registered_adapter_is_returned() {
        let mut registry = AdapterRegistry::new();
        registry.register(Provider::Discord, Arc::new(NoopAdapter));
        assert!(registry.get(Provider::Discord).is_ok());
    }
}
