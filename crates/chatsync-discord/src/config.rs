//! Discord-specific configuration, mirrored on `openibank_llm::providers`'
//! per-provider `*Config::default()` pattern (env-var fallbacks, no panics).
//!
//! A missing `DISCORD_BOT_TOKEN` is not fatal at startup (spec §6): the
//! adapter surfaces `ProviderError::Configuration` lazily on the first call
//! that needs it, and the service entrypoint disables the gateway consumer
//! with a warning rather than refusing to boot.

#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub bot_token: Option<String>,
    pub gateway_enabled: bool,
    pub intents: u32,
    pub api_base: String,
    pub gateway_url: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: std::env::var("DISCORD_BOT_TOKEN").ok(),
            gateway_enabled: std::env::var("DISCORD_GATEWAY_ENABLED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
            intents: std::env::var("DISCORD_GATEWAY_INTENTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(33281),
            api_base: "https://discord.com/api/v10".to_string(),
            gateway_url: "wss://gateway.discord.gg/?v=10&encoding=json".to_string(),
        }
    }
}

impl DiscordConfig {
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Whether the gateway consumer should be spawned at all: both the
    /// feature flag and a present bot token are required.
    pub fn gateway_should_run(&self) -> bool {
        self.gateway_enabled && self.bot_token.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_does_not_run_without_a_token() {
        let config = DiscordConfig {
            bot_token: None,
            gateway_enabled: true,
            ..DiscordConfig::default()
        };
        assert!(!config.gateway_should_run());
    }

    #[test]
    fn gateway_runs_with_token_and_flag() {
        let config = DiscordConfig {
            bot_token: Some("abc".to_string()),
            gateway_enabled: true,
            ..DiscordConfig::default()
        };
        assert!(config.gateway_should_run());
    }
}
