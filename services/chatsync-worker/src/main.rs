//! Chat-sync engine worker: connects to Postgres/Redis, runs migrations,
//! and runs the Discord gateway consumer alongside a periodic backfill
//! sweep over every active connection.

use std::sync::Arc;
use std::time::Duration;

use chatsync_core::{BackfillScanner, ChatSyncCoreWorker};
use chatsync_db::{Database, DatabaseConfig};
use chatsync_discord::{DiscordAdapter, DiscordConfig, GatewayConsumer};
use chatsync_provider::AdapterRegistry;
use chatsync_types::Provider;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How often the backfill sweep runs over every active connection.
const BACKFILL_INTERVAL: Duration = Duration::from_secs(60);
/// Per-channel cap applied to a single backfill pass (spec §4.4.6).
const BACKFILL_MAX_MESSAGES_PER_CHANNEL: i64 = 100;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    tracing::info!("starting chatsync-worker");

    let db_config = DatabaseConfig::from_env();
    let db = Database::connect(&db_config).await?;
    db.migrate().await?;

    let health = db.health_check().await?;
    if !health.healthy {
        anyhow::bail!("database health check failed: {health:?}");
    }

    let mut registry = AdapterRegistry::new();
    let discord_config = DiscordConfig::from_env();

    if discord_config.gateway_should_run() {
        registry.register(Provider::Discord, Arc::new(DiscordAdapter::new(discord_config.clone())));
    } else {
        tracing::warn!("DISCORD_BOT_TOKEN not set or gateway disabled, discord provider not registered");
    }
    let registry = Arc::new(registry);

    let worker = Arc::new(ChatSyncCoreWorker::new(
        Arc::new(db.sync_connection_repo()),
        Arc::new(db.sync_channel_link_repo()),
        Arc::new(db.sync_message_link_repo()),
        Arc::new(db.event_receipt_repo()),
        Arc::new(db.message_repo()),
        Arc::new(db.integration_connection_repo()),
        Arc::new(db.user_repo()),
        Arc::new(db.organization_member_repo()),
        Arc::new(db.integration_bot_service()),
        registry,
    ));

    if discord_config.gateway_should_run() {
        let session_cache = Arc::new(db.gateway_session_cache());
        let consumer = Arc::new(GatewayConsumer::new(discord_config, worker.clone(), session_cache));
        tokio::spawn(async move {
            consumer.run().await;
        });
        tracing::info!("discord gateway consumer started");
    }

    let backfill_worker = worker.clone();
    tokio::spawn(async move {
        let scanner = BackfillScanner::new(backfill_worker);
        let mut ticker = tokio::time::interval(BACKFILL_INTERVAL);
        loop {
            ticker.tick().await;
            match scanner
                .sync_all_active_connections(Provider::Discord, BACKFILL_MAX_MESSAGES_PER_CHANNEL)
                .await
            {
                Ok(results) => {
                    let (sent, failed): (u32, u32) = results.iter().fold((0, 0), |(sent, failed), (_, summary)| {
                        (sent + summary.sent, failed + summary.failed)
                    });
                    tracing::info!(connections = results.len(), sent, failed, "backfill sweep complete");
                }
                Err(err) => tracing::error!(%err, "backfill sweep failed"),
            }
        }
    });

    shutdown_signal().await;
    tracing::info!("chatsync-worker shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}
