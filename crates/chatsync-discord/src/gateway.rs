//! The Discord gateway consumer (spec §4.7, §6): one long-running task that
//! owns its socket end to end, mirrored on `resonancex_ws`'s single-task-
//! owns-the-connection shape. Sequence, session id, and bot id only ever
//! change on this task; nothing else touches them, so there is no lock to
//! share between socket I/O and worker-verb I/O (spec §9).

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use chatsync_core::{ChatSyncCoreWorker, IngestMessageCreate, IngestMessageMutation};
use chatsync_db::GatewaySessionCache;
use chatsync_types::{ExternalChannelId, ExternalMessageId, ExternalThreadId, Provider};

use crate::config::DiscordConfig;
use crate::error::{GatewayError, GatewayResult};

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_RESUME: u8 = 6;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;

const FATAL_CLOSE_CODES: [u16; 6] = [4004, 4010, 4011, 4012, 4013, 4014];
const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 41250;
const RECONNECT_DELAY: Duration = Duration::from_secs(2);
const INVALID_SESSION_CLOSE_CODE: u16 = 4000;

#[derive(Debug, Deserialize)]
struct Envelope {
    op: u8,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
    #[serde(default)]
    d: Option<Value>,
}

#[derive(Serialize)]
struct OutgoingEnvelope<T: Serialize> {
    op: u8,
    d: T,
}

#[derive(Deserialize)]
struct HelloData {
    heartbeat_interval: u64,
}

#[derive(Serialize)]
struct IdentifyData<'a> {
    token: &'a str,
    intents: u32,
    properties: IdentifyProperties,
}

#[derive(Serialize)]
struct IdentifyProperties {
    #[serde(rename = "$os")]
    os: &'static str,
    #[serde(rename = "$browser")]
    browser: &'static str,
    #[serde(rename = "$device")]
    device: &'static str,
}

#[derive(Serialize)]
struct ResumeData<'a> {
    token: &'a str,
    session_id: &'a str,
    seq: Option<u64>,
}

#[derive(Deserialize)]
struct ReadyData {
    session_id: String,
    resume_gateway_url: String,
    user: ReadyUser,
}

#[derive(Deserialize)]
struct ReadyUser {
    id: String,
}

/// A Discord `author`/`user` object, enough of it to derive display identity
/// (spec §4.7's author-extraction and display-name rules).
#[derive(Debug, Clone, Default, Deserialize)]
struct DiscordAuthor {
    id: String,
    #[serde(default)]
    bot: bool,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    global_name: Option<String>,
    #[serde(default)]
    discriminator: Option<String>,
    #[serde(default)]
    avatar: Option<String>,
}

fn author_display_name(author: &DiscordAuthor) -> String {
    if let Some(global_name) = author.global_name.as_deref().filter(|s| !s.is_empty()) {
        return global_name.to_string();
    }
    if let (Some(username), Some(discriminator)) = (author.username.as_deref(), author.discriminator.as_deref()) {
        if discriminator != "0" {
            return format!("{username}#{discriminator}");
        }
    }
    if let Some(username) = author.username.as_deref().filter(|s| !s.is_empty()) {
        return username.to_string();
    }
    "Discord User".to_string()
}

fn author_avatar_url(author: &DiscordAuthor) -> Option<String> {
    let avatar = author.avatar.as_deref()?;
    Some(format!("https://cdn.discordapp.com/avatars/{}/{avatar}.png", author.id))
}

/// Prefers `member.user` over the top-level `user` (spec §9 note 3); used
/// for `MESSAGE_REACTION_ADD`/`REMOVE` payloads.
fn extract_reaction_author(data: &Value) -> Option<DiscordAuthor> {
    data.get("member")
        .and_then(|m| m.get("user"))
        .or_else(|| data.get("user"))
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

#[derive(Debug, Clone, Serialize)]
pub struct NormalizedAttachment {
    pub filename: String,
    pub url: String,
    pub size: u64,
}

/// Trims `filename`/`url`, drops entries left empty by that trim, coerces a
/// negative or non-finite `size` to `0`, and preserves input order (spec §9
/// note 3 — these rules are specified only by test fixtures).
pub fn normalize_attachments(raw: &[Value]) -> Vec<NormalizedAttachment> {
    raw.iter()
        .filter_map(|entry| {
            let filename = entry.get("filename").and_then(Value::as_str).unwrap_or("").trim().to_string();
            let url = entry.get("url").and_then(Value::as_str).unwrap_or("").trim().to_string();
            if filename.is_empty() || url.is_empty() {
                return None;
            }
            let raw_size = entry.get("size").and_then(Value::as_f64).unwrap_or(0.0);
            let size = if raw_size.is_finite() && raw_size >= 0.0 { raw_size as u64 } else { 0 };
            Some(NormalizedAttachment { filename, url, size })
        })
        .collect()
}

#[derive(Debug, Default)]
struct SessionState {
    sequence: Option<u64>,
    session_id: Option<String>,
    resume_gateway_url: Option<String>,
    bot_user_id: Option<String>,
}

/// Owns one Discord gateway connection at a time, reconnecting on anything
/// but a fatal close code. Translates dispatch events into
/// [`ChatSyncCoreWorker`] ingress calls; never forwards a per-target
/// ingress error back into the socket loop (spec §4.7 step 6).
pub struct GatewayConsumer {
    config: DiscordConfig,
    worker: Arc<ChatSyncCoreWorker>,
    session_cache: Arc<GatewaySessionCache>,
    state: Mutex<SessionState>,
}

impl GatewayConsumer {
    pub fn new(
        config: DiscordConfig,
        worker: Arc<ChatSyncCoreWorker>,
        session_cache: Arc<GatewaySessionCache>,
    ) -> Self {
        Self {
            config,
            worker,
            session_cache,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Runs until the process is torn down, reconnecting after a transient
    /// error or the post-`Hello` 2s backoff (spec §4.7 step 7), and stopping
    /// only on a fatal close code.
    pub async fn run(self: Arc<Self>) {
        if let Ok(Some(cached)) = self.session_cache.load(Provider::Discord.tag()).await {
            let mut state = self.state.lock().await;
            state.session_id = Some(cached.session_id);
            state.sequence = cached.sequence;
            state.resume_gateway_url = Some(cached.resume_gateway_url);
        }

        loop {
            match self.run_session().await {
                Ok(()) => {
                    debug!("discord gateway session ended cleanly, reconnecting");
                }
                Err(GatewayError::FatalClose(code)) => {
                    error!(code, "discord gateway closed with a fatal code, stopping consumer");
                    break;
                }
                Err(err) => {
                    warn!(%err, "discord gateway session failed, reconnecting");
                }
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    async fn run_session(&self) -> GatewayResult<()> {
        let token = self
            .config
            .bot_token
            .clone()
            .ok_or(GatewayError::MissingToken)?;

        let url = {
            let state = self.state.lock().await;
            state.resume_gateway_url.clone().unwrap_or_else(|| self.config.gateway_url.clone())
        };

        info!(%url, "connecting to discord gateway");
        let (stream, _) = connect_async(&url).await?;
        let (mut write, mut read) = stream.split();

        let hello = Self::next_envelope(&mut read).await?.ok_or(GatewayError::NoHello)?;
        if hello.op != OP_HELLO {
            return Err(GatewayError::NoHello);
        }
        let hello_data: HelloData = serde_json::from_value(hello.d.unwrap_or(Value::Null))?;
        let interval_ms = if hello_data.heartbeat_interval > 0 {
            hello_data.heartbeat_interval
        } else {
            DEFAULT_HEARTBEAT_INTERVAL_MS
        };

        let (resume_session_id, resume_seq) = {
            let state = self.state.lock().await;
            (state.session_id.clone(), state.sequence)
        };

        match resume_session_id {
            Some(session_id) => {
                info!(%session_id, "resuming discord gateway session");
                let resume = OutgoingEnvelope {
                    op: OP_RESUME,
                    d: ResumeData { token: &token, session_id: &session_id, seq: resume_seq },
                };
                Self::send_json(&mut write, &resume).await?;
            }
            None => {
                info!("identifying new discord gateway session");
                let identify = OutgoingEnvelope {
                    op: OP_IDENTIFY,
                    d: IdentifyData {
                        token: &token,
                        intents: self.config.intents,
                        properties: IdentifyProperties { os: "linux", browser: "hazel-chatsync", device: "hazel-chatsync" },
                    },
                };
                Self::send_json(&mut write, &identify).await?;
            }
        }

        let initial_sequence = self.state.lock().await.sequence;
        Self::send_heartbeat(&mut write, initial_sequence).await?;

        let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let seq = self.state.lock().await.sequence;
                    Self::send_heartbeat(&mut write, seq).await?;
                }
                message = read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            let envelope: Envelope = serde_json::from_str(&text)?;
                            if let Some(seq) = envelope.s {
                                self.state.lock().await.sequence = Some(seq);
                            }
                            if self.handle_envelope(envelope).await? {
                                return Ok(());
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let code = frame.map(|f| u16::from(f.code)).unwrap_or(1000);
                            if FATAL_CLOSE_CODES.contains(&code) {
                                return Err(GatewayError::FatalClose(code));
                            }
                            return Ok(());
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => return Err(err.into()),
                        None => return Ok(()),
                    }
                }
            }
        }
    }

    /// Returns `Ok(true)` when the caller should end the session (invalid
    /// session, spec §4.7 step 5).
    async fn handle_envelope(&self, envelope: Envelope) -> GatewayResult<bool> {
        match envelope.op {
            OP_INVALID_SESSION => {
                warn!("discord gateway reported an invalid session, resetting and re-identifying");
                let mut state = self.state.lock().await;
                state.session_id = None;
                state.sequence = None;
                state.resume_gateway_url = None;
                drop(state);
                self.session_cache.clear(Provider::Discord.tag()).await.ok();
                Ok(true)
            }
            OP_DISPATCH => {
                if let Some(event_type) = envelope.t {
                    let data = envelope.d.unwrap_or(Value::Null);
                    self.handle_dispatch(&event_type, data).await;
                }
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    async fn handle_dispatch(&self, event_type: &str, data: Value) {
        match event_type {
            "READY" => self.handle_ready(data).await,
            "MESSAGE_CREATE" => self.handle_message_create(data).await,
            "MESSAGE_UPDATE" => self.handle_message_update(data).await,
            "MESSAGE_DELETE" => self.handle_message_delete(data).await,
            "MESSAGE_REACTION_ADD" | "MESSAGE_REACTION_REMOVE" => {
                self.handle_reaction(event_type, data).await
            }
            "THREAD_CREATE" => self.handle_thread_create(data).await,
            _ => debug!(event_type, "ignoring unhandled discord dispatch event"),
        }
    }

    async fn handle_ready(&self, data: Value) {
        let ready: ReadyData = match serde_json::from_value(data) {
            Ok(ready) => ready,
            Err(err) => {
                error!(%err, "failed to decode discord READY payload");
                return;
            }
        };

        info!(session_id = %ready.session_id, "discord gateway session established");

        let mut state = self.state.lock().await;
        state.session_id = Some(ready.session_id.clone());
        state.resume_gateway_url = Some(ready.resume_gateway_url.clone());
        state.bot_user_id = Some(ready.user.id);
        drop(state);

        let snapshot = chatsync_db::GatewaySessionState {
            session_id: ready.session_id,
            sequence: self.state.lock().await.sequence,
            resume_gateway_url: ready.resume_gateway_url,
        };
        if let Err(err) = self.session_cache.save(Provider::Discord.tag(), &snapshot).await {
            warn!(%err, "failed to persist discord gateway session state");
        }
    }

    /// `author.bot = true` or `author.id = botUserId` (spec §4.7 step 2,
    /// scenario 6 — "gateway echo").
    async fn is_self_echo(&self, author: &DiscordAuthor) -> bool {
        if author.bot {
            return true;
        }
        self.state.lock().await.bot_user_id.as_deref() == Some(author.id.as_str())
    }

    async fn handle_message_create(&self, data: Value) {
        let Some(id) = data.get("id").and_then(Value::as_str) else { return };
        let Some(channel_id) = data.get("channel_id").and_then(Value::as_str) else { return };
        let Some(content) = data.get("content").and_then(Value::as_str) else { return };

        let author: Option<DiscordAuthor> = data.get("author").and_then(|v| serde_json::from_value(v.clone()).ok());
        if let Some(author) = &author {
            if self.is_self_echo(author).await {
                debug!(message_id = id, "suppressing self-echo on MESSAGE_CREATE");
                return;
            }
        }

        let thread_id = data
            .get("thread")
            .and_then(|t| t.get("id"))
            .and_then(Value::as_str)
            .map(ExternalThreadId::new);

        let external_channel_id = ExternalChannelId::new(channel_id);
        let links = match self.worker.find_active_channel_links_by_external_channel(&external_channel_id).await {
            Ok(links) => links,
            Err(err) => {
                error!(%err, channel_id, "failed to resolve channel links for MESSAGE_CREATE");
                return;
            }
        };

        for link in links.into_iter().filter(|l| l.direction.allows_ingress()) {
            let connection = match self.worker.find_connection(link.sync_connection_id).await {
                Ok(Some(connection)) => connection,
                Ok(None) => continue,
                Err(err) => {
                    error!(%err, connection = %link.sync_connection_id, "failed to load connection");
                    continue;
                }
            };

            let params = IngestMessageCreate {
                sync_connection_id: link.sync_connection_id,
                provider: connection.provider,
                organization_id: connection.organization_id.clone(),
                external_channel_id: external_channel_id.clone(),
                external_message_id: ExternalMessageId::new(id),
                content: content.to_string(),
                external_author_id: author.as_ref().map(|a| a.id.clone()),
                external_author_display_name: author.as_ref().map(author_display_name),
                external_author_avatar_url: author.as_ref().and_then(author_avatar_url),
                external_thread_id: thread_id.clone(),
                dedupe_key: Some(format!("discord:gateway:create:{id}")),
            };

            if let Err(err) = self.worker.ingest_message_create(params).await {
                error!(%err, connection = %link.sync_connection_id, "ingest_message_create failed");
            }
        }
    }

    async fn handle_message_update(&self, data: Value) {
        let Some(id) = data.get("id").and_then(Value::as_str) else { return };
        let Some(channel_id) = data.get("channel_id").and_then(Value::as_str) else { return };
        let Some(content) = data.get("content").and_then(Value::as_str) else { return };

        if let Some(author) = data.get("author").and_then(|v| serde_json::from_value::<DiscordAuthor>(v.clone()).ok()) {
            if self.is_self_echo(&author).await {
                debug!(message_id = id, "suppressing self-echo on MESSAGE_UPDATE");
                return;
            }
        }

        let external_channel_id = ExternalChannelId::new(channel_id);
        let links = match self.worker.find_active_channel_links_by_external_channel(&external_channel_id).await {
            Ok(links) => links,
            Err(err) => {
                error!(%err, channel_id, "failed to resolve channel links for MESSAGE_UPDATE");
                return;
            }
        };

        for link in links.into_iter().filter(|l| l.direction.allows_ingress()) {
            let connection = match self.worker.find_connection(link.sync_connection_id).await {
                Ok(Some(connection)) => connection,
                Ok(None) => continue,
                Err(err) => {
                    error!(%err, connection = %link.sync_connection_id, "failed to load connection");
                    continue;
                }
            };

            let params = IngestMessageMutation {
                sync_connection_id: link.sync_connection_id,
                provider: connection.provider,
                external_channel_id: external_channel_id.clone(),
                external_message_id: ExternalMessageId::new(id),
                content: Some(content.to_string()),
                dedupe_key: Some(format!("discord:gateway:update:{id}")),
            };

            if let Err(err) = self.worker.ingest_message_update(params).await {
                error!(%err, connection = %link.sync_connection_id, "ingest_message_update failed");
            }
        }
    }

    async fn handle_message_delete(&self, data: Value) {
        let Some(id) = data.get("id").and_then(Value::as_str) else { return };
        let Some(channel_id) = data.get("channel_id").and_then(Value::as_str) else { return };

        let external_channel_id = ExternalChannelId::new(channel_id);
        let links = match self.worker.find_active_channel_links_by_external_channel(&external_channel_id).await {
            Ok(links) => links,
            Err(err) => {
                error!(%err, channel_id, "failed to resolve channel links for MESSAGE_DELETE");
                return;
            }
        };

        for link in links.into_iter().filter(|l| l.direction.allows_ingress()) {
            let connection = match self.worker.find_connection(link.sync_connection_id).await {
                Ok(Some(connection)) => connection,
                Ok(None) => continue,
                Err(err) => {
                    error!(%err, connection = %link.sync_connection_id, "failed to load connection");
                    continue;
                }
            };

            let params = IngestMessageMutation {
                sync_connection_id: link.sync_connection_id,
                provider: connection.provider,
                external_channel_id: external_channel_id.clone(),
                external_message_id: ExternalMessageId::new(id),
                content: None,
                dedupe_key: Some(format!("discord:gateway:delete:{id}")),
            };

            if let Err(err) = self.worker.ingest_message_delete(params).await {
                error!(%err, connection = %link.sync_connection_id, "ingest_message_delete failed");
            }
        }
    }

    /// Reactions are not mirrored through a `SyncMessageLink` (spec §3 scopes
    /// that to messages only); this decodes just far enough to apply the
    /// author-extraction rule and log the event, per SPEC_FULL §4.7's
    /// supplement and spec §9 note 3.
    async fn handle_reaction(&self, event_type: &str, data: Value) {
        let Some(message_id) = data.get("message_id").and_then(Value::as_str) else { return };
        let author = extract_reaction_author(&data);
        if let Some(author) = &author {
            if self.is_self_echo(author).await {
                debug!(message_id, "suppressing self-echo on {event_type}");
                return;
            }
        }
        debug!(
            event_type,
            message_id,
            author = author.as_ref().map(author_display_name),
            "observed discord reaction event"
        );
    }

    async fn handle_thread_create(&self, data: Value) {
        let Some(id) = data.get("id").and_then(Value::as_str) else { return };
        let attachments = data
            .get("message")
            .and_then(|m| m.get("attachments"))
            .and_then(Value::as_array)
            .map(|raw| normalize_attachments(raw))
            .unwrap_or_default();
        debug!(thread_id = id, attachment_count = attachments.len(), "observed discord thread creation");
    }

    async fn send_heartbeat<S>(write: &mut S, sequence: Option<u64>) -> GatewayResult<()>
    where
        S: futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    {
        Self::send_json(write, &OutgoingEnvelope { op: OP_HEARTBEAT, d: sequence }).await
    }

    async fn send_json<S, T>(write: &mut S, payload: &T) -> GatewayResult<()>
    where
        S: futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
        T: Serialize,
    {
        let text = serde_json::to_string(payload)?;
        write.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn next_envelope<S>(read: &mut S) -> GatewayResult<Option<Envelope>>
    where
        S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        match read.next().await {
            Some(Ok(Message::Text(text))) => Ok(Some(serde_json::from_str(&text)?)),
            Some(Ok(_)) => Ok(None),
            Some(Err(err)) => Err(err.into()),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_global_name() {
        let author = DiscordAuthor {
            id: "1".to_string(),
            global_name: Some("Ada".to_string()),
            username: Some("ada".to_string()),
            discriminator: Some("1234".to_string()),
            ..Default::default()
        };
        assert_eq!(author_display_name(&author), "Ada");
    }

    #[test]
    fn display_name_falls_back_to_username_discriminator() {
        let author = DiscordAuthor {
            id: "1".to_string(),
            username: Some("ada".to_string()),
            discriminator: Some("1234".to_string()),
            ..Default::default()
        };
        assert_eq!(author_display_name(&author), "ada#1234");
    }

    #[test]
    fn display_name_ignores_pomelo_discriminator() {
        let author = DiscordAuthor {
            id: "1".to_string(),
            username: Some("ada".to_string()),
            discriminator: Some("0".to_string()),
            ..Default::default()
        };
        assert_eq!(author_display_name(&author), "ada");
    }

    #[test]
    fn display_name_defaults_when_nothing_present() {
        let author = DiscordAuthor { id: "1".to_string(), ..Default::default() };
        assert_eq!(author_display_name(&author), "Discord User");
    }

    #[test]
    fn avatar_url_requires_both_id_and_avatar() {
        let with_avatar = DiscordAuthor { id: "1".to_string(), avatar: Some("abc".to_string()), ..Default::default() };
        assert_eq!(
            author_avatar_url(&with_avatar),
            Some("https://cdn.discordapp.com/avatars/1/abc.png".to_string())
        );

        let without_avatar = DiscordAuthor { id: "1".to_string(), ..Default::default() };
        assert_eq!(author_avatar_url(&without_avatar), None);
    }

    #[test]
    fn reaction_author_prefers_member_user() {
        let data = serde_json::json!({
            "user": { "id": "1", "username": "top-level" },
            "member": { "user": { "id": "1", "username": "nested" } },
        });
        let author = extract_reaction_author(&data).unwrap();
        assert_eq!(author.username.as_deref(), Some("nested"));
    }

    #[test]
    fn attachments_are_trimmed_and_ordered() {
        let raw = vec![
            serde_json::json!({ "filename": "  a.png  ", "url": "  https://x/a.png  ", "size": 10 }),
            serde_json::json!({ "filename": "", "url": "https://x/b.png", "size": 5 }),
            serde_json::json!({ "filename": "c.png", "url": "https://x/c.png", "size": -5 }),
        ];
        let normalized = normalize_attachments(&raw);
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].filename, "a.png");
        assert_eq!(normalized[0].url, "https://x/a.png");
        assert_eq!(normalized[0].size, 10);
        assert_eq!(normalized[1].filename, "c.png");
        assert_eq!(normalized[1].size, 0);
    }

    #[test]
    fn attachments_coerce_non_finite_size_to_zero() {
        let raw = vec![serde_json::json!({ "filename": "a.png", "url": "https://x/a.png", "size": Value::Null })];
        let normalized = normalize_attachments(&raw);
        assert_eq!(normalized[0].size, 0);
    }
}
