//! Live-update channel
//!
//! A reconnecting WebSocket client for a stream's channel. The server
//! announces new content with `{"event": "new", "id": .., "parentId": ..}`
//! and profile changes with `{"event": "profile", "id": ..}`; the client
//! sends `{"event": "ping"}` periodically to keep the connection open.
//!
//! # Example
//!
//! ```no_run
//! use libhearth::live::{LiveChannel, LiveSettings};
//! use libhearth::streams::StreamDescriptor;
//!
//! # async fn example() -> libhearth::Result<()> {
//! let channel = LiveChannel::for_stream(
//!     "https://social.example",
//!     &StreamDescriptor::public(),
//!     None,
//!     LiveSettings::default(),
//! )?;
//! let (handle, mut events) = channel.spawn();
//!
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

use futures::{SinkExt, StreamExt};
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, timeout, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::config::LiveConfig;
use crate::error::{LiveError, Result};
use crate::store::Action;
use crate::streams::StreamDescriptor;
use crate::types::{deserialize_id, deserialize_optional_id, ContentId, ProfileId};

const EVENT_BUFFER: usize = 100;

/// How long a closing handshake may take once shutdown is requested
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Delay between reconnection attempts, growing by `decay` up to `max`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub decay: f64,
}

impl ReconnectPolicy {
    /// Delay before reconnection attempt number `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.decay.powi(attempt.min(64) as i32);
        let delay = self.initial.as_secs_f64() * factor;
        if !delay.is_finite() || delay >= self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(delay)
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            decay: 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveSettings {
    pub keepalive: Duration,
    pub reconnect: ReconnectPolicy,
}

impl LiveSettings {
    pub fn from_config(config: &LiveConfig) -> Result<Self> {
        Ok(Self {
            keepalive: config.keepalive_interval()?,
            reconnect: config.reconnect_policy()?,
        })
    }
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            keepalive: Duration::from_secs(30),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// What the channel reports to its consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    Connected,
    Disconnected,
    Announcement {
        id: ContentId,
        parent_id: Option<ContentId>,
    },
    ProfileChanged(ProfileId),
}

impl LiveEvent {
    /// Store action this event should trigger, if any
    pub fn into_action(self) -> Option<Action> {
        match self {
            LiveEvent::Announcement { id, parent_id } => {
                Some(Action::LiveAnnouncement { id, parent_id })
            }
            LiveEvent::ProfileChanged(id) => Some(Action::FetchProfile(id)),
            LiveEvent::Connected | LiveEvent::Disconnected => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum Envelope {
    New {
        #[serde(deserialize_with = "deserialize_id")]
        id: ContentId,
        #[serde(rename = "parentId", default, deserialize_with = "deserialize_optional_id")]
        parent_id: Option<ContentId>,
    },
    Profile {
        #[serde(deserialize_with = "deserialize_id")]
        id: ProfileId,
    },
    #[serde(other)]
    Other,
}

/// Parse a server frame; unknown events and malformed frames yield `None`
pub fn parse_message(text: &str) -> Option<LiveEvent> {
    match serde_json::from_str::<Envelope>(text) {
        Ok(Envelope::New { id, parent_id }) => Some(LiveEvent::Announcement { id, parent_id }),
        Ok(Envelope::Profile { id }) => Some(LiveEvent::ProfileChanged(id)),
        Ok(Envelope::Other) => {
            debug!(frame = %text, "ignoring unknown live event");
            None
        }
        Err(e) => {
            debug!(frame = %text, error = %e, "ignoring malformed live frame");
            None
        }
    }
}

fn ping_frame() -> Message {
    Message::Text(serde_json::json!({ "event": "ping" }).to_string())
}

/// WebSocket URL of a stream's channel on the given server
pub fn channel_url(base_url: &str, stream: &StreamDescriptor) -> Result<String> {
    let mut url = Url::parse(base_url)
        .map_err(|e| LiveError::InvalidUrl(format!("{}: {}", base_url, e)))?;

    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(
                LiveError::InvalidUrl(format!("unsupported scheme {} in {}", other, base_url)).into(),
            )
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| LiveError::InvalidUrl(base_url.to_string()))?;

    // The channel key goes in as one segment, encoded like any path segment
    url.path_segments_mut()
        .map_err(|_| LiveError::InvalidUrl(base_url.to_string()))?
        .pop_if_empty()
        .extend(["ch", "streams", stream.channel_key()?.as_str(), ""]);

    Ok(url.into())
}

/// Hand an event to the consumer unless shutdown comes first
///
/// Returns false when the channel should stop: shutdown was requested or
/// the receiver is gone.
async fn forward(
    events: &mpsc::Sender<LiveEvent>,
    shutdown: &mut watch::Receiver<bool>,
    event: LiveEvent,
) -> bool {
    tokio::select! {
        sent = events.send(event) => sent.is_ok(),
        _ = shutdown.changed() => false,
    }
}

enum SessionEnd {
    /// Server closed the connection
    Closed,
    /// Shutdown requested or nobody listens anymore
    Shutdown,
}

pub struct LiveChannel {
    url: String,
    cookie: Option<SecretString>,
    settings: LiveSettings,
}

impl LiveChannel {
    pub fn new(url: impl Into<String>, cookie: Option<SecretString>, settings: LiveSettings) -> Self {
        Self {
            url: url.into(),
            cookie,
            settings,
        }
    }

    pub fn for_stream(
        base_url: &str,
        stream: &StreamDescriptor,
        cookie: Option<SecretString>,
        settings: LiveSettings,
    ) -> Result<Self> {
        Ok(Self::new(channel_url(base_url, stream)?, cookie, settings))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Run the channel in a background task
    pub fn spawn(self) -> (LiveHandle, mpsc::Receiver<LiveEvent>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(events_tx, shutdown_rx));

        (
            LiveHandle {
                shutdown: shutdown_tx,
                task,
            },
            events_rx,
        )
    }

    async fn run(self, events: mpsc::Sender<LiveEvent>, mut shutdown: watch::Receiver<bool>) {
        let mut attempt: u32 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.session(&events, &mut shutdown).await {
                Ok(SessionEnd::Shutdown) => break,
                Ok(SessionEnd::Closed) => {
                    info!(url = %self.url, "live channel closed, reconnecting");
                    attempt = 0;
                }
                Err(e) => {
                    warn!(url = %self.url, error = %e, attempt, "live channel connection failed");
                }
            }

            // The session may already have observed the shutdown request
            if events.is_closed() || *shutdown.borrow() {
                break;
            }

            let delay = self.settings.reconnect.delay(attempt);
            attempt = attempt.saturating_add(1);
            debug!(delay_ms = delay.as_millis() as u64, "waiting before reconnect");

            tokio::select! {
                _ = sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        debug!(url = %self.url, "live channel stopped");
    }

    async fn session(
        &self,
        events: &mpsc::Sender<LiveEvent>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> std::result::Result<SessionEnd, LiveError> {
        let mut request = self.url.as_str().into_client_request()?;
        if let Some(cookie) = &self.cookie {
            let value = HeaderValue::from_str(cookie.expose_secret())
                .map_err(|e| LiveError::Protocol(format!("invalid session cookie: {}", e)))?;
            request.headers_mut().insert(COOKIE, value);
        }

        // A server may accept the TCP connection and never answer the handshake
        let (socket, _) = tokio::select! {
            connected = connect_async(request) => connected?,
            _ = shutdown.changed() => return Ok(SessionEnd::Shutdown),
        };
        info!(url = %self.url, "live channel connected");
        let (mut sink, mut stream) = socket.split();

        if !forward(events, shutdown, LiveEvent::Connected).await {
            return Ok(SessionEnd::Shutdown);
        }

        // Dropped together with the session, which stops the keep-alive
        let period = self.settings.keepalive;
        let mut keepalive = interval_at(Instant::now() + period, period);

        let end = loop {
            tokio::select! {
                _ = shutdown.changed() => break SessionEnd::Shutdown,
                _ = keepalive.tick() => {
                    debug!("sending keep-alive ping");
                    let sent = tokio::select! {
                        sent = sink.send(ping_frame()) => sent,
                        _ = shutdown.changed() => break SessionEnd::Shutdown,
                    };
                    if let Err(e) = sent {
                        forward(events, shutdown, LiveEvent::Disconnected).await;
                        return Err(e.into());
                    }
                }
                message = stream.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(event) = parse_message(&text) {
                            if !forward(events, shutdown, event).await {
                                break SessionEnd::Shutdown;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break SessionEnd::Closed,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        forward(events, shutdown, LiveEvent::Disconnected).await;
                        return Err(e.into());
                    }
                }
            }
        };

        match end {
            SessionEnd::Shutdown => {
                if timeout(CLOSE_TIMEOUT, sink.send(Message::Close(None))).await.is_err() {
                    debug!("server did not take the close frame in time");
                }
                // Nobody may be reading anymore
                let _ = events.try_send(LiveEvent::Disconnected);
            }
            SessionEnd::Closed => {
                forward(events, shutdown, LiveEvent::Disconnected).await;
            }
        }
        Ok(end)
    }
}

/// Handle to a running live channel
pub struct LiveHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl LiveHandle {
    /// Stop the channel and wait for its task to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "live channel task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
