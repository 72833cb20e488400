//! Platform protocol adapters.
//!
//! An adapter turns raw transport frames into [`AdapterSignal`]s: canonical
//! events, the setup confirmation, replies the transport must send back, and
//! recoverable faults. Each adapter dispatches on an explicit, closed set of
//! frame kinds; anything outside that set is protocol noise and yields no
//! signals.

pub mod kick;
pub mod twitch;
pub mod youtube;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::Result;
use crate::event::{ChannelRef, Platform, SessionMeta, UniChatEvent};

pub use kick::KickProtocol;
pub use twitch::TwitchProtocol;
pub use youtube::YouTubeProtocol;

/// Output of decoding one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterSignal {
    /// The platform confirmed the subscription and resolved the channel.
    SetupConfirmed(SessionMeta),
    Event(UniChatEvent),
    /// Text the transport must send back (pongs and the like).
    Reply(String),
    /// Part of a frame failed to decode; the rest of the frame was kept.
    Fault(String),
    /// The platform told us the connection cannot recover.
    Unrecoverable(String),
}

/// Protocol definitions for a specific platform.
#[async_trait]
pub trait ChatProtocol: Send + Sync + 'static {
    fn platform(&self) -> Platform;

    /// Check if the page URL belongs to this platform.
    fn supports_url(&self, url: &str) -> bool;

    /// Extract the channel handle (login, slug or video id) from a page URL.
    fn extract_channel(&self, url: &str) -> Option<String>;

    /// WebSocket endpoint, or `None` when frames are fed by the host.
    async fn websocket_url(&self, _channel: &str) -> Result<Option<String>> {
        Ok(None)
    }

    /// Messages to send right after the transport connects.
    async fn handshake_messages(&self, _channel: &str) -> Result<Vec<String>> {
        Ok(vec![])
    }

    /// Decode one text frame.
    ///
    /// Returns `Err` only when the frame as a whole is malformed. Unknown frame
    /// kinds decode to an empty list.
    fn decode_frame(&mut self, frame: &str) -> Result<Vec<AdapterSignal>>;
}

/// Create a fresh adapter for `platform`.
pub fn protocol_for(platform: Platform) -> Box<dyn ChatProtocol> {
    match platform {
        Platform::Twitch => Box::new(TwitchProtocol::new()),
        Platform::Kick => Box::new(KickProtocol::new()),
        Platform::YouTube => Box::new(YouTubeProtocol::new()),
    }
}

/// Channel resolved by the setup handshake, used to stamp events.
#[derive(Debug, Clone, Default)]
pub(crate) struct ResolvedChannel {
    meta: Option<SessionMeta>,
}

impl ResolvedChannel {
    pub(crate) fn resolve(&mut self, meta: SessionMeta) {
        self.meta = Some(meta);
    }

    pub(crate) fn is_resolved(&self) -> bool {
        self.meta.is_some()
    }

    /// Channel reference for an event, preferring ids carried by the frame itself.
    pub(crate) fn channel_ref(
        &self,
        platform: Platform,
        frame_channel_id: Option<String>,
        frame_channel_name: Option<String>,
    ) -> ChannelRef {
        let resolved = self.meta.as_ref();
        ChannelRef {
            channel_id: frame_channel_id
                .or_else(|| resolved.map(|m| m.channel_id.clone()))
                .unwrap_or_default(),
            channel_name: frame_channel_name.or_else(|| resolved.and_then(|m| m.channel_name.clone())),
            platform,
        }
    }
}

/// Render a JSON scalar id (string or number) as a string.
pub(crate) fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn timestamp_from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_else(Utc::now)
}

pub(crate) fn timestamp_from_micros(us: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(us).unwrap_or_else(Utc::now)
}
