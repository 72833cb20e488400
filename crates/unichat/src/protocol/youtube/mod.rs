//! YouTube live chat adapter.
//!
//! YouTube has no chat socket: the host feeds innertube JSON documents as
//! frames. The page's initial data carries the continuation token that names
//! the channel; every later `get_live_chat` response carries a batch of actions.

mod continuation;
mod mapper;
mod structs;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, warn};

use super::{AdapterSignal, ChatProtocol, ResolvedChannel};
use crate::error::{Error, Result};
use crate::event::{Platform, SessionMeta};

pub use continuation::{channel_id_from_continuation, is_valid_channel_id};

static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:https?://)?(?:(?:www|m)\.)?(?:youtube\.com/(?:(?:watch|live_chat)\?(?:[^#]*&)?v=|live/|shorts/)|youtu\.be/)([0-9A-Za-z_-]{10}[048AEIMQUYcgkosw])(?:[?&#/].*)?$",
    )
    .unwrap()
});

#[derive(Debug, Clone, Default)]
pub struct YouTubeProtocol {
    channel: ResolvedChannel,
}

impl YouTubeProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continuation token of the initial data document, if this is one.
    fn initial_continuation(document: &Value) -> Option<&str> {
        let continuation = document
            .pointer("/contents/liveChatRenderer/continuations/0")?;
        continuation
            .pointer("/timedContinuationData/continuation")
            .or_else(|| continuation.pointer("/invalidationContinuationData/continuation"))
            .and_then(Value::as_str)
    }

    fn setup(&mut self, token: &str) -> Result<AdapterSignal> {
        let channel_id = channel_id_from_continuation(token)?;
        debug!(channel_id = %channel_id, "YouTube live chat resolved");
        let meta = SessionMeta {
            platform: Platform::YouTube,
            channel_id,
            channel_name: None,
        };
        self.channel.resolve(meta.clone());
        Ok(AdapterSignal::SetupConfirmed(meta))
    }
}

#[async_trait]
impl ChatProtocol for YouTubeProtocol {
    fn platform(&self) -> Platform {
        Platform::YouTube
    }

    fn supports_url(&self, url: &str) -> bool {
        URL_REGEX.is_match(url)
    }

    /// The "channel" of a YouTube page is its video id.
    fn extract_channel(&self, url: &str) -> Option<String> {
        URL_REGEX
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    fn decode_frame(&mut self, frame: &str) -> Result<Vec<AdapterSignal>> {
        let document: Value = serde_json::from_str(frame)?;
        if !document.is_object() {
            return Err(Error::decode("YouTube frame is not a JSON object"));
        }

        if let Some(token) = Self::initial_continuation(&document) {
            return Ok(vec![self.setup(token)?]);
        }

        let Some(actions) = document
            .pointer("/continuationContents/liveChatContinuation/actions")
            .and_then(Value::as_array)
        else {
            return Ok(vec![]);
        };

        if !self.channel.is_resolved() {
            debug!("YouTube actions before the channel was resolved");
        }
        let channel = self.channel.channel_ref(Platform::YouTube, None, None);

        let mut signals = Vec::with_capacity(actions.len());
        for action in actions {
            match mapper::action(action, &channel) {
                Ok(Some(event)) => signals.push(AdapterSignal::Event(event)),
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "Failed to map YouTube action");
                    signals.push(AdapterSignal::Fault(e.to_string()));
                }
            }
        }
        Ok(signals)
    }
}
