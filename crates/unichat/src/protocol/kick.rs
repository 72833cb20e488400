//! Kick chat adapter (Pusher protocol).
//!
//! Frames are Pusher envelopes `{event, data, channel}` where `data` is usually a
//! JSON document encoded as a string.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, trace};

use super::{AdapterSignal, ChatProtocol, ResolvedChannel, value_to_id};
use crate::error::{Error, Result};
use crate::event::{
    Author, AuthorType, Badge, Emote, MessageContent, MessagePayload, Platform,
    RemoveAuthorPayload, RemoveMessagePayload, SessionMeta, UniChatEvent, author_color,
};

/// Pusher endpoint used by the kick.com web client.
const KICK_PUSHER_URL: &str = "wss://ws-us2.pusher.com/app/32cbd69e4b950bf97679?protocol=7&client=js&version=8.4.0-rc2&flash=false";

const KICK_EMOTE_URL: &str = "https://files.kick.com/emotes";

static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.)?kick\.com/([A-Za-z0-9_-]+)/?(?:[?#].*)?$").unwrap()
});

static EMOTE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[emote:(\d+):([^\]]+)\]").unwrap());

/// Frame kinds the adapter understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KickFrame {
    ChatMessage,
    MessageDeleted,
    UserBanned,
    SubscriptionSucceeded,
    Ping,
    PusherError,
}

impl KickFrame {
    fn from_event_name(name: &str) -> Option<Self> {
        match name {
            "App\\Events\\ChatMessageEvent" => Some(Self::ChatMessage),
            "App\\Events\\MessageDeletedEvent" => Some(Self::MessageDeleted),
            "App\\Events\\UserBannedEvent" => Some(Self::UserBanned),
            "pusher_internal:subscription_succeeded" => Some(Self::SubscriptionSucceeded),
            "pusher:ping" => Some(Self::Ping),
            "pusher:error" => Some(Self::PusherError),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    channel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessageData {
    id: String,
    #[serde(default)]
    chatroom_id: Option<Value>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    sender: Option<Sender>,
}

#[derive(Debug, Deserialize)]
struct Sender {
    id: Value,
    username: String,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    identity: Option<Identity>,
}

#[derive(Debug, Default, Deserialize)]
struct Identity {
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    badges: Vec<KickBadge>,
}

#[derive(Debug, Deserialize)]
struct KickBadge {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct MessageDeletedData {
    message: MessageRef,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct UserBannedData {
    user: UserRef,
}

#[derive(Debug, Deserialize)]
struct UserRef {
    id: Value,
}

#[derive(Debug, Deserialize)]
struct PusherErrorData {
    #[serde(default)]
    code: Option<u32>,
    #[serde(default)]
    message: Option<String>,
}

/// Kick adapter. Holds the channel resolved by the subscription handshake.
#[derive(Debug, Clone, Default)]
pub struct KickProtocol {
    channel: ResolvedChannel,
}

impl KickProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    fn decode_envelope(&mut self, envelope: Envelope) -> Result<Vec<AdapterSignal>> {
        let Some(kind) = KickFrame::from_event_name(&envelope.event) else {
            trace!(event = %envelope.event, "Ignoring Kick frame");
            return Ok(vec![]);
        };

        let signal = match kind {
            KickFrame::ChatMessage => {
                let data: ChatMessageData = inner_data(envelope.data)?;
                Some(AdapterSignal::Event(self.chat_message(data)))
            }
            KickFrame::MessageDeleted => {
                let data: MessageDeletedData = inner_data(envelope.data)?;
                Some(AdapterSignal::Event(UniChatEvent::RemoveMessage(
                    RemoveMessagePayload {
                        channel: self.channel.channel_ref(Platform::Kick, None, None),
                        message_id: data.message.id,
                        timestamp: Utc::now(),
                    },
                )))
            }
            KickFrame::UserBanned => {
                let data: UserBannedData = inner_data(envelope.data)?;
                let author_id = value_to_id(&data.user.id)
                    .ok_or_else(|| Error::decode("Kick ban without user id"))?;
                Some(AdapterSignal::Event(UniChatEvent::RemoveAuthor(
                    RemoveAuthorPayload {
                        channel: self.channel.channel_ref(Platform::Kick, None, None),
                        author_id,
                        timestamp: Utc::now(),
                    },
                )))
            }
            KickFrame::SubscriptionSucceeded => envelope
                .channel
                .as_deref()
                .and_then(chatroom_id_from_channel)
                .map(|channel_id| {
                    let meta = SessionMeta {
                        platform: Platform::Kick,
                        channel_id,
                        channel_name: None,
                    };
                    self.channel.resolve(meta.clone());
                    AdapterSignal::SetupConfirmed(meta)
                }),
            KickFrame::Ping => Some(AdapterSignal::Reply(
                r#"{"event":"pusher:pong","data":{}}"#.to_string(),
            )),
            KickFrame::PusherError => {
                let data: PusherErrorData = inner_data(envelope.data)?;
                let message = data.message.unwrap_or_else(|| "unknown error".to_string());
                match data.code {
                    // 4000-4099: the connection must not be re-established
                    Some(code @ 4000..=4099) => Some(AdapterSignal::Unrecoverable(format!(
                        "Kick pusher error {code}: {message}"
                    ))),
                    code => Some(AdapterSignal::Fault(format!(
                        "Kick pusher error {}: {message}",
                        code.map(|c| c.to_string()).unwrap_or_else(|| "?".to_string())
                    ))),
                }
            }
        };

        Ok(signal.into_iter().collect())
    }

    fn chat_message(&self, data: ChatMessageData) -> UniChatEvent {
        let (raw, emotes) = parse_emotes(&data.content);
        let timestamp = data
            .created_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        let channel = self.channel.channel_ref(
            Platform::Kick,
            data.chatroom_id.as_ref().and_then(value_to_id),
            None,
        );

        UniChatEvent::Message(MessagePayload {
            channel,
            message_id: data.id,
            author: data.sender.map(sender_to_author).unwrap_or_else(unknown_author),
            message: MessageContent::build(raw, emotes),
            timestamp,
        })
    }
}

/// Parse `data`, which Kick sends either as an encoded JSON string or inline.
fn inner_data<T: DeserializeOwned>(data: Option<Value>) -> Result<T> {
    match data {
        Some(Value::String(encoded)) => Ok(serde_json::from_str(&encoded)?),
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Err(Error::decode("Kick frame without data")),
    }
}

/// `chatrooms.<id>` or `chatrooms.<id>.v2` resolves to `<id>`.
fn chatroom_id_from_channel(channel: &str) -> Option<String> {
    let rest = channel.strip_prefix("chatrooms.")?;
    rest.split('.')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Replace `[emote:<id>:<name>]` tokens with their name and collect the emotes.
fn parse_emotes(content: &str) -> (String, Vec<Emote>) {
    let mut emotes: Vec<Emote> = Vec::new();
    for caps in EMOTE_REGEX.captures_iter(content) {
        let id = &caps[1];
        if emotes.iter().any(|e| e.id == id) {
            continue;
        }
        emotes.push(Emote {
            id: id.to_string(),
            key: caps[2].to_string(),
            url: format!("{KICK_EMOTE_URL}/{id}/fullsize"),
        });
    }
    let raw = EMOTE_REGEX.replace_all(content, "$2").into_owned();
    (raw, emotes)
}

fn sender_to_author(sender: Sender) -> Author {
    let identity = sender.identity.unwrap_or_default();
    let author_type = author_type_from_badges(&identity.badges);
    let badges = identity
        .badges
        .into_iter()
        .map(|b| Badge::new(b.kind, ""))
        .collect();
    let display_color = identity
        .color
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| author_color(&sender.username));

    Author {
        id: value_to_id(&sender.id).unwrap_or_else(|| sender.username.clone()),
        username: Some(sender.slug.unwrap_or_else(|| sender.username.to_lowercase())),
        display_name: sender.username,
        profile_picture_url: None,
        display_color,
        badges,
        author_type,
    }
}

fn unknown_author() -> Author {
    Author {
        id: String::new(),
        username: None,
        display_name: "Unknown".to_string(),
        profile_picture_url: None,
        display_color: author_color(""),
        badges: Vec::new(),
        author_type: AuthorType::Viewer,
    }
}

fn author_type_from_badges(badges: &[KickBadge]) -> AuthorType {
    let has = |kinds: &[&str]| badges.iter().any(|b| kinds.contains(&b.kind.as_str()));
    if has(&["broadcaster"]) {
        AuthorType::Broadcaster
    } else if has(&["moderator"]) {
        AuthorType::Moderator
    } else if has(&["vip"]) {
        AuthorType::Vip
    } else if has(&["subscriber", "founder", "og"]) {
        AuthorType::Sponsor
    } else {
        AuthorType::Viewer
    }
}

#[async_trait]
impl ChatProtocol for KickProtocol {
    fn platform(&self) -> Platform {
        Platform::Kick
    }

    fn supports_url(&self, url: &str) -> bool {
        URL_REGEX.is_match(url)
    }

    fn extract_channel(&self, url: &str) -> Option<String> {
        URL_REGEX
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_lowercase())
    }

    async fn websocket_url(&self, _channel: &str) -> Result<Option<String>> {
        Ok(Some(KICK_PUSHER_URL.to_string()))
    }

    /// `channel` must be the numeric chatroom id.
    async fn handshake_messages(&self, channel: &str) -> Result<Vec<String>> {
        if channel.is_empty() || !channel.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::setup(format!(
                "Kick subscription needs a numeric chatroom id, got '{channel}'"
            )));
        }
        let subscribe = serde_json::json!({
            "event": "pusher:subscribe",
            "data": {
                "auth": "",
                "channel": format!("chatrooms.{channel}.v2"),
            }
        });
        Ok(vec![subscribe.to_string()])
    }

    fn decode_frame(&mut self, frame: &str) -> Result<Vec<AdapterSignal>> {
        let envelope: Envelope = serde_json::from_str(frame)?;
        debug!(event = %envelope.event, "Kick frame");
        self.decode_envelope(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(protocol: &mut KickProtocol, frame: &str) -> Vec<AdapterSignal> {
        protocol.decode_frame(frame).expect("frame should decode")
    }

    #[test]
    fn test_minimal_chat_message() {
        let mut protocol = KickProtocol::new();
        let frame = r#"{"event":"App\\Events\\ChatMessageEvent","data":"{\"id\":\"abc\",\"content\":\"hi\"}"}"#;

        let signals = decode(&mut protocol, frame);
        assert_eq!(signals.len(), 1);
        match &signals[0] {
            AdapterSignal::Event(UniChatEvent::Message(payload)) => {
                assert_eq!(payload.message_id, "abc");
                assert_eq!(payload.message.raw, "hi");
                assert_eq!(payload.channel.platform, Platform::Kick);
            }
            other => panic!("unexpected signal: {other:?}"),
        }
    }

    #[test]
    fn test_full_chat_message() {
        let mut protocol = KickProtocol::new();
        let data = serde_json::json!({
            "id": "m-1",
            "chatroom_id": 555,
            "content": "hello [emote:37226:KEKW] there",
            "type": "message",
            "created_at": "2024-05-01T10:00:00+00:00",
            "sender": {
                "id": 42,
                "username": "SomeUser",
                "slug": "someuser",
                "identity": {
                    "color": "#75FD46",
                    "badges": [
                        {"type": "moderator", "text": "Moderator"},
                        {"type": "subscriber", "text": "Subscriber", "count": 3}
                    ]
                }
            }
        });
        let frame = serde_json::json!({
            "event": "App\\Events\\ChatMessageEvent",
            "data": data.to_string(),
            "channel": "chatrooms.555.v2"
        })
        .to_string();

        let signals = decode(&mut protocol, &frame);
        let AdapterSignal::Event(UniChatEvent::Message(payload)) = &signals[0] else {
            panic!("expected message event");
        };
        assert_eq!(payload.channel.channel_id, "555");
        assert_eq!(payload.author.id, "42");
        assert_eq!(payload.author.display_name, "SomeUser");
        assert_eq!(payload.author.username.as_deref(), Some("someuser"));
        assert_eq!(payload.author.display_color, "#75FD46");
        assert_eq!(payload.author.author_type, AuthorType::Moderator);
        assert_eq!(payload.author.badges.len(), 2);
        assert_eq!(payload.message.raw, "hello KEKW there");
        assert_eq!(payload.message.emotes.len(), 1);
        assert_eq!(
            payload.message.emotes[0].url,
            "https://files.kick.com/emotes/37226/fullsize"
        );
        assert!(payload.message.html.contains("<img src="));
        assert_eq!(payload.timestamp.timestamp(), 1_714_557_600);
    }

    #[test]
    fn test_subscription_succeeded_resolves_channel() {
        let mut protocol = KickProtocol::new();
        let signals = decode(
            &mut protocol,
            r#"{"event":"pusher_internal:subscription_succeeded","channel":"chatrooms.555"}"#,
        );
        assert_eq!(
            signals,
            vec![AdapterSignal::SetupConfirmed(SessionMeta {
                platform: Platform::Kick,
                channel_id: "555".to_string(),
                channel_name: None,
            })]
        );

        // Later events without a chatroom id inherit the resolved channel.
        let signals = decode(
            &mut protocol,
            r#"{"event":"App\\Events\\MessageDeletedEvent","data":"{\"id\":\"x\",\"message\":{\"id\":\"m-1\"}}"}"#,
        );
        let AdapterSignal::Event(UniChatEvent::RemoveMessage(payload)) = &signals[0] else {
            panic!("expected remove message");
        };
        assert_eq!(payload.message_id, "m-1");
        assert_eq!(payload.channel.channel_id, "555");
    }

    #[test]
    fn test_other_subscriptions_are_not_setup() {
        let mut protocol = KickProtocol::new();
        let signals = decode(
            &mut protocol,
            r#"{"event":"pusher_internal:subscription_succeeded","channel":"channel.123"}"#,
        );
        assert!(signals.is_empty());
    }

    #[test]
    fn test_user_banned() {
        let mut protocol = KickProtocol::new();
        let signals = decode(
            &mut protocol,
            r#"{"event":"App\\Events\\UserBannedEvent","data":{"id":"b","user":{"id":77,"username":"x","slug":"x"}}}"#,
        );
        let AdapterSignal::Event(UniChatEvent::RemoveAuthor(payload)) = &signals[0] else {
            panic!("expected remove author");
        };
        assert_eq!(payload.author_id, "77");
    }

    #[test]
    fn test_ping_replies_pong() {
        let mut protocol = KickProtocol::new();
        let signals = decode(&mut protocol, r#"{"event":"pusher:ping","data":{}}"#);
        assert_eq!(
            signals,
            vec![AdapterSignal::Reply(
                r#"{"event":"pusher:pong","data":{}}"#.to_string()
            )]
        );
    }

    #[test]
    fn test_unknown_event_is_ignored() {
        let mut protocol = KickProtocol::new();
        let signals = decode(
            &mut protocol,
            r#"{"event":"App\\Events\\PinnedMessageCreatedEvent","data":"not even json"}"#,
        );
        assert!(signals.is_empty());
    }

    #[test]
    fn test_malformed_inner_data_is_an_error() {
        let mut protocol = KickProtocol::new();
        let result =
            protocol.decode_frame(r#"{"event":"App\\Events\\ChatMessageEvent","data":"{oops"}"#);
        assert!(result.is_err());
        assert!(result.unwrap_err().is_frame_local());
    }

    #[test]
    fn test_pusher_error_classification() {
        let mut protocol = KickProtocol::new();
        let signals = decode(
            &mut protocol,
            r#"{"event":"pusher:error","data":{"code":4001,"message":"App disabled"}}"#,
        );
        assert!(matches!(signals[0], AdapterSignal::Unrecoverable(_)));

        let signals = decode(
            &mut protocol,
            r#"{"event":"pusher:error","data":{"code":4201,"message":"Pong reply not received"}}"#,
        );
        assert!(matches!(signals[0], AdapterSignal::Fault(_)));
    }

    #[test]
    fn test_url_handling() {
        let protocol = KickProtocol::new();
        assert!(protocol.supports_url("https://kick.com/xqc"));
        assert!(protocol.supports_url("kick.com/some_user"));
        assert!(!protocol.supports_url("https://www.twitch.tv/xqc"));
        assert_eq!(
            protocol.extract_channel("https://kick.com/XQC?x=1"),
            Some("xqc".to_string())
        );
    }

    #[tokio::test]
    async fn test_handshake_subscribes_to_chatroom() {
        let protocol = KickProtocol::new();
        let messages = protocol.handshake_messages("555").await.unwrap();
        let value: Value = serde_json::from_str(&messages[0]).unwrap();
        assert_eq!(value["event"], "pusher:subscribe");
        assert_eq!(value["data"]["channel"], "chatrooms.555.v2");

        assert!(protocol.handshake_messages("xqc").await.is_err());
    }
}
