//! Canonical event model.
//!
//! Every platform adapter writes these types and every sink reads them. On the
//! wire an event is `{"type": "unichat:<kind>", "detail": {...}}`, with
//! camelCase payload fields.

mod content;
mod status;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use content::{MessageContent, author_color, escape_html};
pub use status::{ScraperStatus, SessionMeta, StatusKind};

/// Streaming platform an event originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "twitch")]
    Twitch,
    #[serde(rename = "kick")]
    Kick,
    #[serde(rename = "youtube")]
    YouTube,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Twitch, Platform::Kick, Platform::YouTube];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitch => "twitch",
            Platform::Kick => "kick",
            Platform::YouTube => "youtube",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "twitch" => Ok(Platform::Twitch),
            "kick" => Ok(Platform::Kick),
            "youtube" => Ok(Platform::YouTube),
            other => Err(crate::Error::other(format!("Unknown platform: {other}"))),
        }
    }
}

/// Role of a chat author, highest privilege wins when several apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorType {
    #[default]
    Viewer,
    #[serde(alias = "SUBSCRIBER", alias = "MEMBER")]
    Sponsor,
    Vip,
    Moderator,
    Broadcaster,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    /// Badge type, e.g. `moderator` or `subscriber/12`.
    pub code: String,
    /// Image url; empty when the platform does not expose one.
    pub url: String,
}

impl Badge {
    pub fn new(code: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emote {
    pub id: String,
    /// Word in the message text that this emote replaces.
    pub key: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    pub display_name: String,
    #[serde(default)]
    pub profile_picture_url: Option<String>,
    pub display_color: String,
    #[serde(default)]
    pub badges: Vec<Badge>,
    #[serde(rename = "type", default)]
    pub author_type: AuthorType,
}

/// Identifies the session an event came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRef {
    pub channel_id: String,
    #[serde(default)]
    pub channel_name: Option<String>,
    pub platform: Platform,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    #[serde(flatten)]
    pub channel: ChannelRef,
    pub message_id: String,
    pub author: Author,
    pub message: MessageContent,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveMessagePayload {
    #[serde(flatten)]
    pub channel: ChannelRef,
    pub message_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveAuthorPayload {
    #[serde(flatten)]
    pub channel: ChannelRef,
    pub author_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaidPayload {
    #[serde(flatten)]
    pub channel: ChannelRef,
    pub message_id: String,
    pub author: Author,
    #[serde(default)]
    pub viewer_count: Option<u32>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorPayload {
    #[serde(flatten)]
    pub channel: ChannelRef,
    pub message_id: String,
    pub author: Author,
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub tier_name: Option<String>,
    pub months: u32,
    #[serde(default)]
    pub message: Option<MessageContent>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorGiftPayload {
    #[serde(flatten)]
    pub channel: ChannelRef,
    pub message_id: String,
    pub author: Author,
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub tier_name: Option<String>,
    pub count: u32,
    #[serde(default)]
    pub message: Option<MessageContent>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonatePayload {
    #[serde(flatten)]
    pub channel: ChannelRef,
    pub message_id: String,
    pub author: Author,
    pub value: f64,
    pub currency: String,
    #[serde(default)]
    pub message: Option<MessageContent>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

/// Discriminant of [`UniChatEvent`], usable without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Message,
    RemoveMessage,
    RemoveAuthor,
    Raid,
    Sponsor,
    SponsorGift,
    Donate,
}

impl EventKind {
    /// Value of the `type` field on the wire.
    pub fn wire_name(&self) -> &'static str {
        match self {
            EventKind::Message => "unichat:message",
            EventKind::RemoveMessage => "unichat:remove_message",
            EventKind::RemoveAuthor => "unichat:remove_user",
            EventKind::Raid => "unichat:raid",
            EventKind::Sponsor => "unichat:sponsor",
            EventKind::SponsorGift => "unichat:sponsor_gift",
            EventKind::Donate => "unichat:donate",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// A platform-independent chat occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum UniChatEvent {
    #[serde(rename = "unichat:message")]
    Message(MessagePayload),
    #[serde(rename = "unichat:remove_message")]
    RemoveMessage(RemoveMessagePayload),
    #[serde(rename = "unichat:remove_user")]
    RemoveAuthor(RemoveAuthorPayload),
    #[serde(rename = "unichat:raid")]
    Raid(RaidPayload),
    #[serde(rename = "unichat:sponsor")]
    Sponsor(SponsorPayload),
    #[serde(rename = "unichat:sponsor_gift")]
    SponsorGift(SponsorGiftPayload),
    #[serde(rename = "unichat:donate")]
    Donate(DonatePayload),
}

impl UniChatEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            UniChatEvent::Message(_) => EventKind::Message,
            UniChatEvent::RemoveMessage(_) => EventKind::RemoveMessage,
            UniChatEvent::RemoveAuthor(_) => EventKind::RemoveAuthor,
            UniChatEvent::Raid(_) => EventKind::Raid,
            UniChatEvent::Sponsor(_) => EventKind::Sponsor,
            UniChatEvent::SponsorGift(_) => EventKind::SponsorGift,
            UniChatEvent::Donate(_) => EventKind::Donate,
        }
    }

    pub fn channel(&self) -> &ChannelRef {
        match self {
            UniChatEvent::Message(p) => &p.channel,
            UniChatEvent::RemoveMessage(p) => &p.channel,
            UniChatEvent::RemoveAuthor(p) => &p.channel,
            UniChatEvent::Raid(p) => &p.channel,
            UniChatEvent::Sponsor(p) => &p.channel,
            UniChatEvent::SponsorGift(p) => &p.channel,
            UniChatEvent::Donate(p) => &p.channel,
        }
    }

    pub fn platform(&self) -> Platform {
        self.channel().platform
    }

    /// Id of the chat item this event creates or removes.
    pub fn message_id(&self) -> Option<&str> {
        match self {
            UniChatEvent::Message(p) => Some(&p.message_id),
            UniChatEvent::RemoveMessage(p) => Some(&p.message_id),
            UniChatEvent::RemoveAuthor(_) => None,
            UniChatEvent::Raid(p) => Some(&p.message_id),
            UniChatEvent::Sponsor(p) => Some(&p.message_id),
            UniChatEvent::SponsorGift(p) => Some(&p.message_id),
            UniChatEvent::Donate(p) => Some(&p.message_id),
        }
    }

    pub fn author(&self) -> Option<&Author> {
        match self {
            UniChatEvent::Message(p) => Some(&p.author),
            UniChatEvent::Raid(p) => Some(&p.author),
            UniChatEvent::Sponsor(p) => Some(&p.author),
            UniChatEvent::SponsorGift(p) => Some(&p.author),
            UniChatEvent::Donate(p) => Some(&p.author),
            UniChatEvent::RemoveMessage(_) | UniChatEvent::RemoveAuthor(_) => None,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            UniChatEvent::Message(p) => p.timestamp,
            UniChatEvent::RemoveMessage(p) => p.timestamp,
            UniChatEvent::RemoveAuthor(p) => p.timestamp,
            UniChatEvent::Raid(p) => p.timestamp,
            UniChatEvent::Sponsor(p) => p.timestamp,
            UniChatEvent::SponsorGift(p) => p.timestamp,
            UniChatEvent::Donate(p) => p.timestamp,
        }
    }

    /// Serialize to the `{type, detail}` wire shape.
    pub fn to_wire(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
