//! IRC message to canonical event mapping.

use chrono::Utc;

use super::catalog::TwitchCatalog;
use super::irc::IrcMessage;
use crate::error::{Error, Result};
use crate::event::{
    Author, AuthorType, ChannelRef, DonatePayload, Emote, MessageContent, MessagePayload,
    Platform, RaidPayload, RemoveAuthorPayload, RemoveMessagePayload, SponsorGiftPayload,
    SponsorPayload, UniChatEvent, author_color,
};
use crate::protocol::timestamp_from_millis;

const TWITCH_EMOTE_URL: &str = "https://static-cdn.jtvnw.net/emoticons/v2";

/// Most cheer amounts a single cheermote word can carry.
const MAX_CHEER_AMOUNT: u32 = 100_000;

fn required<'a>(msg: &'a IrcMessage, tag: &str) -> Result<&'a str> {
    msg.tag(tag)
        .ok_or_else(|| Error::decode(format!("Twitch {} without {tag} tag", msg.command)))
}

fn channel_ref(msg: &IrcMessage) -> Result<ChannelRef> {
    Ok(ChannelRef {
        channel_id: required(msg, "room-id")?.to_string(),
        channel_name: msg.channel().map(str::to_string),
        platform: Platform::Twitch,
    })
}

fn timestamp(msg: &IrcMessage) -> chrono::DateTime<Utc> {
    msg.tag("tmi-sent-ts")
        .and_then(|ts| ts.parse::<i64>().ok())
        .map(timestamp_from_millis)
        .unwrap_or_else(Utc::now)
}

/// Highest role named in the `badges` tag.
fn author_type(badges: Option<&str>) -> AuthorType {
    let Some(badges) = badges else {
        return AuthorType::Viewer;
    };
    let has = |set: &str| badges.split(',').any(|b| b.split('/').next() == Some(set));
    if has("broadcaster") {
        AuthorType::Broadcaster
    } else if has("moderator") {
        AuthorType::Moderator
    } else if has("vip") {
        AuthorType::Vip
    } else if has("subscriber") || has("founder") {
        AuthorType::Sponsor
    } else {
        AuthorType::Viewer
    }
}

/// Author from the message tags; USERNOTICE carries the login in a tag
/// instead of the prefix.
fn author(msg: &IrcMessage, catalog: &TwitchCatalog) -> Result<Author> {
    let id = required(msg, "user-id")?.to_string();
    let username = msg
        .tag("login")
        .or_else(|| msg.nick())
        .map(str::to_string);
    let display_name = msg
        .tag("display-name")
        .map(str::to_string)
        .or_else(|| username.clone())
        .ok_or_else(|| Error::decode("Twitch message without author name"))?;
    let display_color = msg
        .tag("color")
        .map(str::to_string)
        .unwrap_or_else(|| author_color(username.as_deref().unwrap_or(&display_name)));

    Ok(Author {
        id,
        username,
        display_name,
        profile_picture_url: None,
        display_color,
        badges: catalog.badges_for(msg.tag("badges")),
        author_type: author_type(msg.tag("badges")),
    })
}

/// Strip the CTCP wrapper of `/me` messages.
fn normalize_text(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed
        .strip_prefix("\u{1}ACTION ")
        .and_then(|s| s.strip_suffix('\u{1}'))
    {
        Some(action) => action.to_string(),
        None => trimmed.to_string(),
    }
}

/// Emotes from the `emotes` tag (`id:start-end,start-end/id:...`).
///
/// Positions count code points of the normalized text.
fn parse_emotes(tag: Option<&str>, text: &str) -> Result<Vec<Emote>> {
    let Some(tag) = tag else {
        return Ok(Vec::new());
    };
    let chars: Vec<char> = text.chars().collect();
    let mut emotes = Vec::new();

    for raw in tag.split('/').filter(|s| !s.trim().is_empty()) {
        let (id, positions) = raw
            .split_once(':')
            .ok_or_else(|| Error::decode(format!("Invalid emote entry '{raw}'")))?;
        let first = positions.split(',').next().unwrap_or_default();
        let (start, end) = first
            .split_once('-')
            .and_then(|(s, e)| Some((s.parse::<usize>().ok()?, e.parse::<usize>().ok()?)))
            .ok_or_else(|| Error::decode(format!("Invalid emote positions '{positions}'")))?;
        if start > end || end >= chars.len() {
            return Err(Error::decode(format!(
                "Emote {id} range {start}-{end} is outside the message"
            )));
        }

        emotes.push(Emote {
            id: id.to_string(),
            key: chars[start..=end].iter().collect(),
            url: format!("{TWITCH_EMOTE_URL}/{id}/default/dark/3.0"),
        });
    }

    Ok(emotes)
}

/// Remove cheermote words (`Cheer100`) from the text.
fn strip_cheermotes(text: &str, catalog: &TwitchCatalog) -> String {
    text.split(' ')
        .filter(|word| {
            let split = word
                .find(|c: char| c.is_ascii_digit())
                .unwrap_or(word.len());
            let (prefix, amount) = word.split_at(split);
            let amount: u32 = amount.parse().unwrap_or(0);
            !(catalog.is_cheermote(prefix) && (1..=MAX_CHEER_AMOUNT).contains(&amount))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn message_content(msg: &IrcMessage, catalog: &TwitchCatalog) -> Result<Option<MessageContent>> {
    let Some(raw) = msg.param(1) else {
        return Ok(None);
    };
    let text = normalize_text(raw);
    if text.is_empty() {
        return Ok(None);
    }
    let emotes = parse_emotes(msg.tag("emotes"), &text)?;
    let text = strip_cheermotes(&text, catalog);
    Ok(Some(MessageContent::build(text, emotes)))
}

/// `1000`/`2000`/`3000` to `T1`/`T2`/`T3`; other plans pass through.
pub(crate) fn tier_name(plan: &str) -> String {
    match plan {
        "1000" => "T1".to_string(),
        "2000" => "T2".to_string(),
        "3000" => "T3".to_string(),
        other => other.to_string(),
    }
}

pub(super) fn privmsg(msg: &IrcMessage, catalog: &TwitchCatalog) -> Result<Option<UniChatEvent>> {
    let channel = channel_ref(msg)?;
    let message_id = required(msg, "id")?.to_string();
    let author = author(msg, catalog)?;
    let content = message_content(msg, catalog)?;
    let timestamp = timestamp(msg);

    if let Some(bits) = msg.tag("bits") {
        let value: u32 = bits
            .parse()
            .map_err(|_| Error::decode(format!("Invalid bits amount '{bits}'")))?;
        return Ok(Some(UniChatEvent::Donate(DonatePayload {
            channel,
            message_id,
            author,
            value: f64::from(value),
            currency: "Bits".to_string(),
            message: content.filter(|c| !c.is_empty()),
            timestamp,
        })));
    }

    Ok(Some(UniChatEvent::Message(MessagePayload {
        channel,
        message_id,
        author,
        message: content.unwrap_or_else(|| MessageContent::build("", Vec::new())),
        timestamp,
    })))
}

pub(super) fn clearmsg(msg: &IrcMessage) -> Result<Option<UniChatEvent>> {
    Ok(Some(UniChatEvent::RemoveMessage(RemoveMessagePayload {
        channel: channel_ref(msg)?,
        message_id: required(msg, "target-msg-id")?.to_string(),
        timestamp: timestamp(msg),
    })))
}

/// Only user-targeted clears map to an event; full chat clears are ignored.
pub(super) fn clearchat(msg: &IrcMessage) -> Result<Option<UniChatEvent>> {
    let Some(author_id) = msg.tag("target-user-id") else {
        return Ok(None);
    };
    Ok(Some(UniChatEvent::RemoveAuthor(RemoveAuthorPayload {
        channel: channel_ref(msg)?,
        author_id: author_id.to_string(),
        timestamp: timestamp(msg),
    })))
}

/// Notice kinds carried by USERNOTICE `msg-id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NoticeKind {
    Raid,
    Subscription,
    MysteryGift,
    SubGift,
    Announcement,
}

impl NoticeKind {
    fn from_msg_id(id: &str) -> Option<Self> {
        match id {
            "raid" => Some(Self::Raid),
            "sub" | "resub" => Some(Self::Subscription),
            "submysterygift" => Some(Self::MysteryGift),
            "subgift" => Some(Self::SubGift),
            "announcement" => Some(Self::Announcement),
            _ => None,
        }
    }
}

pub(super) fn usernotice(
    msg: &IrcMessage,
    catalog: &TwitchCatalog,
) -> Result<Option<UniChatEvent>> {
    let Some(kind) = msg.tag("msg-id").and_then(NoticeKind::from_msg_id) else {
        return Ok(None);
    };

    let channel = channel_ref(msg)?;
    let message_id = required(msg, "id")?.to_string();
    let timestamp = timestamp(msg);

    let event = match kind {
        NoticeKind::Raid => {
            let mut author = author(msg, catalog)?;
            author.profile_picture_url = msg.tag("msg-param-profileImageURL").map(str::to_string);
            if let Some(name) = msg.tag("msg-param-displayName") {
                author.display_name = name.to_string();
            }
            let viewer_count = msg
                .tag("msg-param-viewerCount")
                .and_then(|v| v.parse::<u32>().ok());
            UniChatEvent::Raid(RaidPayload {
                channel,
                message_id,
                author,
                viewer_count,
                timestamp,
            })
        }
        NoticeKind::Subscription => {
            let tier = required(msg, "msg-param-sub-plan")?.to_string();
            let months = msg
                .tag("msg-param-cumulative-months")
                .or_else(|| msg.tag("msg-param-months"))
                .and_then(|m| m.parse::<u32>().ok())
                .filter(|m| *m > 0)
                .unwrap_or(1);
            UniChatEvent::Sponsor(SponsorPayload {
                channel,
                message_id,
                author: author(msg, catalog)?,
                tier_name: Some(tier_name(&tier)),
                tier: Some(tier),
                months,
                message: message_content(msg, catalog)?,
                timestamp,
            })
        }
        NoticeKind::MysteryGift => {
            let tier = msg.tag("msg-param-sub-plan").map(str::to_string);
            let count = required(msg, "msg-param-mass-gift-count")?
                .parse::<u32>()
                .map_err(|e| Error::decode(format!("Invalid gift count: {e}")))?;
            UniChatEvent::SponsorGift(SponsorGiftPayload {
                channel,
                message_id,
                author: author(msg, catalog)?,
                tier_name: tier.as_deref().map(tier_name),
                tier,
                count,
                message: None,
                timestamp,
            })
        }
        NoticeKind::SubGift => {
            // Gifts that are part of a mystery gift were already counted by it.
            if msg.tag("msg-param-community-gift-id").is_some() {
                return Ok(None);
            }
            let tier = msg.tag("msg-param-sub-plan").map(str::to_string);
            UniChatEvent::SponsorGift(SponsorGiftPayload {
                channel,
                message_id,
                author: author(msg, catalog)?,
                tier_name: tier.as_deref().map(tier_name),
                tier,
                count: 1,
                message: None,
                timestamp,
            })
        }
        NoticeKind::Announcement => UniChatEvent::Message(MessagePayload {
            channel,
            message_id,
            author: author(msg, catalog)?,
            message: message_content(msg, catalog)?
                .unwrap_or_else(|| MessageContent::build("", Vec::new())),
            timestamp,
        }),
    };

    Ok(Some(event))
}
