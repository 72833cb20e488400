//! Innertube action to canonical event mapping.

use chrono::Utc;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::LazyLock;

use super::structs::{
    AuthorBadgeRenderer, AuthorFields, Emoji, GiftPurchaseRenderer, LiveChatBannerRenderer,
    MembershipItemRenderer, PaidMessageRenderer, PaidStickerRenderer, RemoveChatItemAction,
    RemoveChatItemByAuthorAction, Run, Runs, TextMessageRenderer,
};
use crate::error::{Error, Result};
use crate::event::{
    Author, AuthorType, Badge, ChannelRef, DonatePayload, Emote, MessageContent, MessagePayload,
    RaidPayload, RemoveAuthorPayload, RemoveMessagePayload, SponsorGiftPayload, SponsorPayload,
    UniChatEvent, author_color,
};
use crate::protocol::timestamp_from_micros;

static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.-]{3,30}$").unwrap());

static NUMBER_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Banner type of an incoming raid.
const RAID_BANNER_TYPE: &str = "LIVE_CHAT_BANNER_TYPE_CROSS_CHANNEL_REDIRECT";

/// Action kinds the adapter understands, keyed by their envelope field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActionKind {
    AddChatItem,
    RemoveChatItem,
    RemoveChatItemByAuthor,
    AddBanner,
}

impl ActionKind {
    const ALL: [(&'static str, ActionKind); 4] = [
        ("addChatItemAction", ActionKind::AddChatItem),
        ("removeChatItemAction", ActionKind::RemoveChatItem),
        ("removeChatItemByAuthorAction", ActionKind::RemoveChatItemByAuthor),
        ("addBannerToLiveChatCommand", ActionKind::AddBanner),
    ];

    fn find(action: &Map<String, Value>) -> Option<(Self, &Value)> {
        Self::ALL
            .iter()
            .find_map(|(key, kind)| action.get(*key).map(|value| (*kind, value)))
    }
}

/// Chat item renderers carried by `addChatItemAction.item`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RendererKind {
    TextMessage,
    PaidMessage,
    PaidSticker,
    Membership,
    GiftPurchase,
}

impl RendererKind {
    const ALL: [(&'static str, RendererKind); 5] = [
        ("liveChatTextMessageRenderer", RendererKind::TextMessage),
        ("liveChatPaidMessageRenderer", RendererKind::PaidMessage),
        ("liveChatPaidStickerRenderer", RendererKind::PaidSticker),
        ("liveChatMembershipItemRenderer", RendererKind::Membership),
        (
            "liveChatSponsorshipsGiftPurchaseAnnouncementRenderer",
            RendererKind::GiftPurchase,
        ),
    ];

    fn find(item: &Map<String, Value>) -> Option<(Self, &Value)> {
        Self::ALL
            .iter()
            .find_map(|(key, kind)| item.get(*key).map(|value| (*kind, value)))
    }
}

fn parse<T: DeserializeOwned>(value: &Value, what: &str) -> Result<T> {
    T::deserialize(value).map_err(|e| Error::decode(format!("Invalid YouTube {what}: {e}")))
}

fn timestamp(usec: &str) -> Result<chrono::DateTime<Utc>> {
    usec.parse::<i64>()
        .map(timestamp_from_micros)
        .map_err(|_| Error::decode(format!("Invalid timestampUsec '{usec}'")))
}

/// Map one live chat action. Unknown actions and renderers yield `None`.
pub(super) fn action(action: &Value, channel: &ChannelRef) -> Result<Option<UniChatEvent>> {
    let Some(action) = action.as_object() else {
        return Err(Error::decode("YouTube action is not an object"));
    };
    let Some((kind, value)) = ActionKind::find(action) else {
        return Ok(None);
    };

    match kind {
        ActionKind::AddChatItem => {
            let item = value
                .get("item")
                .and_then(Value::as_object)
                .ok_or_else(|| Error::decode("addChatItemAction without item"))?;
            let Some((renderer, value)) = RendererKind::find(item) else {
                return Ok(None);
            };
            let channel = channel.clone();
            let event = match renderer {
                RendererKind::TextMessage => text_message(parse(value, "text message")?, channel)?,
                RendererKind::PaidMessage => paid_message(parse(value, "paid message")?, channel)?,
                RendererKind::PaidSticker => paid_sticker(parse(value, "paid sticker")?, channel)?,
                RendererKind::Membership => membership(parse(value, "membership")?, channel)?,
                RendererKind::GiftPurchase => gift_purchase(parse(value, "gift purchase")?, channel)?,
            };
            Ok(Some(event))
        }
        ActionKind::RemoveChatItem => {
            let removed: RemoveChatItemAction = parse(value, "remove action")?;
            Ok(Some(UniChatEvent::RemoveMessage(RemoveMessagePayload {
                channel: channel.clone(),
                message_id: removed.target_item_id,
                timestamp: Utc::now(),
            })))
        }
        ActionKind::RemoveChatItemByAuthor => {
            let removed: RemoveChatItemByAuthorAction = parse(value, "remove by author action")?;
            Ok(Some(UniChatEvent::RemoveAuthor(RemoveAuthorPayload {
                channel: channel.clone(),
                author_id: removed.external_channel_id,
                timestamp: Utc::now(),
            })))
        }
        ActionKind::AddBanner => {
            let banner = value
                .get("bannerRenderer")
                .ok_or_else(|| Error::decode("addBannerToLiveChatCommand without bannerRenderer"))?;
            match banner.get("liveChatBannerRenderer") {
                Some(value) => raid_banner(parse(value, "banner")?, channel.clone()),
                None => Ok(None),
            }
        }
    }
}

fn text_message(renderer: TextMessageRenderer, channel: ChannelRef) -> Result<UniChatEvent> {
    Ok(UniChatEvent::Message(MessagePayload {
        channel,
        author: author(renderer.author_external_channel_id, &renderer.author)?,
        message: content(&renderer.message)?,
        timestamp: timestamp(&renderer.timestamp_usec)?,
        message_id: renderer.id,
    }))
}

fn paid_message(renderer: PaidMessageRenderer, channel: ChannelRef) -> Result<UniChatEvent> {
    let (currency, value) = parse_amount(&renderer.purchase_amount_text.simple_text)?;
    let message = renderer.message.as_ref().map(content).transpose()?;

    Ok(UniChatEvent::Donate(DonatePayload {
        channel,
        author: author(renderer.author_external_channel_id, &renderer.author)?,
        value,
        currency,
        message,
        timestamp: timestamp(&renderer.timestamp_usec)?,
        message_id: renderer.id,
    }))
}

fn paid_sticker(renderer: PaidStickerRenderer, channel: ChannelRef) -> Result<UniChatEvent> {
    let (currency, value) = parse_amount(&renderer.purchase_amount_text.simple_text)?;
    let sticker = renderer
        .sticker
        .largest()
        .ok_or_else(|| Error::decode("Paid sticker without image"))?;
    let emote = Emote {
        id: "sticker".to_string(),
        key: "sticker".to_string(),
        url: sticker.to_string(),
    };

    Ok(UniChatEvent::Donate(DonatePayload {
        channel,
        author: author(renderer.author_external_channel_id, &renderer.author)?,
        value,
        currency,
        message: Some(MessageContent::build("sticker", vec![emote])),
        timestamp: timestamp(&renderer.timestamp_usec)?,
        message_id: renderer.id,
    }))
}

fn membership(renderer: MembershipItemRenderer, channel: ChannelRef) -> Result<UniChatEvent> {
    let tier = membership_tier(&renderer)?;
    let months = membership_months(&renderer)?;
    let message = renderer.message.as_ref().map(content).transpose()?;

    Ok(UniChatEvent::Sponsor(SponsorPayload {
        channel,
        author: author(renderer.author_external_channel_id, &renderer.author)?,
        tier_name: tier.clone(),
        tier,
        months,
        message,
        timestamp: timestamp(&renderer.timestamp_usec)?,
        message_id: renderer.id,
    }))
}

fn membership_tier(renderer: &MembershipItemRenderer) -> Result<Option<String>> {
    let Some(subtext) = &renderer.header_subtext else {
        return Ok(None);
    };
    if let Some(text) = &subtext.simple_text {
        return Ok(Some(text.clone()));
    }
    match &subtext.runs {
        Some(runs) => runs
            .get(1)
            .and_then(Run::text)
            .map(|t| Some(t.to_string()))
            .ok_or_else(|| Error::decode("Membership welcome without tier run")),
        None => Ok(None),
    }
}

/// Renewals spell the month count in the primary header; a welcome line
/// without it is the first month.
fn membership_months(renderer: &MembershipItemRenderer) -> Result<u32> {
    if let Some(header) = &renderer.header_primary_text {
        let text = header
            .runs
            .get(1)
            .or_else(|| header.runs.first())
            .and_then(Run::text)
            .ok_or_else(|| Error::decode("Membership header without text run"))?;
        let months = NUMBER_REGEX
            .find(text.trim())
            .ok_or_else(|| Error::decode(format!("No month count in '{text}'")))?;
        return months
            .as_str()
            .parse()
            .map_err(|e| Error::decode(format!("Invalid month count: {e}")));
    }
    Ok(1)
}

fn gift_purchase(renderer: GiftPurchaseRenderer, channel: ChannelRef) -> Result<UniChatEvent> {
    let header = renderer.header.live_chat_sponsorships_header_renderer;
    let count = header
        .primary_text
        .runs
        .get(1)
        .and_then(Run::text)
        .ok_or_else(|| Error::decode("Gift purchase without count run"))?;
    let count = count
        .trim()
        .parse::<u32>()
        .map_err(|e| Error::decode(format!("Invalid gift count '{count}': {e}")))?;

    Ok(UniChatEvent::SponsorGift(SponsorGiftPayload {
        channel,
        author: author(renderer.author_external_channel_id, &header.author)?,
        tier: None,
        tier_name: None,
        count,
        message: None,
        timestamp: timestamp(&renderer.timestamp_usec)?,
        message_id: renderer.id,
    }))
}

/// Pinned banners are only mapped when they announce an incoming raid.
fn raid_banner(
    renderer: LiveChatBannerRenderer,
    channel: ChannelRef,
) -> Result<Option<UniChatEvent>> {
    if renderer.banner_type != RAID_BANNER_TYPE {
        return Ok(None);
    }
    let Some(redirect) = renderer.contents.live_chat_banner_redirect_renderer else {
        return Ok(None);
    };
    let first = redirect
        .banner_message
        .runs
        .first()
        .ok_or_else(|| Error::decode("Raid banner without message runs"))?;
    if first.bold.is_none() {
        return Ok(None);
    }

    let (display_name, username) = names(&first.text);
    // The banner carries no channel id for the raider.
    let author = Author {
        id: display_name.clone(),
        username,
        display_color: author_color(&display_name),
        profile_picture_url: redirect.author_photo.largest().map(str::to_string),
        badges: vec![],
        author_type: AuthorType::Viewer,
        display_name,
    };

    Ok(Some(UniChatEvent::Raid(RaidPayload {
        channel,
        message_id: renderer.action_id,
        author,
        viewer_count: None,
        timestamp: Utc::now(),
    })))
}

/// Display name without the handle `@`, and the username when it is a valid handle.
fn names(raw: &str) -> (String, Option<String>) {
    let name = raw.trim();
    let display_name = name.strip_prefix('@').unwrap_or(name).to_string();
    let username = USERNAME_REGEX
        .is_match(&display_name)
        .then(|| display_name.clone());
    (display_name, username)
}

fn author(id: String, fields: &AuthorFields) -> Result<Author> {
    let (display_name, username) = names(&fields.author_name.simple_text);

    Ok(Author {
        id,
        username,
        display_color: author_color(&display_name),
        profile_picture_url: fields.author_photo.largest().map(str::to_string),
        badges: badges(fields)?,
        author_type: author_type(fields),
        display_name,
    })
}

fn badges(fields: &AuthorFields) -> Result<Vec<Badge>> {
    let mut badges = Vec::new();
    for badge in &fields.author_badges {
        match &badge.live_chat_author_badge_renderer {
            AuthorBadgeRenderer::Custom { custom_thumbnail } => {
                let url = custom_thumbnail
                    .largest()
                    .ok_or_else(|| Error::decode("Member badge without image"))?;
                badges.push(Badge::new("sponsor", url));
            }
            AuthorBadgeRenderer::Internal { icon } => {
                let code = match icon.icon_type.as_str() {
                    "OWNER" => "broadcaster",
                    "MODERATOR" => "moderator",
                    "VERIFIED" => "verified",
                    "VERIFIED_ARTIST" => "verified-artist",
                    _ => continue,
                };
                // Built-in icons have no image url.
                badges.push(Badge::new(code, ""));
            }
        }
    }
    Ok(badges)
}

fn author_type(fields: &AuthorFields) -> AuthorType {
    let has_icon = |icon_type: &str| {
        fields.author_badges.iter().any(|b| {
            matches!(&b.live_chat_author_badge_renderer,
                AuthorBadgeRenderer::Internal { icon } if icon.icon_type == icon_type)
        })
    };
    let is_member = fields
        .author_badges
        .iter()
        .any(|b| matches!(b.live_chat_author_badge_renderer, AuthorBadgeRenderer::Custom { .. }));

    if has_icon("OWNER") {
        AuthorType::Broadcaster
    } else if has_icon("MODERATOR") {
        AuthorType::Moderator
    } else if is_member {
        AuthorType::Sponsor
    } else {
        AuthorType::Viewer
    }
}

/// Message text is the runs joined by a space; emoji runs contribute their
/// shortcut (custom) or the emoji itself (font based).
fn content(runs: &Runs) -> Result<MessageContent> {
    let mut words = Vec::with_capacity(runs.runs.len());
    let mut emotes = Vec::new();

    for run in &runs.runs {
        match run {
            Run::Text { text } => words.push(text.clone()),
            Run::Emoji { emoji } => match emoji {
                Emoji::Custom {
                    emoji_id,
                    shortcuts,
                    image,
                    ..
                } => {
                    let shortcut = shortcuts
                        .first()
                        .ok_or_else(|| Error::decode("Custom emoji without shortcut"))?;
                    let url = image
                        .largest()
                        .ok_or_else(|| Error::decode("Custom emoji without image"))?;
                    words.push(shortcut.clone());
                    emotes.push(Emote {
                        id: emoji_id.clone(),
                        key: shortcut.clone(),
                        url: url.to_string(),
                    });
                }
                Emoji::FontBased { emoji_id, image } => {
                    let url = image
                        .largest()
                        .ok_or_else(|| Error::decode("Emoji without image"))?;
                    words.push(emoji_id.clone());
                    emotes.push(Emote {
                        id: emoji_id.clone(),
                        key: emoji_id.clone(),
                        url: url.to_string(),
                    });
                }
            },
        }
    }

    Ok(MessageContent::build(words.join(" "), emotes))
}

/// Split `"R$ 1.234,56"` into the currency text and its value.
fn parse_amount(text: &str) -> Result<(String, f64)> {
    let split = text
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| Error::decode(format!("No amount in '{text}'")))?;
    let (currency, value) = text.split_at(split);
    Ok((currency.trim().to_string(), normalize_value(value.trim())?))
}

/// Parse an amount using either `,` or `.` as the decimal separator.
///
/// A single separator followed by at most two digits is decimal; anything
/// else is a thousands separator. With both present the last one is decimal.
fn normalize_value(raw: &str) -> Result<f64> {
    let last_dot = raw.rfind('.');
    let last_comma = raw.rfind(',');
    let is_decimal = |sep: char, at: usize| raw.matches(sep).count() == 1 && raw.len() - at - 1 <= 2;

    let normalized = match (last_dot, last_comma) {
        (Some(dot), Some(comma)) if dot > comma => raw.replace(',', ""),
        (Some(_), Some(_)) => raw.replace('.', "").replace(',', "."),
        (Some(dot), None) if is_decimal('.', dot) => raw.to_string(),
        (Some(_), None) => raw.replace('.', ""),
        (None, Some(comma)) if is_decimal(',', comma) => raw.replace(',', "."),
        (None, Some(_)) => raw.replace(',', ""),
        (None, None) => raw.to_string(),
    };

    normalized
        .parse()
        .map_err(|_| Error::decode(format!("Invalid amount '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Platform;
    use serde_json::json;

    fn channel() -> ChannelRef {
        ChannelRef {
            channel_id: "UCSJ4gkVC6NrvII8umztf0Ow".to_string(),
            channel_name: None,
            platform: Platform::YouTube,
        }
    }

    fn author_json(name: &str, badges: Value) -> Value {
        json!({
            "authorName": { "simpleText": name },
            "authorPhoto": { "thumbnails": [
                { "url": "https://yt3.ggpht.com/small", "width": 32, "height": 32 },
                { "url": "https://yt3.ggpht.com/large", "width": 64, "height": 64 }
            ]},
            "authorBadges": badges,
            "authorExternalChannelId": "UCauthor"
        })
    }

    fn add_item(renderer: &str, body: Value) -> Value {
        json!({ "clickTrackingParams": "x", "addChatItemAction": { "item": { renderer: body } } })
    }

    fn merge(mut base: Value, extra: Value) -> Value {
        if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        base
    }

    #[test]
    fn test_text_message_with_emoji_runs() {
        let body = merge(
            author_json("@some_viewer", json!([])),
            json!({
                "id": "msg-1",
                "timestampUsec": "1700000000123456",
                "message": { "runs": [
                    { "text": "hello" },
                    { "emoji": {
                        "emojiId": "UCkszU2WH9gy1mb0dV-11UJg/abc",
                        "shortcuts": [":yt:"],
                        "searchTerms": ["yt"],
                        "isCustomEmoji": true,
                        "image": { "thumbnails": [{ "url": "https://yt3/emoji=w24" }, { "url": "https://yt3/emoji=w48" }] }
                    }},
                    { "emoji": {
                        "emojiId": "😀",
                        "shortcuts": [":grinning:"],
                        "image": { "thumbnails": [{ "url": "https://fonts/1f600.svg" }] }
                    }}
                ]}
            }),
        );
        let event = action(&add_item("liveChatTextMessageRenderer", body), &channel())
            .unwrap()
            .unwrap();

        let UniChatEvent::Message(payload) = event else {
            panic!("expected message");
        };
        assert_eq!(payload.message_id, "msg-1");
        assert_eq!(payload.author.id, "UCauthor");
        assert_eq!(payload.author.display_name, "some_viewer");
        assert_eq!(payload.author.username.as_deref(), Some("some_viewer"));
        assert_eq!(
            payload.author.profile_picture_url.as_deref(),
            Some("https://yt3.ggpht.com/large")
        );
        assert_eq!(payload.message.raw, "hello :yt: 😀");
        assert_eq!(payload.message.emotes.len(), 2);
        assert_eq!(payload.message.emotes[0].url, "https://yt3/emoji=w48");
        assert_eq!(payload.timestamp.timestamp_millis(), 1_700_000_000_123);
        assert_eq!(payload.channel.channel_id, "UCSJ4gkVC6NrvII8umztf0Ow");
    }

    #[test]
    fn test_badges_and_author_type() {
        let badges = json!([
            { "liveChatAuthorBadgeRenderer": { "icon": { "iconType": "MODERATOR" }, "tooltip": "Moderator" } },
            { "liveChatAuthorBadgeRenderer": {
                "customThumbnail": { "thumbnails": [{ "url": "https://member/1x" }, { "url": "https://member/2x" }] },
                "tooltip": "Member (6 months)"
            }},
            { "liveChatAuthorBadgeRenderer": { "icon": { "iconType": "SOMETHING_NEW" }, "tooltip": "?" } }
        ]);
        let fields: AuthorFields = serde_json::from_value(author_json("Name With Spaces", badges)).unwrap();
        let author = author("id".to_string(), &fields).unwrap();

        assert_eq!(author.author_type, AuthorType::Moderator);
        assert_eq!(author.username, None);
        assert_eq!(
            author.badges,
            vec![Badge::new("moderator", ""), Badge::new("sponsor", "https://member/2x")]
        );
    }

    #[test]
    fn test_paid_message() {
        let body = merge(
            author_json("@donor", json!([])),
            json!({
                "id": "paid-1",
                "timestampUsec": "1700000000000000",
                "purchaseAmountText": { "simpleText": "R$ 1.234,56" },
                "message": { "runs": [{ "text": "take my money" }] }
            }),
        );
        let event = action(&add_item("liveChatPaidMessageRenderer", body), &channel())
            .unwrap()
            .unwrap();
        let UniChatEvent::Donate(payload) = event else {
            panic!("expected donate");
        };
        assert_eq!(payload.currency, "R$");
        assert!((payload.value - 1234.56).abs() < f64::EPSILON);
        assert_eq!(payload.message.unwrap().raw, "take my money");
    }

    #[test]
    fn test_paid_sticker() {
        let body = merge(
            author_json("@donor", json!([])),
            json!({
                "id": "sticker-1",
                "timestampUsec": "1700000000000000",
                "purchaseAmountText": { "simpleText": "$5.00" },
                "sticker": { "thumbnails": [{ "url": "//sticker/small" }, { "url": "//sticker/large" }] }
            }),
        );
        let event = action(&add_item("liveChatPaidStickerRenderer", body), &channel())
            .unwrap()
            .unwrap();
        let UniChatEvent::Donate(payload) = event else {
            panic!("expected donate");
        };
        assert_eq!(payload.currency, "$");
        assert_eq!(payload.value, 5.0);
        let message = payload.message.unwrap();
        assert_eq!(message.html, r#"<img src="//sticker/large" />"#);
    }

    #[test]
    fn test_membership_variants() {
        let welcome = merge(
            author_json("@newbie", json!([])),
            json!({
                "id": "m-1",
                "timestampUsec": "1700000000000000",
                "headerSubtext": { "runs": [{ "text": "Welcome to " }, { "text": "Gold Tier" }, { "text": "!" }] }
            }),
        );
        let UniChatEvent::Sponsor(p) = action(&add_item("liveChatMembershipItemRenderer", welcome), &channel())
            .unwrap()
            .unwrap()
        else {
            panic!("expected sponsor");
        };
        assert_eq!(p.tier.as_deref(), Some("Gold Tier"));
        assert_eq!(p.tier_name.as_deref(), Some("Gold Tier"));
        assert_eq!(p.months, 1);
        assert!(p.message.is_none());

        let renewal = merge(
            author_json("@veteran", json!([])),
            json!({
                "id": "m-2",
                "timestampUsec": "1700000000000000",
                "headerPrimaryText": { "runs": [{ "text": "Member for " }, { "text": "14" }, { "text": " months" }] },
                "headerSubtext": { "simpleText": "Gold Tier" },
                "message": { "runs": [{ "text": "still here" }] }
            }),
        );
        let UniChatEvent::Sponsor(p) = action(&add_item("liveChatMembershipItemRenderer", renewal), &channel())
            .unwrap()
            .unwrap()
        else {
            panic!("expected sponsor");
        };
        assert_eq!(p.months, 14);
        assert_eq!(p.tier.as_deref(), Some("Gold Tier"));
        assert_eq!(p.message.unwrap().raw, "still here");
    }

    #[test]
    fn test_gift_purchase() {
        let header = merge(
            author_json("@generous", json!([])),
            json!({ "primaryText": { "runs": [{ "text": "Sent " }, { "text": "5" }, { "text": " memberships" }] } }),
        );
        let body = json!({
            "id": "gift-1",
            "timestampUsec": "1700000000000000",
            "authorExternalChannelId": "UCgifter",
            "header": { "liveChatSponsorshipsHeaderRenderer": header }
        });
        let UniChatEvent::SponsorGift(p) = action(
            &add_item("liveChatSponsorshipsGiftPurchaseAnnouncementRenderer", body),
            &channel(),
        )
        .unwrap()
        .unwrap() else {
            panic!("expected sponsor gift");
        };
        assert_eq!(p.count, 5);
        assert_eq!(p.author.id, "UCgifter");
    }

    #[test]
    fn test_removals() {
        let removed = action(
            &json!({ "removeChatItemAction": { "targetItemId": "msg-1" } }),
            &channel(),
        )
        .unwrap();
        assert!(matches!(removed, Some(UniChatEvent::RemoveMessage(p)) if p.message_id == "msg-1"));

        let banned = action(
            &json!({ "removeChatItemByAuthorAction": { "externalChannelId": "UCbad" } }),
            &channel(),
        )
        .unwrap();
        assert!(matches!(banned, Some(UniChatEvent::RemoveAuthor(p)) if p.author_id == "UCbad"));
    }

    fn banner(banner_type: &str, first_run: Value) -> Value {
        json!({ "addBannerToLiveChatCommand": { "bannerRenderer": { "liveChatBannerRenderer": {
            "actionId": "ChwKGkNJbmJwX3Jhd2Y0Q0ZkX0NyUVlkT0JjTGVB",
            "bannerType": banner_type,
            "targetId": "live-chat-banner",
            "isStackable": true,
            "contents": { "liveChatBannerRedirectRenderer": {
                "bannerMessage": { "runs": [
                    first_run,
                    { "text": " and their viewers just joined. Say hello!", "textColor": 4294967295u32 }
                ]},
                "authorPhoto": { "thumbnails": [
                    { "url": "https://yt4.ggpht.com/raider=s32", "width": 32, "height": 32 },
                    { "url": "https://yt4.ggpht.com/raider=s64", "width": 64, "height": 64 }
                ]}
            }}
        }}}})
    }

    #[test]
    fn test_raid_banner() {
        let bold = json!({ "text": "@raiding_channel", "bold": true, "textColor": 4294967295u32 });
        let event = action(&banner(RAID_BANNER_TYPE, bold.clone()), &channel())
            .unwrap()
            .unwrap();

        let UniChatEvent::Raid(p) = event else {
            panic!("expected raid");
        };
        assert_eq!(p.message_id, "ChwKGkNJbmJwX3Jhd2Y0Q0ZkX0NyUVlkT0JjTGVB");
        assert_eq!(p.author.display_name, "raiding_channel");
        assert_eq!(p.author.username.as_deref(), Some("raiding_channel"));
        assert_eq!(
            p.author.profile_picture_url.as_deref(),
            Some("https://yt4.ggpht.com/raider=s64")
        );
        assert_eq!(p.viewer_count, None);
        assert_eq!(p.channel.channel_id, "UCSJ4gkVC6NrvII8umztf0Ow");

        let pinned = action(&banner("LIVE_CHAT_BANNER_TYPE_PINNED_MESSAGE", bold), &channel());
        assert_eq!(pinned.unwrap(), None);

        let plain = json!({ "text": "@raiding_channel" });
        assert_eq!(action(&banner(RAID_BANNER_TYPE, plain), &channel()).unwrap(), None);

        let broken = json!({ "addBannerToLiveChatCommand": {} });
        assert!(action(&broken, &channel()).is_err());
    }

    #[test]
    fn test_unknown_actions_are_ignored() {
        let ticker = json!({ "addLiveChatTickerItemAction": { "item": {} } });
        assert_eq!(action(&ticker, &channel()).unwrap(), None);

        let placeholder = add_item("liveChatPlaceholderItemRenderer", json!({ "id": "p" }));
        assert_eq!(action(&placeholder, &channel()).unwrap(), None);
    }

    #[test]
    fn test_malformed_renderer_is_error() {
        let body = json!({ "id": "broken" });
        assert!(action(&add_item("liveChatTextMessageRenderer", body), &channel()).is_err());
    }

    #[test]
    fn test_normalize_value() {
        assert_eq!(normalize_value("1.234,56").unwrap(), 1234.56);
        assert_eq!(normalize_value("1,234.56").unwrap(), 1234.56);
        assert_eq!(normalize_value("5.00").unwrap(), 5.0);
        assert_eq!(normalize_value("1.000").unwrap(), 1000.0);
        assert_eq!(normalize_value("10,5").unwrap(), 10.5);
        assert_eq!(normalize_value("1,000,000").unwrap(), 1_000_000.0);
        assert_eq!(normalize_value("42").unwrap(), 42.0);
        assert!(normalize_value("abc").is_err());
    }
}
