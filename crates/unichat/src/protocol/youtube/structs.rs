//! Innertube live chat payload structures.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleText {
    pub simple_text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thumbnails {
    #[serde(default)]
    pub thumbnails: Vec<Thumbnail>,
}

impl Thumbnails {
    /// Thumbnails are listed smallest first.
    pub fn largest(&self) -> Option<&str> {
        self.thumbnails.last().map(|t| t.url.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thumbnail {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorBadge {
    pub live_chat_author_badge_renderer: AuthorBadgeRenderer,
}

/// Member badges carry a channel-specific image; the others name a built-in icon.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AuthorBadgeRenderer {
    #[serde(rename_all = "camelCase")]
    Custom { custom_thumbnail: Thumbnails },
    Internal { icon: BadgeIcon },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeIcon {
    pub icon_type: String,
}

/// Author fields shared by every chat item renderer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorFields {
    pub author_name: SimpleText,
    #[serde(default)]
    pub author_photo: Thumbnails,
    #[serde(default)]
    pub author_badges: Vec<AuthorBadge>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Runs {
    #[serde(default)]
    pub runs: Vec<Run>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Run {
    Text { text: String },
    Emoji { emoji: Emoji },
}

impl Run {
    pub fn text(&self) -> Option<&str> {
        match self {
            Run::Text { text } => Some(text),
            Run::Emoji { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Emoji {
    #[serde(rename_all = "camelCase")]
    Custom {
        emoji_id: String,
        #[allow(dead_code)]
        is_custom_emoji: bool,
        #[serde(default)]
        shortcuts: Vec<String>,
        image: Thumbnails,
    },
    #[serde(rename_all = "camelCase")]
    FontBased { emoji_id: String, image: Thumbnails },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMessageRenderer {
    pub id: String,
    pub author_external_channel_id: String,
    #[serde(flatten)]
    pub author: AuthorFields,
    pub message: Runs,
    pub timestamp_usec: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaidMessageRenderer {
    pub id: String,
    pub author_external_channel_id: String,
    #[serde(flatten)]
    pub author: AuthorFields,
    pub purchase_amount_text: SimpleText,
    #[serde(default)]
    pub message: Option<Runs>,
    pub timestamp_usec: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaidStickerRenderer {
    pub id: String,
    pub author_external_channel_id: String,
    #[serde(flatten)]
    pub author: AuthorFields,
    pub purchase_amount_text: SimpleText,
    pub sticker: Thumbnails,
    pub timestamp_usec: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipItemRenderer {
    pub id: String,
    pub author_external_channel_id: String,
    #[serde(flatten)]
    pub author: AuthorFields,
    #[serde(default)]
    pub header_primary_text: Option<Runs>,
    #[serde(default)]
    pub header_subtext: Option<HeaderSubtext>,
    #[serde(default)]
    pub message: Option<Runs>,
    pub timestamp_usec: String,
}

/// Either the tier as plain text, or a welcome line with the tier as its second run.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderSubtext {
    #[serde(default)]
    pub simple_text: Option<String>,
    #[serde(default)]
    pub runs: Option<Vec<Run>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftPurchaseRenderer {
    pub id: String,
    pub author_external_channel_id: String,
    pub header: GiftPurchaseHeader,
    pub timestamp_usec: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftPurchaseHeader {
    pub live_chat_sponsorships_header_renderer: SponsorshipsHeaderRenderer,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorshipsHeaderRenderer {
    #[serde(flatten)]
    pub author: AuthorFields,
    pub primary_text: Runs,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveChatItemAction {
    pub target_item_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveChatItemByAuthorAction {
    pub external_channel_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatBannerRenderer {
    pub action_id: String,
    pub banner_type: String,
    #[serde(default)]
    pub contents: BannerContents,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerContents {
    #[serde(default)]
    pub live_chat_banner_redirect_renderer: Option<BannerRedirectRenderer>,
}

/// Raid banner: the first run names the raiding channel in bold.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerRedirectRenderer {
    #[serde(default)]
    pub author_photo: Thumbnails,
    pub banner_message: BannerMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BannerMessage {
    #[serde(default)]
    pub runs: Vec<BannerRun>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BannerRun {
    pub text: String,
    #[serde(default)]
    pub bold: Option<bool>,
}
