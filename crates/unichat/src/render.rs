//! Template rendering of canonical events into buffer entries.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::buffer::BufferEntry;
use crate::config::RenderConfig;
use crate::event::{Author, Badge, MessageContent, Platform, UniChatEvent, escape_html};

static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").unwrap());

const DONATE_COLOR: &str = "#0ca678";
const SPONSOR_COLOR: &str = "#f59f00";
const RAID_COLOR: &str = "#7048e8";
const PILL_TEXT_COLOR: &str = "#f8f9fa";
const PILL_DARK_TEXT_COLOR: &str = "#212529";

/// One `<img>` per badge, each carrying the badge url and code.
pub fn badges_fragment(badges: &[Badge]) -> String {
    badges
        .iter()
        .map(|badge| {
            format!(
                "\n<img src=\"{}\" class=\"badge\" type=\"{}\" />",
                escape_html(&badge.url),
                escape_html(&badge.code)
            )
        })
        .collect()
}

/// Coloured label shown next to the author of non-chat entries.
fn pill(text: &str, background: &str, color: &str) -> String {
    format!(
        "<div class=\"badge\" style=\"background:{background}; color:{color};\">{}</div>",
        escape_html(text)
    )
}

/// Tier label: Twitch plans as `T1`..`T3` (Prime stays Prime), other
/// platforms use the tier text, falling back to the product name.
pub fn tier_label(platform: Platform, tier: Option<&str>, tier_name: Option<&str>) -> String {
    if let Some(name) = tier_name.filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    match tier.filter(|t| !t.is_empty()) {
        Some(tier) if platform == Platform::Twitch && !tier.eq_ignore_ascii_case("prime") => {
            match tier.parse::<u32>() {
                Ok(plan) => format!("T{}", plan / 1000),
                Err(_) => tier.to_string(),
            }
        }
        Some(tier) => tier.to_string(),
        None if platform == Platform::Twitch => "Subscription".to_string(),
        None => "Membership".to_string(),
    }
}

/// Values substituted into the message template.
struct TemplateFields<'a> {
    message_id: &'a str,
    platform: Platform,
    author: &'a Author,
    badges: String,
    message: String,
}

/// Renders events through the overlay message template.
#[derive(Debug, Clone)]
pub struct Renderer {
    template: String,
}

impl Renderer {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(config.message_template.clone())
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Render an event into a buffer entry. Removal events render to `None`.
    pub fn render(&self, event: &UniChatEvent) -> Option<BufferEntry> {
        let platform = event.platform();
        let fields = match event {
            UniChatEvent::Message(p) => TemplateFields {
                message_id: &p.message_id,
                platform,
                author: &p.author,
                badges: badges_fragment(&p.author.badges),
                message: p.message.html.clone(),
            },
            UniChatEvent::Donate(p) => {
                let pills = if platform == Platform::YouTube {
                    pill(&format!("{}{}", p.currency, p.value), DONATE_COLOR, PILL_TEXT_COLOR)
                        + &pill("Super chat", &format!("{DONATE_COLOR}80"), PILL_TEXT_COLOR)
                } else {
                    pill(&format!("{}x", p.value), DONATE_COLOR, PILL_TEXT_COLOR)
                        + &pill(&p.currency, &format!("{DONATE_COLOR}80"), PILL_TEXT_COLOR)
                };
                TemplateFields {
                    message_id: &p.message_id,
                    platform,
                    author: &p.author,
                    badges: badges_fragment(&p.author.badges) + &pills,
                    message: html_of(p.message.as_ref()),
                }
            }
            UniChatEvent::Sponsor(p) => {
                let label = tier_label(platform, p.tier.as_deref(), p.tier_name.as_deref());
                let pills = pill(&format!("{}mo", p.months), SPONSOR_COLOR, PILL_DARK_TEXT_COLOR)
                    + &pill(&label, &format!("{SPONSOR_COLOR}80"), PILL_TEXT_COLOR);
                TemplateFields {
                    message_id: &p.message_id,
                    platform,
                    author: &p.author,
                    badges: badges_fragment(&p.author.badges) + &pills,
                    message: html_of(p.message.as_ref()),
                }
            }
            UniChatEvent::SponsorGift(p) => {
                let label = tier_label(platform, p.tier.as_deref(), p.tier_name.as_deref());
                let pills = pill(&format!("{}x", p.count), SPONSOR_COLOR, PILL_DARK_TEXT_COLOR)
                    + &pill(&label, &format!("{SPONSOR_COLOR}80"), PILL_TEXT_COLOR);
                TemplateFields {
                    message_id: &p.message_id,
                    platform,
                    author: &p.author,
                    badges: badges_fragment(&p.author.badges) + &pills,
                    message: html_of(p.message.as_ref()),
                }
            }
            UniChatEvent::Raid(p) => {
                let pills = match p.viewer_count {
                    Some(count) => {
                        pill(&count.to_string(), RAID_COLOR, PILL_TEXT_COLOR)
                            + &pill("Raiders", &format!("{RAID_COLOR}80"), PILL_TEXT_COLOR)
                    }
                    None => pill("RAID", RAID_COLOR, PILL_TEXT_COLOR),
                };
                TemplateFields {
                    message_id: &p.message_id,
                    platform,
                    author: &p.author,
                    badges: badges_fragment(&p.author.badges) + &pills,
                    message: String::new(),
                }
            }
            UniChatEvent::RemoveMessage(_) | UniChatEvent::RemoveAuthor(_) => return None,
        };

        Some(BufferEntry::new(
            fields.message_id,
            Some(fields.author.id.clone()),
            platform,
            &event.channel().channel_id,
            event.kind(),
            self.fill(&fields),
        ))
    }

    /// Single pass over the template; inserted values are never re-scanned.
    /// Unknown placeholders are left as they are.
    fn fill(&self, fields: &TemplateFields<'_>) -> String {
        PLACEHOLDER_REGEX
            .replace_all(&self.template, |caps: &Captures<'_>| match &caps[1] {
                "message_id" => escape_html(fields.message_id),
                "author_id" => escape_html(&fields.author.id),
                "platform" => fields.platform.as_str().to_string(),
                "author_color" => escape_html(&fields.author.display_color),
                "author_display_name" => escape_html(&fields.author.display_name),
                "badges" => fields.badges.clone(),
                "message" => fields.message.clone(),
                _ => caps[0].to_string(),
            })
            .into_owned()
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

fn html_of(content: Option<&MessageContent>) -> String {
    content.map(|c| c.html.clone()).unwrap_or_default()
}
