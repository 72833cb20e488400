//! Twitch chat adapter (IRC over WebSocket).
//!
//! A frame is either one or more `\r\n`-separated IRC lines, or a GQL response
//! (JSON) that carries the badge and cheermote catalog.

mod catalog;
mod irc;
mod mapper;

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, trace, warn};

use super::{AdapterSignal, ChatProtocol};
use crate::error::Result;
use crate::event::{Platform, SessionMeta, UniChatEvent};

pub use catalog::TwitchCatalog;
pub use irc::{IrcMessage, Prefix};

/// Twitch WebSocket IRC server URL
const TWITCH_WS_URL: &str = "wss://irc-ws.chat.twitch.tv:443";

static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.|m\.)?twitch\.tv/([A-Za-z0-9_]{1,25})/?(?:[?#].*)?$")
        .unwrap()
});

/// IRC commands the adapter understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IrcCommand {
    Ping,
    RoomState,
    PrivMsg,
    ClearMsg,
    ClearChat,
    UserNotice,
}

impl IrcCommand {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "PING" => Some(Self::Ping),
            "ROOMSTATE" => Some(Self::RoomState),
            "PRIVMSG" => Some(Self::PrivMsg),
            "CLEARMSG" => Some(Self::ClearMsg),
            "CLEARCHAT" => Some(Self::ClearChat),
            "USERNOTICE" => Some(Self::UserNotice),
            _ => None,
        }
    }
}

/// Twitch adapter. Anonymous (read-only) sessions only.
///
/// Every IRC line carries its own `room-id`, so no channel state is kept.
#[derive(Debug, Clone, Default)]
pub struct TwitchProtocol {
    catalog: TwitchCatalog,
}

impl TwitchProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn catalog(&self) -> &TwitchCatalog {
        &self.catalog
    }

    /// Generate random anonymous username
    fn generate_anonymous_nick() -> String {
        let random_num: u32 = rand::random::<u32>() % 100000;
        format!("justinfan{}", random_num)
    }

    fn decode_line(&mut self, line: &str) -> Result<Option<AdapterSignal>> {
        let msg: IrcMessage = line.parse()?;
        let Some(command) = IrcCommand::from_name(&msg.command) else {
            trace!(command = %msg.command, "Ignoring Twitch IRC command");
            return Ok(None);
        };

        let event: Option<UniChatEvent> = match command {
            IrcCommand::Ping => {
                let payload = msg.param(0).unwrap_or("tmi.twitch.tv");
                return Ok(Some(AdapterSignal::Reply(format!("PONG :{payload}"))));
            }
            IrcCommand::RoomState => {
                let (Some(room_id), Some(name)) = (msg.tag("room-id"), msg.channel()) else {
                    return Ok(None);
                };
                let meta = SessionMeta {
                    platform: Platform::Twitch,
                    channel_id: room_id.to_string(),
                    channel_name: Some(name.to_string()),
                };
                return Ok(Some(AdapterSignal::SetupConfirmed(meta)));
            }
            IrcCommand::PrivMsg => mapper::privmsg(&msg, &self.catalog)?,
            IrcCommand::ClearMsg => mapper::clearmsg(&msg)?,
            IrcCommand::ClearChat => mapper::clearchat(&msg)?,
            IrcCommand::UserNotice => mapper::usernotice(&msg, &self.catalog)?,
        };

        Ok(event.map(AdapterSignal::Event))
    }
}

#[async_trait]
impl ChatProtocol for TwitchProtocol {
    fn platform(&self) -> Platform {
        Platform::Twitch
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
        Ok(Some(TWITCH_WS_URL.to_string()))
    }

    async fn handshake_messages(&self, channel: &str) -> Result<Vec<String>> {
        let channel = channel.trim_start_matches('#').to_lowercase();
        Ok(vec![
            "CAP REQ :twitch.tv/tags twitch.tv/commands".to_string(),
            "PASS oauth:".to_string(),
            format!("NICK {}", Self::generate_anonymous_nick()),
            format!("JOIN #{channel}"),
        ])
    }

    fn decode_frame(&mut self, frame: &str) -> Result<Vec<AdapterSignal>> {
        let trimmed = frame.trim_start();
        if trimmed.starts_with('[') || trimmed.starts_with('{') {
            let value: serde_json::Value = serde_json::from_str(trimmed)?;
            let applied = self.catalog.ingest_gql(value)?;
            debug!(
                applied,
                badges = self.catalog.badge_count(),
                "Twitch GQL frame"
            );
            return Ok(vec![]);
        }

        let mut signals = Vec::new();
        for line in frame.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match self.decode_line(line) {
                Ok(Some(signal)) => signals.push(signal),
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "Failed to decode Twitch IRC line");
                    signals.push(AdapterSignal::Fault(e.to_string()));
                }
            }
        }

        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::AuthorType;

    const ROOMSTATE: &str = "@emote-only=0;followers-only=-1;r9k=0;room-id=12345;slow=0;subs-only=0 :tmi.twitch.tv ROOMSTATE #channel";

    fn privmsg(extra_tags: &str, text: &str) -> String {
        format!(
            "@badge-info=;badges=broadcaster/1;color=#FF0000;display-name=TestUser;emotes=;id=abc123;mod=0;room-id=12345;subscriber=0;tmi-sent-ts=1700000000000;turbo=0;user-id=67890;user-type={extra_tags} :testuser!testuser@testuser.tmi.twitch.tv PRIVMSG #channel :{text}"
        )
    }

    #[test]
    fn test_supports_url() {
        let protocol = TwitchProtocol::new();

        assert!(protocol.supports_url("https://www.twitch.tv/streamer"));
        assert!(protocol.supports_url("http://twitch.tv/another_streamer"));
        assert!(protocol.supports_url("twitch.tv/test123"));

        assert!(!protocol.supports_url("https://kick.com/12345"));
        assert!(!protocol.supports_url("https://www.youtube.com/watch?v=xxx"));
    }

    #[test]
    fn test_extract_channel() {
        let protocol = TwitchProtocol::new();
        assert_eq!(
            protocol.extract_channel("https://www.twitch.tv/Streamer"),
            Some("streamer".to_string())
        );
        assert_eq!(protocol.extract_channel("https://kick.com/12345"), None);
    }

    #[test]
    fn test_roomstate_confirms_setup() {
        let mut protocol = TwitchProtocol::new();
        let signals = protocol.decode_frame(ROOMSTATE).unwrap();
        assert_eq!(
            signals,
            vec![AdapterSignal::SetupConfirmed(SessionMeta {
                platform: Platform::Twitch,
                channel_id: "12345".to_string(),
                channel_name: Some("channel".to_string()),
            })]
        );
    }

    #[test]
    fn test_privmsg_to_message() {
        let mut protocol = TwitchProtocol::new();
        let signals = protocol
            .decode_frame(&privmsg("", "Hello world!"))
            .unwrap();

        let AdapterSignal::Event(UniChatEvent::Message(payload)) = &signals[0] else {
            panic!("expected message");
        };
        assert_eq!(payload.message_id, "abc123");
        assert_eq!(payload.channel.channel_id, "12345");
        assert_eq!(payload.channel.channel_name.as_deref(), Some("channel"));
        assert_eq!(payload.author.id, "67890");
        assert_eq!(payload.author.display_name, "TestUser");
        assert_eq!(payload.author.username.as_deref(), Some("testuser"));
        assert_eq!(payload.author.display_color, "#FF0000");
        assert_eq!(payload.author.author_type, AuthorType::Broadcaster);
        assert_eq!(payload.message.raw, "Hello world!");
        assert_eq!(payload.timestamp.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_bits_to_donate() {
        let mut protocol = TwitchProtocol::new();
        let signals = protocol
            .decode_frame(&privmsg(";bits=100", "cheer100 Great stream!"))
            .unwrap();

        let AdapterSignal::Event(UniChatEvent::Donate(payload)) = &signals[0] else {
            panic!("expected donate");
        };
        assert_eq!(payload.value, 100.0);
        assert_eq!(payload.currency, "Bits");
        // Without a cheermote catalog the text is kept verbatim.
        assert_eq!(
            payload.message.as_ref().map(|m| m.raw.as_str()),
            Some("cheer100 Great stream!")
        );
    }

    #[test]
    fn test_ping_and_multiline_frame() {
        let mut protocol = TwitchProtocol::new();
        let frame = format!("PING :tmi.twitch.tv\r\n{}\r\n", privmsg("", "hi"));
        let signals = protocol.decode_frame(&frame).unwrap();
        assert_eq!(signals.len(), 2);
        assert_eq!(
            signals[0],
            AdapterSignal::Reply("PONG :tmi.twitch.tv".to_string())
        );
        assert!(matches!(signals[1], AdapterSignal::Event(_)));
    }

    #[test]
    fn test_bad_line_does_not_drop_siblings() {
        let mut protocol = TwitchProtocol::new();
        // PRIVMSG without room-id cannot be attributed to a channel.
        let bad = "@id=x;user-id=1;display-name=a :a!a@a PRIVMSG #c :oops";
        let frame = format!("{bad}\r\n{}", privmsg("", "fine"));
        let signals = protocol.decode_frame(&frame).unwrap();
        assert!(matches!(signals[0], AdapterSignal::Fault(_)));
        assert!(matches!(signals[1], AdapterSignal::Event(_)));
    }

    #[test]
    fn test_clearmsg_and_ban() {
        let mut protocol = TwitchProtocol::new();
        let frame = "@login=foo;room-id=12345;target-msg-id=94e6c7ff;tmi-sent-ts=1642720582342 :tmi.twitch.tv CLEARMSG #channel :HeyGuys\r\n@ban-duration=350;room-id=12345;target-user-id=87654321;tmi-sent-ts=1642719320727 :tmi.twitch.tv CLEARCHAT #channel :ronni";
        let signals = protocol.decode_frame(frame).unwrap();
        assert!(matches!(
            &signals[0],
            AdapterSignal::Event(UniChatEvent::RemoveMessage(p)) if p.message_id == "94e6c7ff"
        ));
        assert!(matches!(
            &signals[1],
            AdapterSignal::Event(UniChatEvent::RemoveAuthor(p)) if p.author_id == "87654321"
        ));
    }

    #[test]
    fn test_usernotice_variants() {
        let mut protocol = TwitchProtocol::new();
        let base = "badges=;color=;display-name=Gifter;id=n1;login=gifter;room-id=12345;tmi-sent-ts=1700000000000;user-id=5";

        let resub = format!(
            "@{base};msg-id=resub;msg-param-cumulative-months=6;msg-param-sub-plan=2000 :tmi.twitch.tv USERNOTICE #channel :still here"
        );
        let signals = protocol.decode_frame(&resub).unwrap();
        let AdapterSignal::Event(UniChatEvent::Sponsor(p)) = &signals[0] else {
            panic!("expected sponsor");
        };
        assert_eq!(p.months, 6);
        assert_eq!(p.tier.as_deref(), Some("2000"));
        assert_eq!(p.tier_name.as_deref(), Some("T2"));
        assert_eq!(p.message.as_ref().unwrap().raw, "still here");
        assert_eq!(p.author.username.as_deref(), Some("gifter"));

        let mystery = format!(
            "@{base};msg-id=submysterygift;msg-param-mass-gift-count=5;msg-param-sub-plan=1000 :tmi.twitch.tv USERNOTICE #channel"
        );
        let signals = protocol.decode_frame(&mystery).unwrap();
        assert!(matches!(
            &signals[0],
            AdapterSignal::Event(UniChatEvent::SponsorGift(p)) if p.count == 5
        ));

        let community_part = format!(
            "@{base};msg-id=subgift;msg-param-community-gift-id=123;msg-param-sub-plan=1000 :tmi.twitch.tv USERNOTICE #channel"
        );
        assert!(protocol.decode_frame(&community_part).unwrap().is_empty());

        let raid = format!(
            "@{base};msg-id=raid;msg-param-viewerCount=42;msg-param-profileImageURL=https://img/p.png :tmi.twitch.tv USERNOTICE #channel"
        );
        let signals = protocol.decode_frame(&raid).unwrap();
        let AdapterSignal::Event(UniChatEvent::Raid(p)) = &signals[0] else {
            panic!("expected raid");
        };
        assert_eq!(p.viewer_count, Some(42));
        assert_eq!(p.author.profile_picture_url.as_deref(), Some("https://img/p.png"));

        let unknown = format!("@{base};msg-id=bitsbadgetier :tmi.twitch.tv USERNOTICE #channel");
        assert!(protocol.decode_frame(&unknown).unwrap().is_empty());
    }

    #[test]
    fn test_gql_frame_updates_catalog() {
        let mut protocol = TwitchProtocol::new();
        let gql = r#"[{"data":{"badges":[{"setID":"moderator","version":"1","image4x":"https://m/4x"}]},"extensions":{"operationName":"GlobalBadges"}}]"#;
        assert!(protocol.decode_frame(gql).unwrap().is_empty());

        let signals = protocol
            .decode_frame(&privmsg("", "hi").replace("badges=broadcaster/1", "badges=moderator/1"))
            .unwrap();
        let AdapterSignal::Event(UniChatEvent::Message(p)) = &signals[0] else {
            panic!("expected message");
        };
        assert_eq!(p.author.badges[0].url, "https://m/4x");
    }

    #[test]
    fn test_unknown_commands_are_ignored() {
        let mut protocol = TwitchProtocol::new();
        let frame = ":tmi.twitch.tv 001 justinfan123 :Welcome, GLHF!\r\n:tmi.twitch.tv CAP * ACK :twitch.tv/tags";
        assert!(protocol.decode_frame(frame).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_handshake() {
        let protocol = TwitchProtocol::new();
        let messages = protocol.handshake_messages("Channel").await.unwrap();
        assert_eq!(messages[0], "CAP REQ :twitch.tv/tags twitch.tv/commands");
        assert!(messages[2].starts_with("NICK justinfan"));
        assert_eq!(messages[3], "JOIN #channel");
    }
}
