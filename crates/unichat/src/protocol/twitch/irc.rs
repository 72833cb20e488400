//! Minimal IRCv3 line parser (tags, prefix, command, params).

use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{Error, Result};

/// `nick!user@host` source of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix {
    pub nick: Option<String>,
    pub user: Option<String>,
    pub host: String,
}

impl Prefix {
    fn parse(raw: &str) -> Self {
        match raw.split_once('!') {
            Some((nick, rest)) => {
                let (user, host) = rest.split_once('@').unwrap_or((rest, ""));
                Self {
                    nick: Some(nick.to_string()),
                    user: Some(user.to_string()),
                    host: host.to_string(),
                }
            }
            None => Self {
                nick: None,
                user: None,
                host: raw.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcMessage {
    pub tags: HashMap<String, String>,
    pub prefix: Option<Prefix>,
    pub command: String,
    /// Middle params followed by the trailing param, if any.
    pub params: Vec<String>,
}

impl IrcMessage {
    /// Tag value, `None` when missing or empty.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Channel name without the leading `#`.
    pub fn channel(&self) -> Option<&str> {
        self.param(0)
            .filter(|p| p.starts_with('#'))
            .map(|p| &p[1..])
    }

    pub fn nick(&self) -> Option<&str> {
        self.prefix.as_ref().and_then(|p| p.nick.as_deref())
    }
}

impl FromStr for IrcMessage {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        let mut tags = HashMap::new();
        if let Some(stripped) = rest.strip_prefix('@') {
            let (raw_tags, after) = stripped
                .split_once(' ')
                .ok_or_else(|| Error::decode("IRC line has tags but no command"))?;
            for tag in raw_tags.split(';').filter(|t| !t.is_empty()) {
                let (key, value) = tag.split_once('=').unwrap_or((tag, ""));
                tags.insert(key.to_string(), unescape_tag_value(value));
            }
            rest = after.trim_start();
        }

        let mut prefix = None;
        if let Some(stripped) = rest.strip_prefix(':') {
            let (raw_prefix, after) = stripped
                .split_once(' ')
                .ok_or_else(|| Error::decode("IRC line has a prefix but no command"))?;
            prefix = Some(Prefix::parse(raw_prefix));
            rest = after.trim_start();
        }

        let (head, trailing) = match rest.split_once(" :") {
            Some((head, trailing)) => (head, Some(trailing)),
            None => (rest, None),
        };

        let mut words = head.split(' ').filter(|w| !w.is_empty());
        let command = words
            .next()
            .ok_or_else(|| Error::decode("IRC line without command"))?
            .to_string();
        let mut params: Vec<String> = words.map(str::to_string).collect();
        if let Some(trailing) = trailing {
            params.push(trailing.to_string());
        }

        Ok(Self {
            tags,
            prefix,
            command,
            params,
        })
    }
}

fn unescape_tag_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_privmsg_with_tags() {
        let line = "@badges=broadcaster/1;color=#FF0000;display-name=Test\\sUser;id=abc123 :testuser!testuser@testuser.tmi.twitch.tv PRIVMSG #channel :Hello world!";
        let msg: IrcMessage = line.parse().unwrap();

        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.tag("display-name"), Some("Test User"));
        assert_eq!(msg.tag("id"), Some("abc123"));
        assert_eq!(msg.nick(), Some("testuser"));
        assert_eq!(msg.channel(), Some("channel"));
        assert_eq!(msg.param(1), Some("Hello world!"));
    }

    #[test]
    fn test_parse_ping() {
        let msg: IrcMessage = "PING :tmi.twitch.tv".parse().unwrap();
        assert_eq!(msg.command, "PING");
        assert_eq!(msg.params, vec!["tmi.twitch.tv".to_string()]);
        assert!(msg.prefix.is_none());
    }

    #[test]
    fn test_parse_clearchat_without_trailing() {
        let msg: IrcMessage = "@room-id=1 :tmi.twitch.tv CLEARCHAT #dallas".parse().unwrap();
        assert_eq!(msg.command, "CLEARCHAT");
        assert_eq!(msg.params, vec!["#dallas".to_string()]);
        assert_eq!(msg.prefix.unwrap().host, "tmi.twitch.tv");
    }

    #[test]
    fn test_empty_tag_value_reads_as_none() {
        let msg: IrcMessage = "@color=;emotes= :a!a@a PRIVMSG #c :x".parse().unwrap();
        assert_eq!(msg.tag("color"), None);
        assert!(msg.tags.contains_key("emotes"));
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape_tag_value(r"a\:b\sc\\d"), r"a;b c\d");
    }

    #[test]
    fn test_reject_truncated_line() {
        assert!("@a=b".parse::<IrcMessage>().is_err());
        assert!("".parse::<IrcMessage>().is_err());
    }
}
