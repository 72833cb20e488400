use serde::{Deserialize, Serialize};

use super::Emote;

/// Text of a chat item in raw and pre-rendered form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
    /// HTML-escaped text with emote words replaced by `<img>` tags.
    pub html: String,
    pub raw: String,
    #[serde(default)]
    pub emotes: Vec<Emote>,
}

impl MessageContent {
    /// Build content from raw text and the emotes that appear in it.
    ///
    /// Words are split on single spaces so the original spacing survives in the html.
    pub fn build(raw: impl Into<String>, emotes: Vec<Emote>) -> Self {
        let raw = raw.into();
        let html = raw
            .split(' ')
            .map(|word| match emotes.iter().find(|e| e.key == word) {
                Some(emote) => format!(r#"<img src="{}" />"#, escape_html(&emote.url)),
                None => escape_html(word),
            })
            .collect::<Vec<_>>()
            .join(" ");

        Self { html, raw, emotes }
    }

    pub fn is_empty(&self) -> bool {
        self.raw.trim().is_empty()
    }
}

/// Escape text for HTML element and attribute contexts.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Deterministic `#RRGGBB` color for authors without one (FNV-1a over the seed).
pub fn author_color(seed: &str) -> String {
    let mut hash: u32 = 2_166_136_261;
    for byte in seed.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(16_777_619);
    }

    format!(
        "#{:02X}{:02X}{:02X}",
        (hash >> 16) & 0xFF,
        (hash >> 8) & 0xFF,
        hash & 0xFF
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kappa() -> Emote {
        Emote {
            id: "25".to_string(),
            key: "Kappa".to_string(),
            url: "https://static-cdn.jtvnw.net/emoticons/v2/25/default/dark/3.0".to_string(),
        }
    }

    #[test]
    fn test_build_replaces_emote_words() {
        let content = MessageContent::build("hello Kappa world", vec![kappa()]);
        assert_eq!(
            content.html,
            r#"hello <img src="https://static-cdn.jtvnw.net/emoticons/v2/25/default/dark/3.0" /> world"#
        );
        assert_eq!(content.raw, "hello Kappa world");
    }

    #[test]
    fn test_build_escapes_markup() {
        let content = MessageContent::build("<b>hi</b> & \"bye\"", Vec::new());
        assert_eq!(content.html, "&lt;b&gt;hi&lt;/b&gt; &amp; &quot;bye&quot;");
    }

    #[test]
    fn test_emote_must_match_whole_word() {
        let content = MessageContent::build("Kappa123", vec![kappa()]);
        assert_eq!(content.html, "Kappa123");
    }

    #[test]
    fn test_author_color_is_stable() {
        let a = author_color("viewer");
        assert_eq!(a, author_color("viewer"));
        assert_eq!(a.len(), 7);
        assert!(a.starts_with('#'));
        assert_ne!(a, author_color("other"));
        // FNV-1a offset basis for the empty seed
        assert_eq!(author_color(""), "#1C9DC5");
    }
}
