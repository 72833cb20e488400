//! Channel id recovery from a live chat continuation token.
//!
//! The token is url-encoded, url-safe base64 of a protobuf message. One of its
//! fields is itself a url-encoded base64 blob whose third line holds the
//! channel id between a `0x18` tag and the next `0x12` tag.

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use regex::Regex;
use std::sync::LazyLock;

use crate::error::{Error, Result};

/// Lenient decoder: tokens are padded by hand and may carry trailing bits.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Url-encoded `=` that terminates the nested blob.
const NESTED_TERMINATOR: &[u8] = b"%3D";

/// Bytes of protobuf framing in front of the nested blob.
const NESTED_OFFSET: usize = 10;

static CHANNEL_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^UC[0-9A-Za-z_-]{21}[AQgw]$").unwrap());

pub fn is_valid_channel_id(channel_id: &str) -> bool {
    CHANNEL_ID_REGEX.is_match(channel_id)
}

/// Url-decode, map the url-safe alphabet to the standard one and re-pad.
fn normalize_base64(data: &str) -> Result<String> {
    let decoded = urlencoding::decode(data)
        .map_err(|e| Error::decode(format!("Continuation is not valid url encoding: {e}")))?;
    let mut normalized: String = decoded
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    normalized.truncate(normalized.trim_end_matches('=').len());
    let pad = (4 - normalized.len() % 4) % 4;
    normalized.extend(std::iter::repeat_n('=', pad));
    Ok(normalized)
}

fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let normalized = normalize_base64(data)?;
    LENIENT
        .decode(normalized.as_bytes())
        .map_err(|e| Error::decode(format!("Continuation is not valid base64: {e}")))
}

/// Extract the channel id carried by a continuation token.
pub fn channel_id_from_continuation(token: &str) -> Result<String> {
    let outer = decode_base64(token)?;

    let nested_end = outer
        .windows(NESTED_TERMINATOR.len())
        .position(|w| w == NESTED_TERMINATOR)
        .unwrap_or(outer.len());
    let nested = outer
        .get(NESTED_OFFSET..nested_end)
        .ok_or_else(|| Error::decode("Continuation token is too short"))?;
    let nested = std::str::from_utf8(nested)
        .map_err(|_| Error::decode("Nested continuation is not text"))?;

    let inner = decode_base64(&format!("{nested}%3D"))?;
    let line = inner
        .split(|b| *b == b'\n')
        .nth(2)
        .ok_or_else(|| Error::decode("Nested continuation has no channel line"))?;
    let line = match line.iter().position(|b| *b == 0x18) {
        Some(at) => [&line[..at], &line[at + 1..]].concat(),
        None => line.to_vec(),
    };
    let id_bytes = line.split(|b| *b == 0x12).next().unwrap_or_default();
    let channel_id = String::from_utf8_lossy(id_bytes).into_owned();

    if !is_valid_channel_id(&channel_id) {
        return Err(Error::decode(format!(
            "Invalid YouTube channel id '{channel_id}' in continuation"
        )));
    }

    Ok(channel_id)
}
