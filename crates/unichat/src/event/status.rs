use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Platform;

/// Health signal of one scraper session.
///
/// Wire shape: `{"type": "<kind>", "scraperId": ..., "timestamp": ..., ...fields}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScraperStatus {
    pub scraper_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: StatusKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StatusKind {
    Idle,
    Ready {
        url: String,
        meta: SessionMeta,
    },
    Ping,
    Error {
        message: String,
        #[serde(default)]
        stack: Option<String>,
    },
    Fatal {
        message: String,
        #[serde(default)]
        stack: Option<String>,
    },
}

impl StatusKind {
    pub fn name(&self) -> &'static str {
        match self {
            StatusKind::Idle => "idle",
            StatusKind::Ready { .. } => "ready",
            StatusKind::Ping => "ping",
            StatusKind::Error { .. } => "error",
            StatusKind::Fatal { .. } => "fatal",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, StatusKind::Fatal { .. })
    }
}

/// Channel resolved by the setup handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMeta {
    pub platform: Platform,
    pub channel_id: String,
    #[serde(default)]
    pub channel_name: Option<String>,
}

impl ScraperStatus {
    pub fn new(scraper_id: impl Into<String>, kind: StatusKind) -> Self {
        Self {
            scraper_id: scraper_id.into(),
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn to_wire(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
