//! Bus sinks for the host: the wire forwarder and the health board.
//!
//! The presentation buffer sink lives in [`crate::buffer`].

use dashmap::DashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::bus::Sink;
use crate::config::DashboardConfig;
use crate::error::{Error, Result};
use crate::event::{ScraperStatus, StatusKind, UniChatEvent};
use crate::session::SessionState;

/// A serialized message for the IPC or SSE channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    Event(String),
    Status(String),
}

impl WireMessage {
    pub fn as_str(&self) -> &str {
        match self {
            WireMessage::Event(json) | WireMessage::Status(json) => json,
        }
    }
}

/// Serializes everything it sees onto an unbounded channel. Never blocks.
pub struct WireForwarder {
    tx: mpsc::UnboundedSender<WireMessage>,
}

impl WireForwarder {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WireMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, message: WireMessage) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| Error::other("wire receiver dropped"))
    }
}

impl Sink for WireForwarder {
    fn name(&self) -> &str {
        "wire"
    }

    fn on_event(&self, event: &UniChatEvent) -> Result<()> {
        self.forward(WireMessage::Event(event.to_wire()?))
    }

    fn on_status(&self, status: &ScraperStatus) -> Result<()> {
        self.forward(WireMessage::Status(status.to_wire()?))
    }
}

/// Dashboard view of one scraper.
#[derive(Debug, Clone, PartialEq)]
pub struct ScraperHealth {
    pub scraper_id: String,
    pub state: SessionState,
    /// Last error or fatal message, if any.
    pub message: Option<String>,
    /// No status arrived within the watchdog interval.
    pub stale: bool,
    pub last_seen: Instant,
}

#[derive(Debug, Clone)]
struct LastStatus {
    kind: StatusKind,
    received_at: Instant,
}

/// Latest status per scraper, with the watchdog applied on read.
pub struct HealthBoard {
    watchdog: Duration,
    statuses: DashMap<String, LastStatus>,
}

impl HealthBoard {
    pub fn new(watchdog: Duration) -> Self {
        Self {
            watchdog,
            statuses: DashMap::new(),
        }
    }

    pub fn from_config(config: &DashboardConfig) -> Self {
        Self::new(config.watchdog())
    }

    pub fn watchdog(&self) -> Duration {
        self.watchdog
    }

    pub fn health(&self, scraper_id: &str) -> Option<ScraperHealth> {
        self.health_at(scraper_id, Instant::now())
    }

    pub fn health_at(&self, scraper_id: &str, now: Instant) -> Option<ScraperHealth> {
        self.statuses
            .get(scraper_id)
            .map(|last| self.evaluate(scraper_id, &last, now))
    }

    /// Every known scraper, sorted by id.
    pub fn report(&self) -> Vec<ScraperHealth> {
        let now = Instant::now();
        let mut report: Vec<_> = self
            .statuses
            .iter()
            .map(|entry| self.evaluate(entry.key(), entry.value(), now))
            .collect();
        report.sort_by(|a, b| a.scraper_id.cmp(&b.scraper_id));
        report
    }

    pub fn forget(&self, scraper_id: &str) -> bool {
        self.statuses.remove(scraper_id).is_some()
    }

    fn evaluate(&self, scraper_id: &str, last: &LastStatus, now: Instant) -> ScraperHealth {
        let (state, message) = match &last.kind {
            StatusKind::Idle => (SessionState::Idle, None),
            StatusKind::Ready { .. } => (SessionState::Ready, None),
            StatusKind::Ping => (SessionState::Working, None),
            StatusKind::Error { message, .. } => (SessionState::Error, Some(message.clone())),
            StatusKind::Fatal { message, .. } => (SessionState::Fatal, Some(message.clone())),
        };

        let stale = state != SessionState::Fatal
            && now.saturating_duration_since(last.received_at) > self.watchdog;
        if stale {
            return ScraperHealth {
                scraper_id: scraper_id.to_string(),
                state: SessionState::Fatal,
                message: Some(format!(
                    "no status received for {}s",
                    self.watchdog.as_secs()
                )),
                stale: true,
                last_seen: last.received_at,
            };
        }

        ScraperHealth {
            scraper_id: scraper_id.to_string(),
            state,
            message,
            stale: false,
            last_seen: last.received_at,
        }
    }
}

impl Sink for HealthBoard {
    fn name(&self) -> &str {
        "health"
    }

    fn on_event(&self, _event: &UniChatEvent) -> Result<()> {
        Ok(())
    }

    fn on_status(&self, status: &ScraperStatus) -> Result<()> {
        self.statuses.insert(
            status.scraper_id.clone(),
            LastStatus {
                kind: status.kind.clone(),
                received_at: Instant::now(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Platform, SessionMeta};

    #[test]
    fn test_forwarder_emits_wire_json() {
        let (forwarder, mut rx) = WireForwarder::new();
        forwarder
            .on_status(&ScraperStatus::new("kick-chat", StatusKind::Ping))
            .unwrap();

        let Ok(WireMessage::Status(json)) = rx.try_recv() else {
            panic!("expected a status");
        };
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "ping");
        assert_eq!(value["scraperId"], "kick-chat");
    }

    #[test]
    fn test_forwarder_fails_when_receiver_dropped() {
        let (forwarder, rx) = WireForwarder::new();
        drop(rx);
        assert!(
            forwarder
                .on_status(&ScraperStatus::new("kick-chat", StatusKind::Idle))
                .is_err()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_board_tracks_latest_status() {
        let board = HealthBoard::new(Duration::from_secs(30));
        board
            .on_status(&ScraperStatus::new(
                "twitch-chat",
                StatusKind::Ready {
                    url: "https://twitch.tv/foo".to_string(),
                    meta: SessionMeta {
                        platform: Platform::Twitch,
                        channel_id: "1".to_string(),
                        channel_name: Some("foo".to_string()),
                    },
                },
            ))
            .unwrap();
        assert_eq!(board.health("twitch-chat").unwrap().state, SessionState::Ready);

        board
            .on_status(&ScraperStatus::new(
                "twitch-chat",
                StatusKind::Error {
                    message: "bad frame".to_string(),
                    stack: None,
                },
            ))
            .unwrap();
        let health = board.health("twitch-chat").unwrap();
        assert_eq!(health.state, SessionState::Error);
        assert_eq!(health.message.as_deref(), Some("bad frame"));
        assert!(board.health("kick-chat").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_scraper_is_reported_fatal() {
        let board = HealthBoard::new(Duration::from_secs(30));
        board
            .on_status(&ScraperStatus::new("kick-chat", StatusKind::Ping))
            .unwrap();

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(!board.health("kick-chat").unwrap().stale);

        tokio::time::advance(Duration::from_secs(1)).await;
        let health = board.health("kick-chat").unwrap();
        assert!(health.stale);
        assert_eq!(health.state, SessionState::Fatal);

        board
            .on_status(&ScraperStatus::new("kick-chat", StatusKind::Ping))
            .unwrap();
        assert_eq!(board.report()[0].state, SessionState::Working);
    }
}
