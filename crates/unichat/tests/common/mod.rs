#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use unichat::event::{ScraperStatus, StatusKind, UniChatEvent};
use unichat::{Result, Sink};

pub const KICK_SETUP: &str =
    r#"{"event":"pusher_internal:subscription_succeeded","channel":"chatrooms.555"}"#;

pub fn kick_message(id: &str) -> String {
    serde_json::json!({
        "event": "App\\Events\\ChatMessageEvent",
        "data": serde_json::json!({"id": id, "content": "hi"}).to_string(),
    })
    .to_string()
}

#[derive(Debug, Clone)]
pub enum Record {
    Event(UniChatEvent),
    Status(ScraperStatus),
}

/// Sink that keeps everything it receives.
#[derive(Default)]
pub struct Recorder {
    records: Mutex<Vec<Record>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn statuses(&self) -> Vec<StatusKind> {
        self.records
            .lock()
            .iter()
            .filter_map(|r| match r {
                Record::Status(s) => Some(s.kind.clone()),
                Record::Event(_) => None,
            })
            .collect()
    }

    pub fn status_names(&self) -> Vec<&'static str> {
        self.statuses().iter().map(StatusKind::name).collect()
    }

    pub fn events(&self) -> Vec<UniChatEvent> {
        self.records
            .lock()
            .iter()
            .filter_map(|r| match r {
                Record::Event(e) => Some(e.clone()),
                Record::Status(_) => None,
            })
            .collect()
    }

    pub fn message_ids(&self) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|e| e.message_id().map(str::to_string))
            .collect()
    }
}

impl Sink for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn on_event(&self, event: &UniChatEvent) -> Result<()> {
        self.records.lock().push(Record::Event(event.clone()));
        Ok(())
    }

    fn on_status(&self, status: &ScraperStatus) -> Result<()> {
        self.records.lock().push(Record::Status(status.clone()));
        Ok(())
    }
}

/// Let spawned tasks drain their queues. With paused time this advances the
/// clock by one millisecond.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
