//! Bounded presentation buffer.
//!
//! Entries are kept in push order. A push evicts from the head while the
//! buffer holds more than `capacity` entries, so the retained entries are
//! always the most recent pushes. Entries may also expire after the display
//! timeout or be removed by message id or author id.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::bus::Sink;
use crate::config::BufferConfig;
use crate::error::Result;
use crate::event::{EventKind, Platform, UniChatEvent};
use crate::render::Renderer;

/// A rendered chat item.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferEntry {
    pub message_id: String,
    pub author_id: Option<String>,
    pub platform: Platform,
    pub channel_id: String,
    pub kind: EventKind,
    pub html: String,
    /// Set by the buffer when the entry is pushed.
    pub expires_at: Option<Instant>,
}

impl BufferEntry {
    pub fn new(
        message_id: impl Into<String>,
        author_id: Option<String>,
        platform: Platform,
        channel_id: impl Into<String>,
        kind: EventKind,
        html: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            author_id,
            platform,
            channel_id: channel_id.into(),
            kind,
            html: html.into(),
            expires_at: None,
        }
    }

    /// Entries from different sessions never match each other.
    fn is_from(&self, platform: Platform, channel_id: &str) -> bool {
        self.platform == platform && self.channel_id == channel_id
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Outcome of a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Appended; `evicted` entries were dropped from the head.
    Added { evicted: usize },
    /// An entry with the same platform, channel and message id is already held.
    Duplicate,
}

#[derive(Debug, Clone)]
pub struct PresentationBuffer {
    capacity: usize,
    display_timeout: Option<Duration>,
    entries: VecDeque<BufferEntry>,
}

impl PresentationBuffer {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize, display_timeout: Option<Duration>) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            display_timeout,
            entries: VecDeque::with_capacity(capacity + 1),
        }
    }

    pub fn from_config(config: &BufferConfig) -> Self {
        Self::new(config.capacity, config.display_timeout())
    }

    pub fn push(&mut self, entry: BufferEntry) -> PushOutcome {
        self.push_at(entry, Instant::now())
    }

    pub fn push_at(&mut self, mut entry: BufferEntry, now: Instant) -> PushOutcome {
        if self.contains(entry.platform, &entry.channel_id, &entry.message_id) {
            trace!(message_id = %entry.message_id, "Ignoring duplicate buffer entry");
            return PushOutcome::Duplicate;
        }

        entry.expires_at = self.display_timeout.map(|timeout| now + timeout);
        self.entries.push_back(entry);

        let mut evicted = 0;
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            evicted += 1;
        }
        PushOutcome::Added { evicted }
    }

    pub fn contains(&self, platform: Platform, channel_id: &str, message_id: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.is_from(platform, channel_id) && e.message_id == message_id)
    }

    /// Remove the entry with this id. Removing an unknown id is a no-op.
    pub fn remove_message(
        &mut self,
        platform: Platform,
        channel_id: &str,
        message_id: &str,
    ) -> bool {
        match self
            .entries
            .iter()
            .position(|e| e.is_from(platform, channel_id) && e.message_id == message_id)
        {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Remove every entry by this author; returns how many were removed.
    pub fn remove_author(
        &mut self,
        platform: Platform,
        channel_id: &str,
        author_id: &str,
    ) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| {
            !(e.is_from(platform, channel_id) && e.author_id.as_deref() == Some(author_id))
        });
        before - self.entries.len()
    }

    /// Drop entries whose display timeout has passed.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !e.is_expired(now));
        before - self.entries.len()
    }

    /// Earliest expiry among the held entries.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.iter().filter_map(|e| e.expires_at).min()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BufferEntry> {
        self.entries.iter()
    }
}

/// Bus sink that renders events into a shared [`PresentationBuffer`].
pub struct BufferSink {
    renderer: Renderer,
    buffer: Mutex<PresentationBuffer>,
    changed: Notify,
}

impl BufferSink {
    pub fn new(renderer: Renderer, buffer: PresentationBuffer) -> Self {
        Self {
            renderer,
            buffer: Mutex::new(buffer),
            changed: Notify::new(),
        }
    }

    /// Current entries, oldest first.
    pub fn snapshot(&self) -> Vec<BufferEntry> {
        self.buffer.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    /// Drop expired entries now.
    pub fn sweep(&self) -> usize {
        self.buffer.lock().evict_expired(Instant::now())
    }

    /// Spawn the task that removes entries when their display timeout passes.
    pub fn spawn_sweeper(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let sink = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let deadline = sink.buffer.lock().next_deadline();
                let expired = async {
                    match deadline {
                        Some(at) => tokio::time::sleep_until(at).await,
                        None => std::future::pending().await,
                    }
                };

                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => break,
                    _ = sink.changed.notified() => {}
                    _ = expired => {
                        let removed = sink.sweep();
                        if removed > 0 {
                            trace!(removed, "Expired buffer entries");
                        }
                    }
                }
            }
            debug!("Buffer sweeper stopped");
        })
    }
}

impl Sink for BufferSink {
    fn name(&self) -> &str {
        "buffer"
    }

    fn on_event(&self, event: &UniChatEvent) -> Result<()> {
        let channel = event.channel();
        match event {
            UniChatEvent::RemoveMessage(p) => {
                self.buffer.lock().remove_message(
                    channel.platform,
                    &channel.channel_id,
                    &p.message_id,
                );
            }
            UniChatEvent::RemoveAuthor(p) => {
                let removed = self.buffer.lock().remove_author(
                    channel.platform,
                    &channel.channel_id,
                    &p.author_id,
                );
                trace!(author_id = %p.author_id, removed, "Removed author entries");
            }
            _ => {
                let Some(entry) = self.renderer.render(event) else {
                    return Ok(());
                };
                if let PushOutcome::Added { evicted } = self.buffer.lock().push(entry) {
                    if evicted > 0 {
                        trace!(evicted, "Evicted oldest buffer entries");
                    }
                    self.changed.notify_one();
                }
            }
        }
        Ok(())
    }
}
