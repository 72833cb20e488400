//! In-process fan-out of canonical events and scraper statuses.
//!
//! The sink list is copy-on-write: `publish_*` clones the current `Arc` under a
//! short read lock and iterates the snapshot without holding any lock, so
//! sessions can publish while sinks are being added or removed.

use parking_lot::RwLock;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{trace, warn};

use crate::error::Result;
use crate::event::{ScraperStatus, UniChatEvent};

/// A consumer of the dispatch bus.
///
/// Sinks run on the publishing session's task and must not block; anything
/// slow belongs behind a queue owned by the sink.
pub trait Sink: Send + Sync {
    fn name(&self) -> &str;

    fn on_event(&self, event: &UniChatEvent) -> Result<()>;

    fn on_status(&self, _status: &ScraperStatus) -> Result<()> {
        Ok(())
    }
}

type SinkList = Arc<Vec<(u64, Arc<dyn Sink>)>>;

#[derive(Default)]
struct BusInner {
    sinks: RwLock<SinkList>,
    next_id: AtomicU64,
}

impl BusInner {
    fn remove(&self, id: u64) -> bool {
        let mut sinks = self.sinks.write();
        let Some(pos) = sinks.iter().position(|(sink_id, _)| *sink_id == id) else {
            return false;
        };
        let mut next = Vec::clone(&sinks);
        next.remove(pos);
        *sinks = Arc::new(next);
        true
    }
}

/// Best-effort, at-most-once fan-out to every registered sink, in
/// registration order.
#[derive(Clone, Default)]
pub struct DispatchBus {
    inner: Arc<BusInner>,
}

impl DispatchBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink; it receives everything published from now on.
    pub fn subscribe(&self, sink: Arc<dyn Sink>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let name = sink.name().to_string();
        {
            let mut sinks = self.inner.sinks.write();
            let mut next = Vec::clone(&sinks);
            next.push((id, sink));
            *sinks = Arc::new(next);
        }
        trace!(sink = %name, id, "Sink subscribed");

        Subscription {
            bus: Arc::downgrade(&self.inner),
            id,
            name,
            active: AtomicBool::new(true),
        }
    }

    pub fn sink_count(&self) -> usize {
        self.inner.sinks.read().len()
    }

    fn snapshot(&self) -> SinkList {
        Arc::clone(&self.inner.sinks.read())
    }

    pub fn publish_event(&self, event: &UniChatEvent) {
        self.deliver("event", |sink| sink.on_event(event));
    }

    pub fn publish_status(&self, status: &ScraperStatus) {
        self.deliver("status", |sink| sink.on_status(status));
    }

    /// Call `f` for every sink of the current snapshot. A failing or
    /// panicking sink is logged and skipped.
    fn deliver<F>(&self, what: &str, f: F)
    where
        F: Fn(&dyn Sink) -> Result<()>,
    {
        let sinks = self.snapshot();
        for (_, sink) in sinks.iter() {
            match catch_unwind(AssertUnwindSafe(|| f(sink.as_ref()))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(sink = sink.name(), error = %e, "Sink failed to handle {}", what);
                }
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    warn!(sink = sink.name(), panic = %message, "Sink panicked while handling {}", what);
                }
            }
        }
    }
}

impl std::fmt::Debug for DispatchBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchBus")
            .field("sinks", &self.sink_count())
            .finish()
    }
}

/// Registration handle returned by [`DispatchBus::subscribe`].
///
/// Dropping it does not unsubscribe; call [`Subscription::unsubscribe`].
#[derive(Debug)]
pub struct Subscription {
    bus: Weak<BusInner>,
    id: u64,
    name: String,
    active: AtomicBool,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn sink_name(&self) -> &str {
        &self.name
    }

    /// Remove the sink from the bus. Returns `true` only for the call that
    /// actually removed it.
    pub fn unsubscribe(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        let removed = self
            .bus
            .upgrade()
            .map(|bus| bus.remove(self.id))
            .unwrap_or(false);
        trace!(sink = %self.name, id = self.id, removed, "Sink unsubscribed");
        removed
    }
}
