//! UniChat: live chat normalization for Twitch, Kick and YouTube.
//!
//! Platform frames go in, one canonical event stream comes out.
//!
//! ## Core Types
//!
//! - [`UniChatEvent`] - Canonical chat event (message, removals, raid, sponsor, donate)
//! - [`ScraperStatus`] - Health signal of one scraper session
//! - [`ChatProtocol`] - Trait for platform-specific frame decoding
//!
//! ## Runtime
//!
//! - [`session`] - Per-scraper session state machine (setup, heartbeat, teardown)
//! - [`DispatchBus`] - Synchronous fan-out to registered [`Sink`]s
//! - [`UniChatHost`] - Owns the registry, the bus and the running sessions
//! - [`WebSocketTransport`] - Socket pump for Kick and Twitch
//!
//! ## Presentation
//!
//! - [`Renderer`] - Fills the overlay message template
//! - [`PresentationBuffer`] - Bounded FIFO of rendered entries
//! - [`sinks::HealthBoard`] - Latest status per scraper with a watchdog

pub mod buffer;
pub mod bus;
pub mod config;
pub mod error;
pub mod event;
pub mod protocol;
pub mod registry;
pub mod render;
pub mod service;
pub mod session;
pub mod sinks;
pub mod transport;

pub use buffer::{BufferEntry, BufferSink, PresentationBuffer};
pub use bus::{DispatchBus, Sink, Subscription};
pub use config::UniChatConfig;
pub use error::{Error, Result};
pub use event::{Platform, ScraperStatus, StatusKind, UniChatEvent};
pub use protocol::{AdapterSignal, ChatProtocol, protocol_for};
pub use registry::{ScraperDescriptor, ScraperRegistry};
pub use render::Renderer;
pub use service::UniChatHost;
pub use session::{SessionHandle, SessionParams, SessionState};
pub use transport::WebSocketTransport;
