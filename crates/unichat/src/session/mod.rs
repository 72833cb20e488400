//! Scraper sessions.
//!
//! A session owns one protocol adapter and its health state machine:
//!
//! ```text
//! idle --setup--> ready --event/heartbeat--> working <--> error
//!   \               \                          \          /
//!    `---------------`--------------------------`--> fatal
//! ```
//!
//! Frames arrive through a bounded queue ([`session_channel`]); replies the
//! adapter produces (pongs) leave through an unbounded one. Every transition
//! is published on the [`DispatchBus`] as a [`ScraperStatus`].
//!
//! [`ScraperStatus`]: crate::event::ScraperStatus

mod io;
mod runner;
mod state;

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::bus::{DispatchBus, Subscription};
use crate::config::SessionConfig;
use crate::protocol::ChatProtocol;

pub use io::{SessionIo, TransportFrame, TransportHandle, TransportIo, session_channel};
pub use state::SessionState;

use runner::{RunnerParams, SessionRunner};

/// Everything needed to start a session.
pub struct SessionParams {
    pub scraper_id: String,
    /// Page URL the scraper was attached to; echoed in the `ready` status.
    pub url: String,
    pub protocol: Box<dyn ChatProtocol>,
    pub bus: DispatchBus,
    pub setup_timeout: Duration,
    pub heartbeat_interval: Duration,
    /// Bus registrations released on teardown.
    pub subscriptions: Vec<Subscription>,
    /// Closed on teardown.
    pub transport: Option<Box<dyn TransportHandle>>,
}

impl SessionParams {
    /// Parameters with timings taken from `config` for the protocol's platform.
    pub fn new(
        scraper_id: impl Into<String>,
        url: impl Into<String>,
        protocol: Box<dyn ChatProtocol>,
        bus: DispatchBus,
        config: &SessionConfig,
    ) -> Self {
        let platform = protocol.platform();
        Self {
            scraper_id: scraper_id.into(),
            url: url.into(),
            protocol,
            bus,
            setup_timeout: config.setup_timeout(platform),
            heartbeat_interval: config.heartbeat_interval(),
            subscriptions: Vec::new(),
            transport: None,
        }
    }

    pub fn with_subscription(mut self, subscription: Subscription) -> Self {
        self.subscriptions.push(subscription);
        self
    }

    pub fn with_transport(mut self, transport: impl TransportHandle + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }
}

/// Start a session on the current tokio runtime.
pub fn spawn_session(params: SessionParams, io: SessionIo) -> SessionHandle {
    spawn_session_with_token(params, io, CancellationToken::new())
}

/// Start a session whose cancellation is tied to `cancel_token`.
pub fn spawn_session_with_token(
    params: SessionParams,
    io: SessionIo,
    cancel_token: CancellationToken,
) -> SessionHandle {
    let SessionParams {
        scraper_id,
        url,
        protocol,
        bus,
        setup_timeout,
        heartbeat_interval,
        subscriptions,
        transport,
    } = params;
    let SessionIo { frames, replies } = io;

    let (state_tx, state_rx) = watch::channel(SessionState::Idle);
    let runner = SessionRunner::new(RunnerParams {
        scraper_id: scraper_id.clone(),
        url,
        protocol,
        bus,
        state_tx,
        replies,
        setup_timeout,
        heartbeat_interval,
        subscriptions,
        transport,
    });

    let task = tokio::spawn(runner.run(frames, cancel_token.clone()));

    SessionHandle {
        scraper_id,
        state: state_rx,
        cancel_token,
        task,
    }
}

/// Owner's handle to a running session.
#[derive(Debug)]
pub struct SessionHandle {
    scraper_id: String,
    state: watch::Receiver<SessionState>,
    cancel_token: CancellationToken,
    task: JoinHandle<SessionState>,
}

impl SessionHandle {
    pub fn scraper_id(&self) -> &str {
        &self.scraper_id
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the session and wait for its teardown. No status is emitted.
    pub async fn shutdown(self) -> SessionState {
        self.cancel_token.cancel();
        self.join().await
    }

    /// Wait for the session to end on its own.
    pub async fn join(self) -> SessionState {
        match self.task.await {
            Ok(state) => state,
            Err(e) => {
                warn!(scraper_id = %self.scraper_id, error = %e, "Session task failed");
                SessionState::Fatal
            }
        }
    }
}
