//! The task that drives one scraper session.

use std::pin::Pin;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::SessionState;
use super::io::{TransportFrame, TransportHandle};
use crate::bus::{DispatchBus, Subscription};
use crate::event::{Platform, ScraperStatus, StatusKind, UniChatEvent};
use crate::protocol::{AdapterSignal, ChatProtocol};

/// Result of handling one wake-up - indicates whether to continue or stop.
#[derive(Debug, PartialEq)]
pub(crate) enum CommandResult {
    Continue,
    Stop,
}

/// What woke the session loop.
enum Wake {
    Cancelled,
    Frame(Option<TransportFrame>),
    SetupTimeout,
    Heartbeat,
}

/// Timers owned by the session. Both are dropped by teardown.
struct SessionTimers {
    setup: Option<Pin<Box<Sleep>>>,
    heartbeat: Option<Interval>,
    heartbeat_period: Duration,
}

impl SessionTimers {
    fn new(setup_timeout: Duration, heartbeat_period: Duration) -> Self {
        Self {
            setup: Some(Box::pin(tokio::time::sleep(setup_timeout))),
            heartbeat: None,
            heartbeat_period,
        }
    }

    fn cancel_setup(&mut self) -> bool {
        self.setup.take().is_some()
    }

    /// Start the heartbeat; the first tick fires one period from now.
    fn start_heartbeat(&mut self) {
        if self.heartbeat.is_some() {
            return;
        }
        let mut interval = tokio::time::interval_at(
            Instant::now() + self.heartbeat_period,
            self.heartbeat_period,
        );
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.heartbeat = Some(interval);
    }

    fn stop_heartbeat(&mut self) -> bool {
        self.heartbeat.take().is_some()
    }
}

async fn setup_elapsed(setup: &mut Option<Pin<Box<Sleep>>>) {
    match setup {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn heartbeat_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Parameters for creating a new session runner.
pub(crate) struct RunnerParams {
    pub scraper_id: String,
    pub url: String,
    pub protocol: Box<dyn ChatProtocol>,
    pub bus: DispatchBus,
    pub state_tx: watch::Sender<SessionState>,
    pub replies: mpsc::UnboundedSender<String>,
    pub setup_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub subscriptions: Vec<Subscription>,
    pub transport: Option<Box<dyn TransportHandle>>,
}

/// State machine for one scraper session.
pub(crate) struct SessionRunner {
    scraper_id: String,
    url: String,
    platform: Platform,
    protocol: Box<dyn ChatProtocol>,
    bus: DispatchBus,
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    replies: mpsc::UnboundedSender<String>,
    timers: SessionTimers,
    subscriptions: Vec<Subscription>,
    transport: Option<Box<dyn TransportHandle>>,
}

impl SessionRunner {
    pub fn new(params: RunnerParams) -> Self {
        let RunnerParams {
            scraper_id,
            url,
            protocol,
            bus,
            state_tx,
            replies,
            setup_timeout,
            heartbeat_interval,
            subscriptions,
            transport,
        } = params;

        Self {
            platform: protocol.platform(),
            scraper_id,
            url,
            protocol,
            bus,
            state: SessionState::Idle,
            state_tx,
            replies,
            timers: SessionTimers::new(setup_timeout, heartbeat_interval),
            subscriptions,
            transport,
        }
    }

    /// Run until the session turns fatal or is cancelled, then tear down.
    pub async fn run(
        mut self,
        mut frames: mpsc::Receiver<TransportFrame>,
        cancel_token: CancellationToken,
    ) -> SessionState {
        info!(scraper_id = %self.scraper_id, platform = %self.platform, "Session started");
        self.emit(StatusKind::Idle);

        loop {
            let wake = tokio::select! {
                biased;

                _ = cancel_token.cancelled() => Wake::Cancelled,
                // Ahead of frames so queued noise cannot push the deadline back.
                _ = setup_elapsed(&mut self.timers.setup) => Wake::SetupTimeout,
                frame = frames.recv() => Wake::Frame(frame),
                _ = heartbeat_tick(&mut self.timers.heartbeat) => Wake::Heartbeat,
            };

            let result = match wake {
                Wake::Cancelled => {
                    debug!(scraper_id = %self.scraper_id, "Session cancelled");
                    CommandResult::Stop
                }
                Wake::Frame(frame) => self.handle_frame(frame),
                Wake::SetupTimeout => self.handle_setup_timeout(),
                Wake::Heartbeat => self.handle_heartbeat(),
            };

            if result == CommandResult::Stop {
                break;
            }
        }

        self.teardown();
        self.state
    }

    fn handle_frame(&mut self, frame: Option<TransportFrame>) -> CommandResult {
        let text = match frame {
            Some(TransportFrame::Text(text)) => text,
            Some(TransportFrame::Closed { reason }) => {
                let message = match reason {
                    Some(reason) => format!("transport closed: {reason}"),
                    None => "transport closed".to_string(),
                };
                return self.fatal(message);
            }
            None => return self.fatal("transport closed".to_string()),
        };

        let signals = match self.protocol.decode_frame(&text) {
            Ok(signals) => signals,
            Err(e) => {
                self.fault(e.to_string());
                return CommandResult::Continue;
            }
        };

        for signal in signals {
            if self.handle_signal(signal) == CommandResult::Stop {
                return CommandResult::Stop;
            }
        }
        CommandResult::Continue
    }

    fn handle_signal(&mut self, signal: AdapterSignal) -> CommandResult {
        match signal {
            AdapterSignal::SetupConfirmed(meta) => {
                if self.state != SessionState::Idle {
                    trace!(scraper_id = %self.scraper_id, "Ignoring repeated setup confirmation");
                    return CommandResult::Continue;
                }
                self.timers.cancel_setup();
                self.set_state(SessionState::Ready);
                self.timers.start_heartbeat();
                info!(
                    scraper_id = %self.scraper_id,
                    channel_id = %meta.channel_id,
                    "Session ready"
                );
                self.emit(StatusKind::Ready {
                    url: self.url.clone(),
                    meta,
                });
            }
            AdapterSignal::Event(event) => self.handle_event(event),
            AdapterSignal::Reply(reply) => {
                if self.replies.send(reply).is_err() {
                    debug!(scraper_id = %self.scraper_id, "No transport to carry reply");
                }
            }
            AdapterSignal::Fault(message) => self.fault(message),
            AdapterSignal::Unrecoverable(message) => return self.fatal(message),
        }
        CommandResult::Continue
    }

    fn handle_event(&mut self, event: UniChatEvent) {
        trace!(scraper_id = %self.scraper_id, kind = event.kind().wire_name(), "Publishing event");
        self.bus.publish_event(&event);

        if matches!(self.state, SessionState::Ready | SessionState::Error) {
            self.set_state(SessionState::Working);
            self.emit(StatusKind::Ping);
        }
    }

    fn handle_heartbeat(&mut self) -> CommandResult {
        match self.state {
            SessionState::Ready | SessionState::Error => {
                self.set_state(SessionState::Working);
                self.emit(StatusKind::Ping);
            }
            SessionState::Working => self.emit(StatusKind::Ping),
            SessionState::Idle | SessionState::Fatal => {}
        }
        CommandResult::Continue
    }

    fn handle_setup_timeout(&mut self) -> CommandResult {
        self.timers.setup = None;
        self.fatal(format!("timeout waiting for {} setup", self.platform))
    }

    /// A recoverable fault: frame-local, the transport is still alive.
    fn fault(&mut self, message: String) {
        warn!(scraper_id = %self.scraper_id, error = %message, "Frame processing failed");
        match self.state {
            SessionState::Working => {
                self.set_state(SessionState::Error);
                self.emit(StatusKind::Error {
                    message,
                    stack: None,
                });
            }
            SessionState::Error => self.emit(StatusKind::Error {
                message,
                stack: None,
            }),
            SessionState::Idle | SessionState::Ready | SessionState::Fatal => {}
        }
    }

    /// Terminal failure: emits exactly one fatal status.
    fn fatal(&mut self, message: String) -> CommandResult {
        if self.state.is_terminal() {
            return CommandResult::Stop;
        }
        error!(scraper_id = %self.scraper_id, error = %message, "Session failed");
        self.set_state(SessionState::Fatal);
        self.emit(StatusKind::Fatal {
            message,
            stack: None,
        });
        CommandResult::Stop
    }

    fn set_state(&mut self, target: SessionState) {
        match self.state.transition(target) {
            Ok(()) => {
                self.state_tx.send_replace(target);
            }
            Err(e) => warn!(scraper_id = %self.scraper_id, error = %e, "Ignoring state change"),
        }
    }

    fn emit(&self, kind: StatusKind) {
        self.bus
            .publish_status(&ScraperStatus::new(self.scraper_id.clone(), kind));
    }

    /// Release everything the session owns. Every step runs regardless of
    /// what the previous ones found.
    fn teardown(&mut self) {
        let setup_cancelled = self.timers.cancel_setup();
        let heartbeat_stopped = self.timers.stop_heartbeat();
        let unsubscribed = self
            .subscriptions
            .drain(..)
            .filter(|subscription| subscription.unsubscribe())
            .count();
        let transport_closed = match self.transport.take() {
            Some(transport) => {
                transport.close();
                true
            }
            None => false,
        };

        info!(
            scraper_id = %self.scraper_id,
            state = %self.state,
            setup_cancelled,
            heartbeat_stopped,
            unsubscribed,
            transport_closed,
            "Session torn down"
        );
    }
}
