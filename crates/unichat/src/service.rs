//! Host service: owns the scraper registry, the dispatch bus and the running
//! sessions.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::{RwLock, RwLockReadGuard};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::bus::DispatchBus;
use crate::config::UniChatConfig;
use crate::error::{Error, Result};
use crate::registry::{ScraperDescriptor, ScraperRegistry};
use crate::session::{
    SessionHandle, SessionParams, SessionState, TransportIo, session_channel,
    spawn_session_with_token,
};
use crate::transport::WebSocketTransport;

pub struct UniChatHost {
    config: UniChatConfig,
    registry: RwLock<ScraperRegistry>,
    bus: DispatchBus,
    sessions: DashMap<String, SessionHandle>,
    cancel_token: CancellationToken,
}

impl UniChatHost {
    pub fn new(config: UniChatConfig, registry: ScraperRegistry) -> Self {
        Self {
            config,
            registry: RwLock::new(registry),
            bus: DispatchBus::new(),
            sessions: DashMap::new(),
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &UniChatConfig {
        &self.config
    }

    pub fn bus(&self) -> &DispatchBus {
        &self.bus
    }

    pub fn registry(&self) -> RwLockReadGuard<'_, ScraperRegistry> {
        self.registry.read()
    }

    /// Replace the registry. Running sessions are not affected.
    pub fn refresh_registry(&self, registry: ScraperRegistry) {
        *self.registry.write() = registry;
    }

    fn resolve(&self, scraper_id: &str, url: &str) -> Result<ScraperDescriptor> {
        self.registry.read().resolve(scraper_id, url).cloned()
    }

    /// Start a session whose frames the caller feeds through the returned
    /// [`TransportIo`] (polling hosts, replays).
    pub fn attach(&self, scraper_id: &str, url: &str) -> Result<TransportIo> {
        let descriptor = self.resolve(scraper_id, url)?;
        self.start(&descriptor, url, None)
    }

    /// Start a session backed by the platform WebSocket.
    ///
    /// `channel` overrides the handle extracted from `url`; Kick needs the
    /// numeric chatroom id here.
    pub async fn connect(&self, scraper_id: &str, url: &str, channel: Option<&str>) -> Result<()> {
        let descriptor = self.resolve(scraper_id, url)?;
        let protocol = descriptor.protocol();

        let channel = match channel {
            Some(channel) => channel.to_string(),
            None => protocol
                .extract_channel(url)
                .ok_or_else(|| Error::setup(format!("no channel in '{url}'")))?,
        };
        let ws_url = protocol.websocket_url(&channel).await?.ok_or_else(|| {
            Error::setup(format!(
                "{} has no WebSocket transport; feed frames with attach",
                descriptor.platform
            ))
        })?;
        let handshake = protocol.handshake_messages(&channel).await?;

        let transport_token = self.cancel_token.child_token();
        let io = self.start(&descriptor, url, Some(transport_token.clone()))?;
        WebSocketTransport::new(ws_url, handshake).spawn(io, transport_token);
        Ok(())
    }

    fn start(
        &self,
        descriptor: &ScraperDescriptor,
        url: &str,
        transport: Option<CancellationToken>,
    ) -> Result<TransportIo> {
        let spawn = || {
            let (transport_io, session_io) = session_channel(self.config.session.frame_queue_size);
            let mut params = SessionParams::new(
                descriptor.id.clone(),
                url,
                descriptor.protocol(),
                self.bus.clone(),
                &self.config.session,
            );
            if let Some(token) = transport {
                params = params.with_transport(token);
            }
            let handle =
                spawn_session_with_token(params, session_io, self.cancel_token.child_token());
            (transport_io, handle)
        };

        match self.sessions.entry(descriptor.id.clone()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_finished() {
                    return Err(Error::registry(format!(
                        "scraper '{}' is already attached",
                        descriptor.id
                    )));
                }
                debug!(scraper_id = %descriptor.id, "Replacing finished session");
                let (transport_io, handle) = spawn();
                occupied.insert(handle);
                info!(scraper_id = %descriptor.id, url, "Scraper attached");
                Ok(transport_io)
            }
            Entry::Vacant(vacant) => {
                let (transport_io, handle) = spawn();
                vacant.insert(handle);
                info!(scraper_id = %descriptor.id, url, "Scraper attached");
                Ok(transport_io)
            }
        }
    }

    pub fn state(&self, scraper_id: &str) -> Option<SessionState> {
        self.sessions.get(scraper_id).map(|handle| handle.state())
    }

    /// Watch the state of an attached session.
    pub fn subscribe_state(&self, scraper_id: &str) -> Option<watch::Receiver<SessionState>> {
        self.sessions
            .get(scraper_id)
            .map(|handle| handle.subscribe_state())
    }

    /// Ids of attached sessions, sorted.
    pub fn attached(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.sessions.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Tear down one session. Returns its final state, or `None` if it was not attached.
    pub async fn detach(&self, scraper_id: &str) -> Option<SessionState> {
        let (_, handle) = self.sessions.remove(scraper_id)?;
        let state = handle.shutdown().await;
        info!(scraper_id, state = %state, "Scraper detached");
        Some(state)
    }

    /// Wait for a session to end on its own and release it.
    pub async fn join(&self, scraper_id: &str) -> Option<SessionState> {
        let (_, handle) = self.sessions.remove(scraper_id)?;
        Some(handle.join().await)
    }

    /// Tear down every session and drop the registry.
    pub async fn shutdown(&self) {
        self.cancel_token.cancel();
        let ids = self.attached();
        for id in &ids {
            if let Some((_, handle)) = self.sessions.remove(id) {
                handle.join().await;
            }
        }
        self.registry.write().clear();
        info!(sessions = ids.len(), "Host shut down");
    }
}
