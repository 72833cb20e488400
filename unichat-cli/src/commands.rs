use anyhow::{Context, Result, bail};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use unichat::session::TransportFrame;
use unichat::sinks::{HealthBoard, WireForwarder};
use unichat::{
    BufferSink, Platform, PresentationBuffer, Renderer, ScraperRegistry, SessionState,
    UniChatConfig, UniChatHost,
};

/// Reason attached to the close frame that ends a replay.
const END_OF_REPLAY: &str = "end of replay";

pub struct CommandExecutor {
    config: UniChatConfig,
}

impl CommandExecutor {
    pub fn new(config: UniChatConfig) -> Self {
        Self { config }
    }

    pub fn list_scrapers(&self) {
        let registry = ScraperRegistry::with_defaults();
        for scraper in registry.iter() {
            println!("{:<16} {:<8} {}", scraper.id, scraper.platform, scraper.name);
        }
    }

    /// Feed a capture file through one session and print every wire message.
    ///
    /// The replay ends with a transport close, so the last status is `fatal`.
    pub async fn replay(
        &self,
        scraper_id: &str,
        file: &Path,
        channel: &str,
        url: Option<&str>,
        render: bool,
    ) -> Result<()> {
        let content = tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;

        let registry = ScraperRegistry::with_defaults();
        let platform = registry
            .get(scraper_id)
            .map(|s| s.platform)
            .with_context(|| format!("Unknown scraper '{scraper_id}'"))?;
        let url = match url {
            Some(url) => url.to_string(),
            None => page_url(platform, channel)?,
        };

        let host = UniChatHost::new(self.config.clone(), registry);
        let (forwarder, mut wire) = WireForwarder::new();
        host.bus().subscribe(Arc::new(forwarder));
        let buffer = Arc::new(BufferSink::new(
            Renderer::from_config(&self.config.render),
            PresentationBuffer::from_config(&self.config.buffer),
        ));
        if render {
            host.bus().subscribe(buffer.clone());
        }

        let io = host.attach(scraper_id, &url)?;
        let mut frames = 0usize;
        for line in content.lines().map(str::trim_end).filter(|l| !l.is_empty()) {
            if io
                .frames
                .send(TransportFrame::Text(line.to_string()))
                .await
                .is_err()
            {
                warn!(frames, "Session ended before the replay finished");
                break;
            }
            frames += 1;
        }
        // Ignored if the session already ended.
        let _ = io
            .frames
            .send(TransportFrame::Closed {
                reason: Some(END_OF_REPLAY.to_string()),
            })
            .await;

        let state = host.join(scraper_id).await.unwrap_or(SessionState::Fatal);
        info!(scraper_id, frames, state = %state, "Replay finished");

        while let Ok(message) = wire.try_recv() {
            println!("{}", message.as_str());
        }
        if render {
            for entry in buffer.snapshot() {
                println!("{}", entry.html);
            }
        }

        host.shutdown().await;
        Ok(())
    }

    /// Stream a live chat until Ctrl-C or until the session fails.
    pub async fn connect(
        &self,
        url: &str,
        scraper_id: Option<&str>,
        chatroom_id: Option<&str>,
    ) -> Result<()> {
        let registry = ScraperRegistry::with_defaults();
        let scraper_id = match scraper_id {
            Some(id) => id.to_string(),
            None => registry
                .by_url(url)
                .map(|s| s.id.clone())
                .with_context(|| format!("No scraper accepts {url}"))?,
        };

        let host = UniChatHost::new(self.config.clone(), registry);
        let (forwarder, mut wire) = WireForwarder::new();
        let health = Arc::new(HealthBoard::from_config(&self.config.dashboard));
        host.bus().subscribe(Arc::new(forwarder));
        host.bus().subscribe(health.clone());

        host.connect(&scraper_id, url, chatroom_id).await?;
        let mut state = host
            .subscribe_state(&scraper_id)
            .context("Session was not attached")?;

        let printer = tokio::spawn(async move {
            while let Some(message) = wire.recv().await {
                println!("{}", message.as_str());
            }
        });

        let mut watchdog = tokio::time::interval(health.watchdog());
        watchdog.tick().await;
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, shutting down");
                    break;
                }
                _ = state.wait_for(SessionState::is_terminal) => {
                    warn!(scraper_id = %scraper_id, "Session ended");
                    break;
                }
                _ = watchdog.tick() => {
                    if let Some(h) = health.health(&scraper_id).filter(|h| h.stale) {
                        warn!(scraper_id = %h.scraper_id, "No status within the watchdog interval");
                    }
                }
            }
        }

        host.shutdown().await;
        for h in health.report() {
            info!(
                scraper_id = %h.scraper_id,
                state = %h.state,
                message = h.message.as_deref().unwrap_or(""),
                "Final scraper health"
            );
        }

        // Dropping the host drops the forwarder, which ends the printer.
        drop(host);
        let _ = printer.await;
        Ok(())
    }
}

/// Page URL for a channel name on `platform`.
fn page_url(platform: Platform, channel: &str) -> Result<String> {
    match platform {
        Platform::Kick => Ok(format!("https://kick.com/{channel}")),
        Platform::Twitch => Ok(format!("https://www.twitch.tv/{channel}")),
        Platform::YouTube => {
            let url = format!("https://www.youtube.com/watch?v={channel}");
            if !ScraperRegistry::with_defaults()
                .by_url(&url)
                .is_some_and(|s| s.platform == Platform::YouTube)
            {
                bail!("YouTube replays need --url or a video id as --channel");
            }
            Ok(url)
        }
    }
}
