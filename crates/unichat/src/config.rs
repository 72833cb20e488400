//! Runtime configuration for sessions, the presentation buffer and the renderer.
//!
//! Every field has a default so a partial (or empty) configuration file is valid.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::error::{Error, Result};
use crate::event::Platform;

/// Default number of rendered entries kept by the presentation buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 50;

/// Default interval between `ping` statuses while a session is working.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 5_000;

/// Default setup deadline. Observed platform values range from 5 to 15 seconds.
pub const DEFAULT_SETUP_TIMEOUT_MS: u64 = 15_000;

const USUAL_SETUP_RANGE_MS: std::ops::RangeInclusive<u64> = 5_000..=15_000;

/// Default chat item template; placeholders are substituted verbatim.
pub const DEFAULT_MESSAGE_TEMPLATE: &str = r#"<div class="chat-item" data-id="{message_id}" data-from="{author_id}" data-platform="{platform}">
  <span class="meta" style="color: {author_color}">
    <span class="badges">{badges}</span>
    <span class="name">{author_display_name}</span>
  </span>
  <span class="message">{message}</span>
</div>"#;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UniChatConfig {
    pub session: SessionConfig,
    pub buffer: BufferConfig,
    pub render: RenderConfig,
    pub dashboard: DashboardConfig,
}

impl UniChatConfig {
    /// Check the configuration for values that cannot work.
    ///
    /// Setup timeouts outside the usual range are accepted but logged.
    pub fn validate(&self) -> Result<()> {
        if self.buffer.capacity == 0 {
            return Err(Error::configuration("buffer.capacity must be at least 1"));
        }
        if self.session.heartbeat_interval_ms == 0 {
            return Err(Error::configuration(
                "session.heartbeat_interval_ms must be greater than 0",
            ));
        }
        if self.session.frame_queue_size == 0 {
            return Err(Error::configuration(
                "session.frame_queue_size must be at least 1",
            ));
        }
        for platform in Platform::ALL {
            let ms = self.session.setup_timeout.for_platform(platform);
            if ms == 0 {
                return Err(Error::configuration(format!(
                    "session.setup_timeout.{platform} must be greater than 0"
                )));
            }
            if !USUAL_SETUP_RANGE_MS.contains(&ms) {
                warn!(
                    platform = %platform,
                    timeout_ms = ms,
                    "Setup timeout is outside the usual 5-15s range"
                );
            }
        }
        if self.dashboard.watchdog_ms <= self.session.heartbeat_interval_ms {
            warn!(
                watchdog_ms = self.dashboard.watchdog_ms,
                heartbeat_ms = self.session.heartbeat_interval_ms,
                "Watchdog interval does not exceed the heartbeat interval; healthy sessions may be reported stale"
            );
        }
        Ok(())
    }
}

/// Per-session timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub heartbeat_interval_ms: u64,
    pub setup_timeout: SetupTimeouts,
    /// Capacity of the inbound frame queue between transport and session.
    pub frame_queue_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            setup_timeout: SetupTimeouts::default(),
            frame_queue_size: 256,
        }
    }
}

impl SessionConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn setup_timeout(&self, platform: Platform) -> Duration {
        Duration::from_millis(self.setup_timeout.for_platform(platform))
    }
}

/// Setup deadline per platform, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SetupTimeouts {
    pub kick: u64,
    pub twitch: u64,
    pub youtube: u64,
}

impl Default for SetupTimeouts {
    fn default() -> Self {
        Self {
            kick: DEFAULT_SETUP_TIMEOUT_MS,
            twitch: DEFAULT_SETUP_TIMEOUT_MS,
            youtube: DEFAULT_SETUP_TIMEOUT_MS,
        }
    }
}

impl SetupTimeouts {
    pub fn for_platform(&self, platform: Platform) -> u64 {
        match platform {
            Platform::Kick => self.kick,
            Platform::Twitch => self.twitch,
            Platform::YouTube => self.youtube,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BufferConfig {
    pub capacity: usize,
    /// Time an entry stays visible; `0` keeps entries until evicted or removed.
    pub display_timeout_ms: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_BUFFER_CAPACITY,
            display_timeout_ms: 60_000,
        }
    }
}

impl BufferConfig {
    pub fn display_timeout(&self) -> Option<Duration> {
        (self.display_timeout_ms > 0).then(|| Duration::from_millis(self.display_timeout_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    pub message_template: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            message_template: DEFAULT_MESSAGE_TEMPLATE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    /// A scraper silent for longer than this is reported as implicitly fatal.
    pub watchdog_ms: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self { watchdog_ms: 30_000 }
    }
}

impl DashboardConfig {
    pub fn watchdog(&self) -> Duration {
        Duration::from_millis(self.watchdog_ms)
    }
}
