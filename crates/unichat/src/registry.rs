//! Registry of available chat scrapers.
//!
//! The host creates one registry at startup and passes it around explicitly.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::event::Platform;
use crate::protocol::{ChatProtocol, protocol_for};

/// A scraper the host can attach to a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScraperDescriptor {
    pub id: String,
    pub name: String,
    pub platform: Platform,
}

impl ScraperDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, platform: Platform) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            platform,
        }
    }

    /// A fresh protocol adapter for this scraper.
    pub fn protocol(&self) -> Box<dyn ChatProtocol> {
        protocol_for(self.platform)
    }

    pub fn supports_url(&self, url: &str) -> bool {
        self.protocol().supports_url(url)
    }
}

/// Scraper ids are ASCII alphanumerics, `_` or `-`, ending in `-chat`.
pub fn validate_scraper_id(id: &str) -> Result<()> {
    let Some(stem) = id.strip_suffix("-chat") else {
        return Err(Error::registry(format!(
            "scraper id '{id}' must end with '-chat'"
        )));
    };
    if stem.is_empty() {
        return Err(Error::registry("scraper id needs a name before '-chat'"));
    }
    if let Some(c) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(Error::registry(format!(
            "scraper id '{id}' contains invalid character '{c}'"
        )));
    }
    Ok(())
}

/// Registered scrapers, keyed by id.
#[derive(Debug, Default, Clone)]
pub struct ScraperRegistry {
    scrapers: BTreeMap<String, ScraperDescriptor>,
}

impl ScraperRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in scrapers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for platform in Platform::ALL {
            let descriptor = ScraperDescriptor::new(
                format!("{}-chat", platform.as_str()),
                format!("{} Chat", display_name(platform)),
                platform,
            );
            let registered = registry.register(descriptor);
            debug_assert!(registered.is_ok(), "built-in scraper rejected: {registered:?}");
        }
        registry
    }

    /// Register a scraper. Invalid or duplicate ids are rejected.
    pub fn register(&mut self, descriptor: ScraperDescriptor) -> Result<()> {
        validate_scraper_id(&descriptor.id)?;
        if self.scrapers.contains_key(&descriptor.id) {
            return Err(Error::registry(format!(
                "scraper '{}' is already registered",
                descriptor.id
            )));
        }
        self.scrapers.insert(descriptor.id.clone(), descriptor);
        Ok(())
    }

    pub fn unregister(&mut self, id: &str) -> Option<ScraperDescriptor> {
        self.scrapers.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&ScraperDescriptor> {
        self.scrapers.get(id)
    }

    /// First scraper (by id) whose platform accepts the page URL.
    pub fn by_url(&self, url: &str) -> Option<&ScraperDescriptor> {
        self.scrapers.values().find(|s| s.supports_url(url))
    }

    /// Look up `id` and check that it accepts `url`.
    pub fn resolve(&self, id: &str, url: &str) -> Result<&ScraperDescriptor> {
        let descriptor = self
            .get(id)
            .ok_or_else(|| Error::registry(format!("unknown scraper '{id}'")))?;
        if !descriptor.supports_url(url) {
            return Err(Error::registry(format!(
                "'{url}' is not a {} page",
                descriptor.platform
            )));
        }
        Ok(descriptor)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.scrapers.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScraperDescriptor> {
        self.scrapers.values()
    }

    pub fn len(&self) -> usize {
        self.scrapers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scrapers.is_empty()
    }

    pub fn clear(&mut self) {
        self.scrapers.clear();
    }
}

fn display_name(platform: Platform) -> &'static str {
    match platform {
        Platform::Kick => "Kick",
        Platform::Twitch => "Twitch",
        Platform::YouTube => "YouTube",
    }
}
