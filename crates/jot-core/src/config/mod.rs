//! Client configuration.
//!
//! A `ClientConfig` tells a client where its notes server lives, who the
//! current user is and how to tune sync. It is stored as pretty JSON and can be
//! overridden from the environment (`JOT_SERVER_URL`, `JOT_USERNAME`).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::remote::{Endpoint, HttpClientOptions};
use crate::sync::SyncSettings;
use crate::util::normalize_text_option;

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const SERVER_URL_ENV: &str = "JOT_SERVER_URL";
pub const USERNAME_ENV: &str = "JOT_USERNAME";

const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    /// Notes server; `/notes` is appended unless already present
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub sync: SyncOverrides,
}

/// Optional overrides of [`SyncSettings`] and [`HttpClientOptions`] defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SyncOverrides {
    /// `false` keeps every note local
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_interval_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_interval_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_interval_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_fallback: Option<bool>,
}

const fn default_config_version() -> u32 {
    CONFIG_VERSION
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server_url: None,
            username: None,
            sync: SyncOverrides::default(),
        }
    }
}

impl ClientConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|error| {
            Error::Config(format!(
                "Failed to read config at {}: {error}",
                path.display()
            ))
        })?;
        let mut config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            Error::Config(format!(
                "Failed to parse config at {}: {error}",
                path.display()
            ))
        })?;
        config.normalize();
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                Error::Config(format!(
                    "Failed to create config directory {}: {error}",
                    parent.display()
                ))
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)?;
        std::fs::write(path, serialized).map_err(|error| {
            Error::Config(format!(
                "Failed to write config at {}: {error}",
                path.display()
            ))
        })
    }

    /// Trim values and drop blank ones.
    pub fn normalize(&mut self) {
        self.server_url = normalize_text_option(self.server_url.take())
            .map(|url| url.trim_end_matches('/').to_string());
        self.username = normalize_text_option(self.username.take());
    }

    /// Apply `JOT_SERVER_URL` / `JOT_USERNAME` from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup. Blank values are
    /// ignored.
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = normalize_text_option(lookup(SERVER_URL_ENV)) {
            self.server_url = Some(url);
        }
        if let Some(username) = normalize_text_option(lookup(USERNAME_ENV)) {
            self.username = Some(username);
        }
        self.normalize();
        self
    }

    /// Notes endpoint, or `None` when sync is switched off.
    ///
    /// Without a configured server the default local endpoint is used.
    pub fn endpoint(&self) -> Result<Option<Endpoint>> {
        if self.sync.enabled == Some(false) {
            return Ok(None);
        }
        Endpoint::resolve(self.server_url.as_deref()).map(Some)
    }

    pub fn sync_settings(&self) -> SyncSettings {
        let mut settings = SyncSettings::default();
        let overrides = &self.sync;
        if let Some(secs) = overrides.min_interval_secs {
            settings.min_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = overrides.active_interval_secs {
            settings.active_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = overrides.background_interval_secs {
            settings.background_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(ms) = overrides.debounce_ms {
            settings.debounce = Duration::from_millis(ms);
        }
        if let Some(max_retries) = overrides.max_retries {
            settings.max_retries = max_retries;
        }
        settings
    }

    pub fn http_options(&self) -> HttpClientOptions {
        let mut options = HttpClientOptions::default();
        if let Some(secs) = self.sync.request_timeout_secs {
            options.timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(fallback) = self.sync.http_fallback {
            options.http_fallback = fallback;
        }
        options
    }
}
