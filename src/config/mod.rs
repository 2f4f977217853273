// src/config/mod.rs
pub mod notify;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::evaluate::Subscriber;
use crate::geo::Location;
use crate::notify::{ChannelKind, ChannelMap};
use self::notify::NotifyConfig;

pub const ENV_CONFIG_PATH: &str = "QUAKE_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/quake.toml";
const ENV_TEST_MODE: &str = "QUAKE_TEST_MODE";
const ENV_DEBUG: &str = "QUAKE_DEBUG";
const ENV_SMTP_PASSWORD: &str = "SMTP_PASSWORD";

fn default_poll_interval_secs() -> u64 {
    1
}
fn default_request_timeout_secs() -> u64 {
    5
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub debug: bool,
    /// Disables startup seeding and notifies every subscriber of every event.
    #[serde(default)]
    pub test: bool,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub subscribers: Vec<SubscriberConfig>,
}

/// Which upstream feeds to poll.
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_true")]
    pub cenc: bool,
    #[serde(default = "default_true")]
    pub sichuan: bool,
    #[serde(default = "default_true")]
    pub fujian: bool,
    #[serde(default)]
    pub chinaeew: bool,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            cenc: true,
            sichuan: true,
            fujian: true,
            chinaeew: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriberConfig {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub mail: Vec<String>,
    #[serde(default)]
    pub push: Vec<String>,
    #[serde(default)]
    pub chat: Vec<String>,
    #[serde(default)]
    pub sms: Vec<String>,
}

impl SubscriberConfig {
    pub fn to_subscriber(&self) -> Subscriber {
        let mut channels = ChannelMap::new();
        for (kind, list) in [
            (ChannelKind::Mail, &self.mail),
            (ChannelKind::Push, &self.push),
            (ChannelKind::Chat, &self.chat),
            (ChannelKind::Sms, &self.sms),
        ] {
            let cleaned: Vec<String> = list
                .iter()
                .map(|a| a.trim())
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .collect();
            if !cleaned.is_empty() {
                channels.insert(kind, cleaned);
            }
        }

        Subscriber {
            name: self.name.clone(),
            home: Location::new(self.latitude, self.longitude),
            channels,
        }
    }
}

impl AppConfig {
    /// Parse and validate without touching the environment.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s).context("parsing config toml")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from an explicit path, then apply env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let mut cfg = Self::from_toml_str(&content)
            .with_context(|| format!("loading config {}", path.display()))?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Resolve the config path:
    /// 1) explicit path (first CLI argument)
    /// 2) $QUAKE_CONFIG_PATH
    /// 3) config/quake.toml
    pub fn load_default(explicit: Option<PathBuf>) -> Result<Self> {
        if let Some(p) = explicit {
            return Self::load_from(&p);
        }
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        Self::load_from(Path::new(DEFAULT_CONFIG_PATH))
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_flag(ENV_TEST_MODE) {
            self.test = v;
        }
        if let Some(v) = env_flag(ENV_DEBUG) {
            self.debug = v;
        }
        if let Ok(pass) = std::env::var(ENV_SMTP_PASSWORD) {
            if let Some(smtp) = self.notify.smtp.as_mut() {
                smtp.password = Some(pass);
            }
        }
    }

    /// Duplicate or empty subscriber names are fatal. Out-of-range home
    /// locations are not; see [`AppConfig::invalid_homes`].
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for s in &self.subscribers {
            let name = s.name.trim();
            if name.is_empty() {
                bail!("subscriber with empty name");
            }
            if !seen.insert(name) {
                bail!("duplicate subscriber name `{name}`");
            }
        }
        Ok(())
    }

    /// Subscribers whose home is outside [-90, 90] x [-180, 180]. The
    /// evaluator skips them on every event.
    pub fn invalid_homes(&self) -> Vec<&SubscriberConfig> {
        self.subscribers
            .iter()
            .filter(|s| !Location::new(s.latitude, s.longitude).is_valid())
            .collect()
    }

    /// Log [`AppConfig::invalid_homes`]. Call once logging is set up.
    pub fn warn_invalid_homes(&self) -> usize {
        let invalid = self.invalid_homes();
        for s in &invalid {
            tracing::warn!(
                target: "config",
                subscriber = %s.name,
                latitude = s.latitude,
                longitude = s.longitude,
                "home location out of range; subscriber will be skipped"
            );
        }
        invalid.len()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn subscribers(&self) -> Vec<Subscriber> {
        self.subscribers.iter().map(SubscriberConfig::to_subscriber).collect()
    }
}

fn env_flag(key: &str) -> Option<bool> {
    let v = std::env::var(key).ok()?;
    Some(matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    ))
}
