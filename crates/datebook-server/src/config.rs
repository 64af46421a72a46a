//! Server configuration, layered from a TOML file and `DATEBOOK_*`
//! environment variables.
//!
//! ```toml
//! host             = "127.0.0.1"
//! port             = 8080
//! store_path       = "~/.local/share/datebook/datebook.sqlite"
//! default_timezone = "Europe/Warsaw"
//!
//! [reminder]
//! lead          = "10m"
//! poll_interval = "30s"
//! batch_size    = 50
//!
//! [telegram]
//! bot_token = "123456:ABC..."
//! ```
//!
//! Nested keys map to variables with a double underscore, e.g.
//! `DATEBOOK_REMINDER__LEAD=5m` or `DATEBOOK_TELEGRAM__BOT_TOKEN=...`.

use std::{path::PathBuf, time::Duration};

use anyhow::Context as _;
use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use datebook_core::reminder::{DEFAULT_BATCH_SIZE, DEFAULT_LEAD};
use serde::Deserialize;

/// Reminder passes never run more often than this.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:             String,
  #[serde(default = "default_port")]
  pub port:             u16,
  #[serde(default = "default_store_path")]
  pub store_path:       PathBuf,
  /// IANA zone for users without a preference.
  #[serde(default = "default_timezone")]
  pub default_timezone: String,
  #[serde(default)]
  pub reminder:         ReminderConfig,
  #[serde(default)]
  pub telegram:         TelegramConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
  /// How long before an event's start its reminder goes out.
  #[serde(with = "humantime_serde")]
  pub lead:          Duration,
  #[serde(with = "humantime_serde")]
  pub poll_interval: Duration,
  /// Upper bound on reminders claimed per store round trip.
  pub batch_size:    usize,
}

impl Default for ReminderConfig {
  fn default() -> Self {
    Self {
      lead:          DEFAULT_LEAD.to_std().unwrap_or_default(),
      poll_interval: Duration::from_secs(30),
      batch_size:    DEFAULT_BATCH_SIZE,
    }
  }
}

impl ReminderConfig {
  pub fn effective_poll_interval(&self) -> Duration {
    self.poll_interval.max(MIN_POLL_INTERVAL)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
  /// Without a token notifications are only logged.
  pub bot_token: Option<String>,
  pub api_base:  String,
}

impl Default for TelegramConfig {
  fn default() -> Self {
    Self {
      bot_token: None,
      api_base:  "https://api.telegram.org".to_owned(),
    }
  }
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("datebook.sqlite") }

fn default_timezone() -> String { "UTC".to_owned() }

impl ServerConfig {
  /// Read `path` (optional) and overlay the environment.
  pub fn load(path: PathBuf) -> anyhow::Result<Self> {
    let builder = Config::builder()
      .add_source(File::from(path).required(false))
      .add_source(
        Environment::with_prefix("DATEBOOK")
          .prefix_separator("_")
          .separator("__"),
      );
    Self::build(builder)
  }

  fn build(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<Self> {
    builder
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }
}
