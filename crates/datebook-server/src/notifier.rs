//! Outbound delivery: the Telegram Bot API, or the log when no bot token is
//! configured.

use std::time::Duration;

use datebook_core::{event::UserId, notify::Notifier};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::TelegramConfig;

#[derive(Debug, Error)]
pub enum SendError {
  #[error("telegram request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("telegram rejected the message: {0}")]
  Rejected(String),
}

// ─── Telegram ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct SendMessage<'a> {
  chat_id: UserId,
  text:    &'a str,
}

#[derive(Deserialize)]
struct BotResponse {
  ok:          bool,
  description: Option<String>,
}

/// `sendMessage` to the recipient's private chat, whose id equals the user id.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct TelegramNotifier {
  client: Client,
  /// Contains the bot token; never logged.
  url:    String,
}

impl TelegramNotifier {
  pub fn new(api_base: &str, bot_token: &str) -> Result<Self, SendError> {
    let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
    let url = format!("{}/bot{bot_token}/sendMessage", api_base.trim_end_matches('/'));
    Ok(Self { client, url })
  }

  async fn send_message(&self, recipient: UserId, text: &str) -> Result<(), SendError> {
    let resp: BotResponse = self
      .client
      .post(&self.url)
      .json(&SendMessage { chat_id: recipient, text })
      .send()
      .await
      .map_err(reqwest::Error::without_url)?
      .json()
      .await
      .map_err(reqwest::Error::without_url)?;

    if resp.ok {
      Ok(())
    } else {
      Err(SendError::Rejected(
        resp.description.unwrap_or_else(|| "no description".to_owned()),
      ))
    }
  }
}

// ─── Outbox ──────────────────────────────────────────────────────────────────

/// The notifier the server runs with.
pub enum Outbox {
  Telegram(TelegramNotifier),
  /// Writes each message to the log instead of sending it.
  Log,
}

impl Outbox {
  pub fn from_config(cfg: &TelegramConfig) -> Result<Self, SendError> {
    match cfg.bot_token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
      Some(token) => Ok(Self::Telegram(TelegramNotifier::new(&cfg.api_base, token)?)),
      None => Ok(Self::Log),
    }
  }

  pub fn kind(&self) -> &'static str {
    match self {
      Self::Telegram(_) => "telegram",
      Self::Log => "log",
    }
  }
}

impl Notifier for Outbox {
  type Error = SendError;

  async fn send<'a>(&'a self, recipient: UserId, text: &'a str) -> Result<(), SendError> {
    match self {
      Self::Telegram(telegram) => telegram.send_message(recipient, text).await,
      Self::Log => {
        info!(recipient, text, "notification (log only)");
        Ok(())
      }
    }
  }
}
