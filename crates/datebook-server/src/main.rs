//! datebook-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) plus `DATEBOOK_*`
//! environment variables, opens the SQLite store, starts the reminder loop
//! and serves the JSON API over HTTP until Ctrl-C or SIGTERM.

mod config;
mod notifier;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use clap::Parser;
use datebook_api::AppState;
use datebook_core::{
  budget::BudgetService,
  clock::{Clock, SystemClock},
  notify::Dispatcher,
  reminder::ReminderScheduler,
  service::EventService,
};
use datebook_store_sqlite::SqliteStore;
use tokio::{net::TcpListener, time::MissedTickBehavior};
use tower_http::trace::TraceLayer;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

use crate::{
  config::{MIN_POLL_INTERVAL, ServerConfig},
  notifier::Outbox,
};

#[derive(Parser)]
#[command(author, version, about = "Datebook scheduling server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = ServerConfig::load(cli.config)?;

  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  let notifier = Outbox::from_config(&cfg.telegram).context("failed to build notifier")?;
  info!(notifier = notifier.kind(), "notifier ready");

  let clock: Arc<dyn Clock> = Arc::new(SystemClock);
  let dispatcher = Arc::new(Dispatcher::new(
    store.clone(),
    Arc::new(notifier),
    cfg.default_timezone.clone(),
  ));
  let service = EventService::new(
    store.clone(),
    dispatcher.clone(),
    clock.clone(),
    cfg.default_timezone.clone(),
  )
  .context("invalid default_timezone")?;
  let budget = BudgetService::new(store.clone(), clock.clone(), cfg.default_timezone.clone())
    .context("invalid default_timezone")?;

  let lead = chrono::Duration::from_std(cfg.reminder.lead).context("reminder lead out of range")?;
  let scheduler = Arc::new(ReminderScheduler::new(
    store,
    dispatcher,
    clock,
    lead,
    cfg.reminder.batch_size,
  ));

  if cfg.reminder.poll_interval < MIN_POLL_INTERVAL {
    warn!(
      configured = ?cfg.reminder.poll_interval,
      minimum = ?MIN_POLL_INTERVAL,
      "reminder poll interval raised to minimum"
    );
  }
  let reminders = tokio::spawn(run_reminder_loop(
    scheduler.clone(),
    cfg.reminder.effective_poll_interval(),
  ));

  let app = datebook_api::api_router(AppState {
    service: Arc::new(service),
    scheduler,
    budget: Arc::new(budget),
  })
  .layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", cfg.host, cfg.port);

  info!(default_timezone = %cfg.default_timezone, "Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  // In-flight claims stay claimed; their reminders are not retried.
  reminders.abort();
  info!("shut down");
  Ok(())
}

/// Run a reminder pass every `every` until the task is aborted.
async fn run_reminder_loop(scheduler: Arc<ReminderScheduler<SqliteStore, Outbox>>, every: Duration) {
  info!(interval = ?every, worker = %scheduler.worker(), "Starting reminder loop");

  let mut ticker = tokio::time::interval(every);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

  loop {
    ticker.tick().await;
    match scheduler.run_once().await {
      Ok(pass) if pass.claimed > 0 => {
        info!(claimed = pass.claimed, lost = pass.lost(), "reminder pass finished");
      }
      Ok(_) => {}
      Err(e) => error!(error = %e, "reminder pass failed"),
    }
  }
}

async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      error!(error = %e, "failed to listen for Ctrl-C");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    use tokio::signal::unix::{SignalKind, signal};
    match signal(SignalKind::terminate()) {
      Ok(mut sigterm) => {
        sigterm.recv().await;
      }
      Err(e) => {
        error!(error = %e, "failed to listen for SIGTERM");
        std::future::pending::<()>().await;
      }
    }
  };
  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    () = ctrl_c => {}
    () = terminate => {}
  }
  info!("shutdown signal received");
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
