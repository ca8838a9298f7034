// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `bookline serve` command implementation.
//!
//! Wires the full pipeline: dedup store, sent ledger, scheduler, dispatcher,
//! poll daemon, and the config watcher, all sharing one cancellation token
//! for graceful shutdown on SIGINT/SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use bookline_config::model::BooklineConfig;
use bookline_config::{ConfigHandle, config_file_paths, load_and_validate_with, spawn_config_watcher};
use bookline_core::BooklineError;
use bookline_poller::PollClient;
use bookline_scheduler::{DispatchState, NotificationScheduler, dispatcher};
use bookline_storage::{Database, SentLedger, appointments};
use bookline_whatsapp::WaClient;

/// Period of the background retention sweep over the dedup store.
const MAINTENANCE_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Runs the `bookline serve` command until a shutdown signal arrives.
pub async fn run_serve(config: BooklineConfig, extra: Option<PathBuf>) -> Result<(), BooklineError> {
    init_tracing(&config.log.level);
    info!("starting bookline serve");

    let tz: Tz = config
        .schedule
        .timezone
        .parse()
        .map_err(|_| BooklineError::Config(format!(
            "schedule.timezone `{}` is not a known IANA timezone",
            config.schedule.timezone
        )))?;

    // Open the dedup store and sweep expired rows before anything else runs.
    let db = Arc::new(Database::open(&config.storage.database_path).await?);
    let now_local = Utc::now().with_timezone(&tz).naive_local();
    match appointments::cleanup_old_records(&db, now_local).await {
        Ok(deleted) => info!(deleted, "startup retention sweep complete"),
        Err(e) => warn!(error = %e, "startup retention sweep failed"),
    }

    // Load the sent ledger; restarting within the retention window must not
    // re-send anything.
    let today = Utc::now().with_timezone(&tz).date_naive();
    let ledger = SentLedger::load(config.storage.ledger_dir.clone(), today).await?;
    info!(keys = ledger.len(), "sent ledger loaded");
    let state = DispatchState::shared(ledger);

    let messenger = Arc::new(WaClient::new(&config.whatsapp)?);

    let handle = ConfigHandle::new(config.clone());
    let scheduler = Arc::new(NotificationScheduler::new(handle.clone(), state.clone()));

    let cancel = install_signal_handler();

    // Config watcher: reload on file changes, keep the old snapshot on error.
    let watch_paths = config_file_paths(extra.as_deref());
    let reload_extra = extra.clone();
    let _trigger = spawn_config_watcher(
        handle.clone(),
        watch_paths,
        move || load_and_validate_with(reload_extra.as_deref()),
        cancel.clone(),
    );

    // Daily retention sweep.
    let maintenance = tokio::spawn(maintenance_loop(db.clone(), tz, cancel.clone()));

    // Poll daemon (optional ingress).
    let poller = if config.poll.enabled {
        let client = PollClient::new(&config.poll)?;
        let interval = Duration::from_secs(config.poll.interval_secs);
        info!(interval_secs = config.poll.interval_secs, "poll daemon enabled");
        Some(tokio::spawn(bookline_poller::daemon::run(
            client,
            interval,
            tz,
            scheduler.clone(),
            cancel.clone(),
        )))
    } else {
        info!("poll daemon disabled by configuration");
        None
    };

    // Dispatch loop.
    let dispatch = tokio::spawn(dispatcher::run(
        state,
        handle,
        messenger,
        cancel.clone(),
    ));

    info!("bookline serve running, press Ctrl+C to stop");
    cancel.cancelled().await;
    info!("shutting down");

    if let Err(e) = dispatch.await {
        error!(error = %e, "dispatcher task panicked");
    }
    if let Some(poller) = poller {
        if let Err(e) = poller.await {
            error!(error = %e, "poll daemon task panicked");
        }
    }
    if let Err(e) = maintenance.await {
        error!(error = %e, "maintenance task panicked");
    }

    match Arc::try_unwrap(db) {
        Ok(db) => db.close().await?,
        Err(_) => warn!("database handle still shared at shutdown, skipping checkpoint"),
    }

    info!("bookline serve stopped");
    Ok(())
}

/// Sweep the dedup store once a day until cancelled.
async fn maintenance_loop(db: Arc<Database>, tz: Tz, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(MAINTENANCE_PERIOD) => {
                let now_local = Utc::now().with_timezone(&tz).naive_local();
                match appointments::cleanup_old_records(&db, now_local).await {
                    Ok(deleted) => info!(deleted, "daily retention sweep complete"),
                    Err(e) => warn!(error = %e, "daily retention sweep failed"),
                }
            }
            _ = cancel.cancelled() => break,
        }
    }
    debug!("maintenance task stopped");
}

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] cancelled when either signal is received.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = ctrl_c => {
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("bookline={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
