// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hot-reload support for configuration files.
//!
//! [`ConfigHandle`] is a cheap, cloneable handle to the current configuration
//! snapshot. [`spawn_config_watcher`] swaps in a freshly loaded snapshot when
//! a watched file changes or a manual trigger arrives, and keeps the previous
//! snapshot when the reload fails.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use notify::RecursiveMode;
use notify_debouncer_mini::{DebounceEventResult, new_debouncer};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::diagnostic::ConfigError;
use crate::model::BooklineConfig;

const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Shared handle to the live configuration.
///
/// Readers call [`ConfigHandle::current`] per operation and hold the returned
/// `Arc` for the duration of that operation, so a concurrent reload never
/// changes values mid-flight.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<ArcSwap<BooklineConfig>>,
}

impl ConfigHandle {
    pub fn new(config: BooklineConfig) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    /// Returns the current configuration snapshot.
    pub fn current(&self) -> Arc<BooklineConfig> {
        self.inner.load_full()
    }

    /// Atomically replaces the configuration snapshot.
    pub fn replace(&self, config: BooklineConfig) {
        self.inner.store(Arc::new(config));
    }
}

/// Spawns a background task that reloads configuration on file changes.
///
/// Filesystem events on `watch_paths` are debounced and coalesced into reload
/// triggers. The returned sender injects a manual trigger through the same
/// path, which is what tests and signal handlers use. If the filesystem
/// watcher cannot be created the task still serves manual triggers.
pub fn spawn_config_watcher<F>(
    handle: ConfigHandle,
    watch_paths: Vec<PathBuf>,
    reload: F,
    cancel: CancellationToken,
) -> mpsc::Sender<()>
where
    F: Fn() -> Result<BooklineConfig, Vec<ConfigError>> + Send + 'static,
{
    let (trigger_tx, mut trigger_rx) = mpsc::channel::<()>(4);
    let fs_tx = trigger_tx.clone();

    tokio::spawn(async move {
        let debouncer = match new_debouncer(DEBOUNCE_WINDOW, move |res: DebounceEventResult| {
            if res.is_ok() {
                // A full channel already carries a pending trigger.
                let _ = fs_tx.try_send(());
            }
        }) {
            Ok(mut debouncer) => {
                for path in &watch_paths {
                    if !path.exists() {
                        debug!(path = %path.display(), "config path absent, not watching");
                        continue;
                    }
                    match debouncer.watcher().watch(path, RecursiveMode::NonRecursive) {
                        Ok(()) => info!(path = %path.display(), "watching config file"),
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "failed to watch config file");
                        }
                    }
                }
                Some(debouncer)
            }
            Err(e) => {
                warn!(error = %e, "config file watcher unavailable, manual reload only");
                None
            }
        };

        loop {
            tokio::select! {
                received = trigger_rx.recv() => {
                    match received {
                        Some(()) => match reload() {
                            Ok(config) => {
                                handle.replace(config);
                                info!("configuration reloaded");
                            }
                            Err(errors) => {
                                warn!(
                                    errors = errors.len(),
                                    "configuration reload failed, keeping previous snapshot"
                                );
                                for error in &errors {
                                    warn!(error = %error, "config reload error");
                                }
                            }
                        },
                        None => break,
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }

        drop(debouncer);
        debug!("config watcher stopped");
    });

    trigger_tx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_replace_swaps_snapshot() {
        let handle = ConfigHandle::new(BooklineConfig::default());
        assert_eq!(handle.current().log.level, "info");

        let mut next = BooklineConfig::default();
        next.log.level = "trace".to_string();
        handle.replace(next);
        assert_eq!(handle.current().log.level, "trace");
    }

    #[tokio::test]
    async fn manual_trigger_reloads_config() {
        let handle = ConfigHandle::new(BooklineConfig::default());
        let cancel = CancellationToken::new();
        let trigger = spawn_config_watcher(
            handle.clone(),
            Vec::new(),
            || {
                let mut config = BooklineConfig::default();
                config.log.level = "debug".to_string();
                Ok(config)
            },
            cancel.clone(),
        );

        trigger.send(()).await.unwrap();

        let mut reloaded = false;
        for _ in 0..50 {
            if handle.current().log.level == "debug" {
                reloaded = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cancel.cancel();
        assert!(reloaded, "watcher never applied the reloaded config");
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_snapshot() {
        let handle = ConfigHandle::new(BooklineConfig::default());
        let cancel = CancellationToken::new();
        let trigger = spawn_config_watcher(
            handle.clone(),
            Vec::new(),
            || {
                Err(vec![ConfigError::Validation {
                    message: "broken on purpose".to_string(),
                }])
            },
            cancel.clone(),
        );

        trigger.send(()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        assert_eq!(handle.current().log.level, "info");
    }
}
