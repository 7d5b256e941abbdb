//! Configuration file watcher for hot-reload support

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::AppConfig;

/// Delay before re-reading, so editors can finish writing
const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// A successfully reloaded configuration and the one it replaces
#[derive(Debug, Clone)]
pub struct ConfigReload {
    pub previous: AppConfig,
    pub current: AppConfig,
}

/// Config watcher that monitors file changes and sends reload notifications
///
/// Saves that leave the parsed configuration unchanged are not reported.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<ConfigReload>,
}

impl ConfigWatcher {
    /// Create a new config watcher for the specified file
    pub async fn new(config_path: String) -> Result<(Self, Arc<AppConfig>)> {
        let (tx, rx) = mpsc::channel(10);

        let initial_config = AppConfig::load(&config_path)
            .await
            .context("Failed to load initial config")?;
        let initial_config = Arc::new(initial_config);
        let last_applied = Arc::new(Mutex::new((*initial_config).clone()));

        let config_path_clone = config_path.clone();

        // notify callbacks run on their own OS thread, not in Tokio context
        let runtime_handle = tokio::runtime::Handle::current();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Modify(_)) {
                        return;
                    }
                    debug!("Config file modified: {:?}", event.paths);

                    let config_path = config_path_clone.clone();
                    let tx = tx.clone();
                    let last_applied = Arc::clone(&last_applied);

                    runtime_handle.spawn(async move {
                        tokio::time::sleep(SETTLE_DELAY).await;

                        let current = match AppConfig::load(&config_path).await {
                            Ok(config) => config,
                            Err(e) => {
                                warn!("Failed to reload config (keeping old config): {:#}", e);
                                return;
                            }
                        };

                        let previous = {
                            let mut last = last_applied.lock();
                            if *last == current {
                                debug!("Config file saved without changes");
                                return;
                            }
                            std::mem::replace(&mut *last, current.clone())
                        };

                        info!("Configuration reloaded successfully");
                        if let Err(e) = tx.send(ConfigReload { previous, current }).await {
                            error!("Failed to send config update: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Watch error: {}", e);
                }
            }
        })?;

        watcher
            .watch(Path::new(&config_path), RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config file: {}", config_path))?;

        info!("Config file watcher started for: {}", config_path);

        Ok((
            Self {
                _watcher: watcher,
                rx,
            },
            initial_config,
        ))
    }

    /// Wait for the next config update
    /// Returns None if the watcher has been closed
    pub async fn next_reload(&mut self) -> Option<ConfigReload> {
        self.rx.recv().await
    }
}
