//! Hot reload of the `[http_metrics]` section.
//!
//! # Design Decisions
//! - Watches the parent directory, so editors that save by rename still
//!   trigger a reload
//! - Only a changed `[http_metrics]` section is forwarded; it is the one
//!   section a running server applies
//! - Edits to listener, upstream, timeouts or observability are reported
//!   as needing a restart and otherwise ignored

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ServerConfig;

/// Watches a configuration file and sends endpoint-rule changes.
pub struct ConfigWatcher {
    path: PathBuf,
    gate: ReloadGate,
    update_tx: mpsc::UnboundedSender<ServerConfig>,
}

impl ConfigWatcher {
    /// Create a watcher for `path`, where `running` is the configuration the
    /// server was started with.
    ///
    /// Returns the watcher and a receiver for validated configurations.
    pub fn new(path: &Path, running: ServerConfig) -> (Self, mpsc::UnboundedReceiver<ServerConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                gate: ReloadGate::new(running),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. Dropping the returned watcher stops it.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self {
            path,
            mut gate,
            update_tx,
        } = self;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = path.file_name().map(|n| n.to_os_string());
        let watched = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let touches_file = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == file_name.as_deref());
                    if !touches_file || !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    match load_config(&watched) {
                        Ok(next) => {
                            if let Some(update) = gate.admit(next) {
                                let _ = update_tx.send(update);
                            }
                        }
                        Err(e) => {
                            tracing::error!(path = ?watched, error = %e, "Failed to reload config, keeping current rules");
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}

/// Filters reloaded configurations down to the ones worth applying.
#[derive(Debug)]
struct ReloadGate {
    running: ServerConfig,
}

impl ReloadGate {
    fn new(running: ServerConfig) -> Self {
        Self { running }
    }

    /// Return `next` if its `[http_metrics]` section differs from the one in
    /// effect, and record it as the one in effect.
    fn admit(&mut self, next: ServerConfig) -> Option<ServerConfig> {
        let restart_only = self.restart_only_changes(&next);
        if !restart_only.is_empty() {
            tracing::warn!(
                sections = ?restart_only,
                "Config sections changed that only take effect after a restart"
            );
        }

        if next.http_metrics == self.running.http_metrics {
            tracing::debug!("Config file changed, endpoint rules unchanged");
            return None;
        }

        tracing::info!(
            rules = next.http_metrics.endpoint_patterns.rules.len(),
            "Endpoint rules changed, reloading"
        );
        self.running.http_metrics = next.http_metrics.clone();
        Some(next)
    }

    fn restart_only_changes(&self, next: &ServerConfig) -> Vec<&'static str> {
        let running = &self.running;
        [
            ("listener", running.listener != next.listener),
            ("upstream", running.upstream != next.upstream),
            ("timeouts", running.timeouts != next.timeouts),
            ("observability", running.observability != next.observability),
        ]
        .into_iter()
        .filter_map(|(name, changed)| changed.then_some(name))
        .collect()
    }
}
