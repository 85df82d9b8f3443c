//! Configuration file watcher for watch-mode re-resolution.

use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::error::ConfigError;
use crate::config::loader::ConfigSources;
use crate::config::resolved::ResolvedConfig;
use crate::config::resolver::{ResolveOptions, Resolver};
use crate::config::schema::OptionSchema;
use crate::config::shared::SharedConfig;

/// Re-reads the sources, re-resolves and swaps the result into a [`SharedConfig`].
#[derive(Debug, Clone)]
pub struct Reloader {
    schema: Arc<OptionSchema>,
    options: ResolveOptions,
    sources: ConfigSources,
    shared: SharedConfig,
}

impl Reloader {
    pub fn new(
        schema: Arc<OptionSchema>,
        options: ResolveOptions,
        sources: ConfigSources,
        shared: SharedConfig,
    ) -> Self {
        Self {
            schema,
            options,
            sources,
            shared,
        }
    }

    pub fn shared(&self) -> &SharedConfig {
        &self.shared
    }

    pub fn sources(&self) -> &ConfigSources {
        &self.sources
    }

    /// Reload and swap. On error the current configuration stays in place.
    pub fn reload(&self) -> Result<Arc<ResolvedConfig>, ConfigError> {
        let resolver = Resolver::new(&self.schema).with_options(self.options);
        let config = self.sources.resolve(&resolver)?;
        self.shared.replace(config);
        Ok(self.shared.load())
    }
}

/// A watcher that monitors configuration files for changes.
pub struct ConfigWatcher {
    reloader: Reloader,
}

impl ConfigWatcher {
    pub fn new(reloader: Reloader) -> Self {
        Self { reloader }
    }

    /// Start watching in a background thread. Dropping the returned watcher stops it.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let reloader = self.reloader.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Config file change detected, re-resolving...");
                        match reloader.reload() {
                            Ok(config) => {
                                tracing::info!(
                                    output_mode = config.get_str("outputMode").unwrap_or_default(),
                                    "Configuration swapped"
                                );
                            }
                            Err(e) => {
                                tracing::error!(
                                    "Failed to reload config: {}. Keeping current configuration.",
                                    e
                                );
                            }
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        for path in self.reloader.sources().files() {
            watcher.watch(path, RecursiveMode::NonRecursive)?;
            tracing::info!(path = ?path, "Config watcher started");
        }
        Ok(watcher)
    }
}
