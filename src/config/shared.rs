//! Process-wide handle to the current resolved configuration.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::resolved::ResolvedConfig;

/// Cheaply clonable handle. Readers take lock-free snapshots; a re-resolution
/// swaps in a whole new configuration at once.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    current: Arc<ArcSwap<ResolvedConfig>>,
}

impl SharedConfig {
    pub fn new(config: ResolvedConfig) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    /// Snapshot of the current configuration. Stays valid after a swap.
    pub fn load(&self) -> Arc<ResolvedConfig> {
        self.current.load_full()
    }

    /// Install `config`, returning the one it replaced.
    pub fn replace(&self, config: ResolvedConfig) -> Arc<ResolvedConfig> {
        self.current.swap(Arc::new(config))
    }
}
