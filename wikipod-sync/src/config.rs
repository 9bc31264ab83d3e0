//! Adaptor configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the sync adaptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptorConfig {
    /// Newline-separated container roots, in search priority order.
    pub containers: String,
    /// Newline-separated fully qualified read-only container URIs.
    pub external_containers: String,
    /// Name of the per-container listing file.
    pub index_file_name: String,
    /// Title of the "current view" pointer tiddler.
    pub singleton_title: String,
    /// Whether the singleton may be loaded from the pod at all.
    pub load_singleton_from_server: bool,
    /// Base delay between prefetch wake-ups (ms).
    pub prefetch_interval_ms: u64,
    /// Upper bound of the random extra delay added to each wake-up (ms).
    pub prefetch_jitter_ms: u64,
}

impl Default for AdaptorConfig {
    fn default() -> Self {
        Self {
            containers: "/public/tiddlers/main".to_string(),
            external_containers: String::new(),
            index_file_name: "__index__.json".to_string(),
            singleton_title: "$:/StoryList".to_string(),
            load_singleton_from_server: true,
            prefetch_interval_ms: 1_000,
            prefetch_jitter_ms: 500,
        }
    }
}

impl AdaptorConfig {
    /// Creates a config with the given container list and defaults elsewhere.
    pub fn with_containers(containers: impl Into<String>) -> Self {
        Self {
            containers: containers.into(),
            ..Default::default()
        }
    }

    pub fn prefetch_interval(&self) -> Duration {
        Duration::from_millis(self.prefetch_interval_ms)
    }

    pub fn prefetch_jitter(&self) -> Duration {
        Duration::from_millis(self.prefetch_jitter_ms)
    }
}
