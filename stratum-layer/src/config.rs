//! Layer configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a [`Layer`](crate::Layer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    /// Identifier reported to child layers and stamped as the source of
    /// entities this layer serves.
    pub name: String,
    pub population: PopulationConfig,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            name: "layer".to_string(),
            population: PopulationConfig::default(),
        }
    }
}

impl LayerConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Tuning for graph population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Upper bound on loading passes before giving up with
    /// `PopulationDidNotConverge`. A graph whose references are at most D
    /// levels deep needs D passes.
    pub max_passes: usize,
    /// Issue the per-type loads of one pass concurrently.
    pub concurrent_buckets: bool,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            max_passes: 64,
            concurrent_buckets: true,
        }
    }
}
