// ── Runtime configuration for the bridge ──
//
// Built by the CLI from a knxlink-config profile, or directly by embedders.

use std::path::PathBuf;
use std::time::Duration;

use crate::model::StyleOverride;

/// Lower bound for the inter-telegram delay.
pub const MIN_SEND_DELAY: Duration = Duration::from_millis(10);

/// Default adapter namespace used for project files and store objects.
pub const DEFAULT_NAMESPACE: &str = "knx.0";

/// Namespace tried when the project file is missing from the primary one.
pub const LEGACY_NAMESPACE: &str = "knx.admin";

/// Everything needed to run an import.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Primary file store namespace for the project file.
    pub namespace: String,
    /// Logical project file name.
    pub project_file: Option<String>,
    pub style_override: StyleOverride,
    /// Scratch directory handed to the project parser.
    pub work_dir: PathBuf,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.into(),
            project_file: None,
            style_override: StyleOverride::Auto,
            work_dir: std::env::temp_dir(),
        }
    }
}

/// Synchronization loop settings.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Minimum delay between two telegrams sent by the queue.
    pub min_send_delay: Duration,
    /// Queue a read for every readable record after each (re)connect.
    pub read_on_connect: bool,
    /// Re-acknowledge commands in the store as soon as they are handled.
    pub ack_on_write: bool,
}

impl SyncConfig {
    /// Timer period actually used: the configured delay, floored.
    pub fn tick_period(&self) -> Duration {
        self.min_send_delay.max(MIN_SEND_DELAY)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            min_send_delay: Duration::from_millis(50),
            read_on_connect: true,
            ack_on_write: false,
        }
    }
}

/// Full bridge configuration.
#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    pub import: ImportConfig,
    pub sync: SyncConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_period_is_floored() {
        let config = SyncConfig {
            min_send_delay: Duration::from_millis(1),
            ..SyncConfig::default()
        };
        assert_eq!(config.tick_period(), MIN_SEND_DELAY);

        let config = SyncConfig {
            min_send_delay: Duration::from_millis(75),
            ..SyncConfig::default()
        };
        assert_eq!(config.tick_period(), Duration::from_millis(75));
    }
}
