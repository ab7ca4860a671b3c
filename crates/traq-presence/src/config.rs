//! Runtime timings for the presence engine.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// A heartbeat not refreshed within this window is dropped.
    pub heartbeat_timeout: Duration,
    /// Pruner period.
    pub heartbeat_tick: Duration,
    /// How often empty channel entries are reclaimed.
    pub viewer_gc_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_secs(5),
            heartbeat_tick: Duration::from_millis(500),
            viewer_gc_interval: Duration::from_secs(5 * 60),
        }
    }
}
