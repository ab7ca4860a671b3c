//! Presence engine and event bus configuration types.

use serde::{Deserialize, Serialize};

/// Presence engine timings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// A heartbeat older than this is dropped (valid range: 1000-60000).
    pub heartbeat_timeout_ms: u32,
    /// How often stale heartbeats are pruned (valid range: 50-10000).
    pub heartbeat_tick_ms: u32,
    /// How often empty channel entries are reclaimed (valid range: 1-86400).
    pub viewer_gc_interval_secs: u32,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_ms: 5000,
            heartbeat_tick_ms: 500,
            viewer_gc_interval_secs: 300,
        }
    }
}

/// Event bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Per-subscriber queue depth (valid range: 16-65536).
    pub capacity: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}
