//! Configuration for the traq presence daemon.
//!
//! TOML-based configuration with full validation. Every section uses
//! serde defaults so a partial file (or no file at all) works.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use traq_config::{load_config, config_to_json};
//!
//! let config = load_config().expect("failed to load config");
//! println!("{}", config_to_json(&config));
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{BusConfig, LogLevel, LoggingConfig, PresenceConfig, TraqConfig};
pub use toml_loader::{default_config_path, load_default, load_from_path};

use traq_common::ConfigError;

/// Load config from the platform default path and validate it.
pub fn load_config() -> Result<TraqConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &TraqConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_to_json_contains_all_sections() {
        let json = config_to_json(&TraqConfig::default());
        assert!(json.contains("\"presence\""));
        assert!(json.contains("\"bus\""));
        assert!(json.contains("\"logging\""));
    }

    #[test]
    fn default_config_round_trips_through_json() {
        let json = config_to_json(&TraqConfig::default());
        let parsed: TraqConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.presence.heartbeat_timeout_ms, 5000);
        assert_eq!(parsed.presence.heartbeat_tick_ms, 500);
        assert_eq!(parsed.bus.capacity, 1024);
        assert_eq!(parsed.logging.level, LogLevel::Info);
    }
}
