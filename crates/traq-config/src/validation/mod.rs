//! Full configuration validation.
//!
//! Checks every numeric range and collects all problems into a single
//! `ConfigError` rather than stopping at the first one.

mod helpers;


use traq_common::ConfigError;

use crate::schema::TraqConfig;
use helpers::validate_range;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &TraqConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_presence(&mut errors, config);
    validate_bus(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_presence(errors: &mut Vec<String>, config: &TraqConfig) {
    let presence = &config.presence;
    validate_range(
        errors,
        "presence.heartbeat_timeout_ms",
        presence.heartbeat_timeout_ms,
        1000,
        60000,
    );
    validate_range(
        errors,
        "presence.heartbeat_tick_ms",
        presence.heartbeat_tick_ms,
        50,
        10000,
    );
    validate_range(
        errors,
        "presence.viewer_gc_interval_secs",
        presence.viewer_gc_interval_secs,
        1,
        86400,
    );
    if presence.heartbeat_tick_ms >= presence.heartbeat_timeout_ms {
        errors.push(format!(
            "presence.heartbeat_tick_ms = {} must be less than presence.heartbeat_timeout_ms = {}",
            presence.heartbeat_tick_ms, presence.heartbeat_timeout_ms
        ));
    }
}

fn validate_bus(errors: &mut Vec<String>, config: &TraqConfig) {
    validate_range(errors, "bus.capacity", config.bus.capacity, 16, 65536);
}
