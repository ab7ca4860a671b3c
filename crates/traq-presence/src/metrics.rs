//! Prometheus metrics for the presence engine.

use prometheus::{Encoder, IntGauge, Opts, Registry, TextEncoder};
use traq_common::TraqError;

/// Registry holding the presence gauges.
///
/// Each instance owns its own registry so several engines (or tests) can
/// coexist in one process; the host merges it into its scrape endpoint.
#[derive(Clone)]
pub struct PresenceMetrics {
    registry: Registry,
    online_users: IntGauge,
}

impl PresenceMetrics {
    pub fn new() -> traq_common::Result<Self> {
        let registry = Registry::new();
        let online_users = IntGauge::with_opts(
            Opts::new(
                "online_users",
                "Number of users with at least one live connection",
            )
            .namespace("traq"),
        )
        .map_err(|e| TraqError::Metrics(e.to_string()))?;
        registry
            .register(Box::new(online_users.clone()))
            .map_err(|e| TraqError::Metrics(e.to_string()))?;

        Ok(Self {
            registry,
            online_users,
        })
    }

    /// `traq_online_users`.
    pub fn online_users(&self) -> &IntGauge {
        &self.online_users
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn gather(&self) -> traq_common::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buf)
            .map_err(|e| TraqError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TraqError::Metrics(e.to_string()))
    }
}
