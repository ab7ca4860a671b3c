//! Configuration schema types.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod presence;
mod system;

pub use presence::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Root configuration for the presence daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TraqConfig {
    pub presence: PresenceConfig,
    pub bus: BusConfig,
    pub logging: LoggingConfig,
}
