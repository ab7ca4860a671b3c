use serde::{Deserialize, Serialize};
use std::fmt;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Opaque handle for one client attachment (a WS session, an SSE stream).
///
/// Transports pick whatever identifier they already have for the
/// connection; the presence engine only compares and hashes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewerKey(String);

impl ViewerKey {
    /// A fresh random key.
    pub fn new() -> Self {
        Self(new_id())
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ViewerKey {
    fn default() -> Self {
        Self::new()
    }
}

impl From<uuid::Uuid> for ViewerKey {
    fn from(id: uuid::Uuid) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ViewerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
