//! Channel view state reported by clients.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// How engaged a client is with the channel it has open.
///
/// Ordered `None < Monitoring < Editing`; when a user is seen through
/// several attachments the highest state wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewState {
    /// Channel is open in the background.
    #[default]
    None,
    /// Messages are on screen.
    Monitoring,
    /// The user is typing a message.
    Editing,
}

impl ViewState {
    pub const fn as_str(self) -> &'static str {
        match self {
            ViewState::None => "none",
            ViewState::Monitoring => "monitoring",
            ViewState::Editing => "editing",
        }
    }

    /// Resolve a client-supplied status string. Matching ignores case and
    /// anything unrecognised resolves to `None`.
    pub fn from_status(status: &str) -> Self {
        if status.eq_ignore_ascii_case("editing") {
            ViewState::Editing
        } else if status.eq_ignore_ascii_case("monitoring") {
            ViewState::Monitoring
        } else {
            ViewState::None
        }
    }
}

impl FromStr for ViewState {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_status(s))
    }
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ViewState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_status(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_none_monitoring_editing() {
        assert!(ViewState::None < ViewState::Monitoring);
        assert!(ViewState::Monitoring < ViewState::Editing);
        assert_eq!(
            ViewState::None.max(ViewState::Editing).max(ViewState::Monitoring),
            ViewState::Editing
        );
    }

    #[test]
    fn from_status_known_values() {
        assert_eq!(ViewState::from_status("none"), ViewState::None);
        assert_eq!(ViewState::from_status("monitoring"), ViewState::Monitoring);
        assert_eq!(ViewState::from_status("editing"), ViewState::Editing);
    }

    #[test]
    fn from_status_ignores_case() {
        assert_eq!(ViewState::from_status("EDITING"), ViewState::Editing);
        assert_eq!(ViewState::from_status("Monitoring"), ViewState::Monitoring);
    }

    #[test]
    fn unknown_status_is_none() {
        assert_eq!(ViewState::from_status(""), ViewState::None);
        assert_eq!(ViewState::from_status("typing"), ViewState::None);
        assert_eq!("away".parse::<ViewState>().unwrap(), ViewState::None);
    }

    #[test]
    fn display_is_lowercase() {
        assert_eq!(ViewState::Editing.to_string(), "editing");
        assert_eq!(ViewState::None.to_string(), "none");
    }

    #[test]
    fn serializes_as_lowercase_string() {
        let json = serde_json::to_string(&ViewState::Monitoring).unwrap();
        assert_eq!(json, "\"monitoring\"");
    }

    #[test]
    fn deserializes_unknown_as_none() {
        let state: ViewState = serde_json::from_str("\"idle\"").unwrap();
        assert_eq!(state, ViewState::None);
        let state: ViewState = serde_json::from_str("\"Editing\"").unwrap();
        assert_eq!(state, ViewState::Editing);
    }
}
