use chrono::{DateTime, Utc};
use serde::Serialize;
use traq_common::{ViewState, ViewerKey};
use uuid::Uuid;

/// One client attachment's current channel and view state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub key: ViewerKey,
    pub user_id: Uuid,
    pub channel_id: Uuid,
    pub state: ViewState,
    /// When the current (channel, state) pair was set.
    pub since: DateTime<Utc>,
}

/// Where one attachment of a user is and what it is doing there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelViewState {
    pub channel_id: Uuid,
    pub state: ViewState,
}
