//! Channel viewer tracking.
//!
//! Every client attachment registers the channel it has open and how
//! engaged it is. The manager keeps the by-key, by-channel and by-user
//! indices in step and publishes `CHANNEL_VIEWERS_CHANGED` with the merged
//! viewer map (viewers plus heartbeats) whenever a channel's set changes.

mod manager;
mod types;


pub use manager::ViewerManager;
pub use types::{ChannelViewState, Viewer};
