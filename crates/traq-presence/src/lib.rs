//! Realtime presence engine.
//!
//! Tracks which users have a live connection ([`OnlineCounter`]), which
//! channel every client attachment is looking at ([`ViewerManager`]) and
//! short-lived per-channel heartbeats ([`HeartBeats`]). Changes are
//! published on the shared [`traq_common::EventBus`]; [`PresenceService`]
//! wires the three together and feeds connection events into the counter.

pub mod config;
pub mod heartbeats;
pub mod metrics;
pub mod online_counter;
pub mod service;
pub mod viewer;

pub use config::EngineConfig;
pub use heartbeats::{Beat, BeatExpiryListener, BeatSource, HeartBeats, HeartbeatStatus, UserStatus};
pub use metrics::PresenceMetrics;
pub use online_counter::OnlineCounter;
pub use service::PresenceService;
pub use viewer::{ChannelViewState, Viewer, ViewerManager};
