//! Time-decayed heartbeat registry.
//!
//! Clients that cannot hold a long-lived viewer registration post periodic
//! heartbeats instead: "user U is on channel C with status S". A beat that is
//! not refreshed within the timeout is dropped by the pruner task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;
use traq_common::ViewState;
use uuid::Uuid;

/// One user's latest heartbeat on one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beat {
    pub user_id: Uuid,
    pub channel_id: Uuid,
    pub state: ViewState,
    pub last_seen: Instant,
}

/// Read access to live beats, used when merging channel viewers.
pub trait BeatSource: Send + Sync {
    fn snapshot(&self, channel_id: Uuid) -> Vec<Beat>;
}

/// Told about beats the pruner dropped. Called without any heartbeat lock held.
pub trait BeatExpiryListener: Send + Sync {
    fn beats_expired(&self, expired: &[Beat]);
}

/// Heartbeat state of a channel as served to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatStatus {
    pub channel_id: Uuid,
    pub user_statuses: Vec<UserStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatus {
    pub user_id: Uuid,
    pub status: ViewState,
}

pub struct HeartBeats {
    timeout: Duration,
    tick: Duration,
    channels: Mutex<HashMap<Uuid, Vec<Beat>>>,
}

impl HeartBeats {
    pub fn new(timeout: Duration, tick: Duration) -> Self {
        Self {
            timeout,
            tick,
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Record a heartbeat. Unknown status strings count as `none`.
    pub fn beat(&self, user_id: Uuid, channel_id: Uuid, status: &str) {
        self.beat_with_state(user_id, channel_id, ViewState::from_status(status));
    }

    pub fn beat_with_state(&self, user_id: Uuid, channel_id: Uuid, state: ViewState) {
        let now = Instant::now();
        let mut channels = self.channels.lock();
        let beats = channels.entry(channel_id).or_default();
        match beats.iter_mut().find(|b| b.user_id == user_id) {
            Some(beat) => {
                beat.state = state;
                beat.last_seen = now;
            }
            None => beats.push(Beat {
                user_id,
                channel_id,
                state,
                last_seen: now,
            }),
        }
    }

    pub fn snapshot(&self, channel_id: Uuid) -> Vec<Beat> {
        self.channels
            .lock()
            .get(&channel_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Heartbeat status of a channel, or `None` if nobody is beating on it.
    pub fn status(&self, channel_id: Uuid) -> Option<HeartbeatStatus> {
        let channels = self.channels.lock();
        let beats = channels.get(&channel_id)?;
        Some(HeartbeatStatus {
            channel_id,
            user_statuses: beats
                .iter()
                .map(|b| UserStatus {
                    user_id: b.user_id,
                    status: b.state,
                })
                .collect(),
        })
    }

    pub fn channel_count(&self) -> usize {
        self.channels.lock().len()
    }

    /// Drop every beat older than the timeout and return what was dropped.
    pub fn prune_expired(&self) -> Vec<Beat> {
        self.prune_expired_at(Instant::now())
    }

    pub(crate) fn prune_expired_at(&self, now: Instant) -> Vec<Beat> {
        let mut expired = Vec::new();
        let mut channels = self.channels.lock();
        channels.retain(|_, beats| {
            beats.retain(|beat| {
                let alive = now.saturating_duration_since(beat.last_seen) < self.timeout;
                if !alive {
                    expired.push(beat.clone());
                }
                alive
            });
            !beats.is_empty()
        });
        expired
    }

    /// Spawn the pruner. It runs every tick until `shutdown` fires and hands
    /// each batch of expired beats to `listener`.
    pub fn spawn_pruner(
        self: &Arc<Self>,
        listener: Arc<dyn BeatExpiryListener>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let heartbeats = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(heartbeats.tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let expired = heartbeats.prune_expired();
                        if !expired.is_empty() {
                            debug!(count = expired.len(), "Pruned stale heartbeats");
                            listener.beats_expired(&expired);
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
            debug!("Heartbeat pruner stopped");
        })
    }
}

impl BeatSource for HeartBeats {
    fn snapshot(&self, channel_id: Uuid) -> Vec<Beat> {
        HeartBeats::snapshot(self, channel_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heartbeats() -> HeartBeats {
        HeartBeats::new(Duration::from_secs(5), Duration::from_millis(500))
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Beat>>);

    impl BeatExpiryListener for Recorder {
        fn beats_expired(&self, expired: &[Beat]) {
            self.0.lock().extend_from_slice(expired);
        }
    }

    #[test]
    fn beat_creates_entry() {
        let hb = heartbeats();
        let (user, channel) = (Uuid::new_v4(), Uuid::new_v4());

        hb.beat(user, channel, "editing");

        let beats = hb.snapshot(channel);
        assert_eq!(beats.len(), 1);
        assert_eq!(beats[0].user_id, user);
        assert_eq!(beats[0].channel_id, channel);
        assert_eq!(beats[0].state, ViewState::Editing);
    }

    #[test]
    fn repeated_beat_updates_in_place() {
        let hb = heartbeats();
        let (user, channel) = (Uuid::new_v4(), Uuid::new_v4());

        hb.beat(user, channel, "editing");
        hb.beat(user, channel, "monitoring");

        let beats = hb.snapshot(channel);
        assert_eq!(beats.len(), 1);
        assert_eq!(beats[0].state, ViewState::Monitoring);
    }

    #[test]
    fn unknown_status_maps_to_none() {
        let hb = heartbeats();
        let (user, channel) = (Uuid::new_v4(), Uuid::new_v4());

        hb.beat(user, channel, "sleeping");

        assert_eq!(hb.snapshot(channel)[0].state, ViewState::None);
    }

    #[test]
    fn beats_are_bucketed_by_channel() {
        let hb = heartbeats();
        let user = Uuid::new_v4();
        let (c1, c2) = (Uuid::new_v4(), Uuid::new_v4());

        hb.beat(user, c1, "monitoring");
        hb.beat(user, c2, "editing");

        assert_eq!(hb.snapshot(c1).len(), 1);
        assert_eq!(hb.snapshot(c2).len(), 1);
        assert_eq!(hb.channel_count(), 2);
        assert!(hb.snapshot(Uuid::new_v4()).is_empty());
    }

    #[test]
    fn prune_keeps_fresh_beats() {
        let hb = heartbeats();
        let (user, channel) = (Uuid::new_v4(), Uuid::new_v4());

        hb.beat(user, channel, "monitoring");

        let expired = hb.prune_expired_at(Instant::now() + Duration::from_secs(4));
        assert!(expired.is_empty());
        assert_eq!(hb.snapshot(channel).len(), 1);
    }

    #[test]
    fn prune_drops_stale_beats_and_empty_buckets() {
        let hb = heartbeats();
        let (u1, u2, channel) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        hb.beat(u1, channel, "monitoring");
        hb.beat(u2, channel, "editing");

        let expired = hb.prune_expired_at(Instant::now() + Duration::from_secs(5));
        assert_eq!(expired.len(), 2);
        assert!(expired.iter().all(|b| b.channel_id == channel));
        assert!(hb.snapshot(channel).is_empty());
        assert_eq!(hb.channel_count(), 0);
        assert!(hb.status(channel).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn refreshed_beat_survives_prune() {
        let hb = heartbeats();
        let (u1, u2, channel) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        hb.beat(u1, channel, "monitoring");
        hb.beat(u2, channel, "monitoring");
        tokio::time::advance(Duration::from_secs(3)).await;
        hb.beat(u1, channel, "editing");
        tokio::time::advance(Duration::from_secs(3)).await;

        let expired = hb.prune_expired();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].user_id, u2);
        let remaining = hb.snapshot(channel);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].user_id, u1);
        assert_eq!(remaining[0].state, ViewState::Editing);
    }

    #[test]
    fn status_serializes_in_camel_case() {
        let hb = heartbeats();
        let (user, channel) = (Uuid::new_v4(), Uuid::new_v4());

        hb.beat(user, channel, "editing");

        let status = hb.status(channel).unwrap();
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["channelId"], channel.to_string());
        assert_eq!(json["userStatuses"][0]["userId"], user.to_string());
        assert_eq!(json["userStatuses"][0]["status"], "editing");
    }

    #[tokio::test(start_paused = true)]
    async fn pruner_task_expires_after_timeout_plus_tick() {
        let hb = Arc::new(heartbeats());
        let recorder = Arc::new(Recorder::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = hb.spawn_pruner(recorder.clone(), shutdown_rx);
        let (user, channel) = (Uuid::new_v4(), Uuid::new_v4());

        hb.beat(user, channel, "editing");

        tokio::time::sleep(Duration::from_millis(4900)).await;
        assert_eq!(hb.snapshot(channel).len(), 1);
        assert!(recorder.0.lock().is_empty());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(hb.snapshot(channel).is_empty());
        let expired = recorder.0.lock().clone();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].user_id, user);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[test]
    fn concurrent_beats_keep_one_entry_per_user() {
        let hb = Arc::new(heartbeats());
        let channel = Uuid::new_v4();
        let users: Vec<Uuid> = (0..16).map(|_| Uuid::new_v4()).collect();

        std::thread::scope(|s| {
            for &user in &users {
                let hb = &hb;
                s.spawn(move || {
                    for i in 0..100 {
                        let status = if i % 2 == 0 { "monitoring" } else { "editing" };
                        hb.beat(user, channel, status);
                    }
                });
            }
        });

        let beats = hb.snapshot(channel);
        assert_eq!(beats.len(), users.len());
        assert!(beats.iter().all(|b| b.state == ViewState::Editing));
    }
}
