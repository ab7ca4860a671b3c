use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;
use traq_common::{Event, EventBus, ViewState, ViewerKey};
use uuid::Uuid;

use super::types::{ChannelViewState, Viewer};
use crate::heartbeats::{Beat, BeatExpiryListener, BeatSource};

/// The three viewer indices. Always mutated together under one lock.
#[derive(Default)]
struct Indices {
    viewers: HashMap<ViewerKey, Viewer>,
    channels: HashMap<Uuid, HashSet<ViewerKey>>,
    users: HashMap<Uuid, HashSet<ViewerKey>>,
}

impl Indices {
    fn insert(&mut self, viewer: Viewer) {
        self.channels
            .entry(viewer.channel_id)
            .or_default()
            .insert(viewer.key.clone());
        self.users
            .entry(viewer.user_id)
            .or_default()
            .insert(viewer.key.clone());
        self.viewers.insert(viewer.key.clone(), viewer);
    }

    /// Unlink a viewer from every index. Emptied sets stay until the next gc.
    fn remove(&mut self, key: &ViewerKey) -> Option<Viewer> {
        let viewer = self.viewers.remove(key)?;
        if let Some(keys) = self.channels.get_mut(&viewer.channel_id) {
            keys.remove(key);
        }
        if let Some(keys) = self.users.get_mut(&viewer.user_id) {
            keys.remove(key);
        }
        Some(viewer)
    }

    fn channel_viewers(&self, channel_id: Uuid) -> impl Iterator<Item = &Viewer> {
        self.channels
            .get(&channel_id)
            .into_iter()
            .flatten()
            .filter_map(|key| self.viewers.get(key))
    }
}

fn merge_max(result: &mut HashMap<Uuid, ViewState>, user_id: Uuid, state: ViewState) {
    result
        .entry(user_id)
        .and_modify(|s| *s = (*s).max(state))
        .or_insert(state);
}

/// Channel viewer manager.
///
/// Lock order is manager -> heartbeats: merging reads the beat source while
/// the index lock is held, so the beat source must never call back into the
/// manager under its own lock.
pub struct ViewerManager {
    bus: Arc<EventBus>,
    beats: Arc<dyn BeatSource>,
    inner: RwLock<Indices>,
}

impl ViewerManager {
    pub fn new(bus: Arc<EventBus>, beats: Arc<dyn BeatSource>) -> Self {
        Self {
            bus,
            beats,
            inner: RwLock::new(Indices::default()),
        }
    }

    /// Register or update the attachment `key`.
    ///
    /// Publishes nothing when channel and state are unchanged, one event for
    /// a new viewer or a state change, and two events (old channel first)
    /// when the attachment moves to another channel. A different `user_id`
    /// rebinds the key in the user index without publishing on its own.
    pub fn set_viewer(&self, key: ViewerKey, user_id: Uuid, channel_id: Uuid, state: ViewState) {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        match inner.remove(&key) {
            None => {
                debug!(key = %key, user_id = %user_id, channel_id = %channel_id, state = %state, "Viewer added");
                inner.insert(Viewer {
                    key,
                    user_id,
                    channel_id,
                    state,
                    since: Utc::now(),
                });
                self.publish_channel(inner, channel_id);
            }
            Some(mut viewer) => {
                let previous_channel = viewer.channel_id;
                let moved = previous_channel != channel_id;
                let changed = moved || viewer.state != state;
                if viewer.user_id != user_id {
                    debug!(key = %key, from = %viewer.user_id, to = %user_id, "Viewer rebound to another user");
                    viewer.user_id = user_id;
                }
                if changed {
                    viewer.since = Utc::now();
                    viewer.channel_id = channel_id;
                    viewer.state = state;
                }
                inner.insert(viewer);

                if !changed {
                    return;
                }
                debug!(key = %key, user_id = %user_id, channel_id = %channel_id, state = %state, "Viewer updated");
                if moved {
                    self.publish_channel(inner, previous_channel);
                }
                self.publish_channel(inner, channel_id);
            }
        }
    }

    /// Forget the attachment `key`. Unknown keys are ignored.
    pub fn remove_viewer(&self, key: &ViewerKey) {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let Some(viewer) = inner.remove(key) else {
            return;
        };
        debug!(key = %key, channel_id = %viewer.channel_id, "Viewer removed");
        self.publish_channel(inner, viewer.channel_id);
    }

    /// Effective view state of every user present on a channel, from both
    /// viewers and heartbeats. A user seen several times gets the highest state.
    pub fn get_channel_viewers(&self, channel_id: Uuid) -> HashMap<Uuid, ViewState> {
        let inner = self.inner.read();
        self.merged_viewers(&inner, channel_id)
    }

    /// Every attachment of one user and where it is.
    pub fn get_user_view_states(&self, user_id: Uuid) -> HashMap<ViewerKey, ChannelViewState> {
        let inner = self.inner.read();
        inner
            .users
            .get(&user_id)
            .into_iter()
            .flatten()
            .filter_map(|key| inner.viewers.get(key))
            .map(|v| {
                (
                    v.key.clone(),
                    ChannelViewState {
                        channel_id: v.channel_id,
                        state: v.state,
                    },
                )
            })
            .collect()
    }

    pub fn get_viewer(&self, key: &ViewerKey) -> Option<Viewer> {
        self.inner.read().viewers.get(key).cloned()
    }

    pub fn viewer_count(&self) -> usize {
        self.inner.read().viewers.len()
    }

    /// Number of channel entries, including emptied ones not yet collected.
    pub fn channel_count(&self) -> usize {
        self.inner.read().channels.len()
    }

    /// Drop empty channel and user entries. Returns how many were dropped.
    pub fn gc(&self) -> usize {
        let mut inner = self.inner.write();
        let before = inner.channels.len() + inner.users.len();
        inner.channels.retain(|_, keys| !keys.is_empty());
        inner.users.retain(|_, keys| !keys.is_empty());
        before - (inner.channels.len() + inner.users.len())
    }

    /// Spawn the periodic gc until `shutdown` fires.
    pub fn spawn_gc(
        self: &Arc<Self>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = manager.gc();
                        if removed > 0 {
                            debug!(removed, "Viewer gc dropped empty entries");
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
            debug!("Viewer gc stopped");
        })
    }

    fn merged_viewers(&self, inner: &Indices, channel_id: Uuid) -> HashMap<Uuid, ViewState> {
        let mut result = HashMap::new();
        for beat in self.beats.snapshot(channel_id) {
            merge_max(&mut result, beat.user_id, beat.state);
        }
        for viewer in inner.channel_viewers(channel_id) {
            merge_max(&mut result, viewer.user_id, viewer.state);
        }
        result
    }

    // Called with the index lock held so events for one channel leave in
    // mutation order. `EventBus::publish` never blocks or runs subscriber code.
    fn publish_channel(&self, inner: &Indices, channel_id: Uuid) {
        let viewers = self.merged_viewers(inner, channel_id);
        self.bus.publish(Event::ChannelViewersChanged {
            channel_id,
            viewers,
        });
    }

    #[cfg(test)]
    pub(crate) fn indices_consistent(&self) -> bool {
        let inner = self.inner.read();
        let forward = inner.viewers.iter().all(|(key, v)| {
            &v.key == key
                && inner.channels.get(&v.channel_id).is_some_and(|k| k.contains(key))
                && inner.users.get(&v.user_id).is_some_and(|k| k.contains(key))
        });
        let by_channel = inner.channels.iter().all(|(channel_id, keys)| {
            keys.iter()
                .all(|k| inner.viewers.get(k).is_some_and(|v| v.channel_id == *channel_id))
        });
        let by_user = inner.users.iter().all(|(user_id, keys)| {
            keys.iter()
                .all(|k| inner.viewers.get(k).is_some_and(|v| v.user_id == *user_id))
        });
        forward && by_channel && by_user
    }
}

impl BeatExpiryListener for ViewerManager {
    /// Publish for each channel whose merged view lost a user or dropped a
    /// user's state. A beat shadowed by a viewer of the same user with an
    /// equal or higher state changes nothing.
    fn beats_expired(&self, expired: &[Beat]) {
        let inner = self.inner.read();
        let mut changed: Vec<Uuid> = Vec::new();
        for beat in expired {
            let shadowed = inner
                .channel_viewers(beat.channel_id)
                .any(|v| v.user_id == beat.user_id && v.state >= beat.state);
            if !shadowed && !changed.contains(&beat.channel_id) {
                changed.push(beat.channel_id);
            }
        }
        for channel_id in changed {
            debug!(channel_id = %channel_id, "Heartbeat expiry changed channel viewers");
            self.publish_channel(&inner, channel_id);
        }
    }
}
