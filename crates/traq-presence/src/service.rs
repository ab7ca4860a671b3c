//! Presence engine wiring.
//!
//! [`PresenceService`] owns the online counter, heartbeat registry and viewer
//! manager, runs their background tasks and turns connection events from the
//! bus into online counter updates.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use traq_common::{Event, EventBus, Subscription, Topic};

use crate::config::EngineConfig;
use crate::heartbeats::HeartBeats;
use crate::metrics::PresenceMetrics;
use crate::online_counter::OnlineCounter;
use crate::viewer::ViewerManager;

const CONNECTION_TOPICS: [Topic; 4] = [
    Topic::SseConnected,
    Topic::SseDisconnected,
    Topic::WsConnected,
    Topic::WsDisconnected,
];

/// The presence engine.
///
/// Connection events reach the online counter through a bus subscription.
/// If the relay falls more than the bus capacity behind, the dropped events
/// are lost: a missed `*_DISCONNECTED` keeps that user online until their
/// count is corrected by later traffic. Size the bus for connection bursts.
pub struct PresenceService {
    bus: Arc<EventBus>,
    online_counter: Arc<OnlineCounter>,
    heartbeats: Arc<HeartBeats>,
    viewer_manager: Arc<ViewerManager>,
    metrics: PresenceMetrics,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl PresenceService {
    /// Build the engine on `bus` and spawn its tasks. Must be called inside a
    /// tokio runtime.
    pub fn start(bus: Arc<EventBus>, config: EngineConfig) -> traq_common::Result<Self> {
        let metrics = PresenceMetrics::new()?;
        Ok(Self::start_with_metrics(bus, config, metrics))
    }

    pub fn start_with_metrics(
        bus: Arc<EventBus>,
        config: EngineConfig,
        metrics: PresenceMetrics,
    ) -> Self {
        let online_counter = Arc::new(OnlineCounter::new(
            Arc::clone(&bus),
            metrics.online_users().clone(),
        ));
        let heartbeats = Arc::new(HeartBeats::new(
            config.heartbeat_timeout,
            config.heartbeat_tick,
        ));
        let viewer_manager = Arc::new(ViewerManager::new(
            Arc::clone(&bus),
            heartbeats.clone(),
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Subscribe before spawning so no connection event published after
        // `start` returns can be missed.
        let connections = bus.subscribe(&CONNECTION_TOPICS);

        let tasks = vec![
            heartbeats.spawn_pruner(viewer_manager.clone(), shutdown_rx.clone()),
            viewer_manager.spawn_gc(config.viewer_gc_interval, shutdown_rx.clone()),
            tokio::spawn(relay_connection_events(
                connections,
                Arc::clone(&online_counter),
                shutdown_rx,
            )),
        ];

        info!(
            heartbeat_timeout_ms = config.heartbeat_timeout.as_millis() as u64,
            heartbeat_tick_ms = config.heartbeat_tick.as_millis() as u64,
            viewer_gc_interval_secs = config.viewer_gc_interval.as_secs(),
            "Presence service started"
        );

        Self {
            bus,
            online_counter,
            heartbeats,
            viewer_manager,
            metrics,
            shutdown_tx,
            tasks,
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn online_counter(&self) -> &Arc<OnlineCounter> {
        &self.online_counter
    }

    pub fn heartbeats(&self) -> &Arc<HeartBeats> {
        &self.heartbeats
    }

    pub fn viewer_manager(&self) -> &Arc<ViewerManager> {
        &self.viewer_manager
    }

    pub fn metrics(&self) -> &PresenceMetrics {
        &self.metrics
    }

    /// Stop every background task and wait for them to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                warn!(error = %e, "Presence task ended abnormally");
            }
        }
        info!("Presence service stopped");
    }
}

impl Drop for PresenceService {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

async fn relay_connection_events(
    mut events: Subscription,
    online_counter: Arc<OnlineCounter>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let skipped_before = events.skipped();
        let event = tokio::select! {
            event = events.recv() => event,
            _ = shutdown.changed() => break,
        };
        let skipped = events.skipped() - skipped_before;
        if skipped > 0 {
            warn!(
                skipped,
                total_skipped = events.skipped(),
                "Connection relay lagged; online counts may be stale until users reconnect"
            );
        }
        match event {
            Some(Event::SseConnected { user_id }) | Some(Event::WsConnected { user_id }) => {
                online_counter.inc(user_id);
            }
            Some(Event::SseDisconnected { user_id }) | Some(Event::WsDisconnected { user_id }) => {
                online_counter.dec(user_id);
            }
            Some(other) => debug!(topic = %other.topic(), "Ignoring non-connection event"),
            None => break,
        }
    }
    debug!("Connection relay stopped");
}
