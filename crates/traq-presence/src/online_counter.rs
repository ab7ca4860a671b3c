//! Reference-counted online state per user.
//!
//! Every live connection of a user holds one reference. The user is online
//! while the count is above zero; `USER_ONLINE` / `USER_OFFLINE` fire only on
//! the 0 -> 1 and 1 -> 0 crossings.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use prometheus::IntGauge;
use tracing::debug;
use traq_common::{Event, EventBus};
use uuid::Uuid;

struct Counter {
    count: u32,
    last_updated: DateTime<Utc>,
}

pub struct OnlineCounter {
    bus: Arc<EventBus>,
    online_users: IntGauge,
    counters: Mutex<HashMap<Uuid, Counter>>,
}

impl OnlineCounter {
    pub fn new(bus: Arc<EventBus>, online_users: IntGauge) -> Self {
        Self {
            bus,
            online_users,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Add a connection for `user_id`. Returns true if the user just came online.
    pub fn inc(&self, user_id: Uuid) -> bool {
        let mut counters = self.counters.lock();
        let now = Utc::now();
        let counter = counters.entry(user_id).or_insert(Counter {
            count: 0,
            last_updated: now,
        });
        counter.count += 1;
        counter.last_updated = now;
        if counter.count != 1 {
            return false;
        }

        // Published under the lock so a user's online/offline events keep
        // the order of the counter transitions.
        self.online_users.inc();
        debug!(user_id = %user_id, "User online");
        self.bus.publish(Event::UserOnline {
            user_id,
            datetime: now,
        });
        true
    }

    /// Drop a connection for `user_id`. Returns true if the user just went
    /// offline. Unknown users and users already at zero are left alone.
    pub fn dec(&self, user_id: Uuid) -> bool {
        let mut counters = self.counters.lock();
        let Some(counter) = counters.get_mut(&user_id) else {
            return false;
        };
        if counter.count == 0 {
            return false;
        }
        let now = Utc::now();
        counter.count -= 1;
        counter.last_updated = now;
        if counter.count != 0 {
            return false;
        }

        self.online_users.dec();
        debug!(user_id = %user_id, "User offline");
        self.bus.publish(Event::UserOffline {
            user_id,
            datetime: now,
        });
        true
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.counters
            .lock()
            .get(&user_id)
            .is_some_and(|c| c.count > 0)
    }

    /// Ids of every user currently online.
    pub fn online_user_ids(&self) -> Vec<Uuid> {
        self.counters
            .lock()
            .iter()
            .filter(|(_, c)| c.count > 0)
            .map(|(id, _)| *id)
            .collect()
    }

    /// When the user's connection count last changed.
    pub fn last_updated(&self, user_id: Uuid) -> Option<DateTime<Utc>> {
        self.counters.lock().get(&user_id).map(|c| c.last_updated)
    }
}
