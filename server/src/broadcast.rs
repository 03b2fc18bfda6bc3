//! Event fan-out to connections subscribed to a session channel
//!
//! Each subscriber gets its own bounded queue, so a slow or dead
//! connection only ever loses its own events: `publish` never blocks and
//! never fails. A subscriber whose queue is full or whose receiver has
//! been dropped is pruned on the spot and logged, not retried.
//!
//! Publish calls happen while the publishing operation still holds the
//! session's lock, so within one channel every subscriber sees events in
//! the exact order the session applied the mutations. No ordering is
//! promised across channels.

use log::{debug, warn};
use shared::GameEvent;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Handle returned by `subscribe`; dropping the receiver (or the whole
/// subscription) is enough to get pruned on the next publish, but
/// explicit `unsubscribe` frees the slot immediately.
#[derive(Debug)]
pub struct Subscription {
    pub id: u64,
    pub receiver: mpsc::Receiver<GameEvent>,
}

struct Subscriber {
    id: u64,
    sender: mpsc::Sender<GameEvent>,
}

pub struct EventBroadcaster {
    // std Mutex: held only for map surgery and try_send, never across awaits.
    channels: Mutex<HashMap<String, Vec<Subscriber>>>,
    next_subscriber_id: AtomicU64,
    queue_depth: usize,
}

impl EventBroadcaster {
    pub fn new(queue_depth: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            next_subscriber_id: AtomicU64::new(1),
            queue_depth,
        }
    }

    /// Registers a new subscriber on a session channel.
    pub fn subscribe(&self, code: &str) -> Subscription {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.queue_depth);

        let mut channels = self.channels.lock().expect("broadcaster lock poisoned");
        channels
            .entry(code.to_string())
            .or_default()
            .push(Subscriber { id, sender });
        debug!("Subscriber {} joined channel {}", id, code);

        Subscription { id, receiver }
    }

    /// Removes one subscriber. Idempotent: unknown ids and channels are
    /// a no-op.
    pub fn unsubscribe(&self, code: &str, id: u64) {
        let mut channels = self.channels.lock().expect("broadcaster lock poisoned");
        if let Some(subscribers) = channels.get_mut(code) {
            subscribers.retain(|s| s.id != id);
            if subscribers.is_empty() {
                channels.remove(code);
            }
        }
    }

    /// Delivers `event` to every live subscriber of the channel.
    ///
    /// Best effort per subscriber: a full queue or a dropped receiver
    /// prunes that subscriber and the rest are unaffected.
    pub fn publish(&self, code: &str, event: &GameEvent) {
        let mut channels = self.channels.lock().expect("broadcaster lock poisoned");
        let Some(subscribers) = channels.get_mut(code) else {
            return;
        };

        subscribers.retain(|subscriber| match subscriber.sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    "Dropping slow subscriber {} on channel {} (queue full)",
                    subscriber.id, code
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Pruning closed subscriber {} on channel {}", subscriber.id, code);
                false
            }
        });

        if subscribers.is_empty() {
            channels.remove(code);
        }
    }

    /// Drops every subscriber of a channel, used when a session is
    /// destroyed.
    pub fn close_channel(&self, code: &str) {
        self.channels
            .lock()
            .expect("broadcaster lock poisoned")
            .remove(code);
    }

    pub fn subscriber_count(&self, code: &str) -> usize {
        self.channels
            .lock()
            .expect("broadcaster lock poisoned")
            .get(code)
            .map_or(0, |subscribers| subscribers.len())
    }
}
