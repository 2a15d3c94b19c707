//! Subscriber membership and frame fan-out.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Stable identity of one live subscriber.
pub type SubscriberId = Uuid;

/// Per-subscriber queue depth. A subscriber that falls this far behind is
/// treated as dead and removed.
const SUBSCRIBER_QUEUE: usize = 64;

/// One subscriber's end of the fan-out.
pub struct Subscription {
    pub id: SubscriberId,
    /// Pre-serialized wire messages, at most one per broadcast tick.
    pub rx: mpsc::Receiver<Arc<str>>,
}

struct Subscriber {
    id: SubscriberId,
    tx: mpsc::Sender<Arc<str>>,
}

/// The set of live listeners for tick data.
///
/// Membership changes concurrently with in-flight ticks; `publish` holds the
/// set lock for the whole pass so changes are never observed mid-broadcast.
#[derive(Default)]
pub struct SubscriberHub {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl SubscriberHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber. Frames broadcast before this call are not
    /// replayed.
    pub fn join(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE);
        let id = Uuid::new_v4();
        let mut subscribers = self.subscribers.lock().expect("hub lock");
        subscribers.push(Subscriber { id, tx });
        debug!(subscriber = %id, total = subscribers.len(), "subscriber joined");
        Subscription { id, rx }
    }

    /// Deregister a subscriber; returns how many remain.
    pub fn leave(&self, id: SubscriberId) -> usize {
        let mut subscribers = self.subscribers.lock().expect("hub lock");
        subscribers.retain(|s| s.id != id);
        debug!(subscriber = %id, total = subscribers.len(), "subscriber left");
        subscribers.len()
    }

    pub fn len(&self) -> usize {
        self.subscribers.lock().expect("hub lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver a pre-serialized message to every current subscriber.
    ///
    /// At-most-once per subscriber; a failed delivery removes that
    /// subscriber in the same pass and is never surfaced to the caller.
    /// Returns how many subscribers remain after the pass.
    pub fn publish(&self, msg: &Arc<str>) -> usize {
        let mut subscribers = self.subscribers.lock().expect("hub lock");
        subscribers.retain(|s| match s.tx.try_send(msg.clone()) {
            Ok(()) => true,
            Err(_) => {
                debug!(subscriber = %s.id, "dropping dead subscriber");
                false
            }
        });
        subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(s: &str) -> Arc<str> {
        Arc::from(s)
    }

    #[test]
    fn join_publish_leave() {
        let hub = SubscriberHub::new();
        let mut a = hub.join();
        let mut b = hub.join();
        assert_eq!(hub.len(), 2);

        assert_eq!(hub.publish(&wire("x")), 2);
        assert_eq!(a.rx.try_recv().unwrap().as_ref(), "x");
        assert_eq!(b.rx.try_recv().unwrap().as_ref(), "x");

        assert_eq!(hub.leave(a.id), 1);
        hub.publish(&wire("y"));
        assert!(a.rx.try_recv().is_err());
        assert_eq!(b.rx.try_recv().unwrap().as_ref(), "y");
    }

    #[test]
    fn dead_subscriber_removed_without_blocking_others() {
        let hub = SubscriberHub::new();
        let dead = hub.join();
        let mut live = hub.join();
        drop(dead.rx);

        // Dead receiver is pruned in the same pass; the live one still
        // gets the message.
        assert_eq!(hub.publish(&wire("tick")), 1);
        assert_eq!(hub.len(), 1);
        assert_eq!(live.rx.try_recv().unwrap().as_ref(), "tick");
    }

    #[test]
    fn saturated_subscriber_is_dropped() {
        let hub = SubscriberHub::new();
        let _stalled = hub.join();
        for _ in 0..SUBSCRIBER_QUEUE {
            assert_eq!(hub.publish(&wire("t")), 1);
        }
        // Queue full: next delivery fails and removes the subscriber.
        assert_eq!(hub.publish(&wire("t")), 0);
        assert!(hub.is_empty());
    }

    #[test]
    fn no_replay_for_late_joiners() {
        let hub = SubscriberHub::new();
        let early = hub.join();
        hub.publish(&wire("before"));
        let mut late = hub.join();
        hub.publish(&wire("after"));
        assert_eq!(late.rx.try_recv().unwrap().as_ref(), "after");
        assert!(late.rx.try_recv().is_err());
        drop(early);
    }
}
