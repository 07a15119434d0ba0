//! Current-value subject with RAII subscriptions.
//!
//! # Responsibility
//! - Hold the latest published value and replay it to new subscribers.
//! - Broadcast every publication to all live subscribers in order.
//!
//! # Invariants
//! - `subscribe` delivers the current value before returning.
//! - Deliveries are serialized: a subscriber never observes a stale replay
//!   after a newer broadcast.
//! - Callbacks must not subscribe to the same subject or trigger a publish
//!   from inside the callback; reading `value` and cancelling are safe.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct SubjectState<T> {
    value: T,
    subscribers: BTreeMap<u64, Callback<T>>,
    next_subscriber_id: u64,
}

/// Current-value subject: stores the latest value, replays it on subscribe,
/// and broadcasts every later publication to all live subscribers.
pub struct Subject<T> {
    state: Arc<Mutex<SubjectState<T>>>,
    // Serializes replay and broadcast so emission order is total.
    delivery: Mutex<()>,
}

impl<T: Clone + Send + 'static> Subject<T> {
    /// Creates a subject holding `initial` as its current value.
    pub fn new(initial: T) -> Self {
        Self {
            state: Arc::new(Mutex::new(SubjectState {
                value: initial,
                subscribers: BTreeMap::new(),
                next_subscriber_id: 0,
            })),
            delivery: Mutex::new(()),
        }
    }

    /// Returns a clone of the current value.
    pub fn value(&self) -> T {
        lock_ignoring_poison(&self.state).value.clone()
    }

    /// Registers `callback` and synchronously delivers the current value.
    ///
    /// The callback then runs after every publication until the returned
    /// subscription is dropped or cancelled.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let callback: Callback<T> = Arc::new(callback);

        let _delivery = lock_ignoring_poison(&self.delivery);
        let (id, current) = {
            let mut state = lock_ignoring_poison(&self.state);
            let id = state.next_subscriber_id;
            state.next_subscriber_id += 1;
            state.subscribers.insert(id, Arc::clone(&callback));
            (id, state.value.clone())
        };
        callback(&current);

        let state = Arc::downgrade(&self.state);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(state) = state.upgrade() {
                    lock_ignoring_poison(&state).subscribers.remove(&id);
                }
            })),
        }
    }

    /// Publishes `value` to all live subscribers in registration order.
    pub(crate) fn send(&self, value: T) {
        let _delivery = lock_ignoring_poison(&self.delivery);
        let (current, callbacks) = {
            let mut state = lock_ignoring_poison(&self.state);
            state.value = value;
            let callbacks: Vec<Callback<T>> = state.subscribers.values().cloned().collect();
            (state.value.clone(), callbacks)
        };
        for callback in callbacks {
            callback(&current);
        }
    }
}

/// Active registration handle. Dropping it detaches the subscriber.
#[must_use = "dropping the subscription immediately cancels it"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Detaches the subscriber now instead of at drop time.
    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::Subject;
    use std::sync::{Arc, Mutex};

    fn recording_sink() -> (Arc<Mutex<Vec<i32>>>, impl Fn(&i32) + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |value: &i32| sink.lock().unwrap().push(*value))
    }

    #[test]
    fn subscribe_delivers_current_value_immediately() {
        let subject = Subject::new(7);
        let (seen, sink) = recording_sink();

        let _subscription = subject.subscribe(sink);

        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }

    #[test]
    fn send_broadcasts_to_every_live_subscriber() {
        let subject = Subject::new(0);
        let (seen_a, sink_a) = recording_sink();
        let (seen_b, sink_b) = recording_sink();

        let _first = subject.subscribe(sink_a);
        let _second = subject.subscribe(sink_b);
        subject.send(1);
        subject.send(2);

        assert_eq!(*seen_a.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(*seen_b.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn dropped_subscription_stops_delivery() {
        let subject = Subject::new(0);
        let (seen, sink) = recording_sink();

        let subscription = subject.subscribe(sink);
        drop(subscription);
        subject.send(1);

        assert_eq!(*seen.lock().unwrap(), vec![0]);
    }

    #[test]
    fn explicit_cancel_stops_delivery() {
        let subject = Subject::new(0);
        let (seen, sink) = recording_sink();

        let subscription = subject.subscribe(sink);
        subscription.cancel();
        subject.send(1);

        assert_eq!(*seen.lock().unwrap(), vec![0]);
    }

    #[test]
    fn value_returns_latest_published() {
        let subject = Subject::new(1);
        assert_eq!(subject.value(), 1);

        subject.send(5);
        assert_eq!(subject.value(), 5);
    }

    #[test]
    fn late_subscriber_gets_latest_value_not_initial() {
        let subject = Subject::new(1);
        subject.send(9);

        let (seen, sink) = recording_sink();
        let _subscription = subject.subscribe(sink);

        assert_eq!(*seen.lock().unwrap(), vec![9]);
    }
}
