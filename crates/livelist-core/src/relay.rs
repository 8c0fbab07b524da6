//! Thread-confinement relay.
//!
//! A relay marshals a source's change batches onto exactly one designated
//! consumer thread. A batch produced on that thread is dispatched to the
//! port's subscribers synchronously, after any queued batches, so arrival
//! order is preserved; a batch from any other thread is queued and
//! delivered when the designated thread pumps the port. Disposal of the
//! relay view only prevents future notifications; nothing cancels a batch
//! mid-flight.
//!
//! Subscribers receive owned batch data only. Because batches carry the
//! affected values, a confined consumer can maintain a full mirror of the
//! collection without ever touching the pipeline lock from its callbacks.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use crate::event::ChangeBatch;

type Subscriber<T> = Box<dyn FnMut(&ChangeBatch<T>) + Send>;

struct RelayShared<T> {
    queue: VecDeque<ChangeBatch<T>>,
    subs: Vec<(u64, Subscriber<T>)>,
    next_sub: u64,
    /// Ids unsubscribed while their subscriber was out being dispatched.
    removed: Vec<u64>,
}

pub(crate) struct RelayState<T> {
    designated: ThreadId,
    shared: Arc<Mutex<RelayShared<T>>>,
}

/// Consumer half of a relay, bound to the designated thread.
pub struct RelayPort<T> {
    designated: ThreadId,
    shared: Arc<Mutex<RelayShared<T>>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RelaySubscription(u64);

pub(crate) fn build<T>(designated: ThreadId) -> (RelayState<T>, RelayPort<T>) {
    let shared = Arc::new(Mutex::new(RelayShared {
        queue: VecDeque::new(),
        subs: Vec::new(),
        next_sub: 0,
        removed: Vec::new(),
    }));
    (
        RelayState {
            designated,
            shared: Arc::clone(&shared),
        },
        RelayPort { designated, shared },
    )
}

/// Producer-side delivery, called while the graph settles.
pub(crate) fn deliver<T: Clone>(state: &RelayState<T>, batch: &ChangeBatch<T>) {
    if thread::current().id() == state.designated {
        drain(&state.shared, Some(batch.clone()));
    } else {
        let mut shared = state.shared.lock().expect("relay state poisoned");
        shared.queue.push_back(batch.clone());
    }
}

/// Drain the queue (plus `extra`, if any) to the subscribers. The lock is
/// not held while subscriber callbacks run, so a callback may subscribe or
/// unsubscribe without deadlocking.
fn drain<T>(shared: &Arc<Mutex<RelayShared<T>>>, extra: Option<ChangeBatch<T>>) -> usize {
    let (batches, mut subs) = {
        let mut guard = shared.lock().expect("relay state poisoned");
        let mut batches: Vec<ChangeBatch<T>> = guard.queue.drain(..).collect();
        batches.extend(extra);
        (batches, std::mem::take(&mut guard.subs))
    };
    for batch in &batches {
        for (_, sub) in subs.iter_mut() {
            sub(batch);
        }
    }
    let delivered = batches.len();
    let mut guard = shared.lock().expect("relay state poisoned");
    let added = std::mem::take(&mut guard.subs);
    let removed = std::mem::take(&mut guard.removed);
    subs.retain(|(id, _)| !removed.contains(id));
    guard.subs = subs;
    guard.subs.extend(added);
    delivered
}

impl<T> RelayPort<T> {
    pub fn designated_thread(&self) -> ThreadId {
        self.designated
    }

    /// Register a consumer callback. Callbacks run on the designated
    /// thread only.
    pub fn subscribe(
        &self,
        subscriber: impl FnMut(&ChangeBatch<T>) + Send + 'static,
    ) -> RelaySubscription {
        let mut guard = self.shared.lock().expect("relay state poisoned");
        let id = guard.next_sub;
        guard.next_sub += 1;
        guard.subs.push((id, Box::new(subscriber)));
        RelaySubscription(id)
    }

    pub fn unsubscribe(&self, sub: RelaySubscription) -> bool {
        let mut guard = self.shared.lock().expect("relay state poisoned");
        let before = guard.subs.len();
        guard.subs.retain(|(id, _)| *id != sub.0);
        if guard.subs.len() != before {
            return true;
        }
        // The subscriber may currently be out on a dispatch; mark it for
        // removal on requeue.
        guard.removed.push(sub.0);
        false
    }

    /// Number of queued, undelivered batches.
    pub fn pending(&self) -> usize {
        self.shared.lock().expect("relay state poisoned").queue.len()
    }

    /// Deliver every queued batch, in arrival order. Must run on the
    /// designated thread. Returns the number of batches delivered.
    pub fn pump(&self) -> usize {
        assert_eq!(
            thread::current().id(),
            self.designated,
            "pump called off the designated thread"
        );
        drain(&self.shared, None)
    }
}
