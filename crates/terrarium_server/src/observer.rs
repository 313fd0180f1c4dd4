//! # Observer Hand-off
//!
//! Network threads learn which objects each client knows about. They report
//! changes through an [`ObserverHandle`]; the simulation thread drains the
//! queue at the start of each tick, so `known_by_count` never changes in
//! the middle of a pass.
//!
//! ```text
//! net thread ──KnownByDelta──► channel ──drain at tick start──► registry
//! ```

use crossbeam_channel::{Receiver, SendError, Sender};
use terrarium_core::ObjectId;

/// A change in how many observers hold an object's id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KnownByDelta {
    /// Object whose observer count changes.
    pub id: ObjectId,
    /// Signed change; +1 when a client learns the id, -1 when it forgets it.
    pub delta: i32,
}

/// Cloneable sending side, safe to move to other threads.
#[derive(Clone, Debug)]
pub struct ObserverHandle {
    sender: Sender<KnownByDelta>,
}

impl ObserverHandle {
    /// Queues a known-by change for the next tick.
    ///
    /// # Errors
    ///
    /// Fails only if the simulation has been dropped.
    pub fn set_known_by_count(&self, id: ObjectId, delta: i32) -> Result<(), SendError<KnownByDelta>> {
        self.sender.send(KnownByDelta { id, delta })
    }
}

/// Receiving side, owned by the simulation.
#[derive(Debug)]
pub struct ObserverQueue {
    sender: Sender<KnownByDelta>,
    receiver: Receiver<KnownByDelta>,
}

impl ObserverQueue {
    /// Creates an unbounded queue.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }

    /// Returns a new sending handle.
    #[must_use]
    pub fn handle(&self) -> ObserverHandle {
        ObserverHandle {
            sender: self.sender.clone(),
        }
    }

    /// Queues a delta from the simulation thread itself.
    pub fn push(&self, id: ObjectId, delta: i32) {
        // Cannot fail while `self` holds the receiver.
        if self.sender.send(KnownByDelta { id, delta }).is_err() {
            tracing::error!("observer queue closed; dropped delta for object {}", id);
        }
    }

    /// Takes every queued delta without blocking.
    pub fn drain(&self) -> impl Iterator<Item = KnownByDelta> + '_ {
        self.receiver.try_iter()
    }
}

impl Default for ObserverQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deltas_arrive_in_order() {
        let queue = ObserverQueue::new();
        let handle = queue.handle();
        handle.set_known_by_count(ObjectId::new(1), 1).unwrap();
        handle.set_known_by_count(ObjectId::new(1), -1).unwrap();

        let drained: Vec<_> = queue.drain().collect();
        assert_eq!(
            drained,
            vec![
                KnownByDelta { id: ObjectId::new(1), delta: 1 },
                KnownByDelta { id: ObjectId::new(1), delta: -1 },
            ]
        );
        assert_eq!(queue.drain().count(), 0);
    }

    #[test]
    fn test_handle_from_other_thread() {
        let queue = ObserverQueue::new();
        let handle = queue.handle();
        std::thread::spawn(move || {
            handle.set_known_by_count(ObjectId::new(9), 2).unwrap();
        })
        .join()
        .unwrap();
        assert_eq!(queue.drain().next().map(|d| d.delta), Some(2));
    }
}
