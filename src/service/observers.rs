//! Registry of snapshot observers
//!
//! Each observer gets a bounded channel. Broadcasting never blocks: a full
//! channel drops that update for that observer only, and a closed channel
//! unregisters it.

use log::{debug, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Mutex, PoisonError};

/// Updates buffered per observer before new ones are dropped
pub const OBSERVER_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);

struct Observer {
    id: ObserverId,
    sender: SyncSender<String>,
}

#[derive(Default)]
pub struct ObserverRegistry {
    observers: Mutex<Vec<Observer>>,
    next_id: AtomicU64,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new observer and hand back its receiving end
    pub fn register(&self) -> (ObserverId, Receiver<String>) {
        let (sender, receiver) = mpsc::sync_channel(OBSERVER_BUFFER);
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Observer { id, sender });
        debug!("Observer {:?} registered", id);
        (id, receiver)
    }

    pub fn unregister(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|o| o.id != id);
        before != observers.len()
    }

    pub fn len(&self) -> usize {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send one message to a single observer
    pub fn send_to(&self, id: ObserverId, message: String) -> bool {
        let sender = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|o| o.id == id)
            .map(|o| o.sender.clone());
        sender.is_some_and(|s| s.try_send(message).is_ok())
    }

    /// Deliver `message` to every observer. Returns how many accepted it.
    pub fn broadcast(&self, message: &str) -> usize {
        // Work on a copy so registration never waits on a broadcast
        let targets: Vec<(ObserverId, SyncSender<String>)> = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|o| (o.id, o.sender.clone()))
            .collect();

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (id, sender) in targets {
            match sender.try_send(message.to_string()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => debug!("Observer {:?} is behind, update dropped", id),
                Err(TrySendError::Disconnected(_)) => closed.push(id),
            }
        }

        if !closed.is_empty() {
            warn!("Removing {} disconnected observer(s)", closed.len());
            self.observers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|o| !closed.contains(&o.id));
        }
        delivered
    }
}
