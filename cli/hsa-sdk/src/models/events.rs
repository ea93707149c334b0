//! Callback registration for state changes.

use std::fmt::Debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Callbacks notified, in registration order, of every emitted event.
pub struct Subscribers<E> {
    next_id: u64,
    callbacks: Vec<(SubscriptionId, Box<dyn Fn(&E)>)>,
}

impl<E> Default for Subscribers<E> {
    fn default() -> Self {
        Self {
            next_id: 0,
            callbacks: Vec::new(),
        }
    }
}

impl<E> Debug for Subscribers<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("count", &self.callbacks.len())
            .finish()
    }
}

impl<E> Subscribers<E> {
    pub fn subscribe(&mut self, callback: impl Fn(&E) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.callbacks.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(callback_id, _)| *callback_id != id);
        self.callbacks.len() != before
    }

    pub fn emit(&self, event: &E) {
        for (_, callback) in &self.callbacks {
            callback(event);
        }
    }
}
