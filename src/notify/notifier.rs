//! Subscriber registry and broadcast.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::file::MetadataStore;

use super::Notification;

/// Pending pushes each subscriber may buffer before it is dropped.
pub const SUBSCRIBER_BUFFER: usize = 32;

/// Fans listing snapshots out to subscribers.
///
/// Pushes are serialized JSON text. A subscriber whose buffer is full or
/// whose receiver is gone is removed; broadcasting never waits on one.
pub struct ChangeNotifier {
    metadata: Arc<MetadataStore>,
    subscribers: Mutex<HashMap<Uuid, mpsc::Sender<Arc<str>>>>,
    buffer: usize,
}

impl ChangeNotifier {
    /// Create a notifier that reads listings from `metadata`.
    pub fn new(metadata: Arc<MetadataStore>) -> Self {
        Self::with_buffer(metadata, SUBSCRIBER_BUFFER)
    }

    /// Create a notifier with a custom per-subscriber buffer.
    pub fn with_buffer(metadata: Arc<MetadataStore>, buffer: usize) -> Self {
        Self {
            metadata,
            subscribers: Mutex::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// Register a subscriber; the current listing is queued immediately.
    ///
    /// Dropping the returned [`Subscription`] unsubscribes.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.buffer);

        // Held across the snapshot so no broadcast can slip in between.
        let mut subscribers = self.subscribers.lock();
        if let Some(text) = self.snapshot() {
            let _ = tx.try_send(text);
        }
        subscribers.insert(id, tx);
        let count = subscribers.len();
        drop(subscribers);

        tracing::debug!(subscriber = %id, subscribers = count, "Subscriber registered");

        Subscription {
            id,
            receiver: rx,
            notifier: Arc::downgrade(self),
        }
    }

    /// Remove a subscriber. Unknown IDs are ignored.
    pub fn unsubscribe(&self, id: Uuid) {
        if self.subscribers.lock().remove(&id).is_some() {
            tracing::debug!(subscriber = %id, "Subscriber removed");
        }
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Push the current listing to every subscriber.
    ///
    /// Returns the number of subscribers that received it.
    pub fn broadcast(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        if subscribers.is_empty() {
            return 0;
        }

        let Some(text) = self.snapshot() else {
            return 0;
        };

        tracing::debug!(subscribers = subscribers.len(), "Broadcasting file update");

        subscribers.retain(|id, tx| match tx.try_send(Arc::clone(&text)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(subscriber = %id, "Dropping subscriber that fell behind");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(subscriber = %id, "Dropping closed subscriber");
                false
            }
        });

        subscribers.len()
    }

    fn snapshot(&self) -> Option<Arc<str>> {
        let message = Notification::FileUpdate {
            files: self.metadata.summaries(),
        };
        match serde_json::to_string(&message) {
            Ok(text) => Some(text.into()),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize file update");
                None
            }
        }
    }
}

/// A registered observer's receiving end.
pub struct Subscription {
    id: Uuid,
    receiver: mpsc::Receiver<Arc<str>>,
    notifier: Weak<ChangeNotifier>,
}

impl Subscription {
    /// Subscriber ID.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the next push.
    ///
    /// Returns `None` once the notifier has dropped this subscriber.
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        self.receiver.recv().await
    }

    /// Take a queued push without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<str>> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(notifier) = self.notifier.upgrade() {
            notifier.unsubscribe(self.id);
        }
    }
}
