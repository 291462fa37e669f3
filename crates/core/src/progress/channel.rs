//! Per-artifact publish/subscribe of progress events.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use futures::Stream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use super::types::ProgressEvent;

type Slot = watch::Sender<Option<ProgressEvent>>;

#[derive(Default)]
struct Inner {
    subscribers: RwLock<HashMap<String, HashMap<u64, Slot>>>,
    next_key: AtomicU64,
}

impl Inner {
    fn remove(&self, artifact_id: &str, key: u64) {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(slots) = subscribers.get_mut(artifact_id) {
            slots.remove(&key);
            if slots.is_empty() {
                subscribers.remove(artifact_id);
            }
        }
    }
}

/// Broadcasts progress events to the observers of each artifact.
///
/// Each subscriber owns a single-slot mailbox: publishing overwrites the slot
/// and never waits. Subscribing does not start any work and unsubscribing
/// does not cancel any.
#[derive(Clone, Default)]
pub struct ProgressChannel {
    inner: Arc<Inner>,
}

impl ProgressChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes an event to every current subscriber of `artifact_id`.
    pub fn publish(&self, artifact_id: &str, event: ProgressEvent) {
        let subscribers = self
            .inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(slots) = subscribers.get(artifact_id) {
            for slot in slots.values() {
                slot.send_replace(Some(event));
            }
        }
    }

    /// Subscribes to events for `artifact_id` published from now on.
    ///
    /// The subscription ends when the returned value is dropped.
    pub fn subscribe(&self, artifact_id: &str) -> Subscription {
        let key = self.inner.next_key.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(artifact_id.to_string())
            .or_default()
            .insert(key, tx);
        debug!("Progress subscriber {} added for {}", key, artifact_id);

        Subscription {
            artifact_id: artifact_id.to_string(),
            key,
            rx,
            channel: Arc::downgrade(&self.inner),
        }
    }

    /// Subscribes a callback, invoked from a background task for every event
    /// this subscriber observes.
    ///
    /// Must be called within a tokio runtime. The handler must not drop or
    /// unsubscribe its own token.
    pub fn subscribe_with<F>(&self, artifact_id: &str, handler: F) -> SubscriptionToken
    where
        F: Fn(ProgressEvent) + Send + Sync + 'static,
    {
        let mut subscription = self.subscribe(artifact_id);
        let key = subscription.key;
        let active = Arc::new(Mutex::new(true));
        let gate = Arc::clone(&active);

        let task = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                // The gate is held while the handler runs, so unsubscribing
                // waits out an in-flight delivery.
                let open = gate.lock().unwrap_or_else(PoisonError::into_inner);
                if !*open {
                    break;
                }
                handler(event);
            }
        });

        SubscriptionToken {
            artifact_id: artifact_id.to_string(),
            key,
            active,
            task: Some(task),
            channel: Arc::downgrade(&self.inner),
        }
    }

    /// Ends a callback subscription. Once this returns the handler is not
    /// running and will not be invoked again.
    pub fn unsubscribe(&self, token: SubscriptionToken) {
        token.unsubscribe();
    }

    /// Number of live subscribers for `artifact_id`.
    pub fn subscriber_count(&self, artifact_id: &str) -> usize {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(artifact_id)
            .map_or(0, HashMap::len)
    }
}

/// A stream of progress events for one artifact.
pub struct Subscription {
    artifact_id: String,
    key: u64,
    rx: watch::Receiver<Option<ProgressEvent>>,
    channel: Weak<Inner>,
}

impl Subscription {
    pub fn artifact_id(&self) -> &str {
        &self.artifact_id
    }

    /// Waits for the next event. Intermediate events published while the
    /// caller was busy are skipped; only the latest is returned.
    ///
    /// Returns `None` once the channel is gone.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(event) = *self.rx.borrow_and_update() {
                return Some(event);
            }
        }
    }

    /// Converts the subscription into a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        futures::stream::unfold(self, |mut subscription| async move {
            subscription
                .recv()
                .await
                .map(|event| (event, subscription))
        })
    }

    /// Ends the subscription.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.channel.upgrade() {
            inner.remove(&self.artifact_id, self.key);
            debug!(
                "Progress subscriber {} removed for {}",
                self.key, self.artifact_id
            );
        }
    }
}

/// Handle to a callback subscription created by
/// [`ProgressChannel::subscribe_with`]. Dropping it unsubscribes.
pub struct SubscriptionToken {
    artifact_id: String,
    key: u64,
    active: Arc<Mutex<bool>>,
    task: Option<JoinHandle<()>>,
    channel: Weak<Inner>,
}

impl SubscriptionToken {
    /// Ends the subscription; see [`ProgressChannel::unsubscribe`].
    pub fn unsubscribe(self) {}

    fn close(&mut self) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = false;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(inner) = self.channel.upgrade() {
            inner.remove(&self.artifact_id, self.key);
        }
    }
}

impl Drop for SubscriptionToken {
    fn drop(&mut self) {
        self.close();
    }
}
