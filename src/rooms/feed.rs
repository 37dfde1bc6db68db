//! Live, ordered, size-limited view over the message collection.
//!
//! The feed keeps the latest [`FEED_LIMIT`] messages as a shared snapshot
//! and republishes it after every write that changes the window.
//! Subscribers always receive the whole refreshed window, never deltas.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};

use crate::db::{Message, NewMessage};

use super::store::{MessageStore, StoreError};

pub const FEED_LIMIT: usize = 25;

pub type Snapshot = Arc<[Message]>;

#[derive(Clone)]
pub struct MessageFeed {
    store: Arc<dyn MessageStore>,
    snapshot: Arc<watch::Sender<Snapshot>>,
    publish: Arc<Mutex<()>>,
}

impl MessageFeed {
    pub async fn open(store: Arc<dyn MessageStore>) -> Result<Self, StoreError> {
        let initial: Snapshot = store.latest(FEED_LIMIT).await?.into();
        let (snapshot, _) = watch::channel(initial);

        Ok(Self {
            store,
            snapshot: Arc::new(snapshot),
            publish: Arc::new(Mutex::new(())),
        })
    }

    /// Writes a message and publishes the refreshed window. Once the
    /// write lands the result is `Ok` even if publishing fails.
    pub async fn append(&self, message: NewMessage) -> Result<Message, StoreError> {
        let _publishing = self.publish.lock().await;

        let stored = self.store.add(message).await?;
        let latest = match self.store.latest(FEED_LIMIT).await {
            Ok(latest) => latest,
            Err(err) => {
                // the write landed; the next append republishes
                tracing::warn!(id = %stored.id, error = %err, "feed refresh failed");
                return Ok(stored);
            }
        };
        self.snapshot.send_if_modified(|current| {
            if current[..] == latest[..] {
                return false;
            }
            *current = latest.into();
            true
        });

        Ok(stored)
    }

    pub fn subscribe(&self, limit: usize) -> FeedSubscription {
        FeedSubscription {
            rx: self.snapshot.subscribe(),
            limit: limit.min(FEED_LIMIT),
        }
    }

    /// The current window without subscribing.
    pub fn latest(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.snapshot.receiver_count()
    }
}

/// One open subscription. Dropping it releases it.
pub struct FeedSubscription {
    rx: watch::Receiver<Snapshot>,
    limit: usize,
}

impl FeedSubscription {
    /// The latest delivered window, marking it as seen.
    pub fn current(&mut self) -> Vec<Message> {
        let snapshot = self.rx.borrow_and_update();
        let skip = snapshot.len().saturating_sub(self.limit);
        snapshot[skip..].to_vec()
    }

    /// Waits for the next window. `None` once the feed is gone.
    pub async fn changed(&mut self) -> Option<Vec<Message>> {
        self.rx.changed().await.ok()?;
        Some(self.current())
    }

    pub fn unsubscribe(self) {}
}
