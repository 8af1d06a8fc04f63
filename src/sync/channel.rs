//! Named in-process broadcast channel.
//!
//! Each view subscribes once and gets its own unbounded queue. Publishing
//! fans a message out to every subscriber except the publisher. Delivery is
//! best-effort: views that are not subscribed at publish time never see the
//! message and must hydrate from the durable store instead.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::protocol::SyncMessage;
use super::ViewId;

/// Broadcast hub shared by all views of one installation
#[derive(Debug)]
pub struct BroadcastChannel {
    name: String,
    subscribers: DashMap<ViewId, mpsc::UnboundedSender<String>>,
}

impl BroadcastChannel {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            subscribers: DashMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a view. A second subscription under the same id replaces the first.
    pub fn subscribe(self: &Arc<Self>, view_id: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.subscribers.insert(view_id.to_string(), tx).is_some() {
            warn!("View {} subscribed twice to {}", view_id, self.name);
        }
        debug!("View {} subscribed to {}", view_id, self.name);

        Subscription {
            view_id: view_id.to_string(),
            channel: Arc::clone(self),
            rx,
        }
    }

    /// Release a view's subscription
    pub fn unsubscribe(&self, view_id: &str) -> bool {
        let removed = self.subscribers.remove(view_id).is_some();
        if removed {
            debug!("View {} unsubscribed from {}", view_id, self.name);
        }
        removed
    }

    /// Deliver a message to every subscriber except `from`.
    ///
    /// Returns the number of views the message was handed to.
    pub fn publish(&self, from: &str, msg: &SyncMessage) -> usize {
        let text = match msg.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!("Dropping unencodable message from {}: {}", from, e);
                return 0;
            }
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for entry in self.subscribers.iter() {
            if entry.key() == from {
                continue;
            }
            if entry.value().send(text.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(entry.key().clone());
            }
        }

        for view_id in dead {
            debug!("Pruning closed subscriber {}", view_id);
            self.subscribers.remove(&view_id);
        }

        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_subscribed(&self, view_id: &str) -> bool {
        self.subscribers.contains_key(view_id)
    }
}

/// A view's live subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    view_id: ViewId,
    channel: Arc<BroadcastChannel>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl Subscription {
    /// Wait for the next decodable message. `None` once the channel is gone.
    pub async fn recv(&mut self) -> Option<SyncMessage> {
        loop {
            let text = self.rx.recv().await?;
            if let Some(msg) = self.decode(&text) {
                return Some(msg);
            }
        }
    }

    /// Next already-queued decodable message, without waiting
    pub fn try_recv(&mut self) -> Option<SyncMessage> {
        while let Ok(text) = self.rx.try_recv() {
            if let Some(msg) = self.decode(&text) {
                return Some(msg);
            }
        }
        None
    }

    fn decode(&self, text: &str) -> Option<SyncMessage> {
        match SyncMessage::decode(text) {
            Ok(msg) => Some(msg),
            Err(e) => {
                warn!("View {} dropped undecodable message: {}", self.view_id, e);
                None
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.channel.unsubscribe(&self.view_id);
    }
}
