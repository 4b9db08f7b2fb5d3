//! In-process fan-out of freshly created notifications to connected clients.
//!
//! Each user with at least one open stream has a broadcast channel. Users
//! without subscribers have no channel, publishing to them is a no-op.

use std::collections::HashMap;

use tokio::sync::{broadcast, RwLock};

use super::models::Notification;

const DEFAULT_CHANNEL_CAPACITY: usize = 64;

pub struct NotificationHub {
    /// user_id -> sender
    channels: RwLock<HashMap<usize, broadcast::Sender<Notification>>>,
    capacity: usize,
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// `capacity` is how many notifications a slow subscriber may lag
    /// behind before it starts missing some.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub async fn subscribe(&self, user_id: usize) -> broadcast::Receiver<Notification> {
        let mut channels = self.channels.write().await;
        channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Returns how many subscribers received the notification.
    pub async fn publish(&self, user_id: usize, notification: &Notification) -> usize {
        let delivered = {
            let channels = self.channels.read().await;
            match channels.get(&user_id) {
                Some(sender) => sender.send(notification.clone()).unwrap_or(0),
                None => return 0,
            }
        };
        if delivered == 0 {
            self.prune(user_id).await;
        }
        delivered
    }

    pub async fn subscriber_count(&self, user_id: usize) -> usize {
        self.channels
            .read()
            .await
            .get(&user_id)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    /// Drops the channel of a user whose streams are all gone.
    pub async fn prune(&self, user_id: usize) {
        let mut channels = self.channels.write().await;
        if let Some(sender) = channels.get(&user_id) {
            if sender.receiver_count() == 0 {
                channels.remove(&user_id);
            }
        }
    }
}
