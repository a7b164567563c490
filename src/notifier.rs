use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

use crate::group::Retention;

const CHANNEL_CAPACITY: usize = 32;

/// Channel address clients subscribe to for one group.
pub fn group_address(group_id: &str) -> String {
    format!("grp-{group_id}")
}

/// "Something changed, re-fetch" marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub update: String,
    /// Unix milliseconds.
    pub at: i64,
}

impl Notification {
    pub fn now() -> Self {
        Self {
            update: "now".to_string(),
            at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Per-address broadcast channels, created on first subscription.
#[derive(Default)]
pub struct Notifier {
    channels: RwLock<HashMap<String, broadcast::Sender<Notification>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, address: &str) -> broadcast::Receiver<Notification> {
        let mut channels = self.channels.write().await;
        channels
            .entry(address.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Send a notification to everyone on `address`. Returns how many
    /// subscribers received it.
    pub async fn publish(&self, address: &str, notification: Notification) -> usize {
        let mut channels = self.channels.write().await;
        let Some(sender) = channels.get(address) else {
            return 0;
        };
        match sender.send(notification) {
            Ok(received) => received,
            Err(_) => {
                // Every receiver is gone.
                channels.remove(address);
                0
            }
        }
    }

    /// Tell a group's subscribers that its state changed. A removed group's
    /// channel is closed after this last signal.
    pub async fn group_changed(&self, group_id: &str, retention: Retention) -> usize {
        let address = group_address(group_id);
        let received = self.publish(&address, Notification::now()).await;
        if retention == Retention::Remove {
            self.channels.write().await.remove(&address);
        }
        debug!("Notified {received} subscribers on {address}");
        received
    }

    /// Forget `address` once its last receiver is gone. Called by a
    /// subscriber after dropping its receiver.
    pub async fn release(&self, address: &str) {
        let mut channels = self.channels.write().await;
        if channels
            .get(address)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(address);
            debug!("Closed idle channel {address}");
        }
    }

    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let notifier = Notifier::new();
        let mut a = notifier.subscribe("grp-1").await;
        let mut b = notifier.subscribe("grp-1").await;
        let mut other = notifier.subscribe("grp-2").await;

        assert_eq!(notifier.group_changed("1", Retention::Persist).await, 2);
        assert_eq!(a.recv().await.expect("notification").update, "now");
        assert_eq!(b.recv().await.expect("notification").update, "now");
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_removed_group_closes_channel() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe(&group_address("g")).await;

        notifier.group_changed("g", Retention::Remove).await;
        assert!(rx.recv().await.is_ok());
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
        assert_eq!(notifier.channel_count().await, 0);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let notifier = Notifier::new();
        assert_eq!(notifier.publish("grp-none", Notification::now()).await, 0);

        let rx = notifier.subscribe("grp-gone").await;
        drop(rx);
        assert_eq!(notifier.publish("grp-gone", Notification::now()).await, 0);
        assert_eq!(notifier.channel_count().await, 0);
    }

    #[tokio::test]
    async fn test_release_drops_idle_channels() {
        let notifier = Notifier::new();
        for i in 0..100 {
            let address = format!("anything-{i}");
            let rx = notifier.subscribe(&address).await;
            drop(rx);
            notifier.release(&address).await;
        }
        assert_eq!(notifier.channel_count().await, 0);
    }

    #[tokio::test]
    async fn test_release_keeps_channel_with_listeners() {
        let notifier = Notifier::new();
        let first = notifier.subscribe("grp-1").await;
        let mut second = notifier.subscribe("grp-1").await;
        drop(first);
        notifier.release("grp-1").await;
        assert_eq!(notifier.channel_count().await, 1);

        assert_eq!(notifier.group_changed("1", Retention::Persist).await, 1);
        assert!(second.recv().await.is_ok());
    }
}
