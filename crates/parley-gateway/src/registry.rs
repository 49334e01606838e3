use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use parley_types::events::Event;

pub type ConnectionId = Uuid;

/// Live connections and the identities they declared. An entry exists only
/// between a connection's `identify` and its disconnect; until a client
/// identifies, it can talk to the relay but receives no fan-out.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<HashMap<ConnectionId, Client>>>,
}

struct Client {
    user_id: String,
    tx: mpsc::UnboundedSender<Event>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a connection with a user id. A repeat call for the same
    /// connection replaces the previous association.
    pub async fn register(
        &self,
        conn_id: ConnectionId,
        user_id: String,
        tx: mpsc::UnboundedSender<Event>,
    ) {
        self.inner
            .write()
            .await
            .insert(conn_id, Client { user_id, tx });
    }

    /// Drop a connection's registration. Safe to call for connections that
    /// never identified; returns whether an entry was removed.
    pub async fn unregister(&self, conn_id: ConnectionId) -> bool {
        self.inner.write().await.remove(&conn_id).is_some()
    }

    /// Fan an event out to every registered connection. The sender list is
    /// snapshotted under the read lock first, so connects and disconnects
    /// during the fan-out cannot invalidate the traversal.
    pub async fn broadcast(&self, event: &Event) {
        let targets: Vec<mpsc::UnboundedSender<Event>> = self
            .inner
            .read()
            .await
            .values()
            .map(|client| client.tx.clone())
            .collect();

        for tx in targets {
            // Fails only when the connection's send task already shut down;
            // that connection is on its way out of the registry.
            let _ = tx.send(event.clone());
        }
    }

    /// Deliver an event to every connection registered under `user_id` —
    /// zero, one, or many. Returns how many connections accepted it; zero
    /// matches is not an error, the signal is simply dropped.
    pub async fn send_to_user(&self, user_id: &str, event: &Event) -> usize {
        let targets: Vec<mpsc::UnboundedSender<Event>> = self
            .inner
            .read()
            .await
            .values()
            .filter(|client| client.user_id == user_id)
            .map(|client| client.tx.clone())
            .collect();

        let mut delivered = 0;
        for tx in targets {
            if tx.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typing_event() -> Event {
        Event::Typing {
            conversation_id: "c1".into(),
            is_typing: true,
            sender_id: None,
        }
    }

    #[tokio::test]
    async fn broadcast_reaches_every_registered_connection() {
        let registry = Registry::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        registry.register(Uuid::new_v4(), "alice".into(), tx_a).await;
        registry.register(Uuid::new_v4(), "bob".into(), tx_b).await;

        registry.broadcast(&typing_event()).await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn send_to_user_hits_all_of_that_users_connections_only() {
        let registry = Registry::new();
        let (tx_b1, mut rx_b1) = mpsc::unbounded_channel();
        let (tx_b2, mut rx_b2) = mpsc::unbounded_channel();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        registry.register(Uuid::new_v4(), "bob".into(), tx_b1).await;
        registry.register(Uuid::new_v4(), "bob".into(), tx_b2).await;
        registry.register(Uuid::new_v4(), "alice".into(), tx_a).await;

        let delivered = registry.send_to_user("bob", &typing_event()).await;

        assert_eq!(delivered, 2);
        assert!(rx_b1.try_recv().is_ok());
        assert!(rx_b2.try_recv().is_ok());
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_to_unknown_user_is_a_silent_noop() {
        let registry = Registry::new();
        assert_eq!(registry.send_to_user("ghost", &typing_event()).await, 0);
    }

    #[tokio::test]
    async fn unregistered_connection_is_skipped() {
        let registry = Registry::new();
        let conn_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(conn_id, "alice".into(), tx).await;
        assert!(registry.unregister(conn_id).await);
        assert!(!registry.unregister(conn_id).await);

        registry.broadcast(&typing_event()).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_channel_does_not_disturb_the_rest_of_a_broadcast() {
        let registry = Registry::new();
        let (tx_dead, rx_dead) = mpsc::unbounded_channel();
        let (tx_live, mut rx_live) = mpsc::unbounded_channel();
        registry.register(Uuid::new_v4(), "dead".into(), tx_dead).await;
        registry.register(Uuid::new_v4(), "live".into(), tx_live).await;
        drop(rx_dead);

        registry.broadcast(&typing_event()).await;
        assert!(rx_live.try_recv().is_ok());
    }
}
