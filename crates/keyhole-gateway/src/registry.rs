use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use uuid::Uuid;

use keyhole_types::events::GatewayEvent;

/// Tracks which users currently have a live gateway connection and owns
/// all event delivery. Presence is process-memory only: the map starts
/// empty on boot and an entry dies with its connection.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    /// Broadcast topic every connection subscribes to; carries the
    /// online-user-id list on every connect and disconnect
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// One entry per user: user_id -> live connection. A second
    /// connection from the same user replaces the first.
    connections: RwLock<HashMap<Uuid, ConnectionEntry>>,
}

struct ConnectionEntry {
    conn_id: Uuid,
    tx: mpsc::UnboundedSender<GatewayEvent>,
}

impl Registry {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(RegistryInner {
                broadcast_tx,
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to the broadcast topic. Connections must subscribe
    /// before registering so they observe their own arrival.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Register a user's connection, replacing any previous one
    /// (last socket wins), then announce the updated online list to
    /// every connected client. Returns (conn_id, targeted receiver).
    pub async fn register(&self, user_id: Uuid) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        self.inner
            .connections
            .write()
            .await
            .insert(user_id, ConnectionEntry { conn_id, tx });

        self.broadcast_online().await;
        (conn_id, rx)
    }

    /// Remove a user's entry, but only if `conn_id` still owns it: a
    /// newer connection from the same user must not be evicted by the
    /// old socket's teardown.
    pub async fn unregister(&self, user_id: Uuid, conn_id: Uuid) {
        let removed = {
            let mut connections = self.inner.connections.write().await;
            match connections.get(&user_id) {
                Some(entry) if entry.conn_id == conn_id => {
                    connections.remove(&user_id);
                    true
                }
                _ => false,
            }
        };

        if removed {
            self.broadcast_online().await;
        }
    }

    pub async fn online_user_ids(&self) -> Vec<Uuid> {
        self.inner.connections.read().await.keys().copied().collect()
    }

    /// Targeted, best-effort delivery. A user without a live connection
    /// simply misses the event; durable state lives in the store.
    pub async fn send_to_user(&self, user_id: Uuid, event: GatewayEvent) {
        let connections = self.inner.connections.read().await;
        if let Some(entry) = connections.get(&user_id) {
            let _ = entry.tx.send(event);
        }
    }

    async fn broadcast_online(&self) {
        let ids = self.online_user_ids().await;
        let _ = self.inner.broadcast_tx.send(GatewayEvent::OnlineUsers(ids));
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn online_ids(event: GatewayEvent) -> Vec<Uuid> {
        match event {
            GatewayEvent::OnlineUsers(ids) => ids,
            other => panic!("expected online list, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn connect_broadcasts_online_list_to_everyone() {
        let registry = Registry::new();
        let mut observer = registry.subscribe();

        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        registry.register(alice).await;
        assert_eq!(online_ids(observer.recv().await.unwrap()), vec![alice]);

        registry.register(bob).await;
        let ids = online_ids(observer.recv().await.unwrap());
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&alice) && ids.contains(&bob));
    }

    #[tokio::test]
    async fn disconnect_broadcasts_list_without_the_user() {
        let registry = Registry::new();
        let alice = Uuid::new_v4();
        let (conn_id, _rx) = registry.register(alice).await;

        let mut observer = registry.subscribe();
        registry.unregister(alice, conn_id).await;

        assert!(online_ids(observer.recv().await.unwrap()).is_empty());
    }

    #[tokio::test]
    async fn targeted_events_reach_only_the_named_user() {
        let registry = Registry::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let (_, mut alice_rx) = registry.register(alice).await;
        let (_, mut bob_rx) = registry.register(bob).await;

        let message_id = Uuid::new_v4();
        registry
            .send_to_user(alice, GatewayEvent::MessageDeleted(message_id))
            .await;

        match alice_rx.recv().await.unwrap() {
            GatewayEvent::MessageDeleted(id) => assert_eq!(id, message_id),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn delivery_to_offline_user_is_a_noop() {
        let registry = Registry::new();
        // No registration at all; must not panic or error.
        registry
            .send_to_user(Uuid::new_v4(), GatewayEvent::ConversationDeleted(Uuid::new_v4()))
            .await;
    }

    #[tokio::test]
    async fn second_connection_replaces_the_first() {
        let registry = Registry::new();
        let alice = Uuid::new_v4();

        let (old_conn, mut old_rx) = registry.register(alice).await;
        let (_new_conn, mut new_rx) = registry.register(alice).await;

        registry
            .send_to_user(alice, GatewayEvent::MessageDeleted(Uuid::new_v4()))
            .await;
        assert!(new_rx.recv().await.is_some());
        // The old channel's sender was dropped on replacement.
        assert!(old_rx.recv().await.is_none());

        // The old socket's teardown must not evict the new connection.
        registry.unregister(alice, old_conn).await;
        assert_eq!(registry.online_user_ids().await, vec![alice]);
    }
}
