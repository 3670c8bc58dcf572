//! Registry of connected Engine GUIs

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Frame queued for a peer's socket writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Close,
}

/// One live WebSocket connection
#[derive(Debug, Clone)]
pub struct Peer {
    id: Uuid,
    address: SocketAddr,
    sender: mpsc::UnboundedSender<Outbound>,
    open: Arc<AtomicBool>,
}

impl Peer {
    /// Create a peer and the queue its socket writer drains
    pub fn new(address: SocketAddr) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let peer = Self {
            id: Uuid::new_v4(),
            address,
            sender,
            open: Arc::new(AtomicBool::new(true)),
        };
        (peer, receiver)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Open until closing starts or the writer goes away
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.sender.is_closed()
    }

    /// Stop accepting new frames
    pub fn mark_closing(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// Queue a text frame; false when the peer is not open
    pub fn send_text(&self, text: &str) -> bool {
        if !self.is_open() {
            return false;
        }
        self.sender.send(Outbound::Text(text.to_string())).is_ok()
    }

    /// Queue a close frame and stop accepting new ones
    pub fn close(&self) {
        let was_open = self.open.swap(false, Ordering::AcqRel);
        if was_open {
            let _ = self.sender.send(Outbound::Close);
        }
    }
}

/// Outcome of sending one frame to every registered peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Peers registered when the snapshot was taken
    pub known: usize,
    /// Peers the frame was queued for
    pub delivered: usize,
}

/// Shared, cloneable handle to the set of connected peers
#[derive(Debug, Clone, Default)]
pub struct PeerRegistry {
    peers: Arc<RwLock<HashMap<Uuid, Peer>>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer, returning the new count
    pub async fn insert(&self, peer: Peer) -> usize {
        let mut peers = self.peers.write().await;
        peers.insert(peer.id(), peer);
        peers.len()
    }

    /// Unregister a peer, returning it with the remaining count
    pub async fn remove(&self, id: Uuid) -> (Option<Peer>, usize) {
        let mut peers = self.peers.write().await;
        let removed = peers.remove(&id);
        (removed, peers.len())
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }

    /// Copy of the current peers
    pub async fn snapshot(&self) -> Vec<Peer> {
        self.peers.read().await.values().cloned().collect()
    }

    /// Remove every peer and hand them back
    pub async fn clear(&self) -> Vec<Peer> {
        self.peers.write().await.drain().map(|(_, peer)| peer).collect()
    }

    /// Send a text frame to every open peer in a snapshot taken now
    pub async fn broadcast(&self, text: &str) -> BroadcastReport {
        let snapshot = self.snapshot().await;
        let delivered = snapshot.iter().filter(|peer| peer.send_text(text)).count();

        tracing::debug!(
            "Broadcast to {} of {} peers",
            delivered,
            snapshot.len()
        );

        BroadcastReport {
            known: snapshot.len(),
            delivered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[tokio::test]
    async fn test_broadcast_skips_closing_peers() {
        let registry = PeerRegistry::new();
        let (a, mut rx_a) = Peer::new(addr(50001));
        let (b, mut rx_b) = Peer::new(addr(50002));
        let (c, _rx_c) = Peer::new(addr(50003));
        registry.insert(a).await;
        registry.insert(b).await;
        registry.insert(c.clone()).await;

        c.mark_closing();

        let report = registry.broadcast("hello").await;
        assert_eq!(report, BroadcastReport { known: 3, delivered: 2 });
        assert_eq!(rx_a.recv().await, Some(Outbound::Text("hello".into())));
        assert_eq!(rx_b.recv().await, Some(Outbound::Text("hello".into())));
    }

    #[tokio::test]
    async fn test_dropped_writer_counts_as_closed() {
        let (peer, rx) = Peer::new(addr(50004));
        drop(rx);
        assert!(!peer.is_open());
        assert!(!peer.send_text("x"));
    }

    #[tokio::test]
    async fn test_close_queues_one_close_frame() {
        let (peer, mut rx) = Peer::new(addr(50005));
        peer.close();
        peer.close();
        assert!(!peer.is_open());
        assert_eq!(rx.recv().await, Some(Outbound::Close));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let registry = PeerRegistry::new();
        let (a, _rx_a) = Peer::new(addr(50006));
        let (b, _rx_b) = Peer::new(addr(50007));
        let a_id = a.id();
        assert_eq!(registry.insert(a).await, 1);
        assert_eq!(registry.insert(b).await, 2);

        let (removed, remaining) = registry.remove(a_id).await;
        assert_eq!(removed.map(|p| p.id()), Some(a_id));
        assert_eq!(remaining, 1);

        let (removed, _) = registry.remove(a_id).await;
        assert!(removed.is_none());

        assert_eq!(registry.clear().await.len(), 1);
        assert!(registry.is_empty().await);
    }
}
