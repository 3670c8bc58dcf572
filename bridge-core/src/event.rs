//! Event system for decoupled status reporting between components

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;

/// Events published by the hub
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SystemEvent {
    /// Listener bound and accepting connections
    ServerStarted { address: SocketAddr },
    /// Listener released
    ServerStopped,
    /// An Engine GUI connected
    PeerConnected {
        peer_id: Uuid,
        address: SocketAddr,
        peer_count: usize,
    },
    /// An Engine GUI went away
    PeerDisconnected {
        peer_id: Uuid,
        address: SocketAddr,
        peer_count: usize,
    },
}

impl SystemEvent {
    pub fn server_started(address: SocketAddr) -> Self {
        Self::ServerStarted { address }
    }

    pub fn server_stopped() -> Self {
        Self::ServerStopped
    }

    pub fn peer_connected(peer_id: Uuid, address: SocketAddr, peer_count: usize) -> Self {
        Self::PeerConnected {
            peer_id,
            address,
            peer_count,
        }
    }

    pub fn peer_disconnected(peer_id: Uuid, address: SocketAddr, peer_count: usize) -> Self {
        Self::PeerDisconnected {
            peer_id,
            address,
            peer_count,
        }
    }

    /// Short identifier of the event kind
    pub fn event_type(&self) -> &'static str {
        match self {
            SystemEvent::ServerStarted { .. } => "server_started",
            SystemEvent::ServerStopped => "server_stopped",
            SystemEvent::PeerConnected { .. } => "peer_connected",
            SystemEvent::PeerDisconnected { .. } => "peer_disconnected",
        }
    }

    /// Human readable description for logs
    pub fn description(&self) -> String {
        match self {
            SystemEvent::ServerStarted { address, .. } => {
                format!("Debug server started on {}", address)
            }
            SystemEvent::ServerStopped => "Debug server stopped".to_string(),
            SystemEvent::PeerConnected { address, .. } => {
                format!("Engine GUI connected: {}", address)
            }
            SystemEvent::PeerDisconnected { address, .. } => {
                format!("Engine GUI disconnected: {}", address)
            }
        }
    }
}

/// Handler for system events
#[async_trait]
pub trait SystemEventHandler: Send + Sync {
    /// Handle a system event
    async fn handle_system_event(&self, event: &SystemEvent) -> Result<()>;

    /// Get handler name for debugging
    fn handler_name(&self) -> &str {
        "UnnamedSystemEventHandler"
    }
}

/// Event bus for publishing and subscribing to events
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish a system event to all subscribers
    async fn publish_system_event(&self, event: SystemEvent) -> Result<()>;

    /// Subscribe to system events
    async fn subscribe_system_events(
        &self,
        handler: Arc<dyn SystemEventHandler>,
    ) -> Result<SubscriptionId>;

    /// Unsubscribe from events
    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()>;

    /// Get the number of active subscriptions
    async fn subscription_count(&self) -> usize;
}

/// Unique identifier for event subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

/// In-process event bus that calls handlers in place
pub struct InMemoryEventBus {
    subscriptions: RwLock<HashMap<SubscriptionId, Arc<dyn SystemEventHandler>>>,
}

impl InMemoryEventBus {
    /// Create a new in-memory event bus
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish_system_event(&self, event: SystemEvent) -> Result<()> {
        tracing::debug!("Publishing event: {}", event.event_type());

        let handlers: Vec<Arc<dyn SystemEventHandler>> =
            self.subscriptions.read().await.values().cloned().collect();

        for handler in handlers {
            if let Err(e) = handler.handle_system_event(&event).await {
                tracing::error!(
                    "Handler {} failed to process event {}: {}",
                    handler.handler_name(),
                    event.event_type(),
                    e
                );
            }
        }

        Ok(())
    }

    async fn subscribe_system_events(
        &self,
        handler: Arc<dyn SystemEventHandler>,
    ) -> Result<SubscriptionId> {
        let id = SubscriptionId::new();
        tracing::debug!(
            "Created subscription {:?} for handler {}",
            id,
            handler.handler_name()
        );
        self.subscriptions.write().await.insert(id, handler);
        Ok(id)
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        if self.subscriptions.write().await.remove(&id).is_none() {
            tracing::warn!("Attempted to remove non-existent subscription: {:?}", id);
        }
        Ok(())
    }

    async fn subscription_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        seen: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl SystemEventHandler for Recorder {
        async fn handle_system_event(&self, event: &SystemEvent) -> Result<()> {
            self.seen.lock().unwrap().push(event.event_type());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = InMemoryEventBus::new();
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });

        let id = bus.subscribe_system_events(recorder.clone()).await.unwrap();
        assert_eq!(bus.subscription_count().await, 1);

        let addr: SocketAddr = "127.0.0.1:1101".parse().unwrap();
        bus.publish_system_event(SystemEvent::server_started(addr))
            .await
            .unwrap();
        bus.publish_system_event(SystemEvent::peer_connected(Uuid::new_v4(), addr, 1))
            .await
            .unwrap();

        bus.unsubscribe(id).await.unwrap();
        bus.publish_system_event(SystemEvent::server_stopped())
            .await
            .unwrap();

        let seen = recorder.seen.lock().unwrap().clone();
        assert_eq!(seen, vec!["server_started", "peer_connected"]);
    }

    #[test]
    fn test_event_description() {
        let addr: SocketAddr = "127.0.0.1:50123".parse().unwrap();
        let event = SystemEvent::peer_disconnected(Uuid::new_v4(), addr, 0);
        assert_eq!(event.event_type(), "peer_disconnected");
        assert_eq!(
            event.description(),
            "Engine GUI disconnected: 127.0.0.1:50123"
        );
    }
}
