//! Realtime session hub for Engine GUIs
//!
//! Engine GUIs connect over WebSocket and exchange one JSON object per text
//! frame. The hub answers heartbeats, hands comment-open requests to a
//! [`CommentDelegate`] and pushes extension source on demand.

use async_trait::async_trait;
use engine_bridge_core::{Plugin, PluginContext, PluginStatus, Result};
use std::sync::Arc;
use tracing::{error, info};

pub mod hub;
pub mod peers;
pub mod protocol;

pub use hub::{CommentDelegate, HubStatus, SessionHub, StartOutcome, StopOutcome};
pub use peers::{BroadcastReport, Outbound, Peer, PeerRegistry};
pub use protocol::{CommentOpenRequest, InboundMessage, OutboundMessage};

/// Lifecycle wrapper: optional auto-start, always stopped on shutdown
pub struct ServerPlugin {
    hub: Arc<SessionHub>,
    status: PluginStatus,
}

impl ServerPlugin {
    pub fn new(hub: Arc<SessionHub>) -> Self {
        Self {
            hub,
            status: PluginStatus::Loading,
        }
    }
}

#[async_trait]
impl Plugin for ServerPlugin {
    fn name(&self) -> &str {
        "server"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn initialize(&mut self, context: &PluginContext) -> Result<()> {
        info!("Initializing server plugin");

        if context.config.server.auto_start {
            // A busy port must not abort startup; the user can retry with `start`
            match self.hub.start().await {
                Ok(outcome) => info!("Auto-started debug server: {:?}", outcome),
                Err(e) => {
                    error!("Failed to auto-start debug server: {}", e);
                    self.status = PluginStatus::Error(e.to_string());
                    return Ok(());
                }
            }
        }

        self.status = PluginStatus::Active;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down server plugin");
        self.hub.stop().await?;
        self.status = PluginStatus::Disabled;
        Ok(())
    }

    fn status(&self) -> PluginStatus {
        self.status.clone()
    }
}
