//! Comment sessions: Engine comments edited as scratch files in the editor

use async_trait::async_trait;
use engine_bridge_core::{Plugin, PluginContext, PluginStatus, Result};
use engine_bridge_server::{CommentDelegate, CommentOpenRequest, PeerRegistry};
use std::sync::Arc;
use tracing::{info, warn};

pub mod manager;
pub mod scratch;

pub use manager::{CommentSession, CommentSessionManager, Delivery, OpenOutcome};
pub use scratch::{scratch_file_name, ScratchStore};

#[async_trait]
impl CommentDelegate for CommentSessionManager {
    async fn open_comment(&self, request: CommentOpenRequest, peers: PeerRegistry) {
        let comment_id = request.comment_id.clone();
        match self.open(request, peers).await {
            Ok(outcome) => info!("Comment {} open: {:?}", comment_id, outcome),
            Err(e) => warn!("Failed to open comment {}: {}", comment_id, e),
        }
    }

    async fn close_all(&self) {
        CommentSessionManager::close_all(self).await;
    }
}

/// Lifecycle wrapper that ends every session on shutdown
pub struct CommentsPlugin {
    manager: Arc<CommentSessionManager>,
    status: PluginStatus,
}

impl CommentsPlugin {
    pub fn new(manager: Arc<CommentSessionManager>) -> Self {
        Self {
            manager,
            status: PluginStatus::Loading,
        }
    }
}

#[async_trait]
impl Plugin for CommentsPlugin {
    fn name(&self) -> &str {
        "comments"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn dependencies(&self) -> Vec<&str> {
        vec!["server"]
    }

    async fn initialize(&mut self, _context: &PluginContext) -> Result<()> {
        info!(
            "Comment scratch files live in {}",
            self.manager.scratch_dir().display()
        );
        self.status = PluginStatus::Active;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down comments plugin");
        self.manager.close_all().await;
        self.status = PluginStatus::Disabled;
        Ok(())
    }

    fn status(&self) -> PluginStatus {
        self.status.clone()
    }
}
