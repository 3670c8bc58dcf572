//! Connection status line printed on hub lifecycle events

use async_trait::async_trait;
use engine_bridge_core::{Language, Result, SystemEvent, SystemEventHandler, Text};
use tracing::info;

pub struct StatusLine {
    language: Language,
}

impl StatusLine {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    /// `Engine: N connections` while listening, `Engine: not started` otherwise
    pub fn render(&self, event: &SystemEvent) -> String {
        let count = match event {
            SystemEvent::ServerStopped => {
                return self.language.text(Text::StatusStopped).to_string()
            }
            SystemEvent::ServerStarted { .. } => 0,
            SystemEvent::PeerConnected { peer_count, .. }
            | SystemEvent::PeerDisconnected { peer_count, .. } => *peer_count,
        };
        self.language
            .format(Text::StatusRunning, &[("count", count.to_string().as_str())])
    }
}

#[async_trait]
impl SystemEventHandler for StatusLine {
    async fn handle_system_event(&self, event: &SystemEvent) -> Result<()> {
        info!("{}", event.description());
        println!("📡 [{}]", self.render(event));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use uuid::Uuid;

    fn addr() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 50000))
    }

    #[test]
    fn test_status_text() {
        let status = StatusLine::new(Language::En);
        assert_eq!(
            status.render(&SystemEvent::server_started(addr())),
            "Engine: 0 connections"
        );
        assert_eq!(
            status.render(&SystemEvent::server_stopped()),
            "Engine: not started"
        );
    }

    #[test]
    fn test_status_follows_peer_count() {
        let status = StatusLine::new(Language::ZhCn);
        assert_eq!(
            status.render(&SystemEvent::peer_connected(Uuid::new_v4(), addr(), 2)),
            "Engine: 2 连接"
        );
        assert_eq!(
            status.render(&SystemEvent::peer_disconnected(Uuid::new_v4(), addr(), 1)),
            "Engine: 1 连接"
        );
    }
}
