mod common;

use common::{scratch_files, FakeHost};
use engine_bridge_comments::CommentSessionManager;
use engine_bridge_core::{InMemoryEventBus, Language, ServerConfig};
use engine_bridge_server::{SessionHub, StartOutcome, StopOutcome};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_tungstenite::{connect_async, tungstenite::Message};

async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..300 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never held");
}

#[tokio::test]
async fn test_stop_ends_comment_sessions_and_disconnects_guis() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost::new();
    let manager = CommentSessionManager::new(host.clone(), dir.path().join("scratch"), Language::En);

    let hub = SessionHub::new(
        ServerConfig {
            hostname: "127.0.0.1".to_string(),
            port: 0,
            auto_start: false,
        },
        Arc::new(InMemoryEventBus::new()),
    );
    hub.set_comment_delegate(manager.clone()).await;

    let StartOutcome::Started(addr) = hub.start().await.unwrap() else {
        panic!("hub should start");
    };

    let mut clients = Vec::new();
    for (id, target) in [("comment-aaaa1111", "Cat"), ("comment-bbbb2222", "Dog")] {
        let (mut client, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        let open = json!({
            "type": "comment",
            "action": "open",
            "commentId": id,
            "content": format!("notes for {}", target),
            "targetName": target,
        });
        client.send(Message::Text(open.to_string())).await.unwrap();
        clients.push(client);
    }

    wait_until(|| {
        let manager = manager.clone();
        async move { manager.sessions().await.len() == 2 }
    })
    .await;
    assert_eq!(scratch_files(manager.scratch_dir()).len(), 2);
    assert_eq!(hub.peers().len().await, 2);

    let outcome = hub.stop().await.unwrap();
    assert_eq!(outcome, StopOutcome::Stopped { closed_peers: 2 });

    assert_eq!(manager.session_count().await, 0);
    assert!(scratch_files(manager.scratch_dir()).is_empty());
    assert_eq!(hub.peers().len().await, 0);
    assert!(!hub.is_running().await);
    assert!(!host.affordance_visible());
    assert!(!manager.is_following_focus().await);
    assert_eq!(host.closed.lock().unwrap().len(), 2);

    for mut client in clients {
        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(frame) = client.next().await {
                match frame {
                    Ok(Message::Close(_)) | Err(_) => return true,
                    Ok(_) => continue,
                }
            }
            true
        })
        .await
        .unwrap_or(false);
        assert!(closed, "client should see the connection end");
    }
}

#[tokio::test]
async fn test_open_sent_after_stop_creates_no_session() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost::new();
    let manager = CommentSessionManager::new(host.clone(), dir.path().join("scratch"), Language::En);

    let hub = SessionHub::new(
        ServerConfig {
            hostname: "127.0.0.1".to_string(),
            port: 0,
            auto_start: false,
        },
        Arc::new(InMemoryEventBus::new()),
    );
    hub.set_comment_delegate(manager.clone()).await;

    let StartOutcome::Started(addr) = hub.start().await.unwrap() else {
        panic!("hub should start");
    };
    let (mut client, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    wait_until(|| {
        let peers = hub.peers();
        async move { peers.len().await == 1 }
    })
    .await;

    assert_eq!(
        hub.stop().await.unwrap(),
        StopOutcome::Stopped { closed_peers: 1 }
    );

    let late_open = json!({
        "type": "comment",
        "action": "open",
        "commentId": "late-1",
        "content": "too late",
        "targetName": "Cat",
    });
    // The socket may already be gone; either way nothing may be opened
    let _ = client.send(Message::Text(late_open.to_string())).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(manager.session_count().await, 0);
    assert!(scratch_files(manager.scratch_dir()).is_empty());
    assert!(host.opened.lock().unwrap().is_empty());
}
