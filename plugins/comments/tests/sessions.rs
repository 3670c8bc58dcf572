mod common;

use common::{open_request, scratch_files, FakeHost};
use engine_bridge_comments::{CommentSessionManager, Delivery, OpenOutcome};
use engine_bridge_core::{BridgeError, Language, NotificationLevel, ScratchKind};
use engine_bridge_server::{Outbound, Peer, PeerRegistry};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn manager_with(host: &Arc<FakeHost>, dir: &TempDir) -> Arc<CommentSessionManager> {
    CommentSessionManager::new(host.clone(), dir.path().join("scratch"), Language::En)
}

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

#[tokio::test]
async fn test_open_writes_file_and_opens_document() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost::new();
    let manager = manager_with(&host, &dir);

    host.answer_kind(Some(ScratchKind::JavaScript));
    let outcome = manager
        .open(open_request("id-12345678", "Sprite 1", "let x = 1;"), PeerRegistry::new())
        .await
        .unwrap();

    let OpenOutcome::Created(path) = outcome else {
        panic!("expected a new session, got {:?}", outcome);
    };
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "cmt_Sprite_1_12345678.js"
    );
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "let x = 1;");
    assert_eq!(*host.opened.lock().unwrap(), vec![path.clone()]);
    assert_eq!(manager.focused().await.as_deref(), Some("id-12345678"));
    assert!(host.affordance_visible());
    assert!(manager.is_following_focus().await);
    assert!(host.has_notification(NotificationLevel::Info, "Sprite 1"));
}

#[tokio::test]
async fn test_second_open_focuses_existing_session() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost::new();
    let manager = manager_with(&host, &dir);

    let first = manager
        .open(open_request("c-1", "Cat", "hello"), PeerRegistry::new())
        .await
        .unwrap();
    let second = manager
        .open(open_request("c-1", "Cat", "different"), PeerRegistry::new())
        .await
        .unwrap();

    let OpenOutcome::Created(path) = first else {
        panic!("expected a new session");
    };
    assert_eq!(second, OpenOutcome::Focused(path.clone()));
    assert_eq!(scratch_files(manager.scratch_dir()).len(), 1);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    assert_eq!(*host.shown.lock().unwrap(), vec![path]);
}

#[tokio::test]
async fn test_open_while_prompt_pending_is_in_progress() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost::new();
    let manager = manager_with(&host, &dir);
    let gate = host.hold_prompts();

    let first = {
        let manager = manager.clone();
        tokio::spawn(async move {
            manager
                .open(open_request("c-2", "Cat", "text"), PeerRegistry::new())
                .await
        })
    };

    // Let the first open claim the id and park on the prompt
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = manager
        .open(open_request("c-2", "Cat", "text"), PeerRegistry::new())
        .await
        .unwrap();
    assert_eq!(second, OpenOutcome::InProgress);

    gate.notify_one();
    let first = first.await.unwrap().unwrap();
    assert!(matches!(first, OpenOutcome::Created(_)));
    assert_eq!(scratch_files(manager.scratch_dir()).len(), 1);
}

#[tokio::test]
async fn test_cancelled_prompt_has_no_side_effects() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost::new();
    let manager = manager_with(&host, &dir);

    host.answer_kind(None);
    let outcome = manager
        .open(open_request("c-3", "Cat", "text"), PeerRegistry::new())
        .await
        .unwrap();

    assert_eq!(outcome, OpenOutcome::Cancelled);
    assert_eq!(manager.session_count().await, 0);
    assert!(scratch_files(manager.scratch_dir()).is_empty());
    assert!(host.opened.lock().unwrap().is_empty());

    // The claim was released, so a retry prompts again
    let retry = manager
        .open(open_request("c-3", "Cat", "text"), PeerRegistry::new())
        .await
        .unwrap();
    assert!(matches!(retry, OpenOutcome::Created(_)));
}

#[tokio::test]
async fn test_cancel_never_removes_existing_session() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost::new();
    let manager = manager_with(&host, &dir);

    manager
        .open(open_request("keep", "Cat", "a"), PeerRegistry::new())
        .await
        .unwrap();
    host.answer_kind(None);
    manager
        .open(open_request("other", "Dog", "b"), PeerRegistry::new())
        .await
        .unwrap();

    assert_eq!(manager.session_count().await, 1);
    assert_eq!(manager.sessions().await[0].comment_id, "keep");
    assert!(manager.is_following_focus().await);
}

#[tokio::test]
async fn test_stale_session_is_recreated() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost::new();
    let manager = manager_with(&host, &dir);

    let OpenOutcome::Created(path) = manager
        .open(open_request("c-4", "Cat", "old"), PeerRegistry::new())
        .await
        .unwrap()
    else {
        panic!("expected a new session");
    };
    std::fs::remove_file(&path).unwrap();

    host.answer_kind(Some(ScratchKind::Markdown));
    let outcome = manager
        .open(open_request("c-4", "Cat", "new"), PeerRegistry::new())
        .await
        .unwrap();

    assert_eq!(outcome, OpenOutcome::Created(path.clone()));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    assert_eq!(manager.session_count().await, 1);
}

#[tokio::test]
async fn test_open_failure_keeps_registry_consistent() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost::new();
    let manager = manager_with(&host, &dir);
    host.fail_open.store(true, Ordering::SeqCst);

    let result = manager
        .open(open_request("c-5", "Cat", "text"), PeerRegistry::new())
        .await;

    assert!(matches!(result, Err(BridgeError::Editor(_))));
    assert_eq!(manager.session_count().await, 0);
    assert!(scratch_files(manager.scratch_dir()).is_empty());
    assert!(host.has_notification(NotificationLevel::Error, "cannot open document"));
}

#[tokio::test]
async fn test_save_relays_to_open_peers_only() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost::new();
    let manager = manager_with(&host, &dir);

    let peers = PeerRegistry::new();
    let (a, mut rx_a) = Peer::new(addr(40001));
    let (b, mut rx_b) = Peer::new(addr(40002));
    let (closing, _rx_closing) = Peer::new(addr(40003));
    peers.insert(a).await;
    peers.insert(b).await;
    peers.insert(closing.clone()).await;
    closing.mark_closing();

    let OpenOutcome::Created(path) = manager
        .open(open_request("c-6", "Cat", "draft"), peers.clone())
        .await
        .unwrap()
    else {
        panic!("expected a new session");
    };
    std::fs::write(&path, "final text").unwrap();

    let delivery = manager.save_and_close("c-6").await.unwrap();
    assert_eq!(delivery, Delivery::Sent(2));

    let expected = json!({"type":"comment","action":"update","commentId":"c-6","content":"final text"});
    for rx in [&mut rx_a, &mut rx_b] {
        let Some(Outbound::Text(text)) = rx.recv().await else {
            panic!("expected a text frame");
        };
        assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), expected);
    }

    assert_eq!(*host.saved.lock().unwrap(), vec![path.clone()]);
    assert_eq!(*host.closed.lock().unwrap(), vec![path.clone()]);
    assert!(!path.exists());
    assert_eq!(manager.session_count().await, 0);
    assert_eq!(manager.focused().await, None);
    assert!(!host.affordance_visible());
    assert!(!manager.is_following_focus().await);
}

#[tokio::test]
async fn test_save_reports_missing_or_closed_peers() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost::new();
    let manager = manager_with(&host, &dir);

    manager
        .open(open_request("lonely", "Cat", "x"), PeerRegistry::new())
        .await
        .unwrap();
    assert_eq!(
        manager.save_and_close("lonely").await.unwrap(),
        Delivery::NoPeers
    );
    assert!(host.has_notification(NotificationLevel::Warning, "No connected Engine GUI clients"));

    let peers = PeerRegistry::new();
    let (gone, rx) = Peer::new(addr(40004));
    peers.insert(gone).await;
    drop(rx);

    manager
        .open(open_request("unheard", "Cat", "x"), peers)
        .await
        .unwrap();
    assert_eq!(
        manager.save_and_close("unheard").await.unwrap(),
        Delivery::NoneOpen
    );
    assert!(host.has_notification(NotificationLevel::Warning, "No available clients"));
}

#[tokio::test]
async fn test_registry_is_read_at_save_time() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost::new();
    let manager = manager_with(&host, &dir);
    let peers = PeerRegistry::new();

    manager
        .open(open_request("late", "Cat", "x"), peers.clone())
        .await
        .unwrap();

    let (joined_later, mut rx) = Peer::new(addr(40005));
    peers.insert(joined_later).await;

    assert_eq!(manager.save_and_close("late").await.unwrap(), Delivery::Sent(1));
    assert!(matches!(rx.recv().await, Some(Outbound::Text(_))));
}

#[tokio::test]
async fn test_save_unknown_session_is_a_warning() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost::new();
    let manager = manager_with(&host, &dir);

    let err = manager.save_and_close("nope").await.unwrap_err();
    assert!(matches!(err, BridgeError::SessionNotFound(_)));
    assert!(err.is_warning());
    assert!(host.has_notification(NotificationLevel::Warning, "Comment editor not found"));
}

#[tokio::test]
async fn test_close_during_prompt_discards_the_open() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost::new();
    let manager = manager_with(&host, &dir);
    let gate = host.hold_prompts();

    let pending = {
        let manager = manager.clone();
        tokio::spawn(async move {
            manager
                .open(open_request("c-7", "Cat", "text"), PeerRegistry::new())
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(manager.session_count().await, 1);

    manager.close_all().await;
    gate.notify_one();

    assert_eq!(pending.await.unwrap().unwrap(), OpenOutcome::Cancelled);
    assert_eq!(manager.session_count().await, 0);
    assert!(scratch_files(manager.scratch_dir()).is_empty());
}

#[tokio::test]
async fn test_focus_follows_active_editor() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost::new();
    let manager = manager_with(&host, &dir);

    let OpenOutcome::Created(first) = manager
        .open(open_request("one", "Cat", "1"), PeerRegistry::new())
        .await
        .unwrap()
    else {
        panic!("expected a new session");
    };
    manager
        .open(open_request("two", "Dog", "2"), PeerRegistry::new())
        .await
        .unwrap();
    assert_eq!(manager.focused().await.as_deref(), Some("two"));

    host.focus_on(Some(first.clone()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(manager.focused().await.as_deref(), Some("one"));
    assert!(host.affordance_visible());

    host.focus_on(Some(dir.path().join("unrelated.js")));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!host.affordance_visible());
    assert_eq!(manager.focused().await.as_deref(), Some("one"));
    assert_eq!(manager.session_count().await, 2);

    host.focus_on(None);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!host.affordance_visible());
}

#[tokio::test]
async fn test_save_target_resolution() {
    let dir = TempDir::new().unwrap();
    let host = FakeHost::new();
    let manager = manager_with(&host, &dir);

    assert_eq!(manager.resolve_save_target(None).await, None);
    assert!(host.has_notification(NotificationLevel::Warning, "No active comment editor"));

    let OpenOutcome::Created(first) = manager
        .open(open_request("one", "Cat", "1"), PeerRegistry::new())
        .await
        .unwrap()
    else {
        panic!("expected a new session");
    };
    assert_eq!(manager.resolve_save_target(None).await.as_deref(), Some("one"));

    manager
        .open(open_request("two", "Dog", "2"), PeerRegistry::new())
        .await
        .unwrap();
    // The focused session wins over the active path
    assert_eq!(
        manager.resolve_save_target(Some(first.as_path())).await.as_deref(),
        Some("two")
    );

    manager
        .open(open_request("three", "Owl", "3"), PeerRegistry::new())
        .await
        .unwrap();
    manager.close("three").await;
    assert_eq!(manager.focused().await, None);

    assert_eq!(
        manager.resolve_save_target(Some(first.as_path())).await.as_deref(),
        Some("one")
    );

    host.answer_pick(Some(1));
    assert_eq!(manager.resolve_save_target(None).await.as_deref(), Some("two"));
    let picks = host.picks.lock().unwrap().clone();
    assert_eq!(picks.len(), 1);
    assert_eq!(picks[0].len(), 2);
    assert_eq!(picks[0][0].description, "Cat");
    assert_eq!(picks[0][1].detail.as_deref(), Some("two"));

    host.answer_pick(None);
    assert_eq!(manager.resolve_save_target(None).await, None);
}
