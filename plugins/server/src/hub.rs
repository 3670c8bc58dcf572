//! WebSocket listener that Engine GUIs connect to

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::Response,
    Router,
};
use engine_bridge_core::{BridgeError, EventBus, Result, ServerConfig, SystemEvent};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::peers::{Outbound, Peer, PeerRegistry};
use crate::protocol::{CommentOpenRequest, InboundMessage, OutboundMessage};

/// How long `stop` waits for connection tasks to wind down
const STOP_GRACE: Duration = Duration::from_secs(2);
/// How long a stopping connection may spend flushing its close frame
const CLOSE_FLUSH: Duration = Duration::from_millis(500);

/// Receiver of comment traffic, implemented by the comment session manager
#[async_trait]
pub trait CommentDelegate: Send + Sync {
    /// Start editing a comment; `peers` is the hub's live registry
    async fn open_comment(&self, request: CommentOpenRequest, peers: PeerRegistry);

    /// End every comment session
    async fn close_all(&self);
}

/// Result of [`SessionHub::start`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    AlreadyRunning(SocketAddr),
    Started(SocketAddr),
}

/// Result of [`SessionHub::stop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    NotRunning,
    Stopped { closed_peers: usize },
}

/// Snapshot for status displays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubStatus {
    pub address: Option<SocketAddr>,
    pub peers: usize,
}

struct RunningListener {
    address: SocketAddr,
    handle: JoinHandle<()>,
    /// Flips to true once, when this listener is stopped
    shutdown: watch::Sender<bool>,
}

/// State reachable from connection tasks
struct HubShared {
    peers: PeerRegistry,
    event_bus: Arc<dyn EventBus>,
    delegate: RwLock<Option<Arc<dyn CommentDelegate>>>,
    /// Number of connection tasks still running
    live: watch::Sender<usize>,
}

/// Router state for one listener run
#[derive(Clone)]
struct ListenerState {
    shared: Arc<HubShared>,
    shutdown: watch::Receiver<bool>,
}

/// Keeps the live connection count up to date
struct ConnectionGuard {
    shared: Arc<HubShared>,
}

impl ConnectionGuard {
    fn new(shared: Arc<HubShared>) -> Self {
        shared.live.send_modify(|count| *count += 1);
        Self { shared }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.shared
            .live
            .send_modify(|count| *count = count.saturating_sub(1));
    }
}

/// The realtime hub: one listener, many Engine peers
pub struct SessionHub {
    config: ServerConfig,
    shared: Arc<HubShared>,
    listener: Mutex<Option<RunningListener>>,
}

impl SessionHub {
    pub fn new(config: ServerConfig, event_bus: Arc<dyn EventBus>) -> Self {
        Self {
            config,
            shared: Arc::new(HubShared {
                peers: PeerRegistry::new(),
                event_bus,
                delegate: RwLock::new(None),
                live: watch::channel(0).0,
            }),
            listener: Mutex::new(None),
        }
    }

    /// Route comment traffic to `delegate`
    pub async fn set_comment_delegate(&self, delegate: Arc<dyn CommentDelegate>) {
        *self.shared.delegate.write().await = Some(delegate);
    }

    /// Handle to the live peer registry
    pub fn peers(&self) -> PeerRegistry {
        self.shared.peers.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.listener.lock().await.is_some()
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.lock().await.as_ref().map(|l| l.address)
    }

    pub async fn status(&self) -> HubStatus {
        HubStatus {
            address: self.local_addr().await,
            peers: self.shared.peers.len().await,
        }
    }

    /// Bind the listener and begin accepting Engine connections
    pub async fn start(&self) -> Result<StartOutcome> {
        let mut slot = self.listener.lock().await;
        if let Some(running) = slot.as_ref() {
            return Ok(StartOutcome::AlreadyRunning(running.address));
        }

        let addr = self.config.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| BridgeError::server(format!("Failed to bind to {}: {}", addr, e)))?;
        let address = listener.local_addr()?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let router = Router::new().fallback(ws_handler).with_state(ListenerState {
            shared: self.shared.clone(),
            shutdown: shutdown_rx,
        });

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            {
                error!("Debug server error: {}", e);
            }
        });

        *slot = Some(RunningListener {
            address,
            handle,
            shutdown,
        });
        drop(slot);

        info!("Debug server listening on ws://{}", address);
        self.publish(SystemEvent::server_started(address)).await;

        Ok(StartOutcome::Started(address))
    }

    /// Disconnect every peer, close comment sessions and release the listener
    ///
    /// Connection tasks are ended before comment sessions are closed, so no
    /// frame read after this call can open a new session.
    pub async fn stop(&self) -> Result<StopOutcome> {
        let mut slot = self.listener.lock().await;
        let Some(running) = slot.take() else {
            return Ok(StopOutcome::NotRunning);
        };

        let peers = self.shared.peers.clear().await;
        for peer in &peers {
            peer.close();
        }

        running.shutdown.send_replace(true);
        let mut live = self.shared.live.subscribe();
        let drained = tokio::time::timeout(STOP_GRACE, live.wait_for(|count| *count == 0))
            .await
            .map(|waited| waited.is_ok())
            .unwrap_or(false);
        if !drained {
            warn!(
                "{} connection tasks still running after {:?}",
                *live.borrow(),
                STOP_GRACE
            );
        }

        let delegate = self.shared.delegate.read().await.clone();
        if let Some(delegate) = delegate {
            delegate.close_all().await;
        }

        running.handle.abort();
        // Wait until the aborted task has dropped the listener
        let _ = running.handle.await;
        drop(slot);

        info!(
            "Debug server stopped, disconnected {} connections",
            peers.len()
        );
        self.publish(SystemEvent::server_stopped()).await;

        Ok(StopOutcome::Stopped {
            closed_peers: peers.len(),
        })
    }

    /// Push extension source to every open peer, returning how many got it
    pub async fn broadcast_extension(&self, code: &str) -> Result<usize> {
        let text = OutboundMessage::extension(code).to_json()?;
        let report = self.shared.peers.broadcast(&text).await;
        info!(
            "Sent extension code to {} of {} connections",
            report.delivered, report.known
        );
        Ok(report.delivered)
    }

    async fn publish(&self, event: SystemEvent) {
        self.shared.publish(event).await;
    }
}

impl HubShared {
    async fn publish(&self, event: SystemEvent) {
        if let Err(e) = self.event_bus.publish_system_event(event).await {
            warn!("Failed to publish hub event: {}", e);
        }
    }

    fn handle_text(self: &Arc<Self>, peer: &Peer, text: &str) {
        if !peer.is_open() {
            debug!("Ignoring frame from closing connection {}", peer.address());
            return;
        }

        match serde_json::from_str::<InboundMessage>(text) {
            Ok(InboundMessage::Heartbeat) => match OutboundMessage::heartbeat().to_json() {
                Ok(reply) => {
                    peer.send_text(&reply);
                }
                Err(e) => warn!("Failed to encode heartbeat: {}", e),
            },
            Ok(InboundMessage::Comment(message)) => {
                let action = message.action.clone();
                match message.into_open_request() {
                    Some(request) => self.dispatch_open(peer.clone(), request),
                    None => debug!(
                        "Ignoring comment message with action {:?} from {}",
                        action,
                        peer.address()
                    ),
                }
            }
            Ok(InboundMessage::Unknown) => {
                debug!("Ignoring unknown message type from {}", peer.address());
            }
            Err(e) => {
                debug!("Ignoring malformed message from {}: {}", peer.address(), e);
            }
        }
    }

    /// Runs on its own task so the connection keeps reading while a prompt is up
    fn dispatch_open(self: &Arc<Self>, peer: Peer, request: CommentOpenRequest) {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            if !peer.is_open() {
                debug!(
                    "Dropping open for {} from closed connection {}",
                    request.comment_id,
                    peer.address()
                );
                return;
            }

            let delegate = shared.delegate.read().await.clone();
            match delegate {
                Some(delegate) => {
                    delegate
                        .open_comment(request, shared.peers.clone())
                        .await
                }
                None => warn!(
                    "No comment handler registered, dropping open for {}",
                    request.comment_id
                ),
            }
        });
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(address): ConnectInfo<SocketAddr>,
    State(state): State<ListenerState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, address, state.shared, state.shutdown))
}

async fn handle_socket(
    socket: WebSocket,
    address: SocketAddr,
    shared: Arc<HubShared>,
    mut shutdown: watch::Receiver<bool>,
) {
    let stopped = *shutdown.borrow();
    if stopped {
        debug!("Dropping connection from {}: hub is stopping", address);
        return;
    }
    let _guard = ConnectionGuard::new(shared.clone());

    let (peer, mut outbound) = Peer::new(address);
    let peer_id = peer.id();

    let count = shared.peers.insert(peer.clone()).await;
    info!("Engine GUI connected: {} ({} total)", address, count);
    shared
        .publish(SystemEvent::peer_connected(peer_id, address, count))
        .await;

    let (mut ws_sender, mut ws_receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let (message, last) = match frame {
                Outbound::Text(text) => (Message::Text(text), false),
                Outbound::Close => (
                    Message::Close(Some(CloseFrame {
                        code: close_code::NORMAL,
                        reason: "server stopped".into(),
                    })),
                    true,
                ),
            };

            if ws_sender.send(message).await.is_err() || last {
                break;
            }
        }
    });

    let mut stopping = false;
    loop {
        let msg = tokio::select! {
            biased;
            _ = shutdown.changed() => {
                stopping = true;
                break;
            }
            msg = ws_receiver.next() => msg,
        };

        match msg {
            Some(Ok(Message::Text(text))) => shared.handle_text(&peer, &text),
            Some(Ok(Message::Binary(data))) => {
                debug!("Ignoring {} byte binary frame from {}", data.len(), address);
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
            Some(Ok(Message::Close(_))) | None => break,
            Some(Err(e)) => {
                warn!("WebSocket error from {}: {}", address, e);
                break;
            }
        }
    }

    peer.mark_closing();
    if stopping {
        // Let the writer deliver the close frame queued by `stop`
        if tokio::time::timeout(CLOSE_FLUSH, &mut send_task).await.is_err() {
            send_task.abort();
        }
    } else {
        send_task.abort();
    }

    let (removed, remaining) = shared.peers.remove(peer_id).await;
    if removed.is_some() {
        info!("Engine GUI disconnected: {} ({} left)", address, remaining);
        shared
            .publish(SystemEvent::peer_disconnected(peer_id, address, remaining))
            .await;
    }
}
