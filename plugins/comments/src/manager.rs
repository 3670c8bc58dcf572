//! Comment editing sessions
//!
//! A session starts when an Engine GUI asks to open a comment: the text is
//! written to a scratch file and opened in the editor. Saving reads the file
//! back, relays it to the Engine peers and ends the session. At most one
//! session exists per comment id, and the manager tracks which session's file
//! is the active editor view.

use engine_bridge_core::{
    BridgeError, DocumentHandle, EditorHost, Language, NotificationLevel, PickItem, Result,
    ScratchKind, Text,
};
use engine_bridge_server::{CommentOpenRequest, OutboundMessage, PeerRegistry};
use futures_util::future::join_all;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::scratch::ScratchStore;

/// Result of [`CommentSessionManager::open`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// A session already existed; its file was brought to the foreground
    Focused(PathBuf),
    /// Another open for the same id is still waiting on the user
    InProgress,
    /// The user dismissed the file-type prompt
    Cancelled,
    /// A new scratch file was written and opened
    Created(PathBuf),
}

/// Result of relaying a saved comment to the Engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent(usize),
    /// Peers are registered but none of them is open
    NoneOpen,
    /// No peers at all
    NoPeers,
}

/// One comment being edited
#[derive(Debug, Clone)]
pub struct CommentSession {
    pub comment_id: String,
    pub path: PathBuf,
    pub kind: ScratchKind,
    pub target_name: String,
    pub document: Option<DocumentHandle>,
    peers: PeerRegistry,
}

impl CommentSession {
    /// Registry handle supplied when the session was opened
    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }
}

enum SessionSlot {
    /// Claimed by an open that is waiting for the file-type prompt
    Pending,
    Active(CommentSession),
}

#[derive(Default)]
struct ManagerState {
    sessions: IndexMap<String, SessionSlot>,
    focused: Option<String>,
    focus_task: Option<JoinHandle<()>>,
}

enum Claim {
    Existing(PathBuf),
    Claimed,
    InProgress,
}

/// Owner of every comment session, the focused pointer and the scratch files
pub struct CommentSessionManager {
    host: Arc<dyn EditorHost>,
    store: ScratchStore,
    language: Language,
    state: Mutex<ManagerState>,
    this: Weak<CommentSessionManager>,
}

impl CommentSessionManager {
    pub fn new(host: Arc<dyn EditorHost>, scratch_dir: PathBuf, language: Language) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            host,
            store: ScratchStore::new(scratch_dir),
            language,
            state: Mutex::new(ManagerState::default()),
            this: this.clone(),
        })
    }

    pub fn scratch_dir(&self) -> &Path {
        self.store.dir()
    }

    /// Start editing a comment, or focus the session already editing it
    pub async fn open(
        &self,
        request: CommentOpenRequest,
        peers: PeerRegistry,
    ) -> Result<OpenOutcome> {
        let comment_id = request.comment_id.clone();
        info!(
            "Open request for comment {} ({})",
            comment_id,
            request.target_name.as_deref().unwrap_or("-")
        );

        match self.claim(&comment_id).await {
            Claim::InProgress => {
                debug!("Open for comment {} already in progress", comment_id);
                return Ok(OpenOutcome::InProgress);
            }
            Claim::Existing(path) => {
                if self.store.exists(&path).await {
                    match self.host.show_document(&path).await {
                        Ok(()) => {
                            self.state.lock().await.focused = Some(comment_id);
                            self.host.set_save_affordance(true);
                            return Ok(OpenOutcome::Focused(path));
                        }
                        Err(e) => warn!("Existing comment editor unusable: {}", e),
                    }
                }

                debug!("Dropping stale session for comment {}", comment_id);
                if !matches!(
                    self.reclaim_stale(&comment_id, &path).await,
                    Claim::Claimed
                ) {
                    return Ok(OpenOutcome::InProgress);
                }
            }
            Claim::Claimed => {}
        }

        let target_display = request
            .target_name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.language.text(Text::UnnamedTarget).to_string());

        let Some(kind) = self.host.pick_scratch_kind(&target_display).await else {
            debug!("File type selection cancelled for comment {}", comment_id);
            self.release_claim(&comment_id).await;
            return Ok(OpenOutcome::Cancelled);
        };

        match self
            .create_session(&request, kind, target_display.clone(), peers)
            .await
        {
            Ok(Some(path)) => {
                self.host.set_save_affordance(true);
                self.ensure_focus_subscription().await;
                self.host.notify(
                    NotificationLevel::Info,
                    &self
                        .language
                        .format(Text::CommentEditorOpened, &[("target", target_display.as_str())]),
                );
                Ok(OpenOutcome::Created(path))
            }
            Ok(None) => Ok(OpenOutcome::Cancelled),
            Err(e) => {
                self.release_claim(&comment_id).await;
                self.host.notify(
                    NotificationLevel::Error,
                    &format!("Failed to open comment editor: {}", e),
                );
                Err(e)
            }
        }
    }

    /// Write, open and record; `None` when the claim vanished meanwhile
    async fn create_session(
        &self,
        request: &CommentOpenRequest,
        kind: ScratchKind,
        target_name: String,
        peers: PeerRegistry,
    ) -> Result<Option<PathBuf>> {
        let path = self
            .store
            .write(
                &request.comment_id,
                request.target_name.as_deref(),
                kind,
                &request.content,
            )
            .await?;

        let document = match self.host.open_document(&path).await {
            Ok(document) => document,
            Err(e) => {
                let _ = self.store.remove(&path).await;
                return Err(e);
            }
        };

        let mut state = self.state.lock().await;
        if !matches!(
            state.sessions.get(&request.comment_id),
            Some(SessionSlot::Pending)
        ) {
            // Closed while the prompt was up, e.g. the server stopped
            drop(state);
            debug!(
                "Comment {} was closed before its editor opened",
                request.comment_id
            );
            let _ = self.host.close_document(&document).await;
            let _ = self.store.remove(&path).await;
            return Ok(None);
        }

        state.sessions.insert(
            request.comment_id.clone(),
            SessionSlot::Active(CommentSession {
                comment_id: request.comment_id.clone(),
                path: path.clone(),
                kind,
                target_name,
                document: Some(document),
                peers,
            }),
        );
        state.focused = Some(request.comment_id.clone());

        info!(
            "Comment {} is being edited in {}",
            request.comment_id,
            path.display()
        );
        Ok(Some(path))
    }

    async fn claim(&self, comment_id: &str) -> Claim {
        let mut state = self.state.lock().await;
        match state.sessions.get(comment_id) {
            Some(SessionSlot::Pending) => Claim::InProgress,
            Some(SessionSlot::Active(session)) => Claim::Existing(session.path.clone()),
            None => {
                state
                    .sessions
                    .insert(comment_id.to_string(), SessionSlot::Pending);
                Claim::Claimed
            }
        }
    }

    /// Swap a stale record for a fresh claim
    async fn reclaim_stale(&self, comment_id: &str, stale_path: &Path) -> Claim {
        let mut state = self.state.lock().await;
        match state.sessions.get(comment_id) {
            Some(SessionSlot::Pending) => Claim::InProgress,
            Some(SessionSlot::Active(session)) if session.path != stale_path => {
                Claim::Existing(session.path.clone())
            }
            _ => {
                state
                    .sessions
                    .insert(comment_id.to_string(), SessionSlot::Pending);
                if state.focused.as_deref() == Some(comment_id) {
                    state.focused = None;
                }
                Claim::Claimed
            }
        }
    }

    async fn release_claim(&self, comment_id: &str) {
        let mut state = self.state.lock().await;
        if let Some(SessionSlot::Pending) = state.sessions.get(comment_id) {
            state.sessions.shift_remove(comment_id);
        }
        let empty = state.sessions.is_empty();
        drop(state);

        if empty {
            self.teardown().await;
        }
    }

    /// Save the scratch file, relay it to the Engine and end the session
    pub async fn save_and_close(&self, comment_id: &str) -> Result<Delivery> {
        let session = self.active_session(comment_id).await;
        let Some(session) = session else {
            self.host.notify(
                NotificationLevel::Warning,
                self.language.text(Text::CommentEditorNotFound),
            );
            return Err(BridgeError::SessionNotFound(comment_id.to_string()));
        };

        match self.relay(&session).await {
            Ok(delivery) => {
                let (level, key) = match delivery {
                    Delivery::Sent(_) => (NotificationLevel::Info, Text::CommentUpdated),
                    Delivery::NoneOpen => (NotificationLevel::Warning, Text::NoClientsToUpdate),
                    Delivery::NoPeers => (NotificationLevel::Warning, Text::NoClients),
                };
                self.host.notify(level, self.language.text(key));
                self.close(comment_id).await;
                Ok(delivery)
            }
            Err(e) => {
                self.host.notify(
                    NotificationLevel::Error,
                    &self
                        .language
                        .format(Text::SaveCommentError, &[("error", e.to_string().as_str())]),
                );
                Err(e)
            }
        }
    }

    async fn relay(&self, session: &CommentSession) -> Result<Delivery> {
        if let Some(document) = &session.document {
            self.host.save_document(document).await?;
        }

        let content = self.store.read(&session.path).await?;
        let text = OutboundMessage::comment_update(&session.comment_id, content).to_json()?;
        let report = session.peers.broadcast(&text).await;

        info!(
            "Relayed comment {} to {} of {} peers",
            session.comment_id, report.delivered, report.known
        );

        Ok(if report.known == 0 {
            Delivery::NoPeers
        } else if report.delivered == 0 {
            Delivery::NoneOpen
        } else {
            Delivery::Sent(report.delivered)
        })
    }

    /// End a session: close its editor, delete its file, forget it
    ///
    /// Returns `false` when nothing was tracked for `comment_id`.
    pub async fn close(&self, comment_id: &str) -> bool {
        let session = {
            let state = self.state.lock().await;
            match state.sessions.get(comment_id) {
                None => return false,
                Some(SessionSlot::Pending) => None,
                Some(SessionSlot::Active(session)) => Some(session.clone()),
            }
        };

        if let Some(session) = &session {
            if let Some(document) = &session.document {
                if let Err(e) = self.host.close_document(document).await {
                    warn!("Failed to close editor for comment {}: {}", comment_id, e);
                }
            }
            if let Err(e) = self.store.remove(&session.path).await {
                warn!("{}", e);
                self.host.notify(NotificationLevel::Error, &e.to_string());
            }
        }

        let mut state = self.state.lock().await;
        state.sessions.shift_remove(comment_id);
        let was_focused = state.focused.as_deref() == Some(comment_id);
        if was_focused {
            state.focused = None;
        }
        let empty = state.sessions.is_empty();
        drop(state);

        if was_focused {
            self.host.set_save_affordance(false);
        }
        if empty {
            self.teardown().await;
        }

        debug!("Closed comment session {}", comment_id);
        true
    }

    /// Close every session concurrently, then tear down once
    pub async fn close_all(&self) {
        let ids: Vec<String> = self.state.lock().await.sessions.keys().cloned().collect();
        if !ids.is_empty() {
            info!("Closing {} comment sessions", ids.len());
        }

        join_all(ids.iter().map(|id| self.close(id))).await;
        self.teardown().await;
    }

    /// Hide the affordance and stop following editor focus
    async fn teardown(&self) {
        let task = {
            let mut state = self.state.lock().await;
            state.focused = None;
            state.focus_task.take()
        };
        if let Some(task) = task {
            task.abort();
        }
        self.host.set_save_affordance(false);
    }

    async fn ensure_focus_subscription(&self) {
        let mut state = self.state.lock().await;
        if state
            .focus_task
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
        {
            return;
        }

        let mut changes = self.host.active_editor_changes();
        let manager = self.this.clone();
        state.focus_task = Some(tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(path) => {
                        let Some(manager) = manager.upgrade() else {
                            break;
                        };
                        manager.handle_active_editor_change(path.as_deref()).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Skipped {} editor focus changes", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
    }

    /// Follow the active editor: a session file gains focus, anything else hides the affordance
    pub async fn handle_active_editor_change(&self, active: Option<&Path>) {
        let mut state = self.state.lock().await;
        let matched = active.and_then(|path| {
            state.sessions.iter().find_map(|(id, slot)| match slot {
                SessionSlot::Active(session) if session.path == path => Some(id.clone()),
                _ => None,
            })
        });

        let visible = matched.is_some();
        if let Some(id) = matched {
            debug!("Comment {} gained focus", id);
            state.focused = Some(id);
        }
        drop(state);

        self.host.set_save_affordance(visible);
    }

    /// Pick the session a bare "save" refers to
    ///
    /// Focused session first, then the one whose file is `active`, then the
    /// only session, then a menu. `None` after a warning when nothing fits.
    pub async fn resolve_save_target(&self, active: Option<&Path>) -> Option<String> {
        let (focused, by_path, sessions) = {
            let state = self.state.lock().await;
            let active_ids: Vec<(String, CommentSession)> = state
                .sessions
                .iter()
                .filter_map(|(id, slot)| match slot {
                    SessionSlot::Active(session) => Some((id.clone(), session.clone())),
                    SessionSlot::Pending => None,
                })
                .collect();
            let focused = state
                .focused
                .clone()
                .filter(|id| active_ids.iter().any(|(active_id, _)| active_id == id));
            let by_path = active.and_then(|path| {
                active_ids
                    .iter()
                    .find(|(_, session)| session.path == path)
                    .map(|(id, _)| id.clone())
            });
            (focused, by_path, active_ids)
        };

        if let Some(id) = focused.or(by_path) {
            return Some(id);
        }

        match sessions.len() {
            0 => {
                self.host.notify(
                    NotificationLevel::Warning,
                    self.language.text(Text::NoActiveCommentEditor),
                );
                None
            }
            1 => sessions.into_iter().next().map(|(id, _)| id),
            _ => {
                let items: Vec<PickItem> = sessions
                    .iter()
                    .map(|(id, session)| {
                        let file_name = session
                            .path
                            .file_name()
                            .map(|name| name.to_string_lossy().into_owned())
                            .unwrap_or_default();
                        PickItem::new(file_name, session.target_name.clone())
                            .with_detail(id.clone())
                    })
                    .collect();

                let choice = self
                    .host
                    .pick_item(self.language.text(Text::SelectCommentToSave), &items)
                    .await?;
                sessions.into_iter().nth(choice).map(|(id, _)| id)
            }
        }
    }

    async fn active_session(&self, comment_id: &str) -> Option<CommentSession> {
        match self.state.lock().await.sessions.get(comment_id) {
            Some(SessionSlot::Active(session)) => Some(session.clone()),
            _ => None,
        }
    }

    /// Snapshot of the active sessions in open order
    pub async fn sessions(&self) -> Vec<CommentSession> {
        self.state
            .lock()
            .await
            .sessions
            .values()
            .filter_map(|slot| match slot {
                SessionSlot::Active(session) => Some(session.clone()),
                SessionSlot::Pending => None,
            })
            .collect()
    }

    /// Tracked ids, including opens still waiting on the prompt
    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    pub async fn focused(&self) -> Option<String> {
        self.state.lock().await.focused.clone()
    }

    pub async fn is_following_focus(&self) -> bool {
        self.state
            .lock()
            .await
            .focus_task
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }
}
