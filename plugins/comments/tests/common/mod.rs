#![allow(dead_code)]

use async_trait::async_trait;
use engine_bridge_core::{
    BridgeError, DocumentHandle, EditorHost, NotificationLevel, PickItem, Result, ScratchKind,
};
use engine_bridge_server::CommentOpenRequest;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, Notify};

/// Editor double that answers prompts from a script and records every call
pub struct FakeHost {
    kind_answers: Mutex<VecDeque<Option<ScratchKind>>>,
    pick_answer: Mutex<Option<usize>>,
    prompt_gate: Mutex<Option<Arc<Notify>>>,
    pub fail_open: AtomicBool,
    pub affordance: AtomicBool,
    pub notifications: Mutex<Vec<(NotificationLevel, String)>>,
    pub opened: Mutex<Vec<PathBuf>>,
    pub shown: Mutex<Vec<PathBuf>>,
    pub saved: Mutex<Vec<PathBuf>>,
    pub closed: Mutex<Vec<PathBuf>>,
    pub picks: Mutex<Vec<Vec<PickItem>>>,
    focus: broadcast::Sender<Option<PathBuf>>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        let (focus, _) = broadcast::channel(16);
        Arc::new(Self {
            kind_answers: Mutex::new(VecDeque::new()),
            pick_answer: Mutex::new(None),
            prompt_gate: Mutex::new(None),
            fail_open: AtomicBool::new(false),
            affordance: AtomicBool::new(false),
            notifications: Mutex::new(Vec::new()),
            opened: Mutex::new(Vec::new()),
            shown: Mutex::new(Vec::new()),
            saved: Mutex::new(Vec::new()),
            closed: Mutex::new(Vec::new()),
            picks: Mutex::new(Vec::new()),
            focus,
        })
    }

    /// Queue the next answer to the file-type prompt; unscripted prompts pick Markdown
    pub fn answer_kind(&self, answer: Option<ScratchKind>) {
        self.kind_answers.lock().unwrap().push_back(answer);
    }

    pub fn answer_pick(&self, answer: Option<usize>) {
        *self.pick_answer.lock().unwrap() = answer;
    }

    /// Make file-type prompts wait until the returned gate is notified
    pub fn hold_prompts(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.prompt_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn focus_on(&self, path: Option<PathBuf>) {
        let _ = self.focus.send(path);
    }

    pub fn affordance_visible(&self) -> bool {
        self.affordance.load(Ordering::SeqCst)
    }

    pub fn has_notification(&self, level: NotificationLevel, text: &str) -> bool {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .any(|(l, message)| *l == level && message.contains(text))
    }
}

#[async_trait]
impl EditorHost for FakeHost {
    async fn pick_scratch_kind(&self, _target_name: &str) -> Option<ScratchKind> {
        let gate = self.prompt_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.kind_answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Some(ScratchKind::Markdown))
    }

    async fn pick_item(&self, _placeholder: &str, items: &[PickItem]) -> Option<usize> {
        self.picks.lock().unwrap().push(items.to_vec());
        *self.pick_answer.lock().unwrap()
    }

    async fn confirm(&self, _message: &str, _accept_label: &str) -> bool {
        true
    }

    async fn open_document(&self, path: &Path) -> Result<DocumentHandle> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(BridgeError::editor("cannot open document"));
        }
        self.opened.lock().unwrap().push(path.to_path_buf());
        Ok(DocumentHandle::new(path.to_path_buf()))
    }

    async fn show_document(&self, path: &Path) -> Result<()> {
        self.shown.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    async fn save_document(&self, document: &DocumentHandle) -> Result<()> {
        self.saved.lock().unwrap().push(document.path.clone());
        Ok(())
    }

    async fn close_document(&self, document: &DocumentHandle) -> Result<()> {
        self.closed.lock().unwrap().push(document.path.clone());
        Ok(())
    }

    fn set_save_affordance(&self, visible: bool) {
        self.affordance.store(visible, Ordering::SeqCst);
    }

    fn notify(&self, level: NotificationLevel, message: &str) {
        self.notifications
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }

    fn active_editor_changes(&self) -> broadcast::Receiver<Option<PathBuf>> {
        self.focus.subscribe()
    }
}

pub fn open_request(comment_id: &str, target_name: &str, content: &str) -> CommentOpenRequest {
    CommentOpenRequest {
        comment_id: comment_id.to_string(),
        content: content.to_string(),
        target_id: None,
        target_name: Some(target_name.to_string()),
        timestamp: None,
    }
}

pub fn scratch_files(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}
