//! Terminal implementation of the editor boundary
//!
//! Prompts are answered by the next line typed into the console: the line
//! reader hands each line to [`ConsoleHost::route_line`] first, and only lines
//! nobody is waiting for become commands. Documents are files on disk the
//! user edits with any editor; the "active view" is whatever was last focused
//! with the `focus` command or opened by the bridge.

use async_trait::async_trait;
use engine_bridge_core::{
    BridgeError, DocumentHandle, EditorHost, Language, NotificationLevel, PickItem, Result,
    ScratchKind, Text,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, oneshot, Mutex, RwLock};
use tracing::debug;

pub struct ConsoleHost {
    language: Language,
    default_kind: Option<ScratchKind>,
    pending: Mutex<Option<oneshot::Sender<String>>>,
    /// One prompt on screen at a time
    prompt_turn: Mutex<()>,
    active: RwLock<Option<PathBuf>>,
    affordance: AtomicBool,
    focus: broadcast::Sender<Option<PathBuf>>,
}

impl ConsoleHost {
    pub fn new(language: Language, default_kind: Option<ScratchKind>) -> Self {
        let (focus, _) = broadcast::channel(32);
        Self {
            language,
            default_kind,
            pending: Mutex::new(None),
            prompt_turn: Mutex::new(()),
            active: RwLock::new(None),
            affordance: AtomicBool::new(false),
            focus,
        }
    }

    /// Give a console line to the waiting prompt, or hand it back as a command
    pub async fn route_line(&self, line: String) -> Option<String> {
        let waiting = self.pending.lock().await.take();
        match waiting {
            Some(prompt) => prompt.send(line).err(),
            None => Some(line),
        }
    }

    #[cfg(test)]
    pub async fn has_pending_prompt(&self) -> bool {
        self.pending.lock().await.is_some()
    }

    /// Dismiss the prompt on screen, if any
    pub async fn cancel_prompt(&self) {
        self.pending.lock().await.take();
    }

    /// Make `path` the active view and tell focus followers
    pub async fn focus(&self, path: Option<PathBuf>) {
        *self.active.write().await = path.clone();
        let _ = self.focus.send(path);
    }

    pub async fn active_view(&self) -> Option<PathBuf> {
        self.active.read().await.clone()
    }

    /// Free-form question; `None` when the answer is empty
    pub async fn ask_text(&self, question: &str) -> Option<String> {
        self.ask(question, &[]).await
    }

    async fn ask(&self, question: &str, options: &[String]) -> Option<String> {
        let _turn = self.prompt_turn.lock().await;
        let (sender, receiver) = oneshot::channel();
        *self.pending.lock().await = Some(sender);

        println!("❓ {}", question);
        for (index, option) in options.iter().enumerate() {
            println!("   {}) {}", index + 1, option);
        }

        let answer = receiver.await.ok()?;
        let answer = answer.trim();
        if answer.is_empty() {
            None
        } else {
            Some(answer.to_string())
        }
    }
}

/// 1-based menu choice
fn choice_index(answer: &str, count: usize) -> Option<usize> {
    match answer.parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Some(n - 1),
        _ => None,
    }
}

#[async_trait]
impl EditorHost for ConsoleHost {
    async fn pick_scratch_kind(&self, target_name: &str) -> Option<ScratchKind> {
        if let Some(kind) = self.default_kind {
            return Some(kind);
        }

        let options: Vec<String> = ScratchKind::ALL
            .iter()
            .map(|kind| kind.label(self.language).to_string())
            .collect();
        let question = self
            .language
            .format(Text::SelectScratchKind, &[("target", target_name)]);
        let answer = self.ask(&question, &options).await?;

        choice_index(&answer, ScratchKind::ALL.len())
            .map(|index| ScratchKind::ALL[index])
            .or_else(|| answer.parse().ok())
    }

    async fn pick_item(&self, placeholder: &str, items: &[PickItem]) -> Option<usize> {
        let options: Vec<String> = items
            .iter()
            .map(|item| {
                if item.description.is_empty() {
                    item.label.clone()
                } else {
                    format!("{}  ({})", item.label, item.description)
                }
            })
            .collect();
        let answer = self.ask(placeholder, &options).await?;

        choice_index(&answer, items.len())
            .or_else(|| items.iter().position(|item| item.label == answer))
    }

    async fn confirm(&self, message: &str, accept_label: &str) -> bool {
        let question = format!(
            "{} [{}/{}]",
            message,
            accept_label,
            self.language.text(Text::No)
        );
        match self.ask(&question, &[]).await {
            Some(answer) => {
                answer.eq_ignore_ascii_case(accept_label)
                    || answer.eq_ignore_ascii_case("y")
                    || answer.eq_ignore_ascii_case("yes")
            }
            None => false,
        }
    }

    async fn open_document(&self, path: &Path) -> Result<DocumentHandle> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(BridgeError::editor(format!(
                "Cannot open {}: file does not exist",
                path.display()
            )));
        }

        println!("📝 Editing {}", path.display());
        *self.active.write().await = Some(path.to_path_buf());
        Ok(DocumentHandle::new(path.to_path_buf()))
    }

    async fn show_document(&self, path: &Path) -> Result<()> {
        println!("📝 Editing {}", path.display());
        *self.active.write().await = Some(path.to_path_buf());
        Ok(())
    }

    async fn save_document(&self, document: &DocumentHandle) -> Result<()> {
        // Edits are made directly on disk; nothing is buffered here
        if tokio::fs::try_exists(&document.path).await.unwrap_or(false) {
            Ok(())
        } else {
            Err(BridgeError::editor(format!(
                "{} no longer exists",
                document.path.display()
            )))
        }
    }

    async fn close_document(&self, document: &DocumentHandle) -> Result<()> {
        let mut active = self.active.write().await;
        if active.as_deref() == Some(document.path.as_path()) {
            *active = None;
        }
        debug!("Closed document {}", document.path.display());
        Ok(())
    }

    fn set_save_affordance(&self, visible: bool) {
        let was_visible = self.affordance.swap(visible, Ordering::SeqCst);
        if visible && !was_visible {
            println!("💾 Type `save` to send the comment back to the Engine");
        }
    }

    fn notify(&self, level: NotificationLevel, message: &str) {
        match level {
            NotificationLevel::Info => println!("ℹ️  {}", message),
            NotificationLevel::Warning => println!("⚠️  {}", message),
            NotificationLevel::Error => eprintln!("❌ {}", message),
        }
    }

    fn active_editor_changes(&self) -> broadcast::Receiver<Option<PathBuf>> {
        self.focus.subscribe()
    }
}
