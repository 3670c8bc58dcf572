//! Boundary to the hosting editor
//!
//! Window, document and prompt primitives belong to whatever editor embeds the
//! bridge. The comment and command layers only talk to it through
//! [`EditorHost`], so they can run against a console, a real editor, or a test
//! double.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::{BridgeError, Result};
use crate::i18n::{Language, Text};

/// Kind of scratch file a comment is edited in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScratchKind {
    #[serde(rename = "md")]
    Markdown,
    #[serde(rename = "js")]
    JavaScript,
}

impl ScratchKind {
    /// Every kind, in prompt order
    pub const ALL: [ScratchKind; 2] = [ScratchKind::Markdown, ScratchKind::JavaScript];

    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            ScratchKind::Markdown => "md",
            ScratchKind::JavaScript => "js",
        }
    }

    /// Prompt label
    pub fn label(&self, language: Language) -> &'static str {
        match self {
            ScratchKind::Markdown => language.text(Text::ScratchKindMarkdown),
            ScratchKind::JavaScript => language.text(Text::ScratchKindJavaScript),
        }
    }
}

impl fmt::Display for ScratchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ScratchKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "md" | "markdown" => Ok(ScratchKind::Markdown),
            "js" | "javascript" => Ok(ScratchKind::JavaScript),
            other => Err(BridgeError::config(format!("Unknown scratch kind: {}", other))),
        }
    }
}

/// Severity of a user-facing notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// An open editor document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHandle {
    pub id: Uuid,
    pub path: PathBuf,
}

impl DocumentHandle {
    pub fn new(path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            path,
        }
    }
}

/// One entry of a quick-pick style menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickItem {
    pub label: String,
    pub description: String,
    pub detail: Option<String>,
}

impl PickItem {
    pub fn new(label: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: description.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Editor primitives the bridge depends on
#[async_trait]
pub trait EditorHost: Send + Sync {
    /// Ask which scratch kind a comment should be edited as; `None` means cancelled
    async fn pick_scratch_kind(&self, target_name: &str) -> Option<ScratchKind>;

    /// Show a menu and return the chosen index; `None` means cancelled
    async fn pick_item(&self, placeholder: &str, items: &[PickItem]) -> Option<usize>;

    /// Ask a yes/no question
    async fn confirm(&self, message: &str, accept_label: &str) -> bool;

    /// Open a file as an editable document and make it the active view
    async fn open_document(&self, path: &Path) -> Result<DocumentHandle>;

    /// Bring an already open file to the foreground
    async fn show_document(&self, path: &Path) -> Result<()>;

    /// Persist unsaved edits of a document to disk
    async fn save_document(&self, document: &DocumentHandle) -> Result<()>;

    /// Close the editor view of a document
    async fn close_document(&self, document: &DocumentHandle) -> Result<()>;

    /// Show or hide the "save comment" action
    fn set_save_affordance(&self, visible: bool);

    /// Report something to the user
    fn notify(&self, level: NotificationLevel, message: &str);

    /// Stream of active view changes; `None` when no editor is active
    fn active_editor_changes(&self) -> broadcast::Receiver<Option<PathBuf>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_kind_parsing() {
        assert_eq!("md".parse::<ScratchKind>().unwrap(), ScratchKind::Markdown);
        assert_eq!(
            "JavaScript".parse::<ScratchKind>().unwrap(),
            ScratchKind::JavaScript
        );
        assert!("txt".parse::<ScratchKind>().is_err());
    }

    #[test]
    fn test_scratch_kind_serde() {
        let json = serde_json::to_string(&ScratchKind::JavaScript).unwrap();
        assert_eq!(json, "\"js\"");
        let kind: ScratchKind = serde_json::from_str("\"md\"").unwrap();
        assert_eq!(kind, ScratchKind::Markdown);
    }

    #[test]
    fn test_pick_item_builder() {
        let item = PickItem::new("cmt_Sprite1_abc.md", "abc").with_detail("/tmp/cmt_Sprite1_abc.md");
        assert_eq!(item.detail.as_deref(), Some("/tmp/cmt_Sprite1_abc.md"));
    }
}
