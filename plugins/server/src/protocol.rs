//! JSON messages exchanged with Engine GUIs, one object per text frame

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Messages an Engine GUI may send
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundMessage {
    Heartbeat,
    Comment(CommentMessage),
    #[serde(other)]
    Unknown,
}

/// Body of a `{"type":"comment"}` frame
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentMessage {
    pub action: String,
    #[serde(default)]
    pub comment_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub target_name: Option<String>,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

impl CommentMessage {
    /// Only `open` with a comment id starts a session
    pub fn into_open_request(self) -> Option<CommentOpenRequest> {
        if self.action != "open" {
            return None;
        }

        Some(CommentOpenRequest {
            comment_id: self.comment_id.filter(|id| !id.is_empty())?,
            content: self.content.unwrap_or_default(),
            target_id: self.target_id,
            target_name: self.target_name,
            timestamp: self.timestamp,
        })
    }
}

/// Request to edit a comment in the editor
#[derive(Debug, Clone, PartialEq)]
pub struct CommentOpenRequest {
    pub comment_id: String,
    pub content: String,
    pub target_id: Option<String>,
    pub target_name: Option<String>,
    pub timestamp: Option<f64>,
}

/// Messages sent to Engine GUIs
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    Heartbeat { timestamp: u64 },
    Comment(CommentUpdate),
    Extension { code: String },
}

/// Edited comment text pushed back to the Engine
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentUpdate {
    pub action: &'static str,
    pub comment_id: String,
    pub content: String,
}

impl OutboundMessage {
    /// Heartbeat reply stamped with the current time
    pub fn heartbeat() -> Self {
        OutboundMessage::Heartbeat {
            timestamp: epoch_millis(),
        }
    }

    pub fn comment_update(comment_id: impl Into<String>, content: impl Into<String>) -> Self {
        OutboundMessage::Comment(CommentUpdate {
            action: "update",
            comment_id: comment_id.into(),
            content: content.into(),
        })
    }

    pub fn extension(code: impl Into<String>) -> Self {
        OutboundMessage::Extension { code: code.into() }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
