//! Error handling for the Engine bridge

use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Main error type for the bridge
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Plugin lifecycle errors
    #[error("Plugin error: {0}")]
    Plugin(String),

    /// Listener and socket errors
    #[error("Server error: {0}")]
    Server(String),

    /// Scratch file errors
    #[error("File system error: {0}")]
    FileSystem(String),

    /// Extension source could not be turned into a block descriptor
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Editor document or prompt errors
    #[error("Editor error: {0}")]
    Editor(String),

    /// No comment session is tracked for the given id
    #[error("Comment session not found: {0}")]
    SessionNotFound(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BridgeError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new plugin error
    pub fn plugin<S: Into<String>>(msg: S) -> Self {
        Self::Plugin(msg.into())
    }

    /// Create a new server error
    pub fn server<S: Into<String>>(msg: S) -> Self {
        Self::Server(msg.into())
    }

    /// Create a new file system error
    pub fn file_system<S: Into<String>>(msg: S) -> Self {
        Self::FileSystem(msg.into())
    }

    /// Create a new extraction error
    pub fn extraction<S: Into<String>>(msg: S) -> Self {
        Self::Extraction(msg.into())
    }

    /// Create a new editor error
    pub fn editor<S: Into<String>>(msg: S) -> Self {
        Self::Editor(msg.into())
    }

    /// Warning-class errors are reported to the user without the error styling.
    pub fn is_warning(&self) -> bool {
        matches!(self, BridgeError::SessionNotFound(_) | BridgeError::Extraction(_))
    }
}
