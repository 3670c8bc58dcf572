//! Scratch files holding comment text while it is edited

use engine_bridge_core::{BridgeError, Result, ScratchKind};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const MAX_NAME_CHARS: usize = 20;
const ID_TAIL_CHARS: usize = 8;
const EMPTY_ID_TAIL: &str = "00000000";

fn keeps_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || ('\u{4e00}'..='\u{9fa5}').contains(&c)
}

/// Target name reduced to safe file-name characters, at most 20 of them
pub fn sanitize_target_name(target_name: Option<&str>) -> String {
    let name = match target_name {
        Some(name) if !name.is_empty() => name,
        _ => "unnamed",
    };

    name.chars()
        .map(|c| if keeps_char(c) { c } else { '_' })
        .take(MAX_NAME_CHARS)
        .collect()
}

/// Alphanumerics from the last eight characters of a comment id
pub fn comment_id_tail(comment_id: &str) -> String {
    let count = comment_id.chars().count();
    let tail: String = comment_id
        .chars()
        .skip(count.saturating_sub(ID_TAIL_CHARS))
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();

    if tail.is_empty() {
        EMPTY_ID_TAIL.to_string()
    } else {
        tail
    }
}

/// `cmt_<name>_<id tail>.<md|js>`
pub fn scratch_file_name(comment_id: &str, target_name: Option<&str>, kind: ScratchKind) -> String {
    format!(
        "cmt_{}_{}.{}",
        sanitize_target_name(target_name),
        comment_id_tail(comment_id),
        kind.extension()
    )
}

/// Directory of scratch files
#[derive(Debug, Clone)]
pub struct ScratchStore {
    dir: PathBuf,
}

impl ScratchStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write comment text verbatim, creating the directory if needed
    pub async fn write(
        &self,
        comment_id: &str,
        target_name: Option<&str>,
        kind: ScratchKind,
        content: &str,
    ) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            BridgeError::file_system(format!(
                "Failed to create scratch directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let path = self.dir.join(scratch_file_name(comment_id, target_name, kind));
        tokio::fs::write(&path, content).await.map_err(|e| {
            BridgeError::file_system(format!("Failed to write {}: {}", path.display(), e))
        })?;

        tracing::debug!("Wrote {} bytes to {}", content.len(), path.display());
        Ok(path)
    }

    pub async fn read(&self, path: &Path) -> Result<String> {
        tokio::fs::read_to_string(path).await.map_err(|e| {
            BridgeError::file_system(format!("Failed to read {}: {}", path.display(), e))
        })
    }

    /// Delete a scratch file; `false` if it was already gone
    pub async fn remove(&self, path: &Path) -> Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BridgeError::file_system(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }

    pub async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }
}
