//! Rendering block previews to HTML files

use engine_bridge_core::{BridgeError, Language, Result};
use engine_bridge_preview::{render_preview, try_extract};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info};

/// `ext.js` → `ext.preview.html` next to the source
pub fn default_output_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "extension".to_string());
    source.with_file_name(format!("{}.preview.html", stem))
}

/// Extract blocks from `source` and write the preview page to `output`
pub async fn render_file(source: &Path, output: &Path, language: Language) -> Result<usize> {
    let code = tokio::fs::read_to_string(source).await.map_err(|e| {
        BridgeError::file_system(format!("Failed to read {}: {}", source.display(), e))
    })?;

    let descriptor = try_extract(&code, language)?;
    let html = render_preview(&descriptor, language);

    tokio::fs::write(output, html).await.map_err(|e| {
        BridgeError::file_system(format!("Failed to write {}: {}", output.display(), e))
    })?;

    info!(
        "Rendered {} blocks of {} to {}",
        descriptor.blocks.len(),
        descriptor.name,
        output.display()
    );
    Ok(descriptor.blocks.len())
}

async fn modified(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

/// Re-render whenever the source's modification time moves; runs until cancelled
pub async fn watch(source: PathBuf, output: PathBuf, language: Language, interval: Duration) {
    info!("Watching {} for changes", source.display());

    let mut last_modified = modified(&source).await;
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let current = modified(&source).await;
        if current.is_none() || current == last_modified {
            continue;
        }
        last_modified = current;

        debug!("{} changed, re-rendering", source.display());
        match render_file(&source, &output, language).await {
            Ok(_) => println!("🔄 Preview updated: {}", output.display()),
            Err(e) => error!("Failed to refresh preview: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SOURCE: &str = r#"
class Pen {
  getInfo() {
    return {
      id: 'pen',
      name: 'Pen',
      blocks: [
        { opcode: 'down', blockType: Scratch.BlockType.COMMAND, text: 'pen down' },
      ],
    };
  }
}
"#;

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("/work/pen.js")),
            PathBuf::from("/work/pen.preview.html")
        );
    }

    #[tokio::test]
    async fn test_render_file() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("pen.js");
        let output = dir.path().join("pen.html");
        tokio::fs::write(&source, SOURCE).await.unwrap();

        let count = render_file(&source, &output, Language::En).await.unwrap();
        assert_eq!(count, 1);
        let html = tokio::fs::read_to_string(&output).await.unwrap();
        assert!(html.contains("pen down"));
    }

    #[tokio::test]
    async fn test_unparseable_source_is_an_extraction_error() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("plain.js");
        tokio::fs::write(&source, "console.log(1);").await.unwrap();

        let err = render_file(&source, &dir.path().join("out.html"), Language::En)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Extraction(_)));
        assert!(!dir.path().join("out.html").exists());
    }

    #[tokio::test]
    async fn test_watch_rerenders_on_change() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("pen.js");
        let output = dir.path().join("pen.html");
        tokio::fs::write(&source, SOURCE).await.unwrap();

        let watcher = tokio::spawn(watch(
            source.clone(),
            output.clone(),
            Language::En,
            Duration::from_millis(20),
        ));

        // Coarse filesystem clocks need a visible gap between writes
        tokio::time::sleep(Duration::from_millis(1100)).await;
        tokio::fs::write(&source, SOURCE.replace("pen down", "pen lifted"))
            .await
            .unwrap();

        let mut rendered = String::new();
        for _ in 0..100 {
            rendered = tokio::fs::read_to_string(&output).await.unwrap_or_default();
            if rendered.contains("pen lifted") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        watcher.abort();
        assert!(rendered.contains("pen lifted"));
    }
}
