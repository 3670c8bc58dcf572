//! Block preview for Engine extensions
//!
//! [`extract`] recovers the block declarations from extension source and
//! [`render_preview`] turns them into a standalone HTML page. Both are pure and
//! meant to be re-run on every edit.

pub mod extractor;
pub mod model;
pub mod render;

pub use extractor::{extract, try_extract, ExtractError};
pub use model::{ArgumentDescriptor, BlockDescriptor, BlockType, ExtensionDescriptor};
pub use render::{preview_title, render_preview};
