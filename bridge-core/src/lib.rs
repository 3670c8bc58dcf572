//! Engine bridge core
//!
//! Configuration, errors, events, the plugin lifecycle and the editor boundary
//! shared by the preview, server and comment crates.

pub mod config;
pub mod editor;
pub mod error;
pub mod event;
pub mod i18n;
pub mod plugin;

// Re-export commonly used types
pub use config::{CommentConfig, Config, ConfigLoadContext, ServerConfig, DEFAULT_PORT};
pub use editor::{DocumentHandle, EditorHost, NotificationLevel, PickItem, ScratchKind};
pub use error::{BridgeError, Result};
pub use event::{EventBus, InMemoryEventBus, SubscriptionId, SystemEvent, SystemEventHandler};
pub use i18n::{Language, Text};
pub use plugin::{Plugin, PluginContext, PluginInfo, PluginRegistry, PluginStatus};
