//! Lifecycle wrapper for the long-lived bridge components

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use crate::config::Config;
use crate::error::{BridgeError, Result};
use crate::event::EventBus;

/// A component with an explicit start and stop
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Names of plugins that must be registered first
    fn dependencies(&self) -> Vec<&str> {
        Vec::new()
    }

    async fn initialize(&mut self, context: &PluginContext) -> Result<()>;

    async fn shutdown(&mut self) -> Result<()>;

    fn status(&self) -> PluginStatus {
        PluginStatus::Active
    }
}

/// Shared services handed to plugins on initialization
#[derive(Clone)]
pub struct PluginContext {
    pub event_bus: Arc<dyn EventBus>,
    pub config: Arc<Config>,
}

impl PluginContext {
    pub fn new(event_bus: Arc<dyn EventBus>, config: Arc<Config>) -> Self {
        Self { event_bus, config }
    }
}

/// Plugin status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginStatus {
    Loading,
    Active,
    Error(String),
    Disabled,
}

/// Information about a registered plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    pub status: PluginStatus,
    pub load_time: SystemTime,
}

/// Owns registered plugins and tears them down in reverse order
pub struct PluginRegistry {
    plugins: HashMap<String, Box<dyn Plugin>>,
    plugin_info: HashMap<String, PluginInfo>,
    load_order: Vec<String>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
            plugin_info: HashMap::new(),
            load_order: Vec::new(),
        }
    }

    /// Initialize a plugin and take ownership of it
    pub async fn register_plugin(
        &mut self,
        mut plugin: Box<dyn Plugin>,
        context: &PluginContext,
    ) -> Result<()> {
        let name = plugin.name().to_string();
        let version = plugin.version().to_string();

        if self.plugins.contains_key(&name) {
            return Err(BridgeError::plugin(format!(
                "Plugin {} is already registered",
                name
            )));
        }

        for dep in plugin.dependencies() {
            if !self.plugins.contains_key(dep) {
                return Err(BridgeError::plugin(format!(
                    "Plugin {} depends on {}, which is not loaded",
                    name, dep
                )));
            }
        }

        tracing::info!("Registering plugin: {} v{}", name, version);
        plugin.initialize(context).await?;

        self.plugin_info.insert(
            name.clone(),
            PluginInfo {
                name: name.clone(),
                version,
                status: plugin.status(),
                load_time: SystemTime::now(),
            },
        );
        self.plugins.insert(name.clone(), plugin);
        self.load_order.push(name);

        Ok(())
    }

    /// Shut down every plugin, last registered first
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("Shutting down plugins");

        for plugin_name in self.load_order.iter().rev() {
            if let Some(plugin) = self.plugins.get_mut(plugin_name) {
                if let Err(e) = plugin.shutdown().await {
                    tracing::error!("Failed to shutdown plugin {}: {}", plugin_name, e);
                }
            }
        }

        self.plugins.clear();
        self.plugin_info.clear();
        self.load_order.clear();

        Ok(())
    }

    pub fn get_plugin_info(&self, name: &str) -> Option<&PluginInfo> {
        self.plugin_info.get(name)
    }

    /// Registered plugins in load order
    pub fn list_plugins(&self) -> Vec<&PluginInfo> {
        self.load_order
            .iter()
            .filter_map(|name| self.plugin_info.get(name))
            .collect()
    }

    pub fn is_plugin_loaded(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}
