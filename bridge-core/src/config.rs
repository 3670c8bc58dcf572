//! Configuration management for the Engine bridge

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::editor::ScratchKind;
use crate::error::{BridgeError, Result};
use crate::i18n::Language;

/// Port the Engine GUI connects to unless told otherwise
pub const DEFAULT_PORT: u16 = 1101;

/// Directory name used for scratch files under the user's home
pub const SCRATCH_DIR_NAME: &str = ".engine-bridge-comments";

/// Main bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub comments: CommentConfig,
    #[serde(default)]
    pub language: Option<Language>,
}

impl Config {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::config(format!("Failed to read config file: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| BridgeError::config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| BridgeError::config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| BridgeError::config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(BridgeError::config("Invalid port number"));
        }

        if self.server.hostname.trim().is_empty() {
            return Err(BridgeError::config("Hostname cannot be empty"));
        }

        if let Some(dir) = &self.comments.scratch_dir {
            if dir.as_os_str().is_empty() {
                return Err(BridgeError::config("Scratch directory cannot be empty"));
            }
        }

        Ok(())
    }

    /// Load configuration from file, environment and CLI overrides, in that order
    pub fn load_with_context(context: &ConfigLoadContext) -> Result<Self> {
        let mut config = match &context.base_path {
            Some(path) if path.exists() => {
                tracing::info!("Loading configuration from: {}", path.display());
                Self::from_file(path)?
            }
            Some(path) => {
                tracing::debug!(
                    "Configuration file {} not found, using defaults",
                    path.display()
                );
                Self::new()
            }
            None => Self::new(),
        };

        config.apply_environment_overrides(&context.environment_overrides)?;
        config.apply_cli_overrides(&context.cli_overrides)?;

        if context.validation_enabled {
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_environment_overrides(
        &mut self,
        env_overrides: &HashMap<String, String>,
    ) -> Result<()> {
        for (key, value) in env_overrides {
            match key.as_str() {
                "ENGINE_BRIDGE_HOSTNAME" => self.server.hostname = value.clone(),
                "ENGINE_BRIDGE_PORT" => {
                    self.server.port = value.parse().map_err(|_| {
                        BridgeError::config(format!(
                            "Invalid port in environment variable: {}",
                            value
                        ))
                    })?;
                }
                "ENGINE_BRIDGE_AUTO_START" => {
                    self.server.auto_start = value.parse().map_err(|_| {
                        BridgeError::config(format!(
                            "Invalid boolean in environment variable: {}",
                            value
                        ))
                    })?;
                }
                "ENGINE_BRIDGE_LANGUAGE" => {
                    self.language = Some(value.parse()?);
                }
                "ENGINE_BRIDGE_SCRATCH_DIR" => {
                    self.comments.scratch_dir = Some(PathBuf::from(value));
                }
                _ => {
                    // Ignore unknown environment variables
                }
            }
        }
        Ok(())
    }

    /// Apply CLI argument overrides
    pub fn apply_cli_overrides(
        &mut self,
        cli_overrides: &HashMap<String, serde_json::Value>,
    ) -> Result<()> {
        for (key, value) in cli_overrides {
            match (key.as_str(), value) {
                ("server.hostname", serde_json::Value::String(hostname)) => {
                    self.server.hostname = hostname.clone();
                }
                ("server.port", serde_json::Value::Number(port)) => {
                    self.server.port = port
                        .as_u64()
                        .and_then(|p| u16::try_from(p).ok())
                        .ok_or_else(|| BridgeError::config(format!("Invalid port: {}", port)))?;
                }
                ("server.auto_start", serde_json::Value::Bool(flag)) => {
                    self.server.auto_start = *flag;
                }
                ("language", serde_json::Value::String(language)) => {
                    self.language = Some(language.parse()?);
                }
                ("comments.default_kind", serde_json::Value::String(kind)) => {
                    self.comments.default_kind = Some(kind.parse()?);
                }
                _ => {
                    tracing::debug!("Ignoring unknown CLI override: {}", key);
                }
            }
        }
        Ok(())
    }

    /// Directory scratch files are written to
    pub fn scratch_dir(&self) -> PathBuf {
        if let Some(dir) = &self.comments.scratch_dir {
            return dir.clone();
        }

        dirs::home_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(SCRATCH_DIR_NAME)
    }

    /// Display language, falling back to the environment
    pub fn language(&self) -> Language {
        Language::detect(self.language)
    }
}

/// WebSocket listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub hostname: String,
    pub port: u16,
    #[serde(default)]
    pub auto_start: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            auto_start: false,
        }
    }
}

impl ServerConfig {
    /// Address string passed to the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

/// Comment editing configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CommentConfig {
    pub scratch_dir: Option<PathBuf>,
    pub default_kind: Option<ScratchKind>,
}

/// Configuration loading context
#[derive(Debug, Clone)]
pub struct ConfigLoadContext {
    pub base_path: Option<PathBuf>,
    pub environment_overrides: HashMap<String, String>,
    pub cli_overrides: HashMap<String, serde_json::Value>,
    pub validation_enabled: bool,
}

impl ConfigLoadContext {
    /// Collect `ENGINE_BRIDGE_*` variables from the process environment
    pub fn with_process_environment(mut self) -> Self {
        self.environment_overrides = std::env::vars()
            .filter(|(key, _)| key.starts_with("ENGINE_BRIDGE_"))
            .collect();
        self
    }
}

impl Default for ConfigLoadContext {
    fn default() -> Self {
        Self {
            base_path: None,
            environment_overrides: HashMap::new(),
            cli_overrides: HashMap::new(),
            validation_enabled: true,
        }
    }
}
