//! Descriptors recovered from an extension's `getInfo()` object

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const DEFAULT_EXTENSION_ID: &str = "unknown";
pub const DEFAULT_COLOR1: &str = "#4C97FF";
pub const DEFAULT_COLOR2: &str = "#3373CC";

/// A complete extension description, defaults already applied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionDescriptor {
    pub id: String,
    pub name: String,
    pub color1: String,
    pub color2: String,
    pub blocks: Vec<BlockDescriptor>,
    pub menus: IndexMap<String, Value>,
}

/// One block declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDescriptor {
    #[serde(default, deserialize_with = "nullable_string")]
    pub opcode: String,
    #[serde(default)]
    pub block_type: BlockType,
    #[serde(default, deserialize_with = "nullable_string")]
    pub text: String,
    #[serde(default)]
    pub arguments: Option<IndexMap<String, ArgumentDescriptor>>,
}

/// One `[name]` input of a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgumentDescriptor {
    #[serde(rename = "type", default)]
    pub arg_type: Option<String>,
    /// `Some(Value::Null)` for an explicit `null`, `None` when absent
    #[serde(default, deserialize_with = "present_value")]
    pub default_value: Option<Value>,
    /// Present (even as `null`) means the input is a dropdown
    #[serde(default, deserialize_with = "present_value")]
    pub menu: Option<Value>,
}

impl ArgumentDescriptor {
    /// Dropdown inputs are the ones bound to a menu
    pub fn is_menu(&self) -> bool {
        self.menu.is_some()
    }

    /// Default value as it should appear inside the input slot
    pub fn default_text(&self) -> String {
        match &self.default_value {
            None => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// Visual shape of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BlockType {
    #[default]
    Command,
    Reporter,
    Boolean,
    Hat,
}

impl BlockType {
    /// Case-insensitive lookup; anything unrecognised is a command
    pub fn from_name(name: &str) -> Self {
        match name.to_uppercase().as_str() {
            "REPORTER" => BlockType::Reporter,
            "BOOLEAN" => BlockType::Boolean,
            "HAT" => BlockType::Hat,
            _ => BlockType::Command,
        }
    }

    /// CSS class of the block element
    pub fn css_class(&self) -> &'static str {
        match self {
            BlockType::Command => "block-command",
            BlockType::Reporter => "block-reporter",
            BlockType::Boolean => "block-boolean",
            BlockType::Hat => "block-hat",
        }
    }
}

impl<'de> Deserialize<'de> for BlockType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(name) => BlockType::from_name(&name),
            _ => BlockType::Command,
        })
    }
}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Keeps an explicit `null` distinct from a missing field
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}
