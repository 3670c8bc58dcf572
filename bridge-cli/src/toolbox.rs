//! Tool menu shown by the `tools` command

use engine_bridge_core::{EditorHost, Language, PickItem, Text};
use indexmap::IndexMap;

/// Built-in tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolId {
    PreviewBlocks,
    SendExtension,
    ServerManagement,
    SaveAndSendComment,
}

impl ToolId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolId::PreviewBlocks => "previewBlocks",
            ToolId::SendExtension => "sendExtension",
            ToolId::ServerManagement => "serverManagement",
            ToolId::SaveAndSendComment => "saveAndSendComment",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tool {
    pub id: ToolId,
    pub name: String,
    pub description: String,
}

impl Tool {
    fn localized(id: ToolId, name: Text, description: Text, language: Language) -> Self {
        Self {
            id,
            name: language.text(name).to_string(),
            description: language.text(description).to_string(),
        }
    }
}

/// Registry of tools, kept in registration order
#[derive(Debug, Default)]
pub struct Toolbox {
    tools: IndexMap<&'static str, Tool>,
}

impl Toolbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// The four built-in tools with labels in `language`
    pub fn with_default_tools(language: Language) -> Self {
        let mut toolbox = Self::new();
        toolbox.register_tools(vec![
            Tool::localized(
                ToolId::PreviewBlocks,
                Text::ToolPreviewBlocks,
                Text::ToolPreviewBlocksDescription,
                language,
            ),
            Tool::localized(
                ToolId::SendExtension,
                Text::ToolSendExtension,
                Text::ToolSendExtensionDescription,
                language,
            ),
            Tool::localized(
                ToolId::ServerManagement,
                Text::ToolServerManagement,
                Text::ToolServerManagementDescription,
                language,
            ),
            Tool::localized(
                ToolId::SaveAndSendComment,
                Text::ToolSaveAndSendComment,
                Text::ToolSaveAndSendCommentDescription,
                language,
            ),
        ]);
        toolbox
    }

    /// Add a tool, replacing any tool with the same id
    pub fn register_tool(&mut self, tool: Tool) {
        self.tools.insert(tool.id.as_str(), tool);
    }

    pub fn register_tools(&mut self, tools: Vec<Tool>) {
        for tool in tools {
            self.register_tool(tool);
        }
    }

    pub fn get_tool(&self, id: &str) -> Option<&Tool> {
        self.tools.get(id)
    }

    pub fn list_tools(&self) -> Vec<&Tool> {
        self.tools.values().collect()
    }

    pub fn menu_items(&self) -> Vec<PickItem> {
        self.tools
            .values()
            .map(|tool| PickItem::new(tool.name.clone(), tool.description.clone()))
            .collect()
    }

    /// Show the menu and return the chosen tool
    pub async fn pick(&self, host: &dyn EditorHost, language: Language) -> Option<ToolId> {
        if self.tools.is_empty() {
            return None;
        }

        let choice = host
            .pick_item(language.text(Text::ToolboxPlaceholder), &self.menu_items())
            .await?;
        self.tools.get_index(choice).map(|(_, tool)| tool.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tools_in_order() {
        let toolbox = Toolbox::with_default_tools(Language::En);
        let ids: Vec<ToolId> = toolbox.list_tools().iter().map(|tool| tool.id).collect();
        assert_eq!(
            ids,
            vec![
                ToolId::PreviewBlocks,
                ToolId::SendExtension,
                ToolId::ServerManagement,
                ToolId::SaveAndSendComment,
            ]
        );
        assert_eq!(
            toolbox.get_tool("sendExtension").map(|tool| tool.name.as_str()),
            Some("Send Extension")
        );
    }

    #[test]
    fn test_register_replaces_same_id() {
        let mut toolbox = Toolbox::with_default_tools(Language::En);
        toolbox.register_tool(Tool {
            id: ToolId::PreviewBlocks,
            name: "Blocks".to_string(),
            description: String::new(),
        });
        assert_eq!(toolbox.list_tools().len(), 4);
        assert_eq!(toolbox.menu_items()[0].label, "Blocks");
    }

    #[test]
    fn test_localized_labels() {
        let toolbox = Toolbox::with_default_tools(Language::ZhCn);
        assert_eq!(toolbox.menu_items()[0].label, "预览积木");
    }
}
