//! Display language selection and the small text catalog used by the bridge

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BridgeError;

/// Supported display languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    En,
    #[serde(rename = "zh-cn")]
    ZhCn,
}

/// Keys of the text catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Text {
    BlockTypeCommand,
    BlockTypeReporter,
    BlockTypeBoolean,
    BlockTypeHat,
    UnnamedExtension,
    UnnamedTarget,
    PreviewHeading,
    ParseError,
    ScratchKindMarkdown,
    ScratchKindJavaScript,
    SelectScratchKind,
    CommentEditorOpened,
    CommentEditorNotFound,
    CommentUpdated,
    SaveCommentError,
    NoActiveCommentEditor,
    SelectCommentToSave,
    NoClients,
    NoClientsToUpdate,
    ServerStarted,
    ServerAlreadyRunning,
    StartServerError,
    ServerStopped,
    ServerNotRunning,
    ServerNotRunningAsk,
    NotJavaScriptFile,
    ExtensionSent,
    StatusRunning,
    StatusStopped,
    ToolboxPlaceholder,
    ToolPreviewBlocks,
    ToolPreviewBlocksDescription,
    ToolSendExtension,
    ToolSendExtensionDescription,
    ToolServerManagement,
    ToolServerManagementDescription,
    ToolSaveAndSendComment,
    ToolSaveAndSendCommentDescription,
    Yes,
    No,
    Start,
    Cancel,
    NoFileOpen,
    EnterFilePath,
    ServerMenuPlaceholder,
    ServerMenuStatus,
    ServerMenuPort,
    ServerMenuConnections,
    ServerMenuConnected,
    ServerMenuWaiting,
    ServerMenuStart,
    ServerMenuStop,
    ServerMenuSend,
    ServerRunning,
    ServerNotStarted,
}

impl Language {
    /// Pick the configured language, or guess one from the `LANG` environment
    pub fn detect(configured: Option<Language>) -> Self {
        if let Some(language) = configured {
            return language;
        }

        match std::env::var("LANG") {
            Ok(lang) => Self::from_locale(&lang),
            Err(_) => Language::En,
        }
    }

    /// Map a POSIX or BCP-47 locale string to a language
    pub fn from_locale(locale: &str) -> Self {
        if locale.to_lowercase().starts_with("zh") {
            Language::ZhCn
        } else {
            Language::En
        }
    }

    /// Value for the `lang` attribute of generated HTML
    pub fn html_lang(&self) -> &'static str {
        match self {
            Language::En => "en-US",
            Language::ZhCn => "zh-CN",
        }
    }

    /// Look up a catalog entry
    pub fn text(&self, key: Text) -> &'static str {
        match self {
            Language::En => english(key),
            Language::ZhCn => chinese(key),
        }
    }

    /// Look up an entry and fill its `{name}` parameters
    pub fn format(&self, key: Text, params: &[(&str, &str)]) -> String {
        let mut message = self.text(key).to_string();
        for (name, value) in params {
            message = message.replacen(&format!("{{{}}}", name), value, 1);
        }
        message
    }

    /// Title of the preview panel for a named extension
    pub fn preview_title(&self, extension_name: &str) -> String {
        format!("{}: {}", self.text(Text::PreviewHeading), extension_name)
    }
}

fn english(key: Text) -> &'static str {
    match key {
        Text::BlockTypeCommand => "Command",
        Text::BlockTypeReporter => "Reporter",
        Text::BlockTypeBoolean => "Boolean",
        Text::BlockTypeHat => "Event",
        Text::UnnamedExtension => "Unnamed Extension",
        Text::UnnamedTarget => "Unnamed Target",
        Text::PreviewHeading => "Block Preview",
        Text::ParseError => {
            "Failed to parse extension info. Make sure the file contains a valid getInfo() method"
        }
        Text::ScratchKindMarkdown => "Markdown (.md)",
        Text::ScratchKindJavaScript => "JavaScript (.js)",
        Text::SelectScratchKind => "Select file type to edit {target}'s comment",
        Text::CommentEditorOpened => "Opened comment editor for {target}",
        Text::CommentEditorNotFound => "Comment editor not found",
        Text::CommentUpdated => "Comment updated and sent back to the Engine",
        Text::SaveCommentError => "Failed to save comment: {error}",
        Text::NoActiveCommentEditor => "No active comment editor",
        Text::SelectCommentToSave => "Select comment to save",
        Text::NoClients => "No connected Engine GUI clients",
        Text::NoClientsToUpdate => "No available clients to update comment",
        Text::ServerStarted => "Engine debug server started on {address}",
        Text::ServerAlreadyRunning => "Server is already running",
        Text::StartServerError => "Failed to start server: {error}",
        Text::ServerStopped => "Engine debug server stopped",
        Text::ServerNotRunning => "Server is not running",
        Text::ServerNotRunningAsk => "Server is not running. Start it?",
        Text::NotJavaScriptFile => "Current file is not a JavaScript file. Continue sending?",
        Text::ExtensionSent => "Extension code sent to {count} clients",
        Text::StatusRunning => "Engine: {count} connections",
        Text::StatusStopped => "Engine: not started",
        Text::ToolboxPlaceholder => "Select a tool to use",
        Text::ToolPreviewBlocks => "Preview Blocks",
        Text::ToolPreviewBlocksDescription => "Preview block definitions in the extension",
        Text::ToolSendExtension => "Send Extension",
        Text::ToolSendExtensionDescription => "Send current extension code to GUI clients",
        Text::ToolServerManagement => "Server Management",
        Text::ToolServerManagementDescription => "Start, stop, or view server status",
        Text::ToolSaveAndSendComment => "Save & Send Comment",
        Text::ToolSaveAndSendCommentDescription => {
            "Save current comment and send back to the Engine"
        }
        Text::Yes => "Yes",
        Text::No => "No",
        Text::Start => "Start",
        Text::Cancel => "Cancel",
        Text::NoFileOpen => "Please open an extension file first",
        Text::EnterFilePath => "Path of the extension file",
        Text::ServerMenuPlaceholder => "Engine Toolbox",
        Text::ServerMenuStatus => "Server status: {status}",
        Text::ServerMenuPort => "Port: {port}",
        Text::ServerMenuConnections => "Connections: {count}",
        Text::ServerMenuConnected => "Client connected",
        Text::ServerMenuWaiting => "Waiting for connection",
        Text::ServerMenuStart => "Start server",
        Text::ServerMenuStop => "Stop server",
        Text::ServerMenuSend => "Send current extension",
        Text::ServerRunning => "Running",
        Text::ServerNotStarted => "Not running",
    }
}

fn chinese(key: Text) -> &'static str {
    match key {
        Text::BlockTypeCommand => "命令",
        Text::BlockTypeReporter => "返回值",
        Text::BlockTypeBoolean => "布尔值",
        Text::BlockTypeHat => "事件",
        Text::UnnamedExtension => "未命名扩展",
        Text::UnnamedTarget => "未命名目标",
        Text::PreviewHeading => "积木预览",
        Text::ParseError => "无法解析扩展信息，请确保文件包含有效的 getInfo() 方法",
        Text::ScratchKindMarkdown => "Markdown (.md)",
        Text::ScratchKindJavaScript => "JavaScript (.js)",
        Text::SelectScratchKind => "选择文件类型来编辑 {target} 的注释",
        Text::CommentEditorOpened => "已打开 {target} 的注释编辑器",
        Text::CommentEditorNotFound => "未找到注释编辑器",
        Text::CommentUpdated => "注释已更新并发送回 Engine",
        Text::SaveCommentError => "保存注释失败: {error}",
        Text::NoActiveCommentEditor => "没有活动的注释编辑器",
        Text::SelectCommentToSave => "选择要保存的注释",
        Text::NoClients => "没有连接的 Engine GUI 客户端",
        Text::NoClientsToUpdate => "没有可用的客户端来更新注释",
        Text::ServerStarted => "Engine 调试服务器已启动: {address}",
        Text::ServerAlreadyRunning => "服务器已在运行中",
        Text::StartServerError => "无法启动服务器: {error}",
        Text::ServerStopped => "Engine 调试服务器已停止",
        Text::ServerNotRunning => "服务器未运行",
        Text::ServerNotRunningAsk => "服务器未运行，是否启动？",
        Text::NotJavaScriptFile => "当前文件不是 JavaScript 文件，是否继续发送？",
        Text::ExtensionSent => "扩展代码已发送到 {count} 个客户端",
        Text::StatusRunning => "Engine: {count} 连接",
        Text::StatusStopped => "Engine: 未启动",
        Text::ToolboxPlaceholder => "选择要使用的工具",
        Text::ToolPreviewBlocks => "预览积木",
        Text::ToolPreviewBlocksDescription => "预览扩展中的积木定义",
        Text::ToolSendExtension => "发送扩展",
        Text::ToolSendExtensionDescription => "将当前扩展代码发送到 GUI 客户端",
        Text::ToolServerManagement => "服务器管理",
        Text::ToolServerManagementDescription => "启动、停止或查询服务器状态",
        Text::ToolSaveAndSendComment => "保存并发送注释",
        Text::ToolSaveAndSendCommentDescription => "保存当前注释并发送回 Engine",
        Text::Yes => "是",
        Text::No => "否",
        Text::Start => "启动",
        Text::Cancel => "取消",
        Text::NoFileOpen => "请先打开一个扩展文件",
        Text::EnterFilePath => "扩展文件路径",
        Text::ServerMenuPlaceholder => "Engine 工具箱",
        Text::ServerMenuStatus => "服务器状态: {status}",
        Text::ServerMenuPort => "端口: {port}",
        Text::ServerMenuConnections => "连接数: {count}",
        Text::ServerMenuConnected => "客户端已连接",
        Text::ServerMenuWaiting => "等待连接",
        Text::ServerMenuStart => "启动服务器",
        Text::ServerMenuStop => "停止服务器",
        Text::ServerMenuSend => "发送当前扩展",
        Text::ServerRunning => "运行中",
        Text::ServerNotStarted => "未运行",
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::En => write!(f, "en"),
            Language::ZhCn => write!(f, "zh-cn"),
        }
    }
}

impl FromStr for Language {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "en" | "en-us" => Ok(Language::En),
            "zh" | "zh-cn" => Ok(Language::ZhCn),
            other => Err(BridgeError::config(format!("Unsupported language: {}", other))),
        }
    }
}
