//! Interactive console: the command surface of the bridge
//!
//! Each console line is either the answer to a pending prompt or a command.
//! Commands run one at a time; comment-open requests from Engine GUIs run on
//! their own tasks and may prompt while a command is idle.

use engine_bridge_comments::CommentSessionManager;
use engine_bridge_core::{
    BridgeError, EditorHost, Language, NotificationLevel, PickItem, Result, Text,
};
use engine_bridge_server::{SessionHub, StartOutcome, StopOutcome};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::host::ConsoleHost;
use crate::preview::{default_output_path, render_file};
use crate::toolbox::{ToolId, Toolbox};

/// Wait between an on-demand start and the first send
const START_GRACE: Duration = Duration::from_millis(500);

const HELP: &str = "\
Commands:
  tools                   Open the tool menu
  start                   Start the debug server
  stop                    Stop the debug server and close comment editors
  status                  Server status and actions
  send [file]             Send extension code to every connected Engine GUI
  preview [file] [out]    Render a block preview page
  save [comment id]       Save a comment and send it back to the Engine
  focus [file]            Mark a file as the active editor view
  sessions                List open comment editors
  help                    Show this help
  quit                    Exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Tools,
    Start,
    Stop,
    Status,
    Send(Option<PathBuf>),
    Preview {
        source: Option<PathBuf>,
        output: Option<PathBuf>,
    },
    Save(Option<String>),
    Focus(Option<PathBuf>),
    Sessions,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = BridgeError;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };
        let path = || (!rest.is_empty()).then(|| PathBuf::from(rest));

        let command = match name.to_lowercase().as_str() {
            "tools" | "toolbox" => ConsoleCommand::Tools,
            "start" => ConsoleCommand::Start,
            "stop" => ConsoleCommand::Stop,
            "status" => ConsoleCommand::Status,
            "send" => ConsoleCommand::Send(path()),
            "preview" => {
                let mut args = rest.split_whitespace().map(PathBuf::from);
                ConsoleCommand::Preview {
                    source: args.next(),
                    output: args.next(),
                }
            }
            "save" => ConsoleCommand::Save((!rest.is_empty()).then(|| rest.to_string())),
            "focus" => ConsoleCommand::Focus(path()),
            "sessions" => ConsoleCommand::Sessions,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            other => {
                return Err(BridgeError::config(format!(
                    "Unknown command: {} (type `help` for a list)",
                    other
                )))
            }
        };
        Ok(command)
    }
}

/// Whether the console keeps reading after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Console {
    language: Language,
    host: Arc<ConsoleHost>,
    hub: Arc<SessionHub>,
    manager: Arc<CommentSessionManager>,
    toolbox: Toolbox,
}

impl Console {
    pub fn new(
        language: Language,
        host: Arc<ConsoleHost>,
        hub: Arc<SessionHub>,
        manager: Arc<CommentSessionManager>,
    ) -> Self {
        Self {
            language,
            host,
            hub,
            manager,
            toolbox: Toolbox::with_default_tools(language),
        }
    }

    /// Read lines from `input` until `quit` or end of input
    pub async fn run<R>(&self, input: R)
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let (commands, mut pending) = mpsc::unbounded_channel();
        let host = self.host.clone();
        let reader = tokio::spawn(async move {
            let mut lines = input.lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if let Some(command) = host.route_line(line).await {
                            if commands.send(command).is_err() {
                                break;
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        error!("Failed to read console input: {}", e);
                        break;
                    }
                }
            }
            // Nothing can answer a prompt any more
            host.cancel_prompt().await;
        });

        while let Some(line) = pending.recv().await {
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<ConsoleCommand>() {
                Ok(command) => {
                    if self.execute(command).await == Flow::Quit {
                        break;
                    }
                }
                Err(e) => self.host.notify(NotificationLevel::Warning, &e.to_string()),
            }
        }

        reader.abort();
    }

    pub async fn execute(&self, command: ConsoleCommand) -> Flow {
        debug!("Console command: {:?}", command);
        match command {
            ConsoleCommand::Tools => self.open_toolbox().await,
            ConsoleCommand::Start => {
                self.start_server().await;
            }
            ConsoleCommand::Stop => self.stop_server().await,
            ConsoleCommand::Status => self.server_menu().await,
            ConsoleCommand::Send(path) => {
                self.send_extension(path).await;
            }
            ConsoleCommand::Preview { source, output } => self.preview(source, output).await,
            ConsoleCommand::Save(comment_id) => {
                self.save_comment(comment_id).await;
            }
            ConsoleCommand::Focus(path) => self.host.focus(path).await,
            ConsoleCommand::Sessions => self.list_sessions().await,
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    async fn open_toolbox(&self) {
        let Some(tool) = self.toolbox.pick(self.host.as_ref(), self.language).await else {
            return;
        };
        if let Some(entry) = self.toolbox.get_tool(tool.as_str()) {
            info!("Running tool {}", entry.name);
        }

        match tool {
            ToolId::PreviewBlocks => {
                let source = self.ask_for_file().await;
                self.preview(source, None).await;
            }
            ToolId::SendExtension => {
                let source = self.ask_for_file().await;
                self.send_extension(source).await;
            }
            ToolId::ServerManagement => self.server_menu().await,
            ToolId::SaveAndSendComment => {
                self.save_comment(None).await;
            }
        }
    }

    /// Use the active view, or ask for a path when there is none
    async fn ask_for_file(&self) -> Option<PathBuf> {
        if let Some(active) = self.host.active_view().await {
            return Some(active);
        }
        self.host
            .ask_text(self.language.text(Text::EnterFilePath))
            .await
            .map(PathBuf::from)
    }

    /// Start the hub, reporting the outcome; true when it is listening afterwards
    pub async fn start_server(&self) -> bool {
        match self.hub.start().await {
            Ok(StartOutcome::Started(address)) => {
                self.host.notify(
                    NotificationLevel::Info,
                    &self.language.format(
                        Text::ServerStarted,
                        &[("address", format!("ws://{}", address).as_str())],
                    ),
                );
                true
            }
            Ok(StartOutcome::AlreadyRunning(_)) => {
                self.host.notify(
                    NotificationLevel::Info,
                    self.language.text(Text::ServerAlreadyRunning),
                );
                true
            }
            Err(e) => {
                error!("Failed to start debug server: {}", e);
                self.host.notify(
                    NotificationLevel::Error,
                    &self
                        .language
                        .format(Text::StartServerError, &[("error", e.to_string().as_str())]),
                );
                false
            }
        }
    }

    pub async fn stop_server(&self) {
        match self.hub.stop().await {
            Ok(StopOutcome::NotRunning) => self.host.notify(
                NotificationLevel::Info,
                self.language.text(Text::ServerNotRunning),
            ),
            Ok(StopOutcome::Stopped { .. }) => self.host.notify(
                NotificationLevel::Info,
                self.language.text(Text::ServerStopped),
            ),
            Err(e) => {
                error!("Failed to stop debug server: {}", e);
                self.host.notify(NotificationLevel::Error, &e.to_string());
            }
        }
    }

    /// Status summary plus start/stop/send actions
    async fn server_menu(&self) {
        let status = self.hub.status().await;
        let running = status.address.is_some();

        let state = if running {
            self.language.text(Text::ServerRunning)
        } else {
            self.language.text(Text::ServerNotStarted)
        };
        let port = status
            .address
            .map(|address| {
                self.language.format(
                    Text::ServerMenuPort,
                    &[("port", address.port().to_string().as_str())],
                )
            })
            .unwrap_or_default();
        let connections_hint = if status.peers > 0 {
            Text::ServerMenuConnected
        } else {
            Text::ServerMenuWaiting
        };

        let mut items = vec![
            PickItem::new(
                self.language.format(Text::ServerMenuStatus, &[("status", state)]),
                port,
            ),
            PickItem::new(
                self.language.format(
                    Text::ServerMenuConnections,
                    &[("count", status.peers.to_string().as_str())],
                ),
                self.language.text(connections_hint),
            ),
        ];
        let mut actions = vec![None, None];

        if running {
            items.push(PickItem::new(self.language.text(Text::ServerMenuStop), ""));
            actions.push(Some(ConsoleCommand::Stop));
            items.push(PickItem::new(self.language.text(Text::ServerMenuSend), ""));
            actions.push(Some(ConsoleCommand::Send(None)));
        } else {
            items.push(PickItem::new(self.language.text(Text::ServerMenuStart), ""));
            actions.push(Some(ConsoleCommand::Start));
        }

        let Some(choice) = self
            .host
            .pick_item(self.language.text(Text::ServerMenuPlaceholder), &items)
            .await
        else {
            return;
        };

        match actions.into_iter().nth(choice).flatten() {
            Some(ConsoleCommand::Start) => {
                self.start_server().await;
            }
            Some(ConsoleCommand::Stop) => self.stop_server().await,
            Some(ConsoleCommand::Send(path)) => {
                self.send_extension(path).await;
            }
            _ => {}
        }
    }

    /// Push a file's source to every Engine GUI; the number reached, or `None` if not sent
    pub async fn send_extension(&self, path: Option<PathBuf>) -> Option<usize> {
        let path = match path {
            Some(path) => path,
            None => match self.host.active_view().await {
                Some(path) => path,
                None => {
                    self.host.notify(
                        NotificationLevel::Warning,
                        self.language.text(Text::NoFileOpen),
                    );
                    return None;
                }
            },
        };

        if !is_javascript(&path)
            && !self
                .host
                .confirm(
                    self.language.text(Text::NotJavaScriptFile),
                    self.language.text(Text::Yes),
                )
                .await
        {
            return None;
        }

        if !self.hub.is_running().await {
            let start = self
                .host
                .confirm(
                    self.language.text(Text::ServerNotRunningAsk),
                    self.language.text(Text::Start),
                )
                .await;
            if !start || !self.start_server().await {
                return None;
            }
            tokio::time::sleep(START_GRACE).await;
        }

        if self.hub.peers().is_empty().await {
            self.host.notify(
                NotificationLevel::Warning,
                self.language.text(Text::NoClients),
            );
            return None;
        }

        let code = match tokio::fs::read_to_string(&path).await {
            Ok(code) => code,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                self.host.notify(
                    NotificationLevel::Error,
                    &format!("Failed to read {}: {}", path.display(), e),
                );
                return None;
            }
        };

        match self.hub.broadcast_extension(&code).await {
            Ok(count) => {
                self.host.notify(
                    NotificationLevel::Info,
                    &self
                        .language
                        .format(Text::ExtensionSent, &[("count", count.to_string().as_str())]),
                );
                Some(count)
            }
            Err(e) => {
                error!("Failed to send extension: {}", e);
                self.host.notify(NotificationLevel::Error, &e.to_string());
                None
            }
        }
    }

    async fn preview(&self, source: Option<PathBuf>, output: Option<PathBuf>) {
        let source = match source {
            Some(source) => source,
            None => match self.host.active_view().await {
                Some(active) => active,
                None => {
                    self.host.notify(
                        NotificationLevel::Warning,
                        self.language.text(Text::NoFileOpen),
                    );
                    return;
                }
            },
        };
        let output = output.unwrap_or_else(|| default_output_path(&source));

        match render_file(&source, &output, self.language).await {
            Ok(_) => println!(
                "🧩 {}: {}",
                self.language.text(Text::PreviewHeading),
                output.display()
            ),
            Err(BridgeError::Extraction(reason)) => {
                debug!("Preview extraction failed: {}", reason);
                self.host.notify(
                    NotificationLevel::Error,
                    self.language.text(Text::ParseError),
                );
            }
            Err(e) => self.host.notify(NotificationLevel::Error, &e.to_string()),
        }
    }

    /// Save the named comment, or resolve which one the user means
    pub async fn save_comment(&self, comment_id: Option<String>) -> bool {
        let comment_id = match comment_id {
            Some(id) => id,
            None => {
                let active = self.host.active_view().await;
                match self.manager.resolve_save_target(active.as_deref()).await {
                    Some(id) => id,
                    None => return false,
                }
            }
        };

        match self.manager.save_and_close(&comment_id).await {
            Ok(delivery) => {
                info!("Comment {} saved: {:?}", comment_id, delivery);
                true
            }
            Err(e) => {
                // Already reported to the user by the manager
                debug!("Saving comment {} failed: {}", comment_id, e);
                false
            }
        }
    }

    async fn list_sessions(&self) {
        let sessions = self.manager.sessions().await;
        if sessions.is_empty() {
            println!("{}", self.language.text(Text::NoActiveCommentEditor));
            return;
        }

        let focused = self.manager.focused().await;
        for session in sessions {
            let marker = if focused.as_deref() == Some(session.comment_id.as_str()) {
                "*"
            } else {
                " "
            };
            println!(
                "{} {}  {}  {}",
                marker,
                session.comment_id,
                session.target_name,
                session.path.display()
            );
        }
    }
}

fn is_javascript(path: &Path) -> bool {
    matches!(
        path.extension().map(|ext| ext.to_string_lossy().to_lowercase()),
        Some(ext) if ext == "js" || ext == "mjs" || ext == "cjs"
    )
}
