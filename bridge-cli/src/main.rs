//! Engine bridge CLI - console front end for the Engine editor bridge

use clap::{Arg, ArgMatches, Command};
use engine_bridge_comments::{CommentSessionManager, CommentsPlugin};
use engine_bridge_core::{
    BridgeError, Config, ConfigLoadContext, EventBus, InMemoryEventBus, PluginContext,
    PluginRegistry, Result,
};
use engine_bridge_server::{ServerPlugin, SessionHub};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, Level};

mod console;
mod host;
mod preview;
mod status;
mod toolbox;

use console::Console;
use host::ConsoleHost;
use status::StatusLine;

const CONFIG_FILE_NAME: &str = "config.json";

/// Parsed command line
#[derive(Debug, Clone)]
pub struct Args {
    pub config_file: Option<PathBuf>,
    pub dev_mode: bool,
    pub overrides: HashMap<String, serde_json::Value>,
    pub command: CliCommand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Serve,
    Preview {
        source: PathBuf,
        output: Option<PathBuf>,
        watch: bool,
    },
    ValidateConfig,
}

fn cli() -> Command {
    Command::new("engine-bridge")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Bridge between your editor and running Engine GUIs")
        .long_about(
            "Engine bridge runs a local WebSocket debug server that Engine GUIs connect to. \
            It pushes extension code to connected GUIs, edits GUI comments as scratch files \
            and renders block previews of extension sources.",
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .global(true)
                .help("Path to configuration file (JSON format)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("language")
                .long("language")
                .global(true)
                .help("Display language: en or zh-cn")
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            Arg::new("dev-mode")
                .long("dev-mode")
                .global(true)
                .help("Enable debug logging with targets, files and line numbers")
                .action(clap::ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("serve")
                .about("Run the interactive console")
                .arg(
                    Arg::new("hostname")
                        .short('H')
                        .long("hostname")
                        .help("Hostname or IP address to bind the debug server to")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    Arg::new("port")
                        .short('p')
                        .long("port")
                        .help("Port for the debug server (default 1101)")
                        .value_parser(clap::value_parser!(u16)),
                )
                .arg(
                    Arg::new("auto-start")
                        .long("auto-start")
                        .help("Start the debug server immediately")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("kind")
                        .long("kind")
                        .help("Always edit comments as this file type (md or js)")
                        .value_parser(["md", "js"]),
                ),
        )
        .subcommand(
            Command::new("preview")
                .about("Render the blocks of an extension source to an HTML page")
                .arg(
                    Arg::new("file")
                        .help("Extension source file")
                        .required(true)
                        .index(1)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("Output HTML file (default: <file>.preview.html)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("watch")
                        .short('w')
                        .long("watch")
                        .help("Re-render whenever the source changes")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("validate-config")
                .about("Validate the configuration file and exit"),
        )
        .after_help(
            "EXAMPLES:\n    \
            engine-bridge serve                       Start the console\n    \
            engine-bridge serve -p 8080 --auto-start  Listen on port 8080 right away\n    \
            engine-bridge preview ext.js --watch      Keep ext.preview.html up to date\n    \
            engine-bridge validate-config -c my.json  Check a configuration file",
        )
}

impl Args {
    pub fn parse() -> Self {
        Self::from_matches(&cli().get_matches())
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        let mut overrides = HashMap::new();
        if let Some(language) = matches.get_one::<String>("language") {
            overrides.insert(
                "language".to_string(),
                serde_json::Value::String(language.clone()),
            );
        }

        let command = match matches.subcommand() {
            Some(("preview", sub)) => CliCommand::Preview {
                source: sub.get_one::<PathBuf>("file").cloned().unwrap_or_default(),
                output: sub.get_one::<PathBuf>("output").cloned(),
                watch: sub.get_flag("watch"),
            },
            Some(("validate-config", _)) => CliCommand::ValidateConfig,
            Some(("serve", sub)) => {
                if let Some(hostname) = sub.get_one::<String>("hostname") {
                    overrides.insert(
                        "server.hostname".to_string(),
                        serde_json::Value::String(hostname.clone()),
                    );
                }
                if let Some(port) = sub.get_one::<u16>("port") {
                    overrides.insert("server.port".to_string(), serde_json::Value::from(*port));
                }
                if sub.get_flag("auto-start") {
                    overrides.insert(
                        "server.auto_start".to_string(),
                        serde_json::Value::Bool(true),
                    );
                }
                if let Some(kind) = sub.get_one::<String>("kind") {
                    overrides.insert(
                        "comments.default_kind".to_string(),
                        serde_json::Value::String(kind.clone()),
                    );
                }
                CliCommand::Serve
            }
            _ => CliCommand::Serve,
        };

        Self {
            config_file: matches.get_one::<PathBuf>("config").cloned(),
            dev_mode: matches.get_flag("dev-mode"),
            overrides,
            command,
        }
    }

    /// Config file named on the command line, or the per-user default
    fn config_path(&self) -> Option<PathBuf> {
        self.config_file.clone().or_else(|| {
            dirs::config_dir().map(|dir| dir.join("engine-bridge").join(CONFIG_FILE_NAME))
        })
    }

    /// File, then `ENGINE_BRIDGE_*` variables, then command line flags
    pub fn load_config(&self) -> Result<Config> {
        if let Some(config_file) = &self.config_file {
            if !config_file.exists() {
                return Err(BridgeError::config(format!(
                    "Configuration file not found: {}\n\n\
                    Example: engine-bridge serve --config config.json",
                    config_file.display()
                )));
            }
        }

        let context = ConfigLoadContext {
            base_path: self.config_path(),
            cli_overrides: self.overrides.clone(),
            ..ConfigLoadContext::default()
        }
        .with_process_environment();

        Config::load_with_context(&context)
    }
}

fn init_logging(dev_mode: bool) {
    let log_level = if dev_mode { Level::DEBUG } else { Level::INFO };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(dev_mode)
        .with_line_number(dev_mode)
        .with_file(dev_mode);

    if dev_mode {
        subscriber.with_ansi(true).pretty().init();
        info!("🔧 Development mode enabled");
    } else {
        subscriber.with_ansi(true).init();
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
            println!("\n🛑 Shutting down gracefully...");
        }
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

async fn serve(args: &Args) -> Result<()> {
    let config = Arc::new(args.load_config()?);
    let language = config.language();

    let event_bus: Arc<dyn EventBus> = Arc::new(InMemoryEventBus::new());
    event_bus
        .subscribe_system_events(Arc::new(StatusLine::new(language)))
        .await?;

    let host = Arc::new(ConsoleHost::new(language, config.comments.default_kind));
    let hub = Arc::new(SessionHub::new(config.server.clone(), event_bus.clone()));
    let manager = CommentSessionManager::new(host.clone(), config.scratch_dir(), language);
    hub.set_comment_delegate(manager.clone()).await;

    let context = PluginContext::new(event_bus.clone(), config.clone());
    let mut plugins = PluginRegistry::new();
    plugins
        .register_plugin(Box::new(ServerPlugin::new(hub.clone())), &context)
        .await?;
    plugins
        .register_plugin(Box::new(CommentsPlugin::new(manager.clone())), &context)
        .await?;

    println!("🌟 Engine Bridge");
    println!("📁 Comment scratch files: {}", config.scratch_dir().display());
    match hub.local_addr().await {
        Some(address) => println!("🌐 Debug server: ws://{}", address),
        None => println!(
            "🌐 Debug server: stopped (type `start` to listen on {})",
            config.server.bind_address()
        ),
    }
    println!("\n✨ Ready! Type `help` for commands, Ctrl+C to exit.\n");

    let console = Console::new(language, host.clone(), hub.clone(), manager.clone());
    tokio::select! {
        _ = console.run(tokio::io::BufReader::new(tokio::io::stdin())) => {
            info!("Console closed");
        }
        _ = shutdown_signal() => {
            info!("Initiating graceful shutdown...");
        }
    }

    host.cancel_prompt().await;
    // Comments plugin first: sessions close before the hub drops its peers
    plugins.shutdown().await?;
    manager.close_all().await;

    println!("✅ Engine bridge shutdown complete");
    Ok(())
}

async fn run_preview(
    args: &Args,
    source: &Path,
    output: Option<PathBuf>,
    watch: bool,
) -> Result<()> {
    let config = args.load_config()?;
    let language = config.language();
    let output = output.unwrap_or_else(|| preview::default_output_path(source));

    let count = preview::render_file(source, &output, language).await?;
    println!("🧩 {} blocks rendered to {}", count, output.display());

    if watch {
        println!("👀 Watching {} (Ctrl+C to stop)", source.display());
        tokio::select! {
            _ = preview::watch(source.to_path_buf(), output, language, Duration::from_secs(1)) => {}
            _ = shutdown_signal() => {}
        }
    }
    Ok(())
}

fn validate_config(args: &Args) -> Result<()> {
    let Some(path) = args.config_path() else {
        return Err(BridgeError::config(
            "No configuration file given and no default location available",
        ));
    };

    println!("🔍 Validating configuration: {}", path.display());
    let config = if path.exists() {
        Config::from_file(&path)?
    } else {
        println!("ℹ️  {} does not exist, checking defaults", path.display());
        Config::new()
    };
    config.validate()?;

    println!("✅ Configuration is valid!");
    println!("   Server: {}", config.server.bind_address());
    println!("   Auto start: {}", config.server.auto_start);
    println!("   Scratch directory: {}", config.scratch_dir().display());
    println!("   Language: {}", config.language());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.dev_mode);

    let outcome = match &args.command {
        CliCommand::Serve => serve(&args).await,
        CliCommand::Preview {
            source,
            output,
            watch,
        } => run_preview(&args, source, output.clone(), *watch).await,
        CliCommand::ValidateConfig => validate_config(&args),
    };

    if let Err(e) = outcome {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    // The blocking stdin reader cannot be cancelled; don't wait for it
    std::process::exit(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::from_matches(&cli().try_get_matches_from(argv).unwrap())
    }

    #[test]
    fn test_cli_definition() {
        cli().debug_assert();
    }

    #[test]
    fn test_serve_flags_become_overrides() {
        let args = parse(&[
            "engine-bridge",
            "serve",
            "-p",
            "8080",
            "--auto-start",
            "--kind",
            "js",
            "--language",
            "zh-cn",
        ]);
        assert_eq!(args.command, CliCommand::Serve);
        assert_eq!(args.overrides["server.port"], serde_json::json!(8080));
        assert_eq!(args.overrides["server.auto_start"], serde_json::json!(true));
        assert_eq!(args.overrides["comments.default_kind"], serde_json::json!("js"));
        assert_eq!(args.overrides["language"], serde_json::json!("zh-cn"));
    }

    #[test]
    fn test_preview_arguments() {
        let args = parse(&["engine-bridge", "preview", "ext.js", "--watch"]);
        assert_eq!(
            args.command,
            CliCommand::Preview {
                source: PathBuf::from("ext.js"),
                output: None,
                watch: true,
            }
        );
        assert!(args.overrides.is_empty());
    }

    #[test]
    fn test_overrides_apply_over_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let mut config = Config::new();
        config.server.port = 4000;
        config.save_to_file(&path).unwrap();

        let args = parse(&[
            "engine-bridge",
            "serve",
            "--config",
            path.to_str().unwrap(),
            "-H",
            "0.0.0.0",
        ]);
        let loaded = args.load_config().unwrap();
        assert_eq!(loaded.server.hostname, "0.0.0.0");
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let args = parse(&["engine-bridge", "serve", "--config", "/nonexistent/bridge.json"]);
        assert!(matches!(args.load_config(), Err(BridgeError::Config(_))));
    }
}
