use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod console;

use commands::{
    ApplyCommand, ConfigCommand, CreateCommand, FetchCommand, InboxCommand, LinkCommand,
    ProjectsCommand, PullCommand, PushCommand, WatchCommand,
};
use config::Config;
use console::{ConsoleProgress, TerminalPrompter};
use ol_sync_core::{AuthOptions, EngineConfig, SyncEngine};

#[derive(Parser)]
#[command(name = "ol-sync")]
#[command(version)]
#[command(
    about = "Keep a local directory in step with a project on an Overleaf server",
    long_about = None
)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    server: ServerArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Options every command understands
#[derive(Args)]
struct ServerArgs {
    /// Overleaf base URL
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,

    /// Docker container running MongoDB
    #[arg(long, global = true, value_name = "NAME")]
    mongo_container: Option<String>,

    /// Docker container running the web app
    #[arg(long, global = true, value_name = "NAME")]
    container: Option<String>,

    /// Login email (or OVERLEAF_SYNC_EMAIL)
    #[arg(long, global = true)]
    email: Option<String>,

    /// Login password (or OVERLEAF_SYNC_PASSWORD)
    #[arg(long, global = true)]
    password: Option<String>,

    /// Neither read nor write the session cache
    #[arg(long, global = true)]
    no_session_cache: bool,

    /// Session cache file
    #[arg(long, global = true, value_name = "PATH")]
    session_path: Option<PathBuf>,

    /// Log diagnostics to stderr
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List projects visible to the account
    Projects(ProjectsCommand),

    /// Bind a directory to an existing project
    Link(LinkCommand),

    /// Create a remote project and bind a directory to it
    Create(CreateCommand),

    /// Download a project into an empty directory
    Pull(PullCommand),

    /// Stage remote changes in the inbox without touching the directory
    Fetch(FetchCommand),

    /// Copy a staged inbox batch into the directory
    Apply(ApplyCommand),

    /// Upload every local file
    Push(PushCommand),

    /// Upload files as they change
    Watch(WatchCommand),

    /// List or prune staged inbox batches
    Inbox(InboxCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.server.debug);

    let mut config = Config::load(cli.config)?;
    config.base_url.override_with(cli.server.base_url.clone());
    config.mongo_container.override_with(cli.server.mongo_container.clone());
    config.container.override_with(cli.server.container.clone());
    config.session_path.override_with(cli.server.session_path.clone());

    let server = &cli.server;
    match cli.command {
        Some(Commands::Projects(cmd)) => {
            cmd.run(&build_engine(&config, server, cmd.json)).await?;
        }
        Some(Commands::Link(cmd)) => {
            cmd.run(&build_engine(&config, server, false)).await?;
        }
        Some(Commands::Create(cmd)) => {
            cmd.run(&build_engine(&config, server, false)).await?;
        }
        Some(Commands::Pull(cmd)) => {
            cmd.run(&build_engine(&config, server, false)).await?;
        }
        Some(Commands::Fetch(cmd)) => {
            cmd.run(&build_engine(&config, server, cmd.json)).await?;
        }
        Some(Commands::Apply(cmd)) => {
            cmd.run(&build_engine(&config, server, false))?;
        }
        Some(Commands::Push(cmd)) => {
            cmd.run(&build_engine(&config, server, false)).await?;
        }
        Some(Commands::Watch(cmd)) => {
            cmd.run(&build_engine(&config, server, false)).await?;
        }
        Some(Commands::Inbox(cmd)) => {
            cmd.run(&build_engine(&config, server, cmd.json))?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}

fn init_tracing(debug: bool) {
    let default_filter = if debug {
        "ol_sync=debug,ol_sync_core=debug"
    } else {
        "warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_engine(config: &Config, server: &ServerArgs, json: bool) -> SyncEngine {
    let auth = AuthOptions {
        email: server.email.clone(),
        password: server.password.clone(),
        no_session_cache: server.no_session_cache,
        session_path: config.session_path.value.clone(),
    };
    let mut engine_config = EngineConfig::new(config.data_dir.value.clone(), auth);
    engine_config.base_url = config.base_url.value.clone();
    engine_config.mongo_container = config.mongo_container.value.clone();
    engine_config.container = config.container.value.clone();
    engine_config.concurrency = config.concurrency.value.max(1);

    SyncEngine::new(engine_config)
        .with_prompter(Arc::new(TerminalPrompter))
        .with_progress(Arc::new(ConsoleProgress::new(json)))
}
