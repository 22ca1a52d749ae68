use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

mod app;
mod cli;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use ragchat_core::{Config, FileStore, KeyValueStore, MemoryStore, RagClient, Workspace};
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "ragchat", version)]
#[command(about = "Chat with your documents through a RAG backend")]
struct Cli {
    /// Backend base URL
    #[arg(long, global = true, env = "RAGCHAT_SERVER_URL")]
    server: Option<String>,

    /// Where chat history, preferences and logs are stored
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Keep chats and preferences in memory for this session only
    #[arg(long, global = true)]
    no_persist: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question
    Ask {
        /// Your question
        question: String,
        /// Model to use (defaults to the saved selection)
        #[arg(short, long)]
        model: Option<String>,
    },
    /// List models offered by the backend
    Models,
    /// Show knowledge-base statistics
    Documents,
    /// Add a PDF, TXT or MD file to the knowledge base
    Upload {
        path: PathBuf,
    },
    /// Remove every document from the knowledge base
    ClearDocuments {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show the settings in effect
    Config {
        /// Write them to the config file
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "Ignoring unreadable config".yellow(), e);
            Config::new()
        }
    }
    .with_env_overrides();
    if let Some(server) = cli.server {
        config.server_url = server;
    }
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }

    let client = RagClient::new(&config.server_url, config.request_timeout())?;

    match cli.command {
        None => run_tui(&config, client, cli.no_persist).await,
        Some(command) => {
            logging::init_stderr(&config.log_level);
            match command {
                Commands::Ask { question, model } => {
                    let store = open_store(&config, cli.no_persist)?;
                    cli::ask(&client, store.as_ref(), &question, model).await
                }
                Commands::Models => {
                    let store = open_store(&config, cli.no_persist)?;
                    cli::list_models(&client, store.as_ref()).await
                }
                Commands::Documents => cli::list_documents(&client).await,
                Commands::Upload { path } => cli::upload(&client, &path).await,
                Commands::ClearDocuments { yes } => cli::clear_documents(&client, yes).await,
                Commands::Config { save } => cli::show_config(&config, save),
            }
        }
    }
}

fn open_store(config: &Config, no_persist: bool) -> Result<Box<dyn KeyValueStore>> {
    if no_persist {
        return Ok(Box::new(MemoryStore::new()));
    }
    let dir = config.resolve_data_dir()?;
    Ok(Box::new(FileStore::new(dir)?))
}

async fn run_tui(config: &Config, client: RagClient, no_persist: bool) -> Result<()> {
    let data_dir = config.resolve_data_dir()?;
    let _log_guard = logging::init_file(&config.log_level, &data_dir.join("logs"))?;
    tracing::info!(server = %config.server_url, no_persist, "starting ragchat");

    let workspace = Workspace::load(open_store(config, no_persist)?);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let mut app = App::new(workspace, client, events.sender());
    app.refresh_models();
    app.refresh_documents();

    let result = run_loop(&mut terminal, &mut app, &mut events).await;

    app.shutdown();
    tui::restore()?;
    tracing::info!("ragchat exited");
    result
}

async fn run_loop(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
    }
    Ok(())
}
