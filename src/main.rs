use std::io::{self, IsTerminal};
use std::sync::Arc;

use chatroom::app::{AppCommand, ChatApp};
use chatroom::config::{ChatConfig, override_file_path, persist_backend_override};
use chatroom::error::ChatError;
use chatroom::models::Room;
use chatroom::net::api::{HistorySource, RestHistory, fetch_health, health_summary};
use chatroom::net::ws::StompWsConnector;
use chatroom::pipeline::sort_history;
use chatroom::state::surface::{RenderedMessage, SurfaceHandle};
use chatroom::terminal::{HELP_TEXT, InputLine, TerminalView, format_message_line, parse_input_line};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error("i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("chat client stopped unexpectedly")]
    ClientGone,
}

#[derive(Parser, Debug)]
#[command(name = "chatroom", about = "Terminal chat room client over STOMP/WebSocket")]
struct Cli {
    /// Backend base URL, e.g. http://localhost:8080.
    #[arg(long, env = "CHAT_BACKEND_URL")]
    backend_url: Option<String>,

    /// Remember the resolved backend URL for later local runs.
    #[arg(long)]
    persist_backend: bool,

    /// Disable ANSI colours.
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the backend health endpoint.
    Ping,
    /// Print the stored history for a room and exit.
    History {
        #[arg(long, default_value = "general")]
        room: Room,
    },
    /// Join the chat and read messages from stdin.
    Join {
        username: String,
        #[arg(long, default_value = "general")]
        room: Room,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let env_loaded = dotenvy::dotenv().is_ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();
    debug!(env_loaded, "environment loaded");

    let cli = Cli::parse();
    let config = ChatConfig::from_env(cli.backend_url.clone());
    info!(backend = %config.backend_url, "backend resolved");

    if cli.persist_backend {
        let path = override_file_path();
        persist_backend_override(&path, &config.backend_url)?;
        info!(path = %path.display(), "backend override saved");
    }

    let color = !cli.no_color && io::stdout().is_terminal();
    match cli.command {
        Command::Ping => run_ping(&config).await,
        Command::History { room } => run_history(&config, room, color).await,
        Command::Join { username, room } => run_join(&config, username, room, color).await,
    }
}

async fn run_ping(config: &ChatConfig) -> Result<(), CliError> {
    let health = fetch_health(config).await?;
    println!("{}", health_summary(&health));
    Ok(())
}

async fn run_history(config: &ChatConfig, room: Room, color: bool) -> Result<(), CliError> {
    let history = RestHistory::new(config)?;
    let mut messages = history.fetch_messages(room).await?;
    if config.filter_history_by_room {
        messages.retain(|m| m.room_id == Some(room.id()));
    }
    sort_history(&mut messages);
    for message in messages {
        println!("{}", format_message_line(&RenderedMessage { message, own: false, live: false }, color));
    }
    Ok(())
}

async fn run_join(config: &ChatConfig, username: String, room: Room, color: bool) -> Result<(), CliError> {
    let surface = SurfaceHandle::new(TerminalView::new(io::stdout(), color));
    let app = ChatApp::new(
        config,
        Arc::new(StompWsConnector),
        Arc::new(RestHistory::new(config)?),
        surface.clone(),
    )?;

    let (tx, rx) = mpsc::channel(64);
    let client = tokio::spawn(app.run(rx));

    send(&tx, AppCommand::Join(username)).await?;
    if room != Room::default() {
        send(&tx, AppCommand::SwitchRoom(room)).await?;
    }
    println!("{HELP_TEXT}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_input_line(&line) {
            Ok(InputLine::Message(text)) => send(&tx, AppCommand::Send(text)).await?,
            Ok(InputLine::Room(room)) => send(&tx, AppCommand::SwitchRoom(room)).await?,
            Ok(InputLine::Refresh) => send(&tx, AppCommand::Refresh).await?,
            Ok(InputLine::Users) => {
                let users = surface.snapshot().online_users;
                let listed: Vec<_> = users.into_iter().collect();
                println!("Online ({}): {}", listed.len(), listed.join(", "));
            }
            Ok(InputLine::Status) => {
                let (reply, status) = oneshot::channel();
                send(&tx, AppCommand::Status(reply)).await?;
                let info = status.await.map_err(|_| CliError::ClientGone)?;
                println!(
                    "{} in #{} | {} | reconnect attempts: {}",
                    info.username,
                    info.room,
                    info.state.label(),
                    info.reconnect_attempts
                );
            }
            Ok(InputLine::Help) => println!("{HELP_TEXT}"),
            Ok(InputLine::Quit) => break,
            Ok(InputLine::Empty) => {}
            Err(e) => println!("{e}"),
        }
    }

    send(&tx, AppCommand::Shutdown).await?;
    client.await.map_err(|_| CliError::ClientGone)?;
    Ok(())
}

async fn send(tx: &mpsc::Sender<AppCommand>, command: AppCommand) -> Result<(), CliError> {
    tx.send(command).await.map_err(|_| CliError::ClientGone)
}
