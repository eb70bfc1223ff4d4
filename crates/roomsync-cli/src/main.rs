//! Roomsync terminal client.
//!
//! Reads lines from stdin and writes the active room's log to stdout. Plain
//! lines are posted to the active room; lines starting with `/` are commands
//! (`/join <room>`, `/leave`, `/reload`, `/react <id> <emoji>`, `/read <id>`, `/quit`).
//!
//! # Usage
//!
//! ```bash
//! ROOMSYNC_TOKEN=... roomsync --user alice --room general
//!
//! # Against a remote deployment
//! roomsync --url wss://chat.example.com/ws --api-url https://chat.example.com \
//!     --token "$TOKEN" --user alice
//! ```

mod command;
mod render;

use std::{
    io::{self, Write},
    sync::Arc,
};

use clap::Parser;
use command::{Command, ParseError};
use roomsync_client::{
    ChatView, ClientConfig, ClientError, HttpRoomApi, SyncClient, SystemEnv, WsConnector,
};
use roomsync_core::{ConnectionConfig, EventKind, HandlerError};
use roomsync_proto::RoomId;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Roomsync terminal client
#[derive(Parser, Debug)]
#[command(name = "roomsync")]
#[command(about = "Line-oriented client for Roomsync chat servers")]
#[command(version)]
struct Args {
    /// Socket endpoint
    #[arg(long, env = "ROOMSYNC_URL", default_value = roomsync_core::connection::DEFAULT_URL)]
    url: String,

    /// Base URL of the REST API
    #[arg(long, env = "ROOMSYNC_API_URL", default_value = "http://localhost:8000")]
    api_url: String,

    /// Access token used for both the socket and the REST API
    #[arg(short, long, env = "ROOMSYNC_TOKEN", hide_env_values = true)]
    token: String,

    /// Display name of the local user
    #[arg(short, long, env = "ROOMSYNC_USER")]
    user: String,

    /// Room to select after connecting
    #[arg(short, long)]
    room: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),
}

fn print_line(line: &str) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{line}")
}

fn subscribe(client: &SyncClient) {
    let kinds = [
        EventKind::UserJoined,
        EventKind::UserLeft,
        EventKind::Connected,
        EventKind::Disconnected,
        EventKind::DisconnectedPermanent,
    ];
    for kind in kinds {
        client.on(kind, |event| {
            let Some(line) = render::event(event) else {
                return Ok(());
            };
            print_line(&line).map_err(|e| HandlerError::new(e.to_string()))
        });
    }
}

fn show_changes(previous: &ChatView, current: &ChatView) -> io::Result<()> {
    render::changes(previous, current).iter().try_for_each(|line| print_line(line))
}

async fn handle_line(client: &SyncClient, line: &str) -> Result<bool, CliError> {
    let command = match Command::parse(line) {
        Ok(command) => command,
        Err(ParseError::Empty) => return Ok(true),
        Err(error) => {
            print_line(&format!("* {error}"))?;
            return Ok(true);
        },
    };

    match command {
        Command::Join(room) => client.select_room(room).await?,
        Command::Leave => client.clear_room().await?,
        Command::Reload => client.reload().await?,
        Command::React(id, emoji) => client.react(id, emoji).await?,
        Command::Read(id) => client.mark_read(id).await?,
        Command::Quit => return Ok(false),
        Command::Say(text) => {
            match client.submit(text).await {
                Ok(_) => {},
                Err(ClientError::NoActiveRoom) => print_line("* /join a room first")?,
                Err(ClientError::Api(error)) => print_line(&format!("* not sent: {error}"))?,
                Err(error) => return Err(error.into()),
            }
        },
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let config = ClientConfig {
        connection: ConnectionConfig { url: args.url, ..ConnectionConfig::default() },
        ..ClientConfig::for_user(args.user)
    };
    let api = Arc::new(HttpRoomApi::new(args.api_url, args.token.clone()));
    let (client, task) = SyncClient::spawn(config, WsConnector::new(), api, SystemEnv::new());

    subscribe(&client);
    client.connect(args.token).await?;
    if let Some(room) = args.room {
        client.select_room(RoomId::parse(&room)).await?;
    }

    let mut views = client.watch();
    let mut previous = views.borrow_and_update().clone();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    if !handle_line(&client, &line).await? {
                        break;
                    }
                },
                None => break,
            },
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = views.borrow_and_update().clone();
                show_changes(&previous, &current)?;
                previous = current;
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.shutdown().await?;
    if let Err(error) = task.await {
        tracing::error!(%error, "sync runtime panicked");
    }
    Ok(())
}
