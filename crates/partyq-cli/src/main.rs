//! partyq command-line client
//!
//! Talks to a running `partyq-daemon` over TCP. Every event the daemon pushes
//! is printed to stdout as one JSON line.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use partyq_rpc::{ClientAction, PartyClient, ServerEvent, SongInfo};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const VOTE_LIST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "partyq")]
#[command(about = "partyq listening-party client")]
#[command(version)]
#[command(after_help = "\
Examples:
  partyq host --name Ada                   Open a session and print its code
  partyq join 123456 --name Bob            Join a session as a guest
  partyq vote 123456 --uri spotify:track:1 Toggle a vote for a song
  partyq watch 123456                      Follow a session without joining
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Connection {
    /// Daemon address
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: String,

    /// User id to act as (random when omitted)
    #[arg(long)]
    user_id: Option<String>,
}

impl Connection {
    fn user_id(&self) -> String {
        self.user_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }

    async fn connect(&self) -> Result<PartyClient> {
        PartyClient::connect(&self.addr)
            .await
            .with_context(|| format!("Failed to connect to daemon at {}", self.addr))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a session and stay connected as its host
    Host {
        /// Display name
        #[arg(long)]
        name: String,

        #[command(flatten)]
        conn: Connection,
    },

    /// Join a session as a guest
    Join {
        /// Six-digit session code
        code: String,

        /// Display name
        #[arg(long)]
        name: String,

        #[command(flatten)]
        conn: Connection,
    },

    /// Toggle a vote for a song and print the resulting vote list
    Vote {
        /// Six-digit session code
        code: String,

        /// Song URI
        #[arg(long)]
        uri: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        artist: Option<String>,

        #[command(flatten)]
        conn: Connection,
    },

    /// Follow a session's events without becoming a participant
    Watch {
        /// Six-digit session code
        code: String,

        #[command(flatten)]
        conn: Connection,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Host { name, conn } => run_host(name, &conn).await,
        Commands::Join { code, name, conn } => run_join(code, name, &conn).await,
        Commands::Vote {
            code,
            uri,
            title,
            artist,
            conn,
        } => run_vote(code, song_info(uri, title, artist), &conn).await,
        Commands::Watch { code, conn } => run_watch(code, &conn).await,
    }
}

fn song_info(uri: String, title: Option<String>, artist: Option<String>) -> SongInfo {
    let mut song = SongInfo::new(uri);
    if let Some(title) = title {
        song = song.with_name(title);
    }
    if let Some(artist) = artist {
        song = song.with_artist(artist);
    }
    song
}

fn print_event(event: &ServerEvent) -> Result<()> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}

async fn run_host(name: String, conn: &Connection) -> Result<()> {
    let user_id = conn.user_id();
    let mut client = conn.connect().await?;

    client
        .request_action(&ClientAction::CreateServer {
            username: name,
            user_id: user_id.clone(),
        })
        .await
        .context("createServer failed")?;

    let code = loop {
        match client.next_event().await {
            Some(ServerEvent::ServerCreated { server_code }) => break server_code,
            Some(ServerEvent::JoinError { message }) => bail!("Could not create session: {message}"),
            Some(other) => print_event(&other)?,
            None => bail!("Daemon closed the connection"),
        }
    };
    eprintln!("Session code: {code}");

    follow_with_heartbeat(&mut client, &code, &user_id).await
}

async fn run_join(code: String, name: String, conn: &Connection) -> Result<()> {
    let user_id = conn.user_id();
    let mut client = conn.connect().await?;

    client
        .request_action(&ClientAction::JoinServer {
            server_code: code.clone(),
            username: name,
            user_id: user_id.clone(),
        })
        .await
        .context("joinServer failed")?;

    follow_with_heartbeat(&mut client, &code, &user_id).await
}

async fn run_vote(code: String, song: SongInfo, conn: &Connection) -> Result<()> {
    let user_id = conn.user_id();
    let mut client = conn.connect().await?;

    // Vote list updates only reach group members
    client
        .request_action(&ClientAction::JoinServerCode {
            server_code: code.clone(),
        })
        .await
        .context("joinServerCode failed")?;
    client
        .request_action(&ClientAction::VotingSong {
            server_code: code,
            song_info: song,
            user_id,
        })
        .await
        .context("votingSong failed")?;

    let votes = tokio::time::timeout(VOTE_LIST_TIMEOUT, async {
        while let Some(event) = client.next_event().await {
            if let ServerEvent::UpdateVoteList { votes } = event {
                return Some(votes);
            }
        }
        None
    })
    .await
    .context("No vote list received; is the session code live?")?
    .context("Daemon closed the connection")?;

    println!("{}", serde_json::to_string_pretty(&votes)?);
    Ok(())
}

async fn run_watch(code: String, conn: &Connection) -> Result<()> {
    let mut client = conn.connect().await?;
    client
        .request_action(&ClientAction::JoinServerCode {
            server_code: code,
        })
        .await
        .context("joinServerCode failed")?;

    while let Some(event) = client.next_event().await {
        print_event(&event)?;
    }
    Ok(())
}

/// Print events until the session ends, heartbeating every 30 seconds.
async fn follow_with_heartbeat(client: &mut PartyClient, code: &str, user_id: &str) -> Result<()> {
    let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
    ticker.tick().await;

    loop {
        tokio::select! {
            event = client.next_event() => {
                let Some(event) = event else {
                    bail!("Daemon closed the connection");
                };
                print_event(&event)?;
                if is_terminal(&event) {
                    return Ok(());
                }
            }
            _ = ticker.tick() => {
                debug!(code, user_id, "Sending heartbeat");
                client
                    .send_action(&ClientAction::Heartbeat {
                        server_code: code.to_string(),
                        user_id: user_id.to_string(),
                    })
                    .await
                    .context("Failed to send heartbeat")?;
            }
        }
    }
}

/// Events after which this client is no longer part of the session.
fn is_terminal(event: &ServerEvent) -> bool {
    matches!(
        event,
        ServerEvent::HostLeft { .. }
            | ServerEvent::HostTimedOut { .. }
            | ServerEvent::ServerFull
            | ServerEvent::JoinError { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_args() {
        let cli = Cli::try_parse_from([
            "partyq", "vote", "123456", "--uri", "spotify:1", "--title", "One", "--user-id", "u1",
        ])
        .unwrap();
        let Commands::Vote {
            code,
            uri,
            title,
            artist,
            conn,
        } = cli.command
        else {
            panic!("expected vote");
        };
        assert_eq!(code, "123456");
        assert_eq!(conn.addr, "127.0.0.1:3000");
        assert_eq!(conn.user_id(), "u1");
        assert_eq!(
            song_info(uri, title, artist),
            SongInfo::new("spotify:1").with_name("One")
        );
    }

    #[test]
    fn test_random_user_id() {
        let cli = Cli::try_parse_from(["partyq", "watch", "123456"]).unwrap();
        let Commands::Watch { conn, .. } = cli.command else {
            panic!("expected watch");
        };
        assert_ne!(conn.user_id(), conn.user_id());
    }

    #[test]
    fn test_host_requires_name() {
        assert!(Cli::try_parse_from(["partyq", "host"]).is_err());
    }

    #[test]
    fn test_terminal_events() {
        assert!(is_terminal(&ServerEvent::ServerFull));
        assert!(!is_terminal(&ServerEvent::UserJoined {
            user_id: "u2".into()
        }));
    }
}
