//! Leaderboard TCP service
//!
//! One task per connection. A connection sends any number of `Submit` and
//! `Top` requests, each answered with one reply. `Subscribe` turns it into a
//! feed: the current top list, then every accepted score as it arrives,
//! until the client hangs up.

use crate::leaderboard::{now_ms, Leaderboard};
use crate::protocol::{
    read_message, write_message, ClientMessage, ProtocolError, ScoreEntry, ServerMessage,
    DEFAULT_TOP_LIMIT,
};
use crate::settings::DEFAULT_SERVER;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, oneshot, Mutex};
use tracing::{debug, info, warn};

/// How many new scores a slow subscriber may fall behind before it gets a full refresh
const FEED_CAPACITY: usize = 64;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// JSON store, memory-only when None
    pub store: Option<PathBuf>,
    /// Top-N size for queries that don't give one
    pub default_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_SERVER.to_string(),
            store: None,
            default_limit: DEFAULT_TOP_LIMIT,
        }
    }
}

struct ServerState {
    board: Mutex<Leaderboard>,
    feed: broadcast::Sender<ScoreEntry>,
    default_limit: usize,
}

/// Serve until the listener fails. `ready_tx` receives the bound address once
/// the socket is listening.
pub async fn run_server(
    config: ServerConfig,
    ready_tx: Option<oneshot::Sender<SocketAddr>>,
) -> anyhow::Result<()> {
    let board = match &config.store {
        Some(path) => Leaderboard::open(path)?,
        None => Leaderboard::in_memory(),
    };
    if board.is_empty() {
        info!(store = ?config.store, "starting with an empty leaderboard");
    } else {
        info!(entries = board.len(), store = ?config.store, "leaderboard loaded");
    }

    let listener = TcpListener::bind(&config.bind).await?;
    let bound = listener.local_addr()?;
    info!(%bound, "leaderboard listening");
    if let Some(tx) = ready_tx {
        let _ = tx.send(bound);
    }

    let (feed, _) = broadcast::channel(FEED_CAPACITY);
    let state = Arc::new(ServerState {
        board: Mutex::new(board),
        feed,
        default_limit: config.default_limit.min(DEFAULT_TOP_LIMIT),
    });

    loop {
        let (socket, addr) = listener.accept().await?;
        debug!(%addr, "client connected");

        let state = Arc::clone(&state);
        tokio::spawn(async move {
            match handle_client(socket, &state).await {
                Ok(()) | Err(ProtocolError::Closed) => debug!(%addr, "client disconnected"),
                Err(e) => warn!(%addr, error = %e, "client error"),
            }
        });
    }
}

async fn handle_client(socket: TcpStream, state: &ServerState) -> Result<(), ProtocolError> {
    let (mut reader, mut writer) = socket.into_split();

    loop {
        let msg = match read_message::<_, ClientMessage>(&mut reader).await {
            Ok(msg) => msg,
            Err(ProtocolError::Json(e)) => {
                let reason = format!("malformed request: {e}");
                write_message(&mut writer, &ServerMessage::Rejected { reason }).await?;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match msg {
            ClientMessage::Submit(record) => {
                let entry = {
                    let mut board = state.board.lock().await;
                    let entry = board.insert(record, now_ms());
                    if let Err(e) = board.save() {
                        warn!(error = %e, "failed to persist leaderboard");
                    }
                    entry
                };
                info!(id = entry.id, name = %entry.name, score = entry.score, "score accepted");
                write_message(&mut writer, &ServerMessage::Accepted { id: entry.id }).await?;
                // No subscribers is fine
                let _ = state.feed.send(entry);
            }
            ClientMessage::Top { limit } => {
                let entries = top(state, limit).await;
                write_message(&mut writer, &ServerMessage::Leaderboard { entries }).await?;
            }
            ClientMessage::Subscribe => {
                return stream_scores(reader, writer, state).await;
            }
        }
    }
}

async fn top(state: &ServerState, limit: Option<usize>) -> Vec<ScoreEntry> {
    let limit = limit.unwrap_or(state.default_limit);
    state.board.lock().await.top(Some(limit))
}

/// Push the current top list and then every new score until the client leaves
async fn stream_scores<W: AsyncWriteExt + Unpin>(
    mut reader: OwnedReadHalf,
    mut writer: W,
    state: &ServerState,
) -> Result<(), ProtocolError> {
    // Subscribe before the snapshot so nothing accepted in between is missed
    let mut feed = state.feed.subscribe();
    let entries = top(state, None).await;
    write_message(&mut writer, &ServerMessage::Leaderboard { entries }).await?;

    loop {
        tokio::select! {
            received = feed.recv() => match received {
                Ok(entry) => {
                    write_message(&mut writer, &ServerMessage::NewScore { entry }).await?;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "subscriber lagged, resending top list");
                    let entries = top(state, None).await;
                    write_message(&mut writer, &ServerMessage::Leaderboard { entries }).await?;
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
            // Subscribers only listen; anything they send, or EOF, ends the feed
            _ = read_message::<_, ClientMessage>(&mut reader) => return Ok(()),
        }
    }
}
