//! Leaderboard client
//!
//! The game loop is synchronous, so the client hands work to the tokio
//! runtime and reports back through a std `mpsc` channel the loop drains
//! each frame, the same way the game polls for input.

use crate::leaderboard::rank_order;
use crate::protocol::{
    read_message, write_message, ClientMessage, ProtocolError, ScoreEntry, ScoreRecord,
    ServerMessage, DEFAULT_TOP_LIMIT,
};
use std::sync::mpsc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Updates delivered by [`LeaderboardClient::subscribe`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaderboardEvent {
    /// Full ranked list, sent on (re)connect
    Snapshot(Vec<ScoreEntry>),
    NewScore(ScoreEntry),
    /// Connection lost, retrying
    Offline,
}

/// Handle to a leaderboard server
#[derive(Debug, Clone)]
pub struct LeaderboardClient {
    handle: Handle,
    addr: String,
}

impl LeaderboardClient {
    pub fn new(handle: Handle, addr: impl Into<String>) -> Self {
        Self {
            handle,
            addr: addr.into(),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send a finished game in the background. Failures are logged and dropped.
    pub fn submit(&self, record: ScoreRecord) {
        let addr = self.addr.clone();
        self.handle.spawn(async move {
            let score = record.score;
            match submit_once(&addr, record).await {
                Ok(id) => info!(id, score, "score submitted"),
                Err(e) => warn!(error = %e, %addr, score, "score submission failed"),
            }
        });
    }

    /// Follow the leaderboard live. The feed reconnects on its own and stops
    /// once the receiver is dropped.
    pub fn subscribe(&self) -> mpsc::Receiver<LeaderboardEvent> {
        let (tx, rx) = mpsc::channel();
        let addr = self.addr.clone();
        self.handle.spawn(async move {
            run_feed(addr, tx).await;
        });
        rx
    }

    /// One-shot top-N query
    pub async fn fetch_top(&self, limit: Option<usize>) -> Result<Vec<ScoreEntry>, ProtocolError> {
        let mut stream = connect(&self.addr).await?;
        write_message(&mut stream, &ClientMessage::Top { limit }).await?;
        match reply(&mut stream).await? {
            ServerMessage::Leaderboard { entries } => Ok(entries),
            ServerMessage::Rejected { reason } => Err(ProtocolError::Rejected(reason)),
            _ => Err(ProtocolError::UnexpectedReply),
        }
    }
}

async fn connect(addr: &str) -> Result<TcpStream, ProtocolError> {
    tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| ProtocolError::Timeout)?
        .map_err(ProtocolError::from)
}

async fn reply(stream: &mut TcpStream) -> Result<ServerMessage, ProtocolError> {
    tokio::time::timeout(REQUEST_TIMEOUT, read_message(stream))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

async fn submit_once(addr: &str, record: ScoreRecord) -> Result<u64, ProtocolError> {
    let mut stream = connect(addr).await?;
    write_message(&mut stream, &ClientMessage::Submit(record)).await?;
    match reply(&mut stream).await? {
        ServerMessage::Accepted { id } => Ok(id),
        ServerMessage::Rejected { reason } => Err(ProtocolError::Rejected(reason)),
        _ => Err(ProtocolError::UnexpectedReply),
    }
}

async fn run_feed(addr: String, tx: mpsc::Sender<LeaderboardEvent>) {
    loop {
        match follow(&addr, &tx).await {
            // Receiver dropped
            Ok(()) => return,
            Err(e) => debug!(error = %e, %addr, "leaderboard feed down"),
        }
        if tx.send(LeaderboardEvent::Offline).is_err() {
            return;
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

/// Stream events until the connection fails (Err) or nobody is listening (Ok)
async fn follow(addr: &str, tx: &mpsc::Sender<LeaderboardEvent>) -> Result<(), ProtocolError> {
    let mut stream = connect(addr).await?;
    write_message(&mut stream, &ClientMessage::Subscribe).await?;
    debug!(%addr, "leaderboard feed connected");

    loop {
        let event = match read_message(&mut stream).await? {
            ServerMessage::Leaderboard { entries } => LeaderboardEvent::Snapshot(entries),
            ServerMessage::NewScore { entry } => LeaderboardEvent::NewScore(entry),
            ServerMessage::Rejected { reason } => return Err(ProtocolError::Rejected(reason)),
            ServerMessage::Accepted { .. } => return Err(ProtocolError::UnexpectedReply),
        };
        if tx.send(event).is_err() {
            return Ok(());
        }
    }
}

/// Connection state shown next to the list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    /// Playing offline, no client at all
    Disabled,
    Connecting,
    Online,
    Offline,
}

/// What the leaderboard panel shows
#[derive(Debug, Clone)]
pub struct LeaderboardView {
    pub entries: Vec<ScoreEntry>,
    pub status: FeedStatus,
    limit: usize,
}

impl LeaderboardView {
    pub fn new(status: FeedStatus) -> Self {
        Self {
            entries: Vec::new(),
            status,
            limit: DEFAULT_TOP_LIMIT,
        }
    }

    pub fn apply(&mut self, event: LeaderboardEvent) {
        match event {
            LeaderboardEvent::Snapshot(entries) => {
                self.entries = entries;
                self.entries.sort_by(rank_order);
                self.entries.truncate(self.limit);
                self.status = FeedStatus::Online;
            }
            LeaderboardEvent::NewScore(entry) => {
                // A snapshot taken after the submit may already hold it
                if self.entries.iter().any(|e| e.id == entry.id) {
                    return;
                }
                let pos = self
                    .entries
                    .partition_point(|e| rank_order(e, &entry).is_lt());
                self.entries.insert(pos, entry);
                self.entries.truncate(self.limit);
                self.status = FeedStatus::Online;
            }
            LeaderboardEvent::Offline => self.status = FeedStatus::Offline,
        }
    }

    /// Apply everything waiting on the channel
    pub fn drain(&mut self, rx: &mpsc::Receiver<LeaderboardEvent>) {
        while let Ok(event) = rx.try_recv() {
            self.apply(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{run_server, ServerConfig};
    use std::net::SocketAddr;
    use tokio::sync::oneshot;

    fn entry(id: u64, score: u64, at: u64) -> ScoreEntry {
        ScoreEntry {
            id,
            name: format!("p{id}"),
            score,
            lines: 0,
            submitted_at_ms: at,
        }
    }

    fn ids(view: &LeaderboardView) -> Vec<u64> {
        view.entries.iter().map(|e| e.id).collect()
    }

    async fn start_server() -> SocketAddr {
        let config = ServerConfig {
            bind: "127.0.0.1:0".to_string(),
            ..ServerConfig::default()
        };
        let (ready_tx, ready_rx) = oneshot::channel();
        tokio::spawn(async move {
            let _ = run_server(config, Some(ready_tx)).await;
        });
        tokio::time::timeout(Duration::from_secs(2), ready_rx)
            .await
            .expect("server did not signal ready")
            .expect("ready channel dropped")
    }

    /// Poll a std receiver without blocking the runtime
    async fn next_event(rx: &mpsc::Receiver<LeaderboardEvent>) -> LeaderboardEvent {
        for _ in 0..200 {
            if let Ok(event) = rx.try_recv() {
                return event;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no leaderboard event");
    }

    #[test]
    fn test_view_inserts_in_rank_order() {
        let mut view = LeaderboardView::new(FeedStatus::Connecting);
        view.apply(LeaderboardEvent::Snapshot(vec![entry(1, 300, 1), entry(2, 100, 2)]));
        assert_eq!(view.status, FeedStatus::Online);

        view.apply(LeaderboardEvent::NewScore(entry(3, 200, 3)));
        view.apply(LeaderboardEvent::NewScore(entry(4, 300, 4)));
        assert_eq!(ids(&view), vec![1, 4, 3, 2]);
    }

    #[test]
    fn test_view_ignores_duplicate_and_keeps_list_offline() {
        let mut view = LeaderboardView::new(FeedStatus::Connecting);
        view.apply(LeaderboardEvent::Snapshot(vec![entry(1, 300, 1)]));
        view.apply(LeaderboardEvent::NewScore(entry(1, 300, 1)));
        assert_eq!(ids(&view), vec![1]);

        view.apply(LeaderboardEvent::Offline);
        assert_eq!(view.status, FeedStatus::Offline);
        assert_eq!(ids(&view), vec![1]);
    }

    #[test]
    fn test_view_is_capped() {
        let mut view = LeaderboardView::new(FeedStatus::Online);
        for id in 0..(DEFAULT_TOP_LIMIT as u64 + 5) {
            view.apply(LeaderboardEvent::NewScore(entry(id, id, id)));
        }
        assert_eq!(view.entries.len(), DEFAULT_TOP_LIMIT);
        assert_eq!(view.entries[0].score, DEFAULT_TOP_LIMIT as u64 + 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_submit_reaches_subscriber() {
        let addr = start_server().await;
        let client = LeaderboardClient::new(Handle::current(), addr.to_string());

        let rx = client.subscribe();
        assert_eq!(next_event(&rx).await, LeaderboardEvent::Snapshot(Vec::new()));

        client.submit(ScoreRecord {
            name: "ada".to_string(),
            score: 1200,
            lines: 4,
        });
        match next_event(&rx).await {
            LeaderboardEvent::NewScore(entry) => {
                assert_eq!(entry.name, "ada");
                assert_eq!(entry.score, 1200);
            }
            other => panic!("expected new score, got {other:?}"),
        }

        let top = client.fetch_top(Some(10)).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].lines, 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unreachable_server_reports_offline() {
        // Bind and drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = LeaderboardClient::new(Handle::current(), addr.to_string());
        let rx = client.subscribe();
        assert_eq!(next_event(&rx).await, LeaderboardEvent::Offline);
        assert!(client.fetch_top(None).await.is_err());
    }
}
