//! Ranked score store
//!
//! Entries are kept sorted by [`rank_order`]: highest score first, then the
//! earliest submission, then the lowest id. The server owns the only
//! instance; it assigns ids and timestamps so clients can't forge either.

use crate::protocol::{ScoreEntry, ScoreRecord, DEFAULT_TOP_LIMIT};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Longest name kept, in characters
pub const MAX_NAME_LEN: usize = 24;
const ANONYMOUS: &str = "Anonymous";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt leaderboard file {path}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode leaderboard")]
    Encode(#[from] serde_json::Error),
}

/// Ordering used everywhere a list of entries is ranked
pub fn rank_order(a: &ScoreEntry, b: &ScoreEntry) -> Ordering {
    b.score
        .cmp(&a.score)
        .then(a.submitted_at_ms.cmp(&b.submitted_at_ms))
        .then(a.id.cmp(&b.id))
}

/// Trim, default and cap a submitted name
pub fn sanitize_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return ANONYMOUS.to_string();
    }
    trimmed.chars().take(MAX_NAME_LEN).collect()
}

/// Wall clock in milliseconds since the Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[derive(Debug)]
pub struct Leaderboard {
    entries: Vec<ScoreEntry>,
    next_id: u64,
    /// Where to persist, None for a memory-only board
    path: Option<PathBuf>,
}

impl Leaderboard {
    pub fn in_memory() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
            path: None,
        }
    }

    /// Load the board stored at `path`. A missing file is an empty board.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let mut board = Self::in_memory();
        board.path = Some(path.to_path_buf());

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(board),
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let mut entries: Vec<ScoreEntry> =
            serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
                path: path.to_path_buf(),
                source,
            })?;
        entries.sort_by(rank_order);
        board.next_id = entries.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        board.entries = entries;
        Ok(board)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a finished game, returning the stored entry
    pub fn insert(&mut self, record: ScoreRecord, submitted_at_ms: u64) -> ScoreEntry {
        let entry = ScoreEntry {
            id: self.next_id,
            name: sanitize_name(&record.name),
            score: record.score,
            lines: record.lines,
            submitted_at_ms,
        };
        self.next_id += 1;

        let pos = self
            .entries
            .partition_point(|e| rank_order(e, &entry) == Ordering::Less);
        self.entries.insert(pos, entry.clone());
        entry
    }

    /// The best `limit` entries, capped at the default top size
    pub fn top(&self, limit: Option<usize>) -> Vec<ScoreEntry> {
        let limit = limit.unwrap_or(DEFAULT_TOP_LIMIT).min(DEFAULT_TOP_LIMIT);
        self.entries.iter().take(limit).cloned().collect()
    }

    /// Rewrite the backing file, if there is one
    pub fn save(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let write_err = |source| StoreError::Write {
            path: path.clone(),
            source,
        };

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(path, json).map_err(write_err)
    }
}
