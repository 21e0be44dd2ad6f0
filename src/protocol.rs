//! Leaderboard wire protocol
//!
//! Every message is a big-endian u32 length followed by that many bytes of
//! JSON. Frames larger than [`MAX_FRAME_LEN`] are refused on both sides.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Largest frame body accepted (1 MiB)
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Top-N size used when a query doesn't say, and the most a query may ask for
pub const DEFAULT_TOP_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection closed")]
    Closed,
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    FrameTooLarge(usize),
    #[error("malformed message")]
    Json(#[from] serde_json::Error),
    #[error("i/o error")]
    Io(#[source] std::io::Error),
    #[error("timed out")]
    Timeout,
    #[error("rejected by server: {0}")]
    Rejected(String),
    #[error("unexpected reply from server")]
    UnexpectedReply,
}

impl From<std::io::Error> for ProtocolError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolError::Closed
        } else {
            ProtocolError::Io(e)
        }
    }
}

/// A finished game as the client reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    #[serde(default)]
    pub name: String,
    pub score: u64,
    pub lines: u32,
}

/// A ranked leaderboard row, with the id and timestamp the server assigned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub id: u64,
    pub name: String,
    pub score: u64,
    pub lines: u32,
    /// Milliseconds since the Unix epoch
    pub submitted_at_ms: u64,
}

/// Client to server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientMessage {
    Submit(ScoreRecord),
    Top { limit: Option<usize> },
    /// Keep the connection open and receive every new score
    Subscribe,
}

/// Server to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerMessage {
    Accepted { id: u64 },
    Rejected { reason: String },
    Leaderboard { entries: Vec<ScoreEntry> },
    NewScore { entry: ScoreEntry },
}

/// Serialize a message with its length prefix
pub fn encode_message<M: Serialize>(msg: &M) -> Result<Vec<u8>, ProtocolError> {
    let json = serde_json::to_vec(msg)?;
    if json.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(json.len()));
    }
    let len = json.len() as u32;
    let mut data = len.to_be_bytes().to_vec();
    data.extend(json);
    Ok(data)
}

pub async fn write_message<W, M>(writer: &mut W, msg: &M) -> Result<(), ProtocolError>
where
    W: AsyncWriteExt + Unpin,
    M: Serialize,
{
    let data = encode_message(msg)?;
    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read a length-prefixed message from a stream
pub async fn read_message<R, M>(reader: &mut R) -> Result<M, ProtocolError>
where
    R: AsyncReadExt + Unpin,
    M: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;

    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data).await?;
    Ok(serde_json::from_slice(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frame_layout() {
        let msg = ClientMessage::Top { limit: Some(10) };
        let data = encode_message(&msg).unwrap();
        let body = serde_json::to_vec(&msg).unwrap();
        assert_eq!(&data[..4], (body.len() as u32).to_be_bytes());
        assert_eq!(&data[4..], body);

        let mut reader = &data[..];
        let decoded: ClientMessage = read_message(&mut reader).await.unwrap();
        assert_eq!(decoded, msg);
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let mut data = ((MAX_FRAME_LEN + 1) as u32).to_be_bytes().to_vec();
        data.extend([0u8; 16]);
        let mut reader = &data[..];
        let result: Result<ServerMessage, _> = read_message(&mut reader).await;
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge(_))));
    }

    #[tokio::test]
    async fn test_truncated_stream_is_closed() {
        let data = encode_message(&ClientMessage::Subscribe).unwrap();
        let mut reader = &data[..data.len() - 1];
        let result: Result<ClientMessage, _> = read_message(&mut reader).await;
        assert!(matches!(result, Err(ProtocolError::Closed)));

        let mut empty: &[u8] = &[];
        let result: Result<ClientMessage, _> = read_message(&mut empty).await;
        assert!(matches!(result, Err(ProtocolError::Closed)));
    }

    #[tokio::test]
    async fn test_garbage_body_is_json_error() {
        let mut data = 3u32.to_be_bytes().to_vec();
        data.extend(b"{{{");
        let mut reader = &data[..];
        let result: Result<ClientMessage, _> = read_message(&mut reader).await;
        assert!(matches!(result, Err(ProtocolError::Json(_))));
    }

    #[test]
    fn test_submit_without_name_parses() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"Submit":{"score":120,"lines":3}}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Submit(ScoreRecord {
                name: String::new(),
                score: 120,
                lines: 3,
            })
        );
    }
}
