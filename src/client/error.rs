use crate::protocol::ProtocolError;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to connect to {address}: {source}")]
    Connect {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server responded with incorrect handshake ({received} != 2)")]
    UnexpectedHandshake { received: u32 },

    #[error("Connection closed by server")]
    PeerClosed,

    #[error("Connection reset by server")]
    PeerReset,

    #[error("Connection reset during handshake {attempts} times, giving up")]
    ResetRetriesExhausted { attempts: u32 },

    #[error("Failed to send to server: {0}")]
    Send(#[source] std::io::Error),

    #[error("Failed to receive from server: {0}")]
    Receive(#[source] std::io::Error),

    #[error("Timed out waiting for server response")]
    Timeout,

    #[error("Server responded with incorrect response ({response} != {challenge}+1)")]
    ProtocolViolation { challenge: u32, response: u32 },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Measurement error: {0}")]
    Measurement(String),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Worker {worker} panicked")]
    WorkerPanicked { worker: usize },
}

impl ClientError {
    /// True for a reset raised by the peer, the only condition the handshake retries
    pub fn is_reset(&self) -> bool {
        matches!(self, ClientError::PeerReset)
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
