use thiserror::Error;

/// Protocol-level errors for word encoding/decoding
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid word size: expected {expected}, got {actual}")]
    InvalidWordSize { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
