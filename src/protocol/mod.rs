//! Wire protocol shared by the probe client and the challenge server

pub mod error;
pub mod message;

pub use error::ProtocolError;
pub use message::{
    decode_word, encode_word, Challenge, HANDSHAKE_ACK, HANDSHAKE_REQUEST, SHUTDOWN, WORD_SIZE,
};
