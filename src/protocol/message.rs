use crate::protocol::error::{ProtocolError, Result};
use rand::Rng;
use std::num::NonZeroU32;
use tracing::debug;

/// Size of a protocol word in bytes
pub const WORD_SIZE: usize = 4;

/// Sent by the client to verify a fresh connection
pub const HANDSHAKE_REQUEST: u32 = 1;

/// Expected server reply to `HANDSHAKE_REQUEST`
pub const HANDSHAKE_ACK: u32 = 2;

/// Sent as the first word of a throwaway connection to stop the server
pub const SHUTDOWN: u32 = 0;

/// Encodes a word in network byte order
pub fn encode_word(word: u32) -> [u8; WORD_SIZE] {
    word.to_be_bytes()
}

/// Decodes a word from network byte order
pub fn decode_word(bytes: &[u8]) -> Result<u32> {
    if bytes.len() < WORD_SIZE {
        debug!(
            expected = WORD_SIZE,
            actual = bytes.len(),
            "Invalid word size"
        );
        return Err(ProtocolError::InvalidWordSize {
            expected: WORD_SIZE,
            actual: bytes.len(),
        });
    }

    let mut buf = [0u8; WORD_SIZE];
    buf.copy_from_slice(&bytes[..WORD_SIZE]);
    Ok(u32::from_be_bytes(buf))
}

/// A measurement-round challenge. Zero is reserved for `SHUTDOWN` and can
/// never be a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Challenge(NonZeroU32);

impl Challenge {
    /// Returns `None` for zero
    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    /// Draws a uniformly distributed non-zero challenge
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        loop {
            if let Some(value) = NonZeroU32::new(rng.random()) {
                return Self(value);
            }
        }
    }

    pub fn value(self) -> u32 {
        self.0.get()
    }

    /// The response a well-behaved server sends back (wrapping at 2^32)
    pub fn expected_response(self) -> u32 {
        self.0.get().wrapping_add(1)
    }

    pub fn verify(self, response: u32) -> bool {
        response == self.expected_response()
    }
}
