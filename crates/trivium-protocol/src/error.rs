//! Error types for the protocol layer.
//!
//! Each crate in Trivium defines its own error enum, so a
//! `ProtocolError` always means a frame could not be turned into (or
//! out of) bytes, never a game rule violation.

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (Rust value → bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (bytes → Rust value): malformed JSON,
    /// missing fields or an unknown `kind` tag.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame parsed but is not valid at this point of the exchange,
    /// e.g. a client event sent before the join request.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
