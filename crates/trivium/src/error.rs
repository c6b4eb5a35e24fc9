//! Unified error type for the Trivium server.

use trivium_board::BoardError;
use trivium_protocol::ProtocolError;
use trivium_room::{QuestionError, RoomError};

use crate::transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TriviumError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room refused the operation (not found, already started...).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The board or its category table is malformed.
    #[error(transparent)]
    Board(#[from] BoardError),

    /// A question list is unusable (empty, bad weights).
    #[error(transparent)]
    Question(#[from] QuestionError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Content files parsed but are inconsistent.
    #[error("invalid content: {0}")]
    Content(String),

    #[error("logging setup failed: {0}")]
    Logging(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use trivium_protocol::RoomId;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ReceiveFailed(std::io::Error::other("gone"));
        let trivium_err: TriviumError = err.into();
        assert!(matches!(trivium_err, TriviumError::Transport(_)));
        assert!(trivium_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let trivium_err: TriviumError = err.into();
        assert!(matches!(trivium_err, TriviumError::Protocol(_)));
    }

    #[test]
    fn test_from_room_error() {
        let err = RoomError::NotFound(RoomId::from("R1"));
        let trivium_err: TriviumError = err.into();
        assert!(matches!(trivium_err, TriviumError::Room(_)));
        assert!(trivium_err.to_string().contains("R1"));
    }

    #[test]
    fn test_from_board_error() {
        let trivium_err: TriviumError = BoardError::Empty.into();
        assert!(matches!(trivium_err, TriviumError::Board(_)));
    }
}
