//! Outbound side of a player's connection, as seen by a room.

use tokio::sync::mpsc;
use trivium_protocol::StateUpdate;

use crate::ConnectionError;

/// Delivers state updates to one player.
///
/// `send` is synchronous and must not block: the room calls it while
/// holding its lock. Implementations hand the update to a queue or a
/// writer task.
pub trait Connection: Send + Sync + 'static {
    fn send(&self, update: &StateUpdate) -> Result<(), ConnectionError>;
}

/// Channel half used by socket handlers: the room pushes updates, a
/// writer task drains them onto the socket.
pub type UpdateSender = mpsc::UnboundedSender<StateUpdate>;

impl Connection for UpdateSender {
    fn send(&self, update: &StateUpdate) -> Result<(), ConnectionError> {
        mpsc::UnboundedSender::send(self, update.clone()).map_err(|_| ConnectionError::Closed)
    }
}
