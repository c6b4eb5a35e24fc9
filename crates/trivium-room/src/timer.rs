//! Question timer for the room loop.
//!
//! The timer sits in the room's `tokio::select!` next to the input
//! channels. It pends forever while no question is open, so a room
//! without a running question only reacts to player input:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(msg) = events.recv() => { /* apply, then timer.sync(deadline) */ }
//!         () = timer.fired() => { /* conclude the question */ }
//!     }
//! }
//! ```

use tokio::time::{self, Instant};
use tracing::trace;

/// Fires once at the deadline of the open question.
#[derive(Debug, Default)]
pub(crate) struct QuestionTimer {
    deadline: Option<Instant>,
}

impl QuestionTimer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Aligns the timer with the game's current deadline. `None` disarms it.
    pub(crate) fn sync(&mut self, deadline: Option<Instant>) {
        if self.deadline != deadline {
            trace!(armed = deadline.is_some(), "question timer synced");
            self.deadline = deadline;
        }
    }

    /// Completes when the deadline passes, then disarms.
    ///
    /// Cancel safe: dropping the future before completion leaves the timer
    /// armed.
    pub(crate) async fn fired(&mut self) {
        let Some(deadline) = self.deadline else {
            std::future::pending::<()>().await;
            return;
        };
        time::sleep_until(deadline).await;
        self.deadline = None;
    }
}
