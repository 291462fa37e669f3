use chrono::Utc;
use tokio::sync::mpsc;

use super::{OutcomeEnvelope, OutcomeEvent};

/// Handle for emitting outcome events.
///
/// This is cheaply cloneable and can be shared across tasks.
#[derive(Clone)]
pub struct OutcomeHandle {
    tx: mpsc::Sender<OutcomeEnvelope>,
}

impl OutcomeHandle {
    pub fn new(tx: mpsc::Sender<OutcomeEnvelope>) -> Self {
        Self { tx }
    }

    fn envelope(event: OutcomeEvent) -> OutcomeEnvelope {
        OutcomeEnvelope {
            timestamp: Utc::now(),
            event,
        }
    }

    /// Emit an event, waiting for buffer space.
    ///
    /// A closed channel is logged, never returned to the caller.
    pub async fn emit(&self, event: OutcomeEvent) {
        if let Err(e) = self.tx.send(Self::envelope(event)).await {
            tracing::error!("Failed to emit outcome event: {}", e);
        }
    }

    /// Emit an event without blocking.
    ///
    /// Returns false if the buffer is full or the dispatcher is gone.
    pub fn try_emit(&self, event: OutcomeEvent) -> bool {
        match self.tx.try_send(Self::envelope(event)) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Dropped outcome event: {}", e);
                false
            }
        }
    }
}
