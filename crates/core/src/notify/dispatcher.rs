use std::sync::Arc;

use tokio::sync::mpsc;

use super::{OutcomeEnvelope, OutcomeHandle};

/// Receiver of outcome notifications, e.g. a logger or a WebSocket fan-out.
pub trait OutcomeSink: Send + Sync {
    fn deliver(&self, envelope: &OutcomeEnvelope);
}

/// Background task that forwards outcome events to a sink.
pub struct OutcomeDispatcher {
    rx: mpsc::Receiver<OutcomeEnvelope>,
    sink: Arc<dyn OutcomeSink>,
}

impl OutcomeDispatcher {
    pub fn new(rx: mpsc::Receiver<OutcomeEnvelope>, sink: Arc<dyn OutcomeSink>) -> Self {
        Self { rx, sink }
    }

    /// Run until every handle is dropped.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        tracing::info!("Outcome dispatcher started");

        while let Some(envelope) = self.rx.recv().await {
            self.sink.deliver(&envelope);
        }

        tracing::info!("Outcome dispatcher shutting down");
    }
}

/// Create a handle/dispatcher pair.
///
/// Spawn the dispatcher with `tokio::spawn(dispatcher.run())`.
pub fn create_outcome_system(
    sink: Arc<dyn OutcomeSink>,
    buffer_size: usize,
) -> (OutcomeHandle, OutcomeDispatcher) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (OutcomeHandle::new(tx), OutcomeDispatcher::new(rx, sink))
}
