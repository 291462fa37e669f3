//! Terminal outcome notifications.
//!
//! The controller emits one [`OutcomeEvent`] per operation that actually ran
//! through an [`OutcomeHandle`]. An [`OutcomeDispatcher`] task forwards them
//! to an [`OutcomeSink`], which renders or broadcasts them. Only the outcome
//! tag and the artifact id travel; user-facing text is the sink's concern.

mod dispatcher;
mod events;
mod handle;

pub use dispatcher::{create_outcome_system, OutcomeDispatcher, OutcomeSink};
pub use events::{OutcomeEnvelope, OutcomeEvent};
pub use handle::OutcomeHandle;
