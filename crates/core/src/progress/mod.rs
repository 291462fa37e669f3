//! Progress reporting.
//!
//! Engines turn raw byte counts into [`ProgressSample`]s with a
//! [`ProgressTracker`]; the controller republishes them, tagged with the
//! current phase, on the [`ProgressChannel`] for any number of observers.
//!
//! Progress is a "latest value wins" signal: every subscriber holds at most
//! one pending event and a slow subscriber only ever misses intermediate
//! samples. It never blocks the publisher or other subscribers.

mod channel;
mod tracker;
mod types;

pub use channel::{ProgressChannel, Subscription, SubscriptionToken};
pub use tracker::{ProgressTracker, TrackerSettings};
pub use types::{ProgressEvent, ProgressPhase, ProgressSample};
