//! Operation controller.
//!
//! A per-artifact state machine driving install, update, remove and abort.
//! Each artifact id has its own slot; at most one operation holds a slot at
//! a time, and commands arriving while it is held are rejected with
//! [`Outcome::AlreadyInProgress`] rather than queued.
//!
//! ```text
//! Idle -> Downloading -> Unzipping -> Idle    install / update
//! Idle -> Removing -> Idle                    remove
//! Downloading | Unzipping -> Idle             abort or failure
//! ```
//!
//! Work runs on a spawned task, so dropping the caller's future does not
//! interrupt an operation halfway; only [`OperationController::abort`] does.

mod config;
mod runner;
mod types;

pub use config::ControllerConfig;
pub use runner::OperationController;
pub use types::{Command, ControllerError, Outcome, Phase};
