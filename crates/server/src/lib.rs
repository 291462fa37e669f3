//! HTTP and WebSocket front end for the cellar runtime installer.

pub mod api;
pub mod metrics;
pub mod state;
