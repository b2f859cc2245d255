/// rollsync - client-side event log synchronization for a shared dice table
///
/// Keeps every participant's roll log converged: local and server events are
/// merged into one descending log, live updates are decoded into reducer
/// actions, and the live stream reconnects with bounded backoff.

pub mod api;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod game;
pub mod history;
pub mod metrics;
pub mod protocol;
pub mod rules;
pub mod session;
pub mod store;
pub mod stream;

pub use context::ClientContext;
pub use error::{SyncError, SyncResult};
