//! Multi-connection client runtime.
//!
//! One readiness registry drives every connection:
//! - `Connection`: per-connection send queue and byte accounting
//! - `Client`: poller, connection registry, and event loop

mod connection;
mod event_loop;

pub(crate) use connection::{Connection, Ready};
pub use event_loop::Client;
