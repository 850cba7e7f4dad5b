//! HTTP API layer.

pub mod server;
pub mod types;

pub use server::{start_server, AppState};
