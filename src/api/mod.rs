//! API module for all HTTP handlers

pub mod meta;
pub mod webhook;

// Re-export handlers
pub use meta::{healthz, version};
pub use webhook::handle_webhook;
