//! Error types for the event handler engine.
//!
//! These errors stay inside the engine: the public operations report
//! failures through booleans and [`HandlerState`](crate::HandlerState) only.

use std::net::SocketAddr;

/// Errors raised while bringing the listener up.
#[derive(Debug, thiserror::Error)]
pub enum EventHandlerError {
    /// The listener could not bind its address
    #[error("Failed to bind listener on {addr}: {reason}")]
    Bind {
        /// Address that was requested
        addr: SocketAddr,
        /// Underlying cause
        reason: String,
    },

    /// The listener runtime could not be built
    #[error("Failed to build listener runtime: {0}")]
    Runtime(#[from] std::io::Error),

    /// The listener thread could not be spawned or died before reporting
    #[error("Listener worker error: {0}")]
    Worker(String),
}

/// Result type for engine-internal operations
pub type Result<T> = std::result::Result<T, EventHandlerError>;
