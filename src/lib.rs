//! # Farmdesk - Farm Worker Backend
//!
//! Worker-facing backend for a prawn farm: task lookup, feeding reminders and
//! order status updates over a SQLite database whose schema is not fixed in
//! advance.
//!
//! Farmdesk provides:
//! - Schema-adaptive record resolution (which table and column hold a caller's tasks)
//! - Bearer credential verification for worker tokens
//! - A feeding-reminder poller with a bounded, expiring reminder queue
//! - An axum HTTP surface and a CLI over the same store

pub mod claim;
pub mod resolver;
pub mod storage;
pub mod auth;
pub mod reminders;
pub mod server;
pub mod config;
pub mod ui;


// Re-exports for convenient access
pub use claim::{IdentityClaim, OwnerKey};
pub use resolver::{CandidateSet, Resolution, ResolutionPath, ResolveError, SchemaAdaptiveResolver};
pub use storage::SqliteStore;

/// Result type alias for Farmdesk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Farmdesk operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Query interrupted")]
    QueryInterrupted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid claim: {0}")]
    InvalidClaim(String),
}
