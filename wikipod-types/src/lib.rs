//! Core type definitions for wikipod.
//!
//! This crate defines the record types shared by the sync engine and its
//! front ends:
//! - `Tiddler`, the unit of synchronization (full or skinny form)
//! - `WikiTimestamp`, the wiki's 17-digit UTC timestamp
//!
//! Everything that touches the network lives in `wikipod-sync`, not here.

mod tiddler;
mod timestamp;

pub use tiddler::{DEFAULT_CONTENT_TYPE, FieldMap, Tiddler};
pub use timestamp::WikiTimestamp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),
}
