//! Error types for the sync layer.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Where to send a user whose pod refuses this application's origin.
pub const TRUST_REMEDIATION: &str = "open your pod's profile preferences, find \
    \"Manage your trusted applications\", add this application's origin and grant it \
    Read, Write and Append access, then reload the wiki";

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Bad or missing container configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A title or location that cannot be mapped to a resource path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// No session, expired session, or the pod refused our credentials.
    #[error("authentication error: {0}")]
    Auth(String),

    /// The pod does not trust the origin this application runs from.
    #[error("the pod does not trust this application ({reason}); to fix it, {remediation}")]
    UntrustedOrigin {
        reason: String,
        remediation: &'static str,
    },

    /// A single resource is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Every configured container missed.
    #[error("tiddler not found in any container: {title}")]
    NotFoundAnywhere { title: String },

    /// The store answered a write with an unexpected status.
    #[error("unexpected status {status} writing {url}")]
    Conflict { url: String, status: u16 },

    /// The request never completed, or the store answered in a way we cannot use.
    #[error("transport error: {0}")]
    Transport(String),

    /// Metadata that cannot be written as linked data.
    #[error("encode error: {0}")]
    Encode(String),

    /// Malformed metadata.
    #[error("decode error: {0}")]
    Decode(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Record-level error from the types crate.
    #[error("tiddler error: {0}")]
    Tiddler(#[from] wikipod_types::Error),
}

impl SyncError {
    /// Builds the trust-grant error for a refusal reason reported by the pod.
    pub fn untrusted_origin(reason: impl Into<String>) -> Self {
        Self::UntrustedOrigin {
            reason: reason.into(),
            remediation: TRUST_REMEDIATION,
        }
    }

    /// Returns true for single-resource absence.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true for errors a fresh login or a trust grant would fix.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::UntrustedOrigin { .. })
    }
}
