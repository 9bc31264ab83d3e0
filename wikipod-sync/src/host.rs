//! Host wiki seam.
//!
//! The host owns presentation. The adaptor only tells it when the connection
//! state changes and when the user should be asked to sign in.

use serde::{Deserialize, Serialize};

/// Connection state of a sync scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    LoggedOut,
    LoggingIn,
    LoggedIn,
}

/// Result of a status check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub logged_in: bool,
    /// Short user name, when signed in.
    pub identity: Option<String>,
}

impl Status {
    pub fn logged_out() -> Self {
        Self {
            logged_in: false,
            identity: None,
        }
    }
}

/// Per-tiddler side-channel data the host stores and replays on save/delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptorInfo {
    /// Container the tiddler lives in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl AdaptorInfo {
    pub fn at(location: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
        }
    }
}

/// Callbacks into the host wiki.
pub trait WikiHost: Send + Sync {
    /// The connection state changed; the host should refresh its status display.
    fn connection_changed(&self, status: &Status);

    /// An operation needed a session that doesn't exist.
    fn request_login(&self);
}

/// Host that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHost;

impl WikiHost for NullHost {
    fn connection_changed(&self, _status: &Status) {}

    fn request_login(&self) {}
}
