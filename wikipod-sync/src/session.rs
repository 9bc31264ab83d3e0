//! Session service seam.
//!
//! The pod's identity provider is an external collaborator. The adaptor only
//! needs to know whether a session exists, to trigger the interactive login
//! flow, and to end the session; what it gets back is a WebID and a bearer
//! token for the store client.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

/// An authenticated pod session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// WebID of the signed-in user, e.g. `https://alice.pod.example/profile/card#me`.
    pub web_id: String,
    /// Bearer token presented to the pod.
    pub access_token: String,
    /// Identity provider that issued the session.
    pub issuer: Option<String>,
    /// When the token stops being accepted.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(web_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            web_id: web_id.into(),
            access_token: access_token.into(),
            issuer: None,
            expires_at: None,
        }
    }

    /// Returns true once `expires_at` has passed.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Utc::now() >= exp)
    }

    /// Short user name derived from the WebID: the first label of its host
    /// (`https://alice.pod.example/...` gives `alice`). Falls back to the
    /// full WebID when it has no parsable host.
    pub fn username(&self) -> String {
        reqwest::Url::parse(&self.web_id)
            .ok()
            .and_then(|url| url.host_str().map(|h| h.split('.').next().unwrap_or(h).to_string()))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.web_id.clone())
    }
}

/// The pod's authentication service.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Returns the live session, if any. Must not prompt the user.
    async fn current_session(&self) -> SyncResult<Option<Session>>;

    /// Runs the interactive login flow and returns the new session.
    async fn login(&self) -> SyncResult<Session>;

    /// Ends the session.
    async fn logout(&self) -> SyncResult<()>;
}

/// Session provider backed by a pre-issued token.
///
/// `login` activates the stored session without any interaction; an expired
/// session reads as absent.
pub struct StaticSessionProvider {
    issued: Option<Session>,
    active: RwLock<Option<Session>>,
}

impl StaticSessionProvider {
    /// A provider whose `login` will activate `session`.
    pub fn new(session: Session) -> Self {
        Self {
            issued: Some(session),
            active: RwLock::new(None),
        }
    }

    /// A provider that is already signed in.
    pub fn signed_in(session: Session) -> Self {
        Self {
            issued: Some(session.clone()),
            active: RwLock::new(Some(session)),
        }
    }

    /// A provider that has no credentials at all.
    pub fn anonymous() -> Self {
        Self {
            issued: None,
            active: RwLock::new(None),
        }
    }
}

#[async_trait]
impl SessionProvider for StaticSessionProvider {
    async fn current_session(&self) -> SyncResult<Option<Session>> {
        Ok(self.active.read().await.clone().filter(|s| !s.is_expired()))
    }

    async fn login(&self) -> SyncResult<Session> {
        let session = self
            .issued
            .clone()
            .ok_or_else(|| SyncError::Auth("no credentials available".to_string()))?;
        if session.is_expired() {
            return Err(SyncError::Auth("session token has expired".to_string()));
        }

        *self.active.write().await = Some(session.clone());
        info!("Signed in as {}", session.web_id);
        Ok(session)
    }

    async fn logout(&self) -> SyncResult<()> {
        *self.active.write().await = None;
        Ok(())
    }
}
