//! Remote store access.
//!
//! `RemoteStore` is the seam between the adaptor and the pod. The HTTP
//! implementation, [`SolidPodClient`], speaks plain LDP: GET/PUT/DELETE/HEAD
//! on resources, containers addressed with a trailing slash, and a bearer
//! token handed over by the session service.

use crate::error::{SyncError, SyncResult};
use crate::path::{is_absolute, parent_container};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, LINK};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// `Accept` header for reads: linked data as Turtle when the store
/// negotiates, anything else verbatim.
const READ_ACCEPT: &str = "text/turtle, application/ld+json;q=0.9, */*;q=0.8";

const BASIC_CONTAINER_LINK: &str = "<http://www.w3.org/ns/ldp#BasicContainer>; rel=\"type\"";

/// Pod client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolidPodConfig {
    /// Origin every pod-relative path is joined onto.
    pub pod_origin: String,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
}

impl Default for SolidPodConfig {
    fn default() -> Self {
        Self {
            pod_origin: "https://localhost:8443".to_string(),
            request_timeout_secs: 60,
        }
    }
}

/// What a delete found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    Absent,
}

/// Stateless primitives over the pod.
///
/// Paths are pod-relative (`/public/wiki/Foo`) or absolute `http(s)` URIs.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Installs or clears the bearer token used for every request.
    async fn set_bearer_token(&self, token: Option<String>);

    /// Reads a resource as text.
    async fn read(&self, path: &str) -> SyncResult<String>;

    /// Creates or replaces a resource. `described_by` names the metadata
    /// resource linked from it.
    async fn write(
        &self,
        path: &str,
        content_type: &str,
        body: String,
        described_by: Option<&str>,
    ) -> SyncResult<()>;

    /// Deletes a resource.
    async fn remove(&self, path: &str) -> SyncResult<RemoveOutcome>;

    /// Probes whether a resource (or, with a trailing slash, a container) exists.
    async fn exists(&self, path: &str) -> SyncResult<bool>;

    /// Creates one container whose parent already exists. Creating an
    /// existing container must succeed.
    async fn create_container(&self, path: &str) -> SyncResult<()>;

    /// Makes sure a container and all of its ancestors exist.
    ///
    /// Walks up from the target until an existing ancestor is found, then
    /// creates the missing ones top-down.
    async fn ensure_container(&self, path: &str) -> SyncResult<()> {
        if is_absolute(path) {
            return Err(SyncError::InvalidPath(format!(
                "{path} is an external container and cannot be created"
            )));
        }

        let mut missing = Vec::new();
        let mut current = Some(path.trim_end_matches('/').to_string());
        while let Some(dir) = current {
            if dir.is_empty() || self.exists(&format!("{dir}/")).await? {
                break;
            }
            current = parent_container(&dir).map(str::to_string);
            missing.push(dir);
        }

        for dir in missing.iter().rev() {
            self.create_container(dir).await?;
        }
        Ok(())
    }
}

/// HTTP client for a Solid-style pod.
pub struct SolidPodClient {
    config: SolidPodConfig,
    client: Client,
    token: Arc<RwLock<Option<String>>>,
}

impl SolidPodClient {
    /// Creates a new pod client.
    pub fn new(config: SolidPodConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("failed to create HTTP client");

        Self {
            config,
            client,
            token: Arc::new(RwLock::new(None)),
        }
    }

    pub fn config(&self) -> &SolidPodConfig {
        &self.config
    }

    /// Full URL for a pod-relative path; absolute URIs pass through.
    pub fn url_for(&self, path: &str) -> String {
        if is_absolute(path) {
            path.to_string()
        } else {
            format!("{}{}", self.config.pod_origin.trim_end_matches('/'), path)
        }
    }

    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token.read().await.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str, url: &str) -> SyncResult<Response> {
        self.authorized(request)
            .await
            .send()
            .await
            .map_err(|e| SyncError::Transport(format!("{what} {url} failed: {e}")))
    }
}

/// Maps 401/403 to the matching auth error. 403 responses whose reason
/// mentions the origin are the pod's "application not trusted" refusal.
async fn refusal(response: Response, url: &str) -> SyncError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if status == StatusCode::FORBIDDEN && body.to_ascii_lowercase().contains("origin") {
        return SyncError::untrusted_origin(body.trim().to_string());
    }
    SyncError::Auth(format!("{url} answered {status}"))
}

fn is_refusal(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

fn is_absent(status: StatusCode) -> bool {
    status == StatusCode::NOT_FOUND || status == StatusCode::GONE
}

#[async_trait]
impl RemoteStore for SolidPodClient {
    async fn set_bearer_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    async fn read(&self, path: &str) -> SyncResult<String> {
        let url = self.url_for(path);
        debug!("Reading {}", url);

        let response = self
            .send(self.client.get(&url).header(ACCEPT, READ_ACCEPT), "GET", &url)
            .await?;

        let status = response.status();
        if is_refusal(status) {
            return Err(refusal(response, &url).await);
        }
        if !status.is_success() {
            return Err(SyncError::NotFound(url));
        }

        response
            .text()
            .await
            .map_err(|e| SyncError::Transport(format!("read body of {url} failed: {e}")))
    }

    async fn write(
        &self,
        path: &str,
        content_type: &str,
        body: String,
        described_by: Option<&str>,
    ) -> SyncResult<()> {
        let url = self.url_for(path);
        debug!("Writing {} ({} bytes, {})", url, body.len(), content_type);

        let mut request = self.client.put(&url).header(CONTENT_TYPE, content_type);
        if let Some(meta) = described_by {
            let link = format!("<{}>; rel=\"describedby\"", self.url_for(meta));
            request = request.header(LINK, link);
        }

        let response = self.send(request.body(body), "PUT", &url).await?;
        let status = response.status();
        if is_refusal(status) {
            return Err(refusal(response, &url).await);
        }
        if !status.is_success() {
            return Err(SyncError::Conflict {
                url,
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    async fn remove(&self, path: &str) -> SyncResult<RemoveOutcome> {
        let url = self.url_for(path);
        debug!("Deleting {}", url);

        let response = self.send(self.client.delete(&url), "DELETE", &url).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(RemoveOutcome::Removed);
        }
        if is_absent(status) {
            return Ok(RemoveOutcome::Absent);
        }
        if is_refusal(status) {
            return Err(refusal(response, &url).await);
        }
        Err(SyncError::Transport(format!("DELETE {url} answered {status}")))
    }

    async fn exists(&self, path: &str) -> SyncResult<bool> {
        let url = self.url_for(path);
        let response = self.send(self.client.head(&url), "HEAD", &url).await?;
        let status = response.status();

        if status.is_success() {
            return Ok(true);
        }
        if is_absent(status) {
            return Ok(false);
        }
        if is_refusal(status) {
            return Err(refusal(response, &url).await);
        }
        Err(SyncError::Transport(format!("HEAD {url} answered {status}")))
    }

    async fn create_container(&self, path: &str) -> SyncResult<()> {
        let url = self.url_for(&format!("{}/", path.trim_end_matches('/')));

        let request = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, "text/turtle")
            .header(LINK, BASIC_CONTAINER_LINK)
            .body(String::new());

        let response = self.send(request, "PUT", &url).await?;
        let status = response.status();
        if status.is_success() || status == StatusCode::CONFLICT {
            info!("Created container {}", url);
            return Ok(());
        }
        if is_refusal(status) {
            return Err(refusal(response, &url).await);
        }
        Err(SyncError::Conflict {
            url,
            status: status.as_u16(),
        })
    }
}
