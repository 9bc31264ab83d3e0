//! Path resolution.
//!
//! Maps a tiddler title and an optional location hint to a resource path on
//! the pod:
//!
//! ```text
//! <container>/<encoded title>            content
//! <container>/<encoded title>.metadata   linked-data sidecar
//! <container>/__index__.json             per-container listing
//! ```
//!
//! Titles are percent-encoded twice, and every `.` is escaped as `%252E`
//! afterwards. The first pass neutralises `/` and other reserved characters;
//! the second escapes the `%` introduced by the first, so the store's own
//! decoding never turns an encoded title back into a separator. Escaping dots
//! keeps titles from colliding with sidecars (`A.metadata`), the index file,
//! or the store's dot-prefixed auxiliary resources (`.acl`, `..`).

use crate::error::{SyncError, SyncResult};

/// Container roots a sync scope may live under.
pub const ALLOWED_ROOTS: &[&str] = &["/public", "/private", "/inbox", "/profile"];

/// Suffix of the metadata sidecar.
pub const METADATA_SUFFIX: &str = ".metadata";

const ENCODED_DOT: &str = "%252E";

/// A resolved pair of container and resource paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub container_path: String,
    pub resource_path: String,
}

impl ResolvedPath {
    /// Path of the metadata sidecar for this resource.
    pub fn metadata_path(&self) -> String {
        format!("{}{METADATA_SUFFIX}", self.resource_path)
    }
}

/// Splits newline-separated container config into trimmed, non-empty entries.
pub fn parse_container_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Validates configured container roots, preserving order.
pub fn validate_containers<S: AsRef<str>>(paths: &[S]) -> SyncResult<Vec<String>> {
    if paths.is_empty() {
        return Err(SyncError::Config(
            "no containers configured; add at least one root such as /public/tiddlers".to_string(),
        ));
    }

    paths
        .iter()
        .map(|p| check_container(p.as_ref()).map_err(SyncError::Config))
        .collect()
}

/// Validates newline-separated external container URIs.
pub fn validate_external_containers(text: &str) -> SyncResult<Vec<String>> {
    parse_container_list(text)
        .into_iter()
        .map(|entry| {
            let url = reqwest::Url::parse(&entry)
                .map_err(|e| SyncError::Config(format!("external container {entry:?}: {e}")))?;
            match url.scheme() {
                "http" | "https" => Ok(normalize_container(&entry)),
                other => Err(SyncError::Config(format!(
                    "external container {entry:?} uses unsupported scheme {other}"
                ))),
            }
        })
        .collect()
}

/// Resolves a title to its resource path.
///
/// The hint wins when present; otherwise the first container is used. A
/// pod-relative hint must pass the same checks as configured containers; an
/// absolute `http(s)` hint names an external container and is kept verbatim.
pub fn resolve<S: AsRef<str>>(
    title: &str,
    hint: Option<&str>,
    containers: &[S],
) -> SyncResult<ResolvedPath> {
    if title.is_empty() {
        return Err(SyncError::InvalidPath("empty title".to_string()));
    }

    let container_path = match hint.map(str::trim).filter(|h| !h.is_empty()) {
        Some(hint) if is_absolute(hint) => normalize_container(hint),
        Some(hint) => check_container(hint).map_err(SyncError::InvalidPath)?,
        None => containers
            .first()
            .map(|c| normalize_container(c.as_ref()))
            .ok_or_else(|| SyncError::Config("no containers configured".to_string()))?,
    };

    let resource_path = format!("{container_path}/{}", double_encode(title));
    Ok(ResolvedPath {
        container_path,
        resource_path,
    })
}

/// Percent-encodes twice and escapes dots.
pub fn double_encode(title: &str) -> String {
    let once = urlencoding::encode(title);
    urlencoding::encode(&once).replace('.', ENCODED_DOT)
}

/// Reverses [`double_encode`].
pub fn double_decode(encoded: &str) -> SyncResult<String> {
    let once = urlencoding::decode(encoded)
        .map_err(|e| SyncError::InvalidPath(format!("{encoded}: {e}")))?;
    let twice = urlencoding::decode(&once)
        .map_err(|e| SyncError::InvalidPath(format!("{encoded}: {e}")))?;
    Ok(twice.into_owned())
}

/// Parent of a pod-relative container path, `None` at the pod root.
pub fn parent_container(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => None,
        Some(idx) => Some(&trimmed[..idx]),
    }
}

/// Returns true for absolute `http(s)` URIs, which are used verbatim.
pub fn is_absolute(path: &str) -> bool {
    path.starts_with("https://") || path.starts_with("http://")
}

fn normalize_container(path: &str) -> String {
    let stripped = path.trim().trim_end_matches('/');
    if stripped.is_empty() {
        "/".to_string()
    } else {
        stripped.to_string()
    }
}

/// Normalizes a pod-relative container and checks its root and segments.
fn check_container(path: &str) -> Result<String, String> {
    let normalized = normalize_container(path);
    if !has_allowed_root(&normalized) {
        return Err(format!(
            "container {path:?} must start with one of {}",
            ALLOWED_ROOTS.join(", ")
        ));
    }
    if normalized
        .split('/')
        .skip(1)
        .any(|seg| seg.is_empty() || seg == "." || seg == "..")
    {
        return Err(format!("container {path:?} contains an empty or relative segment"));
    }
    Ok(normalized)
}

fn has_allowed_root(path: &str) -> bool {
    ALLOWED_ROOTS.iter().any(|root| {
        path == *root
            || path
                .strip_prefix(root)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}
