//! Sync adaptor: the lifecycle the host wiki drives.
//!
//! Composes path resolution, the remote store, the metadata codec, the index
//! cache and the prefetch queue behind seven operations: `status`, `login`,
//! `logout`, `list`, `save`, `load`, `delete` (plus the pure `get_info`).
//!
//! Shared state sits behind `tokio::sync` locks that are never held across a
//! remote call, except the per-container lock that serializes index-file
//! read-modify-write.

use crate::codec::{MetadataCodec, TurtleCodec};
use crate::config::AdaptorConfig;
use crate::error::{SyncError, SyncResult};
use crate::host::{AdaptorInfo, ConnectionState, Status, WikiHost};
use crate::index::{IndexCache, MutationStamp, apply_to_index_file, parse_index_file};
use crate::path::{
    ResolvedPath, parse_container_list, resolve, validate_containers, validate_external_containers,
};
use crate::prefetch::{PrefetchQueue, jittered_delay};
use crate::remote::RemoteStore;
use crate::revision::revision;
use crate::session::{Session, SessionProvider};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wikipod_types::Tiddler;

const INDEX_CONTENT_TYPE: &str = "application/json";

/// What a successful save reports back to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Side-channel info to persist and replay on later save/delete.
    pub info: AdaptorInfo,
    /// Content fingerprint (SHA-256, hex).
    pub revision: String,
}

/// A failed save, still carrying the best-known location and revision so the
/// host's bookkeeping stays in step.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct SaveError {
    #[source]
    pub source: SyncError,
    pub outcome: Option<SaveOutcome>,
}

impl SaveError {
    fn early(source: SyncError) -> Self {
        Self {
            source,
            outcome: None,
        }
    }
}

#[derive(Debug)]
struct Connection {
    state: ConnectionState,
    web_id: Option<String>,
}

struct Inner {
    config: RwLock<AdaptorConfig>,
    store: Arc<dyn RemoteStore>,
    codec: Arc<dyn MetadataCodec>,
    session: Arc<dyn SessionProvider>,
    host: Arc<dyn WikiHost>,
    connection: RwLock<Connection>,
    index: RwLock<IndexCache>,
    prefetch: Mutex<PrefetchQueue>,
    /// Bodies warmed by the prefetch pump, consumed by `load`.
    bodies: RwLock<HashMap<String, Tiddler>>,
    /// Bumped by every local write; a prefetch that straddles one is dropped.
    body_generation: AtomicU64,
    index_file_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    singleton_loaded: AtomicBool,
    pump: std::sync::Mutex<Option<JoinHandle<()>>>,
}

/// The sync adaptor. Cheap to clone; clones share one sync scope.
#[derive(Clone)]
pub struct SyncAdaptor {
    inner: Arc<Inner>,
}

impl SyncAdaptor {
    /// Creates an adaptor using the Turtle metadata codec.
    pub fn new(
        config: AdaptorConfig,
        store: Arc<dyn RemoteStore>,
        session: Arc<dyn SessionProvider>,
        host: Arc<dyn WikiHost>,
    ) -> Self {
        Self::with_codec(config, store, session, host, Arc::new(TurtleCodec))
    }

    /// Creates an adaptor with a custom metadata codec.
    pub fn with_codec(
        config: AdaptorConfig,
        store: Arc<dyn RemoteStore>,
        session: Arc<dyn SessionProvider>,
        host: Arc<dyn WikiHost>,
        codec: Arc<dyn MetadataCodec>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config: RwLock::new(config),
                store,
                codec,
                session,
                host,
                connection: RwLock::new(Connection {
                    state: ConnectionState::LoggedOut,
                    web_id: None,
                }),
                index: RwLock::new(IndexCache::new()),
                prefetch: Mutex::new(PrefetchQueue::new()),
                bodies: RwLock::new(HashMap::new()),
                body_generation: AtomicU64::new(0),
                index_file_locks: Mutex::new(HashMap::new()),
                singleton_loaded: AtomicBool::new(false),
                pump: std::sync::Mutex::new(None),
            }),
        }
    }

    /// Current connection state.
    pub async fn connection_state(&self) -> ConnectionState {
        self.inner.connection.read().await.state
    }

    /// Snapshot of the cached index, `None` while unloaded.
    pub async fn cached_index(&self) -> Option<HashMap<String, Tiddler>> {
        self.inner.index.read().await.get().cloned()
    }

    /// Number of titles waiting for a background fetch.
    pub async fn pending_prefetch(&self) -> usize {
        self.inner.prefetch.lock().await.len()
    }

    /// Returns true if a warmed body is cached for the title.
    pub async fn is_prefetched(&self, title: &str) -> bool {
        self.inner.bodies.read().await.contains_key(title)
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Asks the session service whether we are signed in.
    ///
    /// Picks up a session established elsewhere and notices one that ended;
    /// never touches the document store.
    pub async fn status(&self) -> SyncResult<Status> {
        let session = self.inner.session.current_session().await?;
        let (state, web_id) = {
            let conn = self.inner.connection.read().await;
            (conn.state, conn.web_id.clone())
        };

        match session {
            Some(session) => {
                let status = Status {
                    logged_in: true,
                    identity: Some(session.username()),
                };
                let stale = state == ConnectionState::LoggedOut
                    || (state == ConnectionState::LoggedIn
                        && web_id.as_deref() != Some(session.web_id.as_str()));
                if stale {
                    self.inner.adopt(&session).await;
                }
                Ok(status)
            }
            None => {
                if state == ConnectionState::LoggedIn {
                    info!("Pod session ended");
                    self.inner.drop_session().await;
                }
                Ok(Status::logged_out())
            }
        }
    }

    /// Signs in, reusing a live session when there is one.
    ///
    /// Container configuration is validated first; a bad configuration
    /// blocks login.
    pub async fn login(&self) -> SyncResult<Status> {
        self.inner.containers().await?;
        self.inner.external_containers().await?;

        let state = self.inner.connection.read().await.state;
        if state == ConnectionState::LoggedIn {
            if let Some(session) = self.inner.session.current_session().await? {
                return Ok(Status {
                    logged_in: true,
                    identity: Some(session.username()),
                });
            }
        }

        self.inner.connection.write().await.state = ConnectionState::LoggingIn;

        let session = match self.inner.session.current_session().await {
            Ok(Some(session)) => Ok(session),
            Ok(None) => self.inner.session.login().await,
            Err(e) => Err(e),
        };

        match session {
            Ok(session) => Ok(self.inner.adopt(&session).await),
            Err(e) => {
                warn!("Login failed: {}", e);
                self.inner.connection.write().await.state = ConnectionState::LoggedOut;
                Err(e)
            }
        }
    }

    /// Ends the session and forgets everything tied to it.
    pub async fn logout(&self) -> SyncResult<()> {
        let result = self.inner.session.logout().await;
        self.inner.drop_session().await;
        result
    }

    /// Skinny listing of every known tiddler, sorted by title.
    ///
    /// Logged out: returns nothing, asks the host to prompt for login and
    /// makes no remote call.
    pub async fn list(&self) -> SyncResult<Vec<Tiddler>> {
        if !self.inner.is_logged_in().await {
            self.inner.host.request_login();
            return Ok(Vec::new());
        }

        let cached = self
            .inner
            .index
            .read()
            .await
            .get()
            .map(|entries| entries.values().cloned().collect::<Vec<_>>());

        let mut entries = match cached {
            Some(entries) => entries,
            None => self.inner.refresh().await?.into_values().collect(),
        };
        entries.sort_by(|a, b| a.title.cmp(&b.title));

        let singleton = self.inner.config.read().await.singleton_title.clone();
        let mut queue = self.inner.prefetch.lock().await;
        for entry in entries.iter().filter(|e| e.title != singleton) {
            queue.enqueue(&entry.title);
        }

        Ok(entries)
    }

    /// Forces a full remote scan regardless of the cache state.
    pub async fn refresh(&self) -> SyncResult<Vec<Tiddler>> {
        let mut entries: Vec<Tiddler> = self.inner.refresh().await?.into_values().collect();
        entries.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(entries)
    }

    /// Writes a tiddler: container, then content, then metadata.
    ///
    /// The location hint from `info` (or the tiddler itself) wins when it
    /// passes the container checks; the first container is used when there
    /// is none. Logged out: `Ok(None)`.
    pub async fn save(
        &self,
        tiddler: &Tiddler,
        info: Option<&AdaptorInfo>,
    ) -> Result<Option<SaveOutcome>, SaveError> {
        if !self.inner.is_logged_in().await {
            debug!("Not signed in, skipping save of {:?}", tiddler.title);
            return Ok(None);
        }

        let revision = revision(tiddler).map_err(SaveError::early)?;
        let containers = self.inner.containers().await.map_err(SaveError::early)?;
        let hint = info
            .and_then(|i| i.location.as_deref())
            .or(tiddler.location.as_deref());
        let resolved = resolve(&tiddler.title, hint, &containers).map_err(SaveError::early)?;

        let outcome = SaveOutcome {
            info: AdaptorInfo::at(resolved.container_path.clone()),
            revision,
        };

        match self.inner.write_tiddler(tiddler, &resolved).await {
            Ok(()) => Ok(Some(outcome)),
            Err(source) => {
                warn!("Saving {:?} failed: {}", tiddler.title, source);
                Err(SaveError {
                    source,
                    outcome: Some(outcome),
                })
            }
        }
    }

    /// Loads a full tiddler, probing every container.
    ///
    /// Returns `Ok(None)` when logged out, and for the singleton when server
    /// loading is disabled or it was already loaded this session.
    pub async fn load(&self, title: &str) -> SyncResult<Option<Tiddler>> {
        if !self.inner.is_logged_in().await {
            return Ok(None);
        }

        let (singleton, from_server) = {
            let config = self.inner.config.read().await;
            (
                config.singleton_title == title,
                config.load_singleton_from_server,
            )
        };
        if singleton {
            if !from_server {
                debug!("Server loading of {:?} is disabled", title);
                return Ok(None);
            }
            if self.inner.singleton_loaded.swap(true, Ordering::SeqCst) {
                debug!("{:?} already loaded this session", title);
                return Ok(None);
            }
        }

        if let Some(warm) = self.inner.bodies.write().await.remove(title) {
            debug!("Serving {:?} from the prefetch cache", title);
            return Ok(Some(warm));
        }

        let fetched = self.inner.fetch(title).await;
        if singleton && fetched.is_err() {
            self.inner.singleton_loaded.store(false, Ordering::SeqCst);
        }
        fetched.map(Some)
    }

    /// Deletes content and sidecar. Already-absent resources are fine.
    pub async fn delete(&self, title: &str, info: Option<&AdaptorInfo>) -> SyncResult<()> {
        if !self.inner.is_logged_in().await {
            debug!("Not signed in, skipping delete of {:?}", title);
            return Ok(());
        }

        let containers = self.inner.containers().await?;
        let resolved = resolve(title, info.and_then(|i| i.location.as_deref()), &containers)?;
        let metadata_path = resolved.metadata_path();

        let (content, metadata) = tokio::join!(
            self.inner.store.remove(&resolved.resource_path),
            self.inner.store.remove(&metadata_path),
        );
        let content = content?;
        metadata?;

        let stamp = self.inner.index.write().await.remove(title);
        self.inner.evict_body(title).await;
        debug!("Deleted {:?} ({:?})", title, content);

        self.inner
            .persist_index_entry(&resolved.container_path, title, None, stamp)
            .await;
        Ok(())
    }

    /// Side-channel info for a tiddler. Pure.
    pub fn get_info(&self, tiddler: &Tiddler) -> AdaptorInfo {
        AdaptorInfo {
            location: tiddler.location.clone(),
        }
    }

    // ── Configuration ────────────────────────────────────────────

    /// Replaces the container list. Validated first; the index is dropped.
    pub async fn set_containers(&self, containers: &str) -> SyncResult<()> {
        validate_containers(&parse_container_list(containers))?;
        self.inner.config.write().await.containers = containers.to_string();
        info!("Container configuration changed, dropping index");
        self.reset().await;
        Ok(())
    }

    /// Drops the index cache and any warmed bodies.
    pub async fn reset(&self) {
        self.inner.index.write().await.invalidate();
        self.inner.clear_bodies().await;
    }
}

impl Inner {
    async fn containers(&self) -> SyncResult<Vec<String>> {
        let config = self.config.read().await;
        validate_containers(&parse_container_list(&config.containers))
    }

    async fn external_containers(&self) -> SyncResult<Vec<String>> {
        let config = self.config.read().await;
        validate_external_containers(&config.external_containers)
    }

    async fn index_file_path(&self, container: &str) -> String {
        format!("{container}/{}", self.config.read().await.index_file_name)
    }

    async fn is_logged_in(&self) -> bool {
        self.connection.read().await.state == ConnectionState::LoggedIn
    }

    /// Takes over a session: hands the token to the store, drops caches if
    /// the identity changed, starts the prefetch pump, tells the host.
    async fn adopt(self: &Arc<Self>, session: &Session) -> Status {
        self.store
            .set_bearer_token(Some(session.access_token.clone()))
            .await;

        let identity_changed = {
            let mut conn = self.connection.write().await;
            let changed = conn.web_id.as_deref() != Some(session.web_id.as_str());
            conn.state = ConnectionState::LoggedIn;
            conn.web_id = Some(session.web_id.clone());
            changed
        };
        if identity_changed {
            self.index.write().await.invalidate();
            self.clear_session_caches().await;
        }

        self.start_pump();

        let status = Status {
            logged_in: true,
            identity: Some(session.username()),
        };
        info!("Connected to pod as {}", session.web_id);
        self.host.connection_changed(&status);
        status
    }

    async fn drop_session(&self) {
        self.stop_pump();
        {
            let mut conn = self.connection.write().await;
            conn.state = ConnectionState::LoggedOut;
            conn.web_id = None;
        }
        self.store.set_bearer_token(None).await;
        self.index.write().await.invalidate();
        self.clear_session_caches().await;
        self.host.connection_changed(&Status::logged_out());
    }

    async fn clear_session_caches(&self) {
        self.prefetch.lock().await.clear();
        self.clear_bodies().await;
        self.singleton_loaded.store(false, Ordering::SeqCst);
    }

    async fn clear_bodies(&self) {
        self.body_generation.fetch_add(1, Ordering::SeqCst);
        self.bodies.write().await.clear();
    }

    async fn evict_body(&self, title: &str) {
        self.body_generation.fetch_add(1, Ordering::SeqCst);
        self.bodies.write().await.remove(title);
    }

    // ── Index ────────────────────────────────────────────────────

    /// Scans every container's index file and installs the merged result.
    /// Earlier containers win when a title appears twice.
    async fn refresh(&self) -> SyncResult<HashMap<String, Tiddler>> {
        let mut targets: Vec<(String, bool)> = self
            .containers()
            .await?
            .into_iter()
            .map(|c| (c, true))
            .collect();
        targets.extend(self.external_containers().await?.into_iter().map(|c| (c, false)));

        let ticket = self.index.write().await.begin_refresh();
        debug!("Scanning {} containers", targets.len());

        let results = join_all(
            targets
                .iter()
                .map(|(container, writable)| self.scan_container(container, *writable)),
        )
        .await;

        let mut merged = HashMap::new();
        let mut first_error = None;
        let mut any_ok = false;
        for ((container, _), result) in targets.iter().zip(results) {
            match result {
                Ok(entries) => {
                    any_ok = true;
                    for (title, entry) in entries {
                        merged.entry(title).or_insert(entry);
                    }
                }
                Err(e) => {
                    warn!("Skipping container {}: {}", container, e);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let (false, Some(e)) = (any_ok, first_error) {
            self.index.write().await.fail_refresh(ticket);
            return Err(e);
        }

        let mut index = self.index.write().await;
        index.finish_refresh(ticket, merged);
        info!("Index loaded ({} tiddlers)", index.get().map_or(0, HashMap::len));
        Ok(index.get().cloned().unwrap_or_default())
    }

    async fn scan_container(
        &self,
        container: &str,
        writable: bool,
    ) -> SyncResult<HashMap<String, Tiddler>> {
        let index_path = self.index_file_path(container).await;

        match self.store.read(&index_path).await {
            Ok(body) => Ok(parse_index_file(&body, container).unwrap_or_else(|e| {
                warn!("Ignoring malformed index {}: {}", index_path, e);
                HashMap::new()
            })),
            Err(e) if e.is_not_found() => {
                if writable {
                    debug!("No index at {}, creating container", index_path);
                    if let Err(e) = self.create_empty_index(container, &index_path).await {
                        warn!("Could not initialise {}: {}", container, e);
                    }
                }
                Ok(HashMap::new())
            }
            Err(e) => Err(e),
        }
    }

    async fn create_empty_index(&self, container: &str, index_path: &str) -> SyncResult<()> {
        let lock = self.index_file_lock(container).await;
        let _guard = lock.lock().await;

        self.store.ensure_container(container).await?;
        if !self.store.exists(index_path).await? {
            self.store
                .write(index_path, INDEX_CONTENT_TYPE, "{}".to_string(), None)
                .await?;
        }
        Ok(())
    }

    async fn index_file_lock(&self, container: &str) -> Arc<Mutex<()>> {
        self.index_file_locks
            .lock()
            .await
            .entry(container.to_string())
            .or_default()
            .clone()
    }

    /// Writes one cache change through to the container's index file, then
    /// settles it in the cache. A failed write is logged, never returned, and
    /// leaves the file untouched.
    async fn persist_index_entry(
        &self,
        container: &str,
        title: &str,
        entry: Option<&Tiddler>,
        stamp: MutationStamp,
    ) {
        if let Err(e) = self.rewrite_index_file(container, title, entry).await {
            warn!("Index file of {} not updated: {}", container, e);
        }
        self.index.write().await.mark_persisted(title, stamp);
    }

    /// Read-modify-write of one entry in a container's index file.
    async fn rewrite_index_file(
        &self,
        container: &str,
        title: &str,
        entry: Option<&Tiddler>,
    ) -> SyncResult<()> {
        let index_path = self.index_file_path(container).await;
        let lock = self.index_file_lock(container).await;
        let _guard = lock.lock().await;

        let current = match self.store.read(&index_path).await {
            Ok(body) => Some(body),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };
        let body = apply_to_index_file(current.as_deref(), title, entry)?;
        self.store
            .write(&index_path, INDEX_CONTENT_TYPE, body, None)
            .await
    }

    // ── Documents ────────────────────────────────────────────────

    async fn write_tiddler(&self, tiddler: &Tiddler, resolved: &ResolvedPath) -> SyncResult<()> {
        let metadata = self.codec.encode(&tiddler.to_fields()?)?;
        let metadata_path = resolved.metadata_path();

        self.store.ensure_container(&resolved.container_path).await?;
        self.store
            .write(
                &resolved.resource_path,
                tiddler.effective_type(),
                tiddler.text.clone().unwrap_or_default(),
                Some(&metadata_path),
            )
            .await?;
        self.store
            .write(&metadata_path, self.codec.content_type(), metadata, None)
            .await?;

        let stored = tiddler
            .to_skinny()
            .with_location(resolved.container_path.clone());
        let stamp = self.index.write().await.update(&tiddler.title, &stored);
        self.evict_body(&tiddler.title).await;
        info!("Saved {:?} to {}", tiddler.title, resolved.resource_path);

        self.persist_index_entry(&resolved.container_path, &tiddler.title, Some(&stored), stamp)
            .await;
        Ok(())
    }

    /// Tries all containers concurrently and keeps the first hit in
    /// priority order. Absence and undecodable metadata count as misses;
    /// any other failure is reported if nothing was found.
    async fn fetch(&self, title: &str) -> SyncResult<Tiddler> {
        let mut targets = self.containers().await?;
        targets.extend(self.external_containers().await?);

        let results = join_all(targets.iter().map(|c| self.fetch_from(title, c))).await;

        let mut failure = None;
        for result in results {
            match result {
                Ok(tiddler) => return Ok(tiddler),
                Err(SyncError::NotFound(_) | SyncError::Decode(_)) => {}
                Err(e) => {
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
            }
        }

        Err(failure.unwrap_or_else(|| SyncError::NotFoundAnywhere {
            title: title.to_string(),
        }))
    }

    async fn fetch_from(&self, title: &str, container: &str) -> SyncResult<Tiddler> {
        let resolved = resolve(title, Some(container), &[container])?;
        let metadata_path = resolved.metadata_path();

        let (content, metadata) = tokio::join!(
            self.store.read(&resolved.resource_path),
            self.store.read(&metadata_path),
        );
        let text = content?;
        let fields = self.codec.decode(&metadata?)?;

        let mut tiddler = Tiddler::from_fields_with_title(title, fields)
            .map_err(|e| SyncError::Decode(format!("{metadata_path}: {e}")))?;
        tiddler.text = Some(text);
        tiddler.location = Some(container.to_string());
        Ok(tiddler)
    }

    // ── Prefetch pump ────────────────────────────────────────────

    fn start_pump(self: &Arc<Self>) {
        let handle = tokio::spawn(Self::pump(Arc::downgrade(self)));
        if let Ok(mut slot) = self.pump.lock() {
            if let Some(previous) = slot.replace(handle) {
                previous.abort();
            }
        }
    }

    fn stop_pump(&self) {
        if let Ok(mut slot) = self.pump.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }

    async fn pump(weak: Weak<Self>) {
        loop {
            let delay = match weak.upgrade() {
                Some(inner) => {
                    let config = inner.config.read().await;
                    jittered_delay(config.prefetch_interval(), config.prefetch_jitter())
                }
                None => return,
            };
            tokio::time::sleep(delay).await;

            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner.prefetch_one().await;
        }
    }

    async fn prefetch_one(&self) {
        let Some(title) = self.prefetch.lock().await.pop() else {
            return;
        };

        let generation = self.body_generation.load(Ordering::SeqCst);
        match self.fetch(&title).await {
            Ok(tiddler) => {
                let mut bodies = self.bodies.write().await;
                if self.body_generation.load(Ordering::SeqCst) == generation {
                    bodies.insert(title.clone(), tiddler);
                    debug!("Prefetched {:?}", title);
                }
            }
            Err(e) => debug!("Prefetch of {:?} failed: {}", title, e),
        }

        self.prefetch.lock().await.release(&title);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.stop_pump();
    }
}
