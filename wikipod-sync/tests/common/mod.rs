#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;
use wikipod_sync::codec::{MetadataCodec, TurtleCodec};
use wikipod_sync::index::apply_to_index_file;
use wikipod_sync::{
    AdaptorConfig, RemoteStore, RemoveOutcome, Session, StaticSessionProvider, Status, SyncAdaptor,
    SyncError, SyncResult, WikiHost, resolve,
};
use wikipod_types::Tiddler;

pub const ALICE: &str = "https://alice.pod.example/profile/card#me";
pub const BOB: &str = "https://bob.pod.example/profile/card#me";

/// Store operation, as recorded by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Read(String),
    Write(String),
    Remove(String),
    Exists(String),
    CreateContainer(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Read,
    Write,
    Remove,
    Exists,
}

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Transport,
    Forbidden,
    UntrustedOrigin,
}

impl Failure {
    fn error(self, path: &str) -> SyncError {
        match self {
            Failure::Transport => SyncError::Transport(format!("{path}: connection reset")),
            Failure::Forbidden => SyncError::Auth(format!("{path} answered 403 Forbidden")),
            Failure::UntrustedOrigin => SyncError::untrusted_origin("origin not trusted"),
        }
    }
}

/// In-memory pod. Pod roots exist from the start.
pub struct MemoryStore {
    resources: Mutex<BTreeMap<String, (String, String)>>,
    containers: Mutex<BTreeSet<String>>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<Vec<(Op, String, Failure)>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    token: Mutex<Option<String>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let roots = ["/public", "/private", "/inbox", "/profile"]
            .into_iter()
            .map(str::to_string)
            .collect();
        Self {
            resources: Mutex::new(BTreeMap::new()),
            containers: Mutex::new(roots),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            gates: Mutex::new(HashMap::new()),
            token: Mutex::new(None),
        }
    }

    pub fn put(&self, path: &str, body: &str) {
        self.resources
            .lock()
            .unwrap()
            .insert(path.to_string(), ("text/plain".to_string(), body.to_string()));
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.resources.lock().unwrap().get(path).map(|(_, b)| b.clone())
    }

    pub fn content_type(&self, path: &str) -> Option<String> {
        self.resources.lock().unwrap().get(path).map(|(t, _)| t.clone())
    }

    pub fn has_container(&self, path: &str) -> bool {
        self.containers.lock().unwrap().contains(path)
    }

    pub fn add_container(&self, path: &str) {
        self.containers.lock().unwrap().insert(path.to_string());
    }

    pub fn token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn count(&self, wanted: &Call) -> usize {
        self.calls().iter().filter(|c| *c == wanted).count()
    }

    pub fn was_read(&self, path: &str) -> bool {
        self.count(&Call::Read(path.to_string())) > 0
    }

    /// Makes every `op` on a path containing `needle` fail.
    pub fn fail(&self, op: Op, needle: &str, failure: Failure) {
        self.failures
            .lock()
            .unwrap()
            .push((op, needle.to_string(), failure));
    }

    pub fn heal(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// The next read of `path` waits until the returned gate is notified.
    pub fn hold_next_read(&self, path: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(path.to_string(), gate.clone());
        gate
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, op: Op, path: &str) -> SyncResult<()> {
        let failures = self.failures.lock().unwrap();
        match failures
            .iter()
            .find(|(o, needle, _)| *o == op && path.contains(needle.as_str()))
        {
            Some((_, _, failure)) => Err(failure.error(path)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn set_bearer_token(&self, token: Option<String>) {
        *self.token.lock().unwrap() = token;
    }

    async fn read(&self, path: &str) -> SyncResult<String> {
        self.record(Call::Read(path.to_string()));
        // The answer is fixed when the request arrives, like a response in flight.
        let result = self.check(Op::Read, path).and_then(|()| {
            self.get(path)
                .ok_or_else(|| SyncError::NotFound(path.to_string()))
        });
        let gate = self.gates.lock().unwrap().remove(path);
        if let Some(gate) = gate {
            gate.notified().await;
        }
        result
    }

    async fn write(
        &self,
        path: &str,
        content_type: &str,
        body: String,
        _described_by: Option<&str>,
    ) -> SyncResult<()> {
        self.record(Call::Write(path.to_string()));
        self.check(Op::Write, path)?;
        self.resources
            .lock()
            .unwrap()
            .insert(path.to_string(), (content_type.to_string(), body));
        Ok(())
    }

    async fn remove(&self, path: &str) -> SyncResult<RemoveOutcome> {
        self.record(Call::Remove(path.to_string()));
        self.check(Op::Remove, path)?;
        match self.resources.lock().unwrap().remove(path) {
            Some(_) => Ok(RemoveOutcome::Removed),
            None => Ok(RemoveOutcome::Absent),
        }
    }

    async fn exists(&self, path: &str) -> SyncResult<bool> {
        self.record(Call::Exists(path.to_string()));
        self.check(Op::Exists, path)?;
        match path.strip_suffix('/') {
            Some(container) => Ok(self.has_container(container)),
            None => Ok(self.resources.lock().unwrap().contains_key(path)),
        }
    }

    async fn create_container(&self, path: &str) -> SyncResult<()> {
        self.record(Call::CreateContainer(path.to_string()));
        self.add_container(path.trim_end_matches('/'));
        Ok(())
    }
}

/// Host that remembers every notification.
#[derive(Default)]
pub struct RecordingHost {
    statuses: Mutex<Vec<Status>>,
    login_requests: AtomicUsize,
}

impl RecordingHost {
    pub fn statuses(&self) -> Vec<Status> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn login_requests(&self) -> usize {
        self.login_requests.load(Ordering::SeqCst)
    }
}

impl WikiHost for RecordingHost {
    fn connection_changed(&self, status: &Status) {
        self.statuses.lock().unwrap().push(status.clone());
    }

    fn request_login(&self) {
        self.login_requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Default config with the prefetch pump effectively parked.
pub fn quiet_config(containers: &str) -> AdaptorConfig {
    AdaptorConfig {
        prefetch_interval_ms: 3_600_000,
        prefetch_jitter_ms: 0,
        ..AdaptorConfig::with_containers(containers)
    }
}

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub host: Arc<RecordingHost>,
    pub session: Arc<StaticSessionProvider>,
    pub adaptor: SyncAdaptor,
}

/// Adaptor over a fresh memory store whose session provider will sign in
/// as Alice. Not logged in yet.
pub fn fixture(config: AdaptorConfig) -> Fixture {
    fixture_with_store(config, Arc::new(MemoryStore::new()))
}

pub fn fixture_with_store(config: AdaptorConfig, store: Arc<MemoryStore>) -> Fixture {
    init_tracing();
    let host = Arc::new(RecordingHost::default());
    let session = Arc::new(StaticSessionProvider::new(Session::new(ALICE, "alice-token")));
    let adaptor = SyncAdaptor::new(config, store.clone(), session.clone(), host.clone());
    Fixture {
        store,
        host,
        session,
        adaptor,
    }
}

/// Same as [`fixture`], logged in.
pub async fn logged_in(config: AdaptorConfig) -> Fixture {
    let fx = fixture(config);
    fx.adaptor.login().await.unwrap();
    fx
}

/// Writes a tiddler straight into the store the way a save would leave it.
pub fn seed(store: &MemoryStore, container: &str, tiddler: &Tiddler) {
    let resolved = resolve(&tiddler.title, Some(container), &[container]).unwrap();
    store.add_container(container);
    store.put(
        &resolved.resource_path,
        tiddler.text.as_deref().unwrap_or_default(),
    );
    store.put(
        &resolved.metadata_path(),
        &TurtleCodec.encode(&tiddler.to_fields().unwrap()).unwrap(),
    );

    let index_path = format!("{container}/__index__.json");
    let body = apply_to_index_file(store.get(&index_path).as_deref(), &tiddler.title, Some(tiddler))
        .unwrap();
    store.put(&index_path, &body);
}

pub fn index_path(container: &str) -> String {
    format!("{container}/__index__.json")
}

/// Routes adaptor logs to the test harness; `RUST_LOG=wikipod_sync=debug` shows them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
