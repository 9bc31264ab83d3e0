//! Index cache.
//!
//! Skinny metadata for every known tiddler, keyed by title.
//!
//! ```text
//! Unloaded --begin_refresh--> Loading --finish_refresh--> Loaded
//!    ^                           |                           |
//!    +-------fail_refresh--------+                           |
//!    +-----------------------invalidate----------------------+
//! ```
//!
//! A refresh runs in two halves around the remote fan-out. Every local
//! mutation (`update`/`remove`) is stamped with a monotonic version and kept
//! until its index-file write has landed ([`IndexCache::mark_persisted`]) and
//! a refresh issued after that write has finished. Until then each finishing
//! refresh replays it over the scanned snapshot, so a save is never
//! overwritten by a remote view older than its index-file write. Tickets
//! issued before an `invalidate` are ignored.

use crate::error::{SyncError, SyncResult};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};
use wikipod_types::{FieldMap, Tiddler};

/// Load state of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Unloaded,
    Loading,
    Loaded,
}

/// Issued by [`IndexCache::begin_refresh`]; hands the refresh's starting
/// point back to [`IndexCache::finish_refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket {
    epoch: u64,
    since: u64,
}

/// Returned by [`IndexCache::update`] and [`IndexCache::remove`]; hands the
/// change back to [`IndexCache::mark_persisted`] once the index file has it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationStamp {
    version: u64,
}

/// A local change not yet covered by a finished refresh.
#[derive(Debug, Clone)]
struct LocalMutation {
    version: u64,
    /// `None` marks a removal.
    entry: Option<Tiddler>,
    /// Clock value once the index-file write landed.
    persisted_at: Option<u64>,
}

impl LocalMutation {
    /// True once a scan issued at `since` is guaranteed to see this change.
    fn covered_by(&self, since: u64) -> bool {
        self.persisted_at.is_some_and(|at| at <= since)
    }
}

/// In-memory title → skinny tiddler map with refresh reconciliation.
#[derive(Debug)]
pub struct IndexCache {
    state: IndexState,
    entries: HashMap<String, Tiddler>,
    mutations: HashMap<String, LocalMutation>,
    clock: u64,
    epoch: u64,
}

impl Default for IndexCache {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexCache {
    /// Creates an unloaded cache.
    pub fn new() -> Self {
        Self {
            state: IndexState::Unloaded,
            entries: HashMap::new(),
            mutations: HashMap::new(),
            clock: 0,
            epoch: 0,
        }
    }

    pub fn state(&self) -> IndexState {
        self.state
    }

    /// Returns the entries, or `None` unless loaded.
    pub fn get(&self) -> Option<&HashMap<String, Tiddler>> {
        match self.state {
            IndexState::Loaded => Some(&self.entries),
            _ => None,
        }
    }

    /// Returns one entry if loaded and present.
    pub fn entry(&self, title: &str) -> Option<&Tiddler> {
        self.get().and_then(|entries| entries.get(title))
    }

    /// Marks a remote scan as started.
    pub fn begin_refresh(&mut self) -> RefreshTicket {
        if self.state == IndexState::Unloaded {
            self.state = IndexState::Loading;
        }
        RefreshTicket {
            epoch: self.epoch,
            since: self.clock,
        }
    }

    /// Installs a scanned snapshot, replaying every local mutation the scan
    /// may have missed. Returns false if the ticket was invalidated meanwhile.
    pub fn finish_refresh(
        &mut self,
        ticket: RefreshTicket,
        scanned: HashMap<String, Tiddler>,
    ) -> bool {
        if ticket.epoch != self.epoch {
            debug!("Discarding index refresh from a previous epoch");
            return false;
        }

        let mut entries = scanned;
        self.mutations.retain(|title, mutation| {
            if mutation.covered_by(ticket.since) {
                return false;
            }
            match &mutation.entry {
                Some(entry) => {
                    entries.insert(title.clone(), entry.clone());
                }
                None => {
                    entries.remove(title);
                }
            }
            true
        });

        self.entries = entries;
        self.state = IndexState::Loaded;
        true
    }

    /// Records a failed scan.
    pub fn fail_refresh(&mut self, ticket: RefreshTicket) {
        if ticket.epoch != self.epoch {
            return;
        }
        if self.state == IndexState::Loading {
            self.state = IndexState::Unloaded;
        }
    }

    /// Inserts or replaces an entry. The body is dropped.
    pub fn update(&mut self, title: &str, entry: &Tiddler) -> MutationStamp {
        let skinny = entry.to_skinny();
        let stamp = self.record(title, Some(skinny.clone()));
        if self.state == IndexState::Loaded {
            self.entries.insert(title.to_string(), skinny);
        }
        stamp
    }

    /// Removes an entry.
    pub fn remove(&mut self, title: &str) -> MutationStamp {
        let stamp = self.record(title, None);
        self.entries.remove(title);
        stamp
    }

    /// Notes that the index file now reflects the change behind `stamp`, or
    /// that writing it was given up. Refreshes issued from here on no longer
    /// replay it. A stamp superseded by a later change of the same title is
    /// ignored.
    pub fn mark_persisted(&mut self, title: &str, stamp: MutationStamp) {
        self.clock += 1;
        if let Some(mutation) = self.mutations.get_mut(title) {
            if mutation.version == stamp.version {
                mutation.persisted_at = Some(self.clock);
            }
        }
    }

    /// Number of local changes still replayed by refreshes.
    pub fn pending_mutations(&self) -> usize {
        self.mutations.len()
    }

    /// Drops everything and returns to `Unloaded`.
    pub fn invalidate(&mut self) {
        self.epoch += 1;
        self.state = IndexState::Unloaded;
        self.entries.clear();
        self.mutations.clear();
    }

    fn record(&mut self, title: &str, entry: Option<Tiddler>) -> MutationStamp {
        self.clock += 1;
        self.mutations.insert(
            title.to_string(),
            LocalMutation {
                version: self.clock,
                entry,
                persisted_at: None,
            },
        );
        MutationStamp { version: self.clock }
    }
}

/// Parses a per-container index file (title → skinny fields) into tiddlers
/// located in `container`.
pub fn parse_index_file(body: &str, container: &str) -> SyncResult<HashMap<String, Tiddler>> {
    let raw: BTreeMap<String, Value> = serde_json::from_str(body)?;
    let mut out = HashMap::with_capacity(raw.len());

    for (title, value) in raw {
        let fields = match value {
            Value::Object(fields) => fields,
            _ => FieldMap::new(),
        };
        let mut tiddler = match Tiddler::from_fields_with_title(&title, fields) {
            Ok(t) => t.to_skinny(),
            Err(e) => {
                warn!("Skipping unreadable index entry {:?} in {}: {}", title, container, e);
                continue;
            }
        };
        tiddler.location = Some(container.to_string());
        out.insert(title, tiddler);
    }

    Ok(out)
}

/// Applies one change to an index file body and returns the new body.
///
/// A missing body starts from an empty index. An unreadable one is refused
/// with `Decode` so the caller never overwrites titles it could not parse.
pub fn apply_to_index_file(
    body: Option<&str>,
    title: &str,
    entry: Option<&Tiddler>,
) -> SyncResult<String> {
    let mut raw: BTreeMap<String, Value> = match body {
        Some(body) => serde_json::from_str(body)
            .map_err(|e| SyncError::Decode(format!("unreadable index file: {e}")))?,
        None => BTreeMap::new(),
    };

    match entry {
        Some(entry) => {
            let mut fields = entry.to_skinny().to_fields()?;
            fields.remove("title");
            raw.insert(title.to_string(), Value::Object(fields));
        }
        None => {
            raw.remove(title);
        }
    }

    Ok(serde_json::to_string(&raw)?)
}
