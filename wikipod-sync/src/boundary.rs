//! Callback-style entry points for hosts that cannot await.
//!
//! Each method spawns the operation on the given runtime and hands the
//! outcome to a completion callback shaped the way wiki sync adaptors
//! report back: error first, then the payload. The returned handle can be
//! awaited or dropped.

use crate::adaptor::{SaveError, SyncAdaptor};
use crate::error::SyncError;
use crate::host::AdaptorInfo;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use wikipod_types::Tiddler;

/// Callback adapter over a [`SyncAdaptor`].
#[derive(Clone)]
pub struct HostBoundary {
    adaptor: SyncAdaptor,
    runtime: Handle,
}

impl HostBoundary {
    pub fn new(adaptor: SyncAdaptor, runtime: Handle) -> Self {
        Self { adaptor, runtime }
    }

    pub fn adaptor(&self) -> &SyncAdaptor {
        &self.adaptor
    }

    /// `callback(error, logged_in, username)`.
    pub fn get_status<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Option<SyncError>, bool, Option<String>) + Send + 'static,
    {
        let adaptor = self.adaptor.clone();
        self.runtime.spawn(async move {
            match adaptor.status().await {
                Ok(status) => callback(None, status.logged_in, status.identity),
                Err(e) => callback(Some(e), false, None),
            }
        })
    }

    pub fn login<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Option<SyncError>) + Send + 'static,
    {
        let adaptor = self.adaptor.clone();
        self.runtime
            .spawn(async move { callback(adaptor.login().await.err()) })
    }

    pub fn logout<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Option<SyncError>) + Send + 'static,
    {
        let adaptor = self.adaptor.clone();
        self.runtime
            .spawn(async move { callback(adaptor.logout().await.err()) })
    }

    /// `callback(error, skinny_tiddlers)`.
    pub fn get_skinny_tiddlers<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Option<SyncError>, Option<Vec<Tiddler>>) + Send + 'static,
    {
        let adaptor = self.adaptor.clone();
        self.runtime.spawn(async move {
            match adaptor.list().await {
                Ok(entries) => callback(None, Some(entries)),
                Err(e) => callback(Some(e), None),
            }
        })
    }

    /// `callback(error, adaptor_info, revision)`. A failed save still
    /// reports the location and revision it computed.
    pub fn save_tiddler<F>(
        &self,
        tiddler: Tiddler,
        info: Option<AdaptorInfo>,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(Option<SyncError>, Option<AdaptorInfo>, Option<String>) + Send + 'static,
    {
        let adaptor = self.adaptor.clone();
        self.runtime.spawn(async move {
            match adaptor.save(&tiddler, info.as_ref()).await {
                Ok(Some(outcome)) => callback(None, Some(outcome.info), Some(outcome.revision)),
                Ok(None) => callback(None, None, None),
                Err(SaveError { source, outcome }) => match outcome {
                    Some(outcome) => {
                        callback(Some(source), Some(outcome.info), Some(outcome.revision))
                    }
                    None => callback(Some(source), None, None),
                },
            }
        })
    }

    /// `callback(error, tiddler)`.
    pub fn load_tiddler<F>(&self, title: String, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Option<SyncError>, Option<Tiddler>) + Send + 'static,
    {
        let adaptor = self.adaptor.clone();
        self.runtime.spawn(async move {
            match adaptor.load(&title).await {
                Ok(tiddler) => callback(None, tiddler),
                Err(e) => callback(Some(e), None),
            }
        })
    }

    pub fn delete_tiddler<F>(
        &self,
        title: String,
        info: Option<AdaptorInfo>,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(Option<SyncError>) + Send + 'static,
    {
        let adaptor = self.adaptor.clone();
        self.runtime.spawn(async move {
            callback(adaptor.delete(&title, info.as_ref()).await.err())
        })
    }

    /// Synchronous; no remote call involved.
    pub fn get_tiddler_info(&self, tiddler: &Tiddler) -> AdaptorInfo {
        self.adaptor.get_info(tiddler)
    }
}
