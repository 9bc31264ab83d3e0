//! Pod sync adaptor for wikipod.
//!
//! Keeps a wiki's tiddlers in a Solid-style personal data store: every
//! tiddler becomes a content resource plus a `.metadata` sidecar, grouped
//! into containers the user configures.
//!
//! # Architecture
//!
//! ## Components
//!
//! - **Path**: container validation and title → resource path mapping
//! - **Codec**: field bag ↔ Turtle sidecar documents
//! - **Remote**: `RemoteStore` trait and the HTTP pod client
//! - **Index**: skinny title listing with refresh reconciliation
//! - **Prefetch**: background warm-up of bodies discovered by a listing
//! - **Adaptor**: the lifecycle the host drives (status, login, list, save,
//!   load, delete)
//! - **Boundary**: callback-style wrappers for hosts that cannot await
//!
//! ## Layout on the pod
//!
//! ```text
//! /public/tiddlers/main/
//!   __index__.json           title → skinny fields
//!   Hello%2520World          content (native type)
//!   Hello%2520World.metadata Turtle sidecar
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wikipod_sync::{
//!     AdaptorConfig, NullHost, Session, SolidPodClient, SolidPodConfig,
//!     StaticSessionProvider, SyncAdaptor,
//! };
//!
//! # async fn run() -> wikipod_sync::SyncResult<()> {
//! let store = SolidPodClient::new(SolidPodConfig {
//!     pod_origin: "https://alice.pod.example".to_string(),
//!     ..Default::default()
//! });
//! let session = StaticSessionProvider::new(Session::new(
//!     "https://alice.pod.example/profile/card#me",
//!     "token",
//! ));
//! let adaptor = SyncAdaptor::new(
//!     AdaptorConfig::default(),
//!     Arc::new(store),
//!     Arc::new(session),
//!     Arc::new(NullHost),
//! );
//!
//! adaptor.login().await?;
//! for tiddler in adaptor.list().await? {
//!     println!("{}", tiddler.title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod adaptor;
pub mod boundary;
pub mod codec;
mod config;
mod error;
pub mod host;
pub mod index;
pub mod path;
pub mod prefetch;
pub mod remote;
mod revision;
pub mod session;

pub use adaptor::{SaveError, SaveOutcome, SyncAdaptor};
pub use boundary::HostBoundary;
pub use codec::{JsonLdCodec, MetadataCodec, TurtleCodec};
pub use config::AdaptorConfig;
pub use error::{SyncError, SyncResult, TRUST_REMEDIATION};
pub use host::{AdaptorInfo, ConnectionState, NullHost, Status, WikiHost};
pub use index::{IndexCache, IndexState};
pub use path::{ResolvedPath, double_decode, double_encode, resolve};
pub use prefetch::PrefetchQueue;
pub use remote::{RemoteStore, RemoveOutcome, SolidPodClient, SolidPodConfig};
pub use revision::revision;
pub use session::{Session, SessionProvider, StaticSessionProvider};
