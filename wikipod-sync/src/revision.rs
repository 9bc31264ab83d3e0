//! Revision tokens.
//!
//! A revision is the SHA-256 of the tiddler's canonical JSON field bag, hex
//! encoded. Top-level keys are sorted before hashing so equal field sets
//! always hash the same. `location` is not part of the bag.

use crate::error::SyncResult;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use wikipod_types::Tiddler;

/// Computes the 64-character revision token for a tiddler.
pub fn revision(tiddler: &Tiddler) -> SyncResult<String> {
    let fields: BTreeMap<String, serde_json::Value> = tiddler.to_fields()?.into_iter().collect();
    let canonical = serde_json::to_vec(&fields)?;

    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(hex::encode(hasher.finalize()))
}
