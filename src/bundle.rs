//! The unit cache: one immutable snapshot of the most recent unpack.
//!
//! A bundle decomposition is installed wholesale and never patched — each
//! unpack discards the previous snapshot entirely. Queries hold an
//! `Arc<Bundle>` handle, so a replace happening "behind" a long scan can
//! never tear the snapshot out from under it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{QueryError, QueryResult};
use crate::vendor::is_vendor_path;

/// One addressable block of source text from a bundle decomposition.
///
/// `path` may be synthetic (e.g. `index.js` for a virtual entry unit that
/// never existed as a file).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    pub path: String,
    pub code: String,
}

impl Unit {
    pub fn new(id: impl Into<String>, path: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            code: code.into(),
        }
    }

    pub fn is_vendor(&self) -> bool {
        is_vendor_path(&self.path)
    }
}

/// The complete set of units from one unpack call.
///
/// Insertion order is the iteration order of every multi-unit query.
#[derive(Debug, Default)]
pub struct Bundle {
    units: Vec<Unit>,
    by_id: HashMap<String, usize>,
}

impl Bundle {
    pub fn new(units: Vec<Unit>) -> Self {
        let by_id = units
            .iter()
            .enumerate()
            .map(|(i, u)| (u.id.clone(), i))
            .collect();
        Self { units, by_id }
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Unit> {
        self.by_id.get(id).map(|&i| &self.units[i])
    }

    /// Like `get`, but failing `UnitNotFound` — for query surfaces where a
    /// missing id is a caller error rather than an absence to tolerate.
    pub fn require(&self, id: &str) -> QueryResult<&Unit> {
        self.get(id)
            .ok_or_else(|| QueryError::UnitNotFound(id.to_string()))
    }

    pub fn vendor_count(&self) -> usize {
        self.units.iter().filter(|u| u.is_vendor()).count()
    }
}

/// Process-lifetime single-slot store for the live snapshot.
///
/// `replace` is a handle swap: the old `Arc<Bundle>` stays alive only for
/// queries that already cloned it.
#[derive(Default)]
pub struct BundleCache {
    current: Option<Arc<Bundle>>,
}

impl BundleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new snapshot, discarding any prior one.
    pub fn replace(&mut self, bundle: Bundle) -> Arc<Bundle> {
        let handle = Arc::new(bundle);
        self.current = Some(Arc::clone(&handle));
        handle
    }

    /// The live snapshot, or `NoBundle` when nothing has been unpacked yet.
    pub fn current(&self) -> QueryResult<Arc<Bundle>> {
        self.current.clone().ok_or(QueryError::NoBundle)
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}
