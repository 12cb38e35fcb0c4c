//! Sheet versions: one scanned revision of one comic page.
//!
//! A [`SheetVersion`] pairs a logical name with the scan on disk and carries
//! its own [`PreparationState`]. The state lives only as long as the process;
//! what persists across runs is the cache entry it points at.

use crate::cache::{ArtifactPaths, CacheEntry};
use crate::fingerprint::Fingerprint;
use crate::imaging::Threshold;
use crate::panels::PanelNode;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// What downstream generators read once a sheet is prepared.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub fingerprint: Fingerprint,
    pub artifacts: ArtifactPaths,
    pub entry: Arc<CacheEntry>,
}

impl Prepared {
    pub fn panel_tree(&self) -> &PanelNode {
        &self.entry.panel_tree
    }
}

/// Per-sheet "done" flag plus the lock that serializes preparation.
///
/// `done` is only set while `slot` is held and after `slot` is filled, so a
/// reader that sees `done` also sees the result.
#[derive(Debug, Default)]
pub struct PreparationState {
    pub(crate) done: AtomicBool,
    pub(crate) slot: Mutex<Option<Prepared>>,
}

#[derive(Debug)]
pub struct SheetVersion {
    name: String,
    source: PathBuf,
    threshold: Option<Threshold>,
    prep: PreparationState,
}

impl SheetVersion {
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            threshold: None,
            prep: PreparationState::default(),
        }
    }

    /// Binarize this sheet with `threshold` instead of the project's.
    pub fn with_threshold(mut self, threshold: Threshold) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn threshold(&self) -> Option<Threshold> {
        self.threshold
    }

    pub fn is_prepared(&self) -> bool {
        self.prep.done.load(Ordering::Acquire)
    }

    /// The preparation result, once [`Preparer::ensure`](crate::prepare::Preparer::ensure)
    /// has succeeded for this sheet.
    pub fn prepared(&self) -> Option<Prepared> {
        if !self.is_prepared() {
            return None;
        }
        self.prep.slot.lock().clone()
    }

    pub(crate) fn state(&self) -> &PreparationState {
        &self.prep
    }
}
