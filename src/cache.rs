//! Content-addressed artifact cache for prepared sheets.
//!
//! Converting a scan to monochrome and segmenting it into panels is the
//! expensive part of every build. This module keeps the results on disk so a
//! page is only ever prepared once per distinct byte content.
//!
//! # Design
//!
//! ## Cache keys
//!
//! The cache is **content-addressed**: entries are keyed by the
//! [`Fingerprint`] of the scan's bytes, not by its path. Renaming, moving or
//! copying a scan keeps its entry.
//!
//! Each entry also records the `params_hash` of the settings it was derived
//! with ([`ArtifactConfig::params_hash`](crate::imaging::ArtifactConfig::params_hash)).
//! A hit requires both to match: changing the threshold, the small width or
//! the segmentation ratios recomputes the artifacts.
//!
//! Source rows are keyed by canonical absolute path, so the index means the
//! same thing whichever directory the process runs from.
//!
//! ## Storage
//!
//! ```text
//! .ccache/
//! ├── index.json                 # { version, sources, entries }
//! ├── 3f2a…c9/                   # one directory per fingerprint
//! │   ├── monochrome.png
//! │   └── monochrome_small.png
//! └── .staging-4711-3/           # in-flight writes, renamed into place
//! ```
//!
//! `index.json` maps each known source path to its fingerprint (`sources`)
//! and each fingerprint to its [`CacheEntry`] (`entries`). Artifact paths are
//! not stored: they are a function of the fingerprint ([`ArtifactPaths`]).
//!
//! ## Consistency
//!
//! - Artifacts are written into a private staging directory and renamed into
//!   place by [`ArtifactCache::store`], so an entry never points at partially
//!   written files, even if the process dies mid-conversion.
//! - A source whose content changed loses its row, and the old entry goes
//!   with it unless another source still has the same bytes.
//! - [`ArtifactCache::load`] runs a garbage collection pass: rows of deleted
//!   sources, entries nobody references, and leftover directories go away.
//! - All index mutation goes through one mutex. Index saves are explicit and
//!   batched by the caller ([`ArtifactCache::save`]).
//! - Computation of one fingerprint is serialized across sheets by
//!   [`ArtifactCache::gate`], so two copies of a scan prepared in parallel
//!   do the work once.

use crate::fingerprint::Fingerprint;
use crate::panels::PanelNode;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Name of the index file within the cache root.
const INDEX_FILENAME: &str = "index.json";

/// Version of the index format. Bump this to discard all existing caches
/// when the format or the derivation of artifacts changes.
const INDEX_VERSION: u32 = 2;

pub const MONOCHROME_FILE: &str = "monochrome.png";
pub const MONOCHROME_SMALL_FILE: &str = "monochrome_small.png";

/// Prefix of in-flight artifact directories: `.staging-<pid>-<seq>`.
const STAGING_PREFIX: &str = ".staging-";

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Corrupt cache index {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn io_at(path: &Path) -> impl FnOnce(io::Error) -> CacheError + '_ {
    move |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// The cached result of preparing one distinct scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// The file this entry was first derived from. Provenance only.
    pub source_file_path: PathBuf,
    /// Hash of the settings the artifacts were derived with.
    pub params_hash: String,
    pub panel_tree: PanelNode,
}

/// Locations of a fingerprint's derived images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
    pub monochrome: PathBuf,
    pub monochrome_small: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            monochrome: dir.join(MONOCHROME_FILE),
            monochrome_small: dir.join(MONOCHROME_SMALL_FILE),
        }
    }

    /// Both image files are on disk.
    pub fn exist(&self) -> bool {
        self.monochrome.is_file() && self.monochrome_small.is_file()
    }
}

/// Outcome of [`ArtifactCache::lookup`].
#[derive(Debug, Clone)]
pub enum Lookup {
    Hit {
        fingerprint: Fingerprint,
        entry: Arc<CacheEntry>,
    },
    /// No usable entry. `invalidated` is set when a previous entry for this
    /// source (or its vanished artifacts) was dropped on the way.
    Miss {
        fingerprint: Fingerprint,
        invalidated: bool,
    },
}

impl Lookup {
    pub fn fingerprint(&self) -> &Fingerprint {
        match self {
            Lookup::Hit { fingerprint, .. } | Lookup::Miss { fingerprint, .. } => fingerprint,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Lookup::Hit { .. })
    }
}

/// What a garbage collection pass removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GcStats {
    pub stale_sources: usize,
    pub orphan_entries: usize,
    pub removed_dirs: usize,
}

impl GcStats {
    pub fn is_empty(&self) -> bool {
        self.stale_sources == 0 && self.orphan_entries == 0 && self.removed_dirs == 0
    }
}

impl fmt::Display for GcStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "nothing to collect")
        } else {
            write!(
                f,
                "{} stale sources, {} orphaned entries, {} directories removed",
                self.stale_sources, self.orphan_entries, self.removed_dirs
            )
        }
    }
}

#[derive(Serialize)]
struct IndexOut<'a> {
    version: u32,
    sources: &'a BTreeMap<PathBuf, Fingerprint>,
    entries: BTreeMap<&'a Fingerprint, &'a CacheEntry>,
}

/// Read after the version has been checked by [`VersionHeader`].
#[derive(Deserialize)]
struct IndexIn {
    #[serde(default)]
    sources: BTreeMap<PathBuf, Fingerprint>,
    #[serde(default)]
    entries: BTreeMap<Fingerprint, CacheEntry>,
}

#[derive(Deserialize)]
struct VersionHeader {
    version: u32,
}

#[derive(Default)]
struct CacheState {
    sources: BTreeMap<PathBuf, Fingerprint>,
    entries: BTreeMap<Fingerprint, Arc<CacheEntry>>,
    dirty: bool,
}

impl CacheState {
    fn is_referenced(&self, fingerprint: &Fingerprint) -> bool {
        self.sources.values().any(|fp| fp == fingerprint)
    }
}

/// Index row key: the canonical absolute path, or the path as given when it
/// cannot be resolved (the file is gone).
fn row_key(source: &Path) -> PathBuf {
    fs::canonicalize(source).unwrap_or_else(|_| source.to_path_buf())
}

/// Persistent fingerprint → entry store. Safe to share across threads.
pub struct ArtifactCache {
    root: PathBuf,
    state: Mutex<CacheState>,
    staging_seq: AtomicU64,
    inflight: Mutex<HashMap<Fingerprint, Arc<Mutex<()>>>>,
}

/// Exclusive right to compute one fingerprint, from [`ArtifactCache::gate`].
pub struct ComputeGate<'a> {
    cache: &'a ArtifactCache,
    fingerprint: Fingerprint,
    lock: Arc<Mutex<()>>,
}

impl ComputeGate<'_> {
    /// Block until no other sheet is computing this fingerprint.
    pub fn hold(&self) -> MutexGuard<'_, ()> {
        self.lock.lock()
    }
}

impl Drop for ComputeGate<'_> {
    fn drop(&mut self) {
        let mut inflight = self.cache.inflight.lock();
        // ours plus the map's
        if Arc::strong_count(&self.lock) == 2 {
            inflight.remove(&self.fingerprint);
        }
    }
}

impl ArtifactCache {
    /// Open the cache at `root` without collecting garbage.
    ///
    /// Creates the directory on first use. A missing index is an empty cache;
    /// an index from another format version is discarded with a warning; an
    /// unparseable or structurally invalid index is an error.
    pub fn open(root: &Path) -> Result<Self, CacheError> {
        fs::create_dir_all(root).map_err(io_at(root))?;
        let cache = Self {
            root: root.to_path_buf(),
            state: Mutex::new(CacheState::default()),
            staging_seq: AtomicU64::new(0),
            inflight: Mutex::new(HashMap::new()),
        };

        let path = cache.index_path();
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(cache),
            Err(e) => return Err(io_at(&path)(e)),
        };
        let corrupt = |reason: String| CacheError::Corrupt {
            path: path.clone(),
            reason,
        };

        let header: VersionHeader =
            serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?;
        if header.version != INDEX_VERSION {
            warn!(
                found = header.version,
                expected = INDEX_VERSION,
                "discarding cache index from another version"
            );
            cache.state.lock().dirty = true;
            return Ok(cache);
        }

        let index: IndexIn = serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?;
        for (fp, entry) in &index.entries {
            entry
                .panel_tree
                .validate()
                .map_err(|e| corrupt(format!("entry {fp}: {e}")))?;
        }
        {
            let mut state = cache.state.lock();
            state.sources = index.sources;
            state.entries = index
                .entries
                .into_iter()
                .map(|(fp, entry)| (fp, Arc::new(entry)))
                .collect();
        }
        Ok(cache)
    }

    /// Open the cache at `root` and run the garbage collection pass.
    pub fn load(root: &Path) -> Result<Self, CacheError> {
        let cache = Self::open(root)?;
        let stats = cache.collect_garbage()?;
        if stats.is_empty() {
            debug!(root = %root.display(), "cache clean");
        } else {
            info!(root = %root.display(), "cache gc: {stats}");
        }
        Ok(cache)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILENAME)
    }

    /// Where the artifacts of `fingerprint` live, whether or not they exist.
    pub fn artifacts(&self, fingerprint: &Fingerprint) -> ArtifactPaths {
        ArtifactPaths::in_dir(&self.root.join(fingerprint.as_str()))
    }

    pub fn entry(&self, fingerprint: &Fingerprint) -> Option<Arc<CacheEntry>> {
        self.state.lock().entries.get(fingerprint).cloned()
    }

    /// Fingerprint last recorded for `source`.
    pub fn fingerprint_of(&self, source: &Path) -> Option<Fingerprint> {
        self.state.lock().sources.get(&row_key(source)).cloned()
    }

    pub fn entry_count(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn source_count(&self) -> usize {
        self.state.lock().sources.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    /// Drop rows of sources that no longer exist, entries no row references,
    /// and directories under the root that belong to no entry.
    ///
    /// Must not run while preparations are in flight in another process
    /// sharing this cache; staging directories of this process are kept.
    pub fn collect_garbage(&self) -> Result<GcStats, CacheError> {
        let mut stats = GcStats::default();
        let mut state = self.state.lock();

        let before = state.sources.len();
        let CacheState {
            sources, entries, ..
        } = &mut *state;
        sources.retain(|path, fp| {
            path.is_absolute() && path.is_file() && entries.contains_key(fp)
        });
        stats.stale_sources = before - sources.len();

        let referenced: BTreeSet<&Fingerprint> = sources.values().collect();
        let orphans: Vec<Fingerprint> = entries
            .keys()
            .filter(|fp| !referenced.contains(fp))
            .cloned()
            .collect();
        for fp in &orphans {
            entries.remove(fp);
        }
        stats.orphan_entries = orphans.len();

        let own_staging = format!("{STAGING_PREFIX}{}-", std::process::id());
        for dirent in fs::read_dir(&self.root).map_err(io_at(&self.root))? {
            let dirent = dirent.map_err(io_at(&self.root))?;
            let path = dirent.path();
            if !path.is_dir() {
                continue;
            }
            let name = dirent.file_name().to_string_lossy().into_owned();
            let stale = if name.starts_with(STAGING_PREFIX) {
                !name.starts_with(&own_staging)
            } else {
                name.parse::<Fingerprint>()
                    .is_ok_and(|fp| !state.entries.contains_key(&fp))
            };
            if stale {
                fs::remove_dir_all(&path).map_err(io_at(&path))?;
                stats.removed_dirs += 1;
            }
        }

        if stats.stale_sources > 0 || stats.orphan_entries > 0 {
            state.dirty = true;
        }
        Ok(stats)
    }

    /// Fingerprint `source` and find its entry for `params_hash`.
    ///
    /// - Same content as last recorded: hit.
    /// - Content changed: the old row is dropped, and the old entry with its
    ///   artifacts too unless another source still references it; miss.
    /// - Never seen: hit if another source already produced an entry for
    ///   these bytes (the row is recorded), miss otherwise.
    ///
    /// An entry derived with other settings, or whose artifact files have
    /// vanished, is dropped and reported as an invalidating miss. Rows that
    /// point at it stay, and pick up the recomputed entry once stored.
    pub fn lookup(&self, source: &Path, params_hash: &str) -> Result<Lookup, CacheError> {
        let fingerprint = Fingerprint::of_file(source).map_err(io_at(source))?;
        let key = row_key(source);
        let mut state = self.state.lock();
        let mut invalidated = false;

        let previous = state.sources.get(&key).cloned();
        if let Some(old) = previous.as_ref().filter(|old| **old != fingerprint) {
            debug!(source = %key.display(), old = %old, new = %fingerprint, "source changed");
            state.sources.remove(&key);
            state.dirty = true;
            invalidated = true;
            if !state.is_referenced(old) && state.entries.remove(old).is_some() {
                self.remove_artifacts(old)?;
            }
        }

        let Some(entry) = state.entries.get(&fingerprint).cloned() else {
            return Ok(Lookup::Miss {
                fingerprint,
                invalidated,
            });
        };

        let stale = if entry.params_hash != params_hash {
            debug!(fingerprint = %fingerprint, "settings changed, dropping entry");
            true
        } else if !self.artifacts(&fingerprint).exist() {
            debug!(fingerprint = %fingerprint, "artifacts missing, dropping entry");
            true
        } else {
            false
        };
        if stale {
            state.entries.remove(&fingerprint);
            state.dirty = true;
            self.remove_artifacts(&fingerprint)?;
            return Ok(Lookup::Miss {
                fingerprint,
                invalidated: true,
            });
        }

        if previous.as_ref() != Some(&fingerprint) {
            debug!(
                source = %key.display(),
                fingerprint = %fingerprint,
                "known content at new path"
            );
            state.sources.insert(key, fingerprint.clone());
            state.dirty = true;
        }
        Ok(Lookup::Hit { fingerprint, entry })
    }

    /// The complete entry for `fingerprint` under `params_hash`, if one
    /// exists, recording `source` as one of its rows. Used after waiting on
    /// a [`ComputeGate`] to pick up what another sheet just stored.
    pub fn adopt(
        &self,
        source: &Path,
        fingerprint: &Fingerprint,
        params_hash: &str,
    ) -> Option<Arc<CacheEntry>> {
        let mut state = self.state.lock();
        let entry = state
            .entries
            .get(fingerprint)
            .filter(|e| e.params_hash == params_hash)
            .cloned()?;
        if !self.artifacts(fingerprint).exist() {
            return None;
        }
        let key = row_key(source);
        if state.sources.get(&key) != Some(fingerprint) {
            state.sources.insert(key, fingerprint.clone());
            state.dirty = true;
        }
        Some(entry)
    }

    /// Claim the right to compute `fingerprint`. Other sheets with the same
    /// bytes wait in [`ComputeGate::hold`] until the claim is released.
    pub fn gate(&self, fingerprint: &Fingerprint) -> ComputeGate<'_> {
        let lock = Arc::clone(self.inflight.lock().entry(fingerprint.clone()).or_default());
        ComputeGate {
            cache: self,
            fingerprint: fingerprint.clone(),
            lock,
        }
    }

    /// Create a fresh private directory for writing `fingerprint`'s artifacts.
    pub fn staging_dir(&self, fingerprint: &Fingerprint) -> Result<PathBuf, CacheError> {
        let seq = self.staging_seq.fetch_add(1, Ordering::Relaxed);
        let short: String = fingerprint.as_str().chars().take(12).collect();
        let dir = self.root.join(format!(
            "{STAGING_PREFIX}{}-{seq}-{short}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).map_err(io_at(&dir))?;
        Ok(dir)
    }

    /// Commit staged artifacts and record `source → fingerprint → entry`.
    ///
    /// The staged directory is renamed to the fingerprint's directory, so
    /// readers only ever see complete artifact sets. If a complete entry for
    /// `fingerprint` with the same `params_hash` already exists and `replace`
    /// is false, the staged copy is discarded and the existing entry is
    /// returned instead.
    pub fn store(
        &self,
        source: &Path,
        fingerprint: &Fingerprint,
        staged: &Path,
        entry: CacheEntry,
        replace: bool,
    ) -> Result<Arc<CacheEntry>, CacheError> {
        let key = row_key(source);
        let mut state = self.state.lock();
        let target = self.root.join(fingerprint.as_str());

        let existing = state.entries.get(fingerprint).cloned().filter(|existing| {
            !replace
                && existing.params_hash == entry.params_hash
                && self.artifacts(fingerprint).exist()
        });
        let entry = match existing {
            Some(existing) => {
                fs::remove_dir_all(staged).map_err(io_at(staged))?;
                existing
            }
            None => {
                if target.exists() {
                    fs::remove_dir_all(&target).map_err(io_at(&target))?;
                }
                fs::rename(staged, &target).map_err(io_at(&target))?;
                let entry = Arc::new(entry);
                state.entries.insert(fingerprint.clone(), Arc::clone(&entry));
                entry
            }
        };

        let previous = state.sources.insert(key, fingerprint.clone());
        if let Some(old) = previous.filter(|old| old != fingerprint)
            && !state.is_referenced(&old)
            && state.entries.remove(&old).is_some()
        {
            self.remove_artifacts(&old)?;
        }
        state.dirty = true;
        debug!(source = %source.display(), fingerprint = %fingerprint, "stored");
        Ok(entry)
    }

    /// Write the index if anything changed since the last save. Returns
    /// whether a write happened.
    ///
    /// Written to a temporary file and renamed, so a crash mid-save leaves
    /// the previous index intact.
    pub fn save(&self) -> Result<bool, CacheError> {
        let mut state = self.state.lock();
        if !state.dirty {
            return Ok(false);
        }
        let index = IndexOut {
            version: INDEX_VERSION,
            sources: &state.sources,
            entries: state
                .entries
                .iter()
                .map(|(fp, entry)| (fp, entry.as_ref()))
                .collect(),
        };
        let json = serde_json::to_string_pretty(&index)?;
        let path = self.index_path();
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_at(&tmp))?;
        fs::rename(&tmp, &path).map_err(io_at(&path))?;
        state.dirty = false;
        debug!(entries = state.entries.len(), "cache index saved");
        Ok(true)
    }

    fn remove_artifacts(&self, fingerprint: &Fingerprint) -> Result<(), CacheError> {
        let dir = self.root.join(fingerprint.as_str());
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_at(&dir)(e)),
        }
    }
}
