//! Sheet preparation: compute each sheet's artifacts at most once.
//!
//! [`Preparer`] is the context object every preparation runs through: the
//! image backend, the shared [`ArtifactCache`], and the artifact settings.
//!
//! ## Protocol
//!
//! [`Preparer::ensure`] uses the sheet's own lock, never a global one, so
//! unrelated sheets prepare fully in parallel:
//!
//! 1. `done` already set (and not forced): return without locking.
//! 2. Take the sheet's lock and check `done` again; a racing caller may
//!    have finished while we waited.
//! 3. Look the scan up in the cache under the sheet's effective settings.
//!    On a hit, adopt the entry.
//! 4. On a miss, hold the fingerprint's [`ComputeGate`](crate::cache::ComputeGate)
//!    and check again: another sheet with the same bytes may have stored it.
//! 5. Still missing: write the artifacts into a staging directory, segment,
//!    and commit through [`ArtifactCache::store`].
//! 6. Record the result, set `done`, release the lock.
//!
//! A failed preparation leaves `done` unset, so the next call retries.
//!
//! ## Sweeps
//!
//! [`Preparer::prepare_all`] runs `ensure` over a whole project on the rayon
//! pool. Each sheet is its own failure boundary: errors and panics become a
//! [`PrepEvent::Failed`] and the sweep carries on. The cancellation flag is
//! checked before each sheet. The cache index is saved once, at the end.

use crate::cache::{ArtifactCache, ArtifactPaths, CacheEntry, CacheError, Lookup};
use crate::fingerprint::Fingerprint;
use crate::imaging::{ArtifactConfig, BackendError, ImageBackend, prepare_artifacts};
use crate::panels::SegmentError;
use crate::sheet::{Prepared, SheetVersion};
use rayon::prelude::*;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum PrepError {
    #[error("{0}")]
    Cache(#[from] CacheError),
    #[error("{0}")]
    Imaging(#[from] BackendError),
    #[error("panicked: {0}")]
    Panicked(String),
}

/// Coarse classification of a failed preparation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Unreadable scan, unwritable cache, corrupt index.
    Io,
    /// The scan is not a decodable raster image.
    InvalidContent,
    /// A broken invariant in our own code.
    Inconsistency,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureKind::Io => "I/O failure",
            FailureKind::InvalidContent => "invalid content",
            FailureKind::Inconsistency => "internal inconsistency",
        })
    }
}

impl PrepError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PrepError::Cache(_) => FailureKind::Io,
            PrepError::Imaging(BackendError::Io(_) | BackendError::ProcessingFailed(_)) => {
                FailureKind::Io
            }
            PrepError::Imaging(
                BackendError::Decode(_) | BackendError::Segment(SegmentError::EmptyImage(..)),
            ) => FailureKind::InvalidContent,
            PrepError::Imaging(BackendError::Segment(SegmentError::Inconsistent(_)))
            | PrepError::Panicked(_) => FailureKind::Inconsistency,
        }
    }
}

/// Shared cooperative cancellation signal for a sweep.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress events emitted during a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrepEvent {
    Prepared {
        name: String,
        did_work: bool,
        panels: usize,
    },
    Failed {
        name: String,
        kind: FailureKind,
        error: String,
    },
    Cancelled {
        name: String,
    },
}

/// Summary of a sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PrepStats {
    pub total: usize,
    pub worked: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl fmt::Display for PrepStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} sheets needed work, {} failed",
            self.worked, self.total, self.failed
        )?;
        if self.cancelled > 0 {
            write!(f, ", {} cancelled", self.cancelled)?;
        }
        Ok(())
    }
}

enum Outcome {
    Worked,
    Unchanged,
    Failed,
    Cancelled,
}

pub struct Preparer<'a, B: ImageBackend> {
    backend: &'a B,
    cache: &'a ArtifactCache,
    config: ArtifactConfig,
}

impl<'a, B: ImageBackend> Preparer<'a, B> {
    pub fn new(backend: &'a B, cache: &'a ArtifactCache, config: ArtifactConfig) -> Self {
        Self {
            backend,
            cache,
            config,
        }
    }

    pub fn cache(&self) -> &ArtifactCache {
        self.cache
    }

    /// Settings for `sheet`: the shared ones with its threshold override.
    pub fn config_for(&self, sheet: &SheetVersion) -> ArtifactConfig {
        match sheet.threshold() {
            Some(threshold) => ArtifactConfig {
                threshold,
                ..self.config.clone()
            },
            None => self.config.clone(),
        }
    }

    /// Make sure `sheet` is prepared. Returns whether the expensive path ran.
    ///
    /// With `force`, the artifacts are recomputed and replace any cached
    /// entry for the same content.
    pub fn ensure(&self, sheet: &SheetVersion, force: bool) -> Result<bool, PrepError> {
        let state = sheet.state();
        if !force && state.done.load(Ordering::Acquire) {
            return Ok(false);
        }

        let mut slot = state.slot.lock();
        if !force && state.done.load(Ordering::Acquire) {
            return Ok(false);
        }

        let config = self.config_for(sheet);
        let params_hash = config.params_hash();
        let lookup = self.cache.lookup(sheet.source(), &params_hash)?;
        let (fingerprint, entry, did_work) = match lookup {
            Lookup::Hit { fingerprint, entry } if !force => (fingerprint, entry, false),
            miss => {
                let fingerprint = miss.fingerprint().clone();
                let gate = self.cache.gate(&fingerprint);
                let _computing = gate.hold();
                let stored = if force {
                    None
                } else {
                    self.cache.adopt(sheet.source(), &fingerprint, &params_hash)
                };
                match stored {
                    Some(entry) => (fingerprint, entry, false),
                    None => {
                        let entry =
                            self.compute(sheet, &fingerprint, &config, params_hash, force)?;
                        (fingerprint, entry, true)
                    }
                }
            }
        };

        debug!(
            sheet = sheet.name(),
            fingerprint = %fingerprint,
            panels = entry.panel_tree.panel_count(),
            did_work,
            "sheet ready"
        );
        *slot = Some(Prepared {
            artifacts: self.cache.artifacts(&fingerprint),
            fingerprint,
            entry,
        });
        state.done.store(true, Ordering::Release);
        Ok(did_work)
    }

    fn compute(
        &self,
        sheet: &SheetVersion,
        fingerprint: &Fingerprint,
        config: &ArtifactConfig,
        params_hash: String,
        replace: bool,
    ) -> Result<Arc<CacheEntry>, PrepError> {
        let staged = self.cache.staging_dir(fingerprint)?;
        let artifacts = match prepare_artifacts(
            self.backend,
            sheet.source(),
            &ArtifactPaths::in_dir(&staged),
            config,
        ) {
            Ok(artifacts) => artifacts,
            Err(e) => {
                if let Err(cleanup) = std::fs::remove_dir_all(&staged) {
                    warn!(dir = %staged.display(), "could not remove staging dir: {cleanup}");
                }
                return Err(e.into());
            }
        };

        debug!(
            sheet = sheet.name(),
            width = artifacts.dimensions.width,
            height = artifacts.dimensions.height,
            small_width = artifacts.small_dimensions.width,
            small_height = artifacts.small_dimensions.height,
            "artifacts written"
        );
        let entry = CacheEntry {
            source_file_path: sheet.source().to_path_buf(),
            params_hash,
            panel_tree: artifacts.panel_tree,
        };
        Ok(self
            .cache
            .store(sheet.source(), fingerprint, &staged, entry, replace)?)
    }

    /// Prepare every sheet in parallel, then save the cache index once.
    ///
    /// Per-sheet failures (including panics) are reported through `events`
    /// and counted, never propagated. Only a failure to save the index is an
    /// error of the sweep itself.
    pub fn prepare_all(
        &self,
        sheets: &[SheetVersion],
        force: bool,
        cancel: &CancelFlag,
        events: Option<Sender<PrepEvent>>,
    ) -> Result<PrepStats, CacheError> {
        let emit = |event: PrepEvent| {
            if let Some(tx) = &events {
                tx.send(event).ok();
            }
        };

        let outcomes: Vec<Outcome> = sheets
            .par_iter()
            .map(|sheet| {
                let name = sheet.name().to_string();
                if cancel.is_cancelled() {
                    emit(PrepEvent::Cancelled { name });
                    return Outcome::Cancelled;
                }

                let result = panic::catch_unwind(AssertUnwindSafe(|| self.ensure(sheet, force)))
                    .unwrap_or_else(|payload| Err(PrepError::Panicked(panic_message(&*payload))));

                match result {
                    Ok(did_work) => {
                        let panels = sheet
                            .prepared()
                            .map_or(0, |p| p.panel_tree().panel_count());
                        emit(PrepEvent::Prepared {
                            name,
                            did_work,
                            panels,
                        });
                        if did_work {
                            Outcome::Worked
                        } else {
                            Outcome::Unchanged
                        }
                    }
                    Err(e) => {
                        error!(sheet = %name, source = %sheet.source().display(), kind = %e.kind(), "{e}");
                        emit(PrepEvent::Failed {
                            name,
                            kind: e.kind(),
                            error: e.to_string(),
                        });
                        Outcome::Failed
                    }
                }
            })
            .collect();

        let mut stats = PrepStats {
            total: sheets.len(),
            ..PrepStats::default()
        };
        for outcome in outcomes {
            match outcome {
                Outcome::Worked => stats.worked += 1,
                Outcome::Unchanged => {}
                Outcome::Failed => stats.failed += 1,
                Outcome::Cancelled => stats.cancelled += 1,
            }
        }

        if self.cache.save()? {
            debug!(root = %self.cache.root().display(), "cache index saved");
        }
        info!("{stats}");
        Ok(stats)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::Threshold;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use std::fs;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ArtifactCache) {
        let tmp = TempDir::new().unwrap();
        let cache = ArtifactCache::load(&tmp.path().join(".ccache")).unwrap();
        (tmp, cache)
    }

    fn scan(dir: &Path, name: &str, bytes: &[u8]) -> SheetVersion {
        let path = dir.join(format!("{name}.png"));
        fs::write(&path, bytes).unwrap();
        SheetVersion::new(name, path)
    }

    fn staging_leftovers(cache: &ArtifactCache) -> usize {
        fs::read_dir(cache.root())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .starts_with(".staging-")
            })
            .count()
    }

    // =========================================================================
    // ensure
    // =========================================================================

    #[test]
    fn ensure_is_idempotent() {
        let (tmp, cache) = setup();
        let backend = MockBackend::new();
        let preparer = Preparer::new(&backend, &cache, ArtifactConfig::default());
        let sheet = scan(tmp.path(), "001", b"page");

        assert!(preparer.ensure(&sheet, false).unwrap());
        assert!(!preparer.ensure(&sheet, false).unwrap());
        assert_eq!(backend.segment_count(), 1);

        let prepared = sheet.prepared().unwrap();
        assert!(prepared.artifacts.exist());
        assert_eq!(prepared.artifacts, cache.artifacts(&prepared.fingerprint));
        assert_eq!(prepared.panel_tree(), &backend.panel_tree);
    }

    #[test]
    fn ensure_force_recomputes() {
        let (tmp, cache) = setup();
        let backend = MockBackend::new();
        let preparer = Preparer::new(&backend, &cache, ArtifactConfig::default());
        let sheet = scan(tmp.path(), "001", b"page");

        preparer.ensure(&sheet, false).unwrap();
        assert!(preparer.ensure(&sheet, true).unwrap());
        assert_eq!(backend.segment_count(), 2);
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn cached_entry_skips_work_for_fresh_sheet() {
        let (tmp, cache) = setup();
        let backend = MockBackend::new();
        let preparer = Preparer::new(&backend, &cache, ArtifactConfig::default());
        let first = scan(tmp.path(), "001", b"page");
        preparer.ensure(&first, false).unwrap();

        // same scan, as a later run would see it
        let again = SheetVersion::new("001", first.source());
        assert!(!preparer.ensure(&again, false).unwrap());
        assert_eq!(backend.segment_count(), 1);
        assert_eq!(
            again.prepared().unwrap().fingerprint,
            first.prepared().unwrap().fingerprint
        );
    }

    #[test]
    fn changed_scan_is_recomputed_and_old_entry_dropped() {
        let (tmp, cache) = setup();
        let backend = MockBackend::new();
        let preparer = Preparer::new(&backend, &cache, ArtifactConfig::default());
        let sheet = scan(tmp.path(), "001", b"first pencils");
        preparer.ensure(&sheet, false).unwrap();
        let old = sheet.prepared().unwrap().fingerprint;

        fs::write(sheet.source(), b"inked").unwrap();
        let revised = SheetVersion::new("001", sheet.source());
        assert!(preparer.ensure(&revised, false).unwrap());

        let new = revised.prepared().unwrap().fingerprint;
        assert_ne!(old, new);
        assert!(cache.entry(&old).is_none());
        assert!(!cache.artifacts(&old).dir.exists());
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn failure_leaves_sheet_unprepared_and_no_staging() {
        let (tmp, cache) = setup();
        let backend = MockBackend::failing_on("broken");
        let preparer = Preparer::new(&backend, &cache, ArtifactConfig::default());
        let sheet = scan(tmp.path(), "broken", b"garbage");

        let err = preparer.ensure(&sheet, false).unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidContent);
        assert!(!sheet.is_prepared());
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(staging_leftovers(&cache), 0);
    }

    #[test]
    fn missing_scan_is_io_failure() {
        let (tmp, cache) = setup();
        let backend = MockBackend::new();
        let preparer = Preparer::new(&backend, &cache, ArtifactConfig::default());
        let sheet = SheetVersion::new("ghost", tmp.path().join("ghost.png"));

        let err = preparer.ensure(&sheet, false).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Io);
        assert_eq!(backend.segment_count(), 0);
    }

    #[test]
    fn concurrent_ensure_on_one_sheet_works_once() {
        let (tmp, cache) = setup();
        let backend = MockBackend {
            delay: Duration::from_millis(20),
            ..MockBackend::default()
        };
        let preparer = Preparer::new(&backend, &cache, ArtifactConfig::default());
        let sheet = scan(tmp.path(), "001", b"page");

        let worked: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..50)
                .map(|_| s.spawn(|| preparer.ensure(&sheet, false).unwrap()))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap() as usize)
                .sum()
        });

        assert_eq!(worked, 1);
        assert_eq!(backend.segment_count(), 1);
        assert!(sheet.is_prepared());
    }

    #[test]
    fn identical_scans_in_parallel_work_once() {
        let (tmp, cache) = setup();
        let backend = MockBackend {
            delay: Duration::from_millis(50),
            ..MockBackend::default()
        };
        let preparer = Preparer::new(&backend, &cache, ArtifactConfig::default());
        let sheets: Vec<SheetVersion> = (0..4)
            .map(|i| scan(tmp.path(), &format!("copy{i}"), b"same page"))
            .collect();

        let preparer = &preparer;
        let worked: usize = std::thread::scope(|s| {
            let handles: Vec<_> = sheets
                .iter()
                .map(|sheet| s.spawn(move || preparer.ensure(sheet, false).unwrap()))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap() as usize)
                .sum()
        });

        assert_eq!(worked, 1);
        assert_eq!(backend.segment_count(), 1);
        assert_eq!(cache.entry_count(), 1);
        assert_eq!(cache.source_count(), 4);
        let fp = sheets[0].prepared().unwrap().fingerprint;
        assert!(sheets.iter().all(|s| s.prepared().unwrap().fingerprint == fp));
    }

    #[test]
    fn changed_settings_recompute_cached_scan() {
        let (tmp, cache) = setup();
        let backend = MockBackend::new();
        let sheet = scan(tmp.path(), "001", b"page");
        Preparer::new(&backend, &cache, ArtifactConfig::default())
            .ensure(&sheet, false)
            .unwrap();

        let narrow = ArtifactConfig {
            small_width: 640,
            ..ArtifactConfig::default()
        };
        let preparer = Preparer::new(&backend, &cache, narrow.clone());
        let again = SheetVersion::new("001", sheet.source());
        assert!(preparer.ensure(&again, false).unwrap());
        assert_eq!(backend.segment_count(), 2);
        let ops = backend.get_operations();
        let last_downsize = ops
            .iter()
            .rev()
            .find(|op| matches!(op, RecordedOp::Downsize { .. }));
        assert!(matches!(
            last_downsize,
            Some(RecordedOp::Downsize { max_width: 640, .. })
        ));
        assert_eq!(again.prepared().unwrap().entry.params_hash, narrow.params_hash());
        assert_eq!(cache.entry_count(), 1);

        // unchanged settings hit again
        let third = SheetVersion::new("001", sheet.source());
        assert!(!preparer.ensure(&third, false).unwrap());
        assert_eq!(backend.segment_count(), 2);
    }

    #[test]
    fn threshold_override_applies_and_keys_the_entry() {
        let (tmp, cache) = setup();
        let backend = MockBackend::new();
        let preparer = Preparer::new(&backend, &cache, ArtifactConfig::default());
        let plain = scan(tmp.path(), "001", b"page");
        preparer.ensure(&plain, false).unwrap();

        let light =
            SheetVersion::new("001", plain.source()).with_threshold(Threshold::new(90));
        assert_eq!(preparer.config_for(&light).threshold, Threshold::new(90));
        assert!(preparer.ensure(&light, false).unwrap());
        let ops = backend.get_operations();
        let last_monochrome = ops
            .iter()
            .rev()
            .find(|op| matches!(op, RecordedOp::Monochrome { .. }));
        assert!(matches!(
            last_monochrome,
            Some(RecordedOp::Monochrome { threshold: 90, .. })
        ));
        assert_eq!(
            light.prepared().unwrap().entry.params_hash,
            preparer.config_for(&light).params_hash()
        );
    }

    #[test]
    fn real_backend_prepares_drawn_page() {
        let (tmp, cache) = setup();
        let backend = crate::imaging::RustBackend::new();
        let preparer = Preparer::new(&backend, &cache, ArtifactConfig::default());
        let path = crate::test_helpers::write_scan(tmp.path(), "001", 3, 0);
        let sheet = SheetVersion::new("001", path);

        assert!(preparer.ensure(&sheet, false).unwrap());
        let prepared = sheet.prepared().unwrap();
        assert_eq!(prepared.panel_tree().panel_count(), 3);
        assert!(prepared.artifacts.exist());
        assert_eq!(
            prepared.entry.source_file_path,
            tmp.path().join("001.png")
        );
    }

    // =========================================================================
    // prepare_all
    // =========================================================================

    #[test]
    fn sweep_counts_work_and_saves_once() {
        let (tmp, cache) = setup();
        let backend = MockBackend::new();
        let preparer = Preparer::new(&backend, &cache, ArtifactConfig::default());
        let sheets: Vec<SheetVersion> = (0..5)
            .map(|i| scan(tmp.path(), &format!("{i:03}"), format!("page {i}").as_bytes()))
            .collect();

        let stats = preparer
            .prepare_all(&sheets, false, &CancelFlag::new(), None)
            .unwrap();
        assert_eq!(
            stats,
            PrepStats {
                total: 5,
                worked: 5,
                failed: 0,
                cancelled: 0
            }
        );
        assert!(!cache.is_dirty());
        assert!(cache.index_path().exists());

        let again = preparer
            .prepare_all(&sheets, false, &CancelFlag::new(), None)
            .unwrap();
        assert_eq!(again.worked, 0);
        assert_eq!(again.to_string(), "0/5 sheets needed work, 0 failed");
    }

    #[test]
    fn sweep_isolates_errors_and_panics() {
        let (tmp, cache) = setup();
        let backend = MockBackend {
            fail_on: Some("bad".into()),
            ..MockBackend::panicking_on("boom")
        };
        let preparer = Preparer::new(&backend, &cache, ArtifactConfig::default());
        let sheets = vec![
            scan(tmp.path(), "good", b"1"),
            scan(tmp.path(), "bad", b"2"),
            scan(tmp.path(), "boom", b"3"),
        ];

        let (tx, rx) = std::sync::mpsc::channel();
        let stats = preparer
            .prepare_all(&sheets, false, &CancelFlag::new(), Some(tx))
            .unwrap();
        assert_eq!(stats.worked, 1);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.to_string(), "1/3 sheets needed work, 2 failed");

        let mut events: Vec<PrepEvent> = rx.iter().collect();
        events.sort_by_key(|e| match e {
            PrepEvent::Prepared { name, .. }
            | PrepEvent::Failed { name, .. }
            | PrepEvent::Cancelled { name } => name.clone(),
        });
        assert!(matches!(
            &events[0],
            PrepEvent::Failed { name, kind: FailureKind::InvalidContent, .. } if name == "bad"
        ));
        assert!(matches!(
            &events[1],
            PrepEvent::Failed { name, kind: FailureKind::Inconsistency, error }
                if name == "boom" && error.contains("exploded")
        ));
        assert!(matches!(
            &events[2],
            PrepEvent::Prepared { name, did_work: true, panels: 1 } if name == "good"
        ));
        assert!(sheets[0].is_prepared());
        assert!(!sheets[2].is_prepared());
    }

    #[test]
    fn cancelled_sweep_starts_nothing() {
        let (tmp, cache) = setup();
        let backend = MockBackend::new();
        let preparer = Preparer::new(&backend, &cache, ArtifactConfig::default());
        let sheets = vec![scan(tmp.path(), "a", b"1"), scan(tmp.path(), "b", b"2")];
        let cancel = CancelFlag::new();
        cancel.cancel();

        let stats = preparer.prepare_all(&sheets, false, &cancel, None).unwrap();
        assert_eq!(stats.cancelled, 2);
        assert_eq!(stats.worked, 0);
        assert_eq!(backend.segment_count(), 0);
        assert_eq!(
            stats.to_string(),
            "0/2 sheets needed work, 0 failed, 2 cancelled"
        );
    }

    // =========================================================================
    // Failure classification
    // =========================================================================

    #[test]
    fn failure_kinds() {
        let io = PrepError::Imaging(BackendError::Io(std::io::Error::other("disk")));
        assert_eq!(io.kind(), FailureKind::Io);
        let decode = PrepError::Imaging(BackendError::Decode("nope".into()));
        assert_eq!(decode.kind(), FailureKind::InvalidContent);
        let broken = PrepError::Imaging(BackendError::Segment(SegmentError::Inconsistent(
            "both".into(),
        )));
        assert_eq!(broken.kind(), FailureKind::Inconsistency);
        assert_eq!(FailureKind::InvalidContent.to_string(), "invalid content");
    }
}
