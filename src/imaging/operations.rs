//! High-level image operations.
//!
//! These functions combine parameters with backend execution. They decide
//! which artifacts a sheet needs and where they go, then call the backend.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{DownsizeParams, MonochromeParams, PanelParams, Threshold};
use crate::cache::ArtifactPaths;
use crate::config::PrepConfig;
use crate::panels::{PanelNode, SegmentParams};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Everything that shapes a sheet's artifacts.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactConfig {
    pub threshold: Threshold,
    pub small_width: u32,
    pub segment: SegmentParams,
}

impl ArtifactConfig {
    pub fn from_prep_config(config: &PrepConfig) -> Self {
        Self {
            threshold: Threshold::new(config.monochrome.threshold),
            small_width: config.monochrome.small_width,
            segment: SegmentParams {
                min_size_ratio: config.panels.min_size_ratio,
                border_ratio: config.panels.border_ratio,
            },
        }
    }

    /// SHA-256 over every setting, as 64 hex chars. Cached artifacts are
    /// reused only when this matches the hash they were made with.
    pub fn params_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"sheet\0");
        hasher.update([self.threshold.value()]);
        hasher.update(self.small_width.to_le_bytes());
        hasher.update(self.segment.min_size_ratio.to_le_bytes());
        hasher.update(self.segment.border_ratio.to_le_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self::from_prep_config(&PrepConfig::default())
    }
}

/// Output of one full preparation.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedArtifacts {
    pub panel_tree: PanelNode,
    pub dimensions: Dimensions,
    pub small_dimensions: Dimensions,
}

/// Write the monochrome and downsized renditions of `source` into `out`,
/// then segment the monochrome rendition.
///
/// The panel tree is computed from the full-size monochrome image, so panel
/// rectangles are in source pixel space.
pub fn prepare_artifacts(
    backend: &impl ImageBackend,
    source: &Path,
    out: &ArtifactPaths,
    config: &ArtifactConfig,
) -> Result<PreparedArtifacts> {
    let dimensions = backend.monochrome(&MonochromeParams {
        source: source.to_path_buf(),
        output: out.monochrome.clone(),
        threshold: config.threshold,
    })?;

    let small_dimensions = backend.downsize(&DownsizeParams {
        source: out.monochrome.clone(),
        output: out.monochrome_small.clone(),
        max_width: config.small_width,
    })?;

    let panel_tree = backend.segment(&PanelParams {
        source: out.monochrome.clone(),
        segment: config.segment,
    })?;

    Ok(PreparedArtifacts {
        panel_tree,
        dimensions,
        small_dimensions,
    })
}
