//! Project configuration.
//!
//! Handles loading and validating the optional `config.toml` at the project
//! root. Every key has a stock default, so a project without a config file
//! behaves exactly like one with the stock file from `sheetprep gen-config`.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [cache]
//! dir = ".ccache"            # Cache root, relative to the project root
//!
//! [monochrome]
//! threshold = 128            # Gray levels below this become black
//! small_width = 1280         # Max width of monochrome_small.png
//!
//! [panels]
//! min_size_ratio = 0.0909    # Min panel extent, fraction of page height
//! border_ratio = 0.019       # Inset of black-panel check, fraction of page height
//!
//! [processing]
//! max_processes = 4          # Max parallel workers (omit for auto = CPU cores)
//!
//! [thresholds]
//! "ch1/001" = 90             # Per-sheet override of monochrome.threshold
//! ```
//!
//! The panel ratios are calibrated for A4 pages scanned whole; scans cropped
//! to the drawing area usually want a smaller `min_size_ratio`.
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::Threshold;
use crate::panels::SegmentParams;
use crate::sheet::SheetVersion;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrepConfig {
    /// Where prepared artifacts are kept.
    pub cache: CacheConfig,
    /// Monochrome conversion and downsizing.
    pub monochrome: MonochromeConfig,
    /// Panel segmentation thresholds.
    pub panels: PanelsConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    /// Sheet name → binarization threshold, for pages the project-wide
    /// threshold renders too dark or too light.
    pub thresholds: BTreeMap<String, u8>,
}

impl PrepConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.dir.trim().is_empty() {
            return Err(ConfigError::Validation("cache.dir must not be empty".into()));
        }
        if self.monochrome.small_width == 0 {
            return Err(ConfigError::Validation(
                "monochrome.small_width must be positive".into(),
            ));
        }
        let min = self.panels.min_size_ratio;
        if !(min > 0.0 && min <= 0.5) {
            return Err(ConfigError::Validation(
                "panels.min_size_ratio must be in (0, 0.5]".into(),
            ));
        }
        let border = self.panels.border_ratio;
        if !(0.0..0.5).contains(&border) {
            return Err(ConfigError::Validation(
                "panels.border_ratio must be in [0, 0.5)".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Cache root for a project. Relative `cache.dir` values are resolved
    /// against `project_root`.
    pub fn cache_root(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.cache.dir)
    }

    /// Attach the `[thresholds]` overrides to the sheets they name.
    pub fn apply_thresholds(&self, sheets: Vec<SheetVersion>) -> Vec<SheetVersion> {
        for name in self.thresholds.keys() {
            if !sheets.iter().any(|s| s.name() == name) {
                warn!(sheet = %name, "threshold override names no sheet");
            }
        }
        sheets
            .into_iter()
            .map(|sheet| match self.thresholds.get(sheet.name()) {
                Some(&value) => sheet.with_threshold(Threshold::new(value)),
                None => sheet,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub dir: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: ".ccache".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonochromeConfig {
    /// Gray levels strictly below this become black, the rest white.
    pub threshold: u8,
    /// Maximum width of the downsized rendition.
    pub small_width: u32,
}

impl Default for MonochromeConfig {
    fn default() -> Self {
        Self {
            threshold: 128,
            small_width: 1280,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PanelsConfig {
    pub min_size_ratio: f64,
    pub border_ratio: f64,
}

impl Default for PanelsConfig {
    fn default() -> Self {
        let stock = SegmentParams::default();
        Self {
            min_size_ratio: stock.min_size_ratio,
            border_ratio: stock.border_ratio,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel preparation workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Load config from `config.toml` in the given directory.
///
/// Returns stock defaults when no file exists. Rejects unknown keys and
/// validates the result.
pub fn load_config(root: &Path) -> Result<PrepConfig, ConfigError> {
    let config_path = root.join("config.toml");
    if !config_path.exists() {
        return Ok(PrepConfig::default());
    }
    let content = fs::read_to_string(&config_path)?;
    let config: PrepConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# sheetprep configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Artifact cache
# ---------------------------------------------------------------------------
[cache]
# Cache root, relative to the project root. Holds index.json and one
# directory of derived images per distinct scan.
dir = ".ccache"

# ---------------------------------------------------------------------------
# Monochrome renditions
# ---------------------------------------------------------------------------
[monochrome]
# Gray level (0-255) below which a pixel becomes black.
threshold = 128
# Maximum width in pixels of monochrome_small.png. Narrower scans are
# copied unchanged.
small_width = 1280

# ---------------------------------------------------------------------------
# Panel segmentation
# ---------------------------------------------------------------------------
[panels]
# Regions shorter (or narrower) than this fraction of the page height are
# not panels. 1/11 suits whole A4 pages; use less for tightly cropped scans.
min_size_ratio = 0.0909
# Inset, as a fraction of the page height, applied to a wide gutter before
# testing whether it is a solid black panel.
border_ratio = 0.019

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers. Omit for auto (number of CPU cores).
# Values above the core count are clamped down.
# max_processes = 4

# ---------------------------------------------------------------------------
# Per-sheet thresholds
# ---------------------------------------------------------------------------
[thresholds]
# Override monochrome.threshold for single sheets, by sheet name (path
# below the project root without extension). Changing one re-prepares
# only that sheet.
# "ch1/001" = 90
"##
}
