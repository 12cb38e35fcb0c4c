//! Discovery of raw scans below a project root.
//!
//! ```text
//! comic/
//! ├── config.toml          # optional
//! ├── .ccache/             # hidden: never scanned
//! ├── ch1/
//! │   ├── 001.png          # sheet "ch1/001"
//! │   └── 002.tif          # sheet "ch1/002"
//! └── cover.jpg            # sheet "cover"
//! ```
//!
//! Every file with a supported raster extension becomes one [`SheetVersion`],
//! named by its path relative to the root without extension, `/`-separated.
//! Hidden files and directories are skipped, as is any directory listed in
//! `exclude` (a cache root configured to a non-hidden location).
//!
//! The root is resolved to its canonical absolute path first, so sheet
//! sources are absolute whatever the working directory.

use crate::imaging::supported_input_extensions;
use crate::sheet::SheetVersion;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("project root {}: {source}", path.display())]
    Root {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Find every scan below `root`, sorted by path.
pub fn discover(root: &Path, exclude: &[PathBuf]) -> Result<Vec<SheetVersion>, ScanError> {
    let root = fs::canonicalize(root).map_err(|source| ScanError::Root {
        path: root.to_path_buf(),
        source,
    })?;
    let exclude: Vec<PathBuf> = exclude
        .iter()
        .map(|x| fs::canonicalize(x).unwrap_or_else(|_| x.clone()))
        .collect();

    let mut sources = Vec::new();
    let walker = WalkDir::new(&root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || (!is_hidden(e) && !exclude.iter().any(|x| x == e.path())));

    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() && is_scan(entry.path()) {
            sources.push(entry.into_path());
        }
    }
    sources.sort();

    Ok(sources
        .into_iter()
        .map(|path| SheetVersion::new(sheet_name(&root, &path), path))
        .collect())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn is_scan(path: &Path) -> bool {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    supported_input_extensions().contains(&ext.as_str())
}

/// `root/ch1/001.png` → `ch1/001`.
fn sheet_name(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path).with_extension("");
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
