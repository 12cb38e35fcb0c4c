//! Content fingerprints: the sole cache key for prepared sheets.
//!
//! A [`Fingerprint`] is the SHA-256 digest of a scan's full byte content,
//! rendered as 64 lowercase hex characters. It depends only on the bytes,
//! never on the path, so renaming or copying a scan keeps its cache entry.
//! Content-based rather than mtime-based so it survives `git checkout` and
//! backup restores, which reset modification times.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io;
use std::path::Path;
use std::str::FromStr;

/// Hex length of a SHA-256 digest.
const HEX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Digest of raw bytes.
    pub fn of(bytes: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(bytes)))
    }

    /// Read a file and digest its bytes. I/O errors are the caller's to handle.
    pub fn of_file(path: &Path) -> io::Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::of(&bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a fingerprint: {0:?}")]
pub struct ParseFingerprintError(String);

impl FromStr for Fingerprint {
    type Err = ParseFingerprintError;

    /// Accepts exactly 64 lowercase hex characters, the form cache
    /// directories are named with.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = s.len() == HEX_LEN
            && s
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(ParseFingerprintError(s.to_string()))
        }
    }
}
