//! Backup manifest: the record of exactly which files a snapshot holds.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::digest::ContentDigest;
use super::{BackupError, BackupResult};

/// File name of the manifest at the root of every backup directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Manifest written last into a backup directory.
///
/// `timestamp`, `files` and `file_count` are the interchange fields; the rest
/// are optional so older manifests still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupManifest {
    pub timestamp: String,
    /// Absolute paths of the original files.
    pub files: Vec<String>,
    pub file_count: usize,
    /// Root the mirrored tree is relative to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_root: Option<PathBuf>,
    /// Content address of each file, keyed by absolute path.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub digests: BTreeMap<String, ContentDigest>,
}

impl BackupManifest {
    pub fn read(backup_dir: &Path) -> BackupResult<Self> {
        let path = backup_dir.join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(BackupError::MissingManifest(backup_dir.to_path_buf()));
        }
        let content = std::fs::read_to_string(&path).map_err(|source| BackupError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|e| BackupError::MalformedManifest {
            path,
            reason: e.to_string(),
        })
    }

    pub fn to_json(&self) -> BackupResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| BackupError::MalformedManifest {
            path: PathBuf::from(MANIFEST_FILE),
            reason: e.to_string(),
        })
    }
}
