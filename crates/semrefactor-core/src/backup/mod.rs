//! Backup manager: timestamped, content-addressed snapshots of files about
//! to be edited, and fail-fast restore.
//!
//! Layout of one backup:
//!
//! ```text
//! <backup_root>/<YYYYMMDD_HHMMSS_mmm>/
//!     manifest.json
//!     files/<path relative to project root>...
//!     external/<absolute path components>...   (files outside the root)
//! ```
//!
//! Mirrored copies never share a level with `manifest.json`, so a project
//! file of the same name cannot be clobbered by the manifest.
//!
//! The manifest is written after every copy succeeded, so its presence
//! implies a complete backup. Restore checks that the manifest and the tree
//! agree exactly, and that every digest matches, before writing anything.

pub mod digest;
pub mod manifest;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, instrument, warn};

pub use digest::ContentDigest;
pub use manifest::{BackupManifest, MANIFEST_FILE};

use crate::obs;

/// Directory under which files inside the project root are mirrored.
pub const FILES_DIR: &str = "files";

/// Directory under which files outside the project root are mirrored.
pub const EXTERNAL_DIR: &str = "external";

/// Errors from backup creation and restore.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backup not found: {0}")]
    MissingBackup(PathBuf),

    #[error("backup manifest not found in {0}")]
    MissingManifest(PathBuf),

    #[error("malformed manifest {path}: {reason}")]
    MalformedManifest { path: PathBuf, reason: String },

    #[error(
        "manifest does not match backup tree (missing: {missing:?}, unlisted: {unlisted:?}, \
         declared count {declared}, listed {listed})"
    )]
    ManifestMismatch {
        missing: Vec<String>,
        unlisted: Vec<String>,
        declared: usize,
        listed: usize,
    },

    #[error("digest mismatch for {file}: expected {expected}, got {actual}")]
    DigestMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("invalid digest hex: {0}")]
    InvalidDigest(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type BackupResult<T> = std::result::Result<T, BackupError>;

fn io_at(path: &Path) -> impl FnOnce(std::io::Error) -> BackupError + '_ {
    move |source| BackupError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// A completed backup on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backup {
    pub path: PathBuf,
    pub manifest: BackupManifest,
}

/// Listing entry for `backup list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSummary {
    pub path: PathBuf,
    pub timestamp: String,
    pub file_count: usize,
}

/// Result of a successful restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReport {
    pub backup_path: PathBuf,
    pub restored: Vec<PathBuf>,
}

impl RestoreReport {
    pub fn restored_count(&self) -> usize {
        self.restored.len()
    }
}

/// Creates and restores backups under a single root directory.
#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_root: PathBuf,
    project_root: PathBuf,
}

impl BackupManager {
    pub fn new(backup_root: impl Into<PathBuf>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            backup_root: backup_root.into(),
            project_root: project_root.into(),
        }
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Snapshot `files` into a new timestamped directory.
    ///
    /// Files that do not exist are skipped. On any copy failure the partial
    /// directory is removed and no manifest is left behind.
    #[instrument(skip(self, files), fields(requested = files.len()))]
    pub fn create_backup(&self, files: &[PathBuf]) -> BackupResult<Backup> {
        fs::create_dir_all(&self.backup_root).map_err(io_at(&self.backup_root))?;
        let (dir, timestamp) = self.allocate_dir()?;

        match self.populate(&dir, timestamp, files) {
            Ok(manifest) => {
                obs::emit_backup_created(&dir, manifest.file_count);
                Ok(Backup {
                    path: dir,
                    manifest,
                })
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&dir) {
                    warn!(
                        dir = %dir.display(),
                        error = %cleanup,
                        "failed to remove partial backup"
                    );
                }
                Err(e)
            }
        }
    }

    fn populate(
        &self,
        dir: &Path,
        timestamp: String,
        files: &[PathBuf],
    ) -> BackupResult<BackupManifest> {
        let mut listed = Vec::new();
        let mut digests = BTreeMap::new();
        let mut seen = BTreeSet::new();

        for file in files {
            let absolute = self.absolutize(file);
            let key = absolute.to_string_lossy().into_owned();
            if !seen.insert(key.clone()) {
                continue;
            }
            if !absolute.is_file() {
                debug!(file = %absolute.display(), "skipping missing file");
                continue;
            }

            let bytes = fs::read(&absolute).map_err(io_at(&absolute))?;
            let dest = dir.join(mirror_path(&self.project_root, &absolute));
            write_atomic(&dest, &bytes)?;

            digests.insert(key.clone(), ContentDigest::of_bytes(&bytes));
            listed.push(key);
        }

        let manifest = BackupManifest {
            timestamp,
            file_count: listed.len(),
            files: listed,
            project_root: Some(self.project_root.clone()),
            digests,
        };
        write_atomic(&dir.join(MANIFEST_FILE), manifest.to_json()?.as_bytes())?;
        Ok(manifest)
    }

    /// Create a fresh, uniquely named directory. `create_dir` fails on an
    /// existing name, so concurrent runs never share one.
    fn allocate_dir(&self) -> BackupResult<(PathBuf, String)> {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S_%3f").to_string();
        for attempt in 0..1000u32 {
            let name = if attempt == 0 {
                timestamp.clone()
            } else {
                format!("{timestamp}-{attempt}")
            };
            let candidate = self.backup_root.join(&name);
            match fs::create_dir(&candidate) {
                Ok(()) => return Ok((candidate, timestamp)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(io_at(&candidate)(e)),
            }
        }
        Err(BackupError::Io {
            path: self.backup_root.join(&timestamp),
            source: std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "no free backup directory name",
            ),
        })
    }

    /// Restore every file listed in the backup's manifest.
    ///
    /// Validation happens before any write: a missing backup or manifest, a
    /// manifest that disagrees with the tree, or a digest mismatch fails the
    /// whole restore with zero files written.
    #[instrument(skip(self), fields(backup = %backup_path.display()))]
    pub fn restore_backup(&self, backup_path: &Path) -> BackupResult<RestoreReport> {
        if !backup_path.is_dir() {
            return Err(BackupError::MissingBackup(backup_path.to_path_buf()));
        }
        let manifest = BackupManifest::read(backup_path)?;
        let root = manifest
            .project_root
            .clone()
            .unwrap_or_else(|| self.project_root.clone());

        let expected: BTreeMap<PathBuf, &String> = manifest
            .files
            .iter()
            .map(|f| (mirror_path(&root, Path::new(f)), f))
            .collect();

        let mut present = BTreeSet::new();
        collect_tree(backup_path, backup_path, &mut present)?;
        present.remove(Path::new(MANIFEST_FILE));

        let missing: Vec<String> = expected
            .iter()
            .filter(|(rel, _)| !present.contains(*rel))
            .map(|(_, f)| (*f).clone())
            .collect();
        let unlisted: Vec<String> = present
            .iter()
            .filter(|rel| !expected.contains_key(*rel))
            .map(|rel| rel.to_string_lossy().into_owned())
            .collect();

        if !missing.is_empty()
            || !unlisted.is_empty()
            || manifest.file_count != manifest.files.len()
            || expected.len() != manifest.files.len()
        {
            return Err(BackupError::ManifestMismatch {
                missing,
                unlisted,
                declared: manifest.file_count,
                listed: manifest.files.len(),
            });
        }

        let mut staged = Vec::with_capacity(expected.len());
        for (rel, original) in &expected {
            let stored = backup_path.join(rel);
            let bytes = fs::read(&stored).map_err(io_at(&stored))?;
            if let Some(digest) = manifest.digests.get(*original) {
                digest.check(original, &bytes)?;
            }
            staged.push((PathBuf::from(*original), bytes));
        }

        let mut restored = Vec::with_capacity(staged.len());
        for (target, bytes) in staged {
            write_atomic(&target, &bytes)?;
            restored.push(target);
        }

        obs::emit_backup_restored(backup_path, restored.len());
        Ok(RestoreReport {
            backup_path: backup_path.to_path_buf(),
            restored,
        })
    }

    /// Backups under the root that carry a manifest, newest first.
    pub fn list_backups(&self) -> BackupResult<Vec<BackupSummary>> {
        if !self.backup_root.is_dir() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for entry in fs::read_dir(&self.backup_root).map_err(io_at(&self.backup_root))? {
            let entry = entry.map_err(io_at(&self.backup_root))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            match BackupManifest::read(&path) {
                Ok(manifest) => out.push(BackupSummary {
                    path,
                    timestamp: manifest.timestamp,
                    file_count: manifest.file_count,
                }),
                Err(BackupError::MissingManifest(_)) => continue,
                Err(e) => warn!(backup = %path.display(), error = %e, "skipping unreadable backup"),
            }
        }

        out.sort_by(|a, b| b.path.cmp(&a.path));
        Ok(out)
    }

    fn absolutize(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.project_root.join(file)
        }
    }
}

/// Where `file` lives inside a backup directory.
pub fn mirror_path(project_root: &Path, file: &Path) -> PathBuf {
    match file.strip_prefix(project_root) {
        Ok(rel) => Path::new(FILES_DIR).join(normal_components(rel)),
        Err(_) => Path::new(EXTERNAL_DIR).join(normal_components(file)),
    }
}

fn normal_components(path: &Path) -> PathBuf {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}

fn collect_tree(base: &Path, dir: &Path, out: &mut BTreeSet<PathBuf>) -> BackupResult<()> {
    for entry in fs::read_dir(dir).map_err(io_at(dir))? {
        let entry = entry.map_err(io_at(dir))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(io_at(&path))?;
        if file_type.is_dir() {
            collect_tree(base, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(base) {
            out.insert(rel.to_path_buf());
        }
    }
    Ok(())
}

/// Write through a temp file in the destination directory, then rename.
pub(crate) fn write_atomic(dest: &Path, bytes: &[u8]) -> BackupResult<()> {
    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(io_at(&parent))?;
    let mut tmp = NamedTempFile::new_in(&parent).map_err(io_at(&parent))?;
    tmp.write_all(bytes).map_err(io_at(dest))?;
    // Keep the mode of the file being replaced; temp files start out 0600.
    if let Ok(meta) = fs::metadata(dest) {
        fs::set_permissions(tmp.path(), meta.permissions()).map_err(io_at(dest))?;
    }
    tmp.persist(dest).map_err(|e| BackupError::Io {
        path: dest.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}
