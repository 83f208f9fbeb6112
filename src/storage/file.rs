//! File-backed store with atomic replacement
//!
//! Every write serializes the whole document into a temp file next to the
//! target, fsyncs it and renames it over the original, so readers see
//! either the old document or the new one.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::document::StoreDocument;
use crate::error::{MotifError, Result};

const BACKUP_MARKER: &str = ".backup.";

/// Handle to one store file
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    /// Open a store at `path`, creating its parent directory if needed.
    /// The file itself is created on first save.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and validate the document; a missing or empty file is a new store
    pub fn load(&self) -> Result<StoreDocument> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(StoreDocument::new()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(StoreDocument::new());
        }

        let doc: StoreDocument = serde_json::from_slice(&bytes).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "Refusing to load unparseable store");
            MotifError::corrupt(&self.path, e.to_string())
        })?;

        if let Err(reason) = doc.validate() {
            warn!(path = %self.path.display(), %reason, "Refusing to load invalid store");
            return Err(MotifError::corrupt(&self.path, reason));
        }

        Ok(doc)
    }

    /// Atomically replace the file with `doc`
    pub fn save(&self, doc: &mut StoreDocument) -> Result<()> {
        doc.updated_at = Some(Utc::now());
        let json = serde_json::to_vec_pretty(doc)?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;

        debug!(path = %self.path.display(), bytes = json.len(), "Store saved");
        Ok(())
    }

    /// Load, mutate, save. Nothing is written if `f` fails.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut StoreDocument) -> Result<T>,
    {
        let mut doc = self.load()?;
        let result = f(&mut doc)?;
        self.save(&mut doc)?;
        Ok(result)
    }

    /// Copy the current file to a timestamped sibling and prune all but
    /// the newest `keep` copies. `None` if there is no file yet.
    pub fn backup(&self, keep: usize) -> Result<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let stamp = Utc::now().format("%Y%m%d_%H%M%S_%3f").to_string();
        let mut target = self.backup_path(&stamp);
        let mut n = 1;
        while target.exists() {
            target = self.backup_path(&format!("{}_{}", stamp, n));
            n += 1;
        }

        fs::copy(&self.path, &target)?;
        debug!(backup = %target.display(), "Store backed up");

        for old in self.list_backups()?.into_iter().skip(keep.max(1)) {
            match fs::remove_file(&old) {
                Ok(()) => debug!(backup = %old.display(), "Pruned old backup"),
                Err(e) => warn!(backup = %old.display(), error = %e, "Failed to prune backup"),
            }
        }

        Ok(Some(target))
    }

    /// Existing backups, newest first
    pub fn list_backups(&self) -> Result<Vec<PathBuf>> {
        let Some(name) = self.path.file_name().and_then(|n| n.to_str()) else {
            return Ok(Vec::new());
        };
        let prefix = format!("{}{}", name, BACKUP_MARKER);
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut backups: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix))
            })
            .collect();

        // timestamps sort lexicographically
        backups.sort();
        backups.reverse();
        Ok(backups)
    }

    /// Back up whatever is on disk, then write an empty document.
    ///
    /// This is the only way a corrupt store gets replaced.
    pub fn reset(&self, keep: usize) -> Result<Option<PathBuf>> {
        let backup = self.backup(keep)?;
        self.save(&mut StoreDocument::new())?;
        Ok(backup)
    }

    fn backup_path(&self, suffix: &str) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store".to_string());
        self.path
            .with_file_name(format!("{}{}{}", name, BACKUP_MARKER, suffix))
    }
}
