//! Session manifest output.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::{KoevaultError, Result};

/// Append-only `path|transcript` manifest for one download session.
///
/// The file is opened once and shared by all download workers; a mutex
/// around the handle keeps concurrent records from interleaving. Each
/// record is flushed immediately, so an interrupted session keeps every
/// line written so far.
pub struct ManifestWriter {
    file: Mutex<File>,
    path: PathBuf,
}

impl ManifestWriter {
    /// Open the manifest at `path` for appending, creating it (and parent
    /// directories) as needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| KoevaultError::io_with_path(e, parent))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| KoevaultError::io_with_path(e, &path))?;

        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    /// Append one `path|transcript` line and flush it to disk.
    pub fn record(&self, asset_path: &Path, transcript: &str) -> Result<()> {
        let line = format!("{}|{}\n", asset_path.display(), transcript);

        let mut file = self.file.lock().map_err(|_| {
            KoevaultError::Other("Manifest file lock poisoned".to_string())
        })?;
        file.write_all(line.as_bytes())
            .map_err(|e| KoevaultError::io_with_path(e, &self.path))?;
        file.flush()
            .map_err(|e| KoevaultError::io_with_path(e, &self.path))?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
