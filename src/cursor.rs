//! Crash-safe cursor file: the scalar `last_change_id`, persisted as a
//! decimal integer in a single file.
//!
//! Grounded on `atomic_write`/`backed_up` in the original `sync2gm` source:
//! write to a sibling `.tmp`, fsync it, rename the previous file aside to
//! `.bak` (overwriting any stale backup), rename the `.tmp` into place, fsync
//! the parent directory, then remove the `.bak`. A crash at any point before
//! the final rename leaves the old value in place (or recoverable from
//! `.bak`); a crash after leaves the new value and a recoverable backup.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::SyncError;

pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read and parse the cursor file. A missing or unparseable file is a
    /// fatal `ConfigCorrupt` condition — this store does not invent a
    /// starting value.
    pub fn load(&self) -> Result<i64, SyncError> {
        let mut text = String::new();
        File::open(&self.path)
            .map_err(|e| SyncError::ConfigCorrupt(format!("{}: {e}", self.path.display())))?
            .read_to_string(&mut text)
            .map_err(|e| SyncError::ConfigCorrupt(format!("{}: {e}", self.path.display())))?;
        text.trim()
            .parse::<i64>()
            .map_err(|e| SyncError::ConfigCorrupt(format!("{}: {e}", self.path.display())))
    }

    /// Atomically replace the cursor file's contents with `id`.
    pub fn store(&self, id: i64) -> Result<(), SyncError> {
        let tmp_path = sibling(&self.path, "tmp");
        let bak_path = sibling(&self.path, "bak");

        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(id.to_string().as_bytes())?;
            tmp.sync_all()?;
        }

        let existed = self.path.exists();
        if existed {
            fs::rename(&self.path, &bak_path)?;
        }
        fs::rename(&tmp_path, &self.path)?;
        sync_parent_dir(&self.path)?;

        if existed {
            // A crash here leaves a recoverable `.bak` sidecar; that is the
            // documented acceptable outcome, not a bug.
            let _ = fs::remove_file(&bak_path);
        }
        Ok(())
    }
}

fn sibling(path: &Path, ext: &str) -> PathBuf {
    let mut p = path.as_os_str().to_owned();
    p.push(".");
    p.push(ext);
    PathBuf::from(p)
}

fn sync_parent_dir(path: &Path) -> Result<(), SyncError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        // Directory fsync is best-effort and unsupported on some platforms;
        // a failure here is not itself evidence of a torn write.
        if let Ok(dir) = OpenOptions::new().read(true).open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}
