//! File-backed store: one JSON document per session id.
//!
//! Layout: `<root>/sess_<id>.json` plus a `sess_<id>.lock` claim file.
//! `open` holds an exclusive `fs2` lock on the claim file until the request
//! releases the session, so requests sharing a cookie run one after the
//! other.  Reads take a shared lock on the data file and writes an exclusive
//! one, so no reader observes a half-written document.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use ts_domain::error::{Error, Result};
use ts_domain::trace::TraceEvent;

use super::{is_valid_session_id, SessionBackend, SessionLock};
use crate::directives::{ensure_directory, StoreDirectives};
use crate::state::SessionData;

const FILE_PREFIX: &str = "sess_";
const FILE_SUFFIX: &str = ".json";
const LOCK_SUFFIX: &str = ".lock";

#[derive(Debug, Deserialize)]
struct SessionFile {
    #[serde(default)]
    data: SessionData,
}

#[derive(Serialize)]
struct SessionFileRef<'a> {
    updated_at: DateTime<Utc>,
    data: &'a SessionData,
}

#[derive(Debug)]
pub struct FileBackend {
    root: RwLock<PathBuf>,
}

impl Default for FileBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FileBackend {
    /// Store under the system temp dir until a save path is configured.
    pub fn new() -> Self {
        Self::with_root(std::env::temp_dir().join("tessera-sessions"))
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: RwLock::new(root.into()),
        }
    }

    pub fn root(&self) -> PathBuf {
        self.root.read().clone()
    }

    pub fn session_path(&self, id: &str) -> PathBuf {
        self.root
            .read()
            .join(format!("{FILE_PREFIX}{id}{FILE_SUFFIX}"))
    }

    pub fn lock_path(&self, id: &str) -> PathBuf {
        self.root
            .read()
            .join(format!("{FILE_PREFIX}{id}{LOCK_SUFFIX}"))
    }

    fn checked_path(&self, id: &str) -> Result<PathBuf> {
        if is_valid_session_id(id) {
            Ok(self.session_path(id))
        } else {
            Err(Error::Other(format!("malformed session id {id:?}")))
        }
    }

    fn open_for_write(path: &std::path::Path) -> std::io::Result<File> {
        let mut options = OpenOptions::new();
        options.write(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        options.open(path)
    }

    /// Remove `path` unless another handle holds its lock.  Returns whether
    /// the file was removed.
    fn remove_unlocked(path: &Path) -> std::io::Result<bool> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };
        if file.try_lock_exclusive().is_err() {
            return Ok(false);
        }
        let removed = std::fs::remove_file(path);
        let _ = file.unlock();
        removed.map(|()| true)
    }

    /// Whether a request currently holds the claim file at `path`.
    fn is_claimed(path: &Path) -> bool {
        match File::open(path) {
            Ok(file) => match file.try_lock_exclusive() {
                Ok(()) => {
                    let _ = file.unlock();
                    false
                }
                Err(_) => true,
            },
            Err(_) => false,
        }
    }

    fn idle_for(entry: &std::fs::DirEntry, now: SystemTime) -> Option<Duration> {
        entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
    }
}

/// Exclusive `fs2` lock on a claim file, released on drop.
struct ClaimFile(File);

impl Drop for ClaimFile {
    fn drop(&mut self) {
        let _ = self.0.unlock();
    }
}

impl SessionBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    fn configure(&self, directives: &StoreDirectives) -> Result<()> {
        if let Some(path) = &directives.save_path {
            *self.root.write() = path.clone();
        }
        Ok(())
    }

    fn lock(&self, id: &str) -> Result<SessionLock> {
        if !is_valid_session_id(id) {
            return Err(Error::Other(format!("malformed session id {id:?}")));
        }
        ensure_directory(&self.root())?;
        let file = Self::open_for_write(&self.lock_path(id))?;
        file.lock_exclusive()?;
        Ok(SessionLock::new(ClaimFile(file)))
    }

    fn read(&self, id: &str) -> Result<Option<SessionData>> {
        if !is_valid_session_id(id) {
            return Ok(None);
        }
        let path = self.session_path(id);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        file.lock_shared()?;
        let raw = std::io::read_to_string(&file);
        file.unlock()?;
        let raw = raw?;

        // A file created by a concurrent first write may still be empty.
        if raw.trim().is_empty() {
            return Ok(Some(SessionData::default()));
        }
        match serde_json::from_str::<SessionFile>(&raw) {
            Ok(stored) => Ok(Some(stored.data)),
            Err(e) => {
                // An undecodable session is treated as unknown: drop it so the
                // caller starts over with a fresh id.
                tracing::warn!(path = %path.display(), error = %e, "discarding undecodable session file");
                match std::fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                Ok(None)
            }
        }
    }

    fn write(&self, id: &str, data: &SessionData) -> Result<()> {
        let path = self.checked_path(id)?;
        ensure_directory(&self.root())?;

        let json = serde_json::to_vec_pretty(&SessionFileRef {
            updated_at: Utc::now(),
            data,
        })?;

        let file = Self::open_for_write(&path)?;
        file.lock_exclusive()?;
        // Truncate only once the lock is held so readers never see a
        // partially rewritten document.
        file.set_len(0)?;
        let mut writer = BufWriter::new(&file);
        writer.write_all(&json)?;
        writer.flush()?;
        drop(writer);
        file.unlock()?;

        tracing::debug!(path = %path.display(), bytes = json.len(), "session written");
        Ok(())
    }

    fn destroy(&self, id: &str) -> Result<()> {
        let path = self.checked_path(id)?;
        for path in [path, self.lock_path(id)] {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn gc(&self, max_lifetime: Duration) -> Result<usize> {
        let root = self.root();
        let entries = match std::fs::read_dir(&root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let now = SystemTime::now();
        let mut removed = 0;
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(stem) = name.strip_prefix(FILE_PREFIX) else {
                continue;
            };
            let expired = Self::idle_for(&entry, now).is_some_and(|idle| idle > max_lifetime);
            if !expired {
                continue;
            }

            if let Some(id) = stem.strip_suffix(FILE_SUFFIX) {
                // Skip sessions held by a request and files being written.
                if Self::is_claimed(&self.lock_path(id)) {
                    continue;
                }
                match Self::remove_unlocked(&entry.path()) {
                    Ok(true) => removed += 1,
                    Ok(false) => continue,
                    Err(e) => {
                        tracing::warn!(file = name, error = %e, "failed to remove expired session");
                        continue;
                    }
                }
                if let Err(e) = Self::remove_unlocked(&self.lock_path(id)) {
                    tracing::warn!(file = name, error = %e, "failed to remove session claim file");
                }
            } else if let Some(id) = stem.strip_suffix(LOCK_SUFFIX) {
                // Claims left behind by sessions that were never written.
                if !self.session_path(id).exists() {
                    if let Err(e) = Self::remove_unlocked(&entry.path()) {
                        tracing::warn!(file = name, error = %e, "failed to remove session claim file");
                    }
                }
            }
        }

        TraceEvent::StoreCollected {
            backend: self.name().into(),
            removed,
            max_lifetime_secs: max_lifetime.as_secs(),
        }
        .emit();
        Ok(removed)
    }
}
