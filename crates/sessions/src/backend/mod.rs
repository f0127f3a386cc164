//! Session store mechanisms.
//!
//! A backend issues session ids, loads and persists [`SessionData`], and
//! reclaims sessions idle longer than the configured lifetime.  The manager
//! only configures and delegates; it never touches storage directly.
//!
//! A backend that supports it hands out a [`SessionLock`] from `open`.  While
//! the lock lives no other request can open the same id, so overlapping
//! requests carrying one cookie run one after the other instead of
//! overwriting each other's state on close.

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use ts_domain::config::BackendKind;
use ts_domain::error::Result;

use crate::directives::StoreDirectives;
use crate::state::SessionData;

/// Result of starting the store for one request.
#[derive(Debug)]
pub struct OpenedSession {
    pub id: String,
    pub data: SessionData,
    /// `true` when a fresh id was minted.
    pub is_new: bool,
    /// Exclusive claim on `id`; released when dropped.
    pub lock: SessionLock,
}

trait Held: Send + Sync {}
impl<T: Send + Sync> Held for T {}

/// Exclusive claim on one session id, held from `open` until the request
/// is done with the id.
pub struct SessionLock(Option<Box<dyn Held>>);

impl SessionLock {
    /// A claim that excludes nothing, for stores without per-id locking.
    pub fn none() -> Self {
        Self(None)
    }

    pub fn new(guard: impl Send + Sync + 'static) -> Self {
        Self(Some(Box::new(guard)))
    }

    pub fn is_held(&self) -> bool {
        self.0.is_some()
    }
}

impl fmt::Debug for SessionLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionLock").field(&self.is_held()).finish()
    }
}

pub trait SessionBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the host can provide this store at all.
    fn is_available(&self) -> bool {
        true
    }

    fn configure(&self, directives: &StoreDirectives) -> Result<()>;

    /// Load the stored state for `id`, `None` when unknown.
    fn read(&self, id: &str) -> Result<Option<SessionData>>;

    fn write(&self, id: &str, data: &SessionData) -> Result<()>;

    /// Delete persisted state for `id`.  Unknown ids are not an error.
    fn destroy(&self, id: &str) -> Result<()>;

    /// Remove sessions idle for longer than `max_lifetime`.  Returns how many
    /// were removed.
    fn gc(&self, max_lifetime: Duration) -> Result<usize>;

    /// Claim `id` exclusively, blocking while another request holds it.
    fn lock(&self, _id: &str) -> Result<SessionLock> {
        Ok(SessionLock::none())
    }

    /// Resume the session named by the incoming id, or mint a new one when
    /// the id is absent, malformed or unknown to the store.  The id is
    /// locked before its state is read.
    fn open(&self, incoming: Option<&str>) -> Result<OpenedSession> {
        if let Some(id) = incoming.filter(|id| is_valid_session_id(id)) {
            let lock = self.lock(id)?;
            if let Some(data) = self.read(id)? {
                return Ok(OpenedSession {
                    id: id.to_owned(),
                    data,
                    is_new: false,
                    lock,
                });
            }
            tracing::debug!(backend = self.name(), "unknown session id; issuing a new one");
        }

        let id = new_session_id();
        let lock = self.lock(&id)?;
        Ok(OpenedSession {
            id,
            data: SessionData::default(),
            is_new: true,
            lock,
        })
    }
}

/// In-process table of claimed session ids.
#[derive(Debug, Default)]
pub struct IdLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl IdLocks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claim `id`, waiting for the current holder to release it.
    pub fn acquire(self: &Arc<Self>, id: &str) -> IdLockGuard {
        let mut held = self.held.lock();
        while held.contains(id) {
            self.released.wait(&mut held);
        }
        held.insert(id.to_owned());
        IdLockGuard {
            locks: self.clone(),
            id: id.to_owned(),
        }
    }

    pub fn is_held(&self, id: &str) -> bool {
        self.held.lock().contains(id)
    }
}

#[derive(Debug)]
pub struct IdLockGuard {
    locks: Arc<IdLocks>,
    id: String,
}

impl Drop for IdLockGuard {
    fn drop(&mut self) {
        self.locks.held.lock().remove(&self.id);
        self.locks.released.notify_all();
    }
}

pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Ids are 22–128 characters of `[A-Za-z0-9-]`.  Anything else never reaches
/// a backend, which keeps ids safe to use as file names.
pub fn is_valid_session_id(id: &str) -> bool {
    (22..=128).contains(&id.len())
        && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

/// Construct the backend selected in configuration.
pub fn from_kind(kind: BackendKind) -> Arc<dyn SessionBackend> {
    match kind {
        BackendKind::File => Arc::new(FileBackend::new()),
        BackendKind::Memory => Arc::new(MemoryBackend::new()),
    }
}
