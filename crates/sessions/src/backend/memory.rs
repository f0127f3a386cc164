use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use ts_domain::error::Result;
use ts_domain::trace::TraceEvent;

use super::{IdLocks, SessionBackend, SessionLock};
use crate::directives::StoreDirectives;
use crate::state::SessionData;

#[derive(Debug, Clone)]
struct StoredSession {
    data: SessionData,
    updated_at: DateTime<Utc>,
}

/// Process-local store.  Sessions live as long as the backend value.
#[derive(Debug)]
pub struct MemoryBackend {
    available: bool,
    directives: RwLock<Option<StoreDirectives>>,
    sessions: RwLock<HashMap<String, StoredSession>>,
    locks: Arc<IdLocks>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            available: true,
            directives: RwLock::new(None),
            sessions: RwLock::new(HashMap::new()),
            locks: IdLocks::new(),
        }
    }

    /// A backend that reports no capability; used to exercise startup checks.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn directives(&self) -> Option<StoreDirectives> {
        self.directives.read().clone()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Whether a request currently holds `id`.
    pub fn is_locked(&self, id: &str) -> bool {
        self.locks.is_held(id)
    }

    /// Shift the last-write time of `id` into the past.
    pub fn age(&self, id: &str, by: Duration) {
        if let Some(entry) = self.sessions.write().get_mut(id) {
            if let Ok(delta) = chrono::Duration::from_std(by) {
                entry.updated_at -= delta;
            }
        }
    }
}

impl SessionBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn configure(&self, directives: &StoreDirectives) -> Result<()> {
        *self.directives.write() = Some(directives.clone());
        Ok(())
    }

    fn lock(&self, id: &str) -> Result<SessionLock> {
        Ok(SessionLock::new(self.locks.acquire(id)))
    }

    fn read(&self, id: &str) -> Result<Option<SessionData>> {
        Ok(self.sessions.read().get(id).map(|s| s.data.clone()))
    }

    fn write(&self, id: &str, data: &SessionData) -> Result<()> {
        self.sessions.write().insert(
            id.to_owned(),
            StoredSession {
                data: data.clone(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    fn destroy(&self, id: &str) -> Result<()> {
        self.sessions.write().remove(id);
        Ok(())
    }

    fn gc(&self, max_lifetime: Duration) -> Result<usize> {
        let Some(cutoff) = chrono::Duration::from_std(max_lifetime)
            .ok()
            .and_then(|lifetime| Utc::now().checked_sub_signed(lifetime))
        else {
            return Ok(0);
        };
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.updated_at >= cutoff);
        let removed = before - sessions.len();

        TraceEvent::StoreCollected {
            backend: self.name().into(),
            removed,
            max_lifetime_secs: max_lifetime.as_secs(),
        }
        .emit();
        Ok(removed)
    }
}
