use serde::Serialize;

/// Structured trace events emitted across all tessera crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    CapabilityChecked {
        backend: String,
        available: bool,
    },
    StoreDirectoryCreated {
        path: String,
    },
    SessionStarted {
        session_name: String,
        session_id: String,
        backend: String,
        is_new: bool,
    },
    PageScoped {
        session_id: String,
        fingerprint: String,
    },
    RequestValueStripped {
        key: String,
    },
    SessionClosed {
        session_id: String,
        duration_ms: u64,
    },
    SessionDestroyed {
        session_id: String,
    },
    StoreCollected {
        backend: String,
        removed: usize,
        max_lifetime_secs: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "ts_event");
    }
}
