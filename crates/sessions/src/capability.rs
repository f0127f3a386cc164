//! Host capability check, run once before any session is constructed.

use ts_domain::trace::TraceEvent;

use crate::backend::SessionBackend;

/// Probe `backend` and describe why it cannot be used, if it cannot.
pub fn probe(backend: &dyn SessionBackend) -> std::result::Result<(), String> {
    let available = backend.is_available();
    TraceEvent::CapabilityChecked {
        backend: backend.name().into(),
        available,
    }
    .emit();

    if available {
        Ok(())
    } else {
        Err(format!(
            "session storage backend {:?} is not available on this host",
            backend.name()
        ))
    }
}
