//! Synchronous, ordered event dispatch.
//!
//! Listeners run on the caller's thread in registration order.  The first
//! listener error stops delivery and is returned to the notifier.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use ts_domain::error::Result;

#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub payload: Value,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

pub type Listener = Arc<dyn Fn(&Event) -> Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct EventDispatcher {
    listeners: RwLock<HashMap<String, Vec<(ListenerId, Listener)>>>,
    next_id: AtomicU64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener<F>(&self, name: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .entry(name.into())
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let mut removed = false;
        listeners.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|(entry_id, _)| *entry_id != id);
            removed |= entries.len() != before;
            !entries.is_empty()
        });
        removed
    }

    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners.read().get(name).map_or(0, Vec::len)
    }

    /// Deliver `event` to every listener registered for its name.
    pub fn notify(&self, event: &Event) -> Result<()> {
        // Listeners may register or remove listeners themselves, so the lock
        // is released before any of them runs.
        let snapshot: Vec<Listener> = match self.listeners.read().get(&event.name) {
            Some(entries) => entries.iter().map(|(_, l)| l.clone()).collect(),
            None => return Ok(()),
        };

        tracing::trace!(event = %event.name, listeners = snapshot.len(), "dispatching event");
        for listener in snapshot {
            listener(event)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use ts_domain::error::Error;

    #[test]
    fn listeners_run_in_registration_order() {
        let dispatcher = EventDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let seen = seen.clone();
            dispatcher.add_listener("page.render", move |_| {
                seen.lock().push(tag);
                Ok(())
            });
        }
        dispatcher.notify(&Event::new("page.render")).unwrap();
        assert_eq!(*seen.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn failing_listener_stops_delivery() {
        let dispatcher = EventDispatcher::new();
        let reached = Arc::new(Mutex::new(false));
        dispatcher.add_listener("x", |_| Err(Error::Other("boom".into())));
        let flag = reached.clone();
        dispatcher.add_listener("x", move |_| {
            *flag.lock() = true;
            Ok(())
        });
        assert!(dispatcher.notify(&Event::new("x")).is_err());
        assert!(!*reached.lock());
    }

    #[test]
    fn removed_listener_is_not_called() {
        let dispatcher = EventDispatcher::new();
        let id = dispatcher.add_listener("x", |_| Err(Error::Other("should not run".into())));
        assert_eq!(dispatcher.listener_count("x"), 1);
        assert!(dispatcher.remove_listener(id));
        assert!(!dispatcher.remove_listener(id));
        assert_eq!(dispatcher.listener_count("x"), 0);
        dispatcher.notify(&Event::new("x")).unwrap();
    }

    #[test]
    fn listener_may_register_another_listener() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let inner = dispatcher.clone();
        dispatcher.add_listener("x", move |_| {
            inner.add_listener("y", |_| Ok(()));
            Ok(())
        });
        dispatcher.notify(&Event::new("x")).unwrap();
        assert_eq!(dispatcher.listener_count("y"), 1);
    }
}
