//! Session state owned by the manager.
//!
//! `SessionData` is the whole store for one session id.  The registry never
//! copies it: it holds [`StateBinding`] handles that route every read and
//! write into the shared [`SharedState`], so writes made through the
//! registry are visible to the store without an explicit save step.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use ts_domain::error::{Error, Result};

use crate::path;

/// Everything the store persists for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    /// Session-wide values, shared by every page.
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Page-scoped values keyed by page fingerprint.
    #[serde(default)]
    pub pages: BTreeMap<String, Map<String, Value>>,
    /// Any other top-level store variables.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionData {
    /// Make sure the sub-mapping for `fingerprint` exists.
    pub fn ensure_page(&mut self, fingerprint: &str) -> &mut Map<String, Value> {
        self.pages.entry(fingerprint.to_owned()).or_default()
    }

    /// Drop every store variable (`data`, `pages` and extras).
    pub fn clear(&mut self) {
        self.data.clear();
        self.pages.clear();
        self.extra.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.pages.is_empty() && self.extra.is_empty()
    }
}

pub type SharedState = Arc<RwLock<SessionData>>;

/// Which part of the session state a binding addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Data,
    Page(String),
}

/// A live handle into one mapping of a [`SharedState`].
#[derive(Debug, Clone)]
pub struct StateBinding {
    state: SharedState,
    slot: Slot,
}

impl StateBinding {
    pub fn new(state: SharedState, slot: Slot) -> Self {
        Self { state, slot }
    }

    pub fn slot(&self) -> &Slot {
        &self.slot
    }

    pub fn snapshot(&self) -> Value {
        self.with_map(|map| Value::Object(map.clone()))
    }

    pub fn get(&self, segments: &[&str]) -> Option<Value> {
        if segments.is_empty() {
            return Some(self.snapshot());
        }
        self.with_map(|map| path::lookup(map, segments).cloned())
    }

    /// Write `value` at `segments`.  An empty path replaces the whole
    /// mapping and therefore requires an object.
    pub fn set(&self, segments: &[&str], value: Value) -> Result<()> {
        if segments.is_empty() {
            let Value::Object(replacement) = value else {
                return Err(Error::Other(format!(
                    "{} must be a mapping",
                    self.slot_name()
                )));
            };
            return self.with_map_mut(|map| {
                *map = replacement;
                Ok(())
            });
        }
        self.with_map_mut(|map| path::insert(map, segments, value))
    }

    /// Remove the value at `segments`; an empty path empties the mapping.
    pub fn remove(&self, segments: &[&str]) -> bool {
        self.with_map_mut(|map| {
            if segments.is_empty() {
                let had_values = !map.is_empty();
                map.clear();
                had_values
            } else {
                path::remove(map, segments).is_some()
            }
        })
    }

    fn slot_name(&self) -> &'static str {
        match self.slot {
            Slot::Data => "data",
            Slot::Page(_) => "page",
        }
    }

    fn with_map<R>(&self, f: impl FnOnce(&Map<String, Value>) -> R) -> R {
        let guard = self.state.read();
        match &self.slot {
            Slot::Data => f(&guard.data),
            Slot::Page(fingerprint) => match guard.pages.get(fingerprint) {
                Some(map) => f(map),
                None => f(&Map::new()),
            },
        }
    }

    fn with_map_mut<R>(&self, f: impl FnOnce(&mut Map<String, Value>) -> R) -> R {
        let mut guard = self.state.write();
        match &self.slot {
            Slot::Data => f(&mut guard.data),
            Slot::Page(fingerprint) => f(guard.ensure_page(fingerprint)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shared() -> SharedState {
        Arc::new(RwLock::new(SessionData::default()))
    }

    #[test]
    fn data_binding_writes_through() {
        let state = shared();
        let binding = StateBinding::new(state.clone(), Slot::Data);
        binding.set(&["visits"], json!(1)).unwrap();
        assert_eq!(state.read().data.get("visits"), Some(&json!(1)));
    }

    #[test]
    fn page_binding_creates_its_page_on_write() {
        let state = shared();
        let binding = StateBinding::new(state.clone(), Slot::Page("abc".into()));
        assert_eq!(binding.snapshot(), json!({}));
        binding.set(&["step"], json!(2)).unwrap();
        assert_eq!(state.read().pages["abc"].get("step"), Some(&json!(2)));
    }

    #[test]
    fn replacing_slot_requires_object() {
        let binding = StateBinding::new(shared(), Slot::Data);
        assert!(binding.set(&[], json!(5)).is_err());
        binding.set(&[], json!({"a": 1})).unwrap();
        assert_eq!(binding.snapshot(), json!({"a": 1}));
    }

    #[test]
    fn clear_drops_extras() {
        let mut data: SessionData =
            serde_json::from_value(json!({"data": {"a": 1}, "legacy": true})).unwrap();
        assert_eq!(data.extra.get("legacy"), Some(&json!(true)));
        data.clear();
        assert!(data.is_empty());
    }

    #[test]
    fn missing_sections_deserialize_empty() {
        let data: SessionData = serde_json::from_value(json!({})).unwrap();
        assert!(data.data.is_empty());
        assert!(data.pages.is_empty());
    }
}
