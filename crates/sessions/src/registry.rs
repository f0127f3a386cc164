//! Permissioned key/value registry with bound sub-scopes.
//!
//! Root keys hold either plain JSON values or a [`StateBinding`] into the
//! session state.  Paths are dot-separated; the first segment selects the
//! root key and the rest is resolved inside it.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde_json::{Map, Value};

use ts_domain::error::{Error, Result};

use crate::path;
use crate::state::StateBinding;

/// Access level granted to callers of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Read,
    Write,
    All,
}

impl Permission {
    pub fn can_read(self) -> bool {
        matches!(self, Self::Read | Self::All)
    }

    pub fn can_write(self) -> bool {
        matches!(self, Self::Write | Self::All)
    }
}

/// The registry operations a session manager forwards to its registry.
pub trait RegistryAccess {
    /// Read the value at `path`, or the whole tree for `None`.
    fn get(&self, path: Option<&str>) -> Result<Option<Value>>;

    /// Write `value` at `path`.  For `None`, `value` must be an object whose
    /// entries are written key by key at the root.
    fn set(&self, path: Option<&str>, value: Value) -> Result<()>;

    fn exists(&self, path: &str) -> Result<bool>;

    /// Remove the value at `path`.  Returns whether anything was removed.
    fn unregister(&self, path: &str) -> Result<bool>;
}

#[derive(Debug, Clone)]
enum Entry {
    Value(Value),
    Bound(StateBinding),
}

impl Entry {
    fn resolve(&self, rest: &[&str]) -> Option<Value> {
        match self {
            Self::Value(value) if rest.is_empty() => Some(value.clone()),
            Self::Value(Value::Object(map)) => path::lookup(map, rest).cloned(),
            Self::Value(_) => None,
            Self::Bound(binding) => binding.get(rest),
        }
    }
}

#[derive(Debug)]
pub struct Registry {
    permission: Permission,
    root: RwLock<BTreeMap<String, Entry>>,
}

impl Registry {
    pub fn new(permission: Permission) -> Self {
        Self {
            permission,
            root: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    /// Attach a live sub-scope under `key`, replacing whatever was there.
    pub fn bind(&self, key: &str, binding: StateBinding) -> Result<()> {
        self.require_write(key)?;
        self.root.write().insert(key.to_owned(), Entry::Bound(binding));
        Ok(())
    }

    fn require_read(&self, path: &str) -> Result<()> {
        if self.permission.can_read() {
            Ok(())
        } else {
            Err(Error::Permission(format!("read access to {path:?}")))
        }
    }

    fn require_write(&self, path: &str) -> Result<()> {
        if self.permission.can_write() {
            Ok(())
        } else {
            Err(Error::Permission(format!("write access to {path:?}")))
        }
    }

    fn snapshot(&self) -> Value {
        let root = self.root.read();
        let map: Map<String, Value> = root
            .iter()
            .filter_map(|(key, entry)| entry.resolve(&[]).map(|v| (key.clone(), v)))
            .collect();
        Value::Object(map)
    }

    fn set_segments(
        root: &mut BTreeMap<String, Entry>,
        segments: &[&str],
        value: Value,
    ) -> Result<()> {
        let (first, rest) = segments
            .split_first()
            .ok_or_else(|| Error::Other("empty registry path".into()))?;

        match root.get_mut(*first) {
            Some(Entry::Bound(binding)) => binding.set(rest, value),
            Some(Entry::Value(existing)) if !rest.is_empty() => {
                let Value::Object(map) = existing else {
                    return Err(Error::Other(format!("{first} is not a mapping")));
                };
                path::insert(map, rest, value)
            }
            _ if rest.is_empty() => {
                root.insert((*first).to_owned(), Entry::Value(value));
                Ok(())
            }
            _ => {
                let mut map = Map::new();
                path::insert(&mut map, rest, value)?;
                root.insert((*first).to_owned(), Entry::Value(Value::Object(map)));
                Ok(())
            }
        }
    }
}

impl RegistryAccess for Registry {
    fn get(&self, path: Option<&str>) -> Result<Option<Value>> {
        let Some(path) = path else {
            self.require_read("")?;
            return Ok(Some(self.snapshot()));
        };
        self.require_read(path)?;
        let segments = path::split(path)?;
        let root = self.root.read();
        Ok(root
            .get(segments[0])
            .and_then(|entry| entry.resolve(&segments[1..])))
    }

    fn set(&self, path: Option<&str>, value: Value) -> Result<()> {
        match path {
            Some(path) => {
                self.require_write(path)?;
                let segments = path::split(path)?;
                Self::set_segments(&mut self.root.write(), &segments, value)
            }
            None => {
                self.require_write("")?;
                let Value::Object(entries) = value else {
                    return Err(Error::Other("registry root must be a mapping".into()));
                };

                // All or nothing: reject the merge before touching any entry.
                let mut root = self.root.write();
                for (key, value) in &entries {
                    if key.is_empty() {
                        return Err(Error::Other("empty registry key".into()));
                    }
                    if matches!(root.get(key), Some(Entry::Bound(_))) && !value.is_object() {
                        return Err(Error::Other(format!("{key} must be a mapping")));
                    }
                }
                for (key, value) in entries {
                    Self::set_segments(&mut root, &[key.as_str()], value)?;
                }
                Ok(())
            }
        }
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.get(Some(path))?.is_some())
    }

    fn unregister(&self, path: &str) -> Result<bool> {
        self.require_write(path)?;
        let segments = path::split(path)?;
        let mut root = self.root.write();

        if segments.len() == 1 {
            return Ok(root.remove(segments[0]).is_some());
        }
        Ok(match root.get_mut(segments[0]) {
            Some(Entry::Bound(binding)) => binding.remove(&segments[1..]),
            Some(Entry::Value(Value::Object(map))) => path::remove(map, &segments[1..]).is_some(),
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::state::{SessionData, Slot};

    #[test]
    fn root_set_merges_entries() {
        let registry = Registry::new(Permission::All);
        registry.set(None, json!({"name": "SID", "id": "abc"})).unwrap();
        registry.set(None, json!({"id": "def"})).unwrap();
        assert_eq!(
            registry.get(None).unwrap(),
            Some(json!({"name": "SID", "id": "def"}))
        );
    }

    #[test]
    fn root_merge_is_all_or_nothing() {
        let state = Arc::new(parking_lot::RwLock::new(SessionData::default()));
        let registry = Registry::new(Permission::All);
        registry.set(None, json!({"name": "SID"})).unwrap();
        registry
            .bind("data", StateBinding::new(state.clone(), Slot::Data))
            .unwrap();

        let err = registry
            .set(None, json!({"aaa": 1, "data": 5, "name": "other"}))
            .unwrap_err();
        assert!(err.to_string().contains("data"), "{err}");
        assert_eq!(
            registry.get(None).unwrap(),
            Some(json!({"data": {}, "name": "SID"}))
        );

        registry.set(None, json!({"data": {"visits": 1}})).unwrap();
        assert_eq!(state.read().data.get("visits"), Some(&json!(1)));
    }

    #[test]
    fn nested_plain_values() {
        let registry = Registry::new(Permission::All);
        registry.set(Some("user.prefs.theme"), json!("dark")).unwrap();
        assert_eq!(
            registry.get(Some("user")).unwrap(),
            Some(json!({"prefs": {"theme": "dark"}}))
        );
        assert!(registry.unregister("user.prefs.theme").unwrap());
        assert!(!registry.exists("user.prefs.theme").unwrap());
    }

    #[test]
    fn bound_scope_aliases_state() {
        let state = Arc::new(parking_lot::RwLock::new(SessionData::default()));
        let registry = Registry::new(Permission::All);
        registry
            .bind("data", StateBinding::new(state.clone(), Slot::Data))
            .unwrap();

        registry.set(Some("data.visits"), json!(1)).unwrap();
        assert_eq!(state.read().data.get("visits"), Some(&json!(1)));

        state.write().data.insert("visits".into(), json!(2));
        assert_eq!(registry.get(Some("data.visits")).unwrap(), Some(json!(2)));
    }

    #[test]
    fn unregistering_a_binding_keeps_state() {
        let state = Arc::new(parking_lot::RwLock::new(SessionData::default()));
        state.write().data.insert("k".into(), json!(true));
        let registry = Registry::new(Permission::All);
        registry
            .bind("data", StateBinding::new(state.clone(), Slot::Data))
            .unwrap();

        assert!(registry.unregister("data").unwrap());
        assert!(registry.get(Some("data")).unwrap().is_none());
        assert_eq!(state.read().data.get("k"), Some(&json!(true)));
    }

    #[test]
    fn read_only_registry_rejects_writes() {
        let registry = Registry::new(Permission::Read);
        let err = registry.set(Some("a"), json!(1)).unwrap_err();
        assert!(matches!(err, Error::Permission(_)));
        assert!(registry.get(Some("a")).unwrap().is_none());
    }

    #[test]
    fn write_only_registry_rejects_reads() {
        let registry = Registry::new(Permission::Write);
        registry.set(Some("a"), json!(1)).unwrap();
        assert!(matches!(registry.get(Some("a")), Err(Error::Permission(_))));
    }

    #[test]
    fn writing_below_a_scalar_fails() {
        let registry = Registry::new(Permission::All);
        registry.set(Some("count"), json!(3)).unwrap();
        assert!(registry.set(Some("count.today"), json!(1)).is_err());
    }
}
