//! Dot-separated paths into JSON object trees (`data.cart.items`).

use serde_json::{Map, Value};

use ts_domain::error::{Error, Result};

/// Split a dotted path into its segments.  Empty segments are rejected so
/// that `a..b` or a trailing `.` never silently address the parent.
pub fn split(path: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(Error::Other(format!("malformed registry path {path:?}")));
    }
    Ok(segments)
}

pub fn lookup<'a>(map: &'a Map<String, Value>, segments: &[&str]) -> Option<&'a Value> {
    let (first, rest) = segments.split_first()?;
    let mut current = map.get(*first)?;
    for segment in rest {
        current = current.as_object()?.get(*segment)?;
    }
    Some(current)
}

/// Insert `value` at `segments`, creating intermediate objects.  Fails when an
/// intermediate segment already holds a non-object value.
pub fn insert(map: &mut Map<String, Value>, segments: &[&str], value: Value) -> Result<()> {
    let Some((last, parents)) = segments.split_last() else {
        return Err(Error::Other("empty registry path".into()));
    };

    let mut current = map;
    for (depth, segment) in parents.iter().enumerate() {
        let slot = current
            .entry((*segment).to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        current = slot.as_object_mut().ok_or_else(|| {
            Error::Other(format!(
                "{} is not a mapping",
                segments[..=depth].join(".")
            ))
        })?;
    }
    current.insert((*last).to_owned(), value);
    Ok(())
}

pub fn remove(map: &mut Map<String, Value>, segments: &[&str]) -> Option<Value> {
    let (last, parents) = segments.split_last()?;
    let mut current = map;
    for segment in parents {
        current = current.get_mut(*segment)?.as_object_mut()?;
    }
    current.remove(*last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn split_rejects_empty_segments() {
        assert!(split("a..b").is_err());
        assert!(split("a.").is_err());
        assert_eq!(split("a.b").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn insert_creates_intermediate_objects() {
        let mut map = Map::new();
        insert(&mut map, &["cart", "items"], json!(3)).unwrap();
        assert_eq!(Value::Object(map), json!({"cart": {"items": 3}}));
    }

    #[test]
    fn insert_through_scalar_fails() {
        let mut map = Map::new();
        insert(&mut map, &["visits"], json!(1)).unwrap();
        let err = insert(&mut map, &["visits", "today"], json!(1)).unwrap_err();
        assert!(err.to_string().contains("visits is not a mapping"));
    }

    #[test]
    fn lookup_and_remove_nested() {
        let mut map = json!({"a": {"b": {"c": 1}}}).as_object().cloned().unwrap();
        assert_eq!(lookup(&map, &["a", "b", "c"]), Some(&json!(1)));
        assert_eq!(remove(&mut map, &["a", "b", "c"]), Some(json!(1)));
        assert!(lookup(&map, &["a", "b", "c"]).is_none());
        assert!(remove(&mut map, &["missing", "x"]).is_none());
    }
}
