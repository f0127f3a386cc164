use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session store configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Options recognized by the session manager (`[session]`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionConfig {
    /// Cookie / parameter name carrying the session id.  Required: the
    /// manager refuses to start without it.
    #[serde(default)]
    pub name: Option<String>,

    /// Maximum idle seconds before the store may reclaim a session.
    #[serde(default)]
    pub lifetime: Option<u64>,

    /// Storage directory, resolved as `<scope root>/<path>/<host>/<site>`.
    /// Ignored unless both sub-options are present.
    #[serde(default)]
    pub directory: Option<DirectoryConfig>,

    /// Which store mechanism backs the session.
    #[serde(default)]
    pub backend: BackendKind,
}

impl SessionConfig {
    /// Shorthand used by embedders and tests.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// The `(path, scope)` pair when both halves are configured.
    pub fn directory_parts(&self) -> Option<(&str, &str)> {
        let dir = self.directory.as_ref()?;
        match (dir.path.as_deref(), dir.scope.as_deref()) {
            (Some(path), Some(scope)) => Some((path, scope)),
            _ => None,
        }
    }
}

/// Characters that cannot appear in a session name.  `.` is reserved as the
/// request-channel key separator (`cookie.<name>`); the rest cannot travel
/// in a `Cookie` header.
pub const FORBIDDEN_NAME_CHARS: &[char] = &['.', '=', ';', ',', ' ', '\t', '"'];

/// Why `name` cannot be used as a session name, or `None` when it can.
pub fn session_name_issue(name: Option<&str>) -> Option<String> {
    match name {
        None | Some("") => Some("session name is required".into()),
        Some(name) if name.contains(FORBIDDEN_NAME_CHARS) || name.chars().any(char::is_control) => {
            Some(format!("{name:?} contains a reserved character"))
        }
        Some(_) => None,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DirectoryConfig {
    /// Path below the scope root (e.g. `"sessions"`).
    #[serde(default)]
    pub path: Option<String>,
    /// Name of an `[environment.paths]` entry (e.g. `"storage"`).
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// One JSON file per session id under the storage directory.
    #[default]
    File,
    /// Process-local store; sessions vanish with the process.
    Memory,
}
