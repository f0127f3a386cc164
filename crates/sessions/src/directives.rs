//! Store directives and storage-directory resolution.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use ts_domain::config::{session_name_issue, SessionConfig};
use ts_domain::error::{Error, Result};
use ts_domain::trace::TraceEvent;

use crate::environment::Environment;

/// Idle lifetime used for reclamation when none is configured (24 minutes).
pub const DEFAULT_GC_MAX_LIFETIME: Duration = Duration::from_secs(1440);

/// Settings handed to the store mechanism before it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreDirectives {
    /// Accept the id from cookies only.
    pub use_only_cookies: bool,
    pub use_cookies: bool,
    /// Embed the id in URLs.
    pub use_trans_sid: bool,
    pub auto_start: bool,
    pub name: String,
    pub gc_max_lifetime: Option<Duration>,
    pub save_path: Option<PathBuf>,
}

impl StoreDirectives {
    /// Build the directives for `config`.  Fails when the session name is
    /// missing, empty or cannot travel in a cookie; no I/O happens here.
    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        if let Some(issue) = session_name_issue(config.name.as_deref()) {
            return Err(Error::Configuration(format!("session.name: {issue}")));
        }
        let name = config.name.as_deref().unwrap_or_default();

        Ok(Self {
            use_only_cookies: true,
            use_cookies: true,
            use_trans_sid: false,
            auto_start: false,
            name: name.to_owned(),
            gc_max_lifetime: config.lifetime.map(Duration::from_secs),
            save_path: None,
        })
    }

    pub fn effective_lifetime(&self) -> Duration {
        self.gc_max_lifetime.unwrap_or(DEFAULT_GC_MAX_LIFETIME)
    }
}

/// Resolve `<env.path(scope)>/<path>/<host>/<site>`.
pub fn storage_directory(env: &dyn Environment, scope: &str, path: &str) -> Result<PathBuf> {
    let root = env.path(scope).ok_or_else(|| {
        Error::Configuration(format!("no path registered for scope {scope:?}"))
    })?;

    let mut dir = clean_path(&root)?;
    for part in [path, env.host(), env.site()] {
        dir.push(clean_relative(part)?);
    }
    Ok(dir)
}

/// Resolve directives plus storage directory for `config`, creating the
/// directory when `create` is set.
pub fn resolve(config: &SessionConfig, env: &dyn Environment, create: bool) -> Result<StoreDirectives> {
    let mut directives = StoreDirectives::from_config(config)?;
    if let Some((path, scope)) = config.directory_parts() {
        let dir = storage_directory(env, scope, path)?;
        if create {
            ensure_directory(&dir)?;
        }
        directives.save_path = Some(dir);
    }
    Ok(directives)
}

/// Create `dir` and its parents with owner-only permissions.  Returns
/// whether anything was created.
pub fn ensure_directory(dir: &Path) -> Result<bool> {
    if dir.is_dir() {
        return Ok(false);
    }

    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)?;

    TraceEvent::StoreDirectoryCreated {
        path: dir.display().to_string(),
    }
    .emit();
    Ok(true)
}

fn clean_path(path: &Path) -> Result<PathBuf> {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(Error::Configuration(format!(
                    "storage path {} must not contain '..'",
                    path.display()
                )))
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    Ok(cleaned)
}

fn clean_relative(part: &str) -> Result<PathBuf> {
    let cleaned = clean_path(Path::new(part))?;
    if cleaned.has_root() || cleaned.as_os_str().is_empty() {
        return Err(Error::Configuration(format!(
            "storage path segment {part:?} must be a non-empty relative path"
        )));
    }
    Ok(cleaned)
}
