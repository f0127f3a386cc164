//! Host environment facts the session manager consumes.

use std::path::PathBuf;

use ts_domain::config::EnvironmentConfig;

pub trait Environment: Send + Sync {
    /// Filesystem root registered for `scope`.
    fn path(&self, scope: &str) -> Option<PathBuf>;
    fn site(&self) -> &str;
    fn host(&self) -> &str;
    /// Stable identity of the logical page being served.
    fn page_id(&self) -> &str;
}

/// Environment built from configuration plus per-request page / host.
#[derive(Debug, Clone)]
pub struct StaticEnvironment {
    config: EnvironmentConfig,
    host: Option<String>,
    page_id: String,
}

impl StaticEnvironment {
    pub fn from_config(config: &EnvironmentConfig) -> Self {
        Self {
            config: config.clone(),
            host: None,
            page_id: String::new(),
        }
    }

    pub fn with_page(mut self, page_id: impl Into<String>) -> Self {
        self.page_id = page_id.into();
        self
    }

    /// Override the configured host (e.g. with the request's `Host`).
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_path(mut self, scope: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        self.config.paths.insert(scope.into(), root.into());
        self
    }
}

impl Environment for StaticEnvironment {
    fn path(&self, scope: &str) -> Option<PathBuf> {
        self.config.paths.get(scope).cloned()
    }

    fn site(&self) -> &str {
        &self.config.site
    }

    fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(&self.config.host)
    }

    fn page_id(&self) -> &str {
        &self.page_id
    }
}
