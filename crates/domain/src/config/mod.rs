mod environment;
mod observability;
mod sessions;

pub use environment::*;
pub use observability::*;
pub use sessions::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if let Some(message) = session_name_issue(self.session.name.as_deref()) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "session.name".into(),
                message,
            });
        }

        if self.session.lifetime == Some(0) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "session.lifetime".into(),
                message: "lifetime of 0 lets the store reclaim sessions immediately".into(),
            });
        }

        if let Some(dir) = &self.session.directory {
            match (dir.path.as_deref(), dir.scope.as_deref()) {
                (Some(_), Some(scope)) => {
                    if !self.environment.paths.contains_key(scope) {
                        errors.push(ConfigError {
                            severity: ConfigSeverity::Error,
                            field: "session.directory.scope".into(),
                            message: format!("no environment.paths entry for scope {scope:?}"),
                        });
                    }
                }
                _ => errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: "session.directory".into(),
                    message: "both path and scope are needed; directory is ignored".into(),
                }),
            }
        }

        if self.session.backend == BackendKind::File && self.session.directory_parts().is_none() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "session.backend".into(),
                message: "file backend without a directory stores sessions in the system temp dir"
                    .into(),
            });
        }

        errors
    }
}
