use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Host environment
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Static environment facts (`[environment]`).  Per-request facts such as
/// the page id are supplied by the embedding pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Active site identifier.
    #[serde(default = "d_site")]
    pub site: String,

    /// Server host name used in the storage layout.
    #[serde(default = "d_host")]
    pub host: String,

    /// Filesystem roots keyed by scope (`storage = "/var/lib/app"`).
    #[serde(default)]
    pub paths: BTreeMap<String, PathBuf>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            site: d_site(),
            host: d_host(),
            paths: BTreeMap::new(),
        }
    }
}

fn d_site() -> String {
    "default".into()
}

fn d_host() -> String {
    "localhost".into()
}
