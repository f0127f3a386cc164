pub mod config;
pub mod doctor;
pub mod gc;
pub mod inspect;

use std::path::Path;

use clap::{Parser, Subcommand};
use ts_domain::config::Config;
use ts_sessions::StaticEnvironment;

/// Per-visitor session state for web applications.
#[derive(Debug, Parser)]
#[command(name = "tessera", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run diagnostic checks against the current configuration.
    Doctor,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Remove sessions idle for longer than the configured lifetime.
    Gc,
    /// Print the stored state of one session as JSON.
    Inspect {
        /// Session id (the value of the session cookie).
        id: String,
    },
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `TS_CONFIG` (or `tessera.toml`
/// by default).  Returns the parsed [`Config`] and the path that was used.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("TS_CONFIG").unwrap_or_else(|_| "tessera.toml".into());
    let config = load_config_from(Path::new(&config_path))?;
    Ok((config, config_path))
}

/// Parse `path`, falling back to defaults when it does not exist.
pub fn load_config_from(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {}: {e}", path.display()))
}

/// Environment for maintenance commands, which serve no page.
pub fn environment(config: &Config) -> StaticEnvironment {
    StaticEnvironment::from_config(&config.environment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ts_domain::config::BackendKind;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = load_config_from(&tmp.path().join("absent.toml")).unwrap();
        assert!(config.session.name.is_none());
    }

    #[test]
    fn parses_session_section() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tessera.toml");
        std::fs::write(
            &path,
            r#"
[session]
name = "SID"
backend = "memory"
"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.session.name.as_deref(), Some("SID"));
        assert_eq!(config.session.backend, BackendKind::Memory);
    }

    #[test]
    fn parse_errors_name_the_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.toml");
        std::fs::write(&path, "[session\nname = ").unwrap();

        let err = load_config_from(&path).unwrap_err().to_string();
        assert!(err.contains("broken.toml"), "{err}");
    }

    #[test]
    fn cli_parses_inspect() {
        let cli = Cli::parse_from(["tessera", "inspect", "abc"]);
        assert!(matches!(cli.command, Command::Inspect { id } if id == "abc"));
    }
}
