use ts_domain::config::{Config, ConfigError, ConfigSeverity};

/// Count of `(errors, warnings)` in `issues`.
pub fn tally(issues: &[ConfigError]) -> (usize, usize) {
    let errors = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    (errors, issues.len() - errors)
}

/// Validate the config, printing any issues.  Returns `false` when at least
/// one error was found; warnings alone still pass.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();

    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    for issue in &issues {
        println!("{issue}");
    }

    let (errors, warnings) = tally(&issues);
    println!("\n{errors} error(s), {warnings} warning(s) in {config_path}");

    errors == 0
}

/// Dump the resolved config (with all defaults filled in) as TOML.
pub fn show(config: &Config) -> anyhow::Result<()> {
    let output = toml::to_string_pretty(config)
        .map_err(|e| anyhow::anyhow!("serializing config: {e}"))?;
    print!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ts_domain::config::SessionConfig;

    #[test]
    fn missing_name_fails_validation() {
        assert!(!validate(&Config::default(), "tessera.toml"));
    }

    #[test]
    fn warnings_alone_pass() {
        let config = Config {
            session: SessionConfig::named("SID"),
            ..Default::default()
        };
        // File backend without a directory is only a warning.
        let (errors, warnings) = tally(&config.validate());
        assert_eq!(errors, 0);
        assert!(warnings > 0);
        assert!(validate(&config, "tessera.toml"));
    }
}
