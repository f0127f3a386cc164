use anyhow::Context;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use ts_cli::cli::{self, Cli, Command, ConfigCommand};
use ts_domain::config::{LogFormat, ObservabilityConfig};

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    match args.command {
        Command::Doctor => {
            init_cli_tracing();
            let (config, config_path) = cli::load_config()?;
            if !cli::doctor::run(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Validate) => {
            let (config, config_path) = cli::load_config()?;
            if !cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            let (config, _config_path) = cli::load_config()?;
            cli::config::show(&config)
        }
        Command::Gc => {
            let (config, _config_path) = cli::load_config()?;
            init_tracing(&config.observability);
            cli::gc::run(&config).context("sweeping expired sessions")?;
            Ok(())
        }
        Command::Inspect { id } => {
            init_cli_tracing();
            let (config, _config_path) = cli::load_config()?;
            let found = cli::inspect::run(&config, &id)
                .with_context(|| format!("inspecting session {id}"))?;
            if !found {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Version => {
            println!("tessera {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize tracing for the `gc` job in the configured format so its
/// `ts_event` records can be collected like any other service log.
fn init_tracing(obs: &ObservabilityConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&obs.filter));

    match obs.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

/// Initialize compact stderr-only tracing for interactive commands.
///
/// Defaults to `warn` level so diagnostic output does not pollute stdout.
fn init_cli_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
