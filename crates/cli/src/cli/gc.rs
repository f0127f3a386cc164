use ts_domain::config::Config;
use ts_sessions::SessionFactory;

/// Reclaim expired sessions from the configured store.  Returns how many
/// were removed.
pub fn run(config: &Config) -> anyhow::Result<usize> {
    let factory = SessionFactory::from_config(config);
    let env = super::environment(config);
    let removed = factory.collect_garbage(&env)?;
    tracing::info!(removed, backend = factory.services().backend.name(), "session sweep finished");

    println!(
        "Removed {removed} expired session(s) from the {} store",
        factory.services().backend.name()
    );
    Ok(removed)
}
