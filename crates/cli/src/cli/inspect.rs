use ts_domain::config::Config;
use ts_sessions::SessionFactory;

/// Print the stored state of session `id` as pretty JSON.  Returns `false`
/// when the store does not know the id.
pub fn run(config: &Config, id: &str) -> anyhow::Result<bool> {
    let factory = SessionFactory::from_config(config);
    let env = super::environment(config);

    match factory.inspect(&env, id)? {
        Some(data) => {
            println!("{}", serde_json::to_string_pretty(&data)?);
            Ok(true)
        }
        None => {
            eprintln!("no session {id:?} in the {} store", factory.services().backend.name());
            Ok(false)
        }
    }
}
