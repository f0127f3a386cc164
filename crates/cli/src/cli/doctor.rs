use std::path::Path;

use ts_domain::config::{BackendKind, Config};
use ts_sessions::{backend, capability, directives, Environment};

use super::config::tally;

/// Run all diagnostic checks and print a summary.
///
/// Returns `true` when every check passes.
pub fn run(config: &Config, config_path: &str) -> bool {
    println!("tessera doctor");
    println!("==============\n");

    let mut all_passed = true;

    check_config_file(config_path, &mut all_passed);
    check_config_validation(config, &mut all_passed);
    check_backend(config, &mut all_passed);
    check_storage_directory(config, &super::environment(config), &mut all_passed);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    all_passed
}

// ── Individual checks ─────────────────────────────────────────────────

fn check_config_file(config_path: &str, all_passed: &mut bool) {
    let exists = Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists {
            config_path.to_owned()
        } else {
            format!("{config_path} not found (using defaults)")
        },
    );
    if !exists {
        *all_passed = false;
    }
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
        return;
    }

    let (errors, _) = tally(&issues);
    print_check(
        "Config validation",
        errors == 0,
        format!("{} issue(s) ({errors} error(s))", issues.len()),
    );
    for issue in &issues {
        println!("      {issue}");
    }
    if errors > 0 {
        *all_passed = false;
    }
}

fn check_backend(config: &Config, all_passed: &mut bool) {
    let backend = backend::from_kind(config.session.backend);
    match capability::probe(backend.as_ref()) {
        Ok(()) => print_check("Session backend", true, format!("{} (available)", backend.name())),
        Err(reason) => {
            print_check("Session backend", false, reason);
            *all_passed = false;
        }
    }
}

fn check_storage_directory(config: &Config, env: &dyn Environment, all_passed: &mut bool) {
    if config.session.backend != BackendKind::File {
        print_check("Storage directory", true, "not used by this backend".into());
        return;
    }

    let dir = match directives::resolve(&config.session, env, false) {
        Ok(d) => d.save_path,
        Err(e) => {
            print_check("Storage directory", false, e.to_string());
            *all_passed = false;
            return;
        }
    };
    let Some(dir) = dir else {
        print_check(
            "Storage directory",
            true,
            "none configured (system temp dir)".into(),
        );
        return;
    };

    let (ok, detail) = directory_status(&dir);
    print_check("Storage directory", ok, detail);
    if !ok {
        *all_passed = false;
    }
}

/// A directory passes when it is writable, or when it is missing but its
/// nearest existing ancestor is a directory it can be created under.
fn directory_status(dir: &Path) -> (bool, String) {
    if dir.is_dir() {
        // Try creating a temp file to verify write access.
        let probe = dir.join(".tessera_doctor_probe");
        let writable = std::fs::write(&probe, b"probe").is_ok();
        let _ = std::fs::remove_file(&probe);
        return if writable {
            (true, format!("{} (writable)", dir.display()))
        } else {
            (false, format!("{} (not writable)", dir.display()))
        };
    }

    match dir.ancestors().skip(1).find(|a| a.exists()) {
        Some(ancestor) if ancestor.is_dir() => (
            true,
            format!("{} (will be created on first session)", dir.display()),
        ),
        _ => (false, format!("{} (cannot be created)", dir.display())),
    }
}

// ── Formatting helper ─────────────────────────────────────────────────

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
