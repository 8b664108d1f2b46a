//! Prints the resolved configuration of one module.
//!
//! ```text
//! cargo run --example resolve -- <resource-root> [key...]
//! ```
//!
//! Settings are read from `profile-config.toml` in the working directory if
//! present, then from `PROFILE_CONFIG__*` environment variables. Build
//! profiles can be passed as a comma-separated `PROFILES` variable.

use std::path::PathBuf;

use profile_config::{ConfigResolver, Module, SettingsLoader, StaticProfiles};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), profile_config::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let root = PathBuf::from(args.next().unwrap_or_else(|| "src/main/resources".to_string()));
    let keys: Vec<String> = args.collect();

    let settings = SettingsLoader::new()
        .with_file("profile-config.toml", false)
        .with_env("PROFILE_CONFIG", "__")
        .build()?;

    let profiles = std::env::var("PROFILES")
        .map(|raw| raw.split(',').map(|p| p.trim().to_string()).collect())
        .unwrap_or_default();

    let resolver = ConfigResolver::builder()
        .with_settings(settings)
        .with_profiles(StaticProfiles(profiles))
        .build();

    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "module".to_string());
    let module = Module::new(name, root);

    let active = resolver.active_environment(&module);
    println!("Active environment: {active}");
    println!("Server port: {}", resolver.server_port(&module, None));
    println!("Context path: {}", resolver.context_path(&module));

    for (env, summary) in resolver.environment_summaries(&module) {
        println!(
            "  {env}: port={} context-path={}",
            summary.server_port, summary.context_path
        );
    }

    if keys.is_empty() {
        for (key, value) in resolver.all_config(&module, &active) {
            println!("{key} = {value}");
        }
    } else {
        for key in keys {
            println!("{key} = {}", resolver.get_config(&module, &key));
        }
    }

    Ok(())
}
