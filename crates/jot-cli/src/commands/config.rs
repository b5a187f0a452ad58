use jot_core::config::ClientConfig;
use jot_core::models::SHARED_OWNER;
use jot_core::remote::Endpoint;
use serde_json::json;

use crate::commands::common::Context;
use crate::error::CliError;

pub fn run_config_show(ctx: &Context) -> Result<(), CliError> {
    let endpoint = ctx.config.endpoint()?;
    let settings = ctx.config.sync_settings();
    let summary = json!({
        "config_path": ctx.config_path.display().to_string(),
        "data_dir": ctx.data_dir.display().to_string(),
        "server_url": ctx.config.server_url,
        "endpoint": endpoint.as_ref().map(Endpoint::as_str),
        "username": ctx.config.username,
        "sync": {
            "enabled": endpoint.is_some(),
            "min_interval_secs": settings.min_interval.as_secs(),
            "active_interval_secs": settings.active_interval.as_secs(),
            "background_interval_secs": settings.background_interval.as_secs(),
            "debounce_ms": u64::try_from(settings.debounce.as_millis()).unwrap_or(u64::MAX),
            "max_retries": settings.max_retries,
        },
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

pub fn run_config_set_server(ctx: &Context, url: &str) -> Result<(), CliError> {
    let endpoint = Endpoint::parse(url)?;
    let mut config = load_file_config(ctx)?;
    config.server_url = Some(url.to_string());
    config.sync.enabled = None;
    config.save_to_path(&ctx.config_path)?;

    println!("Sync server set to {endpoint}");
    Ok(())
}

pub fn run_config_set_username(ctx: &Context, name: &str) -> Result<(), CliError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CliError::Config("Username cannot be empty".to_string()));
    }
    if name == SHARED_OWNER {
        return Err(CliError::Config(format!(
            "'{SHARED_OWNER}' is reserved for shared notes"
        )));
    }

    let mut config = load_file_config(ctx)?;
    config.username = Some(name.to_string());
    config.save_to_path(&ctx.config_path)?;

    println!("Username set to {name}");
    Ok(())
}

/// The file as written, without environment overrides.
fn load_file_config(ctx: &Context) -> Result<ClientConfig, CliError> {
    Ok(ClientConfig::load_from_path(&ctx.config_path)?)
}
