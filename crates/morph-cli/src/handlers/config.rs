//! Configuration command handlers

use crate::cli::{ConfigAction, ConfigArgs, ConfigFormat, ConfigShowArgs};
use crate::error::{Error, Result};
use crate::output::OutputWriter;
use morph_core::MorphConfig;

/// Handle the config command
pub async fn handle_config(args: ConfigArgs, config: &MorphConfig, output: &mut OutputWriter) -> Result<()> {
    match args.action {
        ConfigAction::Show(show_args) => handle_config_show(show_args, config, output),
        ConfigAction::Validate => handle_config_validate(config, output),
    }
}

fn handle_config_show(args: ConfigShowArgs, config: &MorphConfig, output: &mut OutputWriter) -> Result<()> {
    let rendered = render(config, args.format)?;
    output.writeln(rendered.trim_end())
}

fn handle_config_validate(config: &MorphConfig, output: &mut OutputWriter) -> Result<()> {
    config.validate()?;

    output.success("✓ Configuration is valid")?;
    output.section("Effective settings")?;
    let default_model = config
        .providers
        .default_model(config.providers.default)
        .unwrap_or_default();
    output.info(&format!(
        "Default provider: {} ({})",
        config.providers.default, default_model
    ))?;
    output.info(&format!(
        "Cache: {} (store '{}', ttl {}s)",
        if config.cache.enabled { "enabled" } else { "disabled" },
        config.cache.store,
        config.cache.ttl_secs
    ))?;
    output.info(&format!(
        "Rate limit: {} ({} attempts per {}s)",
        if config.rate_limit.enabled { "enabled" } else { "disabled" },
        config.rate_limit.max_attempts,
        config.rate_limit.decay_secs
    ))?;
    output.info(&format!(
        "Queue: {}/{} ({} tries, {}s timeout)",
        config.queue.connection, config.queue.name, config.queue.tries, config.queue.timeout_secs
    ))?;
    Ok(())
}

fn render(config: &MorphConfig, format: ConfigFormat) -> Result<String> {
    Ok(match format {
        ConfigFormat::Toml => toml::to_string_pretty(config)
            .map_err(|e| Error::other(format!("Failed to render TOML: {}", e)))?,
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}
