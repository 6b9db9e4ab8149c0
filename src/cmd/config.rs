//! Configuration view and validation commands — `promptline config`.

use anyhow::Result;
use promptline::config::{CONFIG_FILE_NAME, PromptlineConfig, PromptlineToml};
use promptline::ui::icons;
use std::path::Path;

use super::super::ConfigCommands;

fn print_toml(toml: &PromptlineToml) {
    println!("[backend]");
    println!("  endpoint = \"{}\"", toml.backend.endpoint);
    println!("  connect_timeout_secs = {}", toml.backend.connect_timeout_secs);
    println!("  request_timeout_secs = {}", toml.backend.request_timeout_secs);
    println!();

    println!("[defaults]");
    println!("  model = \"{}\"", toml.defaults.model);
    println!("  temperature = {}", toml.defaults.temperature);
    println!("  strategy = \"{}\"", toml.defaults.strategy);
    println!("  context_limit = {}", toml.defaults.context_limit);
    println!("  response_reserve = {}", toml.defaults.response_reserve);
    println!("  keep_last_n = {}", toml.defaults.keep_last_n);
    println!("  chunk_size = {}", toml.defaults.chunk_size);
    println!();

    println!("[summarization]");
    println!("  enabled = {}", toml.summarization.enabled);
    println!("  temperature = {}", toml.summarization.temperature);
    println!();

    if toml.prompt.system_prompt.is_some() || toml.prompt.role_file.is_some() {
        println!("[prompt]");
        if let Some(prompt) = &toml.prompt.system_prompt {
            println!("  system_prompt = {:?}", prompt);
        }
        if let Some(path) = &toml.prompt.role_file {
            println!("  role_file = \"{}\"", path.display());
        }
        println!("  include_timestamp = {}", toml.prompt.include_timestamp);
        println!();
    }

    if !toml.models.overrides.is_empty() {
        println!("[models.overrides]");
        for (pattern, override_cfg) in &toml.models.overrides {
            println!("  \"{}\":", pattern);
            if let Some(limit) = override_cfg.context_limit {
                println!("    context_limit = {}", limit);
            }
            if let Some(strategy) = override_cfg.strategy {
                println!("    strategy = \"{}\"", strategy);
            }
            if let Some(n) = override_cfg.keep_last_n {
                println!("    keep_last_n = {}", n);
            }
            if let Some(size) = override_cfg.chunk_size {
                println!("    chunk_size = {}", size);
            }
            if let Some(t) = override_cfg.temperature {
                println!("    temperature = {}", t);
            }
            if let Some(enabled) = override_cfg.summarization {
                println!("    summarization = {}", enabled);
            }
        }
        println!();
    }
}

pub fn cmd_config(project_dir: &Path, command: Option<ConfigCommands>) -> Result<()> {
    let config = PromptlineConfig::new(project_dir.to_path_buf())?;
    let config_path = config.config_file();

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Promptline Configuration");
            println!("========================");
            println!();

            match &config.loaded_from {
                Some(path) => {
                    println!("Config file: {}", path.display());
                    println!();
                }
                None => {
                    println!("No {} found at {}", CONFIG_FILE_NAME, config_path.display());
                    println!();
                    println!("Using default configuration:");
                }
            }
            print_toml(&config.toml);

            println!("Effective values (with env/CLI overrides):");
            println!("  endpoint = \"{}\"", config.endpoint());
            println!("  model = \"{}\"", config.model());
            println!();

            if config.loaded_from.is_none() {
                println!("Run 'promptline config init' to create a {} file.", CONFIG_FILE_NAME);
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if config.loaded_from.is_none() {
                println!("No {} found. Using defaults (valid).", CONFIG_FILE_NAME);
                return Ok(());
            }

            let warnings = config.validate();
            if warnings.is_empty() {
                println!("{}Configuration is valid.", icons::CHECK);
            } else {
                println!("{}Configuration warnings:", icons::WARN);
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("{} already exists at {}", CONFIG_FILE_NAME, config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            PromptlineToml::default().save(&config_path)?;

            println!("{}Created {} at {}", icons::CHECK, CONFIG_FILE_NAME, config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [backend] endpoint, timeouts");
            println!("  - [defaults] model, strategy, context_limit, keep_last_n, chunk_size");
            println!("  - [prompt] system_prompt, role_file");
            println!("  - [models.overrides.\"llama3*\"] for model-specific settings");
            println!();
        }
    }

    Ok(())
}
