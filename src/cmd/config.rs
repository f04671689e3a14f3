//! Configuration view and validation commands: `takc config`.

use anyhow::Result;
use takc::config::{CONFIG_DIR, CONFIG_FILE, TakcConfig, TakcToml};

use super::super::ConfigCommands;

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    let takc_dir = project_dir.join(CONFIG_DIR);
    let config_path = takc_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("takc Configuration");
            println!("==================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No takc.toml found at {}", config_path.display());
                println!("Using default configuration.");
            }
            println!();

            // Effective values include .env and environment overrides
            let config = TakcConfig::new(project_dir.to_path_buf())?;
            print_toml(&config.toml);

            println!("Resolved paths:");
            println!("  store_dir = \"{}\"", config.store_dir().display());
            println!();

            if !config_path.exists() {
                println!("Run 'takc config init' to create a takc.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let config = TakcConfig::new(project_dir.to_path_buf())?;
            let warnings = config.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("takc.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if !takc_dir.exists() {
                std::fs::create_dir_all(&takc_dir)?;
            }

            TakcToml::default().save(&config_path)?;

            println!("Created takc.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [model] endpoint, model_id (without an endpoint compression is extractive)");
            println!("  - [storage] bucket, store_dir");
            println!("  - [ingest] chunk_size, overlap, preprocessing_steps");
            println!();
        }
    }

    Ok(())
}

fn print_toml(toml: &TakcToml) {
    println!("[storage]");
    println!("  bucket = \"{}\"", toml.storage.bucket);
    println!("  store_dir = \"{}\"", toml.storage.store_dir.display());
    println!();

    println!("[cache]");
    println!("  namespace = \"{}\"", toml.cache.namespace);
    println!("  ttl_secs = {}", toml.cache.ttl_secs);
    println!("  fast_tier = {}", toml.cache.fast_tier);
    println!();

    println!("[model]");
    println!("  model_id = \"{}\"", toml.model.model_id);
    match &toml.model.endpoint {
        Some(endpoint) => println!("  endpoint = \"{}\"", endpoint),
        None => println!("  endpoint = (none, extractive fallback)"),
    }
    if toml.model.api_key.is_some() {
        println!("  api_key = (set)");
    }
    println!("  timeout_secs = {}", toml.model.timeout_secs);
    println!("  max_retries = {}", toml.model.max_retries);
    println!("  base_delay_ms = {}", toml.model.base_delay_ms);
    println!();

    println!("[compression]");
    println!(
        "  max_concurrent_rates = {}",
        toml.compression.max_concurrent_rates
    );
    println!("  max_output_tokens = {}", toml.compression.max_output_tokens);
    println!();

    println!("[ingest]");
    println!("  chunk_size = {}", toml.ingest.chunk_size);
    println!("  overlap = {}", toml.ingest.overlap);
    println!(
        "  preprocessing_steps = [{}]",
        toml.ingest
            .preprocessing_steps
            .iter()
            .map(|s| format!("\"{}\"", s))
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!();

    println!("[query]");
    println!("  preview_chars = {}", toml.query.preview_chars);
    println!("  max_answer_tokens = {}", toml.query.max_answer_tokens);
    println!();
}
