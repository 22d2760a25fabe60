
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{Config, ConfigError, OllamaConfig};
use crate::ollama::OllamaClient;

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 Study Helper Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Ollama Configuration").bold().yellow());
    eprintln!("Configure the Ollama instance used for embeddings and answers.");
    eprintln!();

    configure_ollama(&mut config.ollama)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_ollama_connection(&config.ollama) {
        eprintln!("{}", style("✓ Ollama connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not connect to Ollama").yellow()
        );
        eprintln!("You can continue, but make sure Ollama is running before uploading documents.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    eprintln!("  Host: {}", style(&config.ollama.host).cyan());
    eprintln!("  Port: {}", style(config.ollama.port).cyan());
    eprintln!(
        "  Embedding Model: {} ({} dimensions)",
        style(&config.ollama.embedding_model).cyan(),
        config.ollama.embedding_dimension
    );
    eprintln!(
        "  Generation Model: {}",
        style(&config.ollama.generation_model).cyan()
    );
    eprintln!(
        "  Timeout: {}s, {} attempt(s)",
        config.ollama.timeout_seconds, config.ollama.retry_attempts
    );

    match config.ollama_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }

    eprintln!();
    eprintln!("{}", style("Pipeline Settings:").bold().yellow());
    eprintln!("  Chunk Size: {} characters", config.chunking.chunk_size);
    eprintln!(
        "  Embedding Concurrency: {}",
        config.ingestion.embedding_concurrency
    );
    eprintln!("  Retrieved Chunks: {}", config.retrieval.top_k);
    eprintln!(
        "  Quiz Defaults: {} questions, {} difficulty",
        config.quiz.default_questions, config.quiz.default_difficulty
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    Config::load_default().map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Ok(Config::default())
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            };
            temp_config.validate()?;
            Ok(())
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(ollama.embedding_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let embedding_dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(ollama.embedding_dimension)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (64..=4096).contains(input) {
                Ok(())
            } else {
                Err("Dimension must be between 64 and 4096")
            }
        })
        .interact_text()?;

    let generation_model: String = Input::new()
        .with_prompt("Generation model")
        .default(ollama.generation_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_embedding_model(embedding_model)?;
    ollama.set_embedding_dimension(embedding_dimension)?;
    ollama.set_generation_model(generation_model)?;

    Ok(())
}

fn non_empty(input: &String) -> Result<(), &'static str> {
    if input.trim().is_empty() {
        Err("Model name cannot be empty")
    } else {
        Ok(())
    }
}

fn test_ollama_connection(ollama: &OllamaConfig) -> bool {
    OllamaClient::new(ollama)
        .map(|client| {
            client
                .with_timeout(std::time::Duration::from_secs(5))
                .with_retry_attempts(1)
        })
        .and_then(|client| client.ping())
        .is_ok()
}
