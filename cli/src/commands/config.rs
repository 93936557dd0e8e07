// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use bastion_core::domain::config::OrchestratorConfig;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective configuration as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./bastion-config.yaml)
        #[arg(short, long, default_value = "./bastion-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = OrchestratorConfig::load_or_default(config_override.clone()).context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. BASTION_CONFIG_PATH: {}",
            std::env::var("BASTION_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./bastion-config.yaml");
        println!("  4. ~/.bastion/config.yaml");
        println!("  5. /etc/bastion/config.yaml");
        println!();
    }

    if as_yaml {
        let yaml = serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
        print!("{}", yaml);
        return Ok(());
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();
    println!("  Name: {}", config.metadata.name);
    println!();

    println!("{}", "Backend:".bold());
    println!("  URL: {}", spec.backend.url);
    println!("  Timeout: {}s", spec.backend.timeout_seconds);
    println!();

    println!("{}", "Network scan:".bold());
    println!("  Ports: {}", spec.network.ports);
    println!("  Chunk size: {}", spec.network.chunk_size);
    println!("  Progress cap: {}%", spec.network.progress_cap_percent);
    match spec.network.step_interval_ms {
        Some(ms) => println!("  Pacing: timed ({}ms)", ms),
        None => println!("  Pacing: milestones"),
    }
    println!();

    println!("{}", "Enrichment:".bold());
    println!("  Enabled: {}", spec.enrichment.enabled);
    println!("  Source: {:?}", spec.enrichment.source);
    println!("  Minimum spacing: {}ms", spec.enrichment.min_spacing_ms);
    println!(
        "  NVD API key: {}",
        if spec.enrichment.resolved_nvd_api_key().is_some() {
            "(set)".to_string()
        } else {
            "(not set)".dimmed().to_string()
        }
    );
    println!();

    println!("{}", "Review:".bold());
    println!("  Type: {}", spec.review.review_type);
    println!();

    println!("{}", "Logging:".bold());
    println!("  Level: {}", spec.observability.logging.level);
    println!("  Format: {}", spec.observability.logging.format);
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = OrchestratorConfig::load_or_default(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    std::fs::write(&output, sample(with_examples))
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

fn sample(with_examples: bool) -> &'static str {
    if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    }
}
