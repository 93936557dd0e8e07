// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! CVE lookup command

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use bastion_core::domain::config::{EnrichmentSource, OrchestratorConfig};
use bastion_core::domain::vulnerability::CveEntry;
use bastion_core::infrastructure::backend::BackendClient;

use super::scan::vulnerability_index;

#[derive(Args, Debug)]
pub struct CveArgs {
    /// Product name, e.g. `nginx`
    pub product: String,

    /// Product version, e.g. `1.18.0`
    pub version: Option<String>,

    /// Query NVD directly instead of the configured source
    #[arg(long)]
    pub nvd: bool,

    /// Print raw JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: CveArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut config = OrchestratorConfig::load_or_default(config_path).context("Failed to load configuration")?;
    if args.nvd {
        config.spec.enrichment.source = EnrichmentSource::Nvd;
    }
    config.validate().context("Configuration validation failed")?;

    let backend = Arc::new(BackendClient::from_config(&config.spec.backend).context("Failed to create backend client")?);
    let index = vulnerability_index(&config, backend)?;

    let version = args.version.as_deref().unwrap_or("");
    let entries = index
        .lookup(args.product.trim(), version.trim())
        .await
        .with_context(|| format!("CVE lookup failed for '{}'", args.product))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        print_entries(&args.product, version, &entries);
    }

    Ok(())
}

fn print_entries(product: &str, version: &str, entries: &[CveEntry]) {
    let subject = if version.is_empty() {
        product.to_string()
    } else {
        format!("{} {}", product, version)
    };

    if entries.is_empty() {
        println!("{}", format!("No known vulnerabilities for {}", subject).green());
        return;
    }

    println!("{}", format!("{} known vulnerabilities for {}:", entries.len(), subject).bold());
    for entry in entries {
        println!();
        println!("  {}", entry.id.yellow().bold());
        println!("    {}", entry.description);
        if let Some(modified) = &entry.last_modified {
            println!("    {}", format!("Last modified: {}", modified).dimmed());
        }
    }
}
