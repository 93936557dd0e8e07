// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Scan command
//!
//! Builds a [`ScanPlan`] from the command line, runs it through the
//! orchestrator against the configured backend and exports the report.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use bastion_core::application::orchestrator::{
    CodeReviewPlan, Collaborators, PlanOutcome, ScanOrchestrator, ScanPlan,
};
use bastion_core::domain::code_review::ReviewType;
use bastion_core::domain::collaborator::VulnerabilityIndex;
use bastion_core::domain::config::{EnrichmentSource, OrchestratorConfig};
use bastion_core::domain::contract::ContractSource;
use bastion_core::domain::findings::ScoreBand;
use bastion_core::domain::mobile::MobilePackage;
use bastion_core::domain::network::{NetworkScanRequest, PortRange, Target};
use bastion_core::domain::report::ReportMetadata;
use bastion_core::infrastructure::backend::BackendClient;
use bastion_core::infrastructure::event_bus::EventBus;
use bastion_core::infrastructure::nvd::NvdClient;
use bastion_core::infrastructure::source_tree::SourceTreeLoader;

use crate::progress::ProgressRenderer;

#[derive(Args, Debug, Default)]
pub struct ScanArgs {
    /// Network target: IPv4 address, hostname, `localhost` or `current`
    #[arg(short, long)]
    pub target: Option<String>,

    /// Port range `start-end` (default: spec.network.ports)
    #[arg(short, long)]
    pub ports: Option<String>,

    /// Ports per scanner batch (default: spec.network.chunk_size)
    #[arg(long)]
    pub chunk_size: Option<u32>,

    /// Source directory to review
    #[arg(long, value_name = "DIR")]
    pub source: Option<PathBuf>,

    /// Review type (default: spec.review.review_type)
    #[arg(long)]
    pub review_type: Option<String>,

    /// Android package to analyze (repeatable)
    #[arg(long = "apk", value_name = "FILE")]
    pub apks: Vec<PathBuf>,

    /// Solidity contract to analyze (repeatable)
    #[arg(long = "contract", value_name = "FILE")]
    pub contracts: Vec<PathBuf>,

    /// Where to write the JSON report
    #[arg(short, long, default_value = "bastion-report.json")]
    pub output: PathBuf,

    /// Report title
    #[arg(long)]
    pub title: Option<String>,

    /// Skip CVE enrichment of discovered services
    #[arg(long)]
    pub no_enrichment: bool,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress: bool,
}

pub async fn execute(args: ScanArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut config = OrchestratorConfig::load_or_default(config_path).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;
    if args.no_enrichment {
        config.spec.enrichment.enabled = false;
    }

    let plan = build_plan(&args, &config)?;
    if plan.is_empty() {
        bail!("Nothing to scan: pass --target, --source, --apk or --contract");
    }

    let metadata = ReportMetadata {
        title: args
            .title
            .clone()
            .unwrap_or_else(|| "Bastion Security Assessment".to_string()),
        generated_at: Utc::now(),
        target: args.target.clone(),
    };

    let bus = EventBus::with_default_capacity();
    let renderer = (!args.no_progress).then(|| ProgressRenderer::new().spawn(bus.subscribe()));
    let orchestrator = ScanOrchestrator::new(collaborators(&config)?, &config, bus);

    let token = orchestrator.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, discarding running sessions");
            token.cancel();
        }
    });

    info!(backend = %config.spec.backend.url, "Starting scan");
    let outcome = orchestrator.run(plan, metadata).await;
    interrupt.abort();

    // Dropping the orchestrator closes the event bus and ends the renderer
    drop(orchestrator);
    if let Some(handle) = renderer {
        handle.await.ok();
    }
    let outcome = outcome.context("Scan failed")?;

    let json = serde_json::to_string_pretty(&outcome.report).context("Failed to serialize report")?;
    std::fs::write(&args.output, json).with_context(|| format!("Failed to write report to {:?}", args.output))?;

    print_summary(&outcome);
    println!();
    println!(
        "{}",
        format!("✓ Report written: {}", args.output.display()).green()
    );

    Ok(())
}

/// Translate command line arguments into a plan. Inputs are validated here,
/// before anything is sent to the backend.
pub fn build_plan(args: &ScanArgs, config: &OrchestratorConfig) -> Result<ScanPlan> {
    let network = match &args.target {
        Some(raw) => {
            let target = Target::parse(raw).with_context(|| format!("Invalid target '{}'", raw))?;
            let ports = args.ports.as_deref().unwrap_or(&config.spec.network.ports);
            let port_range = PortRange::parse(ports).with_context(|| format!("Invalid port range '{}'", ports))?;
            let chunk_size = args.chunk_size.unwrap_or(config.spec.network.chunk_size);
            Some(NetworkScanRequest::new(target, port_range, chunk_size)?)
        }
        None => None,
    };

    let code_review = match &args.source {
        Some(dir) => {
            let review_type = match &args.review_type {
                Some(raw) => raw.parse::<ReviewType>().map_err(anyhow::Error::msg)?,
                None => config.spec.review.review_type,
            };
            let files = SourceTreeLoader::new()
                .load(dir)
                .with_context(|| format!("Failed to load source tree {:?}", dir))?;
            Some(CodeReviewPlan { files, review_type })
        }
        None => None,
    };

    let mobile = args
        .apks
        .iter()
        .map(|path| {
            let bytes = read_input(path)?;
            MobilePackage::new(file_name(path), bytes).with_context(|| format!("Rejected package {:?}", path))
        })
        .collect::<Result<Vec<_>>>()?;

    let contracts = args
        .contracts
        .iter()
        .map(|path| {
            let bytes = read_input(path)?;
            ContractSource::file(file_name(path), bytes).with_context(|| format!("Rejected contract {:?}", path))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ScanPlan {
        network,
        code_review,
        mobile,
        contracts,
    })
}

/// Backend adapters for every collaborator, with the configured CVE source.
pub fn collaborators(config: &OrchestratorConfig) -> Result<Collaborators> {
    let backend = Arc::new(BackendClient::from_config(&config.spec.backend).context("Failed to create backend client")?);

    Ok(Collaborators {
        scanner: backend.clone(),
        index: Some(vulnerability_index(config, backend.clone())?),
        reviewer: backend.clone(),
        mobile: backend.clone(),
        contract: backend,
    })
}

pub(crate) fn vulnerability_index(
    config: &OrchestratorConfig,
    backend: Arc<BackendClient>,
) -> Result<Arc<dyn VulnerabilityIndex>> {
    Ok(match config.spec.enrichment.source {
        EnrichmentSource::Backend => backend as Arc<dyn VulnerabilityIndex>,
        EnrichmentSource::Nvd => Arc::new(
            NvdClient::from_config(&config.spec.enrichment, config.spec.backend.timeout())
                .context("Failed to create NVD client")?,
        ),
    })
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn print_summary(outcome: &PlanOutcome) {
    let aggregate = &outcome.aggregate;
    let score = aggregate.score();
    let score_text = format!("{} ({})", score, score.band().as_str());
    let score_text = match score.band() {
        ScoreBand::Good => score_text.green(),
        ScoreBand::Fair => score_text.yellow(),
        ScoreBand::Poor => score_text.red(),
    };

    println!();
    println!("{}", outcome.report.title.bold());
    println!("  Security score: {}", score_text.bold());
    println!();

    println!("{}", "Findings:".bold());
    println!("  Total: {}", aggregate.catalog.total());
    for (severity, count) in aggregate.catalog.distribution() {
        if count > 0 {
            println!("  {:<14} {}", severity.as_str(), count);
        }
    }
    println!();

    let stats = &aggregate.statistics;
    if outcome.sessions.network.is_some() {
        println!("{}", "Network:".bold());
        println!("  Open ports: {}", stats.open_port_count);
        println!("  SSL/TLS issues: {}", stats.ssl_issue_count);
        println!("  HTTP issues: {}", stats.http_issue_count);
        println!("  Known CVEs: {}", stats.vulnerability_count);
        println!();
    }
    if stats.reviewed_file_count > 0 {
        println!("{}", "Code review:".bold());
        println!(
            "  Files reviewed: {} ({} failed)",
            stats.reviewed_file_count, stats.failed_review_count
        );
        println!();
    }
    if stats.mobile_issue_count > 0 || outcome.sessions.mobile.is_some() {
        println!("{}", "Mobile:".bold());
        println!("  Issues: {}", stats.mobile_issue_count);
        println!();
    }
    if stats.contract_issue_count > 0 || outcome.sessions.contracts.is_some() {
        println!("{}", "Contracts:".bold());
        println!("  Issues: {}", stats.contract_issue_count);
        println!();
    }

    if !aggregate.failures.is_empty() {
        println!("{}", "Incomplete analyses:".yellow().bold());
        for failure in &aggregate.failures {
            println!("  {} {} - {}", "✗".red(), failure.key, failure.error.dimmed());
        }
    }
}
