// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Scan Orchestrator
//!
//! Runs a [`ScanPlan`]: up to four independent sessions (network scan,
//! source review, mobile packages, contracts), each with its own unit store,
//! concurrently with `tokio::join!`. Once all have finished, the store
//! snapshots are aggregated and a report document is synthesized.
//!
//! Each store gets a child of the orchestrator's cancellation token, so
//! [`ScanOrchestrator::cancellation_token`] discards every session at once.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::application::aggregator::{FindingsAggregate, FindingsAggregator};
use crate::application::batch_runner::BatchSummary;
use crate::application::code_review::CodeReviewService;
use crate::application::contract_analysis::ContractAnalysisService;
use crate::application::enrichment::RateLimitedEnrichmentResolver;
use crate::application::mobile_analysis::MobileAnalysisService;
use crate::application::network_scan::{NetworkScanService, NetworkSessionError};
use crate::application::report_synthesizer::ReportSynthesizer;
use crate::application::unit_store::{AnalysisUnitStore, StoreError};
use crate::domain::code_review::{ReviewType, SourceFile};
use crate::domain::collaborator::{
    CodeReviewer, ContractAnalyzer, MobileAnalyzer, NetworkScanner, VulnerabilityIndex,
};
use crate::domain::config::OrchestratorConfig;
use crate::domain::contract::ContractSource;
use crate::domain::mobile::MobilePackage;
use crate::domain::network::NetworkScanRequest;
use crate::domain::report::{ReportDocument, ReportMetadata};
use crate::domain::session::{ScanSession, SessionId, StepPacing};
use crate::domain::unit::AnalysisUnit;
use crate::infrastructure::event_bus::EventBus;

/// External engines used by a plan. Enrichment is skipped without an index.
#[derive(Clone)]
pub struct Collaborators {
    pub scanner: Arc<dyn NetworkScanner>,
    pub index: Option<Arc<dyn VulnerabilityIndex>>,
    pub reviewer: Arc<dyn CodeReviewer>,
    pub mobile: Arc<dyn MobileAnalyzer>,
    pub contract: Arc<dyn ContractAnalyzer>,
}

#[derive(Debug, Clone)]
pub struct CodeReviewPlan {
    pub files: Vec<SourceFile>,
    pub review_type: ReviewType,
}

/// Which domains to analyze. Empty parts are skipped.
#[derive(Debug, Clone, Default)]
pub struct ScanPlan {
    pub network: Option<NetworkScanRequest>,
    pub code_review: Option<CodeReviewPlan>,
    pub mobile: Vec<MobilePackage>,
    pub contracts: Vec<ContractSource>,
}

impl ScanPlan {
    pub fn is_empty(&self) -> bool {
        self.network.is_none()
            && self.code_review.as_ref().is_none_or(|plan| plan.files.is_empty())
            && self.mobile.is_empty()
            && self.contracts.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Network session failed: {0}")]
    Network(#[from] NetworkSessionError),

    #[error("Batch session failed: {0}")]
    Batch(#[from] StoreError),
}

#[derive(Debug, Clone, Default)]
pub struct SessionOutcomes {
    pub network: Option<ScanSession>,
    pub code_review: Option<BatchSummary>,
    pub mobile: Option<BatchSummary>,
    pub contracts: Option<BatchSummary>,
}

#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub sessions: SessionOutcomes,
    /// Snapshots of every store: network, code, mobile, contract order.
    pub units: Vec<AnalysisUnit>,
    pub aggregate: FindingsAggregate,
    pub report: ReportDocument,
}

pub struct ScanOrchestrator {
    network: NetworkScanService,
    code_review: CodeReviewService,
    mobile: MobileAnalysisService,
    contracts: ContractAnalysisService,
    aggregator: FindingsAggregator,
    synthesizer: ReportSynthesizer,
    cancellation: CancellationToken,
}

impl ScanOrchestrator {
    pub fn new(collaborators: Collaborators, config: &OrchestratorConfig, event_bus: EventBus) -> Self {
        let spec = &config.spec;

        let pacing = match spec.network.step_interval_ms {
            Some(ms) => StepPacing::Timed(Duration::from_millis(ms)),
            None => StepPacing::Milestones,
        };
        let mut network = NetworkScanService::new(collaborators.scanner)
            .with_event_bus(event_bus.clone())
            .with_pacing(pacing)
            .with_progress_cap(spec.network.progress_cap_percent);
        if let (true, Some(index)) = (spec.enrichment.enabled, collaborators.index) {
            network = network.with_resolver(
                RateLimitedEnrichmentResolver::new(index).with_min_spacing(spec.enrichment.min_spacing()),
            );
        }

        Self {
            network,
            code_review: CodeReviewService::new(collaborators.reviewer).with_event_bus(event_bus.clone()),
            mobile: MobileAnalysisService::new(collaborators.mobile).with_event_bus(event_bus.clone()),
            contracts: ContractAnalysisService::new(collaborators.contract).with_event_bus(event_bus),
            aggregator: FindingsAggregator::new(),
            synthesizer: ReportSynthesizer::new(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Cancelling this token discards every running session of the plan.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub async fn run(&self, plan: ScanPlan, metadata: ReportMetadata) -> Result<PlanOutcome, OrchestratorError> {
        let ScanPlan {
            network,
            code_review,
            mobile,
            contracts,
        } = plan;
        info!(
            network = network.is_some(),
            files = code_review.as_ref().map_or(0, |p| p.files.len()),
            packages = mobile.len(),
            contracts = contracts.len(),
            "Running scan plan"
        );

        let network_session = async {
            let Some(request) = network else {
                return Ok::<_, OrchestratorError>((None, Vec::new()));
            };
            let mut store = self.session_store();
            let session = self.network.run(SessionId::new(), &mut store, request).await?;
            Ok((Some(session), store.snapshot()))
        };

        let review_session = async {
            let Some(plan) = code_review.filter(|p| !p.files.is_empty()) else {
                return Ok::<_, OrchestratorError>((None, Vec::new()));
            };
            let mut store = self.session_store();
            let summary = self
                .code_review
                .run(SessionId::new(), &mut store, plan.files, plan.review_type)
                .await?;
            Ok((Some(summary), store.snapshot()))
        };

        let mobile_session = async {
            if mobile.is_empty() {
                return Ok::<_, OrchestratorError>((None, Vec::new()));
            }
            let mut store = self.session_store();
            let summary = self.mobile.run(SessionId::new(), &mut store, mobile).await?;
            Ok((Some(summary), store.snapshot()))
        };

        let contract_session = async {
            if contracts.is_empty() {
                return Ok::<_, OrchestratorError>((None, Vec::new()));
            }
            let mut store = self.session_store();
            let summary = self.contracts.run(SessionId::new(), &mut store, contracts).await?;
            Ok((Some(summary), store.snapshot()))
        };

        let (network_result, review_result, mobile_result, contract_result) =
            tokio::join!(network_session, review_session, mobile_session, contract_session);

        let (network_outcome, mut units) = network_result?;
        let (review_outcome, review_units) = review_result?;
        let (mobile_outcome, mobile_units) = mobile_result?;
        let (contract_outcome, contract_units) = contract_result?;
        units.extend(review_units);
        units.extend(mobile_units);
        units.extend(contract_units);

        let aggregate = self.aggregator.aggregate(&units);
        let report = self.synthesizer.synthesize(&aggregate, &metadata);
        info!(
            units = units.len(),
            findings = aggregate.catalog.total(),
            score = aggregate.score().value(),
            "Scan plan finished"
        );

        Ok(PlanOutcome {
            sessions: SessionOutcomes {
                network: network_outcome,
                code_review: review_outcome,
                mobile: mobile_outcome,
                contracts: contract_outcome,
            },
            units,
            aggregate,
            report,
        })
    }

    fn session_store(&self) -> AnalysisUnitStore {
        AnalysisUnitStore::with_cancellation(self.cancellation.child_token())
    }
}
