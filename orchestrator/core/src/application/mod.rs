// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod unit_store;
pub mod step_sequencer;
pub mod batch_runner;
pub mod enrichment;
pub mod aggregator;
pub mod report_synthesizer;

pub mod network_scan;
pub mod code_review;
pub mod mobile_analysis;
pub mod contract_analysis;
pub mod orchestrator;

// Re-export the session drivers and the facade for convenience
pub use network_scan::{NetworkScanService, NetworkSessionError};
pub use code_review::CodeReviewService;
pub use mobile_analysis::MobileAnalysisService;
pub use contract_analysis::ContractAnalysisService;
pub use orchestrator::{Collaborators, CodeReviewPlan, PlanOutcome, ScanOrchestrator, ScanPlan};
