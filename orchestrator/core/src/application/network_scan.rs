// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Network Scan Session
//!
//! Drives one target through port scan, service detection, SSL/TLS and HTTP
//! inspection (a single backend call) and then CVE enrichment of the
//! detected service versions.
//!
//! Unlike batch runs there is no partial continuation: when the scan call
//! fails the unit is marked `Failed` and the session ends.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::application::enrichment::RateLimitedEnrichmentResolver;
use crate::application::step_sequencer::{SequencerError, StepSequencer};
use crate::application::unit_store::{AnalysisUnitStore, StoreError};
use crate::domain::collaborator::{CollaboratorError, NetworkScanner};
use crate::domain::events::ScanEvent;
use crate::domain::network::{NetworkScanReport, NetworkScanRequest, NetworkScanResponse};
use crate::domain::session::{ScanSession, SessionId, Step, StepPacing};
use crate::domain::unit::{UnitKey, UnitKind, UnitResult, UnitStatus, UnitTransition};
use crate::infrastructure::event_bus::EventBus;

pub const DEFAULT_PROGRESS_CAP: u8 = 80;

/// Steps covered by the single full-scan call.
const SCAN_STEPS: usize = 4;
const ENRICHMENT_STEP: usize = 4;

pub fn network_scan_steps() -> Vec<Step> {
    vec![
        Step::new("port-scan", "Port scanning"),
        Step::new("service-detection", "Service detection"),
        Step::new("ssl-analysis", "SSL/TLS analysis"),
        Step::new("http-analysis", "HTTP security analysis"),
        Step::new("vulnerability-lookup", "Vulnerability lookup"),
    ]
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkSessionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sequencer(#[from] SequencerError),
}

pub struct NetworkScanService {
    scanner: Arc<dyn NetworkScanner>,
    resolver: Option<RateLimitedEnrichmentResolver>,
    event_bus: Option<EventBus>,
    pacing: StepPacing,
    cap_percent: u8,
}

impl NetworkScanService {
    pub fn new(scanner: Arc<dyn NetworkScanner>) -> Self {
        Self {
            scanner,
            resolver: None,
            event_bus: None,
            pacing: StepPacing::Milestones,
            cap_percent: DEFAULT_PROGRESS_CAP,
        }
    }

    pub fn with_resolver(mut self, resolver: RateLimitedEnrichmentResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// A zero tick period falls back to milestone pacing.
    pub fn with_pacing(mut self, pacing: StepPacing) -> Self {
        self.pacing = match pacing {
            StepPacing::Timed(period) if period.is_zero() => StepPacing::Milestones,
            other => other,
        };
        self
    }

    pub fn with_progress_cap(mut self, cap_percent: u8) -> Self {
        self.cap_percent = cap_percent;
        self
    }

    /// Run the session. Collaborator failures end up on the unit; only store
    /// or sequencer invariant violations are returned as errors.
    pub async fn run(
        &self,
        session_id: SessionId,
        store: &mut AnalysisUnitStore,
        request: NetworkScanRequest,
    ) -> Result<ScanSession, NetworkSessionError> {
        let mut sequencer = StepSequencer::with_id(session_id, network_scan_steps(), self.cap_percent)?;
        if let Some(bus) = &self.event_bus {
            sequencer = sequencer.with_event_bus(bus.clone());
        }

        if store.is_discarded() {
            warn!(session_id = %session_id, "Network scan discarded before start");
            return Ok(sequencer.session());
        }

        let key = UnitKey::new(request.target.as_str());
        store.register(key.clone(), UnitKind::NetworkScan)?;
        store.transition(&key, UnitTransition::Start)?;
        self.publish(ScanEvent::SessionStarted {
            session_id,
            name: format!("network:{}", key),
            total_steps: sequencer.total_steps(),
            started_at: Utc::now(),
        });
        self.publish_unit(session_id, &key, UnitStatus::Running);
        info!(
            session_id = %session_id,
            target = %request.target,
            ports = %request.port_range,
            chunk_size = request.chunk_size,
            "Network scan started"
        );

        sequencer.advance(0)?;
        let outcome = match self.pacing {
            StepPacing::Milestones => self.scanner.full_scan(&request).await,
            StepPacing::Timed(period) => self.scan_with_ticker(&request, &mut sequencer, period).await?,
        };

        if store.is_discarded() {
            debug!(session_id = %session_id, "Ignoring scan completion of discarded session");
            return Ok(sequencer.session());
        }

        let response = match outcome.and_then(reject_embedded_error) {
            Ok(response) => response,
            Err(e) => {
                warn!(session_id = %session_id, target = %key, error = %e, "Network scan failed");
                store.transition(&key, UnitTransition::Fail(e.to_string()))?;
                self.publish_unit(session_id, &key, UnitStatus::Failed);
                self.publish(ScanEvent::SessionFailed {
                    session_id,
                    reason: e.to_string(),
                    failed_at: Utc::now(),
                });
                return Ok(sequencer.session());
            }
        };

        // Milestones: the response carries every scan section at once
        for step in sequencer.current_step_index() + 1..SCAN_STEPS {
            sequencer.advance(step)?;
        }

        let mut report = NetworkScanReport::from_response(&request.target, response);
        info!(
            session_id = %session_id,
            open_ports = report.open_ports.len(),
            ssl_issues = report.ssl_issue_count(),
            http_issues = report.http_issue_count(),
            "Port and service scan finished"
        );

        sequencer.advance(ENRICHMENT_STEP)?;
        if let Some(resolver) = &self.resolver {
            let resolver = match &self.event_bus {
                Some(bus) => resolver.clone().with_event_bus(bus.clone(), session_id),
                None => resolver.clone(),
            };
            let enrichment = resolver.resolve(&report.fingerprints).await;
            if store.is_discarded() {
                debug!(session_id = %session_id, "Ignoring enrichment of discarded session");
                return Ok(sequencer.session());
            }
            report.vulnerabilities = enrichment.records;
            report.enrichment_failures = enrichment.failures;
        }

        store.transition(&key, UnitTransition::Complete(UnitResult::NetworkScan(report)))?;
        self.publish_unit(session_id, &key, UnitStatus::Completed);
        sequencer.complete()?;
        self.publish(ScanEvent::SessionCompleted {
            session_id,
            completed_at: Utc::now(),
        });
        info!(session_id = %session_id, target = %key, "Network scan completed");

        Ok(sequencer.session())
    }

    /// Await the scan call while advancing through the scan steps on a
    /// fixed tick. The ticker never moves past the last scan step.
    async fn scan_with_ticker(
        &self,
        request: &NetworkScanRequest,
        sequencer: &mut StepSequencer,
        period: Duration,
    ) -> Result<Result<NetworkScanResponse, CollaboratorError>, SequencerError> {
        let scan = self.scanner.full_scan(request);
        tokio::pin!(scan);

        let mut ticker = tokio::time::interval(period);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                outcome = &mut scan => return Ok(outcome),
                _ = ticker.tick() => {
                    let next = sequencer.current_step_index() + 1;
                    if next < SCAN_STEPS {
                        sequencer.advance(next)?;
                    }
                }
            }
        }
    }

    fn publish(&self, event: ScanEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }

    fn publish_unit(&self, session_id: SessionId, key: &UnitKey, status: UnitStatus) {
        self.publish(ScanEvent::UnitTransitioned {
            session_id,
            unit_key: key.clone(),
            kind: UnitKind::NetworkScan,
            status,
            at: Utc::now(),
        });
    }
}

/// A 2xx response can still report that the port scan itself failed.
fn reject_embedded_error(response: NetworkScanResponse) -> Result<NetworkScanResponse, CollaboratorError> {
    match &response.port_scan.error {
        Some(error) => Err(CollaboratorError::rejected(None, error.clone())),
        None => Ok(response),
    }
}
