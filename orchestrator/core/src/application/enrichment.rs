// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Rate-Limited Enrichment Resolver
//!
//! Correlates detected service versions with an external vulnerability
//! index. The index is rate limited upstream, so:
//!
//! - products are deduplicated (trimmed, case-sensitive) and looked up once,
//!   in first-appearance order, with the version of their first fingerprint;
//! - consecutive outbound calls start at least `min_spacing` apart;
//! - a failed lookup is recorded for its product and the rest continue.
//!
//! Records are then fanned out to every fingerprint sharing the product.

use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::collaborator::{CollaboratorError, VulnerabilityIndex};
use crate::domain::events::ScanEvent;
use crate::domain::network::ServiceFingerprint;
use crate::domain::session::SessionId;
use crate::domain::vulnerability::{EnrichmentFailure, ProductEnrichment, VulnerabilityRecord};
use crate::infrastructure::event_bus::EventBus;

pub const DEFAULT_MIN_SPACING: Duration = Duration::from_secs(1);

/// Per-product lookup failure, isolated to that product.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Enrichment lookup failed for '{product}': {source}")]
pub struct EnrichmentLookupFailed {
    pub product: String,
    #[source]
    pub source: CollaboratorError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentOutcome {
    /// Lookup result per distinct product.
    pub by_product: BTreeMap<String, ProductEnrichment>,
    /// One record per (fingerprint, CVE), in fingerprint order.
    pub records: Vec<VulnerabilityRecord>,
    /// Failed products in lookup order.
    pub failures: Vec<EnrichmentFailure>,
    /// Number of outbound calls made.
    pub lookups: usize,
}

#[derive(Clone)]
pub struct RateLimitedEnrichmentResolver {
    index: Arc<dyn VulnerabilityIndex>,
    min_spacing: Duration,
    event_bus: Option<EventBus>,
    session_id: Option<SessionId>,
}

impl RateLimitedEnrichmentResolver {
    pub fn new(index: Arc<dyn VulnerabilityIndex>) -> Self {
        Self {
            index,
            min_spacing: DEFAULT_MIN_SPACING,
            event_bus: None,
            session_id: None,
        }
    }

    pub fn with_min_spacing(mut self, min_spacing: Duration) -> Self {
        self.min_spacing = min_spacing;
        self
    }

    /// Publish an `EnrichmentLookup` event per product under `session_id`.
    pub fn with_event_bus(mut self, event_bus: EventBus, session_id: SessionId) -> Self {
        self.event_bus = Some(event_bus);
        self.session_id = Some(session_id);
        self
    }

    pub fn min_spacing(&self) -> Duration {
        self.min_spacing
    }

    /// Enrich service fingerprints. Fingerprints without a product yield no
    /// records and no lookup.
    pub async fn resolve(&self, fingerprints: &[ServiceFingerprint]) -> EnrichmentOutcome {
        let queries: Vec<(String, String)> = fingerprints
            .iter()
            .map(|f| (f.product_name.clone(), f.version.clone()))
            .collect();
        let (by_product, failures, lookups) = self.lookup_all(&queries).await;

        let records = fingerprints
            .iter()
            .flat_map(|fingerprint| {
                let product = fingerprint.product_name.trim();
                by_product
                    .get(product)
                    .map(|enrichment| enrichment.entries.as_slice())
                    .unwrap_or(&[])
                    .iter()
                    .map(move |entry| VulnerabilityRecord {
                        id: entry.id.clone(),
                        description: entry.description.clone(),
                        source_port: fingerprint.port,
                        source_product: product.to_string(),
                        source_version: fingerprint.version.clone(),
                    })
            })
            .collect();

        EnrichmentOutcome {
            by_product,
            records,
            failures,
            lookups,
        }
    }

    /// Raw `(product, version)` queries, same dedup and spacing rules.
    pub async fn resolve_queries(&self, queries: &[(String, String)]) -> BTreeMap<String, ProductEnrichment> {
        self.lookup_all(queries).await.0
    }

    async fn lookup_all(
        &self,
        queries: &[(String, String)],
    ) -> (BTreeMap<String, ProductEnrichment>, Vec<EnrichmentFailure>, usize) {
        let mut seen = HashSet::new();
        let distinct: Vec<(&str, &str)> = queries
            .iter()
            .map(|(product, version)| (product.trim(), version.trim()))
            .filter(|(product, _)| !product.is_empty())
            .filter(|(product, _)| seen.insert(*product))
            .collect();

        info!(products = distinct.len(), spacing_ms = self.min_spacing.as_millis() as u64, "Starting enrichment");

        let mut by_product = BTreeMap::new();
        let mut failures = Vec::new();
        let mut last_call: Option<Instant> = None;

        for (product, version) in &distinct {
            if let Some(previous) = last_call {
                tokio::time::sleep_until(previous + self.min_spacing).await;
            }
            let started = Instant::now();
            last_call = Some(started);

            let outcome = self.index.lookup(product, version).await;
            metrics::histogram!("bastion_enrichment_lookup_seconds").record(started.elapsed().as_secs_f64());

            let enrichment = match outcome {
                Ok(entries) => {
                    debug!(product, version, cves = entries.len(), "Enrichment lookup succeeded");
                    metrics::counter!("bastion_enrichment_lookups_total", "outcome" => "success").increment(1);
                    ProductEnrichment { entries, error: None }
                }
                Err(source) => {
                    let failure = EnrichmentLookupFailed {
                        product: product.to_string(),
                        source,
                    };
                    warn!(error = %failure, "Enrichment lookup failed");
                    metrics::counter!("bastion_enrichment_lookups_total", "outcome" => "failure").increment(1);
                    failures.push(EnrichmentFailure {
                        product: product.to_string(),
                        error: failure.source.to_string(),
                    });
                    ProductEnrichment {
                        entries: Vec::new(),
                        error: Some(failure.source.to_string()),
                    }
                }
            };

            if let (Some(bus), Some(session_id)) = (&self.event_bus, self.session_id) {
                bus.publish(ScanEvent::EnrichmentLookup {
                    session_id,
                    product: product.to_string(),
                    records: enrichment.entries.len(),
                    error: enrichment.error.clone(),
                    at: Utc::now(),
                });
            }
            by_product.insert(product.to_string(), enrichment);
        }

        (by_product, failures, distinct.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vulnerability::CveEntry;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MockIndex {
        calls: Arc<Mutex<Vec<(String, String, Instant)>>>,
        failing: Vec<String>,
    }

    #[async_trait]
    impl VulnerabilityIndex for MockIndex {
        async fn lookup(&self, product: &str, version: &str) -> Result<Vec<CveEntry>, CollaboratorError> {
            self.calls
                .lock()
                .await
                .push((product.to_string(), version.to_string(), Instant::now()));
            if self.failing.iter().any(|p| p == product) {
                return Err(CollaboratorError::Unavailable("connection refused".to_string()));
            }
            Ok(vec![CveEntry {
                id: format!("CVE-2024-{}", product.len()),
                description: format!("{} {} issue", product, version),
                last_modified: None,
            }])
        }
    }

    fn fingerprint(port: u16, product: &str, version: &str) -> ServiceFingerprint {
        ServiceFingerprint {
            port,
            product_name: product.to_string(),
            version: version.to_string(),
            service_name: "svc".to_string(),
        }
    }

    #[tokio::test]
    async fn test_same_product_single_lookup_fanned_out() {
        let index = Arc::new(MockIndex::default());
        let calls = index.calls.clone();
        let resolver = RateLimitedEnrichmentResolver::new(index).with_min_spacing(Duration::ZERO);

        let outcome = resolver
            .resolve(&[fingerprint(80, "nginx", "1.18.0"), fingerprint(8080, " nginx ", "1.18.0")])
            .await;

        assert_eq!(calls.lock().await.len(), 1);
        assert_eq!(outcome.lookups, 1);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].source_port, 80);
        assert_eq!(outcome.records[1].source_port, 8080);
        assert_eq!(outcome.records[0].id, outcome.records[1].id);
    }

    #[tokio::test]
    async fn test_spacing_between_calls() {
        let index = Arc::new(MockIndex::default());
        let calls = index.calls.clone();
        let spacing = Duration::from_millis(30);
        let resolver = RateLimitedEnrichmentResolver::new(index).with_min_spacing(spacing);

        let started = Instant::now();
        resolver
            .resolve(&[
                fingerprint(22, "OpenSSH", "8.2p1"),
                fingerprint(80, "nginx", "1.18.0"),
                fingerprint(3306, "MySQL", "5.7.33"),
            ])
            .await;

        assert!(started.elapsed() >= spacing * 2);
        let calls = calls.lock().await;
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            assert!(pair[1].2.duration_since(pair[0].2) >= spacing);
        }
        let order: Vec<_> = calls.iter().map(|c| c.0.as_str()).collect();
        assert_eq!(order, vec!["OpenSSH", "nginx", "MySQL"]);
    }

    #[tokio::test]
    async fn test_failure_isolated_per_product() {
        let index = Arc::new(MockIndex {
            failing: vec!["nginx".to_string()],
            ..Default::default()
        });
        let resolver = RateLimitedEnrichmentResolver::new(index).with_min_spacing(Duration::ZERO);

        let outcome = resolver
            .resolve(&[
                fingerprint(22, "OpenSSH", "8.2p1"),
                fingerprint(80, "nginx", "1.18.0"),
                fingerprint(443, "Apache httpd", "2.4.41"),
            ])
            .await;

        assert_eq!(outcome.lookups, 3);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].product, "nginx");
        assert!(outcome.by_product["nginx"].is_failed());
        assert!(!outcome.by_product["Apache httpd"].is_failed());
        let ports: Vec<u16> = outcome.records.iter().map(|r| r.source_port).collect();
        assert_eq!(ports, vec![22, 443]);
    }

    #[tokio::test]
    async fn test_empty_products_skipped() {
        let index = Arc::new(MockIndex::default());
        let calls = index.calls.clone();
        let resolver = RateLimitedEnrichmentResolver::new(index);

        let outcome = resolver.resolve(&[fingerprint(25, "", ""), fingerprint(53, "   ", "")]).await;

        assert!(calls.lock().await.is_empty());
        assert!(outcome.records.is_empty());
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test]
    async fn test_raw_queries_use_first_version() {
        let index = Arc::new(MockIndex::default());
        let calls = index.calls.clone();
        let resolver = RateLimitedEnrichmentResolver::new(index).with_min_spacing(Duration::ZERO);

        let results = resolver
            .resolve_queries(&[
                ("django".to_string(), "3.2".to_string()),
                ("django".to_string(), "4.0".to_string()),
            ])
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(calls.lock().await[0].1, "3.2");
    }
}
