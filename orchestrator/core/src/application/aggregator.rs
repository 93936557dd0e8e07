// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Findings Aggregator
//!
//! Normalizes the per-kind unit results of a finished plan into one
//! [`FindingsCatalog`] plus the [`ScanStatistics`] the score is derived from.
//!
//! Normalization rules:
//!
//! | Source | Finding | Severity |
//! |--------|---------|----------|
//! | open ports beyond the baseline | one "excess exposure" finding | informational |
//! | SSL/TLS issue | one per issue | collaborator tag, else medium |
//! | HTTP issue | one per issue | collaborator tag, else medium |
//! | CVE record | one per record | informational |
//! | code review | none; pass/fail tallies only | |
//! | mobile issue | one per issue | collaborator severity, else informational |
//! | contract vulnerability | one per vulnerability | impact, else informational |
//!
//! Finding ids are `{DOMAIN}-{NNN}`, numbered per domain in snapshot order,
//! so the same snapshots always produce the same catalog.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::code_review::ReviewType;
use crate::domain::findings::{
    Confidence, Finding, FindingDomain, FindingOrigin, FindingsCatalog, ScanStatistics, SecurityScore, Severity,
    OPEN_PORT_BASELINE,
};
use crate::domain::network::{NetworkScanReport, PortFindings};
use crate::domain::unit::{AnalysisUnit, UnitKey, UnitKind, UnitResult, UnitStatus};

/// Outcome of one reviewed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewOutcome {
    pub file: UnitKey,
    pub passed: bool,
    pub review_type: Option<ReviewType>,
    /// Review text when passed, error message when failed.
    pub text: String,
}

/// A unit that ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFailure {
    pub key: UnitKey,
    pub kind: UnitKind,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FindingsAggregate {
    pub catalog: FindingsCatalog,
    pub statistics: ScanStatistics,
    pub network_reports: Vec<NetworkScanReport>,
    pub reviews: Vec<ReviewOutcome>,
    pub failures: Vec<UnitFailure>,
}

impl FindingsAggregate {
    pub fn score(&self) -> SecurityScore {
        SecurityScore::compute(&self.statistics)
    }

    pub fn has_findings(&self, domain: FindingDomain) -> bool {
        self.catalog.by_domain(domain).next().is_some()
    }
}

#[derive(Debug, Default)]
pub struct FindingsAggregator;

impl FindingsAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Aggregate unit snapshots. Pending and running units contribute
    /// nothing; absent result sections count as "no findings".
    pub fn aggregate(&self, units: &[AnalysisUnit]) -> FindingsAggregate {
        let mut builder = CatalogBuilder::default();
        let mut statistics = ScanStatistics::default();
        let mut network_reports = Vec::new();
        let mut reviews = Vec::new();
        let mut failures = Vec::new();

        for unit in units {
            match unit.status {
                UnitStatus::Completed => {}
                UnitStatus::Failed => {
                    let error = unit.error.clone().unwrap_or_default();
                    if unit.kind == UnitKind::CodeFile {
                        statistics.reviewed_file_count += 1;
                        statistics.failed_review_count += 1;
                        reviews.push(ReviewOutcome {
                            file: unit.key.clone(),
                            passed: false,
                            review_type: None,
                            text: error.clone(),
                        });
                    }
                    failures.push(UnitFailure {
                        key: unit.key.clone(),
                        kind: unit.kind,
                        error,
                    });
                    continue;
                }
                UnitStatus::Pending | UnitStatus::Running => continue,
            }

            let Some(result) = &unit.result else { continue };
            match result {
                UnitResult::NetworkScan(report) => {
                    normalize_network(&mut builder, &mut statistics, &unit.key, report);
                    network_reports.push(report.clone());
                }
                UnitResult::CodeFile(review) => {
                    statistics.reviewed_file_count += 1;
                    reviews.push(ReviewOutcome {
                        file: unit.key.clone(),
                        passed: true,
                        review_type: Some(review.review_type),
                        text: review.text.clone(),
                    });
                }
                UnitResult::MobilePackage(analysis) => {
                    for (category, location, issue) in analysis.issues() {
                        statistics.mobile_issue_count += 1;
                        let severity = issue
                            .severity
                            .as_deref()
                            .and_then(Severity::parse_lenient)
                            .unwrap_or(Severity::Informational);
                        let detail = match &issue.code_snippet {
                            Some(snippet) if !snippet.is_empty() => {
                                format!("{}\n\n{}", issue.description, snippet)
                            }
                            _ => issue.description.clone(),
                        };
                        builder.push(
                            FindingDomain::Mobile,
                            format!("{}: {}", category.label(), issue.display_title()),
                            severity,
                            Confidence::Unknown,
                            &unit.key,
                            location,
                            non_empty(detail),
                            None,
                        );
                    }
                }
                UnitResult::Contract(analysis) => {
                    for vulnerability in &analysis.vulnerabilities {
                        statistics.contract_issue_count += 1;
                        let title = [&vulnerability.id, &vulnerability.kind]
                            .into_iter()
                            .find(|s| !s.trim().is_empty())
                            .cloned()
                            .unwrap_or_else(|| "Unnamed vulnerability".to_string());
                        builder.push(
                            FindingDomain::Contract,
                            title,
                            Severity::parse_lenient(&vulnerability.impact).unwrap_or(Severity::Informational),
                            Confidence::parse_lenient(&vulnerability.confidence),
                            &unit.key,
                            non_empty(analysis.contract_file.clone()),
                            non_empty(vulnerability.description.clone()),
                            vulnerability.patch.clone().and_then(non_empty),
                        );
                    }
                }
            }
        }

        FindingsAggregate {
            catalog: FindingsCatalog::from_findings(builder.findings),
            statistics,
            network_reports,
            reviews,
            failures,
        }
    }
}

fn normalize_network(
    builder: &mut CatalogBuilder,
    statistics: &mut ScanStatistics,
    key: &UnitKey,
    report: &NetworkScanReport,
) {
    let open = report.open_ports.len();
    statistics.open_port_count += open;
    statistics.ssl_issue_count += report.ssl_issue_count();
    statistics.http_issue_count += report.http_issue_count();
    statistics.vulnerability_count += report.vulnerabilities.len();

    if open > OPEN_PORT_BASELINE {
        let ports: Vec<String> = report.open_ports.iter().map(|p| p.port.to_string()).collect();
        builder.push(
            FindingDomain::Network,
            "Excess network exposure".to_string(),
            Severity::Informational,
            Confidence::High,
            key,
            None,
            Some(format!(
                "{} open ports exceed the baseline of {} (open: {})",
                open,
                OPEN_PORT_BASELINE,
                ports.join(", ")
            )),
            Some("Close or firewall services that do not need to be reachable.".to_string()),
        );
    }

    push_port_findings(builder, key, "SSL/TLS", &report.ssl_findings);
    push_port_findings(builder, key, "HTTP", &report.http_findings);

    for record in &report.vulnerabilities {
        builder.push(
            FindingDomain::Network,
            record.id.clone(),
            Severity::Informational,
            Confidence::Unknown,
            key,
            Some(format!("tcp/{}", record.source_port)),
            Some(format!(
                "{} {}: {}",
                record.source_product, record.source_version, record.description
            )),
            None,
        );
    }
}

fn push_port_findings(builder: &mut CatalogBuilder, key: &UnitKey, label: &str, sets: &[PortFindings]) {
    for set in sets {
        let service = [set.service.as_str(), set.product.as_str(), set.version.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        for issue in &set.issues {
            builder.push(
                FindingDomain::Network,
                format!("{}: {}", label, issue.description),
                issue.severity.unwrap_or(Severity::Medium),
                Confidence::Unknown,
                key,
                Some(format!("tcp/{}", set.port)),
                non_empty(service.clone()),
                issue.remediation.clone(),
            );
        }
    }
}

fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[derive(Default)]
struct CatalogBuilder {
    findings: Vec<Finding>,
    sequence: HashMap<FindingDomain, usize>,
}

impl CatalogBuilder {
    #[allow(clippy::too_many_arguments)]
    fn push(
        &mut self,
        domain: FindingDomain,
        title: String,
        severity: Severity,
        confidence: Confidence,
        unit_key: &UnitKey,
        location: Option<String>,
        detail: Option<String>,
        remediation: Option<String>,
    ) {
        let next = self.sequence.entry(domain).or_insert(0);
        *next += 1;
        self.findings.push(Finding {
            id: format!("{}-{:03}", domain.id_prefix(), next),
            title,
            severity,
            confidence,
            origin: FindingOrigin {
                domain,
                unit_key: unit_key.clone(),
                location,
            },
            detail,
            remediation,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::code_review::CodeReview;
    use crate::domain::contract::{ContractAnalysis, ContractVulnerability};
    use crate::domain::mobile::MobileAnalysis;
    use crate::domain::network::{OpenPort, SecurityIssue};
    use crate::domain::unit::UnitTransition;
    use crate::domain::vulnerability::VulnerabilityRecord;

    fn completed(key: &str, result: UnitResult) -> AnalysisUnit {
        let mut unit = AnalysisUnit::new(UnitKey::from(key), result.kind());
        unit.apply(UnitTransition::Start);
        unit.apply(UnitTransition::Complete(result));
        unit
    }

    fn failed(key: &str, kind: UnitKind, error: &str) -> AnalysisUnit {
        let mut unit = AnalysisUnit::new(UnitKey::from(key), kind);
        unit.apply(UnitTransition::Start);
        unit.apply(UnitTransition::Fail(error.to_string()));
        unit
    }

    fn open_port(port: u16) -> OpenPort {
        OpenPort {
            port,
            protocol: "tcp".to_string(),
            service: "http".to_string(),
            product: String::new(),
            version: String::new(),
            extra_info: String::new(),
        }
    }

    fn issue(description: &str, severity: Option<Severity>) -> SecurityIssue {
        SecurityIssue {
            description: description.to_string(),
            severity,
            remediation: Some(format!("fix {}", description)),
        }
    }

    fn port_findings(port: u16, issues: Vec<SecurityIssue>) -> PortFindings {
        PortFindings {
            port,
            service: "https".to_string(),
            product: "nginx".to_string(),
            version: "1.18.0".to_string(),
            issues,
        }
    }

    fn network_report() -> NetworkScanReport {
        NetworkScanReport {
            target: "10.0.0.5".to_string(),
            open_ports: [22, 80, 443, 3306, 8080].into_iter().map(open_port).collect(),
            ssl_findings: vec![port_findings(
                443,
                vec![issue("Weak cipher", None), issue("Heartbleed", Some(Severity::High))],
            )],
            http_findings: vec![port_findings(80, vec![issue("Missing HSTS", None)])],
            vulnerabilities: vec![VulnerabilityRecord {
                id: "CVE-2021-23017".to_string(),
                description: "resolver off-by-one".to_string(),
                source_port: 80,
                source_product: "nginx".to_string(),
                source_version: "1.18.0".to_string(),
            }],
            ..Default::default()
        }
    }

    fn review_units(total: usize, failed_count: usize) -> Vec<AnalysisUnit> {
        (0..total)
            .map(|i| {
                let name = format!("src/file{}.py", i);
                if i < failed_count {
                    failed(&name, UnitKind::CodeFile, "Collaborator unavailable: timeout")
                } else {
                    completed(
                        &name,
                        UnitResult::CodeFile(CodeReview {
                            filename: name.clone(),
                            review_type: ReviewType::Security,
                            text: "Looks fine".to_string(),
                        }),
                    )
                }
            })
            .collect()
    }

    #[test]
    fn test_worked_example_score() {
        let mut units = vec![completed("10.0.0.5", UnitResult::NetworkScan(network_report()))];
        units.extend(review_units(10, 2));

        let aggregate = FindingsAggregator::new().aggregate(&units);

        let stats = aggregate.statistics;
        assert_eq!(stats.ssl_issue_count, 2);
        assert_eq!(stats.http_issue_count, 1);
        assert_eq!(stats.open_port_count, 5);
        assert_eq!(stats.reviewed_file_count, 10);
        assert_eq!(stats.failed_review_count, 2);
        assert_eq!(aggregate.score().value(), 45);
        assert_eq!(aggregate.failures.len(), 2);
    }

    #[test]
    fn test_network_normalization() {
        let units = vec![completed("10.0.0.5", UnitResult::NetworkScan(network_report()))];
        let aggregate = FindingsAggregator::new().aggregate(&units);
        let catalog = &aggregate.catalog;

        // weak cipher + missing HSTS default to medium; the tagged one keeps high
        assert_eq!(catalog.count(Severity::High), 1);
        assert_eq!(catalog.count(Severity::Medium), 2);
        // excess exposure + CVE
        assert_eq!(catalog.count(Severity::Informational), 2);

        let high = &catalog.bucket(Severity::High)[0];
        assert_eq!(high.title, "SSL/TLS: Heartbleed");
        assert_eq!(high.origin.location.as_deref(), Some("tcp/443"));
        assert_eq!(high.remediation.as_deref(), Some("fix Heartbleed"));

        let ids: Vec<_> = catalog.by_domain(FindingDomain::Network).map(|f| f.id.clone()).collect();
        assert!(ids.iter().all(|id| id.starts_with("NET-")));
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn test_mobile_severity_defaults_to_informational() {
        let analysis: MobileAnalysis = serde_json::from_value(serde_json::json!({
            "detailed_results": {
                "manifest_analysis": {"analyses": [{"file": "AndroidManifest.xml", "issues": [
                    {"issue": "Debuggable", "description": "debuggable build", "severity": "High"},
                    {"issue": "Exported activity", "description": "no permission"},
                    {"issue": "Odd", "description": "?", "severity": "catastrophic"}
                ]}]}
            }
        }))
        .unwrap();
        let units = vec![completed("app.apk", UnitResult::MobilePackage(analysis))];
        let aggregate = FindingsAggregator::new().aggregate(&units);

        assert_eq!(aggregate.catalog.count(Severity::High), 1);
        assert_eq!(aggregate.catalog.count(Severity::Informational), 2);
        assert_eq!(aggregate.statistics.mobile_issue_count, 3);
        assert_eq!(aggregate.catalog.bucket(Severity::High)[0].title, "Manifest: Debuggable");
    }

    #[test]
    fn test_contract_bucketed_by_impact() {
        let vulnerability = |id: &str, impact: &str| ContractVulnerability {
            id: id.to_string(),
            description: format!("{} found", id),
            impact: impact.to_string(),
            confidence: "High".to_string(),
            kind: id.to_string(),
            patch: Some("patched".to_string()),
        };
        let analysis = ContractAnalysis {
            vulnerabilities: vec![
                vulnerability("reentrancy-eth", "High"),
                vulnerability("solc-version", "Informational"),
                vulnerability("costly-loop", "Optimization"),
                vulnerability("mystery", "unknown"),
            ],
            contract_file: "Vault.sol".to_string(),
            ..Default::default()
        };
        let units = vec![completed("Vault.sol", UnitResult::Contract(analysis))];
        let aggregate = FindingsAggregator::new().aggregate(&units);
        let catalog = &aggregate.catalog;

        assert_eq!(catalog.count(Severity::High), 1);
        assert_eq!(catalog.count(Severity::Optimization), 1);
        assert_eq!(catalog.count(Severity::Informational), 2);
        let high = &catalog.bucket(Severity::High)[0];
        assert_eq!(high.id, "SOL-001");
        assert_eq!(high.confidence, Confidence::High);
        assert_eq!(high.remediation.as_deref(), Some("patched"));
    }

    #[test]
    fn test_reviews_only_tally() {
        let aggregate = FindingsAggregator::new().aggregate(&review_units(3, 1));
        assert!(aggregate.catalog.is_empty());
        assert_eq!(aggregate.reviews.len(), 3);
        assert!(!aggregate.reviews[0].passed);
        assert!(aggregate.reviews[1].passed);
        assert_eq!(aggregate.score().value(), 92);
    }

    #[test]
    fn test_empty_and_unfinished_units() {
        let pending = AnalysisUnit::new(UnitKey::from("x"), UnitKind::Contract);
        let empty = completed("10.0.0.9", UnitResult::NetworkScan(NetworkScanReport::default()));
        let aggregate = FindingsAggregator::new().aggregate(&[pending, empty]);
        assert!(aggregate.catalog.is_empty());
        assert_eq!(aggregate.score().value(), 100);
    }

    #[test]
    fn test_aggregation_is_deterministic() {
        let mut units = vec![completed("10.0.0.5", UnitResult::NetworkScan(network_report()))];
        units.extend(review_units(4, 1));
        let first = FindingsAggregator::new().aggregate(&units);
        let second = FindingsAggregator::new().aggregate(&units);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
