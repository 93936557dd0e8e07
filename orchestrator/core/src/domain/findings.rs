// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Findings Catalog
//!
//! The unified, severity-bucketed view over every analysis domain. A catalog
//! is built once per aggregation through [`FindingsCatalog::from_findings`]
//! and is read-only afterwards. [`SecurityScore`] is always derived from
//! [`ScanStatistics`] and never stored alongside them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::unit::UnitKey;

/// Severity buckets, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    High,
    Medium,
    Low,
    Informational,
    Optimization,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Informational,
        Severity::Optimization,
    ];

    /// Case-insensitive parse of collaborator severity/impact labels.
    /// Returns `None` for anything unrecognized; callers pick the default.
    pub fn parse_lenient(raw: &str) -> Option<Severity> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" | "high" => Some(Severity::High),
            "medium" | "moderate" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            "info" | "informational" => Some(Severity::Informational),
            "optimization" => Some(Severity::Optimization),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Informational => "informational",
            Severity::Optimization => "optimization",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
    Unknown,
}

impl Confidence {
    pub fn parse_lenient(raw: &str) -> Confidence {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Confidence::High,
            "medium" => Confidence::Medium,
            "low" => Confidence::Low,
            _ => Confidence::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
            Confidence::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingDomain {
    Network,
    Code,
    Mobile,
    Contract,
}

impl FindingDomain {
    pub fn id_prefix(&self) -> &'static str {
        match self {
            FindingDomain::Network => "NET",
            FindingDomain::Code => "CODE",
            FindingDomain::Mobile => "MOB",
            FindingDomain::Contract => "SOL",
        }
    }
}

impl fmt::Display for FindingDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FindingDomain::Network => "network",
            FindingDomain::Code => "code",
            FindingDomain::Mobile => "mobile",
            FindingDomain::Contract => "contract",
        };
        f.write_str(name)
    }
}

/// Where a finding came from: domain, unit and an optional location
/// (`tcp/443`, a file path, a contract line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingOrigin {
    pub domain: FindingDomain,
    pub unit_key: UnitKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub confidence: Confidence,
    pub origin: FindingOrigin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

/// Severity bucket → findings in insertion order. Every bucket is present,
/// possibly empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FindingsCatalog {
    buckets: BTreeMap<Severity, Vec<Finding>>,
}

impl FindingsCatalog {
    pub fn from_findings(findings: impl IntoIterator<Item = Finding>) -> Self {
        let mut buckets: BTreeMap<Severity, Vec<Finding>> =
            Severity::ALL.iter().map(|s| (*s, Vec::new())).collect();
        for finding in findings {
            buckets.entry(finding.severity).or_default().push(finding);
        }
        Self { buckets }
    }

    pub fn bucket(&self, severity: Severity) -> &[Finding] {
        self.buckets.get(&severity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All findings, most severe bucket first.
    pub fn iter(&self) -> impl Iterator<Item = &Finding> {
        self.buckets.values().flatten()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.bucket(severity).len()
    }

    pub fn total(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// `(severity, count)` for every bucket in severity order.
    pub fn distribution(&self) -> Vec<(Severity, usize)> {
        Severity::ALL.iter().map(|s| (*s, self.count(*s))).collect()
    }

    pub fn by_domain(&self, domain: FindingDomain) -> impl Iterator<Item = &Finding> {
        self.iter().filter(move |f| f.origin.domain == domain)
    }
}

/// Counters the security score is computed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStatistics {
    pub ssl_issue_count: usize,
    pub http_issue_count: usize,
    pub open_port_count: usize,
    pub vulnerability_count: usize,
    pub reviewed_file_count: usize,
    pub failed_review_count: usize,
    pub mobile_issue_count: usize,
    pub contract_issue_count: usize,
}

/// Open ports tolerated before each extra port costs points.
pub const OPEN_PORT_BASELINE: usize = 3;

/// Heuristic risk indicator in `[0, 100]`; higher is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecurityScore(u8);

impl SecurityScore {
    pub fn compute(stats: &ScanStatistics) -> Self {
        let mut score = 100.0_f64;
        score -= stats.ssl_issue_count as f64 * 15.0;
        score -= stats.http_issue_count as f64 * 10.0;
        score -= stats.open_port_count.saturating_sub(OPEN_PORT_BASELINE) as f64 * 5.0;
        if stats.reviewed_file_count > 0 {
            score -= stats.failed_review_count as f64 / stats.reviewed_file_count as f64 * 25.0;
        }
        Self(score.round().clamp(0.0, 100.0) as u8)
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn band(&self) -> ScoreBand {
        match self.0 {
            80..=100 => ScoreBand::Good,
            50..=79 => ScoreBand::Fair,
            _ => ScoreBand::Poor,
        }
    }
}

impl fmt::Display for SecurityScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/100", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    Good,
    Fair,
    Poor,
}

impl ScoreBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreBand::Good => "good",
            ScoreBand::Fair => "fair",
            ScoreBand::Poor => "poor",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(id: &str, severity: Severity) -> Finding {
        Finding {
            id: id.to_string(),
            title: id.to_string(),
            severity,
            confidence: Confidence::Unknown,
            origin: FindingOrigin {
                domain: FindingDomain::Network,
                unit_key: UnitKey::from("10.0.0.1"),
                location: None,
            },
            detail: None,
            remediation: None,
        }
    }

    #[test]
    fn test_score_worked_example() {
        let stats = ScanStatistics {
            ssl_issue_count: 2,
            http_issue_count: 1,
            open_port_count: 5,
            reviewed_file_count: 10,
            failed_review_count: 2,
            ..Default::default()
        };
        // 100 - 30 - 10 - 10 - 5
        assert_eq!(SecurityScore::compute(&stats).value(), 45);
        assert_eq!(SecurityScore::compute(&stats).band(), ScoreBand::Poor);
    }

    #[test]
    fn test_score_clamps_and_rounds() {
        let clean = ScanStatistics::default();
        assert_eq!(SecurityScore::compute(&clean).value(), 100);

        let terrible = ScanStatistics {
            ssl_issue_count: 20,
            ..Default::default()
        };
        assert_eq!(SecurityScore::compute(&terrible).value(), 0);

        // 1 of 3 failed: 100 - 8.33 rounds to 92
        let partial = ScanStatistics {
            reviewed_file_count: 3,
            failed_review_count: 1,
            ..Default::default()
        };
        assert_eq!(SecurityScore::compute(&partial).value(), 92);
    }

    #[test]
    fn test_open_port_baseline() {
        let stats = ScanStatistics {
            open_port_count: 3,
            ..Default::default()
        };
        assert_eq!(SecurityScore::compute(&stats).value(), 100);
    }

    #[test]
    fn test_catalog_buckets_keep_order() {
        let catalog = FindingsCatalog::from_findings(vec![
            finding("a", Severity::Low),
            finding("b", Severity::High),
            finding("c", Severity::Low),
        ]);
        assert_eq!(catalog.total(), 3);
        let low: Vec<_> = catalog.bucket(Severity::Low).iter().map(|f| f.id.as_str()).collect();
        assert_eq!(low, vec!["a", "c"]);
        let all: Vec<_> = catalog.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(all, vec!["b", "a", "c"]);
        assert_eq!(catalog.count(Severity::Optimization), 0);
    }

    #[test]
    fn test_severity_lenient_parse() {
        assert_eq!(Severity::parse_lenient("HIGH"), Some(Severity::High));
        assert_eq!(Severity::parse_lenient(" Informational "), Some(Severity::Informational));
        assert_eq!(Severity::parse_lenient("Optimization"), Some(Severity::Optimization));
        assert_eq!(Severity::parse_lenient("severe-ish"), None);
    }
}
