// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Network Scan Domain
//!
//! Value objects for the port/service scan contract and the strongly-typed
//! report stored on a completed `NetworkScan` unit.
//!
//! The scanner backend answers with loosely shaped JSON. [`NetworkScanResponse`]
//! accepts it permissively (every section optional) and
//! [`NetworkScanReport::from_response`] turns it into typed data: open ports,
//! service fingerprints and per-port SSL/HTTP issue lists.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::LazyLock;
use thiserror::Error;

use crate::domain::findings::Severity;
use crate::domain::mobile::lenient_list;
use crate::domain::vulnerability::{EnrichmentFailure, VulnerabilityRecord};

static HOSTNAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("hostname pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkInputError {
    #[error("Target cannot be empty")]
    EmptyTarget,
    #[error("Invalid IP, hostname, or 'current': {0}")]
    InvalidTarget(String),
    #[error("Invalid port range format (e.g., 1-65535): {0}")]
    MalformedPortRange(String),
    #[error("Ports must be between 1 and 65535: {0}")]
    PortOutOfBounds(String),
    #[error("Chunk size must be greater than zero")]
    ZeroChunkSize,
}

/// Scan target: an IPv4 address, a hostname, `localhost` or `current`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Target(String);

impl Target {
    pub fn parse(raw: &str) -> Result<Self, NetworkInputError> {
        let text = raw.trim().to_lowercase();
        if text.is_empty() {
            return Err(NetworkInputError::EmptyTarget);
        }
        if text == "current" || text == "localhost" {
            return Ok(Self(text));
        }
        if text.parse::<Ipv4Addr>().is_ok() || HOSTNAME_PATTERN.is_match(&text) {
            return Ok(Self(text));
        }
        Err(NetworkInputError::InvalidTarget(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Target {
    type Error = NetworkInputError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Target> for String {
    fn from(value: Target) -> Self {
        value.0
    }
}

/// Inclusive TCP port range, `1 <= start <= end <= 65535`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PortRange {
    start: u16,
    end: u16,
}

impl PortRange {
    pub const FULL: PortRange = PortRange { start: 1, end: 65535 };

    pub fn new(start: u16, end: u16) -> Result<Self, NetworkInputError> {
        if start == 0 || start > end {
            return Err(NetworkInputError::PortOutOfBounds(format!("{}-{}", start, end)));
        }
        Ok(Self { start, end })
    }

    pub fn parse(raw: &str) -> Result<Self, NetworkInputError> {
        let (start, end) = raw
            .trim()
            .split_once('-')
            .ok_or_else(|| NetworkInputError::MalformedPortRange(raw.to_string()))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|_| NetworkInputError::MalformedPortRange(raw.to_string()))
        };
        let (start, end) = (parse(start)?, parse(end)?);
        if !(1..=65535).contains(&start) || !(1..=65535).contains(&end) || start > end {
            return Err(NetworkInputError::PortOutOfBounds(raw.to_string()));
        }
        Ok(Self {
            start: start as u16,
            end: end as u16,
        })
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    pub fn len(&self) -> u32 {
        u32::from(self.end) - u32::from(self.start) + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl TryFrom<String> for PortRange {
    type Error = NetworkInputError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PortRange> for String {
    fn from(value: PortRange) -> Self {
        value.to_string()
    }
}

/// Request body of the scanner's full scan route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkScanRequest {
    pub target: Target,
    #[serde(rename = "ports")]
    pub port_range: PortRange,
    pub chunk_size: u32,
}

impl NetworkScanRequest {
    pub fn new(target: Target, port_range: PortRange, chunk_size: u32) -> Result<Self, NetworkInputError> {
        if chunk_size == 0 {
            return Err(NetworkInputError::ZeroChunkSize);
        }
        Ok(Self {
            target,
            port_range,
            chunk_size,
        })
    }
}

// ============================================================================
// Raw collaborator payload
// ============================================================================

/// Scanner response. The SSL and HTTP sections are read leniently: a check
/// that failed upstream leaves `{"error": "..."}` (or `null`) in place of the
/// per-port map, which yields no findings plus an entry in `errors`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "ScanPayload")]
pub struct NetworkScanResponse {
    pub port_scan: PortScanSection,
    pub ssl_security_findings: BTreeMap<String, RawFindingSet>,
    pub http_security_findings: BTreeMap<String, RawFindingSet>,
    pub errors: Vec<String>,
}

#[derive(Deserialize)]
struct ScanPayload {
    #[serde(default)]
    port_scan: Option<PortScanSection>,
    #[serde(default)]
    ssl_security_findings: Value,
    #[serde(default)]
    http_security_findings: Value,
    #[serde(default, deserialize_with = "lenient_list")]
    errors: Vec<String>,
}

impl From<ScanPayload> for NetworkScanResponse {
    fn from(payload: ScanPayload) -> Self {
        let mut errors = payload.errors;
        let ssl_security_findings = finding_sections(payload.ssl_security_findings, &mut errors);
        let http_security_findings = finding_sections(payload.http_security_findings, &mut errors);
        Self {
            port_scan: payload.port_scan.unwrap_or_default(),
            ssl_security_findings,
            http_security_findings,
            errors,
        }
    }
}

/// Keep object entries keyed by a port; a string `error` entry moves to
/// `errors`. Anything else, including `null`, contributes nothing.
fn finding_sections(section: Value, errors: &mut Vec<String>) -> BTreeMap<String, RawFindingSet> {
    let Value::Object(entries) = section else {
        return BTreeMap::new();
    };

    let mut sections = BTreeMap::new();
    for (key, entry) in entries {
        match entry {
            Value::String(message) if key == "error" => errors.push(message),
            Value::Object(_) if parse_port_key(&key).is_some() => {
                if let Ok(set) = serde_json::from_value(entry) {
                    sections.insert(key, set);
                }
            }
            _ => {}
        }
    }
    sections
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PortScanSection {
    #[serde(default)]
    pub tcp: BTreeMap<String, PortInfo>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub extrainfo: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFindingSet {
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub security_issues: Vec<RawSecurityIssue>,
    #[serde(default)]
    pub remediations: Vec<String>,
}

/// Issues arrive either as bare strings or as objects with their own severity.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawSecurityIssue {
    Text(String),
    Tagged {
        #[serde(alias = "issue", alias = "title")]
        description: String,
        #[serde(default)]
        severity: Option<String>,
    },
}

/// Parse `"443"`, `"tcp/443"` or `"443/tcp"` style port keys.
pub fn parse_port_key(key: &str) -> Option<u16> {
    key.split('/')
        .find_map(|part| part.trim().parse::<u16>().ok())
}

// ============================================================================
// Typed report
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenPort {
    pub port: u16,
    pub protocol: String,
    pub service: String,
    pub product: String,
    pub version: String,
    pub extra_info: String,
}

/// Detected product/version on an open port; input to CVE enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceFingerprint {
    pub port: u16,
    pub product_name: String,
    pub version: String,
    pub service_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityIssue {
    pub description: String,
    /// Severity as tagged by the inspector, when it tagged one.
    pub severity: Option<Severity>,
    pub remediation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortFindings {
    pub port: u16,
    pub service: String,
    pub product: String,
    pub version: String,
    pub issues: Vec<SecurityIssue>,
}

impl PortFindings {
    fn from_raw(port: u16, raw: RawFindingSet) -> Self {
        let RawFindingSet {
            service,
            product,
            version,
            security_issues,
            remediations,
        } = raw;

        let issues = security_issues
            .into_iter()
            .enumerate()
            .map(|(i, issue)| {
                let (description, severity) = match issue {
                    RawSecurityIssue::Text(text) => (text, None),
                    RawSecurityIssue::Tagged { description, severity } => {
                        (description, severity.as_deref().and_then(Severity::parse_lenient))
                    }
                };
                SecurityIssue {
                    description,
                    severity,
                    remediation: remediations.get(i).cloned(),
                }
            })
            .collect();

        Self {
            port,
            service,
            product,
            version,
            issues,
        }
    }
}

/// Result of a completed network scan session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkScanReport {
    pub target: String,
    pub open_ports: Vec<OpenPort>,
    pub fingerprints: Vec<ServiceFingerprint>,
    pub ssl_findings: Vec<PortFindings>,
    pub http_findings: Vec<PortFindings>,
    pub vulnerabilities: Vec<VulnerabilityRecord>,
    pub enrichment_failures: Vec<EnrichmentFailure>,
    pub errors: Vec<String>,
}

impl NetworkScanReport {
    /// Build the typed report from a raw scanner response. Ports come out in
    /// ascending order; non-numeric port keys are dropped.
    pub fn from_response(target: &Target, response: NetworkScanResponse) -> Self {
        let NetworkScanResponse {
            port_scan,
            ssl_security_findings,
            http_security_findings,
            errors,
        } = response;

        let mut tcp: Vec<(u16, PortInfo)> = port_scan
            .tcp
            .into_iter()
            .filter_map(|(key, info)| parse_port_key(&key).map(|port| (port, info)))
            .collect();
        tcp.sort_by_key(|(port, _)| *port);

        let open_ports: Vec<OpenPort> = tcp
            .into_iter()
            .filter(|(_, info)| info.state.eq_ignore_ascii_case("open"))
            .map(|(port, info)| OpenPort {
                port,
                protocol: "tcp".to_string(),
                service: if info.name.is_empty() { "unknown".to_string() } else { info.name },
                product: info.product,
                version: info.version,
                extra_info: info.extrainfo,
            })
            .collect();

        let fingerprints = open_ports
            .iter()
            .map(|p| ServiceFingerprint {
                port: p.port,
                product_name: p.product.clone(),
                version: p.version.clone(),
                service_name: p.service.clone(),
            })
            .collect();

        Self {
            target: target.to_string(),
            open_ports,
            fingerprints,
            ssl_findings: collect_findings(ssl_security_findings),
            http_findings: collect_findings(http_security_findings),
            vulnerabilities: Vec::new(),
            enrichment_failures: Vec::new(),
            errors,
        }
    }

    pub fn ssl_issue_count(&self) -> usize {
        self.ssl_findings.iter().map(|f| f.issues.len()).sum()
    }

    pub fn http_issue_count(&self) -> usize {
        self.http_findings.iter().map(|f| f.issues.len()).sum()
    }
}

fn collect_findings(raw: BTreeMap<String, RawFindingSet>) -> Vec<PortFindings> {
    let mut findings: Vec<PortFindings> = raw
        .into_iter()
        .filter_map(|(key, set)| parse_port_key(&key).map(|port| PortFindings::from_raw(port, set)))
        .collect();
    findings.sort_by_key(|f| f.port);
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_validation() {
        assert!(Target::parse("192.168.1.10").is_ok());
        assert!(Target::parse("scanme.nmap.org").is_ok());
        assert_eq!(Target::parse("LocalHost").unwrap().as_str(), "localhost");
        assert_eq!(Target::parse("current").unwrap().as_str(), "current");
        assert_eq!(Target::parse("  ").unwrap_err(), NetworkInputError::EmptyTarget);
        assert!(matches!(
            Target::parse("bad host!"),
            Err(NetworkInputError::InvalidTarget(_))
        ));
    }

    #[test]
    fn test_port_range_validation() {
        let range = PortRange::parse("1-1024").unwrap();
        assert_eq!((range.start(), range.end()), (1, 1024));
        assert_eq!(range.len(), 1024);
        assert_eq!(range.to_string(), "1-1024");

        assert!(matches!(PortRange::parse("80"), Err(NetworkInputError::MalformedPortRange(_))));
        assert!(matches!(PortRange::parse("a-b"), Err(NetworkInputError::MalformedPortRange(_))));
        assert!(matches!(PortRange::parse("0-10"), Err(NetworkInputError::PortOutOfBounds(_))));
        assert!(matches!(PortRange::parse("100-10"), Err(NetworkInputError::PortOutOfBounds(_))));
        assert!(matches!(PortRange::parse("1-70000"), Err(NetworkInputError::PortOutOfBounds(_))));
    }

    #[test]
    fn test_request_rejects_zero_chunk() {
        let target = Target::parse("10.0.0.1").unwrap();
        assert_eq!(
            NetworkScanRequest::new(target, PortRange::FULL, 0).unwrap_err(),
            NetworkInputError::ZeroChunkSize
        );
    }

    #[test]
    fn test_request_wire_format() {
        let request = NetworkScanRequest::new(
            Target::parse("10.0.0.1").unwrap(),
            PortRange::parse("1-1000").unwrap(),
            2000,
        )
        .unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"target": "10.0.0.1", "ports": "1-1000", "chunk_size": 2000}));
    }

    #[test]
    fn test_report_from_response() {
        let raw = serde_json::json!({
            "port_scan": {"tcp": {
                "8080": {"name": "http-proxy", "product": "nginx", "version": "1.18.0", "state": "open"},
                "22": {"name": "ssh", "product": "OpenSSH", "version": "8.2p1", "state": "open", "extrainfo": "Ubuntu"},
                "25": {"name": "smtp", "state": "filtered"}
            }},
            "ssl_security_findings": {
                "tcp/443": {
                    "service": "https",
                    "security_issues": ["Weak cipher detected: RC4", {"description": "Heartbleed vulnerability detected", "severity": "High"}],
                    "remediations": ["Disable weak cipher RC4 in server configuration."]
                }
            },
            "errors": []
        });
        let response: NetworkScanResponse = serde_json::from_value(raw).unwrap();
        let report = NetworkScanReport::from_response(&Target::parse("10.0.0.1").unwrap(), response);

        let ports: Vec<u16> = report.open_ports.iter().map(|p| p.port).collect();
        assert_eq!(ports, vec![22, 8080]);
        assert_eq!(report.open_ports[0].extra_info, "Ubuntu");
        assert_eq!(report.fingerprints[1].product_name, "nginx");
        assert!(report.http_findings.is_empty());

        assert_eq!(report.ssl_findings.len(), 1);
        let ssl = &report.ssl_findings[0];
        assert_eq!(ssl.port, 443);
        assert_eq!(ssl.issues[0].severity, None);
        assert_eq!(
            ssl.issues[0].remediation.as_deref(),
            Some("Disable weak cipher RC4 in server configuration.")
        );
        assert_eq!(ssl.issues[1].severity, Some(Severity::High));
        assert_eq!(ssl.issues[1].remediation, None);
        assert_eq!(report.ssl_issue_count(), 2);
    }

    #[test]
    fn test_missing_sections_are_empty() {
        let response: NetworkScanResponse = serde_json::from_str("{}").unwrap();
        let report = NetworkScanReport::from_response(&Target::parse("localhost").unwrap(), response);
        assert!(report.open_ports.is_empty());
        assert!(report.ssl_findings.is_empty());
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_failed_security_check_keeps_open_ports() {
        let raw = serde_json::json!({
            "port_scan": {"tcp": {"443": {"name": "https", "product": "nginx", "state": "open"}}},
            "ssl_security_findings": {"error": "SSL security scan failed: timed out"},
            "http_security_findings": {
                "80": {"service": "http", "security_issues": ["Missing HSTS header"]},
                "note": "not a port"
            },
            "errors": ["udp scan skipped"]
        });
        let response: NetworkScanResponse = serde_json::from_value(raw).unwrap();
        let report = NetworkScanReport::from_response(&Target::parse("10.0.0.1").unwrap(), response);

        assert_eq!(report.open_ports.len(), 1);
        assert!(report.ssl_findings.is_empty());
        assert_eq!(report.http_issue_count(), 1);
        assert_eq!(
            report.errors,
            vec!["udp scan skipped".to_string(), "SSL security scan failed: timed out".to_string()]
        );
    }

    #[test]
    fn test_null_sections_are_empty() {
        let raw = serde_json::json!({
            "port_scan": {"tcp": {"22": {"name": "ssh", "state": "open"}}},
            "ssl_security_findings": null,
            "http_security_findings": null,
            "errors": null
        });
        let response: NetworkScanResponse = serde_json::from_value(raw).unwrap();
        let report = NetworkScanReport::from_response(&Target::parse("localhost").unwrap(), response);

        assert_eq!(report.open_ports.len(), 1);
        assert!(report.ssl_findings.is_empty());
        assert!(report.http_findings.is_empty());
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_parse_port_key() {
        assert_eq!(parse_port_key("443"), Some(443));
        assert_eq!(parse_port_key("tcp/8443"), Some(8443));
        assert_eq!(parse_port_key("53/udp"), Some(53));
        assert_eq!(parse_port_key("error"), None);
    }
}
