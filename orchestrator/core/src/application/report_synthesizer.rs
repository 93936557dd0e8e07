// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Report Synthesizer
//!
//! Pure function from a [`FindingsAggregate`] and caller metadata to a
//! [`ReportDocument`]. Sections that would be empty are omitted, never
//! rendered as empty headings. The clock is never read, so identical input
//! serializes to identical output.

use std::collections::HashSet;

use crate::application::aggregator::FindingsAggregate;
use crate::domain::findings::{Finding, FindingDomain, Severity};
use crate::domain::report::{
    Block, DataPoint, Figure, FigureKind, ReportDocument, ReportMetadata, ReportSummary, Section, Table,
};

#[derive(Debug, Default)]
pub struct ReportSynthesizer;

impl ReportSynthesizer {
    pub fn new() -> Self {
        Self
    }

    pub fn synthesize(&self, aggregate: &FindingsAggregate, metadata: &ReportMetadata) -> ReportDocument {
        let score = aggregate.score();
        let summary = ReportSummary {
            score: score.value(),
            band: score.band(),
            total_findings: aggregate.catalog.total(),
            severity_distribution: Figure {
                kind: FigureKind::Bar,
                title: "Findings by severity".to_string(),
                series: aggregate
                    .catalog
                    .distribution()
                    .into_iter()
                    .map(|(severity, count)| DataPoint {
                        label: severity.to_string(),
                        value: count as u64,
                    })
                    .collect(),
            },
        };

        let sections = [
            network_section(aggregate),
            code_section(aggregate),
            findings_section(aggregate, FindingDomain::Mobile, "mobile", "Mobile Application Security"),
            findings_section(aggregate, FindingDomain::Contract, "contract", "Smart Contract Analysis"),
            failures_section(aggregate),
            Some(recommendations_section(aggregate)),
        ]
        .into_iter()
        .flatten()
        .filter(|section| !section.is_empty())
        .collect();

        ReportDocument {
            title: metadata.title.clone(),
            generated_at: metadata.generated_at,
            summary,
            sections,
        }
    }
}

fn counted(count: usize, singular: &str, plural: &str) -> String {
    format!("{} {}", count, if count == 1 { singular } else { plural })
}

fn network_section(aggregate: &FindingsAggregate) -> Option<Section> {
    if aggregate.network_reports.is_empty() {
        return None;
    }
    let mut section = Section::new("network", "Network Security");

    let targets: Vec<&str> = aggregate.network_reports.iter().map(|r| r.target.as_str()).collect();
    section.blocks.push(Block::Paragraph {
        text: format!(
            "Scanned {}: {}, {}, {}, {}.",
            targets.join(", "),
            counted(aggregate.statistics.open_port_count, "open port", "open ports"),
            counted(aggregate.statistics.ssl_issue_count, "SSL/TLS issue", "SSL/TLS issues"),
            counted(aggregate.statistics.http_issue_count, "HTTP issue", "HTTP issues"),
            counted(
                aggregate.statistics.vulnerability_count,
                "known vulnerability",
                "known vulnerabilities"
            ),
        ),
    });

    let mut ports = Table::new(["Target", "Port", "Protocol", "Service", "Product", "Version"]);
    for report in &aggregate.network_reports {
        for port in &report.open_ports {
            ports.push_row([
                report.target.clone(),
                port.port.to_string(),
                port.protocol.clone(),
                port.service.clone(),
                port.product.clone(),
                port.version.clone(),
            ]);
        }
    }
    push_table_subsection(&mut section, "open-ports", "Open Ports", ports);

    let mut ssl = Table::new(["Target", "Port", "Issue", "Severity", "Remediation"]);
    let mut http = Table::new(["Target", "Port", "Issue", "Severity", "Remediation"]);
    for report in &aggregate.network_reports {
        for (table, sets) in [(&mut ssl, &report.ssl_findings), (&mut http, &report.http_findings)] {
            for set in sets {
                for issue in &set.issues {
                    table.push_row([
                        report.target.clone(),
                        set.port.to_string(),
                        issue.description.clone(),
                        issue.severity.unwrap_or(Severity::Medium).to_string(),
                        issue.remediation.clone().unwrap_or_default(),
                    ]);
                }
            }
        }
    }
    push_table_subsection(&mut section, "ssl-tls", "SSL/TLS Security", ssl);
    push_table_subsection(&mut section, "http", "HTTP Security", http);

    let mut cves = Table::new(["CVE", "Port", "Product", "Version", "Description"]);
    let mut lookup_failures = Vec::new();
    for report in &aggregate.network_reports {
        for record in &report.vulnerabilities {
            cves.push_row([
                record.id.clone(),
                record.source_port.to_string(),
                record.source_product.clone(),
                record.source_version.clone(),
                record.description.clone(),
            ]);
        }
        for failure in &report.enrichment_failures {
            lookup_failures.push(format!("{}: {}", failure.product, failure.error));
        }
    }
    push_table_subsection(&mut section, "vulnerabilities", "Known Vulnerabilities", cves);
    if !lookup_failures.is_empty() {
        section.subsections.push(
            Section::new("enrichment-failures", "Vulnerability Lookups Not Completed")
                .with_block(Block::List { items: lookup_failures }),
        );
    }

    let errors: Vec<String> = aggregate
        .network_reports
        .iter()
        .flat_map(|r| r.errors.iter().cloned())
        .collect();
    if !errors.is_empty() {
        section
            .subsections
            .push(Section::new("scan-errors", "Scanner Errors").with_block(Block::List { items: errors }));
    }

    Some(section)
}

fn code_section(aggregate: &FindingsAggregate) -> Option<Section> {
    if aggregate.reviews.is_empty() {
        return None;
    }
    let passed = aggregate.reviews.iter().filter(|r| r.passed).count() as u64;
    let failed = aggregate.reviews.len() as u64 - passed;

    let mut section = Section::new("code-review", "Source Code Review")
        .with_block(Block::Figure(Figure {
            kind: FigureKind::Pie,
            title: "Review outcomes".to_string(),
            series: vec![
                DataPoint {
                    label: "passed".to_string(),
                    value: passed,
                },
                DataPoint {
                    label: "failed".to_string(),
                    value: failed,
                },
            ],
        }));

    let mut table = Table::new(["File", "Review", "Status"]);
    for review in &aggregate.reviews {
        table.push_row([
            review.file.to_string(),
            review.review_type.map(|t| t.to_string()).unwrap_or_default(),
            if review.passed { "reviewed" } else { "failed" }.to_string(),
        ]);
    }
    section.blocks.push(Block::Table(table));

    for review in aggregate.reviews.iter().filter(|r| r.passed && !r.text.trim().is_empty()) {
        section.subsections.push(
            Section::new(format!("review:{}", review.file), review.file.to_string())
                .with_block(Block::Paragraph { text: review.text.clone() }),
        );
    }
    Some(section)
}

fn findings_section(aggregate: &FindingsAggregate, domain: FindingDomain, id: &str, title: &str) -> Option<Section> {
    let findings: Vec<&Finding> = aggregate.catalog.by_domain(domain).collect();
    if findings.is_empty() {
        return None;
    }

    let mut section = Section::new(id, title);
    section.blocks.push(Block::Figure(Figure {
        kind: FigureKind::Bar,
        title: format!("{} findings by severity", title),
        series: Severity::ALL
            .iter()
            .map(|severity| DataPoint {
                label: severity.to_string(),
                value: findings.iter().filter(|f| f.severity == *severity).count() as u64,
            })
            .collect(),
    }));

    for severity in Severity::ALL {
        let mut table = Table::new(["ID", "Title", "Confidence", "Location", "Detail"]);
        for finding in findings.iter().filter(|f| f.severity == severity) {
            table.push_row([
                finding.id.clone(),
                finding.title.clone(),
                finding.confidence.as_str().to_string(),
                finding.origin.location.clone().unwrap_or_default(),
                finding.detail.clone().unwrap_or_default(),
            ]);
        }
        push_table_subsection(
            &mut section,
            &format!("{}-{}", id, severity),
            &format!("{} severity", capitalize(severity.as_str())),
            table,
        );
    }
    Some(section)
}

fn failures_section(aggregate: &FindingsAggregate) -> Option<Section> {
    if aggregate.failures.is_empty() {
        return None;
    }
    let mut table = Table::new(["Unit", "Kind", "Error"]);
    for failure in &aggregate.failures {
        table.push_row([failure.key.to_string(), failure.kind.to_string(), failure.error.clone()]);
    }
    Some(Section::new("failures", "Incomplete Analyses").with_block(Block::Table(table)))
}

fn recommendations_section(aggregate: &FindingsAggregate) -> Section {
    let mut items = Vec::new();
    let stats = &aggregate.statistics;

    if stats.ssl_issue_count > 0 {
        items.push("Harden TLS configuration: disable weak protocols and ciphers and renew invalid certificates.".to_string());
    }
    if stats.http_issue_count > 0 {
        items.push("Add the missing HTTP security headers and remove server version disclosure.".to_string());
    }
    if stats.open_port_count > crate::domain::findings::OPEN_PORT_BASELINE {
        items.push("Reduce the exposed attack surface by closing unneeded ports.".to_string());
    }
    if stats.vulnerability_count > 0 {
        items.push("Upgrade services with known CVEs to patched versions.".to_string());
    }
    if stats.failed_review_count > 0 {
        items.push("Re-run the source review for files whose analysis did not complete.".to_string());
    }
    if aggregate.has_findings(FindingDomain::Mobile) {
        items.push("Address the mobile findings, starting with manifest and exported component issues.".to_string());
    }
    if aggregate.has_findings(FindingDomain::Contract) {
        items.push("Apply the suggested contract patches and re-run static analysis before deployment.".to_string());
    }

    let mut seen = HashSet::new();
    for finding in aggregate.catalog.iter() {
        if let Some(remediation) = &finding.remediation {
            if seen.insert(remediation.as_str()) {
                items.push(remediation.clone());
            }
        }
    }

    let section = Section::new("recommendations", "Recommendations");
    if items.is_empty() {
        section.with_block(Block::Paragraph {
            text: "No issues requiring action were found.".to_string(),
        })
    } else {
        section.with_block(Block::List { items })
    }
}

fn push_table_subsection(section: &mut Section, id: &str, title: &str, table: Table) {
    if !table.rows.is_empty() {
        section
            .subsections
            .push(Section::new(id, title).with_block(Block::Table(table)));
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
