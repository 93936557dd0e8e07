// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Vulnerability index contract and the enrichment records attached to
//! network scan results.

use serde::{Deserialize, Serialize};

/// Query sent to the vulnerability index: one product, optional version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CveLookupRequest {
    pub module_name: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CveLookupResponse {
    #[serde(default)]
    pub cves: Vec<CveEntry>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One advisory as returned by the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CveEntry {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

/// A CVE bound to the fingerprint (port) it was found for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    pub id: String,
    pub description: String,
    pub source_port: u16,
    pub source_product: String,
    pub source_version: String,
}

/// Outcome of the lookup for one distinct product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductEnrichment {
    pub entries: Vec<CveEntry>,
    pub error: Option<String>,
}

impl ProductEnrichment {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentFailure {
    pub product: String,
    pub error: String,
}
