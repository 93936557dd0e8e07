// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
// NVD Vulnerability Index Adapter
//
// Queries the NVD CVE 2.0 API directly by keyword. Used instead of the
// backend's lookup route when `enrichment.source: nvd` is configured.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::collaborator::{CollaboratorError, VulnerabilityIndex};
use crate::domain::config::EnrichmentConfig;
use crate::domain::vulnerability::CveEntry;

pub struct NvdClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    throttle_retry: Duration,
}

#[derive(Deserialize)]
struct NvdResponse {
    #[serde(default)]
    vulnerabilities: Vec<NvdVulnerability>,
}

#[derive(Deserialize)]
struct NvdVulnerability {
    cve: NvdCve,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NvdCve {
    id: String,
    #[serde(default)]
    descriptions: Vec<NvdDescription>,
    #[serde(default)]
    last_modified: Option<String>,
}

#[derive(Deserialize)]
struct NvdDescription {
    #[serde(default)]
    lang: String,
    #[serde(default)]
    value: String,
}

impl From<NvdCve> for CveEntry {
    fn from(cve: NvdCve) -> Self {
        // English text when present, otherwise whatever comes first.
        let description = cve
            .descriptions
            .iter()
            .find(|d| d.lang == "en")
            .or_else(|| cve.descriptions.first())
            .map(|d| d.value.clone())
            .unwrap_or_else(|| "No description".to_string());

        CveEntry {
            id: cve.id,
            description,
            last_modified: cve.last_modified,
        }
    }
}

impl NvdClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
        throttle_retry: Duration,
    ) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollaboratorError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            throttle_retry,
        })
    }

    pub fn from_config(config: &EnrichmentConfig, timeout: Duration) -> Result<Self, CollaboratorError> {
        Self::new(
            config.nvd_url.clone(),
            config.resolved_nvd_api_key(),
            timeout,
            Duration::from_millis(config.throttle_retry_ms),
        )
    }

    async fn search(&self, keyword: &str) -> Result<reqwest::Response, CollaboratorError> {
        let mut request = self.client.get(&self.endpoint).query(&[("keywordSearch", keyword)]);
        if let Some(key) = &self.api_key {
            request = request.header("apiKey", key);
        }
        request
            .send()
            .await
            .map_err(|e| CollaboratorError::Unavailable(e.to_string()))
    }
}

/// Keyword sent to NVD: the product, followed by the version when known.
fn keyword(product: &str, version: &str) -> String {
    let product = product.trim();
    let version = version.trim();
    if version.is_empty() {
        product.to_string()
    } else {
        format!("{} {}", product, version)
    }
}

#[async_trait]
impl VulnerabilityIndex for NvdClient {
    async fn lookup(&self, product: &str, version: &str) -> Result<Vec<CveEntry>, CollaboratorError> {
        let keyword = keyword(product, version);
        debug!(keyword = %keyword, "Querying NVD");

        let mut response = self.search(&keyword).await?;
        if response.status() == StatusCode::FORBIDDEN {
            warn!(
                keyword = %keyword,
                wait_ms = self.throttle_retry.as_millis() as u64,
                "NVD throttled the request, retrying once"
            );
            tokio::time::sleep(self.throttle_retry).await;
            response = self.search(&keyword).await?;
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            let message = if error_text.trim().is_empty() {
                status.canonical_reason().unwrap_or("Unknown error").to_string()
            } else {
                error_text.trim().to_string()
            };
            return Err(CollaboratorError::rejected(Some(status.as_u16()), message));
        }

        let body: NvdResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::InvalidPayload(format!("Failed to parse NVD response: {}", e)))?;

        Ok(body.vulnerabilities.into_iter().map(|v| v.cve.into()).collect())
    }
}
