// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Scanning Backend Adapter
//!
//! Anti-corruption layer for the HTTP backend that hosts the port scanner,
//! the CVE index, the source reviewer, the APK analyzer and the Solidity
//! analyzer. One [`BackendClient`] implements every collaborator trait.
//!
//! # Error mapping
//!
//! | Condition | Error |
//! |-----------|-------|
//! | connect failure, timeout | [`CollaboratorError::Unavailable`] |
//! | non-2xx status | [`CollaboratorError::Rejected`] with the status |
//! | 2xx body with an `error` field | [`CollaboratorError::Rejected`] without status |
//! | body not matching the expected shape | [`CollaboratorError::InvalidPayload`] |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::domain::code_review::{CodeReviewRequest, CodeReviewResponse};
use crate::domain::collaborator::{
    CodeReviewer, CollaboratorError, ContractAnalyzer, MobileAnalyzer, NetworkScanner,
    VulnerabilityIndex,
};
use crate::domain::config::BackendConfig;
use crate::domain::contract::{ContractAnalysis, ContractSource};
use crate::domain::mobile::{MobileAnalysis, MobilePackage};
use crate::domain::network::{NetworkScanRequest, NetworkScanResponse};
use crate::domain::vulnerability::{CveEntry, CveLookupRequest, CveLookupResponse};

pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct InlineContract<'a> {
    contract_code: &'a str,
    contract_name: &'a str,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollaboratorError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, CollaboratorError> {
        Self::new(config.url.clone(), config.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, CollaboratorError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(url = %url, "POST");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        decode(response).await
    }

    async fn post_multipart<T: DeserializeOwned>(&self, path: &str, form: Form) -> Result<T, CollaboratorError> {
        let url = self.url(path);
        debug!(url = %url, "POST multipart");

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        decode(response).await
    }
}

fn transport_error(err: reqwest::Error) -> CollaboratorError {
    if err.is_timeout() {
        CollaboratorError::Unavailable(format!("Request timed out: {}", err))
    } else {
        CollaboratorError::Unavailable(err.to_string())
    }
}

/// Pull a human readable message out of an error body. The backend reports
/// failures as `{"error": ...}`; the scanner nests its own under `port_scan`.
fn error_message(body: &Value) -> Option<String> {
    body.get("error")
        .or_else(|| body.get("port_scan").and_then(|p| p.get("error")))
        .and_then(Value::as_str)
        .map(str::to_string)
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, CollaboratorError> {
    let status = response.status();
    let text = response.text().await.map_err(transport_error)?;

    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|body| error_message(&body))
            .unwrap_or_else(|| {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    status.canonical_reason().unwrap_or("Unknown error").to_string()
                } else {
                    trimmed.to_string()
                }
            });
        return Err(CollaboratorError::rejected(Some(status.as_u16()), message));
    }

    let body: Value = serde_json::from_str(&text)
        .map_err(|e| CollaboratorError::InvalidPayload(format!("Failed to parse response: {}", e)))?;

    if let Some(message) = body.get("error").and_then(Value::as_str) {
        return Err(CollaboratorError::rejected(None, message));
    }

    serde_json::from_value(body)
        .map_err(|e| CollaboratorError::InvalidPayload(format!("Unexpected response shape: {}", e)))
}

#[async_trait]
impl NetworkScanner for BackendClient {
    async fn full_scan(&self, request: &NetworkScanRequest) -> Result<NetworkScanResponse, CollaboratorError> {
        self.post_json("/api/network-scan/full_scan", request).await
    }
}

#[async_trait]
impl VulnerabilityIndex for BackendClient {
    async fn lookup(&self, product: &str, version: &str) -> Result<Vec<CveEntry>, CollaboratorError> {
        let request = CveLookupRequest {
            module_name: product.to_string(),
            version: version.to_string(),
        };
        let response: CveLookupResponse = self.post_json("/api/cve/lookup", &request).await?;
        Ok(response.cves)
    }
}

#[async_trait]
impl CodeReviewer for BackendClient {
    async fn review(&self, request: &CodeReviewRequest) -> Result<CodeReviewResponse, CollaboratorError> {
        let path = format!("/api/review/{}", request.review_type.route_segment());
        self.post_json(&path, request).await
    }
}

#[async_trait]
impl MobileAnalyzer for BackendClient {
    async fn analyze(&self, package: &MobilePackage) -> Result<MobileAnalysis, CollaboratorError> {
        let part = Part::bytes(package.bytes().to_vec())
            .file_name(package.file_name().to_string())
            .mime_str("application/vnd.android.package-archive")
            .map_err(|e| CollaboratorError::InvalidPayload(e.to_string()))?;
        let form = Form::new().part("apk_file", part);

        self.post_multipart("/api/apk-analyzer/upload", form).await
    }
}

#[async_trait]
impl ContractAnalyzer for BackendClient {
    async fn analyze(&self, source: &ContractSource) -> Result<ContractAnalysis, CollaboratorError> {
        match source {
            ContractSource::File { file_name, bytes } => {
                let part = Part::bytes(bytes.clone()).file_name(file_name.clone());
                let form = Form::new().part("file", part);
                self.post_multipart("/api/solidity/analyze", form).await
            }
            ContractSource::Code {
                contract_code,
                contract_name,
            } => {
                let body = InlineContract {
                    contract_code,
                    contract_name,
                };
                self.post_json("/api/solidity/analyze", &body).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::code_review::ReviewType;
    use crate::domain::network::{PortRange, Target};
    use mockito::Matcher;
    use serde_json::json;

    fn client(server: &mockito::ServerGuard) -> BackendClient {
        BackendClient::new(server.url(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_full_scan_posts_request_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/network-scan/full_scan")
            .match_body(Matcher::Json(json!({
                "target": "scanme.example.org",
                "ports": "1-1024",
                "chunk_size": 500
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "port_scan": {"tcp": {"22": {"name": "ssh", "product": "OpenSSH", "version": "8.9", "state": "open"}}},
                    "ssl_security_findings": {},
                    "http_security_findings": {}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let request = NetworkScanRequest::new(
            Target::parse("scanme.example.org").unwrap(),
            PortRange::parse("1-1024").unwrap(),
            500,
        )
        .unwrap();
        let response = client(&server).full_scan(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.port_scan.tcp["22"].product, "OpenSSH");
    }

    #[tokio::test]
    async fn test_non_success_status_is_rejected_with_error_field() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/network-scan/full_scan")
            .with_status(500)
            .with_body(json!({"port_scan": {"error": "nmap not installed"}}).to_string())
            .create_async()
            .await;

        let request = NetworkScanRequest::new(Target::parse("localhost").unwrap(), PortRange::FULL, 2000).unwrap();
        let err = client(&server).full_scan(&request).await.unwrap_err();

        assert_eq!(err, CollaboratorError::rejected(Some(500), "nmap not installed"));
    }

    #[tokio::test]
    async fn test_plain_text_error_body_is_kept() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/review/security")
            .with_status(502)
            .with_body("Bad Gateway from upstream")
            .create_async()
            .await;

        let request = CodeReviewRequest {
            filename: "app.py".to_string(),
            source_code: "print(1)".to_string(),
            review_type: ReviewType::Security,
        };
        let err = client(&server).review(&request).await.unwrap_err();

        assert_eq!(err, CollaboratorError::rejected(Some(502), "Bad Gateway from upstream"));
    }

    #[tokio::test]
    async fn test_review_uses_type_route() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/review/security-performance")
            .match_body(Matcher::Json(json!({"filename": "db.go", "source_code": "package db"})))
            .with_status(200)
            .with_body(json!({"result": "Looks fine"}).to_string())
            .create_async()
            .await;

        let request = CodeReviewRequest {
            filename: "db.go".to_string(),
            source_code: "package db".to_string(),
            review_type: ReviewType::SecurityPerformance,
        };
        let response = client(&server).review(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.result, "Looks fine");
    }

    #[tokio::test]
    async fn test_cve_lookup_error_in_success_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/cve/lookup")
            .match_body(Matcher::Json(json!({"module_name": "nginx", "version": "1.18.0"})))
            .with_status(200)
            .with_body(json!({"error": "NVD unreachable", "module_name": "nginx", "cves": []}).to_string())
            .create_async()
            .await;

        let err = client(&server).lookup("nginx", "1.18.0").await.unwrap_err();
        assert_eq!(err, CollaboratorError::rejected(None, "NVD unreachable"));
    }

    #[tokio::test]
    async fn test_cve_lookup_returns_entries() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/cve/lookup")
            .with_status(200)
            .with_body(
                json!({
                    "module_name": "openssh",
                    "version": "",
                    "cves": [{"id": "CVE-2023-38408", "description": "PKCS#11 feature", "last_modified": "2024-01-01"}],
                    "total_cves": 1
                })
                .to_string(),
            )
            .create_async()
            .await;

        let entries = client(&server).lookup("openssh", "").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "CVE-2023-38408");
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_payload() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/cve/lookup")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let err = client(&server).lookup("nginx", "").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::InvalidPayload(_)));
    }

    #[tokio::test]
    async fn test_mobile_upload_uses_apk_file_field() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/apk-analyzer/upload")
            .match_body(Matcher::Regex(r#"name="apk_file"; filename="app.apk""#.to_string()))
            .with_status(200)
            .with_body(json!({"scan_summary": {"input_type": "apk"}, "detailed_results": {}}).to_string())
            .create_async()
            .await;

        let package = MobilePackage::new("app.apk", b"PK\x03\x04".to_vec()).unwrap();
        let analysis = MobileAnalyzer::analyze(&client(&server), &package).await.unwrap();

        mock.assert_async().await;
        assert_eq!(analysis.scan_summary.input_type.as_deref(), Some("apk"));
    }

    #[tokio::test]
    async fn test_inline_contract_is_sent_as_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/solidity/analyze")
            .match_body(Matcher::Json(json!({
                "contract_code": "contract Token {}",
                "contract_name": "Token.sol"
            })))
            .with_status(200)
            .with_body(json!({"vulnerabilities": [], "contract_file": "Token.sol", "file_size": 17}).to_string())
            .create_async()
            .await;

        let source = ContractSource::code("contract Token {}", Some("Token")).unwrap();
        let analysis = ContractAnalyzer::analyze(&client(&server), &source).await.unwrap();

        mock.assert_async().await;
        assert_eq!(analysis.contract_file, "Token.sol");
        assert_eq!(analysis.file_size, 17);
    }

    #[tokio::test]
    async fn test_contract_file_uses_file_field() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/solidity/analyze")
            .match_body(Matcher::Regex(r#"name="file"; filename="Vault.sol""#.to_string()))
            .with_status(400)
            .with_body(json!({"error": "Invalid file type. Only .sol allowed"}).to_string())
            .create_async()
            .await;

        let source = ContractSource::file("Vault.sol", b"contract Vault {}".to_vec()).unwrap();
        let err = ContractAnalyzer::analyze(&client(&server), &source).await.unwrap_err();

        mock.assert_async().await;
        assert_eq!(err.to_string(), "Collaborator rejected the request (HTTP 400): Invalid file type. Only .sol allowed");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unavailable() {
        // Port 9 (discard) on loopback is not expected to accept connections.
        let backend = BackendClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = backend.lookup("nginx", "").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Unavailable(_)));
    }
}
