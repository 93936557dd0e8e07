// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Collaborator
//!
//! Domain interfaces for the external analysis engines.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-corruption boundary between the orchestrator and the
//!   scanning backends. Implementations live in `infrastructure::backend`
//!   and `infrastructure::nvd`.

use async_trait::async_trait;

use crate::domain::code_review::{CodeReviewRequest, CodeReviewResponse};
use crate::domain::contract::{ContractAnalysis, ContractSource};
use crate::domain::mobile::{MobileAnalysis, MobilePackage};
use crate::domain::network::{NetworkScanRequest, NetworkScanResponse};
use crate::domain::vulnerability::CveEntry;

/// Port and service scanner, including the TLS and HTTP inspectors.
#[async_trait]
pub trait NetworkScanner: Send + Sync {
    async fn full_scan(&self, request: &NetworkScanRequest) -> Result<NetworkScanResponse, CollaboratorError>;
}

/// External vulnerability index keyed by product and version.
#[async_trait]
pub trait VulnerabilityIndex: Send + Sync {
    /// Look up advisories for one product. An empty version searches by
    /// product only.
    async fn lookup(&self, product: &str, version: &str) -> Result<Vec<CveEntry>, CollaboratorError>;
}

/// AI-backed source reviewer.
#[async_trait]
pub trait CodeReviewer: Send + Sync {
    async fn review(&self, request: &CodeReviewRequest) -> Result<CodeReviewResponse, CollaboratorError>;
}

#[async_trait]
pub trait MobileAnalyzer: Send + Sync {
    async fn analyze(&self, package: &MobilePackage) -> Result<MobileAnalysis, CollaboratorError>;
}

#[async_trait]
pub trait ContractAnalyzer: Send + Sync {
    async fn analyze(&self, source: &ContractSource) -> Result<ContractAnalysis, CollaboratorError>;
}

/// Errors returned by any collaborator call. All of them are unit-level:
/// drivers record them on the unit rather than propagating.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    /// Transport failure: connection refused, timeout, DNS.
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    /// Non-2xx status or an `error` field in the body.
    #[error("Collaborator rejected the request{}: {message}", status_suffix(.status))]
    Rejected { status: Option<u16>, message: String },

    /// Body could not be decoded into the expected shape.
    #[error("Invalid collaborator payload: {0}")]
    InvalidPayload(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {})", code),
        None => String::new(),
    }
}

impl CollaboratorError {
    pub fn rejected(status: Option<u16>, message: impl Into<String>) -> Self {
        CollaboratorError::Rejected {
            status,
            message: message.into(),
        }
    }

    /// Whether this is a rejected-class error (including undecodable bodies).
    pub fn is_rejected(&self) -> bool {
        matches!(
            self,
            CollaboratorError::Rejected { .. } | CollaboratorError::InvalidPayload(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CollaboratorError::rejected(Some(500), "Internal Server Error");
        assert_eq!(
            err.to_string(),
            "Collaborator rejected the request (HTTP 500): Internal Server Error"
        );
        assert!(err.is_rejected());

        let err = CollaboratorError::rejected(None, "Invalid port range");
        assert_eq!(err.to_string(), "Collaborator rejected the request: Invalid port range");

        assert!(CollaboratorError::InvalidPayload("eof".into()).is_rejected());
        assert!(!CollaboratorError::Unavailable("refused".into()).is_rejected());
    }
}
