// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Smart contract submission forms and the static analyzer's result shape.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::mobile::lenient_list;

/// Largest contract source the analyzer accepts.
pub const MAX_CONTRACT_BYTES: usize = 16 * 1024 * 1024;

pub const DEFAULT_CONTRACT_NAME: &str = "contract.sol";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractInputError {
    #[error("Contract code cannot be empty")]
    EmptyCode,
    #[error("Invalid file type: '{0}'. Only .sol allowed")]
    NotSolidity(String),
    #[error("File too large: {0} bytes (max 16MB)")]
    TooLarge(usize),
}

/// The two ways a contract can be submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractSource {
    /// An uploaded `.sol` file, sent as multipart field `file`.
    File { file_name: String, bytes: Vec<u8> },
    /// Inline source, sent as JSON `{contract_code, contract_name}`.
    Code {
        contract_code: String,
        contract_name: String,
    },
}

impl ContractSource {
    pub fn file(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ContractInputError> {
        let file_name = file_name.into();
        if !file_name.to_ascii_lowercase().ends_with(".sol") {
            return Err(ContractInputError::NotSolidity(file_name));
        }
        if bytes.len() > MAX_CONTRACT_BYTES {
            return Err(ContractInputError::TooLarge(bytes.len()));
        }
        Ok(ContractSource::File { file_name, bytes })
    }

    /// Inline source. A missing name becomes `contract.sol`; names without
    /// the `.sol` suffix get it appended.
    pub fn code(contract_code: impl Into<String>, contract_name: Option<&str>) -> Result<Self, ContractInputError> {
        let contract_code = contract_code.into();
        if contract_code.trim().is_empty() {
            return Err(ContractInputError::EmptyCode);
        }
        if contract_code.len() > MAX_CONTRACT_BYTES {
            return Err(ContractInputError::TooLarge(contract_code.len()));
        }
        let mut contract_name = contract_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_CONTRACT_NAME)
            .to_string();
        if !contract_name.ends_with(".sol") {
            contract_name.push_str(".sol");
        }
        Ok(ContractSource::Code {
            contract_code,
            contract_name,
        })
    }

    pub fn name(&self) -> &str {
        match self {
            ContractSource::File { file_name, .. } => file_name,
            ContractSource::Code { contract_name, .. } => contract_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractVulnerability {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub impact: String,
    #[serde(default)]
    pub confidence: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
}

/// Analyzer result, stored on a completed `Contract` unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAnalysis {
    #[serde(default, deserialize_with = "lenient_list")]
    pub vulnerabilities: Vec<ContractVulnerability>,
    #[serde(default)]
    pub contract_file: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_code_gets_sol_suffix() {
        let source = ContractSource::code("contract A {}", Some("Token")).unwrap();
        assert_eq!(source.name(), "Token.sol");

        let source = ContractSource::code("contract A {}", None).unwrap();
        assert_eq!(source.name(), DEFAULT_CONTRACT_NAME);

        let source = ContractSource::code("contract A {}", Some("Vault.sol")).unwrap();
        assert_eq!(source.name(), "Vault.sol");
    }

    #[test]
    fn test_empty_code_rejected() {
        assert_eq!(
            ContractSource::code("   \n", Some("x")).unwrap_err(),
            ContractInputError::EmptyCode
        );
    }

    #[test]
    fn test_file_must_be_solidity() {
        assert!(ContractSource::file("Token.sol", b"contract T {}".to_vec()).is_ok());
        assert!(matches!(
            ContractSource::file("Token.vy", Vec::new()),
            Err(ContractInputError::NotSolidity(_))
        ));
    }

    #[test]
    fn test_analysis_parses_type_field() {
        let raw = serde_json::json!({
            "vulnerabilities": [
                {"id": "reentrancy-eth", "description": "Reentrancy in withdraw()", "impact": "High",
                 "confidence": "Medium", "type": "reentrancy", "patch": "Use checks-effects-interactions"},
                42
            ],
            "contract_file": "Vault.sol",
            "file_size": 1204,
            "status": "completed"
        });
        let analysis: ContractAnalysis = serde_json::from_value(raw).unwrap();
        assert_eq!(analysis.vulnerabilities.len(), 1);
        assert_eq!(analysis.vulnerabilities[0].kind, "reentrancy");
        assert_eq!(analysis.file_size, 1204);
    }
}
