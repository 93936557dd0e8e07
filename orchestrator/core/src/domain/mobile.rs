// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Mobile Package Analysis Domain
//!
//! The analyzer decompiles an Android package and asks an LLM to inspect the
//! manifest, backup/extraction rules, Java sources and resource XML. Its
//! output is therefore loosely structured: issue objects may be missing
//! fields or not be objects at all. Every list here is read with
//! [`lenient_list`], which keeps well-formed entries and drops the rest.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MobileInputError {
    #[error("Invalid file type: '{0}'. Please upload an APK file")]
    NotAnApk(String),
    #[error("Package '{0}' is empty")]
    EmptyPackage(String),
}

/// An Android package queued for analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MobilePackage {
    file_name: String,
    bytes: Vec<u8>,
}

impl MobilePackage {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, MobileInputError> {
        let file_name = file_name.into();
        if !file_name.to_ascii_lowercase().ends_with(".apk") {
            return Err(MobileInputError::NotAnApk(file_name));
        }
        if bytes.is_empty() {
            return Err(MobileInputError::EmptyPackage(file_name));
        }
        Ok(Self { file_name, bytes })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Deserialize a list, accepting a single object in place of a list and
/// silently dropping entries that do not fit `T`.
pub fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(_) => vec![value],
        _ => Vec::new(),
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

/// One issue reported by any of the mobile inspectors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobileIssue {
    #[serde(default, alias = "issue", alias = "type", alias = "vulnerability_type")]
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default, alias = "file")]
    pub path: Option<String>,
    #[serde(default)]
    pub code_snippet: Option<String>,
}

impl MobileIssue {
    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title,
            _ => "Unnamed issue",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueAnalysis {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub issues: Vec<MobileIssue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JavaAnalysis {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub vulnerabilities: Vec<MobileIssue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct AnalysisSection<T> {
    #[serde(default, deserialize_with = "lenient_list")]
    pub analyses: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardcodedString {
    pub attribute: String,
    pub value: String,
    #[serde(default)]
    pub line: u32,
}

/// Either per-file hits or a status line such as "No hardcoded strings found".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HardcodedStrings {
    Status { status: String },
    Entries(BTreeMap<String, Vec<HardcodedString>>),
}

impl Default for HardcodedStrings {
    fn default() -> Self {
        HardcodedStrings::Entries(BTreeMap::new())
    }
}

impl HardcodedStrings {
    /// `(file, hit)` pairs in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HardcodedString)> {
        let entries = match self {
            HardcodedStrings::Entries(map) => Some(map),
            HardcodedStrings::Status { .. } => None,
        };
        entries
            .into_iter()
            .flat_map(|map| map.iter())
            .flat_map(|(file, hits)| hits.iter().map(move |hit| (file.as_str(), hit)))
    }
}

fn lenient_hardcoded<'de, D>(deserializer: D) -> Result<HardcodedStrings, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardcodedStringsSection {
    #[serde(default)]
    pub xml_files_scanned: u32,
    #[serde(default, deserialize_with = "lenient_hardcoded")]
    pub hardcoded_strings: HardcodedStrings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailedResults {
    #[serde(default)]
    pub manifest_analysis: AnalysisSection<IssueAnalysis>,
    #[serde(default)]
    pub backup_extraction_analysis: AnalysisSection<IssueAnalysis>,
    #[serde(default)]
    pub java_analysis: AnalysisSection<JavaAnalysis>,
    #[serde(default)]
    pub hardcoded_strings_analysis: HardcodedStringsSection,
    /// Carried for export only; not normalized into findings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strings_analysis: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuesFound {
    #[serde(default)]
    pub manifest_issues: u32,
    #[serde(default)]
    pub backup_extraction_issues: u32,
    #[serde(default)]
    pub java_vulnerabilities: u32,
    #[serde(default)]
    pub hardcoded_strings: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    #[serde(default)]
    pub input_type: Option<String>,
    #[serde(default)]
    pub scan_timestamp: Option<String>,
    #[serde(default)]
    pub files_analyzed: BTreeMap<String, u32>,
    #[serde(default)]
    pub issues_found: IssuesFound,
}

/// Full analyzer result, stored on a completed `MobilePackage` unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MobileAnalysis {
    #[serde(default)]
    pub package_name: String,
    #[serde(default)]
    pub scan_summary: ScanSummary,
    #[serde(default)]
    pub detailed_results: DetailedResults,
}

/// Which inspector produced a mobile issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MobileCategory {
    Manifest,
    BackupExtraction,
    Java,
    HardcodedString,
}

impl MobileCategory {
    pub fn label(&self) -> &'static str {
        match self {
            MobileCategory::Manifest => "Manifest",
            MobileCategory::BackupExtraction => "Backup & Data Extraction",
            MobileCategory::Java => "Java Code",
            MobileCategory::HardcodedString => "Hardcoded Strings",
        }
    }
}

impl MobileAnalysis {
    /// Every issue with its category and location, in a stable order:
    /// manifest, backup/extraction, Java, then hardcoded strings.
    pub fn issues(&self) -> Vec<(MobileCategory, Option<String>, MobileIssue)> {
        let details = &self.detailed_results;
        let mut out = Vec::new();

        for analysis in &details.manifest_analysis.analyses {
            for issue in &analysis.issues {
                let location = issue.path.clone().or_else(|| analysis.file.clone());
                out.push((MobileCategory::Manifest, location, issue.clone()));
            }
        }
        for analysis in &details.backup_extraction_analysis.analyses {
            for issue in &analysis.issues {
                let location = issue.path.clone().or_else(|| analysis.file.clone());
                out.push((MobileCategory::BackupExtraction, location, issue.clone()));
            }
        }
        for analysis in &details.java_analysis.analyses {
            for issue in &analysis.vulnerabilities {
                let location = issue.path.clone().or_else(|| analysis.file.clone());
                out.push((MobileCategory::Java, location, issue.clone()));
            }
        }
        for (file, hit) in details.hardcoded_strings_analysis.hardcoded_strings.iter() {
            let issue = MobileIssue {
                title: Some(format!("Hardcoded value in '{}'", hit.attribute)),
                description: format!("{}=\"{}\"", hit.attribute, hit.value),
                severity: None,
                path: Some(file.to_string()),
                code_snippet: None,
            };
            out.push((
                MobileCategory::HardcodedString,
                Some(format!("{}:{}", file, hit.line)),
                issue,
            ));
        }
        out
    }
}
