// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Source code review contract: request/response shapes exchanged with the
//! AI-backed reviewer and the per-file review result stored on a unit.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Review flavours offered by the reviewer backend. Each maps to one route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewType {
    General,
    #[default]
    Security,
    Performance,
    Style,
    Bugs,
    Docs,
    Config,
    SecurityPerformance,
    Upgrade,
    Tests,
    Refactor,
    Concurrency,
}

impl ReviewType {
    pub const ALL: [ReviewType; 12] = [
        ReviewType::General,
        ReviewType::Security,
        ReviewType::Performance,
        ReviewType::Style,
        ReviewType::Bugs,
        ReviewType::Docs,
        ReviewType::Config,
        ReviewType::SecurityPerformance,
        ReviewType::Upgrade,
        ReviewType::Tests,
        ReviewType::Refactor,
        ReviewType::Concurrency,
    ];

    /// Path segment of the reviewer route (`/api/review/{segment}`).
    pub fn route_segment(&self) -> &'static str {
        match self {
            ReviewType::General => "general",
            ReviewType::Security => "security",
            ReviewType::Performance => "performance",
            ReviewType::Style => "style",
            ReviewType::Bugs => "bugs",
            ReviewType::Docs => "docs",
            ReviewType::Config => "config",
            ReviewType::SecurityPerformance => "security-performance",
            ReviewType::Upgrade => "upgrade",
            ReviewType::Tests => "tests",
            ReviewType::Refactor => "refactor",
            ReviewType::Concurrency => "concurrency",
        }
    }
}

impl fmt::Display for ReviewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.route_segment())
    }
}

impl FromStr for ReviewType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        ReviewType::ALL
            .iter()
            .copied()
            .find(|t| t.route_segment() == needle)
            .ok_or_else(|| format!("Unknown review type: '{}'", s))
    }
}

/// A single source file handed to the reviewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CodeReviewRequest {
    pub filename: String,
    pub source_code: String,
    #[serde(skip)]
    pub review_type: ReviewType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodeReviewResponse {
    #[serde(default)]
    pub result: String,
}

/// Completed review of one file. The text is free-form and carries no
/// machine-readable severity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeReview {
    pub filename: String,
    pub review_type: ReviewType,
    pub text: String,
}
