// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Analysis Unit Aggregate
//!
//! The smallest trackable piece of scan work: one network scan session, one
//! reviewed source file, one mobile package or one smart contract.
//!
//! ## Lifecycle
//!
//! | From | To | Transition |
//! |------|----|------------|
//! | `Pending` | `Running` | [`UnitTransition::Start`] |
//! | `Running` | `Completed` | [`UnitTransition::Complete`] |
//! | `Running` | `Failed` | [`UnitTransition::Fail`] |
//!
//! Every other move is rejected. `Completed` units always carry a result and
//! never an error; `Failed` units always carry an error and never a result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::code_review::CodeReview;
use crate::domain::contract::ContractAnalysis;
use crate::domain::mobile::MobileAnalysis;
use crate::domain::network::NetworkScanReport;

/// Stable key of a unit within one store (a target, a file path, a package name).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitKey(String);

impl UnitKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UnitKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    NetworkScan,
    CodeFile,
    MobilePackage,
    Contract,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::NetworkScan => "network_scan",
            UnitKind::CodeFile => "code_file",
            UnitKind::MobilePackage => "mobile_package",
            UnitKind::Contract => "contract",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl UnitStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UnitStatus::Completed | UnitStatus::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: UnitStatus) -> bool {
        matches!(
            (self, next),
            (UnitStatus::Pending, UnitStatus::Running)
                | (UnitStatus::Running, UnitStatus::Completed)
                | (UnitStatus::Running, UnitStatus::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Pending => "pending",
            UnitStatus::Running => "running",
            UnitStatus::Completed => "completed",
            UnitStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strongly-typed result of a completed unit, one variant per [`UnitKind`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "result", rename_all = "snake_case")]
pub enum UnitResult {
    NetworkScan(NetworkScanReport),
    CodeFile(CodeReview),
    MobilePackage(MobileAnalysis),
    Contract(ContractAnalysis),
}

impl UnitResult {
    pub fn kind(&self) -> UnitKind {
        match self {
            UnitResult::NetworkScan(_) => UnitKind::NetworkScan,
            UnitResult::CodeFile(_) => UnitKind::CodeFile,
            UnitResult::MobilePackage(_) => UnitKind::MobilePackage,
            UnitResult::Contract(_) => UnitKind::Contract,
        }
    }
}

/// A requested state change, carrying the payload its target state requires.
#[derive(Debug, Clone)]
pub enum UnitTransition {
    Start,
    Complete(UnitResult),
    Fail(String),
}

impl UnitTransition {
    pub fn target_status(&self) -> UnitStatus {
        match self {
            UnitTransition::Start => UnitStatus::Running,
            UnitTransition::Complete(_) => UnitStatus::Completed,
            UnitTransition::Fail(_) => UnitStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisUnit {
    pub key: UnitKey,
    pub kind: UnitKind,
    pub status: UnitStatus,
    pub result: Option<UnitResult>,
    pub error: Option<String>,
    pub registered_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl AnalysisUnit {
    pub fn new(key: UnitKey, kind: UnitKind) -> Self {
        Self {
            key,
            kind,
            status: UnitStatus::Pending,
            result: None,
            error: None,
            registered_at: Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }

    /// Apply a transition after the caller has checked it against the state
    /// machine. Keeps the result/error invariant.
    pub(crate) fn apply(&mut self, transition: UnitTransition) {
        let now = Utc::now();
        match transition {
            UnitTransition::Start => {
                self.status = UnitStatus::Running;
                self.started_at = Some(now);
            }
            UnitTransition::Complete(result) => {
                self.status = UnitStatus::Completed;
                self.result = Some(result);
                self.error = None;
                self.ended_at = Some(now);
            }
            UnitTransition::Fail(message) => {
                self.status = UnitStatus::Failed;
                self.error = Some(message);
                self.result = None;
                self.ended_at = Some(now);
            }
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == UnitStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == UnitStatus::Failed
    }
}
