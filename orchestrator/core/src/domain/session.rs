// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Scan session identity and the step model driven by the step sequencer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Identifies one scan session or one batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub label: String,
}

impl Step {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Read-only view of a session's progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSession {
    pub id: SessionId,
    pub steps: Vec<Step>,
    pub current_step_index: usize,
    pub progress_percent: u8,
    pub finished: bool,
}

impl ScanSession {
    pub fn current_step(&self) -> Option<&Step> {
        self.steps.get(self.current_step_index)
    }
}

/// How a driver moves its sequencer forward. Both produce identical
/// progress values for the same step index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepPacing {
    /// Advance when the collaborator reports the step's milestone.
    #[default]
    Milestones,
    /// Advance on a fixed tick while the single long-running call is in flight.
    Timed(Duration),
}
