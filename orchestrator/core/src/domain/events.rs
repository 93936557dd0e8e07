// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::session::SessionId;
use crate::domain::unit::{UnitKey, UnitKind, UnitStatus};

/// Progress and lifecycle events emitted while a scan plan runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanEvent {
    SessionStarted {
        session_id: SessionId,
        name: String,
        total_steps: usize,
        started_at: DateTime<Utc>,
    },
    StepAdvanced {
        session_id: SessionId,
        step_index: usize,
        label: String,
        progress_percent: u8,
        advanced_at: DateTime<Utc>,
    },
    SessionCompleted {
        session_id: SessionId,
        completed_at: DateTime<Utc>,
    },
    SessionFailed {
        session_id: SessionId,
        reason: String,
        failed_at: DateTime<Utc>,
    },
    UnitTransitioned {
        session_id: SessionId,
        unit_key: UnitKey,
        kind: UnitKind,
        status: UnitStatus,
        at: DateTime<Utc>,
    },
    BatchProgress {
        session_id: SessionId,
        processed: usize,
        total: usize,
        at: DateTime<Utc>,
    },
    EnrichmentLookup {
        session_id: SessionId,
        product: String,
        records: usize,
        error: Option<String>,
        at: DateTime<Utc>,
    },
}

impl ScanEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            ScanEvent::SessionStarted { session_id, .. }
            | ScanEvent::StepAdvanced { session_id, .. }
            | ScanEvent::SessionCompleted { session_id, .. }
            | ScanEvent::SessionFailed { session_id, .. }
            | ScanEvent::UnitTransitioned { session_id, .. }
            | ScanEvent::BatchProgress { session_id, .. }
            | ScanEvent::EnrichmentLookup { session_id, .. } => *session_id,
        }
    }

    /// Whether this event ends its session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanEvent::SessionCompleted { .. } | ScanEvent::SessionFailed { .. }
        )
    }
}
