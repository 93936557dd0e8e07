// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Step Sequencer
//!
//! Drives the ordered steps of one scan session. Progress is a pure function
//! of the step index: `floor(index * cap / total)` while running and exactly
//! 100 after [`StepSequencer::complete`]. Whether a driver advances on real
//! milestones or on a timer does not change the values reported.

use chrono::Utc;
use tracing::debug;

use crate::domain::events::ScanEvent;
use crate::domain::session::{ScanSession, SessionId, Step};
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequencerError {
    #[error("A session needs at least one step")]
    NoSteps,

    #[error("Step {requested} is behind the current step {current}")]
    OutOfOrderStep { requested: usize, current: usize },

    #[error("Step {requested} does not exist (session has {total} steps)")]
    UnknownStep { requested: usize, total: usize },

    #[error("Session already finished")]
    SessionFinished,
}

pub struct StepSequencer {
    id: SessionId,
    steps: Vec<Step>,
    cap_percent: u8,
    current: usize,
    progress: u8,
    finished: bool,
    event_bus: Option<EventBus>,
}

impl StepSequencer {
    /// `cap_percent` is clamped to 100.
    pub fn new(steps: Vec<Step>, cap_percent: u8) -> Result<Self, SequencerError> {
        Self::with_id(SessionId::new(), steps, cap_percent)
    }

    pub fn with_id(id: SessionId, steps: Vec<Step>, cap_percent: u8) -> Result<Self, SequencerError> {
        if steps.is_empty() {
            return Err(SequencerError::NoSteps);
        }
        Ok(Self {
            id,
            steps,
            cap_percent: cap_percent.min(100),
            current: 0,
            progress: 0,
            finished: false,
            event_bus: None,
        })
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn current_step_index(&self) -> usize {
        self.current
    }

    pub fn progress_percent(&self) -> u8 {
        self.progress
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Move to step `index`. Re-advancing to the current step is allowed and
    /// reports the same progress.
    pub fn advance(&mut self, index: usize) -> Result<u8, SequencerError> {
        if self.finished {
            return Err(SequencerError::SessionFinished);
        }
        let total = self.steps.len();
        if index >= total {
            return Err(SequencerError::UnknownStep { requested: index, total });
        }
        if index < self.current {
            return Err(SequencerError::OutOfOrderStep {
                requested: index,
                current: self.current,
            });
        }

        self.current = index;
        // index < total, so the result is at most cap_percent
        self.progress = (index * usize::from(self.cap_percent) / total) as u8;
        debug!(
            session_id = %self.id,
            step = index,
            label = %self.steps[index].label,
            progress = self.progress,
            "Step advanced"
        );
        self.publish_progress();
        Ok(self.progress)
    }

    pub fn complete(&mut self) -> Result<(), SequencerError> {
        if self.finished {
            return Err(SequencerError::SessionFinished);
        }
        self.current = self.steps.len() - 1;
        self.progress = 100;
        self.finished = true;
        self.publish_progress();
        Ok(())
    }

    pub fn session(&self) -> ScanSession {
        ScanSession {
            id: self.id,
            steps: self.steps.clone(),
            current_step_index: self.current,
            progress_percent: self.progress,
            finished: self.finished,
        }
    }

    fn publish_progress(&self) {
        if let Some(bus) = &self.event_bus {
            bus.publish(ScanEvent::StepAdvanced {
                session_id: self.id,
                step_index: self.current,
                label: self.steps[self.current].label.clone(),
                progress_percent: self.progress,
                advanced_at: Utc::now(),
            });
        }
    }
}
