// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Terminal progress rendering
//!
//! Renders [`ScanEvent`]s from the event bus as one `indicatif` bar per
//! session. Network sessions are measured in percent, batch sessions in units.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use tokio::task::JoinHandle;

use bastion_core::domain::events::ScanEvent;
use bastion_core::domain::session::SessionId;
use bastion_core::domain::unit::UnitStatus;
use bastion_core::infrastructure::event_bus::{EventBusError, EventReceiver};

const PERCENT_TEMPLATE: &str = "{spinner:.green} {prefix:.bold} [{bar:30.cyan/blue}] {pos:>3}% {msg}";
const COUNT_TEMPLATE: &str = "{spinner:.green} {prefix:.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}";

pub struct ProgressRenderer {
    multi: MultiProgress,
    bars: HashMap<SessionId, ProgressBar>,
}

impl Default for ProgressRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressRenderer {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    pub fn with_draw_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: HashMap::new(),
        }
    }

    /// Render events until the bus closes.
    pub fn spawn(mut self, mut receiver: EventReceiver) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => self.handle(&event),
                    Err(EventBusError::Lagged(_)) => continue,
                    Err(_) => break,
                }
            }
            self.finish();
        })
    }

    pub fn handle(&mut self, event: &ScanEvent) {
        match event {
            ScanEvent::SessionStarted {
                session_id,
                name,
                total_steps,
                ..
            } => {
                let (length, template) = if name.starts_with("network:") {
                    (100, PERCENT_TEMPLATE)
                } else {
                    (*total_steps as u64, COUNT_TEMPLATE)
                };
                let style = ProgressStyle::with_template(template)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> ");
                let bar = self.multi.add(ProgressBar::new(length));
                bar.set_style(style);
                bar.set_prefix(name.clone());
                self.bars.insert(*session_id, bar);
            }
            ScanEvent::StepAdvanced {
                session_id,
                label,
                progress_percent,
                ..
            } => {
                if let Some(bar) = self.bars.get(session_id) {
                    bar.set_position(u64::from(*progress_percent));
                    bar.set_message(label.clone());
                }
            }
            ScanEvent::BatchProgress {
                session_id,
                processed,
                total,
                ..
            } => {
                if let Some(bar) = self.bars.get(session_id) {
                    bar.set_length(*total as u64);
                    bar.set_position(*processed as u64);
                }
            }
            ScanEvent::UnitTransitioned {
                session_id,
                unit_key,
                status: UnitStatus::Running,
                ..
            } => {
                if let Some(bar) = self.bars.get(session_id) {
                    bar.set_message(unit_key.to_string());
                }
            }
            ScanEvent::UnitTransitioned { .. } => {}
            ScanEvent::EnrichmentLookup {
                session_id,
                product,
                records,
                error,
                ..
            } => {
                if let Some(bar) = self.bars.get(session_id) {
                    let message = match error {
                        Some(_) => format!("CVE lookup failed: {}", product),
                        None => format!("CVE lookup: {} ({} found)", product, records),
                    };
                    bar.set_message(message);
                }
            }
            ScanEvent::SessionCompleted { session_id, .. } => {
                if let Some(bar) = self.bars.get(session_id) {
                    if bar.length() == Some(100) && bar.position() < 100 {
                        bar.set_position(100);
                    }
                    bar.finish_with_message("done");
                }
            }
            ScanEvent::SessionFailed {
                session_id, reason, ..
            } => {
                if let Some(bar) = self.bars.get(session_id) {
                    bar.abandon_with_message(format!("failed: {}", reason));
                }
            }
        }
    }

    /// Position of a session's bar, if one was started.
    pub fn position(&self, session_id: SessionId) -> Option<u64> {
        self.bars.get(&session_id).map(ProgressBar::position)
    }

    pub fn is_finished(&self, session_id: SessionId) -> bool {
        self.bars.get(&session_id).is_some_and(ProgressBar::is_finished)
    }

    /// Abandon any bar left running, e.g. after an interrupt.
    pub fn finish(&self) {
        for bar in self.bars.values() {
            if !bar.is_finished() {
                bar.abandon();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_core::domain::unit::{UnitKey, UnitKind};
    use chrono::Utc;

    fn renderer() -> ProgressRenderer {
        ProgressRenderer::with_draw_target(ProgressDrawTarget::hidden())
    }

    fn started(session_id: SessionId, name: &str, total_steps: usize) -> ScanEvent {
        ScanEvent::SessionStarted {
            session_id,
            name: name.to_string(),
            total_steps,
            started_at: Utc::now(),
        }
    }

    #[test]
    fn test_network_bar_tracks_percent() {
        let mut renderer = renderer();
        let session = SessionId::new();

        renderer.handle(&started(session, "network:10.0.0.1", 5));
        renderer.handle(&ScanEvent::StepAdvanced {
            session_id: session,
            step_index: 2,
            label: "SSL/TLS analysis".to_string(),
            progress_percent: 32,
            advanced_at: Utc::now(),
        });
        assert_eq!(renderer.position(session), Some(32));

        renderer.handle(&ScanEvent::SessionCompleted {
            session_id: session,
            completed_at: Utc::now(),
        });
        assert_eq!(renderer.position(session), Some(100));
        assert!(renderer.is_finished(session));
    }

    #[test]
    fn test_batch_bar_tracks_processed_units() {
        let mut renderer = renderer();
        let session = SessionId::new();

        renderer.handle(&started(session, "code-review", 4));
        renderer.handle(&ScanEvent::UnitTransitioned {
            session_id: session,
            unit_key: UnitKey::from("app.py"),
            kind: UnitKind::CodeFile,
            status: UnitStatus::Running,
            at: Utc::now(),
        });
        renderer.handle(&ScanEvent::BatchProgress {
            session_id: session,
            processed: 3,
            total: 4,
            at: Utc::now(),
        });

        assert_eq!(renderer.position(session), Some(3));
        assert!(!renderer.is_finished(session));
    }

    #[test]
    fn test_events_for_unknown_sessions_are_ignored() {
        let mut renderer = renderer();
        let session = SessionId::new();
        renderer.handle(&ScanEvent::BatchProgress {
            session_id: session,
            processed: 1,
            total: 1,
            at: Utc::now(),
        });
        assert_eq!(renderer.position(session), None);
    }
}
