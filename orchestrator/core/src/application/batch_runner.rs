// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Batch Runner
//!
//! Runs independent units (reviewed files, mobile packages, contracts)
//! against one analyzer, strictly one at a time and in input order.
//!
//! A collaborator failure marks that unit `Failed` and the batch moves on.
//! Store invariant violations are programming errors and abort the batch.
//! When the store is discarded mid-batch the in-flight completion is
//! ignored and every unit not yet finished is reported as abandoned.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use tracing::{debug, info, warn};

use crate::application::unit_store::{AnalysisUnitStore, StoreError};
use crate::domain::collaborator::CollaboratorError;
use crate::domain::events::ScanEvent;
use crate::domain::session::SessionId;
use crate::domain::unit::{UnitKey, UnitKind, UnitResult, UnitStatus, UnitTransition};
use crate::infrastructure::event_bus::EventBus;

/// One unit of work: its store key, kind and the collaborator input.
#[derive(Debug, Clone)]
pub struct BatchItem<I> {
    pub key: UnitKey,
    pub kind: UnitKind,
    pub input: I,
}

impl<I> BatchItem<I> {
    pub fn new(key: impl Into<UnitKey>, kind: UnitKind, input: I) -> Self {
        Self {
            key: key.into(),
            kind,
            input,
        }
    }
}

/// Build batch items from `(name, input)` pairs. Inputs sharing a name, such
/// as two `Token.sol` files from different directories, get `#2`, `#3`, ...
/// suffixes so every unit key stays unique.
pub fn named_items<I>(kind: UnitKind, inputs: impl IntoIterator<Item = (String, I)>) -> Vec<BatchItem<I>> {
    let mut taken = HashSet::new();
    inputs
        .into_iter()
        .map(|(name, input)| {
            let mut key = name.clone();
            let mut occurrence = 1;
            while !taken.insert(key.clone()) {
                occurrence += 1;
                key = format!("{}#{}", name, occurrence);
            }
            BatchItem::new(key, kind, input)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
    pub abandoned: usize,
}

pub struct BatchRunner {
    session_id: SessionId,
    event_bus: Option<EventBus>,
}

impl BatchRunner {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub async fn run<I, F, Fut>(
        &self,
        store: &mut AnalysisUnitStore,
        items: Vec<BatchItem<I>>,
        mut invoke: F,
    ) -> Result<BatchSummary, StoreError>
    where
        F: FnMut(I) -> Fut,
        Fut: Future<Output = Result<UnitResult, CollaboratorError>>,
    {
        let total = items.len();
        let mut summary = BatchSummary {
            total,
            ..BatchSummary::default()
        };

        if store.is_discarded() {
            warn!(session_id = %self.session_id, "Batch discarded before start");
            summary.abandoned = total;
            return Ok(summary);
        }

        for item in &items {
            store.register(item.key.clone(), item.kind)?;
        }
        info!(session_id = %self.session_id, total, "Batch started");

        for (position, item) in items.into_iter().enumerate() {
            if store.is_discarded() {
                summary.abandoned = total - position;
                break;
            }

            let BatchItem { key, kind, input } = item;
            store.transition(&key, UnitTransition::Start)?;
            self.publish_transition(&key, kind, UnitStatus::Running);

            let outcome = invoke(input).await;

            if store.is_discarded() {
                debug!(session_id = %self.session_id, unit = %key, "Ignoring completion of discarded batch");
                summary.abandoned = total - position;
                break;
            }

            let status = match outcome {
                Ok(result) => {
                    store.transition(&key, UnitTransition::Complete(result))?;
                    summary.completed += 1;
                    debug!(session_id = %self.session_id, unit = %key, "Unit completed");
                    UnitStatus::Completed
                }
                Err(e) => {
                    warn!(session_id = %self.session_id, unit = %key, error = %e, "Unit failed");
                    store.transition(&key, UnitTransition::Fail(e.to_string()))?;
                    summary.failed += 1;
                    UnitStatus::Failed
                }
            };

            metrics::counter!(
                "bastion_units_processed_total",
                "kind" => kind.as_str(),
                "status" => status.as_str()
            )
            .increment(1);

            self.publish_transition(&key, kind, status);
            if let Some(bus) = &self.event_bus {
                bus.publish(ScanEvent::BatchProgress {
                    session_id: self.session_id,
                    processed: position + 1,
                    total,
                    at: Utc::now(),
                });
            }
        }

        info!(
            session_id = %self.session_id,
            completed = summary.completed,
            failed = summary.failed,
            abandoned = summary.abandoned,
            "Batch finished"
        );
        Ok(summary)
    }

    fn publish_transition(&self, key: &UnitKey, kind: UnitKind, status: UnitStatus) {
        if let Some(bus) = &self.event_bus {
            bus.publish(ScanEvent::UnitTransitioned {
                session_id: self.session_id,
                unit_key: key.clone(),
                kind,
                status,
                at: Utc::now(),
            });
        }
    }
}
