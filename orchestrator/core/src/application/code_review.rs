// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Source review batch: one unit per file, reviewed one at a time.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::application::batch_runner::{named_items, BatchRunner, BatchSummary};
use crate::application::unit_store::{AnalysisUnitStore, StoreError};
use crate::domain::code_review::{CodeReview, CodeReviewRequest, ReviewType, SourceFile};
use crate::domain::collaborator::CodeReviewer;
use crate::domain::events::ScanEvent;
use crate::domain::session::SessionId;
use crate::domain::unit::{UnitKind, UnitResult};
use crate::infrastructure::event_bus::EventBus;

pub struct CodeReviewService {
    reviewer: Arc<dyn CodeReviewer>,
    event_bus: Option<EventBus>,
}

impl CodeReviewService {
    pub fn new(reviewer: Arc<dyn CodeReviewer>) -> Self {
        Self {
            reviewer,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Review `files` in the order given. Files are keyed by path.
    pub async fn run(
        &self,
        session_id: SessionId,
        store: &mut AnalysisUnitStore,
        files: Vec<SourceFile>,
        review_type: ReviewType,
    ) -> Result<BatchSummary, StoreError> {
        info!(session_id = %session_id, files = files.len(), review_type = %review_type, "Code review started");
        publish_started(self.event_bus.as_ref(), session_id, "code-review", files.len());

        let items = files
            .into_iter()
            .map(|file| (file.path.clone(), file));
        let items = named_items(UnitKind::CodeFile, items);

        let mut runner = BatchRunner::new(session_id);
        if let Some(bus) = &self.event_bus {
            runner = runner.with_event_bus(bus.clone());
        }

        let summary = runner
            .run(store, items, |file: SourceFile| async move {
                let request = CodeReviewRequest {
                    filename: file.path,
                    source_code: file.content,
                    review_type,
                };
                self.reviewer.review(&request).await.map(|response| {
                    UnitResult::CodeFile(CodeReview {
                        filename: request.filename.clone(),
                        review_type,
                        text: response.result,
                    })
                })
            })
            .await?;

        publish_finished(self.event_bus.as_ref(), session_id);
        Ok(summary)
    }
}

pub(crate) fn publish_started(bus: Option<&EventBus>, session_id: SessionId, name: &str, total: usize) {
    if let Some(bus) = bus {
        bus.publish(ScanEvent::SessionStarted {
            session_id,
            name: name.to_string(),
            total_steps: total,
            started_at: Utc::now(),
        });
    }
}

pub(crate) fn publish_finished(bus: Option<&EventBus>, session_id: SessionId) {
    if let Some(bus) = bus {
        bus.publish(ScanEvent::SessionCompleted {
            session_id,
            completed_at: Utc::now(),
        });
    }
}
