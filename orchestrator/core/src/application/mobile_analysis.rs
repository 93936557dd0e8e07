// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mobile package batch: one unit per `.apk`.

use std::sync::Arc;
use tracing::info;

use crate::application::batch_runner::{named_items, BatchRunner, BatchSummary};
use crate::application::code_review::{publish_finished, publish_started};
use crate::application::unit_store::{AnalysisUnitStore, StoreError};
use crate::domain::collaborator::MobileAnalyzer;
use crate::domain::mobile::MobilePackage;
use crate::domain::session::SessionId;
use crate::domain::unit::{UnitKind, UnitResult};
use crate::infrastructure::event_bus::EventBus;

pub struct MobileAnalysisService {
    analyzer: Arc<dyn MobileAnalyzer>,
    event_bus: Option<EventBus>,
}

impl MobileAnalysisService {
    pub fn new(analyzer: Arc<dyn MobileAnalyzer>) -> Self {
        Self {
            analyzer,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub async fn run(
        &self,
        session_id: SessionId,
        store: &mut AnalysisUnitStore,
        packages: Vec<MobilePackage>,
    ) -> Result<BatchSummary, StoreError> {
        info!(session_id = %session_id, packages = packages.len(), "Mobile analysis started");
        publish_started(self.event_bus.as_ref(), session_id, "mobile", packages.len());

        let items = packages
            .into_iter()
            .map(|package| (package.file_name().to_string(), package));
        let items = named_items(UnitKind::MobilePackage, items);

        let mut runner = BatchRunner::new(session_id);
        if let Some(bus) = &self.event_bus {
            runner = runner.with_event_bus(bus.clone());
        }

        let summary = runner
            .run(store, items, |package: MobilePackage| async move {
                self.analyzer.analyze(&package).await.map(|mut analysis| {
                    analysis.package_name = package.file_name().to_string();
                    UnitResult::MobilePackage(analysis)
                })
            })
            .await?;

        publish_finished(self.event_bus.as_ref(), session_id);
        Ok(summary)
    }
}
