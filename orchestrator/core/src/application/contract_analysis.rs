// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Smart contract batch: one unit per contract, keyed by contract name.

use std::sync::Arc;
use tracing::info;

use crate::application::batch_runner::{named_items, BatchRunner, BatchSummary};
use crate::application::code_review::{publish_finished, publish_started};
use crate::application::unit_store::{AnalysisUnitStore, StoreError};
use crate::domain::collaborator::ContractAnalyzer;
use crate::domain::contract::ContractSource;
use crate::domain::session::SessionId;
use crate::domain::unit::{UnitKind, UnitResult};
use crate::infrastructure::event_bus::EventBus;

pub struct ContractAnalysisService {
    analyzer: Arc<dyn ContractAnalyzer>,
    event_bus: Option<EventBus>,
}

impl ContractAnalysisService {
    pub fn new(analyzer: Arc<dyn ContractAnalyzer>) -> Self {
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
        sources: Vec<ContractSource>,
    ) -> Result<BatchSummary, StoreError> {
        info!(session_id = %session_id, contracts = sources.len(), "Contract analysis started");
        publish_started(self.event_bus.as_ref(), session_id, "contract", sources.len());

        let items = sources
            .into_iter()
            .map(|source| (source.name().to_string(), source));
        let items = named_items(UnitKind::Contract, items);

        let mut runner = BatchRunner::new(session_id);
        if let Some(bus) = &self.event_bus {
            runner = runner.with_event_bus(bus.clone());
        }

        let summary = runner
            .run(store, items, |source: ContractSource| async move {
                self.analyzer.analyze(&source).await.map(|mut analysis| {
                    if analysis.contract_file.is_empty() {
                        analysis.contract_file = source.name().to_string();
                    }
                    UnitResult::Contract(analysis)
                })
            })
            .await?;

        publish_finished(self.event_bus.as_ref(), session_id);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::collaborator::CollaboratorError;
    use crate::domain::contract::{ContractAnalysis, ContractVulnerability};
    use async_trait::async_trait;

    struct MockAnalyzer;

    #[async_trait]
    impl ContractAnalyzer for MockAnalyzer {
        async fn analyze(&self, source: &ContractSource) -> Result<ContractAnalysis, CollaboratorError> {
            match source {
                ContractSource::Code { contract_code, .. } if contract_code.contains("call.value") => {
                    Ok(ContractAnalysis {
                        vulnerabilities: vec![ContractVulnerability {
                            id: "reentrancy-eth".to_string(),
                            description: "Reentrancy in withdraw()".to_string(),
                            impact: "High".to_string(),
                            confidence: "Medium".to_string(),
                            kind: "reentrancy".to_string(),
                            patch: None,
                        }],
                        status: Some("completed".to_string()),
                        ..Default::default()
                    })
                }
                ContractSource::Code { .. } => Ok(ContractAnalysis::default()),
                ContractSource::File { .. } => Err(CollaboratorError::rejected(Some(400), "Invalid file type")),
            }
        }
    }

    #[tokio::test]
    async fn test_contract_batch() {
        let service = ContractAnalysisService::new(Arc::new(MockAnalyzer));
        let mut store = AnalysisUnitStore::new();
        let sources = vec![
            ContractSource::code("function withdraw() { msg.sender.call.value(x)(); }", Some("Vault")).unwrap(),
            ContractSource::code("contract Empty {}", None).unwrap(),
            ContractSource::file("Token.sol", b"contract Token {}".to_vec()).unwrap(),
        ];

        let summary = service.run(SessionId::new(), &mut store, sources).await.unwrap();
        assert_eq!((summary.completed, summary.failed), (2, 1));

        let units = store.snapshot();
        assert_eq!(units[0].key.as_str(), "Vault.sol");
        match &units[0].result {
            Some(UnitResult::Contract(analysis)) => {
                assert_eq!(analysis.contract_file, "Vault.sol");
                assert_eq!(analysis.vulnerabilities.len(), 1);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(units[1].key.as_str(), "contract.sol");
        assert!(units[2].is_failed());
    }

    #[tokio::test]
    async fn test_contracts_sharing_a_name_get_distinct_units() {
        let service = ContractAnalysisService::new(Arc::new(MockAnalyzer));
        let mut store = AnalysisUnitStore::new();
        let sources = vec![
            ContractSource::code("contract Token {}", Some("Token")).unwrap(),
            ContractSource::code("contract Token { uint x; }", Some("Token.sol")).unwrap(),
        ];

        let summary = service.run(SessionId::new(), &mut store, sources).await.unwrap();
        assert_eq!((summary.completed, summary.failed), (2, 0));

        let keys: Vec<String> = store.snapshot().iter().map(|u| u.key.to_string()).collect();
        assert_eq!(keys, vec!["Token.sol".to_string(), "Token.sol#2".to_string()]);
    }
}
