// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Analysis Unit Store
//!
//! Holds the lifecycle state of every unit in one session. Each key moves
//! through the state machine documented on [`crate::domain::unit`]; every
//! transition is checked against the unit's current state before it is
//! applied, so a rejected call leaves the store untouched.
//!
//! The store performs no I/O. It does carry a [`CancellationToken`]: once the
//! session is discarded, all further mutations fail with
//! [`StoreError::SessionDiscarded`] and drivers stop.

use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use crate::domain::unit::{AnalysisUnit, UnitKey, UnitKind, UnitStatus, UnitTransition};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Unit '{0}' is already registered")]
    DuplicateKey(UnitKey),

    #[error("Unit '{0}' is not registered")]
    UnknownUnit(UnitKey),

    #[error("Invalid transition for unit '{key}': {from} -> {to}")]
    InvalidTransition {
        key: UnitKey,
        from: UnitStatus,
        to: UnitStatus,
    },

    #[error("Result kind '{actual}' does not match unit '{key}' of kind '{expected}'")]
    KindMismatch {
        key: UnitKey,
        expected: UnitKind,
        actual: UnitKind,
    },

    #[error("Session was discarded")]
    SessionDiscarded,
}

#[derive(Debug, Default)]
pub struct AnalysisUnitStore {
    units: Vec<AnalysisUnit>,
    index: HashMap<UnitKey, usize>,
    cancellation: CancellationToken,
}

impl AnalysisUnitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the store to a caller-owned token (e.g. a child of the plan's token).
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            ..Self::default()
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn discard(&self) {
        self.cancellation.cancel();
    }

    pub fn is_discarded(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn register(&mut self, key: UnitKey, kind: UnitKind) -> Result<&AnalysisUnit, StoreError> {
        if self.is_discarded() {
            return Err(StoreError::SessionDiscarded);
        }
        if self.index.contains_key(&key) {
            return Err(StoreError::DuplicateKey(key));
        }
        let position = self.units.len();
        self.index.insert(key.clone(), position);
        self.units.push(AnalysisUnit::new(key, kind));
        Ok(&self.units[position])
    }

    pub fn transition(&mut self, key: &UnitKey, transition: UnitTransition) -> Result<&AnalysisUnit, StoreError> {
        if self.is_discarded() {
            return Err(StoreError::SessionDiscarded);
        }
        let position = *self
            .index
            .get(key)
            .ok_or_else(|| StoreError::UnknownUnit(key.clone()))?;
        let unit = &mut self.units[position];

        let to = transition.target_status();
        if !unit.status.can_transition_to(to) {
            return Err(StoreError::InvalidTransition {
                key: key.clone(),
                from: unit.status,
                to,
            });
        }
        if let UnitTransition::Complete(result) = &transition {
            if result.kind() != unit.kind {
                return Err(StoreError::KindMismatch {
                    key: key.clone(),
                    expected: unit.kind,
                    actual: result.kind(),
                });
            }
        }

        unit.apply(transition);
        Ok(&*unit)
    }

    pub fn get(&self, key: &UnitKey) -> Option<&AnalysisUnit> {
        self.index.get(key).map(|&i| &self.units[i])
    }

    /// Copy of all units in registration order.
    pub fn snapshot(&self) -> Vec<AnalysisUnit> {
        self.units.clone()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn count_by_status(&self, status: UnitStatus) -> usize {
        self.units.iter().filter(|u| u.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::code_review::{CodeReview, ReviewType};
    use crate::domain::contract::ContractAnalysis;
    use crate::domain::unit::UnitResult;

    fn review(name: &str) -> UnitResult {
        UnitResult::CodeFile(CodeReview {
            filename: name.to_string(),
            review_type: ReviewType::Security,
            text: "ok".to_string(),
        })
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut store = AnalysisUnitStore::new();
        store.register("a.py".into(), UnitKind::CodeFile).unwrap();
        assert_eq!(
            store.register("a.py".into(), UnitKind::CodeFile).unwrap_err(),
            StoreError::DuplicateKey("a.py".into())
        );
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&"a.py".into()).unwrap().status, UnitStatus::Pending);
    }

    #[test]
    fn test_full_lifecycle() {
        let mut store = AnalysisUnitStore::new();
        let key = UnitKey::from("a.py");
        store.register(key.clone(), UnitKind::CodeFile).unwrap();
        store.transition(&key, UnitTransition::Start).unwrap();
        let unit = store.transition(&key, UnitTransition::Complete(review("a.py"))).unwrap();
        assert!(unit.is_completed());
        assert!(unit.result.is_some());
        assert!(unit.error.is_none());
    }

    #[test]
    fn test_completed_to_running_is_invalid() {
        let mut store = AnalysisUnitStore::new();
        let key = UnitKey::from("a.py");
        store.register(key.clone(), UnitKind::CodeFile).unwrap();
        store.transition(&key, UnitTransition::Start).unwrap();
        store.transition(&key, UnitTransition::Complete(review("a.py"))).unwrap();

        let err = store.transition(&key, UnitTransition::Start).unwrap_err();
        assert_eq!(
            err,
            StoreError::InvalidTransition {
                key: key.clone(),
                from: UnitStatus::Completed,
                to: UnitStatus::Running,
            }
        );
        assert!(store.get(&key).unwrap().is_completed());
    }

    #[test]
    fn test_pending_cannot_complete_directly() {
        let mut store = AnalysisUnitStore::new();
        let key = UnitKey::from("a.py");
        store.register(key.clone(), UnitKind::CodeFile).unwrap();
        assert!(matches!(
            store.transition(&key, UnitTransition::Fail("x".into())),
            Err(StoreError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let mut store = AnalysisUnitStore::new();
        let key = UnitKey::from("Vault.sol");
        store.register(key.clone(), UnitKind::Contract).unwrap();
        store.transition(&key, UnitTransition::Start).unwrap();

        let err = store.transition(&key, UnitTransition::Complete(review("Vault.sol"))).unwrap_err();
        assert!(matches!(err, StoreError::KindMismatch { expected: UnitKind::Contract, .. }));
        assert_eq!(store.get(&key).unwrap().status, UnitStatus::Running);

        store
            .transition(&key, UnitTransition::Complete(UnitResult::Contract(ContractAnalysis::default())))
            .unwrap();
    }

    #[test]
    fn test_unknown_unit() {
        let mut store = AnalysisUnitStore::new();
        assert_eq!(
            store.transition(&"ghost".into(), UnitTransition::Start).unwrap_err(),
            StoreError::UnknownUnit("ghost".into())
        );
    }

    #[test]
    fn test_snapshot_keeps_registration_order() {
        let mut store = AnalysisUnitStore::new();
        for name in ["c.py", "a.py", "b.py"] {
            store.register(name.into(), UnitKind::CodeFile).unwrap();
        }
        let keys: Vec<_> = store.snapshot().into_iter().map(|u| u.key.to_string()).collect();
        assert_eq!(keys, vec!["c.py", "a.py", "b.py"]);
    }

    #[test]
    fn test_discarded_store_rejects_mutations() {
        let mut store = AnalysisUnitStore::new();
        let key = UnitKey::from("a.py");
        store.register(key.clone(), UnitKind::CodeFile).unwrap();

        let token = store.cancellation_token();
        token.cancel();

        assert!(store.is_discarded());
        assert_eq!(store.transition(&key, UnitTransition::Start).unwrap_err(), StoreError::SessionDiscarded);
        assert_eq!(
            store.register("b.py".into(), UnitKind::CodeFile).unwrap_err(),
            StoreError::SessionDiscarded
        );
    }
}
