// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Bastion Core
//!
//! Scan orchestration, vulnerability enrichment and findings aggregation.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** `domain` holds types and invariants, `application` drives
//!   sessions and batches, `infrastructure` talks to the analysis backend.

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
