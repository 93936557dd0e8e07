// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Value objects, aggregates and collaborator interfaces of the scan engine.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure types and invariants; no I/O

pub mod unit;
pub mod session;
pub mod network;
pub mod code_review;
pub mod mobile;
pub mod contract;
pub mod vulnerability;
pub mod findings;
pub mod report;
pub mod collaborator;
pub mod events;
pub mod config;
