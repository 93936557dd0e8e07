// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for Bastion CLI

pub mod config;
pub mod cve;
pub mod scan;

pub use self::config::ConfigCommand;
pub use self::cve::CveArgs;
pub use self::scan::ScanArgs;
