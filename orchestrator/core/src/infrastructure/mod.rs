// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod event_bus;
pub mod backend;
pub mod nvd;
pub mod source_tree;

pub use backend::BackendClient;
pub use nvd::NvdClient;
pub use source_tree::SourceTreeLoader;
