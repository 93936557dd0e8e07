// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Source Tree Loader
//!
//! Collects the text files of a project directory for code review.
//!
//! # Ordering
//!
//! Configuration files (`.json`, `.yaml`, `.yml`, `.toml`, `.ini`, `.cfg`)
//! come first, then every other file. Each group is sorted by relative path
//! so two loads of the same tree produce the same review order.
//!
//! # Usage
//!
//! ```ignore
//! let files = SourceTreeLoader::new().load("./my-service")?;
//! ```

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::domain::code_review::SourceFile;

const CONFIG_EXTENSIONS: [&str; 6] = ["json", "yaml", "yml", "toml", "ini", "cfg"];

const SKIP_EXTENSIONS: [&str; 22] = [
    "pyc", "so", "dll", "exe", "bin", "class", "jar", "apk", "jpg", "jpeg", "png", "gif", "ico", "svg", "mp4",
    "mp3", "zip", "tar", "gz", "7z", "db", "sqlite",
];

const SKIP_DIRS: [&str; 5] = ["node_modules", "target", "__pycache__", "venv", "dist"];

pub struct SourceTreeLoader {
    /// Files above this size are left out of the review
    max_file_size: u64,
}

impl Default for SourceTreeLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceTreeLoader {
    /// Loader with a 1 MB per-file limit.
    pub fn new() -> Self {
        Self {
            max_file_size: 1024 * 1024,
        }
    }

    pub fn with_max_file_size(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    /// Load every reviewable text file under `root`. Paths in the result are
    /// relative to `root` and use `/` separators.
    pub fn load(&self, root: impl AsRef<Path>) -> Result<Vec<SourceFile>> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(anyhow!("Directory not found: {:?}", root));
        }

        let mut config_files = Vec::new();
        let mut other_files = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry));

        for entry in walker {
            let entry = entry.context("Failed to read directory entry")?;
            if !entry.file_type().is_file() || should_skip_file(entry.path()) {
                continue;
            }

            let path = entry.path();
            let metadata = fs::metadata(path).with_context(|| format!("Failed to get file metadata: {:?}", path))?;
            if metadata.len() > self.max_file_size {
                warn!(path = ?path, size = metadata.len(), "Skipping oversized file");
                continue;
            }

            // Anything that is not UTF-8 is treated as binary.
            let content = match fs::read_to_string(path) {
                Ok(content) => content,
                Err(e) => {
                    debug!(path = ?path, error = %e, "Skipping unreadable file");
                    continue;
                }
            };

            let relative = path
                .strip_prefix(root)
                .unwrap_or(path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let file = SourceFile {
                path: relative,
                content,
            };
            if is_config_file(path) {
                config_files.push(file);
            } else {
                other_files.push(file);
            }
        }

        config_files.sort_by(|a, b| a.path.cmp(&b.path));
        other_files.sort_by(|a, b| a.path.cmp(&b.path));

        debug!(
            root = ?root,
            config_files = config_files.len(),
            other_files = other_files.len(),
            "Loaded source tree"
        );

        config_files.extend(other_files);
        Ok(config_files)
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

fn is_config_file(path: &Path) -> bool {
    extension(path).is_some_and(|ext| CONFIG_EXTENSIONS.contains(&ext.as_str()))
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIP_DIRS.contains(&name.as_ref())
}

fn should_skip_file(path: &Path) -> bool {
    let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if filename.starts_with('.') {
        return true;
    }
    extension(path).is_some_and(|ext| SKIP_EXTENSIONS.contains(&ext.as_str()))
}
