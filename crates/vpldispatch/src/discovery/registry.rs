// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Runtimes registered in the platform dispatch registry.
//!
//! Each registered runtime carries a merit. Higher merit is searched first;
//! among equal merit the entry enumerated last wins.

use std::path::PathBuf;

/// Registry key holding one subkey per registered runtime.
pub const DISPATCH_KEY: &str = "Software\\Intel\\MediaSDK\\Dispatch";

/// One registered runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchEntry {
    pub path: PathBuf,
    pub merit: u32,
}

/// Order registered runtimes by merit.
pub fn rank_by_merit(entries: Vec<DispatchEntry>) -> Vec<PathBuf> {
    let mut entries: Vec<DispatchEntry> = entries.into_iter().rev().collect();
    // Stable: equal merit keeps the reversed enumeration order
    entries.sort_by(|a, b| b.merit.cmp(&a.merit));
    entries.into_iter().map(|e| e.path).collect()
}

/// Module paths from the dispatch registry, best first.
#[cfg(windows)]
pub fn dispatch_libraries() -> Vec<PathBuf> {
    rank_by_merit(super::windows::read_dispatch_entries())
}

#[cfg(not(windows))]
pub fn dispatch_libraries() -> Vec<PathBuf> {
    Vec::new()
}
