// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Candidate discovery.
//!
//! Finds every module that may implement the runtime API without opening
//! any of them. Locations are searched in a fixed [`Priority`] order and a
//! module already found at a higher priority is never added again, even
//! when reached through a different path or symlink.
//!
//! # Example
//!
//! ```no_run
//! use vpldispatch::discovery::{discover, SearchConfig};
//!
//! let search = SearchConfig::from_env().with_path("/opt/vendor/runtime/lib");
//! for candidate in discover(&search) {
//!     println!("{:?} {}", candidate.priority, candidate.path.display());
//! }
//! ```

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

pub mod registry;
#[cfg(windows)]
mod windows;

/// Variable naming extra directories searched at user-defined priority.
pub const SEARCH_PATH_VAR: &str = "ONEVPL_SEARCH_PATH";
/// Variable naming the runtime package directory.
pub const PACKAGE_VAR: &str = "VPL_BIN";
/// OS library search path variable.
#[cfg(windows)]
pub const OS_PATH_VAR: &str = "PATH";
#[cfg(not(windows))]
pub const OS_PATH_VAR: &str = "LD_LIBRARY_PATH";

/// Search priority of a location. Lower values win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Caller-supplied paths and the user search path variable
    UserDefined = 1,
    /// The runtime package directory
    Package = 2,
    /// Directories of the OS library search path
    OsPath = 3,
    /// Platform default locations, including registered drivers
    SystemDefault = 4,
    /// Legacy vendor package directories
    LegacyPackage = 5,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::UserDefined => "user-defined",
            Priority::Package => "package",
            Priority::OsPath => "os-path",
            Priority::SystemDefault => "system-default",
            Priority::LegacyPackage => "legacy-package",
        };
        f.write_str(name)
    }
}

/// A discovered, not yet loaded module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Canonical path of the module
    pub path: PathBuf,
    pub file_name: String,
    pub priority: Priority,
    /// Position in discovery order
    pub order: usize,
}

/// Where to look for modules.
#[derive(Debug, Clone, Default)]
pub struct SearchConfig {
    paths: Vec<PathBuf>,
    search_path_var: Option<String>,
    package_var: Option<String>,
    os_path_var: Option<String>,
    system_dirs: Vec<PathBuf>,
    dispatch_registry: bool,
    legacy_dirs: Vec<PathBuf>,
}

impl SearchConfig {
    /// An empty configuration that searches nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard configuration: the three environment variables, the
    /// platform default locations and the legacy package directories.
    pub fn from_env() -> Self {
        SearchConfig {
            paths: Vec::new(),
            search_path_var: Some(SEARCH_PATH_VAR.to_string()),
            package_var: Some(PACKAGE_VAR.to_string()),
            os_path_var: Some(OS_PATH_VAR.to_string()),
            system_dirs: default_system_dirs(),
            dispatch_registry: cfg!(windows),
            legacy_dirs: default_legacy_dirs(),
        }
    }

    /// Add an explicit module file or directory at user-defined priority.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }

    pub fn with_search_path_var(mut self, name: Option<&str>) -> Self {
        self.search_path_var = name.map(str::to_string);
        self
    }

    pub fn with_package_var(mut self, name: Option<&str>) -> Self {
        self.package_var = name.map(str::to_string);
        self
    }

    pub fn with_os_path_var(mut self, name: Option<&str>) -> Self {
        self.os_path_var = name.map(str::to_string);
        self
    }

    pub fn with_system_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.system_dirs = dirs;
        self
    }

    /// Read registered runtimes from the Windows dispatch registry key.
    /// Has no effect on other platforms.
    pub fn with_dispatch_registry(mut self, enabled: bool) -> Self {
        self.dispatch_registry = enabled;
        self
    }

    pub fn with_legacy_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.legacy_dirs = dirs;
        self
    }
}

/// The working directory. Distribution library directories only hold
/// runtimes installed by the legacy packages and are searched last.
#[cfg(not(windows))]
fn default_system_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from(".")]
}

#[cfg(windows)]
fn default_system_dirs() -> Vec<PathBuf> {
    std::env::var_os("SystemRoot")
        .map(|root| vec![PathBuf::from(root).join("System32")])
        .unwrap_or_default()
}

#[cfg(not(windows))]
fn default_legacy_dirs() -> Vec<PathBuf> {
    [
        "/usr/lib/x86_64-linux-gnu",
        "/lib",
        "/usr/lib",
        "/lib64",
        "/usr/lib64",
        "/opt/intel/mediasdk/lib",
        "/opt/intel/mediasdk/lib64",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

#[cfg(windows)]
fn default_legacy_dirs() -> Vec<PathBuf> {
    std::env::var_os("ProgramFiles")
        .map(|root| {
            vec![PathBuf::from(root)
                .join("Intel")
                .join("Media SDK")
                .join("bin")
                .join("x64")]
        })
        .unwrap_or_default()
}

/// Whether a file name looks like a runtime module rather than a
/// dispatcher or tracing shim.
#[cfg(not(windows))]
pub fn is_candidate_name(name: &str) -> bool {
    if !name.contains(".so") {
        return false;
    }
    if !(name.starts_with("libvpl") || name.starts_with("libmfx")) {
        return false;
    }
    !(name.starts_with("libvpl.so") || name.starts_with("libmfx.so") || name.contains("libmfx-tracer"))
}

#[cfg(windows)]
pub fn is_candidate_name(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    if !name.ends_with(".dll") {
        return false;
    }
    if !(name.starts_with("libvpl") || name.starts_with("libmfx")) {
        return false;
    }
    !matches!(name.as_str(), "libvpl.dll" | "libvpld.dll" | "libmfx.dll")
        && !name.contains("libmfx-tracer")
}

#[derive(Default)]
struct Discovered {
    seen: HashSet<String>,
    candidates: Vec<Candidate>,
}

impl Discovered {
    fn add_file(&mut self, path: &Path, priority: Priority) {
        let canonical = match fs::canonicalize(path) {
            Ok(p) => p,
            Err(_) => return,
        };
        if !canonical.is_file() {
            return;
        }
        if !self.seen.insert(dedup_key(&canonical)) {
            return;
        }
        let file_name = path
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or_default()
            .to_string();
        debug!(
            "candidate {} ({}) at {} priority",
            file_name,
            canonical.display(),
            priority
        );
        let order = self.candidates.len();
        self.candidates.push(Candidate {
            path: canonical,
            file_name,
            priority,
            order,
        });
    }

    /// Add every matching module in `dir`. Unreadable directories are
    /// skipped.
    fn scan(&mut self, dir: &Path, priority: Priority) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => return,
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_str().is_some_and(is_candidate_name))
            .map(|e| e.path())
            .collect();
        // read_dir order is filesystem dependent
        files.sort();
        for file in files {
            self.add_file(&file, priority);
        }
    }

    fn add_path(&mut self, path: &Path, priority: Priority) {
        if path.is_dir() {
            self.scan(path, priority);
        } else {
            self.add_file(path, priority);
        }
    }
}

#[cfg(windows)]
fn dedup_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

#[cfg(not(windows))]
fn dedup_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn env_dirs(var: &Option<String>) -> Vec<PathBuf> {
    var.as_deref()
        .and_then(std::env::var_os)
        .map(|value| {
            std::env::split_paths(&value)
                .filter(|p| !p.as_os_str().is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Produce the ordered, deduplicated candidate list for `config`.
///
/// Never fails: missing or unreadable locations contribute nothing.
pub fn discover(config: &SearchConfig) -> Vec<Candidate> {
    let mut found = Discovered::default();

    for path in &config.paths {
        found.add_path(path, Priority::UserDefined);
    }
    for dir in env_dirs(&config.search_path_var) {
        found.scan(&dir, Priority::UserDefined);
    }
    for dir in env_dirs(&config.package_var) {
        found.scan(&dir, Priority::Package);
    }
    for dir in env_dirs(&config.os_path_var) {
        found.scan(&dir, Priority::OsPath);
    }
    for dir in &config.system_dirs {
        found.scan(dir, Priority::SystemDefault);
    }
    if config.dispatch_registry {
        for file in registry::dispatch_libraries() {
            found.add_file(&file, Priority::SystemDefault);
        }
    }
    for dir in &config.legacy_dirs {
        found.scan(dir, Priority::LegacyPackage);
    }

    found.candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[cfg(not(windows))]
    #[test]
    fn test_distribution_dirs_are_legacy() {
        let search = SearchConfig::from_env();
        assert_eq!(search.system_dirs, vec![PathBuf::from(".")]);
        for dir in ["/usr/lib/x86_64-linux-gnu", "/usr/lib", "/usr/lib64"] {
            assert!(search.legacy_dirs.contains(&PathBuf::from(dir)), "{}", dir);
            assert!(!search.system_dirs.contains(&PathBuf::from(dir)), "{}", dir);
        }
    }

    #[cfg(not(windows))]
    #[test]
    fn test_candidate_names() {
        assert!(is_candidate_name("libmfx-gen.so.1.2"));
        assert!(is_candidate_name("libvplswref64.so.1"));
        assert!(is_candidate_name("libmfxhw64.so.1"));
        assert!(!is_candidate_name("libvpl.so.2"));
        assert!(!is_candidate_name("libmfx.so.1"));
        assert!(!is_candidate_name("libmfx-tracer.so.1"));
        assert!(!is_candidate_name("libva.so.2"));
        assert!(!is_candidate_name("libmfx-gen.a"));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_scan_sorts_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["libvplswref64.so.1", "libmfx-gen.so.1.2", "libvpl.so.2", "README"] {
            File::create(dir.path().join(name)).unwrap();
        }
        let search = SearchConfig::new().with_path(dir.path());
        let found = discover(&search);
        let names: Vec<&str> = found.iter().map(|c| c.file_name.as_str()).collect();
        assert_eq!(names, vec!["libmfx-gen.so.1.2", "libvplswref64.so.1"]);
        assert!(found.iter().all(|c| c.priority == Priority::UserDefined));
        assert_eq!(found[1].order, 1);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_dedup_keeps_highest_priority() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("libmfx-gen.so.1.2")).unwrap();
        let search = SearchConfig::new()
            .with_path(dir.path().join("libmfx-gen.so.1.2"))
            .with_system_dirs(vec![dir.path().to_path_buf()]);
        let found = discover(&search);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].priority, Priority::UserDefined);
    }

    #[cfg(unix)]
    #[test]
    fn test_dedup_follows_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let real = dir.path().join("libmfx-gen.so.1.2");
        File::create(&real).unwrap();
        std::os::unix::fs::symlink(&real, other.path().join("libmfx-gen.so.1")).unwrap();
        let search = SearchConfig::new()
            .with_system_dirs(vec![dir.path().to_path_buf()])
            .with_legacy_dirs(vec![other.path().to_path_buf()]);
        let found = discover(&search);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].priority, Priority::SystemDefault);
    }

    #[test]
    fn test_missing_locations_are_skipped() {
        let search = SearchConfig::new()
            .with_path("/nonexistent/vpl/runtime.so")
            .with_system_dirs(vec![PathBuf::from("/nonexistent/vpl/lib")]);
        assert!(discover(&search).is_empty());
    }

    #[test]
    fn test_priority_order() {
        assert!(Priority::UserDefined < Priority::Package);
        assert!(Priority::OsPath < Priority::SystemDefault);
        assert!(Priority::SystemDefault < Priority::LegacyPackage);
        assert_eq!(Priority::OsPath.to_string(), "os-path");
    }
}
