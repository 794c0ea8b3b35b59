// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
//
// Environment Tests
//
// Discovery through environment variables. These tests modify the process
// environment and run serially.
//
// RUN:
//   cargo test --test environment

mod common;

use std::env;
use std::ffi::OsString;

use serial_test::serial;
use vpldispatch::discovery::{discover, SEARCH_PATH_VAR};
use vpldispatch::{DeliveryFormat, Loader, Priority, SearchConfig};

use common::{
    hardware_record, init_logger, module_name, software_record, touch_modules, FakeOpener,
    FakeRuntime,
};

/// Restores an environment variable when dropped.
struct EnvGuard {
    name: &'static str,
    previous: Option<OsString>,
}

impl EnvGuard {
    fn set(name: &'static str, value: impl Into<OsString>) -> Self {
        let previous = env::var_os(name);
        env::set_var(name, value.into());
        EnvGuard { name, previous }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(value) => env::set_var(self.name, value),
            None => env::remove_var(self.name),
        }
    }
}

fn join(dirs: &[&std::path::Path]) -> OsString {
    env::join_paths(dirs).unwrap()
}

#[test]
#[serial]
fn test_search_path_variable() {
    init_logger();
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    touch_modules(first.path(), &["one"]);
    touch_modules(second.path(), &["two"]);
    let _guard = EnvGuard::set(SEARCH_PATH_VAR, join(&[second.path(), first.path()]));

    let search = SearchConfig::new().with_search_path_var(Some(SEARCH_PATH_VAR));
    let candidates = discover(&search);
    let files: Vec<&str> = candidates.iter().map(|c| c.file_name.as_str()).collect();
    assert_eq!(files, vec![module_name("two"), module_name("one")]);
    assert!(candidates
        .iter()
        .all(|c| c.priority == Priority::UserDefined));
}

#[test]
#[serial]
fn test_environment_priorities() {
    let user = tempfile::tempdir().unwrap();
    let package = tempfile::tempdir().unwrap();
    let os = tempfile::tempdir().unwrap();
    touch_modules(user.path(), &["user"]);
    touch_modules(package.path(), &["pkg"]);
    touch_modules(os.path(), &["os"]);

    let _search = EnvGuard::set("VPLDISPATCH_TEST_SEARCH", user.path());
    let _package = EnvGuard::set("VPLDISPATCH_TEST_PACKAGE", package.path());
    // The OS path may list the same directory more than once
    let _os = EnvGuard::set("VPLDISPATCH_TEST_OS", join(&[os.path(), os.path(), user.path()]));

    let search = SearchConfig::new()
        .with_search_path_var(Some("VPLDISPATCH_TEST_SEARCH"))
        .with_package_var(Some("VPLDISPATCH_TEST_PACKAGE"))
        .with_os_path_var(Some("VPLDISPATCH_TEST_OS"));
    let found: Vec<(String, Priority)> = discover(&search)
        .into_iter()
        .map(|c| (c.file_name, c.priority))
        .collect();
    assert_eq!(
        found,
        vec![
            (module_name("user"), Priority::UserDefined),
            (module_name("pkg"), Priority::Package),
            (module_name("os"), Priority::OsPath),
        ]
    );
}

#[test]
#[serial]
fn test_loader_follows_search_path() {
    let dir = tempfile::tempdir().unwrap();
    touch_modules(dir.path(), &["gpu", "swref"]);
    let _guard = EnvGuard::set(SEARCH_PATH_VAR, dir.path());

    let opener = FakeOpener::new()
        .with(&module_name("gpu"), FakeRuntime::modern(vec![hardware_record("gpu")]))
        .with(&module_name("swref"), FakeRuntime::modern(vec![software_record("swref")]));
    let search = SearchConfig::new().with_search_path_var(Some(SEARCH_PATH_VAR));
    let mut loader = Loader::with_opener(search, opener);

    assert_eq!(loader.implementation_count(), 2);
    let caps = loader.enumerate(1, DeliveryFormat::ImplPath).unwrap();
    assert_eq!(
        caps.path().unwrap().file_name().unwrap().to_str().unwrap(),
        module_name("swref")
    );
}

#[test]
#[serial]
fn test_unset_variables_are_ignored() {
    env::remove_var("VPLDISPATCH_TEST_UNSET");
    let search = SearchConfig::new()
        .with_search_path_var(Some("VPLDISPATCH_TEST_UNSET"))
        .with_package_var(None)
        .with_os_path_var(None);
    assert!(discover(&search).is_empty());
}

#[cfg(feature = "serde")]
#[test]
fn test_description_serializes() {
    let record = hardware_record("gpu");
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["name"], "gpu");

    let back: vpldispatch::CapabilityRecord = serde_json::from_value(json).unwrap();
    assert_eq!(back, record);

    let format = serde_json::to_string(&DeliveryFormat::ImplPath).unwrap();
    assert_eq!(format, "\"ImplPath\"");
}
