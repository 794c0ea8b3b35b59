// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Loaded runtime modules.
//!
//! A module is opened at most once per process. Every loader that selects
//! the same path shares one [`LoadedModule`], and the module is unloaded
//! when the last session, capability batch or loader referencing it goes
//! away. The process-wide table only holds weak references so it never
//! keeps a module alive by itself.
//!
//! All runtime calls go through the [`ModuleApi`] trait. [`NativeOpener`]
//! produces implementations backed by a dynamically loaded library; tests
//! and embedders can supply their own [`ModuleOpener`].

use std::collections::HashMap;
use std::fmt;
use std::mem::ManuallyDrop;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

use log::{debug, info, warn};
use vpldispatch_sys as ffi;

use crate::caps::{ApiVersion, CapabilityRecord, ImplType};
use crate::error::{LoadError, Status};
use crate::session::SessionParams;

pub mod legacy;
pub mod native;

pub use legacy::{LegacyEntryPoints, LegacyInit, LegacyModule};
pub use native::ModernModule;

/// Lowest API version accepted from a modern module.
pub const MODERN_MIN_VERSION: ApiVersion = ApiVersion::new(2, 0);
/// Lowest API version accepted from a legacy module.
pub const LEGACY_MIN_VERSION: ApiVersion = ApiVersion::new(1, 0);

/// Entry points a modern implementation must export, with the API version
/// that introduced each one.
pub const MODERN_ENTRY_POINTS: &[(&str, ApiVersion)] = &[
    ("MFXQueryImplsDescription", ApiVersion::new(2, 0)),
    ("MFXReleaseImplDescription", ApiVersion::new(2, 0)),
    ("MFXMemory_GetSurfaceForVPP", ApiVersion::new(2, 0)),
    ("MFXMemory_GetSurfaceForEncode", ApiVersion::new(2, 0)),
    ("MFXMemory_GetSurfaceForDecode", ApiVersion::new(2, 0)),
    ("MFXInitialize", ApiVersion::new(2, 0)),
    ("MFXMemory_GetSurfaceForVPPOut", ApiVersion::new(2, 1)),
    ("MFXVideoDECODE_VPP_Init", ApiVersion::new(2, 1)),
    ("MFXVideoDECODE_VPP_DecodeFrameAsync", ApiVersion::new(2, 1)),
    ("MFXVideoDECODE_VPP_Reset", ApiVersion::new(2, 1)),
    ("MFXVideoDECODE_VPP_GetChannelParam", ApiVersion::new(2, 1)),
    ("MFXVideoDECODE_VPP_Close", ApiVersion::new(2, 1)),
    ("MFXVideoVPP_ProcessFrameAsync", ApiVersion::new(2, 1)),
    ("MFXClose", ApiVersion::new(1, 0)),
];

/// Entry points a legacy implementation must export.
pub const LEGACY_ENTRY_POINTS: &[(&str, ApiVersion)] = &[
    ("MFXInitEx", ApiVersion::new(1, 14)),
    ("MFXClose", ApiVersion::new(1, 0)),
];

/// ABI generation of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Generation {
    /// Describes itself through the capability query entry points
    Modern,
    /// Predates self-description; probed through throwaway sessions
    Legacy,
}

impl Generation {
    pub fn min_version(self) -> ApiVersion {
        match self {
            Generation::Modern => MODERN_MIN_VERSION,
            Generation::Legacy => LEGACY_MIN_VERSION,
        }
    }

    pub fn entry_points(self) -> &'static [(&'static str, ApiVersion)] {
        match self {
            Generation::Modern => MODERN_ENTRY_POINTS,
            Generation::Legacy => LEGACY_ENTRY_POINTS,
        }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Generation::Modern => f.write_str("modern"),
            Generation::Legacy => f.write_str("legacy"),
        }
    }
}

/// Runtime-owned handle to be passed back on release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle(pub usize);

/// Runtime session handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeSession(pub usize);

/// Runtime-allocated frame surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeSurface(pub usize);

/// Which pipeline stage a surface is allocated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceDomain {
    Decode,
    Encode,
    Vpp,
}

/// The result of a capability query.
///
/// `items` holds one entry per implementation, in the module's order. An
/// entry that could not be decoded carries the reason. `handles` are
/// returned to the module through [`ModuleApi::release`] once no
/// implementation of the batch is referenced anymore.
#[derive(Debug, Default)]
pub struct Query<T> {
    pub items: Vec<Result<T, String>>,
    pub handles: Vec<NativeHandle>,
}

/// Calls into one opened runtime module.
pub trait ModuleApi: Send + Sync {
    fn generation(&self) -> Generation;

    /// Whether the module exports `symbol`.
    fn exports(&self, symbol: &str) -> bool;

    /// Query implementation descriptions.
    fn query_descriptions(&self) -> Result<Query<CapabilityRecord>, LoadError>;

    /// Query implemented-function lists, aligned by index with
    /// [`ModuleApi::query_descriptions`]. `None` when the module cannot
    /// report them.
    fn query_functions(&self) -> Option<Query<Vec<String>>>;

    /// Return query handles to the module.
    fn release(&self, handles: &[NativeHandle]);

    fn create_session(&self, params: &SessionParams) -> Result<NativeSession, Status>;

    fn set_handle(
        &self,
        session: NativeSession,
        handle_type: u32,
        handle: usize,
    ) -> Result<(), Status>;

    fn acquire_surface(
        &self,
        session: NativeSession,
        domain: SurfaceDomain,
    ) -> Result<NativeSurface, Status>;

    fn close_session(&self, session: NativeSession) -> Result<(), Status>;
}

/// Opens a module file.
pub trait ModuleOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn ModuleApi>, LoadError>;
}

/// Opens modules with the OS dynamic loader.
///
/// A module exporting the capability query entry point is treated as
/// modern; anything else is wrapped in the legacy compatibility shim.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeOpener;

impl ModuleOpener for NativeOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn ModuleApi>, LoadError> {
        // SAFETY: loading a library runs its initializers. Candidates are
        // restricted to runtime module names by discovery.
        let lib = unsafe { ffi::VplLibrary::new(path) }.map_err(|source| {
            LoadError::OpenFailed {
                path: path.to_path_buf(),
                source: Arc::new(source),
            }
        })?;

        if lib.MFXQueryImplsDescription.is_ok() {
            Ok(Box::new(ModernModule::new(lib)?))
        } else {
            debug!("{} has no capability query, probing as legacy", path.display());
            Ok(Box::new(LegacyModule::new(lib)?))
        }
    }
}

type ModuleTable = HashMap<PathBuf, (u64, Weak<LoadedModule>)>;

static NEXT_MODULE_ID: AtomicU64 = AtomicU64::new(1);

fn module_table() -> MutexGuard<'static, ModuleTable> {
    static MODULES: OnceLock<Mutex<ModuleTable>> = OnceLock::new();
    MODULES
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// An opened module shared by every loader in the process.
pub struct LoadedModule {
    id: u64,
    path: PathBuf,
    api: ManuallyDrop<Box<dyn ModuleApi>>,
}

impl LoadedModule {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn api(&self) -> &dyn ModuleApi {
        self.api.as_ref()
    }

    pub fn generation(&self) -> Generation {
        self.api.generation()
    }
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("generation", &self.generation())
            .finish()
    }
}

impl Drop for LoadedModule {
    fn drop(&mut self) {
        let mut table = module_table();
        // A replacement may already be registered under the same path
        if table.get(&self.path).map(|(id, _)| *id) == Some(self.id) {
            table.remove(&self.path);
        }
        // SAFETY: api is never touched again. Unloading under the table lock
        // keeps a concurrent open of the same path from racing the unload.
        unsafe { ManuallyDrop::drop(&mut self.api) };
        debug!("unloaded {}", self.path.display());
    }
}

/// Open `path`, or share the module another loader already opened.
pub fn open_shared(path: &Path, opener: &dyn ModuleOpener) -> Result<Arc<LoadedModule>, LoadError> {
    let mut table = module_table();
    if let Some(module) = table.get(path).and_then(|(_, weak)| weak.upgrade()) {
        debug!("sharing loaded module {}", path.display());
        return Ok(module);
    }

    let api = opener.open(path)?;
    let id = NEXT_MODULE_ID.fetch_add(1, Ordering::Relaxed);
    let module = Arc::new(LoadedModule {
        id,
        path: path.to_path_buf(),
        api: ManuallyDrop::new(api),
    });
    table.insert(path.to_path_buf(), (id, Arc::downgrade(&module)));
    info!(
        "loaded {} module {}",
        module.generation(),
        path.display()
    );
    Ok(module)
}

/// Whether `path` is currently loaded in this process.
pub fn is_loaded(path: &Path) -> bool {
    module_table()
        .get(path)
        .is_some_and(|(_, weak)| weak.strong_count() > 0)
}

/// Handles from one capability query. Released to the module exactly once,
/// when the last implementation drawn from the query is dropped.
pub struct CapabilityBatch {
    module: Arc<LoadedModule>,
    handles: Vec<NativeHandle>,
}

impl CapabilityBatch {
    pub fn module(&self) -> &Arc<LoadedModule> {
        &self.module
    }
}

impl fmt::Debug for CapabilityBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityBatch")
            .field("module", &self.module.path)
            .field("handles", &self.handles.len())
            .finish()
    }
}

impl Drop for CapabilityBatch {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            debug!(
                "releasing {} capability handles of {}",
                self.handles.len(),
                self.module.path.display()
            );
            self.module.api().release(&self.handles);
        }
    }
}

/// One validated implementation of a loaded module.
#[derive(Debug, Clone)]
pub struct LoadedImplementation {
    pub module: Arc<LoadedModule>,
    /// Position within the module's own implementation list
    pub local_index: usize,
    pub record: Arc<CapabilityRecord>,
    pub batch: Arc<CapabilityBatch>,
    pub functions: Option<Arc<[String]>>,
    pub functions_batch: Option<Arc<CapabilityBatch>>,
}

impl LoadedImplementation {
    pub fn generation(&self) -> Generation {
        self.module.generation()
    }

    pub fn is_modern_hardware(&self) -> bool {
        self.generation() == Generation::Modern && self.record.impl_type == ImplType::Hardware
    }
}

/// Check the version floor and the exported entry points of one entry.
pub fn validate_entry(
    module: &LoadedModule,
    record: &CapabilityRecord,
) -> Result<(), LoadError> {
    let generation = module.generation();
    let required = generation.min_version();
    if record.api_version < required {
        return Err(LoadError::VersionTooLow {
            found: record.api_version,
            required,
        });
    }

    let missing: Vec<&'static str> = generation
        .entry_points()
        .iter()
        .filter(|(_, since)| *since <= record.api_version)
        .filter(|(name, _)| !module.api().exports(name))
        .map(|(name, _)| *name)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(LoadError::MissingSymbols(missing))
    }
}

/// Open a module and turn its capability query into validated
/// implementations.
///
/// Entries that fail validation are dropped with a warning. When none
/// survive, the first rejection is returned and the module is released.
pub fn load(path: &Path, opener: &dyn ModuleOpener) -> Result<Vec<LoadedImplementation>, LoadError> {
    let module = open_shared(path, opener)?;
    let query = module.api().query_descriptions()?;
    let batch = Arc::new(CapabilityBatch {
        module: module.clone(),
        handles: query.handles,
    });

    let (mut functions, functions_batch) = match module.api().query_functions() {
        Some(q) => {
            let batch = Arc::new(CapabilityBatch {
                module: module.clone(),
                handles: q.handles,
            });
            (q.items.into_iter().map(Some).collect::<Vec<_>>(), Some(batch))
        }
        None => (Vec::new(), None),
    };

    let mut loaded = Vec::new();
    let mut first_error = None;
    for (index, item) in query.items.into_iter().enumerate() {
        let result = item
            .map_err(|reason| LoadError::InvalidDescription {
                index: index as u32,
                reason,
            })
            .and_then(|record| validate_entry(&module, &record).map(|_| record));

        let record = match result {
            Ok(record) => record,
            Err(err) => {
                warn!("{} implementation {}: {}", path.display(), index, err);
                first_error.get_or_insert(err);
                continue;
            }
        };

        let names = match functions.get_mut(index).and_then(Option::take) {
            Some(Ok(names)) => Some(Arc::from(names)),
            Some(Err(reason)) => {
                warn!(
                    "{} implementation {} function list: {}",
                    path.display(),
                    index,
                    reason
                );
                None
            }
            None => None,
        };

        debug!(
            "{} implementation {}: {} {} API {}",
            path.display(),
            index,
            record.name,
            record.impl_type,
            record.api_version
        );
        loaded.push(LoadedImplementation {
            module: module.clone(),
            local_index: index,
            record: Arc::new(record),
            batch: batch.clone(),
            functions_batch: names.as_ref().and(functions_batch.clone()),
            functions: names,
        });
    }

    if loaded.is_empty() {
        return Err(first_error.unwrap_or(LoadError::NoImplementations));
    }
    Ok(loaded)
}
