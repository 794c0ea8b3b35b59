// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
//
// In-process fake runtimes for dispatcher tests.
//
// A FakeOpener maps module file names to FakeRuntime descriptions. Module
// files are real (empty) files in a temporary directory so discovery
// treats them like installed runtimes; opening them never touches the OS
// loader.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use vpldispatch::caps::{
    profile, DecoderCodec, EncoderCodec, FormatPair, MemoryDescriptor, Profile, VppFilter,
    VppMemoryDescriptor,
};
use vpldispatch::module::{
    Generation, ModuleApi, ModuleOpener, NativeHandle, NativeSession, NativeSurface, Query,
    SurfaceDomain, MODERN_ENTRY_POINTS,
};
use vpldispatch::{
    AccelerationMode, ApiVersion, CapabilityRecord, FourCC, ImplType, LoadError, Range32U,
    ResourceType, SessionParams, Status,
};

/// Event counters shared between a test and its fake runtime.
#[derive(Debug, Default)]
pub struct Counters {
    pub opened: AtomicUsize,
    pub unloaded: AtomicUsize,
    pub released: AtomicUsize,
    pub sessions: AtomicUsize,
    pub closed: AtomicUsize,
    pub params: Mutex<Vec<SessionParams>>,
    pub handles: Mutex<Vec<(u32, usize)>>,
}

impl Counters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// What a fake module reports.
#[derive(Clone)]
pub struct FakeRuntime {
    pub generation: Generation,
    pub records: Vec<CapabilityRecord>,
    pub functions: Option<Vec<Vec<String>>>,
    pub missing_exports: Vec<&'static str>,
    pub fail_set_handle: bool,
    /// Status returned by session creation instead of a session
    pub create_status: Option<Status>,
    pub counters: Arc<Counters>,
}

impl FakeRuntime {
    pub fn modern(records: Vec<CapabilityRecord>) -> Self {
        FakeRuntime {
            generation: Generation::Modern,
            records,
            functions: None,
            missing_exports: Vec::new(),
            fail_set_handle: false,
            create_status: None,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn legacy(record: CapabilityRecord) -> Self {
        FakeRuntime {
            generation: Generation::Legacy,
            ..Self::modern(vec![record])
        }
    }

    pub fn with_functions(mut self, names: &[&str]) -> Self {
        let list: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        self.functions = Some(vec![list; self.records.len()]);
        self
    }

    pub fn without_export(mut self, name: &'static str) -> Self {
        self.missing_exports.push(name);
        self
    }
}

struct FakeModule {
    runtime: FakeRuntime,
}

impl ModuleApi for FakeModule {
    fn generation(&self) -> Generation {
        self.runtime.generation
    }

    fn exports(&self, symbol: &str) -> bool {
        !self.runtime.missing_exports.contains(&symbol)
            && (MODERN_ENTRY_POINTS.iter().any(|(name, _)| *name == symbol)
                || symbol == "MFXInitEx")
    }

    fn query_descriptions(&self) -> Result<Query<CapabilityRecord>, LoadError> {
        let handles = (0..self.runtime.records.len())
            .map(|i| NativeHandle(0x100 + i))
            .collect();
        Ok(Query {
            items: self
                .runtime
                .records
                .iter()
                .map(|record| record.validate().map(|_| record.clone()))
                .collect(),
            handles,
        })
    }

    fn query_functions(&self) -> Option<Query<Vec<String>>> {
        let lists = self.runtime.functions.as_ref()?;
        Some(Query {
            items: lists.iter().cloned().map(Ok).collect(),
            handles: vec![NativeHandle(0x200)],
        })
    }

    fn release(&self, handles: &[NativeHandle]) {
        self.runtime
            .counters
            .released
            .fetch_add(handles.len(), Ordering::SeqCst);
    }

    fn create_session(&self, params: &SessionParams) -> Result<NativeSession, Status> {
        let counters = &self.runtime.counters;
        counters.params.lock().unwrap().push(*params);
        if let Some(status) = self.runtime.create_status {
            return Err(status);
        }
        let n = counters.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(NativeSession(0x5000 + n))
    }

    fn set_handle(
        &self,
        _session: NativeSession,
        handle_type: u32,
        handle: usize,
    ) -> Result<(), Status> {
        if self.runtime.fail_set_handle {
            return Err(Status::INVALID_HANDLE);
        }
        self.runtime
            .counters
            .handles
            .lock()
            .unwrap()
            .push((handle_type, handle));
        Ok(())
    }

    fn acquire_surface(
        &self,
        session: NativeSession,
        _domain: SurfaceDomain,
    ) -> Result<NativeSurface, Status> {
        match self.runtime.generation {
            Generation::Modern => Ok(NativeSurface(session.0 + 0x10)),
            Generation::Legacy => Err(Status::UNSUPPORTED),
        }
    }

    fn close_session(&self, _session: NativeSession) -> Result<(), Status> {
        self.runtime.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for FakeModule {
    fn drop(&mut self) {
        self.runtime.counters.unloaded.fetch_add(1, Ordering::SeqCst);
    }
}

/// Opens fake runtimes by module file name.
#[derive(Clone, Default)]
pub struct FakeOpener {
    runtimes: HashMap<String, FakeRuntime>,
}

impl FakeOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, file_name: &str, runtime: FakeRuntime) -> Self {
        self.runtimes.insert(file_name.to_string(), runtime);
        self
    }
}

impl ModuleOpener for FakeOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn ModuleApi>, LoadError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let runtime = self
            .runtimes
            .get(name)
            .cloned()
            .ok_or(LoadError::NoImplementations)?;
        runtime.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeModule { runtime }))
    }
}

/// A module file name that discovery accepts on this platform.
#[cfg(windows)]
pub fn module_name(stem: &str) -> String {
    format!("libvpl{}.dll", stem)
}

#[cfg(not(windows))]
pub fn module_name(stem: &str) -> String {
    format!("libvpl{}.so.1", stem)
}

/// Create empty module files named after `stems` in `dir`.
pub fn touch_modules(dir: &Path, stems: &[&str]) -> Vec<PathBuf> {
    stems
        .iter()
        .map(|stem| {
            let path = dir.join(module_name(stem));
            File::create(&path).unwrap();
            path
        })
        .collect()
}

pub fn memory(handle_type: ResourceType, max: u32, formats: &[FourCC]) -> MemoryDescriptor {
    MemoryDescriptor {
        handle_type,
        width: Range32U::new(64, max, 16),
        height: Range32U::new(64, max, 16),
        color_formats: formats.to_vec(),
    }
}

pub fn decoder(codec_id: FourCC, profiles: &[u32], max: u32) -> DecoderCodec {
    DecoderCodec {
        codec_id,
        max_level: 51,
        profiles: profiles
            .iter()
            .map(|&p| Profile {
                profile: p,
                memory: vec![memory(ResourceType::VA_SURFACE, max, &[FourCC::NV12])],
            })
            .collect(),
    }
}

pub fn encoder(codec_id: FourCC, profiles: &[u32]) -> EncoderCodec {
    EncoderCodec {
        codec_id,
        max_level: 51,
        bidirectional_prediction: 1,
        profiles: profiles
            .iter()
            .map(|&p| Profile {
                profile: p,
                memory: vec![memory(ResourceType::SYSTEM_SURFACE, 4096, &[FourCC::NV12])],
            })
            .collect(),
    }
}

pub fn scaler() -> VppFilter {
    VppFilter {
        filter_id: FourCC::VPP_SCALING,
        max_delay_in_frames: 0,
        memory: vec![VppMemoryDescriptor {
            handle_type: ResourceType::VA_SURFACE,
            width: Range32U::new(16, 8192, 16),
            height: Range32U::new(16, 8192, 16),
            formats: vec![FormatPair {
                input: FourCC::NV12,
                outputs: vec![FourCC::NV12, FourCC::RGB4],
            }],
        }],
    }
}

/// A hardware implementation with HEVC and AVC decode.
pub fn hardware_record(name: &str) -> CapabilityRecord {
    let mut record = CapabilityRecord::new(ImplType::Hardware, name, ApiVersion::new(2, 9));
    record.acceleration_mode = AccelerationMode::VAAPI;
    record.acceleration_modes = vec![AccelerationMode::VAAPI, AccelerationMode::VAAPI_DRM_RENDER_NODE];
    record.vendor_id = 0x8086;
    record.license = "MIT".to_string();
    record.keywords = "GPU,VAAPI,x64".to_string();
    record.device.device_id = "56a0/0".to_string();
    record.decoders = vec![
        decoder(FourCC::AVC, &[profile::AVC_MAIN, profile::AVC_HIGH], 4096),
        decoder(FourCC::HEVC, &[profile::HEVC_MAIN, profile::HEVC_MAIN10], 8192),
    ];
    record.encoders = vec![encoder(FourCC::HEVC, &[profile::HEVC_MAIN])];
    record.vpp_filters = vec![scaler()];
    record
}

/// A software implementation with AVC decode only.
pub fn software_record(name: &str) -> CapabilityRecord {
    let mut record = CapabilityRecord::new(ImplType::Software, name, ApiVersion::new(2, 9));
    record.license = "MIT".to_string();
    record.keywords = "CPU,reference".to_string();
    record.decoders = vec![decoder(FourCC::AVC, &[profile::AVC_MAIN], 1920)];
    record
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
