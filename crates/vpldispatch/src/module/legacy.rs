// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Compatibility shim for runtimes that predate capability queries.
//!
//! A legacy runtime cannot describe itself, so the shim opens throwaway
//! sessions to find out which adapter and acceleration modes it accepts,
//! asks the session for the API version and device, and reports a fixed
//! capability set for everything else.

use std::ptr;

use log::{debug, trace, warn};
use vpldispatch_sys as ffi;

use super::{Generation, ModuleApi, NativeHandle, NativeSession, NativeSurface, Query, SurfaceDomain};
use crate::caps::{
    profile, AccelerationMode, ApiVersion, CapabilityRecord, DecoderCodec, DeviceDescription,
    EncoderCodec, FormatPair, ImplType, MemoryDescriptor, Profile, Range32U, ResourceType,
    VppFilter, VppMemoryDescriptor,
};
use crate::error::{LoadError, Status};
use crate::fourcc::FourCC;
use crate::session::SessionParams;

/// Name reported for every legacy implementation.
pub const LEGACY_IMPL_NAME: &str = "MSDK RT (compatibility mode)";
const LEGACY_LICENSE: &str = "MIT";
#[cfg(target_pointer_width = "64")]
const LEGACY_KEYWORDS: &str = "MSDK,x64";
#[cfg(not(target_pointer_width = "64"))]
const LEGACY_KEYWORDS: &str = "MSDK,x86";
const INTEL_VENDOR_ID: u32 = 0x8086;

/// First API version reporting the device through the platform query.
const PLATFORM_QUERY_VERSION: ApiVersion = ApiVersion::new(1, 19);

/// Hardware adapter selectors in vendor implementation id order.
const HW_ADAPTERS: [ffi::mfxIMPL; 4] = [
    ffi::MFX_IMPL_HARDWARE,
    ffi::MFX_IMPL_HARDWARE2,
    ffi::MFX_IMPL_HARDWARE3,
    ffi::MFX_IMPL_HARDWARE4,
];

#[cfg(windows)]
const PLATFORM_MODES: &[AccelerationMode] = &[AccelerationMode::D3D11, AccelerationMode::D3D9];
#[cfg(not(windows))]
const PLATFORM_MODES: &[AccelerationMode] = &[AccelerationMode::VAAPI];

/// Functions every legacy runtime implements.
pub const LEGACY_FUNCTIONS: &[&str] = &[
    "MFXInit",
    "MFXClose",
    "MFXQueryIMPL",
    "MFXQueryVersion",
    "MFXJoinSession",
    "MFXDisjoinSession",
    "MFXCloneSession",
    "MFXSetPriority",
    "MFXGetPriority",
    "MFXInitEx",
    "MFXVideoCORE_SetFrameAllocator",
    "MFXVideoCORE_SetHandle",
    "MFXVideoCORE_GetHandle",
    "MFXVideoCORE_SyncOperation",
    "MFXVideoENCODE_Query",
    "MFXVideoENCODE_QueryIOSurf",
    "MFXVideoENCODE_Init",
    "MFXVideoENCODE_Reset",
    "MFXVideoENCODE_Close",
    "MFXVideoENCODE_GetVideoParam",
    "MFXVideoENCODE_GetEncodeStat",
    "MFXVideoENCODE_EncodeFrameAsync",
    "MFXVideoDECODE_Query",
    "MFXVideoDECODE_DecodeHeader",
    "MFXVideoDECODE_QueryIOSurf",
    "MFXVideoDECODE_Init",
    "MFXVideoDECODE_Reset",
    "MFXVideoDECODE_Close",
    "MFXVideoDECODE_GetVideoParam",
    "MFXVideoDECODE_GetDecodeStat",
    "MFXVideoDECODE_SetSkipMode",
    "MFXVideoDECODE_GetPayload",
    "MFXVideoDECODE_DecodeFrameAsync",
    "MFXVideoVPP_Query",
    "MFXVideoVPP_QueryIOSurf",
    "MFXVideoVPP_Init",
    "MFXVideoVPP_Reset",
    "MFXVideoVPP_Close",
    "MFXVideoVPP_GetVideoParam",
    "MFXVideoVPP_GetVPPStat",
    "MFXVideoVPP_RunFrameVPPAsync",
    "MFXVideoCORE_QueryPlatform",
];

/// Session creation parameters in legacy terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyInit {
    /// Adapter selector combined with an acceleration selector
    pub implementation: i32,
    pub version: ApiVersion,
    pub gpu_copy: u16,
    pub num_threads: Option<u16>,
}

/// The legacy entry points the shim calls.
pub trait LegacyEntryPoints: Send + Sync {
    fn exports(&self, symbol: &str) -> bool;
    fn init(&self, init: &LegacyInit) -> Result<NativeSession, Status>;
    fn close(&self, session: NativeSession) -> Result<(), Status>;
    fn query_version(&self, session: NativeSession) -> Result<ApiVersion, Status>;
    fn query_impl(&self, session: NativeSession) -> Result<i32, Status>;
    /// PCI device id of the session's adapter.
    fn query_platform(&self, session: NativeSession) -> Result<u16, Status>;
    fn set_handle(
        &self,
        session: NativeSession,
        handle_type: u32,
        handle: usize,
    ) -> Result<(), Status>;
}

/// Legacy acceleration selector for an acceleration mode.
pub fn via_for_mode(mode: AccelerationMode) -> ffi::mfxIMPL {
    match mode {
        AccelerationMode::D3D9 => ffi::MFX_IMPL_VIA_D3D9,
        AccelerationMode::D3D11 => ffi::MFX_IMPL_VIA_D3D11,
        AccelerationMode::VAAPI
        | AccelerationMode::VAAPI_DRM_RENDER_NODE
        | AccelerationMode::VAAPI_DRM_MODESET
        | AccelerationMode::VAAPI_GLX
        | AccelerationMode::VAAPI_X11
        | AccelerationMode::VAAPI_WAYLAND => ffi::MFX_IMPL_VIA_VAAPI,
        _ => ffi::MFX_IMPL_VIA_ANY,
    }
}

/// Legacy implementation selector for the session parameters of an entry.
pub fn implementation_for(params: &SessionParams) -> ffi::mfxIMPL {
    match params.impl_type {
        ImplType::Software => ffi::MFX_IMPL_SOFTWARE,
        ImplType::Hardware => {
            let adapter = HW_ADAPTERS
                .get(params.vendor_impl_id as usize)
                .copied()
                .unwrap_or(ffi::MFX_IMPL_HARDWARE_ANY);
            adapter | via_for_mode(params.acceleration_mode)
        }
    }
}

/// A probe session, closed when dropped.
struct ProbeSession<'a, E: LegacyEntryPoints + ?Sized> {
    entry: &'a E,
    session: NativeSession,
}

impl<'a, E: LegacyEntryPoints + ?Sized> ProbeSession<'a, E> {
    fn open(entry: &'a E, implementation: ffi::mfxIMPL) -> Result<Self, Status> {
        let init = LegacyInit {
            implementation,
            version: super::LEGACY_MIN_VERSION,
            gpu_copy: 0,
            num_threads: None,
        };
        let session = entry.init(&init)?;
        trace!("probe session {:#x} opened with {:#x}", session.0, implementation);
        Ok(ProbeSession { entry, session })
    }
}

impl<E: LegacyEntryPoints + ?Sized> Drop for ProbeSession<'_, E> {
    fn drop(&mut self) {
        if let Err(status) = self.entry.close(self.session) {
            warn!("closing probe session failed: {}", status);
        }
    }
}

/// Describe a legacy runtime by opening probe sessions.
///
/// Hardware adapters are tried first, each with every acceleration mode of
/// the platform; the first adapter that accepts any mode is reported. A
/// software session is the fallback. Every probe session is closed before
/// this returns.
pub fn probe<E: LegacyEntryPoints + ?Sized>(entry: &E) -> Result<CapabilityRecord, LoadError> {
    let mut last = Status::UNSUPPORTED;

    for (vendor_impl_id, &adapter) in HW_ADAPTERS.iter().enumerate() {
        let mut modes = Vec::new();
        let mut first = None;
        for &mode in PLATFORM_MODES {
            match ProbeSession::open(entry, adapter | via_for_mode(mode)) {
                Ok(session) => {
                    modes.push(mode);
                    if first.is_none() {
                        first = Some(session);
                    }
                }
                Err(status) => last = status,
            }
        }
        if let Some(session) = first {
            return describe(entry, &session, ImplType::Hardware, vendor_impl_id as u32, modes);
        }
    }

    match ProbeSession::open(entry, ffi::MFX_IMPL_SOFTWARE) {
        Ok(session) => describe(entry, &session, ImplType::Software, 0, Vec::new()),
        Err(status) => {
            debug!("software probe failed: {}", status);
            trace!("last hardware probe status: {}", last);
            Err(LoadError::ProbeFailed(status))
        }
    }
}

fn describe<E: LegacyEntryPoints + ?Sized>(
    entry: &E,
    session: &ProbeSession<'_, E>,
    impl_type: ImplType,
    vendor_impl_id: u32,
    modes: Vec<AccelerationMode>,
) -> Result<CapabilityRecord, LoadError> {
    let version = entry
        .query_version(session.session)
        .map_err(LoadError::ProbeFailed)?;
    match entry.query_impl(session.session) {
        Ok(implementation) => trace!("probe session implementation {:#x}", implementation),
        Err(status) => trace!("MFXQueryIMPL failed: {}", status),
    }

    let mut device = DeviceDescription::default();
    if impl_type == ImplType::Hardware && version >= PLATFORM_QUERY_VERSION {
        match entry.query_platform(session.session) {
            Ok(device_id) => device.device_id = format!("{:04x}/{}", device_id, vendor_impl_id),
            Err(status) => debug!("platform query failed: {}", status),
        }
    }

    let mut record = CapabilityRecord::new(impl_type, LEGACY_IMPL_NAME, version);
    record.acceleration_mode = modes.first().copied().unwrap_or(AccelerationMode::NA);
    record.acceleration_modes = modes;
    record.license = LEGACY_LICENSE.to_string();
    record.keywords = LEGACY_KEYWORDS.to_string();
    record.vendor_id = INTEL_VENDOR_ID;
    record.vendor_impl_id = vendor_impl_id;
    record.device = device;
    record.decoders = legacy_decoders(impl_type);
    record.encoders = legacy_encoders(impl_type);
    record.vpp_filters = legacy_vpp(impl_type);

    debug!(
        "legacy {} runtime API {} modes {:?}",
        impl_type, record.api_version, record.acceleration_modes
    );
    Ok(record)
}

fn memory_type(impl_type: ImplType) -> ResourceType {
    match impl_type {
        ImplType::Software => ResourceType::SYSTEM_SURFACE,
        #[cfg(windows)]
        ImplType::Hardware => ResourceType::DX11_TEXTURE,
        #[cfg(not(windows))]
        ImplType::Hardware => ResourceType::VA_SURFACE,
    }
}

const SIZE_RANGE: Range32U = Range32U::new(16, 16384, 16);

fn codec_memory(impl_type: ImplType) -> Vec<MemoryDescriptor> {
    vec![MemoryDescriptor {
        handle_type: memory_type(impl_type),
        width: SIZE_RANGE,
        height: SIZE_RANGE,
        color_formats: vec![FourCC::NV12, FourCC::P010],
    }]
}

fn profiles(impl_type: ImplType, ids: &[u32]) -> Vec<Profile> {
    ids.iter()
        .map(|&profile| Profile {
            profile,
            memory: codec_memory(impl_type),
        })
        .collect()
}

const LEGACY_CODECS: [(FourCC, u16, &[u32]); 4] = [
    (
        FourCC::AVC,
        51,
        &[profile::AVC_BASELINE, profile::AVC_MAIN, profile::AVC_HIGH],
    ),
    (
        FourCC::HEVC,
        186,
        &[profile::HEVC_MAIN, profile::HEVC_MAIN10],
    ),
    (
        FourCC::MPEG2,
        8,
        &[profile::MPEG2_SIMPLE, profile::MPEG2_MAIN, profile::MPEG2_HIGH],
    ),
    (FourCC::JPEG, 0, &[profile::JPEG_BASELINE]),
];

fn legacy_decoders(impl_type: ImplType) -> Vec<DecoderCodec> {
    LEGACY_CODECS
        .iter()
        .map(|&(codec_id, max_level, ids)| DecoderCodec {
            codec_id,
            max_level,
            profiles: profiles(impl_type, ids),
        })
        .collect()
}

fn legacy_encoders(impl_type: ImplType) -> Vec<EncoderCodec> {
    LEGACY_CODECS
        .iter()
        .map(|&(codec_id, max_level, ids)| EncoderCodec {
            codec_id,
            max_level,
            bidirectional_prediction: u16::from(codec_id != FourCC::JPEG),
            profiles: profiles(impl_type, ids),
        })
        .collect()
}

fn legacy_vpp(impl_type: ImplType) -> Vec<VppFilter> {
    let memory = vec![VppMemoryDescriptor {
        handle_type: memory_type(impl_type),
        width: SIZE_RANGE,
        height: SIZE_RANGE,
        formats: vec![
            FormatPair {
                input: FourCC::NV12,
                outputs: vec![FourCC::NV12, FourCC::RGB4],
            },
            FormatPair {
                input: FourCC::P010,
                outputs: vec![FourCC::P010, FourCC::NV12],
            },
            FormatPair {
                input: FourCC::YUY2,
                outputs: vec![FourCC::NV12],
            },
        ],
    }];
    [
        FourCC::VPP_SCALING,
        FourCC::VPP_DENOISE,
        FourCC::VPP_DEINTERLACING,
        FourCC::VPP_PROCAMP,
        FourCC::VPP_FRAME_RATE_CONVERSION,
    ]
    .into_iter()
    .map(|filter_id| VppFilter {
        filter_id,
        max_delay_in_frames: 0,
        memory: memory.clone(),
    })
    .collect()
}

/// A legacy runtime wrapped to look like a modern one.
pub struct LegacyModule<E: LegacyEntryPoints> {
    entry: E,
    record: CapabilityRecord,
}

impl<E: LegacyEntryPoints> LegacyModule<E> {
    /// Probe the runtime. Fails when an entry point needed for sessions is
    /// missing or no probe session opens.
    pub fn new(entry: E) -> Result<Self, LoadError> {
        let missing: Vec<&'static str> = ["MFXInitEx", "MFXClose"]
            .into_iter()
            .filter(|name| !entry.exports(name))
            .collect();
        if !missing.is_empty() {
            return Err(LoadError::MissingSymbols(missing));
        }
        let record = probe(&entry)?;
        Ok(LegacyModule { entry, record })
    }

    pub fn record(&self) -> &CapabilityRecord {
        &self.record
    }
}

impl<E: LegacyEntryPoints> ModuleApi for LegacyModule<E> {
    fn generation(&self) -> Generation {
        Generation::Legacy
    }

    fn exports(&self, symbol: &str) -> bool {
        self.entry.exports(symbol)
    }

    fn query_descriptions(&self) -> Result<Query<CapabilityRecord>, LoadError> {
        Ok(Query {
            items: vec![Ok(self.record.clone())],
            handles: Vec::new(),
        })
    }

    fn query_functions(&self) -> Option<Query<Vec<String>>> {
        Some(Query {
            items: vec![Ok(LEGACY_FUNCTIONS.iter().map(|f| f.to_string()).collect())],
            handles: Vec::new(),
        })
    }

    fn release(&self, _handles: &[NativeHandle]) {}

    fn create_session(&self, params: &SessionParams) -> Result<NativeSession, Status> {
        let init = LegacyInit {
            implementation: implementation_for(params),
            version: params.api_version,
            gpu_copy: params.device_copy.unwrap_or(0),
            num_threads: params.num_threads.map(|n| n as u16),
        };
        self.entry.init(&init)
    }

    fn set_handle(
        &self,
        session: NativeSession,
        handle_type: u32,
        handle: usize,
    ) -> Result<(), Status> {
        self.entry.set_handle(session, handle_type, handle)
    }

    fn acquire_surface(
        &self,
        _session: NativeSession,
        _domain: SurfaceDomain,
    ) -> Result<NativeSurface, Status> {
        Err(Status::UNSUPPORTED)
    }

    fn close_session(&self, session: NativeSession) -> Result<(), Status> {
        self.entry.close(session)
    }
}

fn session_ptr(session: NativeSession) -> ffi::mfxSession {
    session.0 as ffi::mfxSession
}

impl LegacyEntryPoints for ffi::VplLibrary {
    fn exports(&self, symbol: &str) -> bool {
        ffi::VplLibrary::exports(self, symbol)
    }

    fn init(&self, init: &LegacyInit) -> Result<NativeSession, Status> {
        let init_ex = *self.MFXInitEx.as_ref().map_err(|_| Status::UNSUPPORTED)?;

        let mut threads = ffi::mfxExtThreadsParam::default();
        threads.Header.BufferId = ffi::MFX_EXTBUFF_THREADS_PARAM;
        threads.Header.BufferSz = std::mem::size_of::<ffi::mfxExtThreadsParam>() as ffi::mfxU32;
        let mut ext = [&mut threads as *mut ffi::mfxExtThreadsParam as *mut ffi::mfxExtBuffer];

        let mut par = ffi::mfxInitParam {
            Implementation: init.implementation,
            Version: init.version.into(),
            GPUCopy: init.gpu_copy,
            ..Default::default()
        };
        if let Some(num_threads) = init.num_threads {
            threads.NumThread = num_threads;
            par.NumExtParam = 1;
            par.ExtParam = ext.as_mut_ptr();
        }

        let mut session: ffi::mfxSession = ptr::null_mut();
        // SAFETY: par and the extension buffer outlive the call.
        let status = unsafe { init_ex(par, &mut session) };
        if let Err(status) = Status::require(status) {
            if !session.is_null() {
                let _ = self.close(NativeSession(session as usize));
            }
            return Err(status);
        }
        if session.is_null() {
            return Err(Status::NULL_PTR);
        }
        Ok(NativeSession(session as usize))
    }

    fn close(&self, session: NativeSession) -> Result<(), Status> {
        let close = *self.MFXClose.as_ref().map_err(|_| Status::UNSUPPORTED)?;
        // SAFETY: session is open and not used after this call.
        Status::check(unsafe { close(session_ptr(session)) })
    }

    fn query_version(&self, session: NativeSession) -> Result<ApiVersion, Status> {
        let query = *self.MFXQueryVersion.as_ref().map_err(|_| Status::UNSUPPORTED)?;
        let mut version = ffi::mfxVersion::default();
        // SAFETY: session is open and version is a valid out pointer.
        Status::check(unsafe { query(session_ptr(session), &mut version) })?;
        Ok(version.into())
    }

    fn query_impl(&self, session: NativeSession) -> Result<i32, Status> {
        let query = *self.MFXQueryIMPL.as_ref().map_err(|_| Status::UNSUPPORTED)?;
        let mut implementation: ffi::mfxIMPL = 0;
        // SAFETY: session is open and implementation is a valid out pointer.
        Status::check(unsafe { query(session_ptr(session), &mut implementation) })?;
        Ok(implementation)
    }

    fn query_platform(&self, session: NativeSession) -> Result<u16, Status> {
        let query = *self
            .MFXVideoCORE_QueryPlatform
            .as_ref()
            .map_err(|_| Status::UNSUPPORTED)?;
        let mut platform = ffi::mfxPlatform::default();
        // SAFETY: session is open and platform is a valid out pointer.
        Status::check(unsafe { query(session_ptr(session), &mut platform) })?;
        Ok(platform.DeviceId)
    }

    fn set_handle(
        &self,
        session: NativeSession,
        handle_type: u32,
        handle: usize,
    ) -> Result<(), Status> {
        let set = *self
            .MFXVideoCORE_SetHandle
            .as_ref()
            .map_err(|_| Status::UNSUPPORTED)?;
        // SAFETY: session came from MFXInitEx; the handle is passed through.
        Status::require(unsafe { set(session_ptr(session), handle_type, handle as ffi::mfxHDL) })
    }
}
