// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Modules that describe themselves through the capability query entry
//! points.

use std::ptr;

use log::{trace, warn};
use vpldispatch_sys as ffi;

use super::{Generation, ModuleApi, NativeHandle, NativeSession, NativeSurface, Query, SurfaceDomain};
use crate::caps::marshal::{functions_from_raw, record_from_raw};
use crate::caps::CapabilityRecord;
use crate::error::{LoadError, Status};
use crate::session::SessionParams;

/// A modern runtime module.
pub struct ModernModule {
    lib: ffi::VplLibrary,
}

impl ModernModule {
    /// Wrap an opened library. The entry points needed to query, release and
    /// open sessions must resolve; version dependent entry points are
    /// checked per implementation.
    pub fn new(lib: ffi::VplLibrary) -> Result<Self, LoadError> {
        let mut missing = Vec::new();
        if lib.MFXQueryImplsDescription.is_err() {
            missing.push("MFXQueryImplsDescription");
        }
        if lib.MFXReleaseImplDescription.is_err() {
            missing.push("MFXReleaseImplDescription");
        }
        if lib.MFXInitialize.is_err() {
            missing.push("MFXInitialize");
        }
        if lib.MFXClose.is_err() {
            missing.push("MFXClose");
        }
        if !missing.is_empty() {
            return Err(LoadError::MissingSymbols(missing));
        }
        Ok(ModernModule { lib })
    }

    /// Call the capability query for `format` and copy out the handle array.
    fn query_handles(&self, format: ffi::mfxImplCapsDeliveryFormat) -> Option<Vec<ffi::mfxHDL>> {
        let query = *self.lib.MFXQueryImplsDescription.as_ref().ok()?;
        let mut count: ffi::mfxU32 = 0;
        // SAFETY: count is a valid out pointer; the runtime owns the array.
        let array = unsafe { query(format, &mut count) };
        if array.is_null() {
            return None;
        }
        // SAFETY: the runtime returned `count` handles at `array`.
        let handles = unsafe { std::slice::from_raw_parts(array, count as usize) };
        Some(handles.to_vec())
    }

    fn session_ptr(session: NativeSession) -> ffi::mfxSession {
        session.0 as ffi::mfxSession
    }
}

impl ModuleApi for ModernModule {
    fn generation(&self) -> Generation {
        Generation::Modern
    }

    fn exports(&self, symbol: &str) -> bool {
        self.lib.exports(symbol)
    }

    fn query_descriptions(&self) -> Result<Query<CapabilityRecord>, LoadError> {
        let handles = self
            .query_handles(ffi::mfxImplCapsDeliveryFormat_MFX_IMPLCAPS_IMPLDESCSTRUCTURE)
            .ok_or(LoadError::QueryFailed(Status::NOT_FOUND))?;

        let items = handles
            .iter()
            .map(|&hdl| {
                if hdl.is_null() {
                    return Err("null implementation description".to_string());
                }
                // SAFETY: a non-null handle from this query points to a
                // description owned by the runtime until it is released.
                unsafe { record_from_raw(&*(hdl as *const ffi::mfxImplDescription)) }
            })
            .collect();

        Ok(Query {
            items,
            handles: handles.into_iter().map(|h| NativeHandle(h as usize)).collect(),
        })
    }

    fn query_functions(&self) -> Option<Query<Vec<String>>> {
        let handles =
            self.query_handles(ffi::mfxImplCapsDeliveryFormat_MFX_IMPLCAPS_IMPLEMENTEDFUNCTIONS)?;
        let items = handles
            .iter()
            .map(|&hdl| {
                if hdl.is_null() {
                    return Err("null function list".to_string());
                }
                // SAFETY: as for descriptions.
                unsafe { functions_from_raw(&*(hdl as *const ffi::mfxImplementedFunctions)) }
            })
            .collect();
        Some(Query {
            items,
            handles: handles.into_iter().map(|h| NativeHandle(h as usize)).collect(),
        })
    }

    fn release(&self, handles: &[NativeHandle]) {
        let Ok(&release) = self.lib.MFXReleaseImplDescription.as_ref() else {
            return;
        };
        for handle in handles {
            // SAFETY: each handle came from MFXQueryImplsDescription and is released once.
            let status = unsafe { release(handle.0 as ffi::mfxHDL) };
            if let Err(status) = Status::check(status) {
                warn!("MFXReleaseImplDescription failed: {}", status);
            }
        }
    }

    fn create_session(&self, params: &SessionParams) -> Result<NativeSession, Status> {
        let initialize = *self
            .lib
            .MFXInitialize
            .as_ref()
            .map_err(|_| Status::UNSUPPORTED)?;

        let mut threads = ffi::mfxExtThreadsParam::default();
        threads.Header.BufferId = ffi::MFX_EXTBUFF_THREADS_PARAM;
        threads.Header.BufferSz = std::mem::size_of::<ffi::mfxExtThreadsParam>() as ffi::mfxU32;
        let mut ext = [&mut threads as *mut ffi::mfxExtThreadsParam as *mut ffi::mfxExtBuffer];

        let mut par = ffi::mfxInitializationParam {
            AccelerationMode: params.acceleration_mode.0,
            VendorImplID: params.vendor_impl_id,
            DeviceCopy: params.device_copy.unwrap_or(0),
            ..Default::default()
        };
        if let Some(num_threads) = params.num_threads {
            threads.NumThread = num_threads as ffi::mfxU16;
            par.NumExtParam = 1;
            par.ExtParam = ext.as_mut_ptr();
        }

        let mut session: ffi::mfxSession = ptr::null_mut();
        // SAFETY: par and the extension buffer outlive the call.
        let status = unsafe { initialize(par, &mut session) };
        if let Err(status) = Status::require(status) {
            if !session.is_null() {
                let _ = self.close_session(NativeSession(session as usize));
            }
            return Err(status);
        }
        if session.is_null() {
            return Err(Status::NULL_PTR);
        }
        trace!("MFXInitialize -> {:p}", session);
        Ok(NativeSession(session as usize))
    }

    fn set_handle(
        &self,
        session: NativeSession,
        handle_type: u32,
        handle: usize,
    ) -> Result<(), Status> {
        let set = *self
            .lib
            .MFXVideoCORE_SetHandle
            .as_ref()
            .map_err(|_| Status::UNSUPPORTED)?;
        // SAFETY: session came from MFXInitialize; the handle is passed through.
        Status::require(unsafe {
            set(Self::session_ptr(session), handle_type, handle as ffi::mfxHDL)
        })
    }

    fn acquire_surface(
        &self,
        session: NativeSession,
        domain: SurfaceDomain,
    ) -> Result<NativeSurface, Status> {
        let get = *match domain {
            SurfaceDomain::Decode => self.lib.MFXMemory_GetSurfaceForDecode.as_ref(),
            SurfaceDomain::Encode => self.lib.MFXMemory_GetSurfaceForEncode.as_ref(),
            SurfaceDomain::Vpp => self.lib.MFXMemory_GetSurfaceForVPP.as_ref(),
        }
        .map_err(|_| Status::UNSUPPORTED)?;

        let mut surface: *mut ffi::mfxFrameSurface1 = ptr::null_mut();
        // SAFETY: session is open and surface is a valid out pointer.
        Status::check(unsafe { get(Self::session_ptr(session), &mut surface) })?;
        if surface.is_null() {
            return Err(Status::NULL_PTR);
        }
        Ok(NativeSurface(surface as usize))
    }

    fn close_session(&self, session: NativeSession) -> Result<(), Status> {
        let close = *self.lib.MFXClose.as_ref().map_err(|_| Status::UNSUPPORTED)?;
        // SAFETY: session is open and not used after this call.
        Status::check(unsafe { close(Self::session_ptr(session)) })
    }
}
