// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Sessions on a selected implementation.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};

use crate::caps::{AccelerationMode, ApiVersion, CapabilityRecord, ImplType};
use crate::error::{FilterError, Status};
use crate::module::{LoadedModule, NativeSession, NativeSurface, SurfaceDomain};
use crate::property::{Special, TypedValue};

/// Parameters passed to the runtime when a session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionParams {
    pub impl_type: ImplType,
    pub acceleration_mode: AccelerationMode,
    pub vendor_impl_id: u32,
    pub api_version: ApiVersion,
    pub num_threads: Option<u32>,
    pub device_copy: Option<u16>,
}

impl SessionParams {
    /// Parameters taken from an implementation's own defaults.
    pub fn for_record(record: &CapabilityRecord) -> Self {
        SessionParams {
            impl_type: record.impl_type,
            acceleration_mode: record.acceleration_mode,
            vendor_impl_id: record.vendor_impl_id,
            api_version: record.api_version,
            num_threads: None,
            device_copy: None,
        }
    }
}

/// Session settings collected from the loader's config objects.
///
/// Most come from reserved property names that never act as filters. The
/// acceleration mode and API version also follow the last matching filter
/// so the session is created with what the caller asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpecialConfig {
    pub handle_type: Option<u32>,
    pub handle: Option<usize>,
    pub acceleration_mode: Option<AccelerationMode>,
    pub api_version: Option<ApiVersion>,
    pub num_threads: Option<u32>,
    pub device_copy: Option<u16>,
}

impl SpecialConfig {
    /// Store a reserved property. The value kind has already been checked.
    pub(crate) fn apply(&mut self, special: Special, value: &TypedValue) -> Result<(), FilterError> {
        match (special, value) {
            (Special::HandleType, TypedValue::U32(v)) => self.handle_type = Some(*v),
            (Special::Handle, TypedValue::Ptr(0)) => {
                return Err(FilterError::InvalidValue("mfxHDL".to_string()))
            }
            (Special::Handle, TypedValue::Ptr(p)) => self.handle = Some(*p),
            (Special::NumThread, TypedValue::U32(v)) => self.num_threads = Some(*v),
            (Special::DeviceCopy, TypedValue::U16(v)) => self.device_copy = Some(*v),
            (special, value) => {
                return Err(FilterError::TypeMismatch {
                    path: format!("{:?}", special),
                    expected: special.accepts(),
                    found: value.kind(),
                })
            }
        }
        Ok(())
    }

    /// Final session parameters for `record`.
    pub fn session_params(&self, record: &CapabilityRecord) -> SessionParams {
        let mut params = SessionParams::for_record(record);
        if let Some(mode) = self.acceleration_mode {
            params.acceleration_mode = mode;
        }
        if let Some(version) = self.api_version {
            params.api_version = version;
        }
        params.num_threads = self.num_threads;
        params.device_copy = self.device_copy;
        params
    }

    /// The device handle to install after creation, when both parts are set.
    pub fn device_handle(&self) -> Option<(u32, usize)> {
        self.handle_type.zip(self.handle)
    }
}

/// An open session on one implementation.
///
/// Keeps its module loaded until the session is closed or dropped, so a
/// session may outlive the loader that created it. Dropping closes the
/// session and logs a failure; use [`Session::close`] to observe it.
pub struct Session {
    module: Arc<LoadedModule>,
    raw: NativeSession,
    open: bool,
    record: Arc<CapabilityRecord>,
    api_version: ApiVersion,
}

impl Session {
    pub(crate) fn new(
        module: Arc<LoadedModule>,
        raw: NativeSession,
        record: Arc<CapabilityRecord>,
        api_version: ApiVersion,
    ) -> Self {
        Session {
            module,
            raw,
            open: true,
            record,
            api_version,
        }
    }

    /// The implementation this session runs on.
    pub fn record(&self) -> &CapabilityRecord {
        &self.record
    }

    /// The API version requested at creation.
    pub fn api_version(&self) -> ApiVersion {
        self.api_version
    }

    pub fn module_path(&self) -> &Path {
        self.module.path()
    }

    /// The runtime's session handle.
    pub fn raw(&self) -> NativeSession {
        self.raw
    }

    pub fn set_handle(&self, handle_type: u32, handle: usize) -> Result<(), Status> {
        self.module.api().set_handle(self.raw, handle_type, handle)
    }

    /// Ask the runtime for a frame surface. Legacy runtimes do not allocate
    /// surfaces and return [`Status::UNSUPPORTED`].
    pub fn acquire_surface(&self, domain: SurfaceDomain) -> Result<NativeSurface, Status> {
        self.module.api().acquire_surface(self.raw, domain)
    }

    /// Close the session and report the runtime's status.
    pub fn close(mut self) -> Result<(), Status> {
        self.open = false;
        debug!("closing session {:#x}", self.raw.0);
        self.module.api().close_session(self.raw)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("raw", &self.raw)
            .field("implementation", &self.record.name)
            .field("module", &self.module.path())
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        if let Err(status) = self.module.api().close_session(self.raw) {
            warn!("closing session {:#x} failed: {}", self.raw.0, status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> CapabilityRecord {
        let mut record = CapabilityRecord::new(ImplType::Hardware, "gpu", ApiVersion::new(2, 9));
        record.acceleration_mode = AccelerationMode::VAAPI;
        record.vendor_impl_id = 2;
        record
    }

    #[test]
    fn test_session_params_defaults() {
        let params = SpecialConfig::default().session_params(&record());
        assert_eq!(params.acceleration_mode, AccelerationMode::VAAPI);
        assert_eq!(params.api_version, ApiVersion::new(2, 9));
        assert_eq!(params.vendor_impl_id, 2);
        assert_eq!(params.num_threads, None);
    }

    #[test]
    fn test_session_params_overrides() {
        let special = SpecialConfig {
            acceleration_mode: Some(AccelerationMode::VAAPI_DRM_RENDER_NODE),
            api_version: Some(ApiVersion::new(2, 4)),
            num_threads: Some(4),
            device_copy: Some(1),
            ..Default::default()
        };
        let params = special.session_params(&record());
        assert_eq!(params.acceleration_mode, AccelerationMode::VAAPI_DRM_RENDER_NODE);
        assert_eq!(params.api_version, ApiVersion::new(2, 4));
        assert_eq!(params.num_threads, Some(4));
        assert_eq!(params.device_copy, Some(1));
    }

    #[test]
    fn test_apply_special() {
        let mut special = SpecialConfig::default();
        special.apply(Special::HandleType, &TypedValue::U32(4)).unwrap();
        assert_eq!(special.device_handle(), None);
        special.apply(Special::Handle, &TypedValue::Ptr(0xdead)).unwrap();
        assert_eq!(special.device_handle(), Some((4, 0xdead)));
        assert!(matches!(
            special.apply(Special::Handle, &TypedValue::Ptr(0)),
            Err(FilterError::InvalidValue(_))
        ));
        // A rejected value leaves the previous one in place
        assert_eq!(special.handle, Some(0xdead));
    }
}
