// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Capability model.
//!
//! A [`CapabilityRecord`] is the owned, safe form of the description an
//! implementation reports about itself: identity, API version, device, and
//! the decoders, encoders and video processing filters it supports. Records
//! are built once per implementation at load time (see [`marshal`] for the
//! conversion from the runtime ABI) and are immutable afterwards.
//!
//! Nested collections are plain vectors, one level per ABI array:
//!
//! ```text
//! decoder codec -> profile -> memory descriptor -> color format
//! encoder codec -> profile -> memory descriptor -> color format
//! vpp filter    -> memory descriptor -> input format -> output format
//! ```

use std::fmt;

use crate::fourcc::FourCC;
use vpldispatch_sys as ffi;

pub(crate) mod marshal;

/// Implementation type reported by a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum ImplType {
    /// Runs entirely on the CPU
    Software = ffi::mfxImplType_MFX_IMPL_TYPE_SOFTWARE,
    /// Uses a hardware accelerator
    Hardware = ffi::mfxImplType_MFX_IMPL_TYPE_HARDWARE,
}

impl ImplType {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            ffi::mfxImplType_MFX_IMPL_TYPE_SOFTWARE => Some(ImplType::Software),
            ffi::mfxImplType_MFX_IMPL_TYPE_HARDWARE => Some(ImplType::Hardware),
            _ => None,
        }
    }

    pub fn raw(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for ImplType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImplType::Software => write!(f, "software"),
            ImplType::Hardware => write!(f, "hardware"),
        }
    }
}

/// Acceleration mode, the device API an implementation drives.
///
/// Kept open-ended: runtimes may report modes newer than this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccelerationMode(pub u32);

impl AccelerationMode {
    pub const NA: Self = Self(ffi::mfxAccelerationMode_MFX_ACCEL_MODE_NA);
    pub const D3D9: Self = Self(ffi::mfxAccelerationMode_MFX_ACCEL_MODE_VIA_D3D9);
    pub const D3D11: Self = Self(ffi::mfxAccelerationMode_MFX_ACCEL_MODE_VIA_D3D11);
    pub const VAAPI: Self = Self(ffi::mfxAccelerationMode_MFX_ACCEL_MODE_VIA_VAAPI);
    pub const VAAPI_DRM_RENDER_NODE: Self =
        Self(ffi::mfxAccelerationMode_MFX_ACCEL_MODE_VIA_VAAPI_DRM_RENDER_NODE);
    pub const VAAPI_DRM_MODESET: Self =
        Self(ffi::mfxAccelerationMode_MFX_ACCEL_MODE_VIA_VAAPI_DRM_MODESET);
    pub const VAAPI_GLX: Self = Self(ffi::mfxAccelerationMode_MFX_ACCEL_MODE_VIA_VAAPI_GLX);
    pub const VAAPI_X11: Self = Self(ffi::mfxAccelerationMode_MFX_ACCEL_MODE_VIA_VAAPI_X11);
    pub const VAAPI_WAYLAND: Self = Self(ffi::mfxAccelerationMode_MFX_ACCEL_MODE_VIA_VAAPI_WAYLAND);
    pub const HDDLUNITE: Self = Self(ffi::mfxAccelerationMode_MFX_ACCEL_MODE_VIA_HDDLUNITE);
}

/// API version as `major.minor`. Ordering compares major first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ApiVersion {
    pub major: u16,
    pub minor: u16,
}

impl ApiVersion {
    pub const fn new(major: u16, minor: u16) -> Self {
        ApiVersion { major, minor }
    }

    /// Packed form, `major << 16 | minor`.
    pub const fn as_u32(self) -> u32 {
        ((self.major as u32) << 16) | self.minor as u32
    }

    pub const fn from_u32(packed: u32) -> Self {
        ApiVersion {
            major: (packed >> 16) as u16,
            minor: (packed & 0xffff) as u16,
        }
    }
}

impl From<ffi::mfxVersion> for ApiVersion {
    fn from(v: ffi::mfxVersion) -> Self {
        ApiVersion::new(v.Major, v.Minor)
    }
}

impl From<ApiVersion> for ffi::mfxVersion {
    fn from(v: ApiVersion) -> Self {
        ffi::mfxVersion::new(v.major, v.minor)
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Memory handle type of a surface an implementation can work with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceType(pub i32);

impl ResourceType {
    pub const SYSTEM_SURFACE: Self = Self(ffi::mfxResourceType_MFX_RESOURCE_SYSTEM_SURFACE);
    pub const VA_SURFACE: Self = Self(ffi::mfxResourceType_MFX_RESOURCE_VA_SURFACE);
    pub const VA_BUFFER: Self = Self(ffi::mfxResourceType_MFX_RESOURCE_VA_BUFFER);
    pub const DX9_SURFACE: Self = Self(ffi::mfxResourceType_MFX_RESOURCE_DX9_SURFACE);
    pub const DX11_TEXTURE: Self = Self(ffi::mfxResourceType_MFX_RESOURCE_DX11_TEXTURE);
    pub const DX12_RESOURCE: Self = Self(ffi::mfxResourceType_MFX_RESOURCE_DX12_RESOURCE);
    pub const DMA_RESOURCE: Self = Self(ffi::mfxResourceType_MFX_RESOURCE_DMA_RESOURCE);
}

/// Inclusive range with a step, used for supported frame dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Range32U {
    pub min: u32,
    pub max: u32,
    pub step: u32,
}

impl Range32U {
    pub const fn new(min: u32, max: u32, step: u32) -> Self {
        Range32U { min, max, step }
    }

    /// Whether `value` is inside `[min, max]` and reachable from `min` in
    /// whole steps. A zero step accepts any value in bounds.
    pub fn contains(&self, value: u32) -> bool {
        if value < self.min || value > self.max {
            return false;
        }
        self.step == 0 || (value - self.min) % self.step == 0
    }

    /// Whether the two ranges share at least one value, ignoring steps.
    pub fn overlaps(&self, other: &Range32U) -> bool {
        self.min <= other.max && other.min <= self.max
    }
}

impl From<ffi::mfxRange32U> for Range32U {
    fn from(r: ffi::mfxRange32U) -> Self {
        Range32U::new(r.Min, r.Max, r.Step)
    }
}

/// A sub-device of a multi-tile or multi-die accelerator.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubDevice {
    pub index: u32,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceDescription {
    /// Device id string, conventionally the PCI device id in hex,
    /// optionally followed by `/adapter`.
    pub device_id: String,
    pub media_adapter_type: u16,
    pub sub_devices: Vec<SubDevice>,
}

impl DeviceDescription {
    /// Numeric PCI device id parsed from the hex prefix of `device_id`.
    pub fn pci_id(&self) -> Option<u16> {
        let hex = self.device_id.split('/').next()?;
        u16::from_str_radix(hex.trim(), 16).ok()
    }
}

/// Memory descriptor of a codec profile.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemoryDescriptor {
    pub handle_type: ResourceType,
    pub width: Range32U,
    pub height: Range32U,
    pub color_formats: Vec<FourCC>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Profile {
    pub profile: u32,
    pub memory: Vec<MemoryDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecoderCodec {
    pub codec_id: FourCC,
    pub max_level: u16,
    pub profiles: Vec<Profile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EncoderCodec {
    pub codec_id: FourCC,
    pub max_level: u16,
    pub bidirectional_prediction: u16,
    pub profiles: Vec<Profile>,
}

/// One input format of a video processing filter and the output formats it
/// can be converted to.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FormatPair {
    pub input: FourCC,
    pub outputs: Vec<FourCC>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VppMemoryDescriptor {
    pub handle_type: ResourceType,
    pub width: Range32U,
    pub height: Range32U,
    pub formats: Vec<FormatPair>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VppFilter {
    pub filter_id: FourCC,
    pub max_delay_in_frames: u16,
    pub memory: Vec<VppMemoryDescriptor>,
}

/// Everything one implementation declares about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CapabilityRecord {
    pub impl_type: ImplType,
    /// Default acceleration mode
    pub acceleration_mode: AccelerationMode,
    /// Every acceleration mode the implementation accepts, in preference order
    pub acceleration_modes: Vec<AccelerationMode>,
    pub api_version: ApiVersion,
    pub name: String,
    pub license: String,
    pub keywords: String,
    pub vendor_id: u32,
    pub vendor_impl_id: u32,
    pub device: DeviceDescription,
    pub decoders: Vec<DecoderCodec>,
    pub encoders: Vec<EncoderCodec>,
    pub vpp_filters: Vec<VppFilter>,
}

impl CapabilityRecord {
    /// A record with identity fields set and every collection empty.
    pub fn new(impl_type: ImplType, name: impl Into<String>, api_version: ApiVersion) -> Self {
        CapabilityRecord {
            impl_type,
            acceleration_mode: AccelerationMode::NA,
            acceleration_modes: Vec::new(),
            api_version,
            name: name.into(),
            license: String::new(),
            keywords: String::new(),
            vendor_id: 0,
            vendor_impl_id: 0,
            device: DeviceDescription::default(),
            decoders: Vec::new(),
            encoders: Vec::new(),
            vpp_filters: Vec::new(),
        }
    }

    /// Whether the implementation accepts `mode`, either as its default or
    /// among its listed modes.
    pub fn supports_acceleration_mode(&self, mode: AccelerationMode) -> bool {
        self.acceleration_mode == mode || self.acceleration_modes.contains(&mode)
    }

    /// Check the structural invariants: every codec has at least one
    /// profile, every profile and every processing filter has at least one
    /// memory descriptor.
    pub fn validate(&self) -> Result<(), String> {
        for codec in &self.decoders {
            check_profiles("decoder", codec.codec_id, &codec.profiles)?;
        }
        for codec in &self.encoders {
            check_profiles("encoder", codec.codec_id, &codec.profiles)?;
        }
        for filter in &self.vpp_filters {
            if filter.memory.is_empty() {
                return Err(format!(
                    "vpp filter {} has no memory descriptors",
                    filter.filter_id
                ));
            }
        }
        Ok(())
    }
}

fn check_profiles(kind: &str, codec: FourCC, profiles: &[Profile]) -> Result<(), String> {
    if profiles.is_empty() {
        return Err(format!("{} {} has no profiles", kind, codec));
    }
    for profile in profiles {
        if profile.memory.is_empty() {
            return Err(format!(
                "{} {} profile {} has no memory descriptors",
                kind, codec, profile.profile
            ));
        }
    }
    Ok(())
}

/// Well-known codec profile identifiers.
pub mod profile {
    pub const AVC_BASELINE: u32 = 66;
    pub const AVC_MAIN: u32 = 77;
    pub const AVC_HIGH: u32 = 100;
    pub const HEVC_MAIN: u32 = 1;
    pub const HEVC_MAIN10: u32 = 2;
    pub const HEVC_MAINSP: u32 = 3;
    pub const HEVC_REXT: u32 = 4;
    pub const MPEG2_SIMPLE: u32 = 0x50;
    pub const MPEG2_MAIN: u32 = 0x40;
    pub const MPEG2_HIGH: u32 = 0x10;
    pub const JPEG_BASELINE: u32 = 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> MemoryDescriptor {
        MemoryDescriptor {
            handle_type: ResourceType::SYSTEM_SURFACE,
            width: Range32U::new(64, 4096, 8),
            height: Range32U::new(64, 4096, 8),
            color_formats: vec![FourCC::NV12],
        }
    }

    #[test]
    fn test_range_contains_bounds_and_step() {
        let r = Range32U::new(64, 4096, 8);
        assert!(r.contains(64));
        assert!(r.contains(1920));
        assert!(r.contains(4096));
        assert!(!r.contains(63));
        assert!(!r.contains(4097));
        assert!(!r.contains(65));
    }

    #[test]
    fn test_range_zero_step() {
        let r = Range32U::new(16, 32, 0);
        assert!(r.contains(17));
        assert!(!r.contains(33));
    }

    #[test]
    fn test_range_overlap() {
        let r = Range32U::new(64, 4096, 8);
        assert!(r.overlaps(&Range32U::new(4096, 8192, 1)));
        assert!(r.overlaps(&Range32U::new(0, 64, 1)));
        assert!(!r.overlaps(&Range32U::new(4097, 8192, 1)));
    }

    #[test]
    fn test_api_version_order_and_packing() {
        assert!(ApiVersion::new(1, 35) < ApiVersion::new(2, 0));
        assert!(ApiVersion::new(2, 10) > ApiVersion::new(2, 9));
        let v = ApiVersion::new(2, 9);
        assert_eq!(ApiVersion::from_u32(v.as_u32()), v);
        assert_eq!(v.to_string(), "2.9");
    }

    #[test]
    fn test_pci_id() {
        let mut dev = DeviceDescription {
            device_id: "9a49/0".to_string(),
            ..Default::default()
        };
        assert_eq!(dev.pci_id(), Some(0x9a49));
        dev.device_id = "not a number".to_string();
        assert_eq!(dev.pci_id(), None);
    }

    #[test]
    fn test_validate_rejects_empty_profiles() {
        let mut record = CapabilityRecord::new(ImplType::Software, "cpu", ApiVersion::new(2, 9));
        record.decoders.push(DecoderCodec {
            codec_id: FourCC::HEVC,
            max_level: 0,
            profiles: vec![],
        });
        assert!(record.validate().is_err());

        record.decoders[0].profiles.push(Profile {
            profile: profile::HEVC_MAIN,
            memory: vec![],
        });
        assert!(record.validate().is_err());

        record.decoders[0].profiles[0].memory.push(memory());
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_vpp_without_memory() {
        let mut record = CapabilityRecord::new(ImplType::Hardware, "gpu", ApiVersion::new(2, 9));
        record.vpp_filters.push(VppFilter {
            filter_id: FourCC::VPP_SCALING,
            max_delay_in_frames: 0,
            memory: vec![],
        });
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_impl_type_raw() {
        assert_eq!(ImplType::from_raw(2), Some(ImplType::Hardware));
        assert_eq!(ImplType::from_raw(7), None);
        assert_eq!(ImplType::Software.raw(), 1);
    }
}
