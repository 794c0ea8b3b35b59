// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Conversion from runtime ABI descriptions to the owned capability model.
//!
//! This is the only place that walks raw count/pointer pairs. Everything is
//! copied out, so the native description can be released independently of
//! the resulting [`CapabilityRecord`].

use std::ffi::CStr;

use super::{
    AccelerationMode, ApiVersion, CapabilityRecord, DecoderCodec, DeviceDescription,
    EncoderCodec, FormatPair, ImplType, MemoryDescriptor, Profile, Range32U, ResourceType,
    SubDevice, VppFilter, VppMemoryDescriptor,
};
use crate::fourcc::FourCC;
use vpldispatch_sys as ffi;

/// Borrow `len` elements at `ptr`, rejecting a null pointer with a nonzero
/// count.
///
/// # Safety
///
/// When `len > 0` and `ptr` is non-null, `ptr` must point to `len`
/// initialized elements that outlive `'a`.
unsafe fn array<'a, T>(ptr: *const T, len: usize, what: &str) -> Result<&'a [T], String> {
    if len == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(format!("{} reports {} entries but no array", what, len));
    }
    Ok(unsafe { std::slice::from_raw_parts(ptr, len) })
}

fn fourccs(codes: &[u32]) -> Vec<FourCC> {
    codes.iter().copied().map(FourCC::from_u32).collect()
}

/// Copy a native implementation description into a [`CapabilityRecord`]
/// and check its invariants.
///
/// # Safety
///
/// Every count/pointer pair reachable from `raw` must describe valid,
/// initialized memory for the duration of the call.
pub(crate) unsafe fn record_from_raw(
    raw: &ffi::mfxImplDescription,
) -> Result<CapabilityRecord, String> {
    let impl_type = ImplType::from_raw(raw.Impl)
        .ok_or_else(|| format!("unknown implementation type {}", raw.Impl))?;

    let modes = unsafe {
        array(
            raw.AccelerationModeDescription.Mode,
            raw.AccelerationModeDescription.NumAccelerationModes as usize,
            "acceleration mode list",
        )?
    };

    let record = CapabilityRecord {
        impl_type,
        acceleration_mode: AccelerationMode(raw.AccelerationMode),
        acceleration_modes: modes.iter().copied().map(AccelerationMode).collect(),
        api_version: ApiVersion::from(raw.ApiVersion),
        name: ffi::fixed_str(&raw.ImplName),
        license: ffi::fixed_str(&raw.License),
        keywords: ffi::fixed_str(&raw.Keywords),
        vendor_id: raw.VendorID,
        vendor_impl_id: raw.VendorImplID,
        device: unsafe { device(&raw.Dev)? },
        decoders: unsafe { decoders(&raw.Dec)? },
        encoders: unsafe { encoders(&raw.Enc)? },
        vpp_filters: unsafe { vpp(&raw.VPP)? },
    };
    record.validate()?;
    Ok(record)
}

unsafe fn device(raw: &ffi::mfxDeviceDescription) -> Result<DeviceDescription, String> {
    let subs = unsafe {
        array(
            raw.SubDevices,
            raw.NumSubDevices as usize,
            "sub-device list",
        )?
    };
    Ok(DeviceDescription {
        device_id: ffi::fixed_str(&raw.DeviceID),
        media_adapter_type: raw.MediaAdapterType,
        sub_devices: subs
            .iter()
            .map(|s| SubDevice {
                index: s.Index,
                id: ffi::fixed_str(&s.SubDeviceID),
            })
            .collect(),
    })
}

unsafe fn decoders(raw: &ffi::mfxDecoderDescription) -> Result<Vec<DecoderCodec>, String> {
    let codecs = unsafe { array(raw.Codecs, raw.NumCodecs as usize, "decoder list")? };
    let mut out = Vec::with_capacity(codecs.len());
    for codec in codecs {
        let raw_profiles =
            unsafe { array(codec.Profiles, codec.NumProfiles as usize, "decoder profiles")? };
        let mut profiles = Vec::with_capacity(raw_profiles.len());
        for p in raw_profiles {
            let mems = unsafe { array(p.MemDesc, p.NumMemTypes as usize, "decoder memory")? };
            let mut memory = Vec::with_capacity(mems.len());
            for m in mems {
                let colors = unsafe {
                    array(
                        m.ColorFormats,
                        m.NumColorFormats as usize,
                        "decoder color formats",
                    )?
                };
                memory.push(MemoryDescriptor {
                    handle_type: ResourceType(m.MemHandleType),
                    width: Range32U::from(m.Width),
                    height: Range32U::from(m.Height),
                    color_formats: fourccs(colors),
                });
            }
            profiles.push(Profile {
                profile: p.Profile,
                memory,
            });
        }
        out.push(DecoderCodec {
            codec_id: FourCC::from_u32(codec.CodecID),
            max_level: codec.MaxcodecLevel,
            profiles,
        });
    }
    Ok(out)
}

unsafe fn encoders(raw: &ffi::mfxEncoderDescription) -> Result<Vec<EncoderCodec>, String> {
    let codecs = unsafe { array(raw.Codecs, raw.NumCodecs as usize, "encoder list")? };
    let mut out = Vec::with_capacity(codecs.len());
    for codec in codecs {
        let raw_profiles =
            unsafe { array(codec.Profiles, codec.NumProfiles as usize, "encoder profiles")? };
        let mut profiles = Vec::with_capacity(raw_profiles.len());
        for p in raw_profiles {
            let mems = unsafe { array(p.MemDesc, p.NumMemTypes as usize, "encoder memory")? };
            let mut memory = Vec::with_capacity(mems.len());
            for m in mems {
                let colors = unsafe {
                    array(
                        m.ColorFormats,
                        m.NumColorFormats as usize,
                        "encoder color formats",
                    )?
                };
                memory.push(MemoryDescriptor {
                    handle_type: ResourceType(m.MemHandleType),
                    width: Range32U::from(m.Width),
                    height: Range32U::from(m.Height),
                    color_formats: fourccs(colors),
                });
            }
            profiles.push(Profile {
                profile: p.Profile,
                memory,
            });
        }
        out.push(EncoderCodec {
            codec_id: FourCC::from_u32(codec.CodecID),
            max_level: codec.MaxcodecLevel,
            bidirectional_prediction: codec.BiDirectionalPrediction,
            profiles,
        });
    }
    Ok(out)
}

unsafe fn vpp(raw: &ffi::mfxVPPDescription) -> Result<Vec<VppFilter>, String> {
    let filters = unsafe { array(raw.Filters, raw.NumFilters as usize, "vpp filter list")? };
    let mut out = Vec::with_capacity(filters.len());
    for filter in filters {
        let mems = unsafe { array(filter.MemDesc, filter.NumMemTypes as usize, "vpp memory")? };
        let mut memory = Vec::with_capacity(mems.len());
        for m in mems {
            let raw_formats =
                unsafe { array(m.Formats, m.NumInFormats as usize, "vpp input formats")? };
            let mut formats = Vec::with_capacity(raw_formats.len());
            for f in raw_formats {
                let outputs = unsafe {
                    array(f.OutFormats, f.NumOutFormat as usize, "vpp output formats")?
                };
                formats.push(FormatPair {
                    input: FourCC::from_u32(f.InFormat),
                    outputs: fourccs(outputs),
                });
            }
            memory.push(VppMemoryDescriptor {
                handle_type: ResourceType(m.MemHandleType),
                width: Range32U::from(m.Width),
                height: Range32U::from(m.Height),
                formats,
            });
        }
        out.push(VppFilter {
            filter_id: FourCC::from_u32(filter.FilterFourCC),
            max_delay_in_frames: filter.MaxDelayInFrames,
            memory,
        });
    }
    Ok(out)
}

/// Copy a native implemented-functions list.
///
/// # Safety
///
/// `raw.FunctionsName` must point to `raw.NumFunctions` pointers, each null
/// or a valid NUL-terminated string.
pub(crate) unsafe fn functions_from_raw(
    raw: &ffi::mfxImplementedFunctions,
) -> Result<Vec<String>, String> {
    let names = unsafe {
        array(
            raw.FunctionsName as *const *mut ffi::mfxChar,
            raw.NumFunctions as usize,
            "function list",
        )?
    };
    names
        .iter()
        .map(|&name| {
            if name.is_null() {
                Err("function list contains a null name".to_string())
            } else {
                Ok(unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caps::profile;
    use std::ffi::CString;

    #[test]
    fn test_record_from_raw_copies_nested_arrays() {
        let mut colors = [FourCC::NV12.to_u32(), FourCC::P010.to_u32()];
        let mut mem = [ffi::mfxDecoderDescription_decoder_decprofile_decmemdesc {
            MemHandleType: ffi::mfxResourceType_MFX_RESOURCE_SYSTEM_SURFACE,
            Width: ffi::mfxRange32U {
                Min: 64,
                Max: 4096,
                Step: 8,
            },
            Height: ffi::mfxRange32U {
                Min: 64,
                Max: 2304,
                Step: 8,
            },
            NumColorFormats: 2,
            ColorFormats: colors.as_mut_ptr(),
            ..Default::default()
        }];
        let mut profiles = [ffi::mfxDecoderDescription_decoder_decprofile {
            Profile: profile::HEVC_MAIN10,
            NumMemTypes: 1,
            MemDesc: mem.as_mut_ptr(),
            ..Default::default()
        }];
        let mut codecs = [ffi::mfxDecoderDescription_decoder {
            CodecID: FourCC::HEVC.to_u32(),
            MaxcodecLevel: 51,
            NumProfiles: 1,
            Profiles: profiles.as_mut_ptr(),
            ..Default::default()
        }];
        let mut modes = [
            ffi::mfxAccelerationMode_MFX_ACCEL_MODE_VIA_VAAPI,
            ffi::mfxAccelerationMode_MFX_ACCEL_MODE_VIA_VAAPI_DRM_RENDER_NODE,
        ];

        let mut raw = ffi::mfxImplDescription {
            Impl: ffi::mfxImplType_MFX_IMPL_TYPE_HARDWARE,
            AccelerationMode: ffi::mfxAccelerationMode_MFX_ACCEL_MODE_VIA_VAAPI,
            ApiVersion: ffi::mfxVersion::new(2, 9),
            VendorID: 0x8086,
            ..Default::default()
        };
        ffi::write_fixed_str(&mut raw.ImplName, "mfx-gen");
        ffi::write_fixed_str(&mut raw.License, "MIT");
        ffi::write_fixed_str(&mut raw.Dev.DeviceID, "56a0/0");
        raw.Dec.NumCodecs = 1;
        raw.Dec.Codecs = codecs.as_mut_ptr();
        raw.AccelerationModeDescription.NumAccelerationModes = 2;
        raw.AccelerationModeDescription.Mode = modes.as_mut_ptr();

        let record = unsafe { record_from_raw(&raw) }.unwrap();
        assert_eq!(record.impl_type, ImplType::Hardware);
        assert_eq!(record.name, "mfx-gen");
        assert_eq!(record.api_version, ApiVersion::new(2, 9));
        assert_eq!(record.device.pci_id(), Some(0x56a0));
        assert_eq!(record.acceleration_modes.len(), 2);
        assert_eq!(record.decoders.len(), 1);
        let dec = &record.decoders[0];
        assert_eq!(dec.codec_id, FourCC::HEVC);
        assert_eq!(dec.profiles[0].profile, profile::HEVC_MAIN10);
        assert_eq!(dec.profiles[0].memory[0].height, Range32U::new(64, 2304, 8));
        assert_eq!(
            dec.profiles[0].memory[0].color_formats,
            vec![FourCC::NV12, FourCC::P010]
        );
    }

    #[test]
    fn test_record_from_raw_rejects_codec_without_profiles() {
        let mut codecs = [ffi::mfxDecoderDescription_decoder {
            CodecID: FourCC::AVC.to_u32(),
            ..Default::default()
        }];
        let mut raw = ffi::mfxImplDescription {
            Impl: ffi::mfxImplType_MFX_IMPL_TYPE_SOFTWARE,
            ..Default::default()
        };
        raw.Dec.NumCodecs = 1;
        raw.Dec.Codecs = codecs.as_mut_ptr();

        let err = unsafe { record_from_raw(&raw) }.unwrap_err();
        assert!(err.contains("no profiles"), "{}", err);
    }

    #[test]
    fn test_record_from_raw_rejects_null_array() {
        let mut raw = ffi::mfxImplDescription {
            Impl: ffi::mfxImplType_MFX_IMPL_TYPE_SOFTWARE,
            ..Default::default()
        };
        raw.Enc.NumCodecs = 3;
        assert!(unsafe { record_from_raw(&raw) }.is_err());
    }

    #[test]
    fn test_record_from_raw_rejects_unknown_impl() {
        let raw = ffi::mfxImplDescription {
            Impl: 9,
            ..Default::default()
        };
        assert!(unsafe { record_from_raw(&raw) }.is_err());
    }

    #[test]
    fn test_functions_from_raw() {
        let names = [CString::new("MFXInitialize").unwrap(), CString::new("MFXClose").unwrap()];
        let mut ptrs: Vec<*mut ffi::mfxChar> =
            names.iter().map(|n| n.as_ptr() as *mut ffi::mfxChar).collect();
        let raw = ffi::mfxImplementedFunctions {
            NumFunctions: 2,
            FunctionsName: ptrs.as_mut_ptr(),
        };
        let funcs = unsafe { functions_from_raw(&raw) }.unwrap();
        assert_eq!(funcs, vec!["MFXInitialize", "MFXClose"]);
    }
}
