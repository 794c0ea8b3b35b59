// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

pub type mfxU8 = ::std::os::raw::c_uchar;
pub type mfxU16 = ::std::os::raw::c_ushort;
pub type mfxU32 = ::std::os::raw::c_uint;
pub type mfxI32 = ::std::os::raw::c_int;
pub type mfxU64 = ::std::os::raw::c_ulonglong;
pub type mfxChar = ::std::os::raw::c_char;
pub type mfxHDL = *mut ::std::os::raw::c_void;

pub type mfxStatus = ::std::os::raw::c_int;
pub const mfxStatus_MFX_ERR_NONE: mfxStatus = 0;
pub const mfxStatus_MFX_ERR_UNKNOWN: mfxStatus = -1;
pub const mfxStatus_MFX_ERR_NULL_PTR: mfxStatus = -2;
pub const mfxStatus_MFX_ERR_UNSUPPORTED: mfxStatus = -3;
pub const mfxStatus_MFX_ERR_MEMORY_ALLOC: mfxStatus = -4;
pub const mfxStatus_MFX_ERR_NOT_ENOUGH_BUFFER: mfxStatus = -5;
pub const mfxStatus_MFX_ERR_INVALID_HANDLE: mfxStatus = -6;
pub const mfxStatus_MFX_ERR_LOCK_MEMORY: mfxStatus = -7;
pub const mfxStatus_MFX_ERR_NOT_INITIALIZED: mfxStatus = -8;
pub const mfxStatus_MFX_ERR_NOT_FOUND: mfxStatus = -9;
pub const mfxStatus_MFX_ERR_INVALID_VIDEO_PARAM: mfxStatus = -15;
pub const mfxStatus_MFX_WRN_PARTIAL_ACCELERATION: mfxStatus = 4;

pub type mfxImplType = ::std::os::raw::c_uint;
pub const mfxImplType_MFX_IMPL_TYPE_SOFTWARE: mfxImplType = 1;
pub const mfxImplType_MFX_IMPL_TYPE_HARDWARE: mfxImplType = 2;

pub type mfxAccelerationMode = ::std::os::raw::c_uint;
pub const mfxAccelerationMode_MFX_ACCEL_MODE_NA: mfxAccelerationMode = 0;
pub const mfxAccelerationMode_MFX_ACCEL_MODE_VIA_D3D9: mfxAccelerationMode = 512;
pub const mfxAccelerationMode_MFX_ACCEL_MODE_VIA_D3D11: mfxAccelerationMode = 768;
pub const mfxAccelerationMode_MFX_ACCEL_MODE_VIA_VAAPI: mfxAccelerationMode = 1024;
pub const mfxAccelerationMode_MFX_ACCEL_MODE_VIA_VAAPI_DRM_RENDER_NODE: mfxAccelerationMode =
    1025;
pub const mfxAccelerationMode_MFX_ACCEL_MODE_VIA_VAAPI_DRM_MODESET: mfxAccelerationMode = 1026;
pub const mfxAccelerationMode_MFX_ACCEL_MODE_VIA_VAAPI_GLX: mfxAccelerationMode = 1027;
pub const mfxAccelerationMode_MFX_ACCEL_MODE_VIA_VAAPI_X11: mfxAccelerationMode = 1028;
pub const mfxAccelerationMode_MFX_ACCEL_MODE_VIA_VAAPI_WAYLAND: mfxAccelerationMode = 1029;
pub const mfxAccelerationMode_MFX_ACCEL_MODE_VIA_HDDLUNITE: mfxAccelerationMode = 1280;

pub type mfxImplCapsDeliveryFormat = ::std::os::raw::c_uint;
pub const mfxImplCapsDeliveryFormat_MFX_IMPLCAPS_IMPLDESCSTRUCTURE: mfxImplCapsDeliveryFormat = 1;
pub const mfxImplCapsDeliveryFormat_MFX_IMPLCAPS_IMPLEMENTEDFUNCTIONS: mfxImplCapsDeliveryFormat =
    2;
pub const mfxImplCapsDeliveryFormat_MFX_IMPLCAPS_IMPLPATH: mfxImplCapsDeliveryFormat = 3;

pub type mfxResourceType = ::std::os::raw::c_int;
pub const mfxResourceType_MFX_RESOURCE_SYSTEM_SURFACE: mfxResourceType = 1;
pub const mfxResourceType_MFX_RESOURCE_VA_SURFACE: mfxResourceType = 2;
pub const mfxResourceType_MFX_RESOURCE_VA_BUFFER: mfxResourceType = 3;
pub const mfxResourceType_MFX_RESOURCE_DX9_SURFACE: mfxResourceType = 4;
pub const mfxResourceType_MFX_RESOURCE_DX11_TEXTURE: mfxResourceType = 5;
pub const mfxResourceType_MFX_RESOURCE_DX12_RESOURCE: mfxResourceType = 6;
pub const mfxResourceType_MFX_RESOURCE_DMA_RESOURCE: mfxResourceType = 7;

pub type mfxHandleType = ::std::os::raw::c_uint;
pub const mfxHandleType_MFX_HANDLE_D3D9_DEVICE_MANAGER: mfxHandleType = 1;
pub const mfxHandleType_MFX_HANDLE_D3D11_DEVICE: mfxHandleType = 3;
pub const mfxHandleType_MFX_HANDLE_VA_DISPLAY: mfxHandleType = 4;

pub type mfxIMPL = mfxI32;
pub const MFX_IMPL_AUTO: mfxIMPL = 0;
pub const MFX_IMPL_SOFTWARE: mfxIMPL = 1;
pub const MFX_IMPL_HARDWARE: mfxIMPL = 2;
pub const MFX_IMPL_AUTO_ANY: mfxIMPL = 3;
pub const MFX_IMPL_HARDWARE_ANY: mfxIMPL = 4;
pub const MFX_IMPL_HARDWARE2: mfxIMPL = 5;
pub const MFX_IMPL_HARDWARE3: mfxIMPL = 6;
pub const MFX_IMPL_HARDWARE4: mfxIMPL = 7;
pub const MFX_IMPL_VIA_ANY: mfxIMPL = 256;
pub const MFX_IMPL_VIA_D3D9: mfxIMPL = 512;
pub const MFX_IMPL_VIA_D3D11: mfxIMPL = 768;
pub const MFX_IMPL_VIA_VAAPI: mfxIMPL = 1024;
pub const MFX_IMPL_BASETYPE_MASK: mfxIMPL = 0x00ff;
pub const MFX_IMPL_VIA_MASK: mfxIMPL = 0x0f00;

pub const MFX_STRFIELD_LEN: usize = 128;
pub const MFX_IMPL_NAME_LEN: usize = 32;

pub const MFX_EXTBUFF_THREADS_PARAM: mfxU32 = make_fourcc(b"THDP");

/// Build the little-endian 32-bit code the runtime ABI uses for four
/// character identifiers.
pub const fn make_fourcc(code: &[u8; 4]) -> mfxU32 {
    (code[0] as mfxU32)
        | ((code[1] as mfxU32) << 8)
        | ((code[2] as mfxU32) << 16)
        | ((code[3] as mfxU32) << 24)
}

macro_rules! zeroed_default {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Default for $ty {
                fn default() -> Self {
                    let mut s = ::std::mem::MaybeUninit::<Self>::uninit();
                    unsafe {
                        ::std::ptr::write_bytes(s.as_mut_ptr(), 0, 1);
                        s.assume_init()
                    }
                }
            }
        )*
    };
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct mfxStructVersion {
    pub Minor: mfxU8,
    pub Major: mfxU8,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct mfxVersion {
    pub Minor: mfxU16,
    pub Major: mfxU16,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct mfxRange32U {
    pub Min: mfxU32,
    pub Max: mfxU32,
    pub Step: mfxU32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct mfxDecoderDescription_decoder_decprofile_decmemdesc {
    pub MemHandleType: mfxResourceType,
    pub Width: mfxRange32U,
    pub Height: mfxRange32U,
    pub reserved: [mfxU16; 7usize],
    pub NumColorFormats: mfxU16,
    pub ColorFormats: *mut mfxU32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct mfxDecoderDescription_decoder_decprofile {
    pub Profile: mfxU32,
    pub reserved: [mfxU16; 7usize],
    pub NumMemTypes: mfxU16,
    pub MemDesc: *mut mfxDecoderDescription_decoder_decprofile_decmemdesc,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct mfxDecoderDescription_decoder {
    pub CodecID: mfxU32,
    pub reserved: [mfxU16; 8usize],
    pub MaxcodecLevel: mfxU16,
    pub NumProfiles: mfxU16,
    pub Profiles: *mut mfxDecoderDescription_decoder_decprofile,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct mfxDecoderDescription {
    pub Version: mfxStructVersion,
    pub reserved: [mfxU16; 7usize],
    pub NumCodecs: mfxU16,
    pub Codecs: *mut mfxDecoderDescription_decoder,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct mfxEncoderDescription_encoder_encprofile_encmemdesc {
    pub MemHandleType: mfxResourceType,
    pub Width: mfxRange32U,
    pub Height: mfxRange32U,
    pub reserved: [mfxU16; 7usize],
    pub NumColorFormats: mfxU16,
    pub ColorFormats: *mut mfxU32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct mfxEncoderDescription_encoder_encprofile {
    pub Profile: mfxU32,
    pub reserved: [mfxU16; 7usize],
    pub NumMemTypes: mfxU16,
    pub MemDesc: *mut mfxEncoderDescription_encoder_encprofile_encmemdesc,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct mfxEncoderDescription_encoder {
    pub CodecID: mfxU32,
    pub MaxcodecLevel: mfxU16,
    pub BiDirectionalPrediction: mfxU16,
    pub reserved: [mfxU16; 7usize],
    pub NumProfiles: mfxU16,
    pub Profiles: *mut mfxEncoderDescription_encoder_encprofile,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct mfxEncoderDescription {
    pub Version: mfxStructVersion,
    pub reserved: [mfxU16; 7usize],
    pub NumCodecs: mfxU16,
    pub Codecs: *mut mfxEncoderDescription_encoder,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct mfxVPPDescription_filter_memdesc_format {
    pub InFormat: mfxU32,
    pub reserved: [mfxU16; 5usize],
    pub NumOutFormat: mfxU16,
    pub OutFormats: *mut mfxU32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct mfxVPPDescription_filter_memdesc {
    pub MemHandleType: mfxResourceType,
    pub Width: mfxRange32U,
    pub Height: mfxRange32U,
    pub reserved: [mfxU16; 6usize],
    pub NumInFormats: mfxU16,
    pub Formats: *mut mfxVPPDescription_filter_memdesc_format,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct mfxVPPDescription_filter {
    pub FilterFourCC: mfxU32,
    pub MaxDelayInFrames: mfxU16,
    pub reserved: [mfxU16; 7usize],
    pub NumMemTypes: mfxU16,
    pub MemDesc: *mut mfxVPPDescription_filter_memdesc,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct mfxVPPDescription {
    pub Version: mfxStructVersion,
    pub reserved: [mfxU16; 7usize],
    pub NumFilters: mfxU16,
    pub Filters: *mut mfxVPPDescription_filter,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct mfxDeviceDescription_subdevices {
    pub Index: mfxU32,
    pub SubDeviceID: [mfxChar; MFX_STRFIELD_LEN],
    pub reserved: [mfxU32; 7usize],
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct mfxDeviceDescription {
    pub Version: mfxStructVersion,
    pub reserved: [mfxU16; 6usize],
    pub MediaAdapterType: mfxU16,
    pub DeviceID: [mfxChar; MFX_STRFIELD_LEN],
    pub NumSubDevices: mfxU16,
    pub SubDevices: *mut mfxDeviceDescription_subdevices,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct mfxAccelerationModeDescription {
    pub Version: mfxStructVersion,
    pub reserved: mfxU16,
    pub NumAccelerationModes: mfxU16,
    pub Mode: *mut mfxAccelerationMode,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct mfxExtBuffer {
    pub BufferId: mfxU32,
    pub BufferSz: mfxU32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct mfxImplDescription {
    pub Version: mfxStructVersion,
    pub Impl: mfxImplType,
    pub AccelerationMode: mfxAccelerationMode,
    pub ApiVersion: mfxVersion,
    pub ImplName: [mfxChar; MFX_IMPL_NAME_LEN],
    pub License: [mfxChar; MFX_STRFIELD_LEN],
    pub Keywords: [mfxChar; MFX_STRFIELD_LEN],
    pub VendorID: mfxU32,
    pub VendorImplID: mfxU32,
    pub Dev: mfxDeviceDescription,
    pub Dec: mfxDecoderDescription,
    pub Enc: mfxEncoderDescription,
    pub VPP: mfxVPPDescription,
    pub AccelerationModeDescription: mfxAccelerationModeDescription,
    pub reserved: [mfxU32; 16usize],
    pub NumExtParam: mfxU32,
    pub ExtParam: *mut *mut mfxExtBuffer,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct mfxImplementedFunctions {
    pub NumFunctions: mfxU16,
    pub FunctionsName: *mut *mut mfxChar,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct mfxExtThreadsParam {
    pub Header: mfxExtBuffer,
    pub NumThread: mfxU16,
    pub SchedulingType: mfxI32,
    pub Priority: mfxI32,
    pub reserved: [mfxU16; 55usize],
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct mfxInitializationParam {
    pub AccelerationMode: mfxAccelerationMode,
    pub DeviceCopy: mfxU16,
    pub reserved: [mfxU16; 2usize],
    pub NumExtParam: mfxU16,
    pub ExtParam: *mut *mut mfxExtBuffer,
    pub VendorImplID: mfxU32,
    pub reserved2: [mfxU32; 3usize],
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct mfxInitParam {
    pub Implementation: mfxIMPL,
    pub Version: mfxVersion,
    pub ExternalThreads: mfxU16,
    pub ExtParam: *mut *mut mfxExtBuffer,
    pub NumExtParam: mfxU16,
    pub GPUCopy: mfxU16,
    pub reserved: [mfxU16; 21usize],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct mfxPlatform {
    pub CodeName: mfxU16,
    pub DeviceId: mfxU16,
    pub MediaAdapterType: mfxU16,
    pub reserved: [mfxU16; 13usize],
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct _mfxSession {
    _unused: [u8; 0],
}
pub type mfxSession = *mut _mfxSession;

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct mfxFrameSurface1 {
    _unused: [u8; 0],
}

zeroed_default!(
    mfxDecoderDescription_decoder_decprofile_decmemdesc,
    mfxDecoderDescription_decoder_decprofile,
    mfxDecoderDescription_decoder,
    mfxDecoderDescription,
    mfxEncoderDescription_encoder_encprofile_encmemdesc,
    mfxEncoderDescription_encoder_encprofile,
    mfxEncoderDescription_encoder,
    mfxEncoderDescription,
    mfxVPPDescription_filter_memdesc_format,
    mfxVPPDescription_filter_memdesc,
    mfxVPPDescription_filter,
    mfxVPPDescription,
    mfxDeviceDescription_subdevices,
    mfxDeviceDescription,
    mfxAccelerationModeDescription,
    mfxImplDescription,
    mfxImplementedFunctions,
    mfxExtThreadsParam,
    mfxInitializationParam,
    mfxInitParam,
);

pub struct VplLibrary {
    __library: ::libloading::Library,
    pub MFXQueryImplsDescription: Result<
        unsafe extern "C" fn(format: mfxImplCapsDeliveryFormat, num_impls: *mut mfxU32) -> *mut mfxHDL,
        ::libloading::Error,
    >,
    pub MFXReleaseImplDescription:
        Result<unsafe extern "C" fn(hdl: mfxHDL) -> mfxStatus, ::libloading::Error>,
    pub MFXInitialize: Result<
        unsafe extern "C" fn(par: mfxInitializationParam, session: *mut mfxSession) -> mfxStatus,
        ::libloading::Error,
    >,
    pub MFXMemory_GetSurfaceForVPP: Result<
        unsafe extern "C" fn(session: mfxSession, surface: *mut *mut mfxFrameSurface1) -> mfxStatus,
        ::libloading::Error,
    >,
    pub MFXMemory_GetSurfaceForEncode: Result<
        unsafe extern "C" fn(session: mfxSession, surface: *mut *mut mfxFrameSurface1) -> mfxStatus,
        ::libloading::Error,
    >,
    pub MFXMemory_GetSurfaceForDecode: Result<
        unsafe extern "C" fn(session: mfxSession, surface: *mut *mut mfxFrameSurface1) -> mfxStatus,
        ::libloading::Error,
    >,
    pub MFXInitEx: Result<
        unsafe extern "C" fn(par: mfxInitParam, session: *mut mfxSession) -> mfxStatus,
        ::libloading::Error,
    >,
    pub MFXClose: Result<unsafe extern "C" fn(session: mfxSession) -> mfxStatus, ::libloading::Error>,
    pub MFXQueryVersion: Result<
        unsafe extern "C" fn(session: mfxSession, version: *mut mfxVersion) -> mfxStatus,
        ::libloading::Error,
    >,
    pub MFXQueryIMPL: Result<
        unsafe extern "C" fn(session: mfxSession, impl_: *mut mfxIMPL) -> mfxStatus,
        ::libloading::Error,
    >,
    pub MFXVideoCORE_QueryPlatform: Result<
        unsafe extern "C" fn(session: mfxSession, platform: *mut mfxPlatform) -> mfxStatus,
        ::libloading::Error,
    >,
    pub MFXVideoCORE_SetHandle: Result<
        unsafe extern "C" fn(session: mfxSession, type_: mfxHandleType, hdl: mfxHDL) -> mfxStatus,
        ::libloading::Error,
    >,
}

impl VplLibrary {
    pub unsafe fn new<P>(path: P) -> Result<Self, ::libloading::Error>
    where
        P: AsRef<::std::ffi::OsStr>,
    {
        let library = ::libloading::Library::new(path.as_ref())?;
        Self::from_library(library)
    }

    pub unsafe fn from_library<L>(library: L) -> Result<Self, ::libloading::Error>
    where
        L: Into<::libloading::Library>,
    {
        let __library = library.into();
        let MFXQueryImplsDescription = __library.get(&b"MFXQueryImplsDescription\0"[..]).map(|sym| *sym);
        let MFXReleaseImplDescription =
            __library.get(&b"MFXReleaseImplDescription\0"[..]).map(|sym| *sym);
        let MFXInitialize = __library.get(&b"MFXInitialize\0"[..]).map(|sym| *sym);
        let MFXMemory_GetSurfaceForVPP =
            __library.get(&b"MFXMemory_GetSurfaceForVPP\0"[..]).map(|sym| *sym);
        let MFXMemory_GetSurfaceForEncode =
            __library.get(&b"MFXMemory_GetSurfaceForEncode\0"[..]).map(|sym| *sym);
        let MFXMemory_GetSurfaceForDecode =
            __library.get(&b"MFXMemory_GetSurfaceForDecode\0"[..]).map(|sym| *sym);
        let MFXInitEx = __library.get(&b"MFXInitEx\0"[..]).map(|sym| *sym);
        let MFXClose = __library.get(&b"MFXClose\0"[..]).map(|sym| *sym);
        let MFXQueryVersion = __library.get(&b"MFXQueryVersion\0"[..]).map(|sym| *sym);
        let MFXQueryIMPL = __library.get(&b"MFXQueryIMPL\0"[..]).map(|sym| *sym);
        let MFXVideoCORE_QueryPlatform =
            __library.get(&b"MFXVideoCORE_QueryPlatform\0"[..]).map(|sym| *sym);
        let MFXVideoCORE_SetHandle = __library.get(&b"MFXVideoCORE_SetHandle\0"[..]).map(|sym| *sym);
        Ok(VplLibrary {
            __library,
            MFXQueryImplsDescription,
            MFXReleaseImplDescription,
            MFXInitialize,
            MFXMemory_GetSurfaceForVPP,
            MFXMemory_GetSurfaceForEncode,
            MFXMemory_GetSurfaceForDecode,
            MFXInitEx,
            MFXClose,
            MFXQueryVersion,
            MFXQueryIMPL,
            MFXVideoCORE_QueryPlatform,
            MFXVideoCORE_SetHandle,
        })
    }
}
