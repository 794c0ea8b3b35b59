// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
//
// Four character codes as used by the runtime ABI: always packed
// little-endian into a u32, independent of host byte order.
#![forbid(unsafe_code)]

use core::{fmt, result::Result};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    // Codecs
    pub const AVC: FourCC = FourCC(*b"AVC ");
    pub const HEVC: FourCC = FourCC(*b"HEVC");
    pub const MPEG2: FourCC = FourCC(*b"MPG2");
    pub const VC1: FourCC = FourCC(*b"VC1 ");
    pub const VP8: FourCC = FourCC(*b"VP8 ");
    pub const VP9: FourCC = FourCC(*b"VP9 ");
    pub const AV1: FourCC = FourCC(*b"AV1 ");
    pub const JPEG: FourCC = FourCC(*b"JPEG");

    // Color formats
    pub const NV12: FourCC = FourCC(*b"NV12");
    pub const P010: FourCC = FourCC(*b"P010");
    pub const YUY2: FourCC = FourCC(*b"YUY2");
    pub const I420: FourCC = FourCC(*b"I420");
    pub const AYUV: FourCC = FourCC(*b"AYUV");
    pub const Y210: FourCC = FourCC(*b"Y210");
    pub const Y410: FourCC = FourCC(*b"Y410");
    pub const RGB4: FourCC = FourCC(*b"RGB4");

    // Video processing filters
    pub const VPP_DENOISE: FourCC = FourCC(*b"DNIS");
    pub const VPP_SCALING: FourCC = FourCC(*b"VSCL");
    pub const VPP_DEINTERLACING: FourCC = FourCC(*b"VPDI");
    pub const VPP_PROCAMP: FourCC = FourCC(*b"PAMP");
    pub const VPP_DETAIL: FourCC = FourCC(*b"DET ");
    pub const VPP_FRAME_RATE_CONVERSION: FourCC = FourCC(*b"FRC ");
    pub const VPP_ROTATION: FourCC = FourCC(*b"ROT ");
    pub const VPP_MIRRORING: FourCC = FourCC(*b"MIRR");
    pub const VPP_COMPOSITE: FourCC = FourCC(*b"VCMP");

    pub const fn to_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    pub const fn from_u32(val: u32) -> FourCC {
        FourCC(val.to_le_bytes())
    }
}

impl From<&[u8; 4]> for FourCC {
    fn from(buf: &[u8; 4]) -> FourCC {
        FourCC(*buf)
    }
}

impl From<u32> for FourCC {
    fn from(val: u32) -> FourCC {
        FourCC::from_u32(val)
    }
}

impl From<FourCC> for u32 {
    fn from(val: FourCC) -> Self {
        val.to_u32()
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match core::str::from_utf8(&self.0) {
            Ok(s) => f.write_str(s),
            Err(_) => {
                // fmt::Error would make format!() panic, escape instead
                let b = &self.0;
                f.write_fmt(format_args!(
                    "{}{}{}{}",
                    core::ascii::escape_default(b[0]),
                    core::ascii::escape_default(b[1]),
                    core::ascii::escape_default(b[2]),
                    core::ascii::escape_default(b[3])
                ))
            }
        }
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let b = self.0;
        f.debug_tuple("FourCC")
            .field(&format_args!(
                "{}{}{}{}",
                core::ascii::escape_default(b[0]),
                core::ascii::escape_default(b[1]),
                core::ascii::escape_default(b[2]),
                core::ascii::escape_default(b[3])
            ))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_abi_packing() {
        assert_eq!(FourCC::HEVC.to_u32(), vpldispatch_sys::make_fourcc(b"HEVC"));
        assert_eq!(FourCC::from(0x3231_564e), FourCC::NV12);
        assert_eq!(u32::from(FourCC::AVC), 0x2043_5641);
    }

    #[test]
    fn test_display_escapes_binary() {
        assert_eq!(FourCC::P010.to_string(), "P010");
        assert_eq!(FourCC([0xff, b'A', b'B', b'C']).to_string(), "\\xffABC");
        assert_eq!(format!("{:?}", FourCC::VP9), "FourCC(VP9 )");
    }
}
