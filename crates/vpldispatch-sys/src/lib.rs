// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(clippy::type_complexity)]
#![allow(clippy::missing_safety_doc)]
#![allow(clippy::too_many_arguments)]

include!("ffi.rs");

// Re-export libloading for error handling
pub use libloading;

impl VplLibrary {
    /// Check whether the module exports `name` without adding it to the
    /// resolved entry-point table.
    ///
    /// `name` must not contain interior NUL bytes; libloading appends the
    /// terminator when it is missing.
    pub fn exports(&self, name: &str) -> bool {
        unsafe {
            self.__library
                .get::<unsafe extern "C" fn()>(name.as_bytes())
                .is_ok()
        }
    }
}

impl mfxVersion {
    pub const fn new(major: mfxU16, minor: mfxU16) -> Self {
        mfxVersion {
            Minor: minor,
            Major: major,
        }
    }

    /// Packed form used by version comparisons in the runtime ABI.
    pub const fn version(&self) -> mfxU32 {
        ((self.Major as mfxU32) << 16) | self.Minor as mfxU32
    }
}

/// Decode a fixed-size, NUL-padded character field.
///
/// Bytes after the first NUL are ignored; a field without a NUL uses its
/// full length. Invalid UTF-8 is replaced rather than rejected.
pub fn fixed_str(field: &[mfxChar]) -> String {
    let bytes: Vec<u8> = field
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Encode `value` into a fixed-size character field, truncating so the
/// last byte is always NUL.
pub fn write_fixed_str(field: &mut [mfxChar], value: &str) {
    field.iter_mut().for_each(|c| *c = 0);
    let limit = field.len().saturating_sub(1);
    for (dst, src) in field.iter_mut().zip(value.bytes().take(limit)) {
        *dst = src as mfxChar;
    }
}
