// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::path::PathBuf;

use log::{debug, trace};
use windows::core::{PCWSTR, PWSTR};
use windows::Win32::Foundation::ERROR_SUCCESS;
use windows::Win32::System::Registry::{
    RegCloseKey, RegEnumKeyExW, RegOpenKeyExW, RegQueryValueExW, HKEY, HKEY_CURRENT_USER,
    HKEY_LOCAL_MACHINE, KEY_READ, REG_DWORD, REG_SZ, REG_VALUE_TYPE,
};

use super::registry::{DispatchEntry, DISPATCH_KEY};

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

struct Key(HKEY);

impl Key {
    fn open(parent: HKEY, name: &[u16]) -> Option<Key> {
        let mut key = HKEY::default();
        // SAFETY: name is NUL terminated and key is a valid out pointer.
        let status = unsafe { RegOpenKeyExW(parent, PCWSTR(name.as_ptr()), 0, KEY_READ, &mut key) };
        (status == ERROR_SUCCESS).then_some(Key(key))
    }

    /// NUL terminated name of the subkey at `index`.
    fn subkey(&self, index: u32) -> Option<Vec<u16>> {
        let mut buf = [0u16; 256];
        let mut len = buf.len() as u32;
        // SAFETY: len holds the buffer capacity in characters.
        let status = unsafe {
            RegEnumKeyExW(
                self.0,
                index,
                PWSTR(buf.as_mut_ptr()),
                &mut len,
                None,
                PWSTR::null(),
                None,
                None,
            )
        };
        if status != ERROR_SUCCESS {
            return None;
        }
        let mut name = buf[..len as usize].to_vec();
        name.push(0);
        Some(name)
    }

    fn dword(&self, value: &str) -> Option<u32> {
        let value = wide(value);
        let mut kind = REG_VALUE_TYPE::default();
        let mut data = 0u32;
        let mut size = std::mem::size_of::<u32>() as u32;
        // SAFETY: data is a u32 and size matches it.
        let status = unsafe {
            RegQueryValueExW(
                self.0,
                PCWSTR(value.as_ptr()),
                None,
                Some(&mut kind as *mut _),
                Some(&mut data as *mut u32 as *mut u8),
                Some(&mut size as *mut _),
            )
        };
        (status == ERROR_SUCCESS && kind == REG_DWORD).then_some(data)
    }

    fn string(&self, value: &str) -> Option<String> {
        let value = wide(value);
        let mut kind = REG_VALUE_TYPE::default();
        let mut buf = [0u16; 1024];
        let mut size = (buf.len() * 2) as u32;
        // SAFETY: size holds the buffer capacity in bytes.
        let status = unsafe {
            RegQueryValueExW(
                self.0,
                PCWSTR(value.as_ptr()),
                None,
                Some(&mut kind as *mut _),
                Some(buf.as_mut_ptr() as *mut u8),
                Some(&mut size as *mut _),
            )
        };
        if status != ERROR_SUCCESS || kind != REG_SZ {
            return None;
        }
        let chars = &buf[..(size as usize / 2).min(buf.len())];
        let end = chars.iter().position(|&c| c == 0).unwrap_or(chars.len());
        Some(String::from_utf16_lossy(&chars[..end]))
    }
}

impl Drop for Key {
    fn drop(&mut self) {
        // SAFETY: the key was opened by RegOpenKeyExW.
        unsafe {
            let _ = RegCloseKey(self.0);
        }
    }
}

fn read_root(root: HKEY, entries: &mut Vec<DispatchEntry>) {
    let Some(dispatch) = Key::open(root, &wide(DISPATCH_KEY)) else {
        return;
    };
    let mut index = 0;
    while let Some(name) = dispatch.subkey(index) {
        index += 1;
        let Some(runtime) = Key::open(dispatch.0, &name) else {
            continue;
        };
        let Some(path) = runtime.string("Path") else {
            trace!("dispatch entry {} has no Path", String::from_utf16_lossy(&name));
            continue;
        };
        let merit = runtime.dword("Merit").unwrap_or(0);
        debug!("registered runtime {} merit {}", path, merit);
        entries.push(DispatchEntry {
            path: PathBuf::from(path),
            merit,
        });
    }
}

/// Registered runtimes under the machine and user hives, in enumeration
/// order.
pub(super) fn read_dispatch_entries() -> Vec<DispatchEntry> {
    let mut entries = Vec::new();
    read_root(HKEY_LOCAL_MACHINE, &mut entries);
    read_root(HKEY_CURRENT_USER, &mut entries);
    entries
}
