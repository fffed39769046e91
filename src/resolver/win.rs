
use std::mem::size_of;

use anyhow::Result;
use tracing::{info, warn};
use windows::{
    core::{PCWSTR, PWSTR},
    Win32::{
        Foundation::ERROR_NO_MORE_ITEMS,
        System::Registry::{
            RegCloseKey, RegEnumKeyExW, RegOpenKeyExW, RegQueryValueExW, HKEY,
            HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_READ, REG_EXPAND_SZ, REG_SZ,
            REG_VALUE_TYPE,
        },
    },
};

use super::{InstalledEntry, SoftwareIndex};

const UNINSTALL_SUBKEY: &str = r"SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall";
const WOW64_UNINSTALL_SUBKEY: &str =
    r"SOFTWARE\WOW6432Node\Microsoft\Windows\CurrentVersion\Uninstall";

/// Walks every uninstall-information root the OS keeps. Unreadable roots or
/// entries leave the index partial, which is expected.
pub fn build_index() -> SoftwareIndex {
    let mut index = SoftwareIndex::empty();

    let roots = [
        (HKEY_LOCAL_MACHINE, UNINSTALL_SUBKEY),
        (HKEY_LOCAL_MACHINE, WOW64_UNINSTALL_SUBKEY),
        (HKEY_CURRENT_USER, UNINSTALL_SUBKEY),
    ];
    for (root, subkey) in roots {
        if let Err(e) = walk_uninstall_root(&mut index, root, subkey) {
            warn!("Skipping uninstall root {subkey}: {e:?}");
        }
    }

    info!("Software index maps {} executables", index.len());
    index
}

fn walk_uninstall_root(index: &mut SoftwareIndex, root: HKEY, subkey: &str) -> Result<()> {
    let key = RegKey::open(root, subkey)?;
    for name in key.subkey_names() {
        // Entries without a display name are drivers and patches, not apps.
        let Ok(entry) = key.open_subkey(&name) else {
            continue;
        };
        let Some(display_name) = entry.string_value("DisplayName") else {
            continue;
        };
        index.add_entry(&InstalledEntry {
            display_name,
            install_location: entry.string_value("InstallLocation"),
            uninstall_string: entry.string_value("UninstallString"),
        });
    }
    Ok(())
}

struct RegKey(HKEY);

impl RegKey {
    fn open(root: HKEY, subkey: &str) -> Result<Self> {
        let wide = to_wide(subkey);
        let mut handle = HKEY::default();
        unsafe { RegOpenKeyExW(root, PCWSTR::from_raw(wide.as_ptr()), 0, KEY_READ, &mut handle) }
            .ok()?;
        Ok(Self(handle))
    }

    fn open_subkey(&self, name: &str) -> Result<Self> {
        Self::open(self.0, name)
    }

    fn subkey_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut index = 0u32;
        loop {
            let mut buffer = [0u16; 512];
            let mut length = buffer.len() as u32;
            let status = unsafe {
                RegEnumKeyExW(
                    self.0,
                    index,
                    PWSTR::from_raw(buffer.as_mut_ptr()),
                    &mut length,
                    None,
                    PWSTR::null(),
                    None,
                    None,
                )
            };
            if status == ERROR_NO_MORE_ITEMS || status.is_err() {
                break;
            }
            names.push(String::from_utf16_lossy(&buffer[..length as usize]));
            index += 1;
        }
        names
    }

    fn string_value(&self, name: &str) -> Option<String> {
        let wide = to_wide(name);
        let mut value_type = REG_VALUE_TYPE::default();
        let mut buffer = [0u16; 2048];
        let mut size = (buffer.len() * size_of::<u16>()) as u32;
        let status = unsafe {
            RegQueryValueExW(
                self.0,
                PCWSTR::from_raw(wide.as_ptr()),
                None,
                Some(&mut value_type),
                Some(buffer.as_mut_ptr() as *mut u8),
                Some(&mut size),
            )
        };
        if status.is_err() || (value_type != REG_SZ && value_type != REG_EXPAND_SZ) {
            return None;
        }

        let length = (size as usize / size_of::<u16>()).min(buffer.len());
        let text = String::from_utf16_lossy(&buffer[..length]);
        let text = text.trim_end_matches('\0');
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}

impl Drop for RegKey {
    fn drop(&mut self) {
        let _ = unsafe { RegCloseKey(self.0) };
    }
}

fn to_wide(value: &str) -> Vec<u16> {
    value.encode_utf16().chain(std::iter::once(0)).collect()
}
