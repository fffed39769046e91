//! Maps raw executable names to display names of installed software.
//! The index is built once at tracker startup from the OS installed-programs
//! inventory and is read-only afterwards, so software installed mid-run is not
//! recognized until restart.

#[cfg(feature = "win")]
pub mod win;

#[cfg(feature = "win")]
extern crate windows;

use std::{collections::HashMap, path::Path, sync::Arc};

use tracing::debug;

/// Uninstall strings pointing at the MSI host would attribute every
/// MSI-installed product to a single bucket.
const UNINSTALLER_HOSTS: &[&str] = &["msiexec.exe"];

/// Lowercase executable filename -> installed-software display name.
#[derive(Debug, Default)]
pub struct SoftwareIndex {
    by_executable: HashMap<String, Arc<str>>,
}

/// One usable entry of the installed-software inventory.
#[derive(Debug)]
pub struct InstalledEntry {
    pub display_name: String,
    pub install_location: Option<String>,
    pub uninstall_string: Option<String>,
}

impl SoftwareIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds the index from the OS installed-software inventory. Expensive,
    /// run once per tracker instance. On platforms without an inventory the
    /// index stays empty and resolution falls back to raw process names.
    pub fn build() -> Self {
        cfg_if::cfg_if! {
            if #[cfg(feature = "win")] {
                win::build_index()
            } else {
                Self::empty()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.by_executable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_executable.is_empty()
    }

    /// Human-friendly name for a process, falling back to the raw process
    /// name when the executable is not part of any known package.
    pub fn resolve(&self, process_name: &str) -> Arc<str> {
        self.by_executable
            .get(&process_name.to_lowercase())
            .cloned()
            .unwrap_or_else(|| Arc::from(process_name))
    }

    pub fn add_entry(&mut self, entry: &InstalledEntry) {
        // Install-directory executables are indexed before the uninstall
        // string, so they win for a contested filename.
        if let Some(location) = entry.install_location.as_deref().filter(|v| !v.is_empty()) {
            self.index_install_dir(&entry.display_name, Path::new(location));
        }
        if let Some(command) = entry.uninstall_string.as_deref() {
            self.index_uninstall_string(&entry.display_name, command);
        }
    }

    /// Strategy (a): executable files directly under the package's install
    /// directory.
    fn index_install_dir(&mut self, display_name: &str, dir: &Path) {
        let entries = match std::fs::read_dir(dir) {
            Ok(v) => v,
            Err(e) => {
                debug!("Can't list install directory {dir:?}: {e}");
                return;
            }
        };
        for file in entries.flatten() {
            let name = file.file_name().to_string_lossy().to_lowercase();
            if name.ends_with(".exe") {
                self.insert_first(name, display_name);
            }
        }
    }

    /// Strategy (b): the executable embedded in the uninstall command.
    fn index_uninstall_string(&mut self, display_name: &str, command: &str) {
        let Some(executable) = executable_from_uninstall_string(command) else {
            return;
        };
        if UNINSTALLER_HOSTS.contains(&executable.as_str()) {
            return;
        }
        self.insert_first(executable, display_name);
    }

    /// First writer wins per executable filename.
    fn insert_first(&mut self, executable: String, display_name: &str) {
        self.by_executable
            .entry(executable)
            .or_insert_with(|| Arc::from(display_name));
    }
}

/// Extracts the lowercase filename of the `.exe` embedded in an uninstall
/// command. Handles both `"C:\app dir\unins000.exe" /SILENT` and
/// `C:\app\uninstall.exe /S` forms.
pub fn executable_from_uninstall_string(command: &str) -> Option<String> {
    let command = command.trim();
    let path = if let Some(rest) = command.strip_prefix('"') {
        rest.split('"').next()?
    } else {
        &command[..find_exe_end(command)?]
    };

    let path = path.trim();
    if !path.to_lowercase().ends_with(".exe") {
        return None;
    }
    Some(file_name_of(path).to_lowercase())
}

/// Byte offset right past the first case-insensitive `.exe` occurrence.
fn find_exe_end(command: &str) -> Option<usize> {
    let bytes = command.as_bytes();
    (0..bytes.len().saturating_sub(3))
        .find(|&i| bytes[i..i + 4].eq_ignore_ascii_case(b".exe"))
        .map(|i| i + 4)
}

/// Registry data holds Windows-style paths regardless of the host platform,
/// so both separators are handled by hand instead of through [Path].
fn file_name_of(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use anyhow::Result;
    use tempfile::tempdir;

    use super::{executable_from_uninstall_string, InstalledEntry, SoftwareIndex};

    #[test]
    fn parses_quoted_uninstall_string() {
        assert_eq!(
            executable_from_uninstall_string(r#""C:\Program Files\My App\unins000.exe" /SILENT"#),
            Some("unins000.exe".into())
        );
    }

    #[test]
    fn parses_bare_uninstall_string() {
        assert_eq!(
            executable_from_uninstall_string(r"C:\Tools\App\Uninstall.EXE /S"),
            Some("uninstall.exe".into())
        );
    }

    #[test]
    fn rejects_commands_without_executable() {
        assert_eq!(executable_from_uninstall_string("/quiet /norestart"), None);
        assert_eq!(executable_from_uninstall_string(""), None);
    }

    #[test]
    fn rejects_quoted_non_executable() {
        assert_eq!(
            executable_from_uninstall_string(r#""C:\App\uninstall.cmd" /S"#),
            None
        );
    }

    #[test]
    fn msi_host_is_not_indexed() {
        let mut index = SoftwareIndex::empty();
        index.add_entry(&InstalledEntry {
            display_name: "Some Msi Product".into(),
            install_location: None,
            uninstall_string: Some(r"MsiExec.exe /X{9A25302D-30C0-39D9-BD6F-21E6EC160475}".into()),
        });
        assert!(index.is_empty());
    }

    #[test]
    fn indexes_executables_from_install_dir() -> Result<()> {
        let dir = tempdir()?;
        File::create(dir.path().join("App.exe"))?;
        File::create(dir.path().join("helper.exe"))?;
        File::create(dir.path().join("readme.txt"))?;

        let mut index = SoftwareIndex::empty();
        index.add_entry(&InstalledEntry {
            display_name: "My Application".into(),
            install_location: Some(dir.path().to_string_lossy().into_owned()),
            uninstall_string: None,
        });

        assert_eq!(index.len(), 2);
        assert_eq!(&*index.resolve("app.exe"), "My Application");
        assert_eq!(&*index.resolve("HELPER.EXE"), "My Application");
        Ok(())
    }

    #[test]
    fn install_dir_mapping_wins_over_uninstall_string() -> Result<()> {
        let dir = tempdir()?;
        File::create(dir.path().join("shared.exe"))?;

        let mut index = SoftwareIndex::empty();
        index.add_entry(&InstalledEntry {
            display_name: "First Package".into(),
            install_location: Some(dir.path().to_string_lossy().into_owned()),
            uninstall_string: None,
        });
        index.add_entry(&InstalledEntry {
            display_name: "Second Package".into(),
            install_location: None,
            uninstall_string: Some(r"C:\Other\shared.exe /S".into()),
        });

        assert_eq!(&*index.resolve("shared.exe"), "First Package");
        Ok(())
    }

    #[test]
    fn missing_install_dir_is_skipped() {
        let mut index = SoftwareIndex::empty();
        index.add_entry(&InstalledEntry {
            display_name: "Ghost".into(),
            install_location: Some(r"C:\Definitely\Not\There".into()),
            uninstall_string: None,
        });
        assert!(index.is_empty());
    }

    #[test]
    fn unknown_executable_resolves_to_raw_name() {
        let index = SoftwareIndex::empty();
        assert_eq!(&*index.resolve("mystery.exe"), "mystery.exe");
    }
}
