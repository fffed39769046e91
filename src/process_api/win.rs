
use anyhow::Result;
use tracing::debug;
use windows::Win32::{
    Foundation::{CloseHandle, BOOL, FILETIME},
    System::Threading::{GetProcessTimes, OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION},
};

use super::{sysinfo_provider::SysinfoProcessProvider, ProcessProvider, Snapshot};

/// FILETIME counts 100ns ticks.
const FILETIME_TICKS_PER_SECOND: f64 = 10_000_000.;

/// Windows backend. Enumeration and filtering come from the portable sysinfo
/// provider, the user/kernel split is refined through GetProcessTimes.
pub struct WindowsProcessProvider {
    inner: SysinfoProcessProvider,
}

impl WindowsProcessProvider {
    pub fn new() -> Self {
        Self {
            inner: SysinfoProcessProvider::new(),
        }
    }
}

impl Default for WindowsProcessProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessProvider for WindowsProcessProvider {
    fn snapshot(&mut self) -> Result<Snapshot> {
        let mut snapshot = self.inner.snapshot()?;

        for sample in snapshot.values_mut() {
            match query_process_times(sample.identity.pid) {
                Ok((user, system)) => {
                    sample.cpu_user_seconds = user;
                    sample.cpu_system_seconds = system;
                }
                Err(e) => {
                    // The process exited or denies access. Keep the
                    // sysinfo-reported value for this cycle.
                    debug!(
                        "Failed to query process times for {}: {e:?}",
                        sample.identity.pid
                    );
                }
            }
        }

        Ok(snapshot)
    }
}

fn query_process_times(pid: u32) -> Result<(f64, f64)> {
    let handle =
        unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, BOOL::from(false), pid) }?;

    let mut creation = FILETIME::default();
    let mut exit = FILETIME::default();
    let mut kernel = FILETIME::default();
    let mut user = FILETIME::default();
    let times =
        unsafe { GetProcessTimes(handle, &mut creation, &mut exit, &mut kernel, &mut user) };

    unsafe { CloseHandle(handle) }?;
    times?;

    Ok((filetime_seconds(user), filetime_seconds(kernel)))
}

fn filetime_seconds(value: FILETIME) -> f64 {
    let ticks = ((value.dwHighDateTime as u64) << 32) | value.dwLowDateTime as u64;
    ticks as f64 / FILETIME_TICKS_PER_SECOND
}
