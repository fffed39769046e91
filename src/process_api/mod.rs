//! Contains logic for enumerating running processes.
//! [GenericProcessProvider] is the main artifact of this module that abstracts
//! the operations over the available backends.

pub mod filter;
pub mod sysinfo_provider;
#[cfg(feature = "win")]
pub mod win;

#[cfg(feature = "win")]
extern crate windows;

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use anyhow::Result;

/// Key distinguishing process instances across polls. A recycled pid with a
/// different start time is a different instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessIdentity {
    pub pid: u32,
    /// Seconds since the unix epoch at which the process started.
    pub start_time: u64,
}

/// A single process observation. Produced fresh each poll cycle and discarded
/// with it.
#[derive(Debug, Clone)]
pub struct ProcessSample {
    pub identity: ProcessIdentity,
    pub name: Arc<str>,
    pub executable_path: Option<PathBuf>,
    /// Cumulative user-mode CPU seconds since process start.
    pub cpu_user_seconds: f64,
    /// Cumulative kernel-mode CPU seconds since process start.
    pub cpu_system_seconds: f64,
}

impl ProcessSample {
    pub fn cpu_total_seconds(&self) -> f64 {
        self.cpu_user_seconds + self.cpu_system_seconds
    }
}

pub type Snapshot = HashMap<ProcessIdentity, ProcessSample>;

/// Intended to serve as a contract every enumeration backend must implement.
/// `Sync` is required so the sampling loop holding a provider can run on a
/// spawned task.
#[cfg_attr(test, mockall::automock)]
pub trait ProcessProvider: Send + Sync {
    /// Enumerates processes readable at the current privilege level, minus
    /// OS-internal ones. Processes that vanish or deny access mid-enumeration
    /// are simply absent from the result.
    fn snapshot(&mut self) -> Result<Snapshot>;
}

/// Serves as a cross-compatible ProcessProvider implementation.
pub struct GenericProcessProvider {
    inner: Box<dyn ProcessProvider>,
}

impl GenericProcessProvider {
    pub fn new() -> Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "win")] {
                use win::WindowsProcessProvider;
                Ok(Self {
                    inner: Box::new(WindowsProcessProvider::new()),
                })
            } else {
                use sysinfo_provider::SysinfoProcessProvider;
                Ok(Self {
                    inner: Box::new(SysinfoProcessProvider::new()),
                })
            }
        }
    }
}

impl ProcessProvider for GenericProcessProvider {
    fn snapshot(&mut self) -> Result<Snapshot> {
        self.inner.snapshot()
    }
}
