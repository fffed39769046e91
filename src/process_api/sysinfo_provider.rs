use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use tracing::trace;

use super::{
    filter::{is_system_process, ProcessFacts},
    ProcessIdentity, ProcessProvider, ProcessSample, Snapshot,
};

const CPU_MS_PER_SECOND: f64 = 1000.;

/// One enumerated process before classification.
struct RawProcess {
    identity: ProcessIdentity,
    facts: ProcessFacts,
    cpu_seconds: f64,
}

/// Portable enumeration backend on top of sysinfo. Processes that exit or deny
/// access during the refresh are absent from the process table, which gives
/// the race-safe skip behaviour for free.
pub struct SysinfoProcessProvider {
    system: System,
}

impl SysinfoProcessProvider {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }

    fn refresh(&mut self) {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing()
                .with_cpu()
                .with_exe(UpdateKind::OnlyIfNotSet)
                .with_cmd(UpdateKind::OnlyIfNotSet)
                .with_user(UpdateKind::OnlyIfNotSet),
        );
    }
}

impl Default for SysinfoProcessProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessProvider for SysinfoProcessProvider {
    fn snapshot(&mut self) -> Result<Snapshot> {
        self.refresh();

        let raw = self
            .system
            .processes()
            .iter()
            .map(|(pid, process)| RawProcess {
                identity: ProcessIdentity {
                    pid: pid.as_u32(),
                    start_time: process.start_time(),
                },
                facts: ProcessFacts {
                    name: process.name().to_string_lossy().into_owned(),
                    executable_path: process.exe().map(|v| v.to_path_buf()),
                    command_line: process
                        .cmd()
                        .iter()
                        .map(|v| v.to_string_lossy())
                        .collect::<Vec<_>>()
                        .join(" "),
                    user_id: process.user_id().map(|v| v.to_string()),
                    parent: process.parent().map(|v| v.as_u32()),
                },
                cpu_seconds: process.accumulated_cpu_time() as f64 / CPU_MS_PER_SECOND,
            })
            .collect();

        Ok(assemble_snapshot(raw))
    }
}

/// Classifies every enumerated process and keeps only the application ones,
/// so nothing filtered can ever reach the sampler.
fn assemble_snapshot(raw: Vec<RawProcess>) -> Snapshot {
    let facts_by_pid = raw
        .iter()
        .map(|v| (v.identity.pid, v.facts.clone()))
        .collect::<HashMap<_, _>>();

    let mut snapshot = Snapshot::new();
    for process in raw {
        if is_system_process(&process.facts, &facts_by_pid) {
            trace!("Skipping system process {}", process.facts.name);
            continue;
        }

        snapshot.insert(
            process.identity,
            ProcessSample {
                identity: process.identity,
                name: Arc::from(process.facts.name.as_str()),
                executable_path: process.facts.executable_path,
                // sysinfo doesn't split user and kernel time. The whole
                // accumulated value goes into the user slot, the Windows
                // backend refines the split afterwards.
                cpu_user_seconds: process.cpu_seconds,
                cpu_system_seconds: 0.,
            },
        );
    }
    snapshot
}
