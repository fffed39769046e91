//! Two-tier filter that keeps OS plumbing out of the usage ledger. CPU
//! accounting for service hosts and kernel helpers would drown out real
//! applications, so classification errs towards exclusion: an application
//! missed this cycle is picked up on the next one, a system process credited
//! once stays in the ledger forever.

use std::{collections::HashMap, path::PathBuf};

/// Well-known core OS processes, excluded outright.
const DENIED_NAMES: &[&str] = &[
    "system",
    "system idle process",
    "idle",
    "registry",
    "memory compression",
    "secure system",
    "csrss.exe",
    "smss.exe",
    "lsass.exe",
    "services.exe",
    "svchost.exe",
    "wininit.exe",
    "winlogon.exe",
    "audiodg.exe",
    "fontdrvhost.exe",
    "dwm.exe",
    "conhost.exe",
    "dllhost.exe",
];

/// Executables under these prefixes belong to the OS.
const SYSTEM_DIR_PREFIXES: &[&str] = &[
    "c:\\windows\\system32",
    "c:\\windows\\syswow64",
    "c:\\windows\\winsxs",
    "c:\\windows\\servicing",
    "c:\\windows\\systemapps",
];

/// Name fragments strongly associated with OS plumbing.
const SYSTEM_NAME_KEYWORDS: &[&str] = &[
    "svchost",
    "taskhost",
    "runtimebroker",
    "sihost",
    "ctfmon",
    "searchindexer",
    "spoolsv",
    "wmiprvse",
    "dashost",
    "wudfhost",
    "trustedinstaller",
    "tiworker",
];

/// Service host command line markers.
const SYSTEM_CMDLINE_MARKERS: &[&str] = &[
    "-k netsvcs",
    "-k localservice",
    "-k networkservice",
    "-k dcomlaunch",
];

/// Local-system and service accounts. Anything they run is OS plumbing.
const SYSTEM_ACCOUNTS: &[&str] = &["s-1-5-18", "s-1-5-19", "s-1-5-20", "0"];

/// How far up the parent chain system status is inherited.
const MAX_PARENT_DEPTH: usize = 5;

/// Everything the classifier needs to know about one process.
#[derive(Debug, Clone, Default)]
pub struct ProcessFacts {
    pub name: String,
    pub executable_path: Option<PathBuf>,
    pub command_line: String,
    pub user_id: Option<String>,
    pub parent: Option<u32>,
}

pub fn is_system_process(facts: &ProcessFacts, all: &HashMap<u32, ProcessFacts>) -> bool {
    if is_system_by_own_traits(facts) {
        return true;
    }

    // A child of a system process inherits system status.
    let mut parent = facts.parent;
    for _ in 0..MAX_PARENT_DEPTH {
        let Some(parent_facts) = parent.and_then(|pid| all.get(&pid)) else {
            break;
        };
        if is_system_by_own_traits(parent_facts) {
            return true;
        }
        parent = parent_facts.parent;
    }
    false
}

fn is_system_by_own_traits(facts: &ProcessFacts) -> bool {
    let name = facts.name.to_lowercase();
    if DENIED_NAMES.contains(&name.as_str()) {
        return true;
    }
    if SYSTEM_NAME_KEYWORDS.iter().any(|v| name.contains(v)) {
        return true;
    }

    if let Some(path) = &facts.executable_path {
        let path = path.to_string_lossy().to_lowercase().replace('/', "\\");
        if SYSTEM_DIR_PREFIXES.iter().any(|v| path.starts_with(v)) {
            return true;
        }
    }

    let command_line = facts.command_line.to_lowercase();
    if SYSTEM_CMDLINE_MARKERS.iter().any(|v| command_line.contains(v)) {
        return true;
    }

    if let Some(user) = &facts.user_id {
        if SYSTEM_ACCOUNTS.iter().any(|v| user.eq_ignore_ascii_case(v)) {
            return true;
        }
    }

    false
}
