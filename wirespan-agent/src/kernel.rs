//! Kernel feature detection: version gating and lockdown mode decide which
//! probe programs may be loaded and whether trace context can be written
//! into outgoing request headers.

use log::{debug, warn};
use serde::Serialize;
use std::fs;
use std::path::Path;

const OSRELEASE_PATH: &str = "/proc/sys/kernel/osrelease";
const LOCKDOWN_PATH: &str = "/sys/kernel/security/lockdown";

/// Kernel lockdown mode as reported by `/sys/kernel/security/lockdown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KernelLockdown {
    None,
    Integrity,
    Confidentiality,
    Other,
}

/// `(major, minor)` of the running kernel. Unparseable or missing release
/// strings yield `(0, 0)`, which downgrades every version-gated feature.
pub fn kernel_version() -> (u32, u32) {
    match fs::read_to_string(OSRELEASE_PATH) {
        Ok(s) => parse_release(&s),
        Err(e) => {
            warn!("can't read {}: {}", OSRELEASE_PATH, e);
            (0, 0)
        }
    }
}

fn parse_release(release: &str) -> (u32, u32) {
    let mut parts = release.trim().split('.');
    let major = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let minor = parts
        .next()
        .map(|p| p.chars().take_while(|c| c.is_ascii_digit()).collect::<String>())
        .and_then(|p| p.parse().ok())
        .unwrap_or(0);
    (major, minor)
}

pub fn lockdown_mode() -> KernelLockdown {
    lockdown_from(Path::new(LOCKDOWN_PATH))
}

fn lockdown_from(path: &Path) -> KernelLockdown {
    debug!("checking kernel lockdown mode, [none] allows trace context propagation");
    if !path.exists() {
        debug!("can't find {}, assuming no lockdown", path.display());
        return KernelLockdown::None;
    }
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(
                "failed to read {}, assuming lockdown [integrity]: {}",
                path.display(),
                e
            );
            return KernelLockdown::Integrity;
        }
    };
    let Some(line) = content.lines().next() else {
        warn!("{} is empty, assuming lockdown [integrity]", path.display());
        return KernelLockdown::Integrity;
    };
    if line.contains("[none]") {
        KernelLockdown::None
    } else if line.contains("[integrity]") {
        KernelLockdown::Integrity
    } else if line.contains("[confidentiality]") {
        KernelLockdown::Confidentiality
    } else {
        KernelLockdown::Other
    }
}

/// Bounded loops in eBPF programs require kernel 5.17.
pub fn supports_ebpf_loops(major: u32, minor: u32) -> bool {
    major > 5 || (major == 5 && minor >= 17)
}

/// Writing trace context into outgoing request headers needs bpf_probe_write_user,
/// which kernels >= 5.10 only allow outside lockdown.
pub fn supports_context_propagation(major: u32, minor: u32, lockdown: KernelLockdown) -> bool {
    if major < 5 || (major == 5 && minor < 10) {
        return true;
    }
    lockdown == KernelLockdown::None
}

/// Capability set derived once at startup; immutable afterwards.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct KernelCapabilities {
    pub major: u32,
    pub minor: u32,
    pub lockdown: KernelLockdown,
    pub loops: bool,
    pub context_propagation: bool,
}

impl KernelCapabilities {
    /// Probe the running kernel. `integrity_override` forces the lockdown
    /// handling even when the kernel reports none.
    pub fn detect(integrity_override: bool) -> Self {
        let (major, minor) = kernel_version();
        debug!("Linux kernel version {}.{}", major, minor);
        let lockdown = if integrity_override {
            KernelLockdown::Integrity
        } else {
            lockdown_mode()
        };
        Self::from_parts(major, minor, lockdown)
    }

    fn from_parts(major: u32, minor: u32, lockdown: KernelLockdown) -> Self {
        KernelCapabilities {
            major,
            minor,
            lockdown,
            loops: supports_ebpf_loops(major, minor),
            context_propagation: supports_context_propagation(major, minor, lockdown),
        }
    }
}
