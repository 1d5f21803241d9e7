//! PID admission registry.
//!
//! Process discovery feeds `allow`/`block`; every ring-buffer reader checks
//! `is_allowed` per decoded record. The namespace refcount lets records from
//! containerised targets match on their in-namespace PID: the kernel side
//! reports both the host PID and the PID inside the target's namespace, and
//! a namespace is only consulted while at least one of its processes is
//! admitted.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use wirespan_types::PidInfo;

pub struct PidRegistry {
    system_wide: bool,
    inner: RwLock<Registry>,
}

#[derive(Default)]
struct Registry {
    allowed: HashSet<u32>,
    namespaces: HashMap<u32, u32>,
}

impl PidRegistry {
    pub fn new(system_wide: bool) -> Self {
        PidRegistry {
            system_wide,
            inner: RwLock::new(Registry::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        match self.inner.read() {
            Ok(g) => g,
            Err(e) => e.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        match self.inner.write() {
            Ok(g) => g,
            Err(e) => e.into_inner(),
        }
    }

    /// Admit events from `pid` (host namespace), living in PID namespace `ns`.
    pub fn allow(&self, pid: u32, ns: u32) {
        let mut reg = self.write();
        if reg.allowed.insert(pid) {
            *reg.namespaces.entry(ns).or_insert(0) += 1;
        }
    }

    /// Stop admitting events from `pid`. Last writer wins: an `allow`
    /// followed by a `block` in the same update batch leaves the PID blocked.
    pub fn block(&self, pid: u32, ns: u32) {
        let mut reg = self.write();
        if reg.allowed.remove(&pid) {
            if let Some(count) = reg.namespaces.get_mut(&ns) {
                *count -= 1;
                if *count == 0 {
                    reg.namespaces.remove(&ns);
                }
            }
        }
    }

    /// Whether a decoded record may produce a span. Matches on the host PID
    /// directly, or on the in-namespace PID when the record's namespace has
    /// admitted processes.
    pub fn is_allowed(&self, pid: &PidInfo) -> bool {
        if self.system_wide {
            return true;
        }
        let reg = self.read();
        reg.allowed.contains(&pid.host_pid)
            || (reg.namespaces.contains_key(&pid.ns) && reg.allowed.contains(&pid.user_pid))
    }
}

/// Process name from `/proc/<pid>/comm`, trailing newline trimmed. An
/// absent process yields an empty string.
pub fn process_name(pid: u32) -> String {
    fs::read_to_string(format!("/proc/{}/comm", pid))
        .map(|s| s.trim_end().to_string())
        .unwrap_or_default()
}

/// PID-namespace inode of a process, from the `/proc/<pid>/ns/pid` symlink
/// (`pid:[4026531836]`).
pub fn pid_namespace(pid: u32) -> Option<u32> {
    let link = fs::read_link(format!("/proc/{}/ns/pid", pid)).ok()?;
    let target = link.to_str()?;
    target
        .strip_prefix("pid:[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid_info(host: u32, user: u32, ns: u32) -> PidInfo {
        PidInfo {
            host_pid: host,
            user_pid: user,
            ns,
        }
    }

    #[test]
    fn allowed_pid_admits_events() {
        let reg = PidRegistry::new(false);
        reg.allow(4242, 1);
        assert!(reg.is_allowed(&pid_info(4242, 4242, 1)));
    }

    #[test]
    fn unknown_pid_rejected() {
        let reg = PidRegistry::new(false);
        assert!(!reg.is_allowed(&pid_info(4242, 4242, 1)));
    }

    #[test]
    fn block_after_allow_rejects() {
        let reg = PidRegistry::new(false);
        reg.allow(4242, 1);
        reg.block(4242, 1);
        assert!(!reg.is_allowed(&pid_info(4242, 4242, 1)));
    }

    #[test]
    fn system_wide_admits_everything() {
        let reg = PidRegistry::new(true);
        assert!(reg.is_allowed(&pid_info(1, 1, 1)));
    }

    #[test]
    fn namespace_match_on_user_pid() {
        let reg = PidRegistry::new(false);
        // Container: host PID 9000 is PID 1 inside namespace 77.
        reg.allow(1, 77);
        assert!(reg.is_allowed(&pid_info(9000, 1, 77)));
        // Same user PID in an unknown namespace does not match.
        assert!(!reg.is_allowed(&pid_info(9000, 1, 78)));
    }

    #[test]
    fn namespace_refcount_survives_sibling_block() {
        let reg = PidRegistry::new(false);
        reg.allow(1, 77);
        reg.allow(2, 77);
        reg.block(2, 77);
        // Namespace 77 still has one admitted process.
        assert!(reg.is_allowed(&pid_info(9000, 1, 77)));
        reg.block(1, 77);
        assert!(!reg.is_allowed(&pid_info(9000, 1, 77)));
    }

    #[test]
    fn double_allow_counts_once() {
        let reg = PidRegistry::new(false);
        reg.allow(1, 77);
        reg.allow(1, 77);
        reg.block(1, 77);
        assert!(!reg.is_allowed(&pid_info(1, 1, 77)));
    }

    #[test]
    fn process_name_of_missing_pid_is_empty() {
        assert_eq!(process_name(u32::MAX), "");
    }
}
