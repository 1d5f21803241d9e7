//! The tracer surface consumed by the orchestrator.
//!
//! A tracer is one eBPF program family (e.g. the kprobe HTTP tracer or the
//! SSL uprobe tracer): it declares where its programs attach, which rodata
//! constants need patching before load, and runs its own ring-buffer
//! forwarder. The orchestrator owns loading/attaching through the kernel
//! program loader; this crate only defines the contract and the fan-out
//! across programs instrumenting the same executable.

use async_trait::async_trait;
use aya::Ebpf;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wirespan_types::span::{ServiceId, Span};

/// Entry/return eBPF programs for one instrumentation point, referenced by
/// program name inside the loaded object. `required` makes tracer setup
/// fail when the target symbol cannot be found.
#[derive(Debug, Clone, Default)]
pub struct FunctionPrograms {
    pub required: bool,
    pub start: Option<&'static str>,
    pub end: Option<&'static str>,
}

/// Offsets of an instrumented function inside the target executable. Each
/// return instruction gets its own uprobe; uretprobes are unusable on
/// runtimes that relocate stacks.
#[derive(Debug, Clone, Default)]
pub struct FuncOffsets {
    pub start: u64,
    pub returns: Vec<u64>,
}

/// An instrumentation point: where to attach and what to attach there.
#[derive(Debug, Clone, Default)]
pub struct Probe {
    pub offsets: FuncOffsets,
    pub programs: FunctionPrograms,
}

/// Value patched into a program's `.rodata` before load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstValue {
    Bool(bool),
    U8(u8),
    U32(u32),
    U64(u64),
}

/// What the process inspector learned about the target binary.
#[derive(Debug, Clone, Default)]
pub struct BinaryInfo {
    pub exe_path: PathBuf,
    pub pid: u32,
    pub ns: u32,
}

/// Function and struct-field offsets resolved from a Go executable.
#[derive(Debug, Clone, Default)]
pub struct GoOffsets {
    pub funcs: HashMap<String, FuncOffsets>,
    pub fields: HashMap<String, u64>,
}

/// Admission control shared by every tracer: the orchestrator's process
/// discovery notifies which PIDs may produce spans.
pub trait PidsAccounter {
    fn allow_pid(&self, pid: u32);
    fn block_pid(&self, pid: u32);
}

/// An individual eBPF program family (e.g. the kprobe HTTP tracer).
#[async_trait]
pub trait Tracer: PidsAccounter + Send {
    /// Load the program object compiled for this tracer (verbose objects
    /// when `bpf_debug` is set).
    fn load(&mut self) -> anyhow::Result<Ebpf>;

    /// Kernel symbols to tap. Start maps to a kprobe, end to a kretprobe.
    fn kprobes(&self) -> HashMap<&'static str, FunctionPrograms> {
        HashMap::new()
    }

    /// Module → symbol → programs to attach as uprobe/uretprobe pairs.
    fn uprobes(&self) -> HashMap<&'static str, HashMap<&'static str, FunctionPrograms>> {
        HashMap::new()
    }

    /// Go functions to instrument in the target executable.
    fn go_probes(&self) -> HashMap<&'static str, FunctionPrograms> {
        HashMap::new()
    }

    /// Programs to install as generic socket filters.
    fn socket_filters(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Constants to overwrite in the program's `.rodata` before load.
    fn constants(&self, binary: &BinaryInfo, offsets: &GoOffsets) -> HashMap<&'static str, ConstValue>;

    /// Consume this tracer's ring buffer and forward span batches until
    /// cancelled. The service identity is stamped on every span; tracers
    /// that resolve per-request identities may ignore it.
    async fn run(&mut self, cancel: CancellationToken, out: mpsc::Sender<Vec<Span>>, service: ServiceId);
}

/// Kprobe-only programs that support the pipeline without producing spans.
#[async_trait]
pub trait UtilityTracer: Send {
    fn load(&mut self) -> anyhow::Result<Ebpf>;
    fn kprobes(&self) -> HashMap<&'static str, FunctionPrograms>;
    async fn run(&mut self, cancel: CancellationToken);
}

/// All tracer programs instrumenting one executable, sharing a pin path
/// for their maps.
pub struct ProcessTracer {
    pub programs: Vec<Box<dyn Tracer>>,
    pub pin_path: PathBuf,
    pub system_wide: bool,
}

impl ProcessTracer {
    pub fn allow_pid(&self, pid: u32) {
        for p in &self.programs {
            p.allow_pid(pid);
        }
    }

    pub fn block_pid(&self, pid: u32) {
        for p in &self.programs {
            p.block_pid(pid);
        }
    }
}

/// Ring buffer consumed by the forwarder.
pub const EVENTS_MAP: &str = "events";

/// Kernel-side mirror of the PID admission registry.
pub const VALID_PIDS_MAP: &str = "valid_pids";

/// Stable names of the maps pinned under the BPF file system. Re-attaching
/// after a restart finds per-connection state by these keys.
pub const PINNED_MAPS: &[&str] = &[
    "active_ssl_handshakes",
    "ssl_to_conn",
    "ssl_to_pid_tid",
    "pid_tid_to_conn",
    "ongoing_http",
    "http_info_mem",
    "trace_map",
    "server_traces",
    "valid_pids",
    "pid_cache",
    "events",
    "filtered_connections",
    "tp_info_mem",
    "tp_char_buf_mem",
];
