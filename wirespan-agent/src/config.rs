use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the eBPF tracers and the ring-buffer forwarder.
///
/// Built once at startup by the embedding application (file/env parsing
/// happens there) and passed around by shared reference; nothing mutates it
/// after construction.
#[derive(Debug, Clone)]
pub struct TracerConfig {
    /// Load the verbose (debug-instrumented) program objects.
    pub bpf_debug: bool,
    /// How many records the kernel accumulates in the ring buffer before
    /// waking userspace. High values add delay for low-traffic services.
    pub wakeup_len: u32,
    /// Maximum spans per emitted batch.
    pub batch_length: usize,
    /// Flush cadence for a batch that never fills up.
    pub batch_timeout: Duration,
    /// Base directory where the BPF pinned maps are mounted.
    pub bpf_fs_base_dir: PathBuf,
    /// Directory under the base dir holding this instance's pinned maps.
    /// Defaults to `wirespan-<pid>`.
    pub bpf_fs_path: Option<PathBuf>,
    /// Track request headers in the kprobe path to pick up `Traceparent`.
    pub track_request_headers: bool,
    /// In-kernel timeout before a dangling request is flushed as incomplete.
    pub http_request_timeout: Duration,
    /// Operator escape hatch: treat the kernel as `lockdown=integrity`
    /// regardless of what `/sys` reports.
    pub integrity_mode_override: bool,
    /// Accept events from every PID instead of only admitted ones.
    pub system_wide: bool,
}

impl Default for TracerConfig {
    fn default() -> Self {
        TracerConfig {
            bpf_debug: false,
            wakeup_len: 8,
            batch_length: 100,
            batch_timeout: Duration::from_millis(100),
            bpf_fs_base_dir: PathBuf::from("/var/run/wirespan"),
            bpf_fs_path: None,
            track_request_headers: false,
            http_request_timeout: Duration::from_secs(30),
            integrity_mode_override: false,
            system_wide: false,
        }
    }
}

impl TracerConfig {
    /// Directory the pinned maps of this instance live in.
    pub fn pin_path(&self) -> PathBuf {
        match &self.bpf_fs_path {
            Some(p) => self.bpf_fs_base_dir.join(p),
            None => self
                .bpf_fs_base_dir
                .join(format!("wirespan-{}", std::process::id())),
        }
    }
}
