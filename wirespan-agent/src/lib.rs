//! Event-ingest and classification core of the wirespan auto-instrumentation
//! agent.
//!
//! In-kernel probes (kprobes, uprobes, socket filters, Go-function probes)
//! watch a target process and push fixed-layout transaction records into a
//! ring buffer. This crate is everything that happens to those records in
//! userspace, up to the point where uniform [`Span`] batches leave on a
//! channel:
//!
//! ```text
//! ring buffer → codec → PID admission → classifier → span builder → batcher → out
//! ```
//!
//! - [`codec`] maps raw bytes to typed records, dispatching on the
//!   event-kind byte.
//! - [`pids`] is the admission registry process discovery feeds; records
//!   from unknown PIDs never become spans.
//! - [`transform`] builds spans from decoded records, using the protocol
//!   classifiers in `wirespan-classifier`.
//! - [`forward`] is the per-program reader loop with batching, cooperative
//!   cancellation and bounded drain.
//! - [`kernel`] probes the running kernel once at startup to decide which
//!   programs may be loaded (version gating, lockdown mode).
//! - [`tracer`] is the contract between tracer program families and the
//!   orchestrator that loads and attaches them.
//!
//! Object loading, attaching, exporters and Kubernetes enrichment live in
//! the embedding application; this crate only consumes an already-loaded
//! ring buffer. Delivery is best effort: under sustained overload or
//! malformed input, records are dropped and the drops are observable
//! through [`metrics`].

pub mod codec;
pub mod config;
pub mod forward;
pub mod kernel;
pub mod metrics;
pub mod pids;
pub mod tracer;
pub mod transform;

pub use config::TracerConfig;
pub use forward::forward_ring_buffer;
pub use kernel::{KernelCapabilities, KernelLockdown};
pub use pids::PidRegistry;
pub use tracer::{ProcessTracer, Tracer, UtilityTracer};
pub use wirespan_types::span::{ServiceId, Span, SpanKind};
