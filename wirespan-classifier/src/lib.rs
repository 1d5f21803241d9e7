//! Stateless classifiers for the payload prefixes captured by wirespan's
//! kernel probes.
//!
//! The eBPF side hands userspace a fixed-size, zero-padded byte buffer per
//! transaction: the first bytes an application wrote or read on a socket.
//! This crate turns those prefixes into span labels:
//!
//! - [`http`] parses HTTP/1.x request lines (method, URL), strips query
//!   strings, and recovers `host[:port]` from a `Host:` header when the
//!   kernel could not resolve the connection tuple.
//! - [`sql`] detects SQL statements inside noisy TCP payloads (framing
//!   bytes before the verb are common) and extracts the operation and the
//!   target table.
//! - [`http2`] walks HTTP/2 frame headers and decodes the static-table
//!   subset of HPACK to recover `:method`, `:path` and `:status` from a
//!   HEADERS fragment.
//!
//! Everything here is pure and bounded: classifiers never allocate beyond
//! the extracted labels, never block, and treat all input as untrusted.
//! Connection state and span assembly live in `wirespan-agent`.

pub mod http;
pub mod http2;
pub mod sql;

pub use http::{host_from_buf, parse_request_line, remove_query};
pub use http2::{parse_headers_fragment, Http2Info};
pub use sql::{parse_operation_and_table, sql_statement_offset};
