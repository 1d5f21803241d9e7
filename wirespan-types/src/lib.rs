#![cfg_attr(not(feature = "user"), no_std)]

/// HTTP request buffer captured by the kprobe path (request line + header prefix)
pub const HTTP_BUF_LEN: usize = 160;

/// SQL statement buffer captured from client library writes
pub const SQL_BUF_LEN: usize = 500;

/// Opaque TCP payload prefix captured for userspace classification
pub const TCP_BUF_LEN: usize = 256;

/// HTTP/2 HEADERS frame fragment buffer
pub const HTTP2_BUF_LEN: usize = 256;

/// Method field of the legacy Go-probe trace record
pub const TRACE_METHOD_LEN: usize = 7;

/// Path field of the legacy Go-probe trace record
pub const TRACE_PATH_LEN: usize = 100;

// Ring-buffer event kinds, encoded in the first byte of every record.
// Kinds 1..=4 are legacy Go-probe traces whose first byte is the span kind
// itself (server/client HTTP and gRPC, start/end already merged in-kernel).
pub const EVENT_SQL_CLIENT: u8 = 5;
pub const EVENT_K_HTTP: u8 = 6;
pub const EVENT_K_HTTP2: u8 = 7;
pub const EVENT_TCP_UNKNOWN: u8 = 8;

/// Socket 4-tuple as captured in kernel. Addresses are 16 bytes; IPv4
/// addresses arrive IPv4-mapped (`::ffff:a.b.c.d`).
///
/// Both ports zero means the connection could not be resolved at capture
/// time (e.g. the asynchronous SSL path) and classifiers must fall back to
/// in-payload `Host:` parsing.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ConnectionInfo {
    pub s_addr: [u8; 16],
    pub d_addr: [u8; 16],
    pub s_port: u16,
    pub d_port: u16,
}

impl ConnectionInfo {
    pub const fn new() -> Self {
        ConnectionInfo {
            s_addr: [0; 16],
            d_addr: [0; 16],
            s_port: 0,
            d_port: 0,
        }
    }
}

/// Process identity of the instrumented target.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "user", derive(serde::Serialize, serde::Deserialize))]
pub struct PidInfo {
    /// PID in the root PID namespace
    pub host_pid: u32,
    /// PID inside the target's own namespace
    pub user_pid: u32,
    /// PID-namespace inode
    pub ns: u32,
}

impl PidInfo {
    pub const fn new() -> Self {
        PidInfo {
            host_pid: 0,
            user_pid: 0,
            ns: 0,
        }
    }
}

/// W3C traceparent-style context scraped from request headers in kernel.
/// An all-zero `trace_id` means no inbound context was found.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct TraceContext {
    pub trace_id: [u8; 16],
    pub span_id: [u8; 8],
    pub parent_id: [u8; 8],
    pub ts: u64,
    pub flags: u8,
    pub _pad: [u8; 7],
}

impl TraceContext {
    pub const fn new() -> Self {
        TraceContext {
            trace_id: [0; 16],
            span_id: [0; 8],
            parent_id: [0; 8],
            ts: 0,
            flags: 0,
            _pad: [0; 7],
        }
    }
}

/// Kprobe-captured HTTP transaction (event kind 6).
///
/// The dispatch byte at offset 0 is the low byte of `flags`; `event_type`
/// carries the span kind the kernel resolved (1 = server, 3 = client).
/// `buf` holds the request line, optionally followed by headers, zero
/// padded.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct HttpInfoEvent {
    pub flags: u64,
    pub conn: ConnectionInfo,
    pub _pad0: [u8; 4],
    pub start_monotime_ns: u64,
    pub end_monotime_ns: u64,
    pub buf: [u8; HTTP_BUF_LEN],
    pub len: u32,
    pub resp_len: u32,
    pub status: u16,
    pub event_type: u8,
    pub ssl: u8,
    pub pid: PidInfo,
    pub tp: TraceContext,
}

impl HttpInfoEvent {
    pub const fn new() -> Self {
        HttpInfoEvent {
            flags: EVENT_K_HTTP as u64,
            conn: ConnectionInfo::new(),
            _pad0: [0; 4],
            start_monotime_ns: 0,
            end_monotime_ns: 0,
            buf: [0; HTTP_BUF_LEN],
            len: 0,
            resp_len: 0,
            status: 0,
            event_type: 0,
            ssl: 0,
            pid: PidInfo::new(),
            tp: TraceContext::new(),
        }
    }
}

/// SQL client transaction (event kind 5).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct SqlRequestEvent {
    pub flags: u64,
    pub conn: ConnectionInfo,
    pub _pad0: [u8; 4],
    pub start_monotime_ns: u64,
    pub end_monotime_ns: u64,
    pub buf: [u8; SQL_BUF_LEN],
    pub len: u32,
    pub pid: PidInfo,
    pub _pad1: [u8; 4],
    pub tp: TraceContext,
}

impl SqlRequestEvent {
    pub const fn new() -> Self {
        SqlRequestEvent {
            flags: EVENT_SQL_CLIENT as u64,
            conn: ConnectionInfo::new(),
            _pad0: [0; 4],
            start_monotime_ns: 0,
            end_monotime_ns: 0,
            buf: [0; SQL_BUF_LEN],
            len: 0,
            pid: PidInfo::new(),
            _pad1: [0; 4],
            tp: TraceContext::new(),
        }
    }
}

/// Unclassified TCP transaction (event kind 8). `buf` is an opaque payload
/// prefix; userspace decides what protocol it carries.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct TcpRequestEvent {
    pub flags: u64,
    pub conn: ConnectionInfo,
    pub _pad0: [u8; 4],
    pub start_monotime_ns: u64,
    pub end_monotime_ns: u64,
    pub buf: [u8; TCP_BUF_LEN],
    pub len: u32,
    pub pid: PidInfo,
    pub tp: TraceContext,
}

impl TcpRequestEvent {
    pub const fn new() -> Self {
        TcpRequestEvent {
            flags: EVENT_TCP_UNKNOWN as u64,
            conn: ConnectionInfo::new(),
            _pad0: [0; 4],
            start_monotime_ns: 0,
            end_monotime_ns: 0,
            buf: [0; TCP_BUF_LEN],
            len: 0,
            pid: PidInfo::new(),
            tp: TraceContext::new(),
        }
    }
}

/// HTTP/2 or gRPC transaction captured by kprobes (event kind 7). `buf`
/// holds a HEADERS frame fragment; `direction` is 0 when the target is the
/// server side of the stream, 1 when it is the client.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct Http2RequestEvent {
    pub flags: u64,
    pub conn: ConnectionInfo,
    pub _pad0: [u8; 4],
    pub start_monotime_ns: u64,
    pub end_monotime_ns: u64,
    pub buf: [u8; HTTP2_BUF_LEN],
    pub len: u32,
    pub direction: u8,
    pub ssl: u8,
    pub _pad1: [u8; 2],
    pub pid: PidInfo,
    pub _pad2: [u8; 4],
    pub tp: TraceContext,
}

impl Http2RequestEvent {
    pub const fn new() -> Self {
        Http2RequestEvent {
            flags: EVENT_K_HTTP2 as u64,
            conn: ConnectionInfo::new(),
            _pad0: [0; 4],
            start_monotime_ns: 0,
            end_monotime_ns: 0,
            buf: [0; HTTP2_BUF_LEN],
            len: 0,
            direction: 0,
            ssl: 0,
            _pad1: [0; 2],
            pid: PidInfo::new(),
            _pad2: [0; 4],
            tp: TraceContext::new(),
        }
    }
}

/// Legacy Go-probe HTTP trace (event kinds 1..=4, and the fallback layout
/// for kinds this crate does not know). Method and path were resolved in
/// kernel; the first byte is the span kind directly.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct HttpRequestTrace {
    pub event_type: u8,
    pub _pad0: [u8; 7],
    pub go_start_monotime_ns: u64,
    pub start_monotime_ns: u64,
    pub end_monotime_ns: u64,
    pub method: [u8; TRACE_METHOD_LEN],
    pub path: [u8; TRACE_PATH_LEN],
    pub _pad1: [u8; 1],
    pub status: u16,
    pub _pad2: [u8; 2],
    pub conn: ConnectionInfo,
    pub _pad3: [u8; 4],
    pub content_length: i64,
    pub tp: TraceContext,
    pub pid: PidInfo,
    pub _pad4: [u8; 4],
}

impl HttpRequestTrace {
    pub const fn new() -> Self {
        HttpRequestTrace {
            event_type: 0,
            _pad0: [0; 7],
            go_start_monotime_ns: 0,
            start_monotime_ns: 0,
            end_monotime_ns: 0,
            method: [0; TRACE_METHOD_LEN],
            path: [0; TRACE_PATH_LEN],
            _pad1: [0; 1],
            status: 0,
            _pad2: [0; 2],
            conn: ConnectionInfo::new(),
            _pad3: [0; 4],
            content_length: 0,
            tp: TraceContext::new(),
            pid: PidInfo::new(),
            _pad4: [0; 4],
        }
    }
}

#[cfg(feature = "user")]
mod pod_impls {
    use super::*;
    // SAFETY: All types are #[repr(C)], Copy, and contain only primitive/array fields.
    unsafe impl aya::Pod for ConnectionInfo {}
    unsafe impl aya::Pod for PidInfo {}
    unsafe impl aya::Pod for TraceContext {}
    unsafe impl aya::Pod for HttpInfoEvent {}
    unsafe impl aya::Pod for SqlRequestEvent {}
    unsafe impl aya::Pod for TcpRequestEvent {}
    unsafe impl aya::Pod for Http2RequestEvent {}
    unsafe impl aya::Pod for HttpRequestTrace {}
}

#[cfg(feature = "user")]
pub mod userspace {
    use super::*;
    use std::borrow::Cow;
    use std::net::{IpAddr, Ipv6Addr};

    /// Bounded C-string read: effective length is the first NUL or the full
    /// array, contents converted UTF-8 best-effort.
    pub fn cstr(bytes: &[u8]) -> Cow<'_, str> {
        let len = bytes.iter().position(|&c| c == 0).unwrap_or(bytes.len());
        String::from_utf8_lossy(&bytes[..len])
    }

    fn format_addr(raw: &[u8; 16]) -> IpAddr {
        let v6 = Ipv6Addr::from(*raw);
        match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        }
    }

    impl ConnectionInfo {
        /// Source endpoint address. IPv4-mapped addresses render dotted-quad.
        pub fn src(&self) -> IpAddr {
            format_addr(&self.s_addr)
        }

        /// Destination endpoint address.
        pub fn dst(&self) -> IpAddr {
            format_addr(&self.d_addr)
        }

        /// True when the kernel could not resolve the socket tuple and the
        /// payload is the only source of host information.
        pub fn is_unknown(&self) -> bool {
            self.s_port == 0 && self.d_port == 0
        }
    }

    impl HttpInfoEvent {
        /// Request buffer up to its zero terminator (or full, if none).
        pub fn buf_bytes(&self) -> &[u8] {
            let len = self.buf.iter().position(|&c| c == 0).unwrap_or(self.buf.len());
            &self.buf[..len]
        }
    }

    impl SqlRequestEvent {
        /// Captured payload, `len` clamped to the buffer capacity.
        pub fn payload(&self) -> &[u8] {
            let len = (self.len as usize).min(SQL_BUF_LEN);
            &self.buf[..len]
        }
    }

    impl TcpRequestEvent {
        pub fn payload(&self) -> &[u8] {
            let len = (self.len as usize).min(TCP_BUF_LEN);
            &self.buf[..len]
        }
    }

    impl Http2RequestEvent {
        pub fn payload(&self) -> &[u8] {
            let len = (self.len as usize).min(HTTP2_BUF_LEN);
            &self.buf[..len]
        }
    }

    impl HttpRequestTrace {
        pub fn method_str(&self) -> Cow<'_, str> {
            cstr(&self.method)
        }

        pub fn path_str(&self) -> Cow<'_, str> {
            cstr(&self.path)
        }
    }
}

#[cfg(feature = "user")]
pub mod span {
    use super::PidInfo;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;

    /// Transaction kind of an emitted span. The discriminants match the
    /// event-kind bytes 1..=5 of the ring-buffer protocol.
    #[repr(u8)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub enum SpanKind {
        #[default]
        Unknown = 0,
        HttpServer = 1,
        GrpcServer = 2,
        HttpClient = 3,
        GrpcClient = 4,
        SqlClient = 5,
    }

    impl From<u8> for SpanKind {
        fn from(v: u8) -> Self {
            match v {
                1 => SpanKind::HttpServer,
                2 => SpanKind::GrpcServer,
                3 => SpanKind::HttpClient,
                4 => SpanKind::GrpcClient,
                5 => SpanKind::SqlClient,
                _ => SpanKind::Unknown,
            }
        }
    }

    /// Language/runtime of the instrumented executable, as detected by the
    /// process inspector.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub enum SdkLanguage {
        #[default]
        Generic,
        Go,
        Dotnet,
        Java,
        Nodejs,
        Python,
        Ruby,
        Rust,
    }

    /// Identity of the service a span belongs to. `auto_name` marks names
    /// synthesized from the executable, which downstream enrichment (e.g.
    /// Kubernetes metadata) may overwrite.
    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    pub struct ServiceId {
        pub name: String,
        pub namespace: String,
        pub uid: String,
        pub auto_name: bool,
        pub sdk_language: SdkLanguage,
        #[serde(default)]
        pub metadata: HashMap<String, String>,
    }

    /// Uniform transaction record emitted by the ingest core.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct Span {
        pub kind: SpanKind,
        pub method: String,
        pub path: String,
        pub peer: String,
        pub host: String,
        pub host_port: u16,
        pub content_length: i64,
        pub request_start_ns: u64,
        pub start_ns: u64,
        pub end_ns: u64,
        pub status: u16,
        pub service: ServiceId,
        pub trace_id: [u8; 16],
        pub span_id: [u8; 8],
        pub parent_span_id: [u8; 8],
        pub flags: u8,
        pub pid: PidInfo,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub statement: Option<String>,
    }

    impl Span {
        /// True when no inbound trace context was found in the request.
        pub fn trace_id_is_zero(&self) -> bool {
            self.trace_id.iter().all(|&b| b == 0)
        }
    }
}
