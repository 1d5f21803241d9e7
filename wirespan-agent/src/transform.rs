//! Span builders: pure mappings from decoded records plus classifier output
//! into the uniform [`Span`] representation.

use crate::codec::RawEvent;
use wirespan_classifier as classifier;
use wirespan_types::span::{ServiceId, Span, SpanKind};
use wirespan_types::userspace::cstr;
use wirespan_types::{
    ConnectionInfo, Http2RequestEvent, HttpInfoEvent, HttpRequestTrace, SqlRequestEvent,
    TcpRequestEvent,
};

/// Why a decoded record produced no span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// TCP payload not recognized by any classifier. Expected; dropped
    /// without logging.
    ClassifierMiss,
    /// The record claims it ended before it started.
    InvalidWindow,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::ClassifierMiss => "classifier_miss",
            DropReason::InvalidWindow => "invalid_window",
        }
    }
}

pub fn to_span(event: &RawEvent, service: &ServiceId) -> Result<Span, DropReason> {
    match event {
        RawEvent::Legacy(t) => http_trace_to_span(t, service),
        RawEvent::KernelHttp(e) => http_info_to_span(e, service),
        RawEvent::KernelHttp2(e) => http2_to_span(e, service),
        RawEvent::Sql(e) => sql_to_span(e, service),
        RawEvent::Tcp(e) => tcp_to_span(e, service),
    }
}

fn check_window(start: u64, end: u64) -> Result<(), DropReason> {
    if start > end {
        return Err(DropReason::InvalidWindow);
    }
    Ok(())
}

/// `(peer, host, host_port)` from the socket tuple, empty when the kernel
/// could not resolve it.
fn conn_endpoints(conn: &ConnectionInfo) -> (String, String, u16) {
    if conn.is_unknown() {
        (String::new(), String::new(), 0)
    } else {
        (conn.src().to_string(), conn.dst().to_string(), conn.d_port)
    }
}

pub fn http_info_to_span(event: &HttpInfoEvent, service: &ServiceId) -> Result<Span, DropReason> {
    check_window(event.start_monotime_ns, event.end_monotime_ns)?;

    let (method, url) = classifier::parse_request_line(&event.buf);

    let (mut peer, mut host, mut host_port) = (String::new(), String::new(), 0u16);
    if !event.conn.is_unknown() {
        (peer, host, host_port) = conn_endpoints(&event.conn);
    } else if let Some((h, port)) = classifier::host_from_buf(&event.buf) {
        // Async SSL path: the socket tuple is gone, recover the server
        // endpoint from the request headers.
        host = h;
        host_port = port;
    }

    Ok(Span {
        kind: SpanKind::from(event.event_type),
        method,
        path: classifier::remove_query(&url).to_string(),
        peer,
        host,
        host_port,
        content_length: event.len as i64,
        request_start_ns: event.start_monotime_ns,
        start_ns: event.start_monotime_ns,
        end_ns: event.end_monotime_ns,
        status: event.status,
        service: service.clone(),
        trace_id: event.tp.trace_id,
        span_id: event.tp.span_id,
        parent_span_id: event.tp.parent_id,
        flags: event.tp.flags,
        pid: event.pid,
        statement: None,
    })
}

pub fn http_trace_to_span(trace: &HttpRequestTrace, service: &ServiceId) -> Result<Span, DropReason> {
    check_window(trace.start_monotime_ns, trace.end_monotime_ns)?;

    let (peer, host, host_port) = conn_endpoints(&trace.conn);
    let path = trace.path_str();

    Ok(Span {
        kind: SpanKind::from(trace.event_type),
        method: trace.method_str().into_owned(),
        path: classifier::remove_query(&path).to_string(),
        peer,
        host,
        host_port,
        content_length: trace.content_length,
        request_start_ns: trace.go_start_monotime_ns,
        start_ns: trace.start_monotime_ns,
        end_ns: trace.end_monotime_ns,
        status: trace.status,
        service: service.clone(),
        trace_id: trace.tp.trace_id,
        span_id: trace.tp.span_id,
        parent_span_id: trace.tp.parent_id,
        flags: trace.tp.flags,
        pid: trace.pid,
        statement: None,
    })
}

pub fn sql_to_span(event: &SqlRequestEvent, service: &ServiceId) -> Result<Span, DropReason> {
    check_window(event.start_monotime_ns, event.end_monotime_ns)?;

    let statement = cstr(event.payload()).into_owned();
    let (operation, table) = classifier::parse_operation_and_table(&statement);
    let (peer, host, host_port) = conn_endpoints(&event.conn);

    Ok(Span {
        kind: SpanKind::SqlClient,
        method: operation,
        path: table,
        peer,
        host,
        host_port,
        content_length: 0,
        request_start_ns: event.start_monotime_ns,
        start_ns: event.start_monotime_ns,
        end_ns: event.end_monotime_ns,
        // SQL outcomes are not carried at this layer.
        status: 0,
        service: service.clone(),
        trace_id: event.tp.trace_id,
        span_id: event.tp.span_id,
        parent_span_id: event.tp.parent_id,
        flags: event.tp.flags,
        pid: event.pid,
        statement: Some(statement),
    })
}

/// TCP payloads have no kind of their own; the SQL detector is the sole
/// classifier, and anything it does not recognize is dropped.
pub fn tcp_to_span(event: &TcpRequestEvent, service: &ServiceId) -> Result<Span, DropReason> {
    check_window(event.start_monotime_ns, event.end_monotime_ns)?;

    let payload = String::from_utf8_lossy(event.payload());
    let offset = classifier::sql_statement_offset(&payload).ok_or(DropReason::ClassifierMiss)?;
    let tail = &payload[offset..];
    let statement = match tail.find('\0') {
        Some(z) => &tail[..z],
        None => tail,
    };

    let (operation, table) = classifier::parse_operation_and_table(statement);
    let (peer, host, host_port) = conn_endpoints(&event.conn);

    Ok(Span {
        kind: SpanKind::SqlClient,
        method: operation,
        path: table,
        peer,
        host,
        host_port,
        content_length: 0,
        request_start_ns: event.start_monotime_ns,
        start_ns: event.start_monotime_ns,
        end_ns: event.end_monotime_ns,
        status: 0,
        service: service.clone(),
        trace_id: event.tp.trace_id,
        span_id: event.tp.span_id,
        parent_span_id: event.tp.parent_id,
        flags: event.tp.flags,
        pid: event.pid,
        statement: Some(statement.to_string()),
    })
}

/// A HEADERS fragment may not contain decodable pseudo-headers; the span
/// still emits with the side derived from the frame direction.
pub fn http2_to_span(event: &Http2RequestEvent, service: &ServiceId) -> Result<Span, DropReason> {
    check_window(event.start_monotime_ns, event.end_monotime_ns)?;

    let info = classifier::parse_headers_fragment(event.payload());
    let (peer, host, host_port) = conn_endpoints(&event.conn);
    let kind = if event.direction == 0 {
        SpanKind::GrpcServer
    } else {
        SpanKind::GrpcClient
    };

    Ok(Span {
        kind,
        method: info.method,
        path: classifier::remove_query(&info.path).to_string(),
        peer,
        host,
        host_port,
        content_length: event.len as i64,
        request_start_ns: event.start_monotime_ns,
        start_ns: event.start_monotime_ns,
        end_ns: event.end_monotime_ns,
        status: info.status,
        service: service.clone(),
        trace_id: event.tp.trace_id,
        span_id: event.tp.span_id,
        parent_span_id: event.tp.parent_id,
        flags: event.tp.flags,
        pid: event.pid,
        statement: None,
    })
}
