//! End-to-end checks of the record → span pipeline through the public API:
//! encoded ring-buffer bytes in, spans (or counted drops) out.

use wirespan_agent::forward::read_span_from_record;
use wirespan_agent::{PidRegistry, ServiceId, SpanKind};
use wirespan_types::*;

fn bytes_of<T>(v: &T) -> &[u8] {
    unsafe { std::slice::from_raw_parts(v as *const T as *const u8, std::mem::size_of::<T>()) }
}

fn service() -> ServiceId {
    ServiceId {
        name: "checkout".into(),
        namespace: "prod".into(),
        auto_name: true,
        ..Default::default()
    }
}

fn pid(host: u32) -> PidInfo {
    PidInfo {
        host_pid: host,
        user_pid: host,
        ns: 1,
    }
}

#[test]
fn kprobe_http_record_becomes_server_span() {
    let mut event = HttpInfoEvent::new();
    let buf = b"GET /api/v1/users?active=true HTTP/1.1\r\nHost: svc:8080\r\n\r\n";
    event.buf[..buf.len()].copy_from_slice(buf);
    event.len = buf.len() as u32;
    event.event_type = 1;
    event.status = 200;
    event.start_monotime_ns = 10;
    event.end_monotime_ns = 20;
    event.pid = pid(4242);

    let registry = PidRegistry::new(false);
    registry.allow(4242, 1);

    let span = read_span_from_record(bytes_of(&event), &registry, &service()).unwrap();
    assert_eq!(span.kind, SpanKind::HttpServer);
    assert_eq!(span.method, "GET");
    assert_eq!(span.path, "/api/v1/users");
    assert_eq!(span.host, "svc");
    assert_eq!(span.host_port, 8080);
    assert_eq!(span.status, 200);
    assert_eq!(span.service.name, "checkout");
    assert_eq!(span.pid.host_pid, 4242);
}

#[test]
fn one_record_one_span_until_blocked() {
    let mut event = HttpInfoEvent::new();
    let buf = b"GET / HTTP/1.1\r\n";
    event.buf[..buf.len()].copy_from_slice(buf);
    event.event_type = 1;
    event.end_monotime_ns = 1;
    event.pid = pid(4242);
    let record = bytes_of(&event).to_vec();

    let registry = PidRegistry::new(false);
    registry.allow(4242, 1);

    // Every in-kernel record yields exactly one span while admitted.
    assert!(read_span_from_record(&record, &registry, &service()).is_some());
    assert!(read_span_from_record(&record, &registry, &service()).is_some());

    registry.block(4242, 1);
    assert!(read_span_from_record(&record, &registry, &service()).is_none());
}

#[test]
fn legacy_go_probe_record_round_trips() {
    let mut trace = HttpRequestTrace::new();
    trace.event_type = 3; // HTTP client span from the Go probes
    trace.method[..4].copy_from_slice(b"POST");
    trace.path[..9].copy_from_slice(b"/payments");
    trace.go_start_monotime_ns = 5;
    trace.start_monotime_ns = 7;
    trace.end_monotime_ns = 9;
    trace.status = 502;
    trace.pid = pid(7);

    let registry = PidRegistry::new(true);
    let span = read_span_from_record(bytes_of(&trace), &registry, &service()).unwrap();
    assert_eq!(span.kind, SpanKind::HttpClient);
    assert_eq!(span.method, "POST");
    assert_eq!(span.path, "/payments");
    assert_eq!(span.request_start_ns, 5);
    assert_eq!(span.status, 502);
}

#[test]
fn sql_record_keeps_statement_verbatim() {
    let mut event = SqlRequestEvent::new();
    let stmt = b"SELECT id, name FROM public.users WHERE id = $1";
    event.buf[..stmt.len()].copy_from_slice(stmt);
    event.len = stmt.len() as u32;
    event.end_monotime_ns = 3;
    event.pid = pid(11);

    let registry = PidRegistry::new(true);
    let span = read_span_from_record(bytes_of(&event), &registry, &service()).unwrap();
    assert_eq!(span.kind, SpanKind::SqlClient);
    assert_eq!(span.method, "SELECT");
    assert_eq!(span.path, "users");
    assert_eq!(
        span.statement.as_deref(),
        Some("SELECT id, name FROM public.users WHERE id = $1")
    );
}

#[test]
fn tcp_record_without_sql_is_dropped() {
    let mut event = TcpRequestEvent::new();
    let junk = b"\x16\x03\x01\x02\x00binaryjunk";
    event.buf[..junk.len()].copy_from_slice(junk);
    event.len = junk.len() as u32;
    event.pid = pid(11);

    let registry = PidRegistry::new(true);
    assert!(read_span_from_record(bytes_of(&event), &registry, &service()).is_none());
}

#[test]
fn http2_record_side_follows_direction() {
    let mut event = Http2RequestEvent::new();
    // HEADERS frame with :status 200 indexed
    let frame = [0u8, 0, 1, 0x1, 0x4, 0, 0, 0, 1, 0x88];
    event.buf[..frame.len()].copy_from_slice(&frame);
    event.len = frame.len() as u32;
    event.direction = 1;
    event.end_monotime_ns = 2;
    event.pid = pid(11);

    let registry = PidRegistry::new(true);
    let span = read_span_from_record(bytes_of(&event), &registry, &service()).unwrap();
    assert_eq!(span.kind, SpanKind::GrpcClient);
    assert_eq!(span.status, 200);
}

#[test]
fn record_with_reversed_window_is_dropped() {
    let mut event = HttpInfoEvent::new();
    event.event_type = 1;
    event.start_monotime_ns = 100;
    event.end_monotime_ns = 50;
    event.pid = pid(11);

    let registry = PidRegistry::new(true);
    assert!(read_span_from_record(bytes_of(&event), &registry, &service()).is_none());
}

#[test]
fn truncated_record_is_dropped() {
    let mut event = HttpInfoEvent::new();
    event.pid = pid(11);
    let record = bytes_of(&event);
    let registry = PidRegistry::new(true);
    assert!(read_span_from_record(&record[..record.len() / 2], &registry, &service()).is_none());
}
