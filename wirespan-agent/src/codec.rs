//! Ring-buffer record decoding.
//!
//! Every record announces its kind in the first byte; the rest is the
//! little-endian, C-ABI layout of the matching `wirespan-types` struct.
//! Kinds this crate does not know fall back to the legacy Go-probe trace
//! layout, whose kind byte is the span kind itself.

use thiserror::Error;
use wirespan_types::{
    Http2RequestEvent, HttpInfoEvent, HttpRequestTrace, PidInfo, SqlRequestEvent, TcpRequestEvent,
    EVENT_K_HTTP, EVENT_K_HTTP2, EVENT_SQL_CLIENT, EVENT_TCP_UNKNOWN,
};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("empty ring buffer record")]
    Empty,
    #[error("record too short for event kind {kind}: {got} bytes, need {need}")]
    TooShort { kind: u8, got: usize, need: usize },
}

/// A decoded ring-buffer record, one variant per event kind.
#[derive(Clone, Copy)]
pub enum RawEvent {
    /// Legacy Go-probe trace (kinds 1..=4 and unknown kinds).
    Legacy(HttpRequestTrace),
    /// Kprobe-captured HTTP transaction (kind 6).
    KernelHttp(HttpInfoEvent),
    /// Kprobe-captured HTTP/2 or gRPC transaction (kind 7).
    KernelHttp2(Http2RequestEvent),
    /// SQL client transaction (kind 5).
    Sql(SqlRequestEvent),
    /// Unclassified TCP transaction (kind 8).
    Tcp(TcpRequestEvent),
}

impl RawEvent {
    pub fn pid(&self) -> &PidInfo {
        match self {
            RawEvent::Legacy(e) => &e.pid,
            RawEvent::KernelHttp(e) => &e.pid,
            RawEvent::KernelHttp2(e) => &e.pid,
            RawEvent::Sql(e) => &e.pid,
            RawEvent::Tcp(e) => &e.pid,
        }
    }
}

/// Decode one record. Short or empty records are decode errors which the
/// forwarder counts and drops; there are no retries.
pub fn decode(record: &[u8]) -> Result<RawEvent, DecodeError> {
    let kind = *record.first().ok_or(DecodeError::Empty)?;
    match kind {
        EVENT_SQL_CLIENT => Ok(RawEvent::Sql(read(record, kind)?)),
        EVENT_K_HTTP => Ok(RawEvent::KernelHttp(read(record, kind)?)),
        EVENT_K_HTTP2 => Ok(RawEvent::KernelHttp2(read(record, kind)?)),
        EVENT_TCP_UNKNOWN => Ok(RawEvent::Tcp(read(record, kind)?)),
        _ => Ok(RawEvent::Legacy(read(record, kind)?)),
    }
}

fn read<T: Copy>(record: &[u8], kind: u8) -> Result<T, DecodeError> {
    let need = std::mem::size_of::<T>();
    if record.len() < need {
        return Err(DecodeError::TooShort {
            kind,
            got: record.len(),
            need,
        });
    }
    // Ring-buffer records carry no alignment guarantee for T.
    Ok(unsafe { (record.as_ptr() as *const T).read_unaligned() })
}
