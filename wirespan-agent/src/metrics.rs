//! Ingest-path counters, recorded through the `metrics` facade. The
//! embedding application decides which recorder/exporter to install; without
//! one, every call is a no-op.

use metrics::{counter, describe_counter};

/// Register metric descriptions. Call once at startup, after the recorder
/// is installed.
pub fn init() {
    describe_counter!(
        "wirespan_ringbuf_records_total",
        "Ring buffer records read across all forwarders"
    );
    describe_counter!(
        "wirespan_decode_errors_total",
        "Records dropped because their layout could not be decoded"
    );
    describe_counter!(
        "wirespan_spans_dropped_total",
        "Spans dropped before emission, by reason"
    );
    describe_counter!("wirespan_spans_emitted_total", "Spans emitted downstream");
    describe_counter!(
        "wirespan_batches_emitted_total",
        "Span batches emitted downstream"
    );
}

pub fn record_ringbuf_record() {
    counter!("wirespan_ringbuf_records_total").increment(1);
}

pub fn record_decode_error() {
    counter!("wirespan_decode_errors_total").increment(1);
}

pub fn record_dropped_span(reason: &'static str) {
    counter!("wirespan_spans_dropped_total", "reason" => reason).increment(1);
}

pub fn record_emitted_batch(len: usize) {
    counter!("wirespan_spans_emitted_total").increment(len as u64);
    counter!("wirespan_batches_emitted_total").increment(1);
}
