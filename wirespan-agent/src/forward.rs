//! Ring-buffer reader and dispatcher.
//!
//! One forwarder runs per loaded tracer program. It blocks on the kernel
//! ring buffer, routes each record through codec → admission → classifier →
//! span builder, and emits batches downstream. Forwarders share nothing but
//! the PID registry and the metric counters; span ordering is preserved
//! within a forwarder, never across forwarders.

use crate::codec;
use crate::metrics;
use crate::pids::PidRegistry;
use crate::transform;
use anyhow::{Context, Result};
use aya::maps::{MapData, RingBuf};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::unix::AsyncFd;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use wirespan_types::span::{ServiceId, Span};

/// Decode one ring-buffer record into a span, consulting the admission
/// registry. Every drop is counted; decode errors are logged at debug
/// level, classifier misses are expected and silent.
pub fn read_span_from_record(
    record: &[u8],
    registry: &PidRegistry,
    service: &ServiceId,
) -> Option<Span> {
    metrics::record_ringbuf_record();

    let event = match codec::decode(record) {
        Ok(event) => event,
        Err(e) => {
            debug!("dropping undecodable record: {}", e);
            metrics::record_decode_error();
            return None;
        }
    };

    if !registry.is_allowed(event.pid()) {
        metrics::record_dropped_span("pid_blocked");
        return None;
    }

    match transform::to_span(&event, service) {
        Ok(span) => Some(span),
        Err(reason) => {
            metrics::record_dropped_span(reason.as_str());
            None
        }
    }
}

/// Span accumulator. Emits when full; the flush deadline derives from the
/// arrival of the oldest buffered span.
pub struct SpanBatcher {
    buf: Vec<Span>,
    capacity: usize,
    timeout: Duration,
    oldest: Option<Instant>,
}

impl SpanBatcher {
    pub fn new(capacity: usize, timeout: Duration) -> Self {
        SpanBatcher {
            buf: Vec::with_capacity(capacity),
            capacity,
            timeout,
            oldest: None,
        }
    }

    /// Add a span; returns the full batch once `capacity` is reached.
    pub fn push(&mut self, span: Span) -> Option<Vec<Span>> {
        if self.buf.is_empty() {
            self.oldest = Some(Instant::now());
        }
        self.buf.push(span);
        if self.buf.len() >= self.capacity {
            self.flush()
        } else {
            None
        }
    }

    /// When the currently buffered spans must be flushed.
    pub fn deadline(&self) -> Option<Instant> {
        self.oldest.map(|t| t + self.timeout)
    }

    /// Take whatever is buffered, or `None` when empty.
    pub fn flush(&mut self) -> Option<Vec<Span>> {
        self.oldest = None;
        if self.buf.is_empty() {
            None
        } else {
            Some(std::mem::replace(
                &mut self.buf,
                Vec::with_capacity(self.capacity),
            ))
        }
    }
}

/// Consume a tracer's ring buffer until cancelled, forwarding span batches
/// on `out`.
///
/// Backpressure blocks the reader on the channel send; a cancellation
/// arriving while blocked discards the in-flight batch. An unrecoverable
/// ring-buffer error drains buffered spans and surfaces the error. The
/// final drain is bounded by `batch_timeout`.
pub async fn forward_ring_buffer(
    ring: RingBuf<MapData>,
    cancel: CancellationToken,
    out: mpsc::Sender<Vec<Span>>,
    registry: Arc<PidRegistry>,
    service: ServiceId,
    batch_length: usize,
    batch_timeout: Duration,
) -> Result<()> {
    let mut fd = AsyncFd::new(ring).context("registering ring buffer with the reactor")?;
    let mut batcher = SpanBatcher::new(batch_length, batch_timeout);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                drain(&out, &mut batcher, batch_timeout).await;
                return Ok(());
            }

            _ = flush_timer(batcher.deadline()) => {
                if let Some(batch) = batcher.flush() {
                    if !send_batch(&cancel, &out, batch).await {
                        return Ok(());
                    }
                }
            }

            guard = fd.readable_mut() => {
                let mut guard = match guard {
                    Ok(guard) => guard,
                    Err(e) => {
                        // The loader closed the fd under us.
                        drain(&out, &mut batcher, batch_timeout).await;
                        return Err(e).context("ring buffer closed");
                    }
                };

                let mut full_batches = Vec::new();
                let ring = guard.get_inner_mut();
                while let Some(item) = ring.next() {
                    if let Some(span) = read_span_from_record(&item, &registry, &service) {
                        drop(item);
                        if let Some(batch) = batcher.push(span) {
                            full_batches.push(batch);
                        }
                    }
                }
                guard.clear_ready();

                for batch in full_batches {
                    if !send_batch(&cancel, &out, batch).await {
                        return Ok(());
                    }
                }
            }
        }
    }
}

async fn flush_timer(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Send one batch downstream, blocking on backpressure. Returns false when
/// the forwarder should stop: the receiver is gone, or cancellation arrived
/// mid-send (the batch is discarded then).
async fn send_batch(
    cancel: &CancellationToken,
    out: &mpsc::Sender<Vec<Span>>,
    batch: Vec<Span>,
) -> bool {
    let len = batch.len();
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            metrics::record_dropped_span("cancelled");
            false
        }
        sent = out.send(batch) => match sent {
            Ok(()) => {
                metrics::record_emitted_batch(len);
                true
            }
            Err(_) => {
                warn!("span channel closed, stopping forwarder");
                false
            }
        },
    }
}

/// Terminal flush: emit whatever is buffered within the bounded drain
/// interval, then give up.
async fn drain(out: &mpsc::Sender<Vec<Span>>, batcher: &mut SpanBatcher, timeout: Duration) {
    let Some(batch) = batcher.flush() else { return };
    let len = batch.len();
    match tokio::time::timeout(timeout, out.send(batch)).await {
        Ok(Ok(())) => metrics::record_emitted_batch(len),
        _ => debug!("discarding {} spans on drain", len),
    }
}
