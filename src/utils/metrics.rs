//! Client-side counters.
//!
//! Every session, handshake and query cycle reports into one process-wide
//! [`Metrics`] instance; [`Metrics::snapshot`] reads them all at once and
//! [`Metrics::log_metrics`] emits them as a single structured event.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Monotonic relaxed counter
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn incr(&self) {
        self.add(1);
    }

    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    /// Decrement without wrapping below zero
    pub fn decr(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counters for everything the client does on the wire
#[derive(Debug)]
pub struct Metrics {
    pub connections_total: Counter,
    /// Sessions currently holding an open socket
    pub connections_active: Counter,
    pub connection_errors: Counter,

    pub handshakes_total: Counter,
    pub handshakes_success: Counter,
    pub handshakes_failed: Counter,

    pub frames_sent: Counter,
    pub frames_received: Counter,
    /// Bytes on the wire, frame headers included
    pub bytes_sent: Counter,
    pub bytes_received: Counter,

    pub queries_total: Counter,
    pub records_received: Counter,
    /// Records that arrived without a usable trailer
    pub records_incomplete: Counter,
    /// Desynchronized frames and undecodable records
    pub protocol_errors: Counter,

    started: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            connections_total: Counter::default(),
            connections_active: Counter::default(),
            connection_errors: Counter::default(),
            handshakes_total: Counter::default(),
            handshakes_success: Counter::default(),
            handshakes_failed: Counter::default(),
            frames_sent: Counter::default(),
            frames_received: Counter::default(),
            bytes_sent: Counter::default(),
            bytes_received: Counter::default(),
            queries_total: Counter::default(),
            records_received: Counter::default(),
            records_incomplete: Counter::default(),
            protocol_errors: Counter::default(),
            started: Instant::now(),
        }
    }

    pub fn connection_established(&self) {
        self.connections_total.incr();
        self.connections_active.incr();
    }

    pub fn connection_closed(&self) {
        self.connections_active.decr();
    }

    pub fn connection_error(&self) {
        self.connection_errors.incr();
    }

    pub fn handshake_attempt(&self) {
        self.handshakes_total.incr();
    }

    pub fn handshake_success(&self) {
        self.handshakes_success.incr();
    }

    pub fn handshake_failed(&self) {
        self.handshakes_failed.incr();
    }

    /// One frame written, `byte_count` including its length header
    pub fn frame_sent(&self, byte_count: u64) {
        self.frames_sent.incr();
        self.bytes_sent.add(byte_count);
    }

    /// One frame read, `byte_count` including its length header
    pub fn frame_received(&self, byte_count: u64) {
        self.frames_received.incr();
        self.bytes_received.add(byte_count);
    }

    pub fn query_issued(&self) {
        self.queries_total.incr();
    }

    pub fn record_received(&self, complete: bool) {
        self.records_received.incr();
        if !complete {
            self.records_incomplete.incr();
        }
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.incr();
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.get(),
            connections_active: self.connections_active.get(),
            connection_errors: self.connection_errors.get(),
            handshakes_total: self.handshakes_total.get(),
            handshakes_success: self.handshakes_success.get(),
            handshakes_failed: self.handshakes_failed.get(),
            frames_sent: self.frames_sent.get(),
            frames_received: self.frames_received.get(),
            bytes_sent: self.bytes_sent.get(),
            bytes_received: self.bytes_received.get(),
            queries_total: self.queries_total.get(),
            records_received: self.records_received.get(),
            records_incomplete: self.records_incomplete.get(),
            protocol_errors: self.protocol_errors.get(),
            uptime_seconds: self.started.elapsed().as_secs(),
        }
    }

    pub fn log_metrics(&self) {
        let s = self.snapshot();
        info!(
            connections = s.connections_total,
            active = s.connections_active,
            connection_errors = s.connection_errors,
            handshakes = s.handshakes_total,
            handshakes_ok = s.handshakes_success,
            handshakes_failed = s.handshakes_failed,
            frames_out = s.frames_sent,
            frames_in = s.frames_received,
            bytes_out = s.bytes_sent,
            bytes_in = s.bytes_received,
            queries = s.queries_total,
            records = s.records_received,
            records_incomplete = s.records_incomplete,
            protocol_errors = s.protocol_errors,
            uptime_seconds = s.uptime_seconds,
            "Client metrics"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`Metrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub connection_errors: u64,
    pub handshakes_total: u64,
    pub handshakes_success: u64,
    pub handshakes_failed: u64,
    pub frames_sent: u64,
    pub frames_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub queries_total: u64,
    pub records_received: u64,
    pub records_incomplete: u64,
    pub protocol_errors: u64,
    pub uptime_seconds: u64,
}

static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Process-wide metrics shared by every session
pub fn global_metrics() -> &'static Metrics {
    &METRICS
}

/// Logs how long an operation took when dropped
pub struct Timer {
    started: Instant,
    operation: &'static str,
}

impl Timer {
    pub fn start(operation: &'static str) -> Self {
        Self {
            started: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        debug!(
            operation = self.operation,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Operation finished"
        );
    }
}
