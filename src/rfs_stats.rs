// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                          Link Statistics
// —————————————————————————————————————————————————————————————————————————————————————————————————

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Shortest window the throughput figure is computed over.
pub const THROUGHPUT_WINDOW: Duration = Duration::from_secs(1);

/// Counters shared between the receiver, the parser and whoever displays them.
///
/// Every counter is an independent atomic, a snapshot is therefore not a single
/// consistent cut but no individual value is ever torn.
#[derive(Debug)]
pub struct LinkStats {
    pub messages_received:      AtomicU64,
    pub bytes_received:         AtomicU64,
    pub bytes_evicted:          AtomicU64,
    pub bytes_skipped:          AtomicU64,
    pub sync_errors:            AtomicU64,
    pub header_checksum_errors: AtomicU64,
    pub crc_errors:             AtomicU64,
    pub parse_errors:           AtomicU64,
    pub messages_dropped:       AtomicU64,
    pub handler_errors:         AtomicU64,
    throughput:                 Mutex<Throughput>,
}

#[derive(Debug)]
struct Throughput {
    window_start: Instant,
    window_bytes: u64,
    bytes_per_sec: f64,
}

impl Throughput {
    fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            window_bytes: 0,
            bytes_per_sec: 0.0,
        }
    }

    fn record(&mut self, bytes: u64, now: Instant) {
        self.window_bytes += bytes;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= THROUGHPUT_WINDOW {
            self.bytes_per_sec = self.window_bytes as f64 / elapsed.as_secs_f64();
            self.window_bytes = 0;
            self.window_start = now;
        }
    }
}

impl LinkStats {
    pub fn new() -> Self {
        Self {
            messages_received:      AtomicU64::new(0),
            bytes_received:         AtomicU64::new(0),
            bytes_evicted:          AtomicU64::new(0),
            bytes_skipped:          AtomicU64::new(0),
            sync_errors:            AtomicU64::new(0),
            header_checksum_errors: AtomicU64::new(0),
            crc_errors:             AtomicU64::new(0),
            parse_errors:           AtomicU64::new(0),
            messages_dropped:       AtomicU64::new(0),
            handler_errors:         AtomicU64::new(0),
            throughput:             Mutex::new(Throughput::new(Instant::now())),
        }
    }

    #[inline]
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Receiver side accounting for one chunk of incoming bytes.
    pub fn record_received(&self, bytes: usize, evicted: u64) {
        self.record_received_at(bytes, evicted, Instant::now());
    }

    pub fn record_received_at(&self, bytes: usize, evicted: u64, now: Instant) {
        Self::add(&self.bytes_received, bytes as u64);
        if evicted > 0 {
            Self::add(&self.bytes_evicted, evicted);
        }
        self.throughput
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(bytes as u64, now);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let throughput_bps = self
            .throughput
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .bytes_per_sec;

        StatsSnapshot {
            messages_received: load(&self.messages_received),
            bytes_received: load(&self.bytes_received),
            bytes_evicted: load(&self.bytes_evicted),
            bytes_skipped: load(&self.bytes_skipped),
            sync_errors: load(&self.sync_errors),
            header_checksum_errors: load(&self.header_checksum_errors),
            crc_errors: load(&self.crc_errors),
            parse_errors: load(&self.parse_errors),
            messages_dropped: load(&self.messages_dropped),
            handler_errors: load(&self.handler_errors),
            throughput_bps,
        }
    }

    pub fn reset(&self) {
        for c in [
            &self.messages_received,
            &self.bytes_received,
            &self.bytes_evicted,
            &self.bytes_skipped,
            &self.sync_errors,
            &self.header_checksum_errors,
            &self.crc_errors,
            &self.parse_errors,
            &self.messages_dropped,
            &self.handler_errors,
        ] {
            c.store(0, Ordering::Relaxed);
        }
        *self.throughput.lock().unwrap_or_else(PoisonError::into_inner) =
            Throughput::new(Instant::now());
    }
}

impl Default for LinkStats {
    fn default() -> Self {
        Self::new()
    }
}

// ——————————————————————————————————————————— Snapshot ————————————————————————————————————————————

/// Point in time copy of [`LinkStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    pub messages_received:      u64,
    pub bytes_received:         u64,
    pub bytes_evicted:          u64,
    pub bytes_skipped:          u64,
    pub sync_errors:            u64,
    pub header_checksum_errors: u64,
    pub crc_errors:             u64,
    pub parse_errors:           u64,
    pub messages_dropped:       u64,
    pub handler_errors:         u64,
    /// Incoming bytes per second over the last completed window.
    pub throughput_bps:         f64,
}

impl StatsSnapshot {
    pub fn throughput_mbps(&self) -> f64 {
        self.throughput_bps * 8.0 / (1024.0 * 1024.0)
    }

    /// CRC failures relative to all fully framed candidates, in percent.
    pub fn crc_error_rate(&self) -> f64 {
        let framed = self.messages_received + self.parse_errors + self.crc_errors;
        if framed == 0 {
            return 0.0;
        }
        self.crc_errors as f64 * 100.0 / framed as f64
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "msgs {} | rx {} B | {:.2} Mbps | sync {} | hdr {} | crc {} ({:.2}%) | parse {} | lost {} | evicted {} B",
            self.messages_received,
            self.bytes_received,
            self.throughput_mbps(),
            self.sync_errors,
            self.header_checksum_errors,
            self.crc_errors,
            self.crc_error_rate(),
            self.parse_errors,
            self.messages_dropped,
            self.bytes_evicted,
        )
    }
}
