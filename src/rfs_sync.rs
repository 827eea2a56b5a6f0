// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                        Frame Synchronizer
// —————————————————————————————————————————————————————————————————————————————————————————————————

//! Locates, validates and extracts frames from the ring buffer.
//!
//! ```text
//!            marker found            header ok           full frame + CRC ok
//!  Seeking ───────────────► Header ──────────────► Payload ─────────────────────► Frame
//!     ▲                     Candidate   │           Pending   │
//!     │      bad checksum / size: drop 1 byte       │  CRC mismatch: frame dropped
//!     └─────────────────────────────────┴───────────┴─────────┘
//! ```
//!
//! Each failure consumes at least one byte, so the parser always makes forward progress,
//! and each scan is bounded by the scan window. Nothing is consumed while a frame is
//! still incomplete.

use tracing::debug;

use crate::config::LinkConfig;
use crate::rfs_buffer::{RingBuffer, Take};
use crate::rfs_checksum::*;
use crate::rfs_shared::*;
use crate::rfs_stats::LinkStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No aligned marker yet.
    Seeking,
    /// Marker at the read cursor, header not validated yet.
    HeaderCandidate,
    /// Header validated, waiting for payload and CRC.
    PayloadPending {
        header:      [u8; HEADER_LEN],
        payload_len: usize,
    },
}

/// Why a candidate frame was thrown away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discard {
    HeaderChecksum,
    /// Declared payload size is 0 or above the configured maximum.
    InvalidSize(usize),
    Crc { received: u32, computed: u32 },
    /// The validated header was evicted by a buffer overflow before the frame completed.
    Evicted,
}

/// Outcome of one [`FrameSynchronizer::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Validated payload (message header + body).
    Frame(Vec<u8>),
    /// Not enough buffered data, call again once more bytes arrived.
    Incomplete,
    /// A candidate was rejected and its bytes dropped, calling again may yield more.
    Discarded(Discard),
}

#[derive(Debug, Clone)]
pub struct FrameSynchronizer {
    state:                SyncState,
    variant:              ProtocolVariant,
    max_payload_size:     usize,
    scan_window:          usize,
    sync_noise_threshold: usize,
}

impl FrameSynchronizer {
    pub fn new(config: &LinkConfig) -> Self {
        Self {
            state:                SyncState::Seeking,
            variant:              config.variant,
            max_payload_size:     config.max_payload_size.min(MAX_PAYLOAD_SIZE),
            scan_window:          config.scan_window.max(1),
            sync_noise_threshold: config.sync_noise_threshold,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn variant(&self) -> ProtocolVariant {
        self.variant
    }

    /// Forget any partially recognised frame.
    pub fn reset(&mut self) {
        self.state = SyncState::Seeking;
    }

    /// Runs the state machine until it yields a frame, runs out of data or discards one
    /// candidate. Counters in `stats` are updated for every discarded byte range.
    pub fn poll(&mut self, buf: &RingBuffer, stats: &LinkStats) -> SyncEvent {
        // ---- Seeking
        if self.state == SyncState::Seeking {
            let (skipped, found) = buf.skip_until(SOF, self.scan_window);

            if skipped > 0 {
                LinkStats::add(&stats.bytes_skipped, skipped as u64);
                if skipped > self.sync_noise_threshold {
                    LinkStats::incr(&stats.sync_errors);
                    debug!(skipped, "resync: skipped bytes before frame marker");
                }
            }

            if !found {
                return SyncEvent::Incomplete;
            }
            self.state = SyncState::HeaderCandidate;
        }

        // ---- Header Candidate
        if self.state == SyncState::HeaderCandidate {
            let mut header = [0u8; HEADER_LEN];
            if !buf.peek_into(&mut header) {
                return SyncEvent::Incomplete;
            }

            if header[0] != SOF {
                // Marker was evicted under us
                self.state = SyncState::Seeking;
                return self.poll(buf, stats);
            }

            if !header_is_valid(&header) {
                buf.skip(1);
                self.state = SyncState::Seeking;
                LinkStats::incr(&stats.header_checksum_errors);
                debug!(?header, "header checksum mismatch");
                return SyncEvent::Discarded(Discard::HeaderChecksum);
            }

            let payload_len = u16::from_le_bytes([header[1], header[2]]) as usize;
            if payload_len == 0 || payload_len > self.max_payload_size {
                buf.skip(1);
                self.state = SyncState::Seeking;
                LinkStats::incr(&stats.sync_errors);
                debug!(payload_len, "implausible payload size in header");
                return SyncEvent::Discarded(Discard::InvalidSize(payload_len));
            }

            self.state = SyncState::PayloadPending {
                header,
                payload_len,
            };
        }

        // ---- Payload Pending
        let SyncState::PayloadPending {
            header,
            payload_len,
        } = self.state
        else {
            return SyncEvent::Incomplete;
        };

        let total = self.variant.frame_len(payload_len);
        let mut frame = match buf.consume_prefixed(&header, total) {
            Take::Ready(frame) => frame,
            Take::Short => return SyncEvent::Incomplete,
            Take::Mismatch => {
                self.state = SyncState::Seeking;
                LinkStats::incr(&stats.sync_errors);
                debug!("pending frame evicted before completion");
                return SyncEvent::Discarded(Discard::Evicted);
            }
        };
        self.state = SyncState::Seeking;

        let payload_end = HEADER_LEN + payload_len;

        if self.variant != ProtocolVariant::NoCrc {
            let crc_bytes = &frame[payload_end..payload_end + CRC_LEN];
            let received = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
            let computed = payload_crc32(self.variant.crc_region(&frame[HEADER_LEN..payload_end]));

            if received != computed {
                LinkStats::incr(&stats.crc_errors);
                debug!(received, computed, payload_len, "CRC mismatch, frame dropped");
                return SyncEvent::Discarded(Discard::Crc { received, computed });
            }
        }

        frame.truncate(payload_end);
        frame.drain(..HEADER_LEN);
        SyncEvent::Frame(frame)
    }
}
