// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                          RFS Ring Buffer
// —————————————————————————————————————————————————————————————————————————————————————————————————

//! Fixed capacity byte ring sitting between the serial reader and the frame parser.
//!
//! The producer never blocks and never fails: when an append doesn't fit, the oldest
//! unread bytes are evicted to make room. Evictions are counted so the loss is visible.
//! All access goes through one mutex, which is enough for the single producer / single
//! consumer pattern the link uses.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::rfs_shared::*;

pub struct RingBuffer {
    inner: Mutex<Ring>,
}

/// Result of [`RingBuffer::consume_prefixed`].
#[derive(Debug, PartialEq, Eq)]
pub enum Take {
    Ready(Vec<u8>),
    /// Not enough unread bytes yet, nothing consumed.
    Short,
    /// The unread bytes no longer start with the expected prefix, nothing consumed.
    Mismatch,
}

struct Ring {
    data:    Box<[u8]>,
    read:    usize,
    write:   usize,
    count:   usize,
    evicted: u64,
}

impl Ring {
    #[inline]
    fn cap(&self) -> usize {
        self.data.len()
    }

    #[inline]
    fn advance_read(&mut self, n: usize) {
        debug_assert!(n <= self.count);
        self.read = (self.read + n) % self.cap();
        self.count -= n;
    }

    /// Appends `src`, evicting from the head as needed. Returns evicted byte count.
    fn push(&mut self, mut src: &[u8]) -> usize {
        let cap = self.cap();
        let mut evicted = 0;

        // Only the newest `cap` bytes can survive
        if src.len() >= cap {
            evicted += self.count + (src.len() - cap);
            src = &src[src.len() - cap..];
            self.read = 0;
            self.write = 0;
            self.count = 0;
        }

        let free = cap - self.count;
        if src.len() > free {
            let drop = src.len() - free;
            self.advance_read(drop);
            evicted += drop;
        }

        let first = src.len().min(cap - self.write);
        self.data[self.write..self.write + first].copy_from_slice(&src[..first]);
        let rest = src.len() - first;
        self.data[..rest].copy_from_slice(&src[first..]);

        self.write = (self.write + src.len()) % cap;
        self.count += src.len();
        self.evicted += evicted as u64;

        evicted
    }

    /// Copies `out.len()` unread bytes starting at the read cursor. Caller checks count.
    fn copy_out(&self, out: &mut [u8]) {
        let n = out.len();
        let first = n.min(self.cap() - self.read);
        out[..first].copy_from_slice(&self.data[self.read..self.read + first]);
        out[first..].copy_from_slice(&self.data[..n - first]);
    }

    #[inline]
    fn byte_at(&self, offset: usize) -> u8 {
        self.data[(self.read + offset) % self.cap()]
    }
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Ring {
                data:    vec![0u8; capacity].into_boxed_slice(),
                read:    0,
                write:   0,
                count:   0,
                evicted: 0,
            }),
        }
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, Ring> {
        // A panicking holder can't leave the cursors half updated, keep going
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ——————————————————————————————————————————— Producer ————————————————————————————————————————

    /// Appends incoming bytes. Never fails, never blocks.
    ///
    /// If there is not enough free space the oldest unread bytes are dropped first.
    /// Returns how many bytes of `data` this call left in the buffer, which is
    /// `min(data.len(), capacity)`: a write larger than the ring keeps only its newest
    /// `capacity` bytes. Use [`RingBuffer::evicted`] to observe the loss.
    pub fn write(&self, data: &[u8]) -> usize {
        self.write_evicting(data).0
    }

    /// [`RingBuffer::write`] that also reports how many bytes this call evicted, counting
    /// both old unread bytes and the head of an oversized `data`.
    pub fn write_evicting(&self, data: &[u8]) -> (usize, usize) {
        if data.is_empty() {
            return (0, 0);
        }
        let mut ring = self.lock();
        let accepted = data.len().min(ring.cap());
        let evicted = ring.push(data);
        (accepted, evicted)
    }

    // ——————————————————————————————————————————— Consumer ————————————————————————————————————————

    /// Copy of the next `n` unread bytes, cursor untouched.
    pub fn peek(&self, n: usize) -> Option<Vec<u8>> {
        let ring = self.lock();
        if ring.count < n {
            return None;
        }
        let mut out = vec![0u8; n];
        ring.copy_out(&mut out);
        Some(out)
    }

    /// Fills `out` from the read cursor without consuming. False if not enough data.
    pub fn peek_into(&self, out: &mut [u8]) -> bool {
        let ring = self.lock();
        if ring.count < out.len() {
            return false;
        }
        ring.copy_out(out);
        true
    }

    pub fn peek_byte(&self) -> Option<u8> {
        let ring = self.lock();
        (ring.count > 0).then(|| ring.byte_at(0))
    }

    /// Like [`RingBuffer::peek`] but advances the read cursor.
    pub fn consume(&self, n: usize) -> Option<Vec<u8>> {
        let mut ring = self.lock();
        if ring.count < n {
            return None;
        }
        let mut out = vec![0u8; n];
        ring.copy_out(&mut out);
        ring.advance_read(n);
        Some(out)
    }

    /// Consumes `n` bytes only if they start with `prefix`, checked under the same lock.
    ///
    /// Lets the parser commit to a frame whose header it validated earlier even though
    /// the producer may have evicted those bytes in between.
    pub fn consume_prefixed(&self, prefix: &[u8], n: usize) -> Take {
        let mut ring = self.lock();
        if ring.count < n || ring.count < prefix.len() {
            return Take::Short;
        }
        if prefix.iter().enumerate().any(|(i, &b)| ring.byte_at(i) != b) {
            return Take::Mismatch;
        }
        let mut out = vec![0u8; n];
        ring.copy_out(&mut out);
        ring.advance_read(n);
        Take::Ready(out)
    }

    /// Drops up to `n` unread bytes without copying them out. Returns bytes dropped.
    pub fn skip(&self, n: usize) -> usize {
        let mut ring = self.lock();
        let n = n.min(ring.count);
        ring.advance_read(n);
        n
    }

    /// Drops bytes until `marker` is at the read cursor, looking at most at `max_scan`
    /// bytes. Returns how many bytes were dropped and whether the marker was reached.
    pub fn skip_until(&self, marker: u8, max_scan: usize) -> (usize, bool) {
        let mut ring = self.lock();
        let limit = max_scan.min(ring.count);

        let mut skipped = 0;
        while skipped < limit && ring.byte_at(skipped) != marker {
            skipped += 1;
        }
        ring.advance_read(skipped);

        let found = ring.count > 0 && ring.byte_at(0) == marker;
        (skipped, found)
    }

    // ———————————————————————————————————————————— State ——————————————————————————————————————————

    pub fn available(&self) -> usize {
        self.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap()
    }

    /// Total bytes dropped by overflow since creation.
    pub fn evicted(&self) -> u64 {
        self.lock().evicted
    }

    pub fn clear(&self) {
        let mut ring = self.lock();
        ring.read = 0;
        ring.write = 0;
        ring.count = 0;
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ring = self.lock();
        f.debug_struct("RingBuffer")
            .field("capacity", &ring.cap())
            .field("available", &ring.count)
            .field("evicted", &ring.evicted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn write_peek_consume() {
        let buf = RingBuffer::new(16);
        assert_eq!(buf.write(&[1, 2, 3, 4, 5]), 5);
        assert_eq!(buf.available(), 5);

        assert_eq!(buf.peek(3), Some(vec![1, 2, 3]));
        assert_eq!(buf.available(), 5);

        assert_eq!(buf.consume(2), Some(vec![1, 2]));
        assert_eq!(buf.available(), 3);
        assert_eq!(buf.peek_byte(), Some(3));
    }

    #[test]
    fn insufficient_data_leaves_buffer_untouched() {
        let buf = RingBuffer::new(16);
        buf.write(&[9, 8, 7]);

        assert_eq!(buf.peek(4), None);
        assert_eq!(buf.consume(4), None);
        assert_eq!(buf.available(), 3);
        assert_eq!(buf.peek(3), Some(vec![9, 8, 7]));
    }

    #[test]
    fn wraps_around_capacity() {
        let buf = RingBuffer::new(8);
        buf.write(&[0, 1, 2, 3, 4, 5]);
        buf.consume(5);
        buf.write(&[6, 7, 8, 9, 10, 11]);

        assert_eq!(buf.available(), 7);
        assert_eq!(buf.consume(7), Some(vec![5, 6, 7, 8, 9, 10, 11]));
        assert!(buf.is_empty());
        assert_eq!(buf.evicted(), 0);
    }

    #[test]
    fn overflow_evicts_oldest_first() {
        let buf = RingBuffer::new(8);
        buf.write(&[0, 1, 2, 3, 4, 5]);
        buf.write(&[6, 7, 8, 9]);

        assert_eq!(buf.available(), 8);
        assert_eq!(buf.evicted(), 2);
        assert_eq!(buf.peek(8), Some(vec![2, 3, 4, 5, 6, 7, 8, 9]));
    }

    #[test]
    fn oversized_write_keeps_newest_capacity_bytes() {
        let buf = RingBuffer::new(100);
        buf.write(&[0xEE; 30]);

        // Monotonic tags: byte i carries i, the survivors must be the last 100 in order
        let tagged: Vec<u8> = (0..250u8).collect();
        assert_eq!(buf.write(&tagged), 100);

        assert_eq!(buf.available(), buf.capacity());
        assert_eq!(buf.evicted(), 30 + 150);
        let kept = buf.consume(100).unwrap();
        assert_eq!(kept, (150..250u8).collect::<Vec<_>>());
    }

    #[test]
    fn skip_until_marker() {
        let buf = RingBuffer::new(32);
        buf.write(&[1, 2, 3, SOF, 4]);

        assert_eq!(buf.skip_until(SOF, 2), (2, false));
        assert_eq!(buf.skip_until(SOF, 100), (1, true));
        assert_eq!(buf.peek_byte(), Some(SOF));

        // Already aligned: nothing dropped
        assert_eq!(buf.skip_until(SOF, 100), (0, true));
    }

    #[test]
    fn skip_until_drains_noise_without_marker() {
        let buf = RingBuffer::new(32);
        buf.write(&[1, 2, 3]);
        assert_eq!(buf.skip_until(SOF, 100), (3, false));
        assert!(buf.is_empty());
    }

    #[test]
    fn consume_prefixed_checks_head() {
        let buf = RingBuffer::new(16);
        buf.write(&[SOF, 3, 0, 0xA9, 1, 2]);

        assert_eq!(buf.consume_prefixed(&[SOF, 3], 8), Take::Short);
        assert_eq!(buf.consume_prefixed(&[SOF, 4], 4), Take::Mismatch);
        assert_eq!(buf.available(), 6);
        assert_eq!(buf.consume_prefixed(&[SOF, 3], 4), Take::Ready(vec![SOF, 3, 0, 0xA9]));
        assert_eq!(buf.available(), 2);
    }

    #[test]
    fn clear_resets() {
        let buf = RingBuffer::new(4);
        buf.write(&[1, 2, 3]);
        buf.clear();
        assert_eq!(buf.available(), 0);
        buf.write(&[4]);
        assert_eq!(buf.peek(1), Some(vec![4]));
    }

    #[test]
    fn single_producer_single_consumer_keeps_order() {
        const TOTAL: usize = 100_000;

        let buf = Arc::new(RingBuffer::new(TOTAL + 1));
        let producer = {
            let buf = Arc::clone(&buf);
            thread::spawn(move || {
                let data: Vec<u8> = (0..TOTAL).map(|i| (i % 251) as u8).collect();
                for chunk in data.chunks(97) {
                    buf.write(chunk);
                }
            })
        };

        let mut received = Vec::with_capacity(TOTAL);
        while received.len() < TOTAL {
            let n = buf.available().min(64);
            if let Some(bytes) = buf.consume(n) {
                received.extend_from_slice(&bytes);
            }
            thread::yield_now();
        }
        producer.join().unwrap();

        assert!(received.iter().enumerate().all(|(i, &b)| b == (i % 251) as u8));
        assert_eq!(buf.evicted(), 0);
    }
}
