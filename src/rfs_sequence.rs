// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                         Sequence Tracker
// —————————————————————————————————————————————————————————————————————————————————————————————————

use crate::rfs_shared::*;

/// Gaps at or above this are treated as a fresh stream or a device reset, not as loss.
pub const DEFAULT_DROP_THRESHOLD: u16 = 1000;

/// Per message type loss detection over the 16 bit wrapping sequence id.
///
/// Purely advisory: it never rejects or reorders anything, it only reports how many
/// messages went missing between two observations of the same type.
#[derive(Debug, Clone)]
pub struct SequenceTracker {
    last:      [Option<u16>; MessageType::ALL.len()],
    dropped:   [u64; MessageType::ALL.len()],
    threshold: u16,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_DROP_THRESHOLD)
    }

    pub fn with_threshold(threshold: u16) -> Self {
        Self {
            last: [None; MessageType::ALL.len()],
            dropped: [0; MessageType::ALL.len()],
            threshold,
        }
    }

    /// Records `seq` as the last seen id for `msg_type` and returns the number of
    /// messages lost since the previous one.
    ///
    /// First sighting, in order, duplicate and implausibly large gaps all report 0.
    pub fn observe(&mut self, msg_type: MessageType, seq: u16) -> u16 {
        let idx = msg_type.index();
        let previous = self.last[idx].replace(seq);

        let Some(last) = previous
        else {
            return 0;
        };

        // Distance from the expected id (last + 1), mod 2^16
        let gap = seq.wrapping_sub(last).wrapping_sub(1);
        if gap == 0 || gap >= self.threshold {
            return 0;
        }

        self.dropped[idx] += gap as u64;
        gap
    }

    pub fn last_seen(&self, msg_type: MessageType) -> Option<u16> {
        self.last[msg_type.index()]
    }

    /// Total reported losses for one message type.
    pub fn dropped(&self, msg_type: MessageType) -> u64 {
        self.dropped[msg_type.index()]
    }

    pub fn threshold(&self) -> u16 {
        self.threshold
    }

    pub fn reset(&mut self) {
        self.last = [None; MessageType::ALL.len()];
        self.dropped = [0; MessageType::ALL.len()];
    }
}

impl Default for SequenceTracker {
    fn default() -> Self {
        Self::new()
    }
}
