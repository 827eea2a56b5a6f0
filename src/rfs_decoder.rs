pub use crate::rfs_shared::*;

use tracing::debug;

use crate::error::{ParseError, ParseResult};
use crate::rfs_sequence::SequenceTracker;

// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                            RFS Decoder
// —————————————————————————————————————————————————————————————————————————————————————————————————

/// Decoded Message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub msg_type:    MessageType,
    pub sequence_id: u16,
    pub body:        Vec<u8>,
}

impl Message {
    /// Splits a validated frame payload into type, sequence id and body.
    ///
    /// Stateless, see [`MessageDecoder::decode`] for the version that tracks sequences.
    pub fn parse(payload: &[u8]) -> ParseResult<Self> {
        if payload.len() < MSG_HEADER_LEN {
            return Err(ParseError::TooShort {
                needed: MSG_HEADER_LEN,
                got:    payload.len(),
            });
        }

        let msg_type = MessageType::try_from(payload[0]).map_err(ParseError::UnknownType)?;
        let sequence_id = u16::from_le_bytes([payload[1], payload[2]]);

        Ok(Self {
            msg_type,
            sequence_id,
            body: payload[MSG_HEADER_LEN..].to_vec(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct MessageDecoder {
    sequences: SequenceTracker,
    pending_dropped: u64,
}

impl MessageDecoder {
    pub fn new(drop_threshold: u16) -> Self {
        Self {
            sequences: SequenceTracker::with_threshold(drop_threshold),
            pending_dropped: 0,
        }
    }

    /// Decodes one payload and feeds its sequence id to the tracker.
    ///
    /// Messages are never rejected because of a sequence gap, the gap is only counted.
    pub fn decode(&mut self, payload: &[u8]) -> ParseResult<Message> {
        let message = Message::parse(payload)?;

        let dropped = self.sequences.observe(message.msg_type, message.sequence_id);
        if dropped > 0 {
            debug!(
                msg_type = %message.msg_type,
                seq = message.sequence_id,
                dropped,
                "sequence gap"
            );
            self.pending_dropped += dropped as u64;
        }

        Ok(message)
    }

    /// Messages lost since the previous call.
    pub fn take_dropped(&mut self) -> u64 {
        std::mem::take(&mut self.pending_dropped)
    }

    pub fn sequences(&self) -> &SequenceTracker {
        &self.sequences
    }

    pub fn reset(&mut self) {
        self.sequences.reset();
        self.pending_dropped = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_header_and_body() {
        let msg = Message::parse(&[0x02, 0x34, 0x12, 0xAA, 0xBB]).unwrap();
        assert_eq!(msg.msg_type, MessageType::DetectionResults);
        assert_eq!(msg.sequence_id, 0x1234);
        assert_eq!(msg.body, vec![0xAA, 0xBB]);

        let empty = Message::parse(&[0x05, 0x01, 0x00]).unwrap();
        assert!(empty.body.is_empty());
    }

    #[test]
    fn rejects_short_and_unknown() {
        assert_eq!(
            Message::parse(&[0x05, 0x01]),
            Err(ParseError::TooShort { needed: 3, got: 2 })
        );
        assert_eq!(Message::parse(&[0x00, 0x01, 0x00]), Err(ParseError::UnknownType(0x00)));
        assert_eq!(Message::parse(&[0x42, 0x01, 0x00, 7]), Err(ParseError::UnknownType(0x42)));
    }

    #[test]
    fn decoder_accumulates_gaps() {
        let mut decoder = MessageDecoder::default();
        for seq in [1u16, 2, 4, 4, 8] {
            let mut payload = vec![MessageType::Heartbeat as u8];
            payload.extend_from_slice(&seq.to_le_bytes());
            decoder.decode(&payload).unwrap();
        }

        assert_eq!(decoder.take_dropped(), 4);
        assert_eq!(decoder.take_dropped(), 0);
        assert_eq!(decoder.sequences().last_seen(MessageType::Heartbeat), Some(8));

        decoder.reset();
        assert_eq!(decoder.sequences().last_seen(MessageType::Heartbeat), None);
    }

    #[test]
    fn unknown_type_does_not_touch_tracker() {
        let mut decoder = MessageDecoder::default();
        assert!(decoder.decode(&[0x0F, 0x01, 0x00]).is_err());
        for t in MessageType::ALL {
            assert_eq!(decoder.sequences().last_seen(t), None);
        }
    }
}
