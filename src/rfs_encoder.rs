pub use crate::rfs_shared::*;

use anyhow::Context;

use crate::error::EncodeError;
use crate::rfs_checksum::*;
use crate::transport::Transport;

// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                            RFS Encoder
// —————————————————————————————————————————————————————————————————————————————————————————————————

/// Wraps an already built payload (message header + body) into a frame.
pub fn encode_frame(payload: &[u8], variant: ProtocolVariant) -> Result<Vec<u8>, EncodeError> {
    // The size field is 16 bit, whatever the protocol max says
    let max = MAX_PAYLOAD_SIZE.min(u16::MAX as usize);
    if payload.is_empty() {
        return Err(EncodeError::EmptyPayload);
    }
    if payload.len() > max {
        return Err(EncodeError::PayloadTooLarge {
            size: payload.len(),
            max,
        });
    }

    let size = (payload.len() as u16).to_le_bytes();
    let mut frame = Vec::with_capacity(variant.frame_len(payload.len()));

    frame.push(SOF);
    frame.extend_from_slice(&size);
    frame.push(header_checksum([SOF, size[0], size[1]]));
    frame.extend_from_slice(payload);

    if variant != ProtocolVariant::NoCrc {
        let crc = payload_crc32(variant.crc_region(payload));
        frame.extend_from_slice(&crc.to_le_bytes());
    }

    Ok(frame)
}

/// Builds the message header + body and frames it.
pub fn encode_message(
    msg_type: MessageType,
    sequence_id: u16,
    body: &[u8],
    variant: ProtocolVariant,
) -> Result<Vec<u8>, EncodeError> {
    let mut payload = Vec::with_capacity(MSG_HEADER_LEN + body.len());
    payload.push(msg_type as u8);
    payload.extend_from_slice(&sequence_id.to_le_bytes());
    payload.extend_from_slice(body);

    encode_frame(&payload, variant)
}

// ——————————————————————————————————————————— Writer ——————————————————————————————————————————————

/// Stateful encoder handing out per type sequence ids.
///
/// The first message of each type carries id 1, ids wrap at 65536.
#[derive(Debug, Clone)]
pub struct MessageWriter {
    variant:  ProtocolVariant,
    counters: [u16; MessageType::ALL.len()],
}

impl MessageWriter {
    pub fn new(variant: ProtocolVariant) -> Self {
        Self {
            variant,
            counters: [0; MessageType::ALL.len()],
        }
    }

    pub fn variant(&self) -> ProtocolVariant {
        self.variant
    }

    /// Frames `body` with the next sequence id for `msg_type`.
    ///
    /// The counter only advances when the frame was built.
    pub fn frame(&mut self, msg_type: MessageType, body: &[u8]) -> Result<Vec<u8>, EncodeError> {
        let idx = msg_type.index();
        let seq = self.counters[idx].wrapping_add(1);
        let frame = encode_message(msg_type, seq, body, self.variant)?;
        self.counters[idx] = seq;
        Ok(frame)
    }

    /// Frames `body` and writes it to `transport`, returns the sequence id used.
    pub fn send<T>(&mut self, transport: &mut T, msg_type: MessageType, body: &[u8]) -> anyhow::Result<u16>
    where
        T: Transport + ?Sized,
    {
        let frame = self.frame(msg_type, body)?;
        transport
            .write_all(&frame)
            .with_context(|| format!("Failed to send {msg_type}"))?;
        Ok(self.last_sequence(msg_type))
    }

    /// Last id handed out for `msg_type`, 0 if none yet.
    pub fn last_sequence(&self, msg_type: MessageType) -> u16 {
        self.counters[msg_type.index()]
    }

    /// Forces the next id for `msg_type` to be `next`.
    pub fn set_next_sequence(&mut self, msg_type: MessageType, next: u16) {
        self.counters[msg_type.index()] = next.wrapping_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_layout() {
        let frame = encode_message(
            MessageType::Heartbeat,
            0x0102,
            &[0xDE, 0xAD],
            ProtocolVariant::CrcFullPayload,
        )
        .unwrap();

        assert_eq!(frame.len(), HEADER_LEN + MSG_HEADER_LEN + 2 + CRC_LEN);
        assert_eq!(frame[0], SOF);
        assert_eq!(u16::from_le_bytes([frame[1], frame[2]]), 5);
        assert_eq!(frame[3], SOF ^ 5 ^ 0);
        assert_eq!(&frame[4..9], &[0x05, 0x02, 0x01, 0xDE, 0xAD]);

        let crc = u32::from_le_bytes(frame[9..13].try_into().unwrap());
        assert_eq!(crc, payload_crc32(&frame[4..9]));
    }

    #[test]
    fn rejects_empty_and_oversized_payloads() {
        assert_eq!(
            encode_frame(&[], ProtocolVariant::CrcFullPayload),
            Err(EncodeError::EmptyPayload)
        );

        let big = vec![0u8; u16::MAX as usize + 1];
        assert_eq!(
            encode_frame(&big, ProtocolVariant::CrcFullPayload),
            Err(EncodeError::PayloadTooLarge {
                size: big.len(),
                max:  u16::MAX as usize,
            })
        );
        assert!(encode_frame(&big[1..], ProtocolVariant::NoCrc).is_ok());
    }

    #[test]
    fn writer_sequences_per_type() {
        let mut writer = MessageWriter::new(ProtocolVariant::CrcFullPayload);

        let a = writer.frame(MessageType::FrameData, &[1]).unwrap();
        let b = writer.frame(MessageType::FrameData, &[1]).unwrap();
        let c = writer.frame(MessageType::Heartbeat, &[1]).unwrap();

        let seq = |f: &[u8]| u16::from_le_bytes([f[HEADER_LEN + 1], f[HEADER_LEN + 2]]);
        assert_eq!(seq(&a), 1);
        assert_eq!(seq(&b), 2);
        assert_eq!(seq(&c), 1);
        assert_eq!(writer.last_sequence(MessageType::FrameData), 2);
    }

    #[test]
    fn send_writes_whole_frame() {
        let mut writer = MessageWriter::new(ProtocolVariant::CrcFullPayload);
        let mut wire = std::io::Cursor::new(Vec::new());

        assert_eq!(writer.send(&mut wire, MessageType::CommandRequest, &[0x01]).unwrap(), 1);
        assert_eq!(writer.send(&mut wire, MessageType::CommandRequest, &[0x05]).unwrap(), 2);

        let bytes = wire.into_inner();
        let first = encode_message(MessageType::CommandRequest, 1, &[0x01], ProtocolVariant::CrcFullPayload).unwrap();
        assert_eq!(bytes.len(), 2 * first.len());
        assert_eq!(&bytes[..first.len()], first.as_slice());
    }

    #[test]
    fn writer_wraps() {
        let mut writer = MessageWriter::new(ProtocolVariant::CrcFullPayload);
        writer.set_next_sequence(MessageType::DebugInfo, u16::MAX);

        writer.frame(MessageType::DebugInfo, b"x").unwrap();
        assert_eq!(writer.last_sequence(MessageType::DebugInfo), u16::MAX);
        writer.frame(MessageType::DebugInfo, b"x").unwrap();
        assert_eq!(writer.last_sequence(MessageType::DebugInfo), 0);
    }
}
