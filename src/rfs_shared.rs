// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                           RFS Protocol
// —————————————————————————————————————————————————————————————————————————————————————————————————

/// RFS Protocol (Robust Framed Stream)
///
/// Recovers discrete messages from a continuous, lossy, high baud rate serial link.
/// The header carries its own XOR checksum so a false marker is rejected before the
/// receiver commits to waiting for a payload. The payload is covered by a CRC32 that
/// matches the STM32 hardware CRC peripheral.
///
/// Frame Structure:
/// [SOF:1][SIZE:2 LE][HCHK:1][PAYLOAD:SIZE][CRC32:4 LE]
///
/// Message Structure (inside PAYLOAD):
/// [TYPE:1][SEQ:2 LE][BODY:SIZE-3]
///
/// HCHK = SOF ^ SIZE_LO ^ SIZE_HI
pub const SOF: u8 = 0xAA;

pub const SOF_LEN: usize = 1;
pub const SIZE_LEN: usize = 2;
pub const HCHK_LEN: usize = 1;
pub const CRC_LEN: usize = 4;

pub const HEADER_LEN: usize = SOF_LEN + SIZE_LEN + HCHK_LEN;

pub const MSG_TYPE_LEN: usize = 1;
pub const MSG_SEQ_LEN: usize = 2;
pub const MSG_HEADER_LEN: usize = MSG_TYPE_LEN + MSG_SEQ_LEN;

/// Protocol maximum payload size. Larger declared sizes are rejected before allocating.
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Default ring size, absorbs several max-size frames.
pub const DEFAULT_BUFFER_CAPACITY: usize = 256 * 1024;

/// Sequence ids are 16 bit and wrap.
pub const SEQUENCE_MODULUS: u32 = 1 << 16;

// ———————————————————————————————————————— Message Types ——————————————————————————————————————————

/// Protocol Message Types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum MessageType {
    FrameData          = 0x01,
    DetectionResults   = 0x02,
    EmbeddingData      = 0x03,
    PerformanceMetrics = 0x04,
    Heartbeat          = 0x05,
    ErrorReport        = 0x06,
    CommandRequest     = 0x07,
    CommandResponse    = 0x08,
    DebugInfo          = 0x09,
}

impl MessageType {
    pub const ALL: [MessageType; 9] = [
        Self::FrameData,
        Self::DetectionResults,
        Self::EmbeddingData,
        Self::PerformanceMetrics,
        Self::Heartbeat,
        Self::ErrorReport,
        Self::CommandRequest,
        Self::CommandResponse,
        Self::DebugInfo,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::FrameData => "FRAME_DATA",
            Self::DetectionResults => "DETECTION_RESULTS",
            Self::EmbeddingData => "EMBEDDING_DATA",
            Self::PerformanceMetrics => "PERFORMANCE_METRICS",
            Self::Heartbeat => "HEARTBEAT",
            Self::ErrorReport => "ERROR_REPORT",
            Self::CommandRequest => "COMMAND_REQUEST",
            Self::CommandResponse => "COMMAND_RESPONSE",
            Self::DebugInfo => "DEBUG_INFO",
        }
    }

    /// Dense index into per-type tables.
    #[inline]
    pub fn index(self) -> usize {
        self as usize - 1
    }
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(value: u8) -> core::result::Result<Self, <MessageType as TryFrom<u8>>::Error> {
        match value {
            v if v == Self::FrameData as u8 => Ok(Self::FrameData),
            v if v == Self::DetectionResults as u8 => Ok(Self::DetectionResults),
            v if v == Self::EmbeddingData as u8 => Ok(Self::EmbeddingData),
            v if v == Self::PerformanceMetrics as u8 => Ok(Self::PerformanceMetrics),
            v if v == Self::Heartbeat as u8 => Ok(Self::Heartbeat),
            v if v == Self::ErrorReport as u8 => Ok(Self::ErrorReport),
            v if v == Self::CommandRequest as u8 => Ok(Self::CommandRequest),
            v if v == Self::CommandResponse as u8 => Ok(Self::CommandResponse),
            v if v == Self::DebugInfo as u8 => Ok(Self::DebugInfo),
            v => Err(v),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ——————————————————————————————————————— Protocol Variant ————————————————————————————————————————

/// Which bytes the trailing CRC32 covers.
///
/// Firmware generations disagree on the CRC region. The wire contract of this crate is
/// `CrcFullPayload`; the other variants exist to talk to older firmware.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVariant {
    /// CRC over the whole payload, message header included.
    #[default]
    CrcFullPayload,
    /// CRC over the message body only (payload minus the 3 byte message header).
    CrcBodyOnly,
    /// Legacy framing: header checksum only, no trailing CRC bytes on the wire.
    NoCrc,
}

impl ProtocolVariant {
    /// Bytes following the payload on the wire.
    #[inline]
    pub fn trailer_len(self) -> usize {
        match self {
            Self::NoCrc => 0,
            _ => CRC_LEN,
        }
    }

    /// Slice of the payload the CRC is computed over.
    #[inline]
    pub fn crc_region(self, payload: &[u8]) -> &[u8] {
        match self {
            Self::CrcFullPayload => payload,
            Self::CrcBodyOnly => payload.get(MSG_HEADER_LEN..).unwrap_or(&[]),
            Self::NoCrc => &[],
        }
    }

    /// Full frame length on the wire for a payload of `payload_len` bytes.
    #[inline]
    pub fn frame_len(self, payload_len: usize) -> usize {
        HEADER_LEN + payload_len + self.trailer_len()
    }
}

impl std::str::FromStr for ProtocolVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::CrcFullPayload),
            "body" => Ok(Self::CrcBodyOnly),
            "none" => Ok(Self::NoCrc),
            other => Err(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_values_are_fixed() {
        assert_eq!(MessageType::FrameData as u8, 0x01);
        assert_eq!(MessageType::DebugInfo as u8, 0x09);
        for t in MessageType::ALL {
            assert_eq!(MessageType::try_from(t as u8), Ok(t));
        }
        assert_eq!(MessageType::try_from(0x00), Err(0x00));
        assert_eq!(MessageType::try_from(0x0A), Err(0x0A));
    }

    #[test]
    fn crc_region_per_variant() {
        let payload = [1u8, 2, 3, 4, 5];
        assert_eq!(ProtocolVariant::CrcFullPayload.crc_region(&payload), &payload);
        assert_eq!(ProtocolVariant::CrcBodyOnly.crc_region(&payload), &[4, 5]);
        assert_eq!(ProtocolVariant::CrcBodyOnly.crc_region(&payload[..2]), &[] as &[u8]);
        assert_eq!(ProtocolVariant::NoCrc.frame_len(10), 14);
        assert_eq!(ProtocolVariant::CrcFullPayload.frame_len(10), 18);
    }
}
