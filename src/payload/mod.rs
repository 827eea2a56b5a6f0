//! Typed interpretations of a message body.
//!
//! Every parser checks declared counts against a bound before allocating anything for
//! them, a body is never trusted further than its own length.

mod command;
mod detection;
mod embedding;
mod frame;
mod heartbeat;
mod metrics;
mod text;

pub use command::*;
pub use detection::*;
pub use embedding::*;
pub use frame::*;
pub use heartbeat::*;
pub use metrics::*;
pub use text::*;

use crate::error::{ParseError, ParseResult};
use crate::rfs_decoder::Message;
use crate::rfs_shared::MessageType;

// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                              Payload
// —————————————————————————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Frame(FrameData),
    Detections(DetectionResults),
    Embedding(Embedding),
    Metrics(PerformanceMetrics),
    Heartbeat(Heartbeat),
    Error(TextMessage),
    CommandRequest(CommandRequest),
    CommandResponse(CommandResponse),
    Debug(TextMessage),
}

impl Payload {
    /// Interprets `message.body` according to its type.
    ///
    /// Frame images are not decoded here, see [`FrameData::decode_image`].
    pub fn parse(message: &Message) -> ParseResult<Self> {
        let body = message.body.as_slice();
        let payload = match message.msg_type {
            MessageType::FrameData => Self::Frame(FrameData::try_from(body)?),
            MessageType::DetectionResults => Self::Detections(DetectionResults::try_from(body)?),
            MessageType::EmbeddingData => Self::Embedding(Embedding::try_from(body)?),
            MessageType::PerformanceMetrics => Self::Metrics(PerformanceMetrics::try_from(body)?),
            MessageType::Heartbeat => Self::Heartbeat(Heartbeat::try_from(body)?),
            MessageType::ErrorReport => Self::Error(TextMessage::from(body)),
            MessageType::CommandRequest => Self::CommandRequest(CommandRequest::try_from(body)?),
            MessageType::CommandResponse => Self::CommandResponse(CommandResponse::try_from(body)?),
            MessageType::DebugInfo => Self::Debug(TextMessage::from(body)),
        };
        Ok(payload)
    }
}

// ——————————————————————————————————————————— Reader ——————————————————————————————————————————————

/// Little endian cursor over a body. Every read is bounds checked.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn bytes(&mut self, n: usize) -> ParseResult<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.buf.len());
        let Some(end) = end
        else {
            return Err(ParseError::Truncated {
                needed: self.pos.saturating_add(n),
                got:    self.buf.len(),
            });
        };

        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub(crate) fn array<const N: usize>(&mut self) -> ParseResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> ParseResult<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub(crate) fn u32(&mut self) -> ParseResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub(crate) fn f32(&mut self) -> ParseResult<f32> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    pub(crate) fn rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }
}

/// Fails with `TooShort` unless `body` holds at least `needed` bytes.
pub(crate) fn ensure_len(body: &[u8], needed: usize) -> ParseResult<()> {
    if body.len() < needed {
        return Err(ParseError::TooShort {
            needed,
            got: body.len(),
        });
    }
    Ok(())
}
