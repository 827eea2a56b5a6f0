use super::{Reader, ensure_len};
use crate::error::{ParseError, ParseResult};

pub const HEARTBEAT_LEN: usize = 4;

/// Device liveness ping carrying the device tick in milliseconds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    pub tick_ms: u32,
}

impl Heartbeat {
    pub fn encode(&self) -> Vec<u8> {
        self.tick_ms.to_le_bytes().to_vec()
    }
}

impl TryFrom<&[u8]> for Heartbeat {
    type Error = ParseError;

    fn try_from(body: &[u8]) -> ParseResult<Self> {
        ensure_len(body, HEARTBEAT_LEN)?;
        let tick_ms = Reader::new(body).u32()?;
        Ok(Self { tick_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tick() {
        let hb = Heartbeat { tick_ms: 0xDEADBEEF };
        assert_eq!(Heartbeat::try_from(hb.encode().as_slice()), Ok(hb));
        assert_eq!(
            Heartbeat::try_from(&[1u8, 2][..]),
            Err(ParseError::TooShort { needed: 4, got: 2 })
        );
    }
}
