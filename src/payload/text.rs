/// Free form text carried by `ErrorReport` and `DebugInfo` messages.
///
/// Decoding is lossy, firmware strings are not guaranteed to be valid UTF-8, and the
/// NUL padding of fixed size C buffers is trimmed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TextMessage(pub String);

impl TextMessage {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn encode(&self) -> Vec<u8> {
        self.0.as_bytes().to_vec()
    }
}

impl From<&[u8]> for TextMessage {
    fn from(body: &[u8]) -> Self {
        let end = body.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        Self(String::from_utf8_lossy(&body[..end]).into_owned())
    }
}

impl std::fmt::Display for TextMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_padding_and_replaces_invalid_bytes() {
        assert_eq!(TextMessage::from(&b"cam timeout\0\0\0"[..]).as_str(), "cam timeout");
        assert_eq!(TextMessage::from(&[0u8, 0][..]).as_str(), "");
        assert_eq!(TextMessage::from(&[b'o', b'k', 0xFF][..]).as_str(), "ok\u{FFFD}");
    }
}
