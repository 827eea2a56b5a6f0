use super::{Reader, ensure_len};
use crate::error::{ParseError, ParseResult};

// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                             Commands
// —————————————————————————————————————————————————————————————————————————————————————————————————

/// Upstream commands understood by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandKind {
    GetStatus       = 0x01,
    SetParameters   = 0x02,
    StartEnrollment = 0x03,
    StopEnrollment  = 0x04,
    ResetSystem     = 0x05,
    GetDiagnostics  = 0x06,
}

impl CommandKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::GetStatus => "GET_STATUS",
            Self::SetParameters => "SET_PARAMETERS",
            Self::StartEnrollment => "START_ENROLLMENT",
            Self::StopEnrollment => "STOP_ENROLLMENT",
            Self::ResetSystem => "RESET_SYSTEM",
            Self::GetDiagnostics => "GET_DIAGNOSTICS",
        }
    }
}

impl TryFrom<u8> for CommandKind {
    type Error = ParseError;

    fn try_from(value: u8) -> ParseResult<Self> {
        match value {
            v if v == Self::GetStatus as u8 => Ok(Self::GetStatus),
            v if v == Self::SetParameters as u8 => Ok(Self::SetParameters),
            v if v == Self::StartEnrollment as u8 => Ok(Self::StartEnrollment),
            v if v == Self::StopEnrollment as u8 => Ok(Self::StopEnrollment),
            v if v == Self::ResetSystem as u8 => Ok(Self::ResetSystem),
            v if v == Self::GetDiagnostics as u8 => Ok(Self::GetDiagnostics),
            v => Err(ParseError::UnknownCommand(v)),
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ———————————————————————————————————————————— Request ————————————————————————————————————————————

/// [KIND:1][ARGS:...]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub kind: CommandKind,
    pub args: Vec<u8>,
}

impl CommandRequest {
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            args: Vec::new(),
        }
    }

    pub fn with_args(kind: CommandKind, args: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            args: args.into(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.args.len());
        out.push(self.kind as u8);
        out.extend_from_slice(&self.args);
        out
    }
}

impl TryFrom<&[u8]> for CommandRequest {
    type Error = ParseError;

    fn try_from(body: &[u8]) -> ParseResult<Self> {
        ensure_len(body, 1)?;
        let mut r = Reader::new(body);
        let kind = CommandKind::try_from(r.u8()?)?;
        Ok(Self {
            kind,
            args: r.rest().to_vec(),
        })
    }
}

impl std::str::FromStr for CommandRequest {
    type Err = String;

    /// Console syntax: `status`, `diag`, `enroll start`, `enroll stop`, `reset`,
    /// `set <byte> ...` with bytes in decimal or `0x` hex.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let cmd = words.next().ok_or_else(|| "empty command".to_string())?;

        let kind = match (cmd, words.next()) {
            ("status", None) => CommandKind::GetStatus,
            ("diag", None) => CommandKind::GetDiagnostics,
            ("reset", None) => CommandKind::ResetSystem,
            ("enroll", Some("start")) => CommandKind::StartEnrollment,
            ("enroll", Some("stop")) => CommandKind::StopEnrollment,
            ("set", first) => {
                let args = first
                    .into_iter()
                    .chain(words)
                    .map(parse_byte)
                    .collect::<Result<Vec<u8>, String>>()?;
                if args.is_empty() {
                    return Err("set needs at least one byte".into());
                }
                return Ok(Self::with_args(CommandKind::SetParameters, args));
            }
            _ => return Err(format!("unknown command {line:?}")),
        };

        if words.next().is_some() {
            return Err(format!("unexpected arguments in {line:?}"));
        }
        Ok(Self::new(kind))
    }
}

fn parse_byte(word: &str) -> Result<u8, String> {
    let parsed = match word.strip_prefix("0x").or_else(|| word.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => word.parse(),
    };
    parsed.map_err(|_| format!("invalid byte {word:?}"))
}

// ——————————————————————————————————————————— Response ————————————————————————————————————————————

pub const STATUS_OK: u8 = 0;

/// [KIND:1][STATUS:1][DATA:...]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    pub kind:   CommandKind,
    /// 0 on success, device specific error code otherwise.
    pub status: u8,
    pub data:   Vec<u8>,
}

impl CommandResponse {
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.data.len());
        out.push(self.kind as u8);
        out.push(self.status);
        out.extend_from_slice(&self.data);
        out
    }
}

impl TryFrom<&[u8]> for CommandResponse {
    type Error = ParseError;

    fn try_from(body: &[u8]) -> ParseResult<Self> {
        ensure_len(body, 2)?;
        let mut r = Reader::new(body);
        let kind = CommandKind::try_from(r.u8()?)?;
        let status = r.u8()?;
        Ok(Self {
            kind,
            status,
            data: r.rest().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_layout() {
        let req = CommandRequest::with_args(CommandKind::SetParameters, [0x10u8, 0x20]);
        assert_eq!(req.encode(), vec![0x02, 0x10, 0x20]);
        assert_eq!(CommandRequest::try_from(&[0x02u8, 0x10, 0x20][..]), Ok(req));
        assert_eq!(
            CommandRequest::try_from(&[0x09u8][..]),
            Err(ParseError::UnknownCommand(0x09))
        );
        assert!(CommandRequest::try_from(&[0u8; 0][..]).is_err());
    }

    #[test]
    fn console_commands() {
        assert_eq!("status".parse::<CommandRequest>(), Ok(CommandRequest::new(CommandKind::GetStatus)));
        assert_eq!("  enroll   stop ".parse::<CommandRequest>(), Ok(CommandRequest::new(CommandKind::StopEnrollment)));
        assert_eq!(
            "set 1 0x1F 255".parse::<CommandRequest>(),
            Ok(CommandRequest::with_args(CommandKind::SetParameters, [1u8, 0x1F, 255]))
        );

        for bad in ["", "enroll", "status now", "set", "set 256", "set 0xZZ", "reboot"] {
            assert!(bad.parse::<CommandRequest>().is_err(), "{bad:?}");
        }
    }

    #[test]
    fn response_layout() {
        let resp = CommandResponse::try_from(&[0x01u8, 0x00, b'o', b'k'][..]).unwrap();
        assert_eq!(resp.kind, CommandKind::GetStatus);
        assert!(resp.is_ok());
        assert_eq!(resp.data, b"ok");
        assert_eq!(resp.encode(), vec![0x01, 0x00, b'o', b'k']);

        assert_eq!(
            CommandResponse::try_from(&[0x01u8][..]),
            Err(ParseError::TooShort { needed: 2, got: 1 })
        );
    }
}
