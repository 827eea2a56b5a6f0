//! Link tunables and command line handling.

use std::time::Duration;

use crate::error::ConfigError;
use crate::rfs_sequence::DEFAULT_DROP_THRESHOLD;
use crate::rfs_shared::*;

// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                            Link Config
// —————————————————————————————————————————————————————————————————————————————————————————————————

pub const DEFAULT_SCAN_WINDOW: usize = 4096;
pub const DEFAULT_SYNC_NOISE_THRESHOLD: usize = 1;
pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_IDLE_SLEEP: Duration = Duration::from_millis(2);

/// Everything the protocol core can be tuned with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    /// Ring buffer size in bytes.
    pub buffer_capacity:      usize,
    /// Largest payload size accepted from a header.
    pub max_payload_size:     usize,
    /// Bytes inspected per call while looking for a start marker.
    pub scan_window:          usize,
    /// A scan must skip more than this many bytes to count as a sync error.
    pub sync_noise_threshold: usize,
    /// Sequence gaps at or above this are not counted as loss.
    pub drop_threshold:       u16,
    pub variant:              ProtocolVariant,
    /// Messages decoded per `process_available` call in the run loop.
    pub batch_size:           usize,
    /// Parser sleep when a pass found nothing.
    pub idle_sleep:           Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            buffer_capacity:      DEFAULT_BUFFER_CAPACITY,
            max_payload_size:     MAX_PAYLOAD_SIZE,
            scan_window:          DEFAULT_SCAN_WINDOW,
            sync_noise_threshold: DEFAULT_SYNC_NOISE_THRESHOLD,
            drop_threshold:       DEFAULT_DROP_THRESHOLD,
            variant:              ProtocolVariant::default(),
            batch_size:           DEFAULT_BATCH_SIZE,
            idle_sleep:           DEFAULT_IDLE_SLEEP,
        }
    }
}

impl LinkConfig {
    pub fn with_variant(mut self, variant: ProtocolVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// The payload bound can only be tightened, never raised above the protocol max.
    pub fn with_max_payload_size(mut self, size: usize) -> Self {
        self.max_payload_size = size.min(MAX_PAYLOAD_SIZE);
        self
    }
}

// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                            App Config
// —————————————————————————————————————————————————————————————————————————————————————————————————

/// STM32 side runs the UART at 921600 * 8.
pub const DEFAULT_BAUD_RATE: u32 = 921_600 * 8;
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(5);

pub const USAGE: &str = "\
Usage: rfs-serial-link [PORT] [OPTIONS]

  PORT                     Serial port, defaults to the highest numbered port

Options:
  --baud <N>               Baud rate (default 7372800)
  --crc <full|body|none>   CRC coverage used by the firmware (default full)
  --buffer <BYTES>         Receive ring buffer size (default 262144)
  --stats-interval <SECS>  Statistics print interval without UI (default 5)
  --no-ui                  Plain log output, no status bar
  -h, --help               Print this help
";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Empty: pick the highest numbered available port.
    pub port:           String,
    pub baud_rate:      u32,
    pub link:           LinkConfig,
    pub stats_interval: Duration,
    pub ui:             bool,
    pub help:           bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port:           String::new(),
            baud_rate:      DEFAULT_BAUD_RATE,
            link:           LinkConfig::default(),
            stats_interval: DEFAULT_STATS_INTERVAL,
            ui:             true,
            help:           false,
        }
    }
}

impl AppConfig {
    /// Parses everything after the program name.
    pub fn from_args<I, S>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Self::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            let arg = arg.as_ref();
            match arg {
                "--baud" => {
                    config.baud_rate = parse_value("--baud", args.next())?;
                }
                "--crc" => {
                    config.link.variant = parse_value("--crc", args.next())?;
                }
                "--buffer" => {
                    let size: usize = parse_value("--buffer", args.next())?;
                    if size < MAX_PAYLOAD_SIZE + HEADER_LEN + CRC_LEN {
                        return Err(ConfigError::InvalidValue {
                            flag:  "--buffer",
                            value: size.to_string(),
                        });
                    }
                    config.link.buffer_capacity = size;
                }
                "--stats-interval" => {
                    let secs: u64 = parse_value("--stats-interval", args.next())?;
                    config.stats_interval = Duration::from_secs(secs.max(1));
                }
                "--no-ui" => config.ui = false,
                "-h" | "--help" => config.help = true,
                flag if flag.starts_with('-') => {
                    return Err(ConfigError::UnknownFlag(flag.to_string()));
                }
                port => {
                    if !config.port.is_empty() {
                        return Err(ConfigError::UnknownFlag(port.to_string()));
                    }
                    config.port = port.to_string();
                }
            }
        }

        Ok(config)
    }
}

fn parse_value<T, S>(flag: &'static str, value: Option<S>) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    S: AsRef<str>,
{
    let value = value.ok_or(ConfigError::MissingValue(flag))?;
    let value = value.as_ref();
    value.parse().map_err(|_| ConfigError::InvalidValue {
        flag,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AppConfig::from_args(Vec::<String>::new()).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.baud_rate, 7_372_800);
        assert_eq!(config.link.buffer_capacity, 256 * 1024);
        assert_eq!(config.link.variant, ProtocolVariant::CrcFullPayload);
    }

    #[test]
    fn full_command_line() {
        let config = AppConfig::from_args([
            "/dev/ttyACM0",
            "--baud",
            "115200",
            "--crc",
            "body",
            "--buffer",
            "524288",
            "--no-ui",
        ])
        .unwrap();

        assert_eq!(config.port, "/dev/ttyACM0");
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.link.variant, ProtocolVariant::CrcBodyOnly);
        assert_eq!(config.link.buffer_capacity, 524_288);
        assert!(!config.ui);
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(
            AppConfig::from_args(["--baud"]),
            Err(ConfigError::MissingValue("--baud"))
        );
        assert_eq!(
            AppConfig::from_args(["--crc", "xor"]),
            Err(ConfigError::InvalidValue {
                flag:  "--crc",
                value: "xor".into(),
            })
        );
        assert!(matches!(
            AppConfig::from_args(["--buffer", "1024"]),
            Err(ConfigError::InvalidValue { flag: "--buffer", .. })
        ));
        assert_eq!(
            AppConfig::from_args(["--verbose"]),
            Err(ConfigError::UnknownFlag("--verbose".into()))
        );
    }

    #[test]
    fn payload_bound_is_capped() {
        let link = LinkConfig::default().with_max_payload_size(1 << 20);
        assert_eq!(link.max_payload_size, MAX_PAYLOAD_SIZE);
    }
}
