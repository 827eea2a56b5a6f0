//! Byte transport abstraction, serial port helpers and the receiver thread.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle, sleep};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::rfs_link::LinkInput;

// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                             Globals
// —————————————————————————————————————————————————————————————————————————————————————————————————

pub const TIMEOUT: Duration = Duration::from_millis(500);
pub const READ_CHUNK_SIZE: usize = 4096;
pub const ERROR_BACKOFF: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 10;

const CONNECT_ATTEMPTS: u32 = 10;
const CONNECT_RETRY: Duration = Duration::from_millis(500);
const IDLE_READ_SLEEP: Duration = Duration::from_millis(1);

#[cfg(unix)]
pub type PortType = serialport::TTYPort;
#[cfg(windows)]
pub type PortType = serialport::COMPort;

// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                            Transport
// —————————————————————————————————————————————————————————————————————————————————————————————————

/// Anything bytes can be read from and written to.
pub trait Transport: Send {
    /// Up to `max` bytes. An empty chunk means nothing arrived before the read timeout.
    fn read_chunk(&mut self, max: usize) -> io::Result<Vec<u8>>;

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;
}

impl<T: Read + Write + Send> Transport for T {
    fn read_chunk(&mut self, max: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; max];
        match self.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            // Timeout > Empty
            Err(ref e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        Write::write_all(self, bytes)?;
        self.flush()
    }
}

// ——————————————————————————————————————————— Stop Flag ———————————————————————————————————————————

/// Cooperative cancellation shared by the receiver and the parser.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                              Ports
// —————————————————————————————————————————————————————————————————————————————————————————————————

/// Trailing number of a port name, `/dev/ttyACM12` -> 12, `COM3` -> 3.
fn port_number(name: &str) -> u32 {
    let digits = name.len() - name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    name[name.len() - digits..].parse().unwrap_or(0)
}

/// The requested port if it exists, otherwise the highest numbered one when none was requested.
pub fn pick_port<'a>(ports: impl IntoIterator<Item = &'a str>, requested: &str) -> Option<String> {
    let mut ports = ports.into_iter();

    if !requested.is_empty() {
        return ports.find(|p| *p == requested).map(str::to_string);
    }

    ports.max_by_key(|p| port_number(p)).map(str::to_string)
}

/// Blocks until a matching port shows up.
pub fn find_port(input_port: &str) -> Result<String> {
    info!(port = input_port, "searching for port");

    loop {
        let ports = serialport::available_ports().context("Failed to list ports")?;
        let names: Vec<&str> = ports.iter().map(|p| p.port_name.as_str()).collect();

        if let Some(name) = pick_port(names.iter().copied(), input_port) {
            return Ok(name);
        }

        debug!(available = ?names, "port not found yet");
        sleep(Duration::from_secs(1));
    }
}

pub fn connect_to_port(port_name: &str, baud_rate: u32) -> Result<PortType> {
    info!(port = port_name, baud_rate, "connecting");

    let mut attempt = 0;
    loop {
        attempt += 1;
        match serialport::new(port_name, baud_rate)
            .dtr_on_open(true)
            .timeout(TIMEOUT)
            .open_native()
        {
            Ok(port) => {
                info!(port = port_name, "connected");
                return Ok(port);
            }
            Err(e) if attempt >= CONNECT_ATTEMPTS => {
                return Err(e).context(format!("Failed after {CONNECT_ATTEMPTS} attempts"));
            }
            Err(e) => {
                debug!(attempt, error = %e, "connect failed, retrying");
                sleep(CONNECT_RETRY);
            }
        }
    }
}

// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                          Receiver Thread
// —————————————————————————————————————————————————————————————————————————————————————————————————

/// Moves bytes from `transport` into the link buffer until `stop` is raised.
///
/// Read errors back off and retry. After `max_consecutive_errors` failures in a row the
/// thread gives up and returns the last error so the owner can reconnect.
pub fn spawn_receiver<T>(
    mut transport: T,
    input: LinkInput,
    stop: StopFlag,
    max_consecutive_errors: u32,
) -> JoinHandle<Result<()>>
where
    T: Transport + 'static,
{
    thread::spawn(move || {
        debug!("receiver started");
        let mut errors = 0u32;

        while !stop.is_stopped() {
            match transport.read_chunk(READ_CHUNK_SIZE) {
                Ok(chunk) if chunk.is_empty() => {
                    errors = 0;
                    sleep(IDLE_READ_SLEEP);
                }
                Ok(chunk) => {
                    errors = 0;
                    input.add_data(&chunk);
                }
                Err(e) => {
                    errors += 1;
                    warn!(error = %e, errors, "serial read failed");
                    if errors >= max_consecutive_errors.max(1) {
                        return Err(e).context("Serial read failed repeatedly");
                    }
                    sleep(ERROR_BACKOFF);
                }
            }
        }

        debug!("receiver exiting");
        Ok(())
    })
}
