//! Stdio Helper
//!
//! Handles Terminal init and de-init
//! Handles key input with history
//! Handles Ctrl+C hook
//! Keeps a persistent two line bar (link status + input) below a scrolling log region

#![allow(unused_must_use)]

use std::collections::VecDeque;
use std::io::{self, Write};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::style::Stylize;
use crossterm::{ExecutableCommand, QueueableCommand, cursor, terminal};

#[cfg(target_os = "linux")]
use termios::{ECHO, ICANON, TCSADRAIN, Termios};

use crate::rfs_stats::StatsSnapshot;

// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                             Globals
// —————————————————————————————————————————————————————————————————————————————————————————————————

pub const TERM_PADDED_LINES: u16 = 2;
pub const HISTORY_LEN: usize = 64;
pub const INPUT_PREFIX: &str = "CMD";

// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                             Macros
// —————————————————————————————————————————————————————————————————————————————————————————————————

#[macro_export]
macro_rules! terminal_exit {
    () => {
        $crate::terminal_exit!(0);
    };
    ($code:expr) => {{
        $crate::stdio_helper::stdout_de_init();
        if $code != 0 {
            println!("Exiting with code: {}\n", $code);
        }
        else {
            println!("Exiting...\n");
        }
        std::process::exit($code);
    }};
}

/// Ctrl+C restores the terminal (when the bar is active) and exits.
pub fn ctrl_c_init(ui: bool) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        if ui {
            terminal_exit!();
        }
        std::process::exit(0);
    })
}

// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                            Input Line
// —————————————————————————————————————————————————————————————————————————————————————————————————

/// Line editor over raw key events, with history.
///
/// ```ignore
/// let mut input = InputLine::new();
///
/// // In a loop:
/// if let Some(line) = input.poll()? {
///     println!("{line}");
/// }
/// ```
#[derive(Debug, Default)]
pub struct InputLine {
    buffer:     String,
    history:    VecDeque<String>,
    scroll_pos: usize,
}

impl InputLine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text typed so far.
    pub fn current(&self) -> &str {
        &self.buffer
    }

    /// Drains pending terminal events without blocking, returns a line once Enter was hit.
    pub fn poll(&mut self) -> io::Result<Option<String>> {
        while event::poll(Duration::from_millis(0))? {
            let Event::Key(key) = event::read()?
            else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if let Some(line) = self.handle_key(key.code, key.modifiers) {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }

    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> Option<String> {
        const CTRL: KeyModifiers = KeyModifiers::CONTROL;

        match (code, modifiers) {
            // Ctrl-C
            (KeyCode::Char('c'), CTRL) => {
                terminal_exit!();
            }
            // Enter
            (KeyCode::Enter, _) | (KeyCode::Char('j'), CTRL) => {
                let line = std::mem::take(&mut self.buffer);
                self.scroll_pos = 0;
                if line.trim().is_empty() {
                    return None;
                }
                if self.history.front() != Some(&line) {
                    self.history.push_front(line.clone());
                    self.history.truncate(HISTORY_LEN);
                }
                return Some(line);
            }
            // Backspace
            (KeyCode::Backspace, _) => {
                self.buffer.pop();
            }
            // Ctrl + u - Clear
            (KeyCode::Char('u'), CTRL) | (KeyCode::Esc, _) => {
                self.buffer.clear();
                self.scroll_pos = 0;
            }
            // Up
            (KeyCode::Up, _) => {
                if let Some(item) = self.history.get(self.scroll_pos) {
                    self.buffer = item.clone();
                    self.scroll_pos += 1;
                }
            }
            // Down
            (KeyCode::Down, _) => {
                if self.scroll_pos <= 1 {
                    self.buffer.clear();
                    self.scroll_pos = 0;
                }
                else if let Some(item) = self.history.get(self.scroll_pos - 2) {
                    self.buffer = item.clone();
                    self.scroll_pos -= 1;
                }
            }
            // Character Input
            (KeyCode::Char(c), _) => {
                self.buffer.push(c);
            }
            // Any
            _ => {}
        }
        None
    }
}

// —————————————————————————————————————————— Status Bar ———————————————————————————————————————————

pub fn format_status_line(port: &str, stats: &StatsSnapshot) -> String {
    let errors = stats.sync_errors + stats.header_checksum_errors + stats.crc_errors + stats.parse_errors;
    let health = if errors == 0 { "OK".green() } else { "ERR".red() };

    format!("{} {} {} {}", port.cyan(), health, "|".dark_grey(), stats)
}

pub fn format_input_line(input: &str) -> String {
    format!("{} {} {}", INPUT_PREFIX.red(), ">>:".green(), input.blue())
}

/// Redraws the two bottom lines, leaving the cursor in the scroll region.
pub fn print_status_bar(status: &str, input: &str) -> io::Result<()> {
    let mut stdout = io::stdout();
    let (_cols, rows) = terminal::size()?;

    stdout.queue(cursor::SavePosition)?;

    for (row, line) in [(rows.saturating_sub(2), status), (rows.saturating_sub(1), input)] {
        stdout.queue(cursor::MoveTo(0, row))?;
        stdout.queue(terminal::Clear(terminal::ClearType::CurrentLine))?;
        stdout.write_all(line.as_bytes())?;
    }

    stdout.queue(cursor::RestorePosition)?;
    stdout.flush()
}

// ———————————————————————————————————————————— Init ———————————————————————————————————————————————

/// Init Terminal
pub fn stdout_init() -> io::Result<()> {
    // On Linux we disable canonical mode (instead of raw mode) to gain access to non buffered input
    #[cfg(target_os = "linux")]
    {
        use std::os::unix::io::AsRawFd;

        let fd = io::stdin().as_raw_fd();
        let mut termios = Termios::from_fd(fd)?;

        // Keep the other terminal modes, only drop line buffering and echo
        termios.c_lflag &= !(ICANON | ECHO);
        termios.c_cc[termios::VMIN] = 1;
        termios.c_cc[termios::VTIME] = 0;

        termios::tcsetattr(fd, TCSADRAIN, &termios)?;
    }

    let mut stdout = io::stdout();
    let (_cols, rows) = terminal::size()?;
    let scroll_rows = rows.saturating_sub(TERM_PADDED_LINES);

    stdout.queue(cursor::Hide)?;
    stdout.queue(cursor::SavePosition)?;

    print!("\x1b[0m"); // Reset Style
    print!("{}", "\n".repeat(TERM_PADDED_LINES as usize + 1)); // PAD previous output
    print!("\x1b[r"); // Reset scrollable region
    print!("\x1b[{};{}r", 1, scroll_rows); // Set scrollable region

    stdout.queue(cursor::RestorePosition)?;
    stdout.execute(cursor::MoveToRow(scroll_rows.saturating_sub(1)))?;
    Ok(())
}

// ——————————————————————————————————————————— De-Init —————————————————————————————————————————————

/// De-init Terminal. Best effort, also runs from the Ctrl+C handler.
pub fn stdout_de_init() {
    let mut stdout = io::stdout();
    let rows = terminal::size().map(|(_, rows)| rows).unwrap_or(0);

    terminal::disable_raw_mode(); // Takes care of restoring termios canonical mode

    print!("\x1b[r"); // Reset scrollable region
    print!("\x1b[0m"); // Reset Style

    stdout.queue(cursor::MoveTo(0, rows));
    stdout.queue(terminal::Clear(terminal::ClearType::CurrentLine));
    stdout.execute(cursor::Show);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_line(input: &mut InputLine, text: &str) -> Option<String> {
        for c in text.chars() {
            input.handle_key(KeyCode::Char(c), KeyModifiers::NONE);
        }
        input.handle_key(KeyCode::Enter, KeyModifiers::NONE)
    }

    #[test]
    fn enter_yields_line() {
        let mut input = InputLine::new();
        assert_eq!(type_line(&mut input, "status"), Some("status".into()));
        assert_eq!(input.current(), "");
        assert_eq!(type_line(&mut input, "   "), None);
    }

    #[test]
    fn editing_keys() {
        let mut input = InputLine::new();
        for c in "resett".chars() {
            input.handle_key(KeyCode::Char(c), KeyModifiers::NONE);
        }
        input.handle_key(KeyCode::Backspace, KeyModifiers::NONE);
        assert_eq!(input.current(), "reset");

        input.handle_key(KeyCode::Char('u'), KeyModifiers::CONTROL);
        assert_eq!(input.current(), "");
    }

    #[test]
    fn history_navigation() {
        let mut input = InputLine::new();
        type_line(&mut input, "status");
        type_line(&mut input, "diag");
        type_line(&mut input, "diag");

        input.handle_key(KeyCode::Up, KeyModifiers::NONE);
        assert_eq!(input.current(), "diag");
        input.handle_key(KeyCode::Up, KeyModifiers::NONE);
        assert_eq!(input.current(), "status");
        input.handle_key(KeyCode::Up, KeyModifiers::NONE);
        assert_eq!(input.current(), "status");
        input.handle_key(KeyCode::Down, KeyModifiers::NONE);
        assert_eq!(input.current(), "diag");
        input.handle_key(KeyCode::Down, KeyModifiers::NONE);
        assert_eq!(input.current(), "");
    }
}
