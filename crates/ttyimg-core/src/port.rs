#![forbid(unsafe_code)]

//! Access to the controlling terminal.
//!
//! Everything in this crate that touches the terminal goes through a
//! [`TerminalPort`]. [`TtyPort`] is the real one; tests substitute
//! [`crate::testing::ScriptedPort`].
//!
//! # Probe I/O
//!
//! On Unix we open `/dev/tty` directly for both reading and writing, so the
//! queries reach the terminal even when stdin/stdout are redirected. Other
//! platforms fall back to the process's stdin/stdout.

use std::io::{self, Read, Write};

/// Window size as reported by the terminal driver (TIOCGWINSZ).
///
/// Any field may be zero: many terminals leave the pixel fields unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KernelWindowSize {
    /// Columns (cells per row).
    pub columns: u16,
    /// Rows (cells per column).
    pub rows: u16,
    /// Window width in pixels.
    pub width: u16,
    /// Window height in pixels.
    pub height: u16,
}

/// Byte-level and mode-level access to a terminal.
pub trait TerminalPort: Send + Sync {
    /// Put the terminal input into raw (unbuffered, unechoed) mode.
    fn enable_raw_mode(&self) -> io::Result<()>;

    /// Restore the terminal input mode saved by [`enable_raw_mode`].
    ///
    /// [`enable_raw_mode`]: TerminalPort::enable_raw_mode
    fn disable_raw_mode(&self) -> io::Result<()>;

    /// A writer for query sequences.
    fn output(&self) -> io::Result<Box<dyn Write + '_>>;

    /// A reader for terminal replies.
    ///
    /// The reader is moved onto a detached thread that may outlive the
    /// query, so it must own its resources.
    fn input(&self) -> io::Result<Box<dyn Read + Send>>;

    /// Ask the terminal driver for the window size.
    fn window_size(&self) -> io::Result<KernelWindowSize>;

    /// Whether raw-mode sessions on this port must also restore the
    /// terminal from the panic hook and on SIGINT/SIGTERM.
    fn restores_on_signal(&self) -> bool {
        false
    }
}

/// The process's controlling terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct TtyPort;

impl TtyPort {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TerminalPort for TtyPort {
    fn enable_raw_mode(&self) -> io::Result<()> {
        crossterm::terminal::enable_raw_mode()
    }

    fn disable_raw_mode(&self) -> io::Result<()> {
        crossterm::terminal::disable_raw_mode()
    }

    #[cfg(unix)]
    fn output(&self) -> io::Result<Box<dyn Write + '_>> {
        let tty = std::fs::OpenOptions::new().write(true).open("/dev/tty")?;
        Ok(Box::new(tty))
    }

    #[cfg(not(unix))]
    fn output(&self) -> io::Result<Box<dyn Write + '_>> {
        Ok(Box::new(io::stdout()))
    }

    #[cfg(unix)]
    fn input(&self) -> io::Result<Box<dyn Read + Send>> {
        let tty = std::fs::File::open("/dev/tty")?;
        Ok(Box::new(tty))
    }

    #[cfg(not(unix))]
    fn input(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(io::stdin()))
    }

    fn window_size(&self) -> io::Result<KernelWindowSize> {
        let ws = crossterm::terminal::window_size()?;
        Ok(KernelWindowSize {
            columns: ws.columns,
            rows: ws.rows,
            width: ws.width,
            height: ws.height,
        })
    }

    fn restores_on_signal(&self) -> bool {
        true
    }
}
