#![forbid(unsafe_code)]

//! Scoped raw-mode acquisition.
//!
//! [`RawModeSession`] puts the terminal into raw mode when it is acquired and
//! restores the previous mode when it is dropped, so every exit path (normal
//! return, `?`, timeout, panic unwinding) releases it exactly once.
//!
//! # Lifecycle Guarantees
//!
//! 1. **Exclusive** - at most one session is active per process. A second
//!    [`RawModeSession::acquire`] while one is live fails with
//!    [`ProbeError::SessionActive`].
//! 2. **Drop restores** - the port's raw mode is disabled in [`Drop`].
//! 3. **Abort paths** - for ports that ask for it
//!    ([`TerminalPort::restores_on_signal`]), a panic hook and a
//!    SIGINT/SIGTERM watcher restore the terminal before the process dies.
//!    The panic hook matters under `panic = "abort"`, where `Drop` never runs.
//!    Both are installed once per process; after the last session ends a
//!    signal still terminates the process.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::ProbeError;
use crate::port::TerminalPort;

#[cfg(unix)]
use signal_hook::consts::signal::{SIGINT, SIGTERM};
#[cfg(unix)]
use signal_hook::iterator::Signals;

/// Set while a session holds the terminal.
static ACTIVE: AtomicBool = AtomicBool::new(false);

/// Raw mode held on a [`TerminalPort`] for the lifetime of the value.
///
/// # Example
///
/// ```no_run
/// use ttyimg_core::{RawModeSession, TtyPort};
///
/// let port = TtyPort::new();
/// let session = RawModeSession::acquire(&port)?;
/// // ... write a query, read the reply ...
/// drop(session); // previous mode restored
/// # Ok::<(), ttyimg_core::ProbeError>(())
/// ```
pub struct RawModeSession<'a> {
    port: &'a dyn TerminalPort,
}

impl std::fmt::Debug for RawModeSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawModeSession").finish_non_exhaustive()
    }
}

impl<'a> RawModeSession<'a> {
    /// Enter raw mode on `port`.
    ///
    /// # Errors
    ///
    /// [`ProbeError::SessionActive`] if another session is live, or
    /// [`ProbeError::TerminalUnavailable`] if the port refuses raw mode.
    pub fn acquire(port: &'a dyn TerminalPort) -> Result<Self, ProbeError> {
        if ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ProbeError::SessionActive);
        }

        let restores = port.restores_on_signal();
        if restores {
            install_panic_hook();
        }

        if let Err(err) = port.enable_raw_mode() {
            ACTIVE.store(false, Ordering::Release);
            #[cfg(feature = "tracing")]
            tracing::debug!(error = %err, "raw mode refused");
            return Err(ProbeError::TerminalUnavailable(err));
        }
        #[cfg(feature = "tracing")]
        tracing::debug!("terminal raw mode enabled");

        #[cfg(unix)]
        if restores {
            install_signal_watcher();
        }

        Ok(Self { port })
    }

    /// Whether some session currently holds the terminal.
    #[must_use]
    pub fn is_active() -> bool {
        ACTIVE.load(Ordering::Acquire)
    }

    /// Release the session now instead of at end of scope.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for RawModeSession<'_> {
    fn drop(&mut self) {
        let _ = self.port.disable_raw_mode();
        #[cfg(feature = "tracing")]
        tracing::debug!("terminal raw mode disabled");

        ACTIVE.store(false, Ordering::Release);
    }
}

fn install_panic_hook() {
    static HOOK: OnceLock<()> = OnceLock::new();
    HOOK.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            best_effort_cleanup();
            previous(info);
        }));
    });
}

fn best_effort_cleanup() {
    if ACTIVE.load(Ordering::Acquire) {
        let _ = crossterm::terminal::disable_raw_mode();
    }
}

/// Start the process-wide SIGINT/SIGTERM watcher, once.
///
/// signal-hook handlers stay registered for the life of the process, so the
/// watcher does too. A signal always terminates; the terminal is restored
/// first if a session is live.
#[cfg(unix)]
fn install_signal_watcher() {
    static WATCHER: OnceLock<()> = OnceLock::new();
    WATCHER.get_or_init(|| {
        if let Err(err) = spawn_signal_watcher() {
            // Without the watcher sessions still restore on drop.
            #[cfg(feature = "tracing")]
            tracing::debug!(error = %err, "signal watcher unavailable");
            #[cfg(not(feature = "tracing"))]
            let _ = err;
        }
    });
}

#[cfg(unix)]
fn spawn_signal_watcher() -> std::io::Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(std::io::Error::other)?;
    std::thread::Builder::new()
        .name("ttyimg-signals".into())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                #[cfg(feature = "tracing")]
                tracing::warn!(signal, "termination signal received");
                best_effort_cleanup();
                std::process::exit(128 + signal);
            }
        })?;
    Ok(())
}
