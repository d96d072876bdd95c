#![forbid(unsafe_code)]

//! Error types.
//!
//! [`ProbeError`] never leaves the geometry chain: every variant means "this
//! strategy failed, try the next one". [`DimensionError`] and [`ScaleError`]
//! describe malformed user input and abort the invocation.

use std::io;
use std::time::Duration;

/// Failure of a single geometry strategy or escape query.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// Raw mode could not be engaged (not a tty, or the OS refused).
    #[error("terminal unavailable: {0}")]
    TerminalUnavailable(#[source] io::Error),

    /// A raw-mode session is already active in this process.
    #[error("a raw mode session is already active")]
    SessionActive,

    /// The terminal did not answer within the bounded wait.
    #[error("no terminal response within {0:?}")]
    Timeout(Duration),

    /// The terminal answered, but not with the expected numeric format.
    #[error("malformed probe response: {0:?}")]
    MalformedResponse(String),

    /// The reader of an earlier timed-out query is still outstanding.
    #[error("an abandoned probe reader is still outstanding")]
    ReaderBusy,

    /// The strategy does not apply in this environment.
    #[error("probe unsupported here: {0}")]
    Unsupported(&'static str),

    /// The strategy reported a zero width or height.
    #[error("probe reported an empty extent")]
    EmptyExtent,

    /// I/O failure while talking to the terminal or a helper process.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A size specification that does not match `[+-]digits[px|c|%]`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DimensionError {
    #[error("invalid dimension format: {0:?}")]
    InvalidFormat(String),
}

/// A scale specification that does not match `<float>x<float>`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScaleError {
    #[error("invalid scale format: {0:?}")]
    InvalidFormat(String),
}
