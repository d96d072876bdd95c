#![forbid(unsafe_code)]

//! One escape-sequence round trip with the terminal.
//!
//! # Safety Contract
//!
//! - **Bounded wait**: every query races the reply against a timeout. On
//!   timeout the query fails with [`ProbeError::Timeout`].
//! - **Abandon, don't cancel**: terminal reads are not reliably
//!   interruptible, so a timed-out reader thread is left running. Its result
//!   channel has capacity 1, so it can always finish sending and exit.
//! - **One reader at a time**: while an abandoned reader is still
//!   outstanding, further queries fail with [`ProbeError::ReaderBusy`]
//!   instead of competing with it for reply bytes.
//! - **Raw mode is scoped**: a [`RawModeSession`] is held for the duration of
//!   the query and released on every exit path.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::error::ProbeError;
use crate::port::TerminalPort;
use crate::raw_mode::RawModeSession;

/// Maximum bytes to read in a single reply.
const MAX_RESPONSE_LEN: usize = 256;

/// Default per-query timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(50);

const ESC: u8 = 0x1b;

/// Issues escape-sequence queries and tracks the reader they leave behind.
///
/// Owned by the invocation; `query` takes `&mut self`, so queries through
/// one value never overlap.
#[derive(Debug, Default)]
pub struct EscapeQuery {
    outstanding: Arc<AtomicBool>,
}

impl EscapeQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the reader of an earlier query is still running.
    #[must_use]
    pub fn reader_outstanding(&self) -> bool {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Write `sequence` and wait up to `timeout` for a reply ending in
    /// `terminator`.
    ///
    /// Returns the reply with a leading ESC removed.
    ///
    /// # Errors
    ///
    /// Any [`ProbeError`]; none of them is fatal to the caller.
    pub fn query(
        &mut self,
        port: &dyn TerminalPort,
        sequence: &[u8],
        terminator: u8,
        timeout: Duration,
    ) -> Result<Vec<u8>, ProbeError> {
        if self.reader_outstanding() {
            return Err(ProbeError::ReaderBusy);
        }

        let _session = RawModeSession::acquire(port)?;

        {
            let mut output = port.output()?;
            output.write_all(sequence)?;
            output.flush()?;
        }

        let input = port.input()?;
        let rx = self.spawn_reader(input, terminator)?;

        match rx.recv_timeout(timeout) {
            Ok(bytes) => strip_reply(bytes, terminator),
            Err(RecvTimeoutError::Timeout) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(?timeout, "escape query timed out, reader abandoned");
                Err(ProbeError::Timeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(ProbeError::MalformedResponse(
                "reader ended without a reply".into(),
            )),
        }
    }

    /// Start the reader thread. It accumulates bytes until `terminator`, end
    /// of stream, or [`MAX_RESPONSE_LEN`].
    fn spawn_reader(
        &self,
        mut input: Box<dyn Read + Send>,
        terminator: u8,
    ) -> Result<mpsc::Receiver<Vec<u8>>, ProbeError> {
        let (tx, rx) = mpsc::sync_channel::<Vec<u8>>(1);
        let outstanding = Arc::clone(&self.outstanding);
        outstanding.store(true, Ordering::Release);

        let spawned = thread::Builder::new()
            .name("ttyimg-escape-reader".into())
            .spawn(move || {
                let response = read_until(&mut input, terminator);
                // Done with the input before the reply is visible.
                outstanding.store(false, Ordering::Release);
                let _ = tx.send(response);
            });

        if let Err(err) = spawned {
            self.outstanding.store(false, Ordering::Release);
            return Err(ProbeError::Io(err));
        }
        Ok(rx)
    }
}

fn read_until(input: &mut dyn Read, terminator: u8) -> Vec<u8> {
    let mut response = Vec::with_capacity(32);
    let mut byte = [0u8; 1];
    while response.len() < MAX_RESPONSE_LEN {
        match input.read(&mut byte) {
            Ok(1) => {
                response.push(byte[0]);
                if byte[0] == terminator {
                    break;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            _ => break,
        }
    }
    response
}

/// Check the terminator and drop a leading escape introducer.
fn strip_reply(mut bytes: Vec<u8>, terminator: u8) -> Result<Vec<u8>, ProbeError> {
    if bytes.last() != Some(&terminator) {
        return Err(ProbeError::MalformedResponse(
            String::from_utf8_lossy(&bytes).into_owned(),
        ));
    }
    if bytes.first() == Some(&ESC) {
        bytes.remove(0);
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedPort, serial};

    const QUERY: &[u8] = b"\x1b[14t";

    #[test]
    fn returns_reply_without_escape() {
        let _lock = serial();
        let port = ScriptedPort::new().reply(b"\x1b[4;680;1550t".to_vec());
        let mut query = EscapeQuery::new();
        let reply = query.query(&port, QUERY, b't', DEFAULT_TIMEOUT * 20).unwrap();
        assert_eq!(reply, b"[4;680;1550t");
        assert_eq!(port.written(), QUERY);
        assert_eq!(port.raw_enables(), 1);
        assert_eq!(port.raw_disables(), 1);
    }

    #[test]
    fn stops_at_terminator() {
        let _lock = serial();
        let port = ScriptedPort::new().reply(b"\x1b[8;36;172tEXTRA".to_vec());
        let mut query = EscapeQuery::new();
        let reply = query.query(&port, b"\x1b[18t", b't', Duration::from_secs(1)).unwrap();
        assert_eq!(reply, b"[8;36;172t");
    }

    #[test]
    fn missing_terminator_is_malformed() {
        let _lock = serial();
        let port = ScriptedPort::new().reply(b"\x1b[4;680".to_vec());
        let mut query = EscapeQuery::new();
        let err = query.query(&port, QUERY, b't', Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ProbeError::MalformedResponse(_)));
        assert_eq!(port.raw_disables(), 1);
    }

    #[test]
    fn timeout_releases_raw_mode_and_blocks_next_query() {
        let _lock = serial();
        let port = ScriptedPort::new().silent();
        let mut query = EscapeQuery::new();

        let err = query
            .query(&port, QUERY, b't', Duration::from_millis(20))
            .unwrap_err();
        assert!(matches!(err, ProbeError::Timeout(_)));
        assert_eq!(port.raw_enables(), 1);
        assert_eq!(port.raw_disables(), 1);
        assert!(!RawModeSession::is_active());
        assert!(query.reader_outstanding());

        // The abandoned reader still owns the input; nothing else is sent.
        let err = query
            .query(&port, b"\x1b[18t", b't', Duration::from_millis(20))
            .unwrap_err();
        assert!(matches!(err, ProbeError::ReaderBusy));
        assert_eq!(port.written(), QUERY);
        assert_eq!(port.inputs_opened(), 1);
    }

    #[test]
    fn refused_raw_mode_sends_nothing() {
        let _lock = serial();
        let port = ScriptedPort::new().refuse_raw_mode();
        let mut query = EscapeQuery::new();
        let err = query.query(&port, QUERY, b't', DEFAULT_TIMEOUT).unwrap_err();
        assert!(matches!(err, ProbeError::TerminalUnavailable(_)));
        assert!(port.written().is_empty());
        assert_eq!(port.inputs_opened(), 0);
    }

    #[test]
    fn failed_write_still_releases_raw_mode() {
        let _lock = serial();
        let port = ScriptedPort::new().failing_writes();
        let mut query = EscapeQuery::new();
        let err = query.query(&port, QUERY, b't', DEFAULT_TIMEOUT).unwrap_err();
        assert!(matches!(err, ProbeError::Io(_)));
        assert_eq!(port.raw_enables(), 1);
        assert_eq!(port.raw_disables(), 1);
        assert!(!query.reader_outstanding());
    }

    #[test]
    fn read_until_caps_length() {
        let data = vec![b'a'; MAX_RESPONSE_LEN * 2];
        let mut cursor = std::io::Cursor::new(data);
        let out = read_until(&mut cursor, b't');
        assert_eq!(out.len(), MAX_RESPONSE_LEN);
    }
}
