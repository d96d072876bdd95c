#![forbid(unsafe_code)]

//! Test doubles for terminal I/O.
//!
//! [`ScriptedPort`] stands in for the controlling terminal: it records every
//! byte written to it, counts raw-mode transitions, and answers each opened
//! input stream with the next scripted [`Reply`].

use std::collections::VecDeque;
use std::io::{self, Cursor, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, mpsc};

use crate::port::{KernelWindowSize, TerminalPort};

/// What the terminal "types back" after a query.
#[derive(Debug, Clone)]
pub enum Reply {
    /// These bytes, then end of stream.
    Bytes(Vec<u8>),
    /// Nothing, ever: reads block until the port is dropped.
    Silent,
}

/// Scripted terminal double.
#[derive(Debug, Default)]
pub struct ScriptedPort {
    written: Mutex<Vec<u8>>,
    replies: Mutex<VecDeque<Reply>>,
    keepalive: Mutex<Vec<mpsc::Sender<()>>>,
    raw_enables: AtomicUsize,
    raw_disables: AtomicUsize,
    inputs_opened: AtomicUsize,
    refuse_raw: bool,
    fail_writes: bool,
    restores_on_signal: bool,
    window: Option<KernelWindowSize>,
}

impl ScriptedPort {
    /// A terminal that accepts raw mode, never answers, and has no kernel
    /// window size.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next opened input stream.
    #[must_use]
    pub fn reply(self, bytes: impl Into<Vec<u8>>) -> Self {
        self.push(Reply::Bytes(bytes.into()));
        self
    }

    /// Queue a reply that never arrives.
    #[must_use]
    pub fn silent(self) -> Self {
        self.push(Reply::Silent);
        self
    }

    /// Refuse to enter raw mode.
    #[must_use]
    pub fn refuse_raw_mode(mut self) -> Self {
        self.refuse_raw = true;
        self
    }

    /// Ask raw-mode sessions to install the panic hook and signal watcher,
    /// like the real terminal does.
    #[must_use]
    pub fn restoring_on_signal(mut self) -> Self {
        self.restores_on_signal = true;
        self
    }

    /// Fail every write to the output stream.
    #[must_use]
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Report this kernel window size.
    #[must_use]
    pub fn window(mut self, columns: u16, rows: u16, width: u16, height: u16) -> Self {
        self.window = Some(KernelWindowSize {
            columns,
            rows,
            width,
            height,
        });
        self
    }

    fn push(&self, reply: Reply) {
        lock(&self.replies).push_back(reply);
    }

    /// Everything written to the terminal so far.
    #[must_use]
    pub fn written(&self) -> Vec<u8> {
        lock(&self.written).clone()
    }

    /// Number of raw-mode enable calls.
    #[must_use]
    pub fn raw_enables(&self) -> usize {
        self.raw_enables.load(Ordering::SeqCst)
    }

    /// Number of raw-mode disable calls.
    #[must_use]
    pub fn raw_disables(&self) -> usize {
        self.raw_disables.load(Ordering::SeqCst)
    }

    /// Number of input streams opened.
    #[must_use]
    pub fn inputs_opened(&self) -> usize {
        self.inputs_opened.load(Ordering::SeqCst)
    }
}

impl TerminalPort for ScriptedPort {
    fn enable_raw_mode(&self) -> io::Result<()> {
        if self.refuse_raw {
            return Err(io::Error::other("not a terminal"));
        }
        self.raw_enables.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn disable_raw_mode(&self) -> io::Result<()> {
        self.raw_disables.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn output(&self) -> io::Result<Box<dyn Write + '_>> {
        Ok(Box::new(RecordingWriter {
            sink: &self.written,
            fail: self.fail_writes,
        }))
    }

    fn input(&self) -> io::Result<Box<dyn Read + Send>> {
        self.inputs_opened.fetch_add(1, Ordering::SeqCst);
        match lock(&self.replies).pop_front() {
            Some(Reply::Bytes(bytes)) => Ok(Box::new(Cursor::new(bytes))),
            Some(Reply::Silent) | None => {
                let (tx, rx) = mpsc::channel();
                lock(&self.keepalive).push(tx);
                Ok(Box::new(BlockingReader { rx }))
            }
        }
    }

    fn window_size(&self) -> io::Result<KernelWindowSize> {
        self.window
            .ok_or_else(|| io::Error::other("no window size configured"))
    }

    fn restores_on_signal(&self) -> bool {
        self.restores_on_signal
    }
}

struct RecordingWriter<'a> {
    sink: &'a Mutex<Vec<u8>>,
    fail: bool,
}

impl Write for RecordingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "write refused"));
        }
        lock(self.sink).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Blocks until its sender (held by the port) is dropped, then reports EOF.
struct BlockingReader {
    rx: mpsc::Receiver<()>,
}

impl Read for BlockingReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        let _ = self.rx.recv();
        Ok(0)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Serializes tests that acquire the process-wide raw-mode session.
pub fn serial() -> MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    lock(&LOCK)
}
