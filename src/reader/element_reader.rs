//! Pull-based element readers over forward-only sources
//!
//! Both readers share the same state machine:
//!
//! ```text
//! Seeking -> InValue -> EmittingMatch -> ... -> Exhausted
//!                \________________________/ -> Faulted
//! ```
//!
//! A fault is reported once, after every value matched before it; every
//! later pull returns `None`.

use std::io::{ErrorKind, Read};

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use super::errors::{ReadError, ReadResult};
use super::matcher::Matched;
use super::pool::BufferPool;
use super::scanner::Scanner;
use crate::config::{ReaderConfig, SYNC_BUFFER_SIZE};
use crate::executor::CancellationSignal;
use crate::path::PathQuery;

/// Observable reader state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// Between values, or before the document starts
    Seeking,
    /// Inside the document, waiting for the next match
    InValue,
    /// Just handed out a match
    EmittingMatch,
    /// Source fully read and validated
    Exhausted,
    /// Failed; no further values
    Faulted,
}

/// State shared by the sync and async readers
#[derive(Debug)]
struct Core {
    scanner: Scanner,
    state: ReaderState,
    pending_error: Option<ReadError>,
    eof: bool,
}

enum Pull {
    Ready(Option<ReadResult<Matched>>),
    NeedBytes,
}

impl Core {
    fn new(path: Option<&PathQuery>, max_depth: usize) -> Self {
        Self {
            scanner: Scanner::new(path, max_depth),
            state: ReaderState::Seeking,
            pending_error: None,
            eof: false,
        }
    }

    fn pull(&mut self) -> Pull {
        loop {
            if matches!(self.state, ReaderState::Faulted | ReaderState::Exhausted)
                && !self.scanner.has_ready()
            {
                return Pull::Ready(None);
            }
            if let Some(m) = self.scanner.pop() {
                if self.state != ReaderState::Exhausted {
                    self.state = ReaderState::EmittingMatch;
                }
                return Pull::Ready(Some(Ok(m)));
            }
            if let Some(err) = self.pending_error.take() {
                self.state = ReaderState::Faulted;
                return Pull::Ready(Some(Err(err)));
            }
            if !self.eof {
                return Pull::NeedBytes;
            }
            match self.scanner.finish() {
                Ok(()) => self.state = ReaderState::Exhausted,
                Err(e) => self.pending_error = Some(e),
            }
        }
    }

    fn accept(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            self.eof = true;
            return;
        }
        if let Err(e) = self.scanner.feed(bytes) {
            self.pending_error = Some(e);
        }
        self.state = if self.scanner.in_value() {
            ReaderState::InValue
        } else {
            ReaderState::Seeking
        };
    }

    fn fail(&mut self, err: ReadError) {
        self.pending_error = Some(err);
    }

    fn offset(&self) -> u64 {
        self.scanner.offset()
    }
}

/// Synchronous reader; each refill uses a fixed buffer on the stack
#[derive(Debug)]
pub struct ElementReader<R> {
    source: R,
    core: Core,
}

impl<R: Read> ElementReader<R> {
    pub fn new(source: R, path: Option<&PathQuery>, config: &ReaderConfig) -> Self {
        Self {
            source,
            core: Core::new(path, config.max_depth),
        }
    }

    pub fn state(&self) -> ReaderState {
        self.core.state
    }

    /// Bytes consumed from the source so far
    pub fn offset(&self) -> u64 {
        self.core.offset()
    }

    /// Requests the next matched value, refilling as needed
    pub fn next_match(&mut self) -> Option<ReadResult<Matched>> {
        loop {
            match self.core.pull() {
                Pull::Ready(item) => return item,
                Pull::NeedBytes => self.refill(),
            }
        }
    }

    fn refill(&mut self) {
        let mut buf = [0u8; SYNC_BUFFER_SIZE];
        loop {
            match self.source.read(&mut buf) {
                Ok(n) => {
                    trace!(bytes = n, "refill");
                    self.core.accept(&buf[..n]);
                    return;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.core.fail(ReadError::Io(e));
                    return;
                }
            }
        }
    }
}

impl<R: Read> Iterator for ElementReader<R> {
    type Item = ReadResult<Matched>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_match()
    }
}

/// Asynchronous reader; each refill borrows a pooled buffer and races the
/// read against cancellation. The buffer is back in the pool before the
/// refill returns, whichever way it ends.
#[derive(Debug)]
pub struct AsyncElementReader<R> {
    source: R,
    core: Core,
    pool: BufferPool,
}

impl<R: AsyncRead + Unpin> AsyncElementReader<R> {
    pub fn new(source: R, path: Option<&PathQuery>, config: &ReaderConfig, pool: BufferPool) -> Self {
        Self {
            source,
            core: Core::new(path, config.max_depth),
            pool,
        }
    }

    pub fn state(&self) -> ReaderState {
        self.core.state
    }

    pub fn offset(&self) -> u64 {
        self.core.offset()
    }

    /// Requests the next matched value. Cancellation is checked before
    /// every refill and while a read is pending.
    pub async fn next_match(&mut self, cancel: &CancellationSignal) -> Option<ReadResult<Matched>> {
        loop {
            match self.core.pull() {
                Pull::Ready(item) => return item,
                Pull::NeedBytes => {
                    if cancel.is_cancelled() {
                        self.core.state = ReaderState::Faulted;
                        return Some(Err(ReadError::Cancelled));
                    }
                    if let Err(ReadError::Cancelled) = self.refill(cancel).await {
                        self.core.state = ReaderState::Faulted;
                        return Some(Err(ReadError::Cancelled));
                    }
                }
            }
        }
    }

    async fn refill(&mut self, cancel: &CancellationSignal) -> ReadResult<()> {
        let mut buffer = self.pool.acquire();
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ReadError::Cancelled),
            read = self.source.read(&mut buffer[..]) => read,
        };
        match read {
            Ok(n) => {
                trace!(bytes = n, "async refill");
                self.core.accept(&buffer[..n]);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => self.core.fail(ReadError::Io(e)),
        }
        Ok(())
    }
}
