//! Lexer and MatchState driven together

use super::errors::ReadResult;
use super::lexer::Lexer;
use super::matcher::{MatchState, Matched};
use crate::path::PathQuery;

/// Selects matched values from pushed bytes
#[derive(Debug)]
pub struct Scanner {
    lexer: Lexer,
    matcher: MatchState,
}

impl Scanner {
    pub fn new(path: Option<&PathQuery>, max_depth: usize) -> Self {
        Self {
            lexer: Lexer::new(max_depth),
            matcher: MatchState::new(path),
        }
    }

    /// Pushes bytes. On error, values matched before the bad byte stay queued.
    pub fn feed(&mut self, bytes: &[u8]) -> ReadResult<()> {
        self.lexer.feed(bytes, &mut self.matcher)
    }

    pub fn finish(&mut self) -> ReadResult<()> {
        self.lexer.finish(&mut self.matcher)
    }

    pub fn pop(&mut self) -> Option<Matched> {
        self.matcher.pop()
    }

    pub fn has_ready(&self) -> bool {
        self.matcher.ready_len() > 0
    }

    pub fn in_value(&self) -> bool {
        self.lexer.in_value()
    }

    pub fn offset(&self) -> u64 {
        self.lexer.offset()
    }
}

/// Runs the selection over an in-memory buffer, returning every match in
/// order. The whole buffer is validated before anything is returned.
pub fn scan_slice(bytes: &[u8], path: Option<&PathQuery>, max_depth: usize) -> ReadResult<Vec<Matched>> {
    let mut scanner = Scanner::new(path, max_depth);
    scanner.feed(bytes)?;
    scanner.finish()?;
    let mut out = Vec::new();
    while let Some(m) = scanner.pop() {
        out.push(m);
    }
    Ok(out)
}
