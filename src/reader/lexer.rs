//! Incremental JSON lexer
//!
//! Bytes are pushed in arbitrarily sized chunks. All in-token state lives in
//! the lexer, so a chunk may end in the middle of a string, an escape, a
//! number or a literal and the next chunk resumes exactly there.
//!
//! Events delivered to the [`TokenSink`] per value:
//!
//! ```text
//! value_start(kind)  before the first byte of the value
//! byte(b) ...        every byte of the value, plus whitespace, member names
//!                    and separators inside containers
//! value_end()        after the last byte (closing bracket, quote, literal)
//! ```
//!
//! A number has no terminator; it ends on the byte after it, which is then
//! processed structurally. A root number ends at `finish()`.

use super::errors::{ReadError, ReadResult};

/// Kind of value starting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Object,
    Array,
    String,
    Number,
    Literal,
}

impl ValueKind {
    pub fn is_container(&self) -> bool {
        matches!(self, ValueKind::Object | ValueKind::Array)
    }
}

/// Receiver of lexer events
pub trait TokenSink {
    fn value_start(&mut self, kind: ValueKind);

    /// Decoded member name for the next value of the innermost object
    fn member(&mut self, name: String);

    /// Whether member names should be decoded for the innermost object
    fn wants_member(&self) -> bool;

    fn byte(&mut self, b: u8);

    fn value_end(&mut self) -> ReadResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjState {
    FirstKeyOrEnd,
    Key,
    Colon,
    Value,
    CommaOrEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrState {
    FirstValueOrEnd,
    Value,
    CommaOrEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Object(ObjState),
    Array(ArrState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escape {
    None,
    Backslash,
    Unicode(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Num {
    Minus,
    Zero,
    Int,
    Dot,
    Frac,
    Exp,
    ExpSign,
    ExpInt,
}

impl Num {
    fn advance(self, b: u8) -> Option<Num> {
        let next = match (self, b) {
            (Num::Minus, b'0') => Num::Zero,
            (Num::Minus, b'1'..=b'9') => Num::Int,
            (Num::Int, b'0'..=b'9') => Num::Int,
            (Num::Zero | Num::Int, b'.') => Num::Dot,
            (Num::Dot | Num::Frac, b'0'..=b'9') => Num::Frac,
            (Num::Zero | Num::Int | Num::Frac, b'e' | b'E') => Num::Exp,
            (Num::Exp, b'+' | b'-') => Num::ExpSign,
            (Num::Exp | Num::ExpSign | Num::ExpInt, b'0'..=b'9') => Num::ExpInt,
            _ => return None,
        };
        Some(next)
    }

    fn is_complete(self) -> bool {
        matches!(self, Num::Zero | Num::Int | Num::Frac | Num::ExpInt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lex {
    Idle,
    Str { key: bool, escape: Escape },
    Literal { rest: &'static [u8] },
    Number(Num),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Root {
    Before,
    InValue,
    After,
}

/// Byte-fed JSON lexer validating the full grammar
#[derive(Debug)]
pub struct Lexer {
    stack: Vec<Frame>,
    lex: Lex,
    root: Root,
    key_buf: Vec<u8>,
    collect_key: bool,
    offset: u64,
    max_depth: usize,
}

impl Lexer {
    pub fn new(max_depth: usize) -> Self {
        Self {
            stack: Vec::new(),
            lex: Lex::Idle,
            root: Root::Before,
            key_buf: Vec::new(),
            collect_key: false,
            offset: 0,
            max_depth,
        }
    }

    /// Bytes consumed so far
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Current container nesting
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// True while the root value has started but not ended
    pub fn in_value(&self) -> bool {
        self.root == Root::InValue
    }

    /// True once the root value has ended
    pub fn is_complete(&self) -> bool {
        self.root == Root::After
    }

    pub fn feed<S: TokenSink>(&mut self, bytes: &[u8], sink: &mut S) -> ReadResult<()> {
        for &b in bytes {
            self.step(b, sink)?;
            self.offset += 1;
        }
        Ok(())
    }

    /// Signals end of input. Completes a trailing root number; anything else
    /// left open is truncated input.
    pub fn finish<S: TokenSink>(&mut self, sink: &mut S) -> ReadResult<()> {
        match self.lex {
            Lex::Number(n) if n.is_complete() && self.stack.is_empty() => {
                self.lex = Lex::Idle;
                self.end_value(sink)?;
            }
            Lex::Idle => {}
            _ => return Err(ReadError::Truncated { offset: self.offset }),
        }
        match self.root {
            Root::After => Ok(()),
            _ => Err(ReadError::Truncated { offset: self.offset }),
        }
    }

    fn step<S: TokenSink>(&mut self, b: u8, sink: &mut S) -> ReadResult<()> {
        match self.lex {
            Lex::Idle => self.structural(b, sink),
            Lex::Str { key, escape } => self.string_byte(b, key, escape, sink),
            Lex::Literal { rest } => {
                if rest.first() != Some(&b) {
                    return Err(self.malformed("invalid literal"));
                }
                sink.byte(b);
                let rest = &rest[1..];
                if rest.is_empty() {
                    self.lex = Lex::Idle;
                    self.end_value(sink)
                } else {
                    self.lex = Lex::Literal { rest };
                    Ok(())
                }
            }
            Lex::Number(n) => match n.advance(b) {
                Some(next) => {
                    sink.byte(b);
                    self.lex = Lex::Number(next);
                    Ok(())
                }
                None if n.is_complete() => {
                    self.lex = Lex::Idle;
                    self.end_value(sink)?;
                    self.structural(b, sink)
                }
                None => Err(self.malformed("invalid number")),
            },
        }
    }

    fn string_byte<S: TokenSink>(
        &mut self,
        b: u8,
        key: bool,
        escape: Escape,
        sink: &mut S,
    ) -> ReadResult<()> {
        sink.byte(b);
        if key && self.collect_key {
            self.key_buf.push(b);
        }

        let escape = match escape {
            Escape::None => match b {
                b'"' => return self.end_string(key, sink),
                b'\\' => Escape::Backslash,
                0x00..=0x1f => return Err(self.malformed("control character in string")),
                _ => Escape::None,
            },
            Escape::Backslash => match b {
                b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't' => Escape::None,
                b'u' => Escape::Unicode(4),
                _ => return Err(self.malformed("invalid escape")),
            },
            Escape::Unicode(remaining) => {
                if !b.is_ascii_hexdigit() {
                    return Err(self.malformed("invalid unicode escape"));
                }
                if remaining == 1 {
                    Escape::None
                } else {
                    Escape::Unicode(remaining - 1)
                }
            }
        };
        self.lex = Lex::Str { key, escape };
        Ok(())
    }

    fn end_string<S: TokenSink>(&mut self, key: bool, sink: &mut S) -> ReadResult<()> {
        self.lex = Lex::Idle;
        if !key {
            return self.end_value(sink);
        }

        if let Some(Frame::Object(state)) = self.stack.last_mut() {
            *state = ObjState::Colon;
        }
        if self.collect_key {
            let name: String = serde_json::from_slice(&self.key_buf)?;
            self.key_buf.clear();
            sink.member(name);
        }
        Ok(())
    }

    fn structural<S: TokenSink>(&mut self, b: u8, sink: &mut S) -> ReadResult<()> {
        if matches!(b, b' ' | b'\t' | b'\n' | b'\r') {
            if !self.stack.is_empty() {
                sink.byte(b);
            }
            return Ok(());
        }

        match self.stack.last().copied() {
            None => match self.root {
                Root::Before => self.begin_value(b, sink),
                _ => Err(self.malformed("trailing characters after document")),
            },
            Some(Frame::Object(state)) => match (state, b) {
                (ObjState::FirstKeyOrEnd | ObjState::CommaOrEnd, b'}') => self.close(b, sink),
                (ObjState::FirstKeyOrEnd | ObjState::Key, b'"') => {
                    sink.byte(b);
                    self.collect_key = sink.wants_member();
                    if self.collect_key {
                        self.key_buf.clear();
                        self.key_buf.push(b);
                    }
                    self.lex = Lex::Str {
                        key: true,
                        escape: Escape::None,
                    };
                    Ok(())
                }
                (ObjState::Colon, b':') => {
                    sink.byte(b);
                    self.set_top(Frame::Object(ObjState::Value));
                    Ok(())
                }
                (ObjState::Value, _) => self.begin_value(b, sink),
                (ObjState::CommaOrEnd, b',') => {
                    sink.byte(b);
                    self.set_top(Frame::Object(ObjState::Key));
                    Ok(())
                }
                _ => Err(self.malformed(format!("unexpected '{}' in object", b as char))),
            },
            Some(Frame::Array(state)) => match (state, b) {
                (ArrState::FirstValueOrEnd | ArrState::CommaOrEnd, b']') => self.close(b, sink),
                (ArrState::FirstValueOrEnd | ArrState::Value, _) => self.begin_value(b, sink),
                (ArrState::CommaOrEnd, b',') => {
                    sink.byte(b);
                    self.set_top(Frame::Array(ArrState::Value));
                    Ok(())
                }
                _ => Err(self.malformed(format!("unexpected '{}' in array", b as char))),
            },
        }
    }

    fn begin_value<S: TokenSink>(&mut self, b: u8, sink: &mut S) -> ReadResult<()> {
        let kind = match b {
            b'{' => ValueKind::Object,
            b'[' => ValueKind::Array,
            b'"' => ValueKind::String,
            b'-' | b'0'..=b'9' => ValueKind::Number,
            b't' | b'f' | b'n' => ValueKind::Literal,
            _ => return Err(self.malformed(format!("unexpected '{}'", b as char))),
        };

        if kind.is_container() && self.stack.len() >= self.max_depth {
            return Err(ReadError::Depth {
                offset: self.offset,
                max_depth: self.max_depth,
            });
        }
        if self.root == Root::Before {
            self.root = Root::InValue;
        }

        sink.value_start(kind);
        sink.byte(b);

        match kind {
            ValueKind::Object => self.stack.push(Frame::Object(ObjState::FirstKeyOrEnd)),
            ValueKind::Array => self.stack.push(Frame::Array(ArrState::FirstValueOrEnd)),
            ValueKind::String => {
                self.lex = Lex::Str {
                    key: false,
                    escape: Escape::None,
                }
            }
            ValueKind::Number => {
                self.lex = Lex::Number(match b {
                    b'-' => Num::Minus,
                    b'0' => Num::Zero,
                    _ => Num::Int,
                })
            }
            ValueKind::Literal => {
                let rest: &'static [u8] = match b {
                    b't' => b"rue",
                    b'f' => b"alse",
                    _ => b"ull",
                };
                self.lex = Lex::Literal { rest };
            }
        }
        Ok(())
    }

    fn close<S: TokenSink>(&mut self, b: u8, sink: &mut S) -> ReadResult<()> {
        sink.byte(b);
        self.stack.pop();
        self.end_value(sink)
    }

    fn end_value<S: TokenSink>(&mut self, sink: &mut S) -> ReadResult<()> {
        sink.value_end()?;
        match self.stack.last() {
            None => self.root = Root::After,
            Some(Frame::Object(_)) => self.set_top(Frame::Object(ObjState::CommaOrEnd)),
            Some(Frame::Array(_)) => self.set_top(Frame::Array(ArrState::CommaOrEnd)),
        }
        Ok(())
    }

    fn set_top(&mut self, frame: Frame) {
        if let Some(top) = self.stack.last_mut() {
            *top = frame;
        }
    }

    fn malformed(&self, reason: impl Into<String>) -> ReadError {
        ReadError::malformed(self.offset, reason)
    }
}
