//! Bounded Token Reader
//!
//! Reads a JSON document from a byte source in memory bounded by the refill
//! buffer, independent of the document size. Without a path, a root array
//! yields its elements and any other root yields itself. With a path, only
//! values the path selects are captured; everything else is skipped
//! unmaterialized.
//!
//! Malformed or truncated input aborts the enumeration.

mod element_reader;
mod errors;
mod lexer;
mod matcher;
mod pool;
mod scanner;

pub use element_reader::{AsyncElementReader, ElementReader, ReaderState};
pub use errors::{ReadError, ReadResult};
pub use lexer::{Lexer, TokenSink, ValueKind};
pub use matcher::{MatchState, Matched};
pub use pool::{BufferPool, PooledBuffer};
pub use scanner::{scan_slice, Scanner};
