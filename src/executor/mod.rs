//! Query execution
//!
//! Four executors share one plan contract:
//!
//! | source        | no path          | path                       |
//! |---------------|------------------|----------------------------|
//! | whole buffer  | `BufferExecutor` | `BufferExecutor` + path    |
//! | forward-only  | `StreamExecutor` | `StreamExecutor` + path    |
//!
//! Each offers a synchronous pull ([`Elements`]) and an asynchronous,
//! cancellable pull ([`ElementStream`]) over the same sequence. Whole-buffer
//! execution fails before yielding anything; streaming execution yields every
//! element before the one that failed.

mod async_iter;
mod buffer_exec;
mod errors;
mod pipeline;
mod relational;
mod result;
mod sorter;
mod stream_exec;

pub use async_iter::{cancellable, CancellationSignal, ElementStream};
pub use buffer_exec::BufferExecutor;
pub use errors::{ExecutorError, ExecutorErrorCode, ExecutorResult, Severity};
pub use pipeline::ExecutionContext;
pub use relational::{apply_ops, group_by, join, reduce};
pub use result::{Elements, ExecutorKind};
pub use sorter::{compare_values, ElementSorter};
pub use stream_exec::StreamExecutor;
