//! Observability
//!
//! Counters live in [`MetricsRegistry`]. Events go through `tracing`; the
//! binary installs the subscriber, the library only emits:
//!
//! | level | event |
//! |-------|-------|
//! | debug | plan translated, executor selected, query finished |
//! | warn  | element skipped by shape policy |
//! | debug | query faulted, query cancelled |
//! | trace | refill, buffer created, artifact compiled |

mod metrics;

pub use metrics::{MetricsRegistry, MetricsSnapshot};
