//! CLI module for jsonflow
//!
//! Provides command-line interface for:
//! - query: run an operator chain over a JSON file
//! - explain: print the plan for an operator chain

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, QueryArgs};
pub use commands::{build_chain, explain, query_file, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_text, write_value};
