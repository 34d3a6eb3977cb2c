//! CLI argument definitions using clap
//!
//! Commands:
//! - jsonflow query [options] FILE
//! - jsonflow explain [options]

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// jsonflow - declarative queries over JSON files
#[derive(Parser, Debug)]
#[command(name = "jsonflow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a query over FILE and print one JSON value per line
    Query {
        #[command(flatten)]
        query: QueryArgs,

        /// Load the whole file into memory instead of streaming it
        #[arg(long)]
        whole: bool,

        /// Print engine metrics to stderr when done
        #[arg(long)]
        metrics: bool,

        /// Input JSON file
        file: PathBuf,
    },

    /// Print the plan a query would run with, without reading any input
    Explain {
        #[command(flatten)]
        query: QueryArgs,
    },
}

/// Operators shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct QueryArgs {
    /// Path to configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path query selecting candidate elements, e.g. `$.data[*]`
    #[arg(long)]
    pub path: Option<String>,

    /// Filter expression, e.g. `@.age > 25`; repeatable
    #[arg(long = "where", value_name = "EXPR")]
    pub filters: Vec<String>,

    /// Sort key as FIELD or FIELD:desc; repeatable, first is primary
    #[arg(long = "order-by", value_name = "FIELD[:desc]")]
    pub order_by: Vec<String>,

    #[arg(long)]
    pub skip: Option<usize>,

    #[arg(long)]
    pub take: Option<usize>,

    /// Print the number of matching elements instead of the elements
    #[arg(long)]
    pub count: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
