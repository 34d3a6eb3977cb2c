//! CLI command implementations
//!
//! Every command loads configuration first, then sets up logging, then
//! builds the operator chain from the command line. Input files are opened
//! and closed here; the engine only sees readers and byte slices.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{EngineConfig, LogFormat, LoggingConfig};
use crate::engine::{finish, QueryEngine, QueryOutput};
use crate::path::{FieldPath, FilterExpr, PathQuery};
use crate::planner::{Aggregate, OperatorChain};
use crate::schema::ElementSchema;

use super::args::{Command, QueryArgs};
use super::errors::{CliError, CliResult};
use super::io::{write_text, write_value};

/// Run the CLI
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    let args = match &cmd {
        Command::Query { query, .. } | Command::Explain { query } => query,
    };
    let config = load_config(args.config.as_deref())?;
    init_logging(&config.logging);

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    match cmd {
        Command::Query {
            query,
            whole,
            metrics,
            file,
        } => {
            let engine = QueryEngine::new(config);
            let result = query_file(&engine, &query, &file, whole, &mut out);
            if metrics {
                eprintln!("{}", serde_json::to_string(&engine.metrics())?);
            }
            result?;
        }
        Command::Explain { query } => explain(&QueryEngine::new(config), &query, &mut out)?,
    }
    out.flush()?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> CliResult<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path).map_err(|e| CliError::config_error(e.to_string())),
        None => Ok(EngineConfig::default()),
    }
}

/// Logs go to stderr so stdout carries only results. `RUST_LOG` overrides
/// the configured filter.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let registry = tracing_subscriber::registry().with(filter);
    // A subscriber may already be installed when called more than once
    let _ = match logging.format {
        LogFormat::Json => registry.with(fmt::layer().json().with_writer(io::stderr)).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_writer(io::stderr)).try_init(),
    };
}

/// Runs a query over `file`, writing each result value as one line
pub fn query_file<W: Write>(
    engine: &QueryEngine,
    args: &QueryArgs,
    file: &Path,
    whole: bool,
    out: &mut W,
) -> CliResult<()> {
    let chain = build_chain(args)?;
    let path = parse_path(args)?;
    let schema = ElementSchema::dynamic();

    if whole {
        let bytes = fs::read(file)
            .map_err(|e| CliError::io_error(format!("failed to read '{}': {}", file.display(), e)))?;
        let output = engine.run_buffer(&bytes, path, &chain, &schema)?;
        return write_output(out, output);
    }

    let source = File::open(file)
        .map_err(|e| CliError::io_error(format!("failed to open '{}': {}", file.display(), e)))?;
    let query = engine.translate(&chain, &schema)?;
    let elements = engine.stream(source, path, &query.plan)?;

    if query.post.is_empty() {
        for element in elements {
            write_value(out, &element.map_err(crate::Error::from)?)?;
        }
        return Ok(());
    }
    let values = elements.collect_values().map_err(crate::Error::from)?;
    write_output(out, finish(&query.post, values)?)
}

/// Writes the translated plan without touching any input
pub fn explain<W: Write>(engine: &QueryEngine, args: &QueryArgs, out: &mut W) -> CliResult<()> {
    parse_path(args)?;
    let chain = build_chain(args)?;
    let plan = engine.explain(&chain, &ElementSchema::dynamic());
    write_text(out, &plan.to_string())
}

fn write_output<W: Write>(out: &mut W, output: QueryOutput) -> CliResult<()> {
    for value in output.into_values() {
        write_value(out, &value)?;
    }
    Ok(())
}

fn parse_path(args: &QueryArgs) -> CliResult<Option<PathQuery>> {
    args.path
        .as_deref()
        .map(PathQuery::parse)
        .transpose()
        .map_err(|e| CliError::usage_error(format!("--path: {}", e)))
}

/// Builds the operator chain in the order filters, sort, skip, take, count
pub fn build_chain(args: &QueryArgs) -> CliResult<OperatorChain> {
    let mut chain = OperatorChain::new();
    for text in &args.filters {
        let expr = FilterExpr::parse(text).map_err(|e| CliError::usage_error(format!("--where: {}", e)))?;
        chain = chain.filter(expr);
    }
    for (i, key) in args.order_by.iter().enumerate() {
        let (path, ascending) = parse_sort_key(key)?;
        chain = if i == 0 {
            chain.order_by(path, ascending)
        } else {
            chain.then_by(path, ascending)
        };
    }
    if let Some(n) = args.skip {
        chain = chain.skip(n);
    }
    if let Some(n) = args.take {
        chain = chain.take(n);
    }
    if args.count {
        chain = chain.aggregate(Aggregate::Count);
    }
    Ok(chain)
}

/// `FIELD`, `FIELD:asc` or `FIELD:desc`
fn parse_sort_key(text: &str) -> CliResult<(FieldPath, bool)> {
    let (field, ascending) = match text.rsplit_once(':') {
        Some((field, "asc")) => (field, true),
        Some((field, "desc")) => (field, false),
        Some((_, other)) => {
            return Err(CliError::usage_error(format!(
                "--order-by '{}': direction must be asc or desc, got '{}'",
                text, other
            )))
        }
        None => (text, true),
    };
    if field.is_empty() {
        return Err(CliError::usage_error(format!("--order-by '{}': missing field", text)));
    }
    Ok((FieldPath::from(field), ascending))
}
