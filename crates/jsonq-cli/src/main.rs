//! jsonq CLI - Query JSON collections from the command line.
//!
//! Fetches a JSON array of objects from a URL (or a file with `--file`),
//! applies the query described by the flags and prints the result as JSON.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use jsonq::{DataSource, FileSource, HttpSource, QueryBuilder, Value};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod args;

/// jsonq: fluent queries over JSON collections.
#[derive(Parser, Debug)]
#[command(name = "jsonq")]
#[command(version, about, long_about = None)]
#[command(group(ArgGroup::new("terminal").args(["count", "keys", "first", "pluck", "aggregate", "page"])))]
struct Cli {
    /// URL (or path, with --file) of a JSON array of objects
    resource: String,

    /// Read RESOURCE from the filesystem instead of over HTTP
    #[arg(long)]
    file: bool,

    /// Request timeout in seconds
    #[arg(long, env = "JSONQ_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// JSON pointer to the collection inside the document (e.g. /data)
    #[arg(long, env = "JSONQ_POINTER")]
    pointer: Option<String>,

    /// Keep only these top-level keys
    #[arg(long, value_delimiter = ',', value_name = "KEYS")]
    select: Vec<String>,

    /// Condition such as 'price>30' or 'category.name=Shoes' (repeatable)
    #[arg(long = "where", value_name = "EXPR")]
    conditions: Vec<String>,

    /// Membership test such as 'id=1,2,3' (repeatable)
    #[arg(long = "in", value_name = "FIELD=VALUES")]
    within: Vec<String>,

    /// Exclusion test such as 'id=4,5' (repeatable)
    #[arg(long = "not-in", value_name = "FIELD=VALUES")]
    not_within: Vec<String>,

    /// Case-insensitive substring search such as 'title=shoe' (repeatable)
    #[arg(long, value_name = "FIELD=TEXT")]
    search: Vec<String>,

    /// Wildcard match such as 'title=%shoe%' (repeatable)
    #[arg(long, value_name = "FIELD=PATTERN")]
    like: Vec<String>,

    /// Replace results with one record per distinct value of FIELD
    #[arg(long, value_name = "FIELD")]
    distinct: Option<String>,

    /// Group results by FIELD
    #[arg(long, value_name = "FIELD")]
    group_by: Option<String>,

    /// Group condition such as 'count>2' or 'avg:price<50' (repeatable)
    #[arg(long, value_name = "EXPR")]
    having: Vec<String>,

    /// Drop the first N results
    #[arg(long, value_name = "N")]
    skip: Option<usize>,

    /// Keep at most N results
    #[arg(long, value_name = "N")]
    limit: Option<usize>,

    /// Sort key, optionally with direction (price:desc)
    #[arg(long, value_name = "FIELD[:DIR]")]
    sort: Option<String>,

    /// Print only page P of the results
    #[arg(long, value_name = "P")]
    page: Option<usize>,

    /// Page size used with --page
    #[arg(long, value_name = "N", default_value_t = 15)]
    per_page: usize,

    /// Print the number of results
    #[arg(long)]
    count: bool,

    /// Print the union of result keys
    #[arg(long)]
    keys: bool,

    /// Print the first result only
    #[arg(long)]
    first: bool,

    /// Print FIELD of every result
    #[arg(long, value_name = "FIELD")]
    pluck: Option<String>,

    /// Reduce a field, e.g. price:avg
    #[arg(long, value_name = "FIELD:FUNCTION")]
    aggregate: Option<String>,

    /// Pretty-print the output
    #[arg(long)]
    pretty: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let source = source(&cli);
    let mut query = QueryBuilder::new(source);
    configure(&mut query, &cli)?;
    debug!(spec = ?query.spec(), "query configured");

    let output = execute(&mut query, &cli)?;
    let text = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{text}");
    Ok(())
}

fn source(cli: &Cli) -> Box<dyn DataSource> {
    if cli.file {
        let mut source = FileSource::new();
        if let Some(pointer) = &cli.pointer {
            source = source.with_pointer(pointer);
        }
        Box::new(source)
    } else {
        let mut source = HttpSource::new().with_timeout(Duration::from_secs(cli.timeout));
        if let Some(pointer) = &cli.pointer {
            source = source.with_pointer(pointer);
        }
        Box::new(source)
    }
}

/// Registers every stage named on the command line.
fn configure<S: DataSource>(query: &mut QueryBuilder<S>, cli: &Cli) -> Result<()> {
    query.from(cli.resource.as_str());

    if !cli.select.is_empty() {
        query.select(cli.select.iter().map(String::as_str));
    }
    for expr in &cli.conditions {
        let c = args::comparison(expr).with_context(|| format!("invalid --where '{expr}'"))?;
        query.and_where(&c.field, &c.operator, c.value);
    }
    for expr in &cli.within {
        let (field, values) = args::field_values(expr)?;
        query.where_in(&field, values);
    }
    for expr in &cli.not_within {
        let (field, values) = args::field_values(expr)?;
        query.where_not_in(&field, values);
    }
    for expr in &cli.search {
        let (field, text) = args::field_text(expr)?;
        query.search(&field, &text);
    }
    for expr in &cli.like {
        let (field, pattern) = args::field_text(expr)?;
        query.like(&field, &pattern);
    }
    if let Some(field) = &cli.distinct {
        query.distinct(field);
    }
    if let Some(field) = &cli.group_by {
        query.group_by(field);
    }
    for expr in &cli.having {
        let h = args::having(expr).with_context(|| format!("invalid --having '{expr}'"))?;
        match &h.field {
            Some(field) => query.having_on(h.aggregate, field, &h.operator, h.value),
            None => query.having(h.aggregate, &h.operator, h.value),
        };
    }
    if let Some(n) = cli.skip {
        query.skip(n);
    }
    if let Some(n) = cli.limit {
        query.limit(n);
    }
    if let Some(expr) = &cli.sort {
        let (field, dir) = args::sort_key(expr)?;
        query.sort(&field, dir);
    }
    Ok(())
}

/// Runs the terminal selected on the command line.
fn execute<S: DataSource>(query: &mut QueryBuilder<S>, cli: &Cli) -> Result<Value> {
    let value = if cli.count {
        Value::from(query.count()?)
    } else if cli.keys {
        Value::from(query.keys()?)
    } else if cli.first {
        query.first()?.unwrap_or(Value::Null)
    } else if let Some(field) = &cli.pluck {
        Value::Array(query.pluck(field)?)
    } else if let Some(expr) = &cli.aggregate {
        let (field, aggregate) = args::aggregate(expr)?;
        query.aggregate(&field, aggregate)?
    } else if let Some(page) = cli.page {
        serde_json::to_value(query.paginate(page, cli.per_page)?)?
    } else if cli.group_by.is_some() {
        serde_json::to_value(query.get_groups()?)?
    } else {
        Value::Array(query.get()?)
    };
    Ok(value)
}
