//! Export series from a Thanos Store API into Parquet, CSV or JSON lines.
//!
//! Usage:
//!   obslytics --input-config-file input.yaml --match 'up{job="node"}' \
//!     --min-time 2024-01-01T00:00:00Z --max-time 2024-01-02T00:00:00Z \
//!     --resolution 5m --output-type parquet --output-file up.parquet

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::DateTime;
use chrono::Utc;
use clap::Parser;
use clap::ValueEnum;
use obslytics::sink::ArrowFormat;
use obslytics::sink::ArrowSink;
use obslytics::sink::JsonLinesSink;
use obslytics::InputConfig;
use obslytics::Query;
use obslytics::QueryContext;
use obslytics::SchemaMode;
use obslytics::Sink;
use obslytics::TimeRange;
use tracing::info;
use tracing::warn;
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputType {
    Parquet,
    Csv,
    Jsonl,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SchemaModeArg {
    /// Add columns as labels are first seen
    Streaming,
    /// Fetch all label names first, so every row has every column
    Prescan,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML file describing the store to read from
    #[arg(long, env = "OBSLYTICS_INPUT_CONFIG_FILE")]
    input_config_file: PathBuf,

    /// Series selector, e.g. 'up{job="node"}'; matchers of all selectors must hold
    #[arg(long = "match", required = true)]
    matchers: Vec<String>,

    /// Start of the exported range, RFC 3339, inclusive
    #[arg(long, value_parser = parse_time)]
    min_time: DateTime<Utc>,

    /// End of the exported range, RFC 3339, inclusive
    #[arg(long, value_parser = parse_time)]
    max_time: DateTime<Utc>,

    /// Width of the aggregation buckets
    #[arg(long, default_value = "1m")]
    resolution: humantime::Duration,

    /// Give up after this long
    #[arg(long)]
    timeout: Option<humantime::Duration>,

    /// Give up dialing the store after this long
    #[arg(long, default_value = "10s")]
    connect_timeout: humantime::Duration,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputType::Parquet)]
    output_type: OutputType,

    /// Output file, `-` for standard output
    #[arg(long, default_value = "-")]
    output_file: String,

    /// How label columns are determined
    #[arg(long, value_enum, default_value_t = SchemaModeArg::Streaming)]
    schema_mode: SchemaModeArg,

    /// Log filter, in `RUST_LOG` syntax
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_level: String,
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|t| t.with_timezone(&Utc))
}

fn init_logging(filter: &str) -> anyhow::Result<Dispatch> {
    tracing_log::LogTracer::init().context("installing log bridge")?;
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).context("parsing log filter")?)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    tracing::dispatcher::set_global_default(dispatch.clone()).context("installing subscriber")?;
    Ok(dispatch)
}

fn sink(output_type: OutputType, output_file: &str) -> anyhow::Result<Box<dyn Sink>> {
    let out = obslytics::sink::output(output_file)
        .with_context(|| format!("opening output file {}", output_file))?;
    Ok(match output_type {
        OutputType::Parquet => Box::new(ArrowSink::new(out, ArrowFormat::Parquet)),
        OutputType::Csv => Box::new(ArrowSink::new(out, ArrowFormat::Csv)),
        OutputType::Jsonl => Box::new(JsonLinesSink::new(out)),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let dispatch = init_logging(&args.log_level)?;

    let input = InputConfig::from_path(&args.input_config_file)?;
    let client = input.client(
        obslytics::builder()
            .dispatch(dispatch)
            .connect_timeout(args.connect_timeout.into()),
    )?;

    let mut matchers = Vec::new();
    for selector in &args.matchers {
        matchers.extend(obslytics::parse_selector(selector)?);
    }
    let range = TimeRange::new(args.min_time.timestamp_millis(), args.max_time.timestamp_millis())?;
    let query = Query::new(range, matchers, args.resolution.into())?;

    let mut ctx = QueryContext::new();
    if let Some(timeout) = args.timeout {
        ctx = ctx.with_timeout(Duration::from(timeout));
    }
    let token = ctx.token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling export");
            token.cancel();
        }
    });

    let mode = match args.schema_mode {
        SchemaModeArg::Streaming => SchemaMode::Streaming,
        SchemaModeArg::Prescan => SchemaMode::PreScan,
    };
    info!(
        endpoint = %client.uri(),
        min_time = %args.min_time,
        max_time = %args.max_time,
        resolution = %query.resolution,
        "starting export"
    );
    let summary = obslytics::export(&client, &ctx, &query, sink(args.output_type, &args.output_file)?, mode)
        .await
        .with_context(|| format!("exporting from {}", client.uri()))?;
    info!(
        series = summary.series,
        rows = summary.rows,
        columns = summary.columns.len(),
        "export finished"
    );
    Ok(())
}
