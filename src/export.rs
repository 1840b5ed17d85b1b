use tracing::debug;
use tracing::instrument::WithSubscriber;

use super::client::QueryContext;
use super::client::SeriesCursor;
use super::client::StoreClient;
use super::model::Query;
use super::resample::resample;
use super::schema::ColumnSchema;
use super::schema::RowUnifier;
use super::sink::Sink;
use super::Error;

/// How the label columns of an export are determined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SchemaMode {
    /// Columns are added as label names are first seen. Rows written before
    /// a column appeared do not have it.
    #[default]
    Streaming,
    /// The series' label names are fetched in a first pass without chunks,
    /// so every row has every column.
    PreScan,
}

/// What an export produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// The number of series received.
    pub series: u64,
    /// The number of rows written.
    pub rows: u64,
    /// The final columns, label columns first.
    pub columns: Vec<String>,
}

/// Export the series selected by `query` into `sink`.
///
/// Series are pulled from the store one at a time; the next one is only
/// requested after all rows of the previous one were written. Within a
/// series, rows come in bucket order.
///
/// The cursor is always closed and `sink` is always finalized, exactly once.
/// The first error wins: a finalize error is only returned if everything
/// else succeeded. A series that cannot be decoded ends the export.
pub async fn export(
    client: &StoreClient,
    ctx: &QueryContext,
    query: &Query,
    mut sink: Box<dyn Sink>,
    mode: SchemaMode,
) -> Result<ExportSummary, Error> {
    let result = run(client, ctx, query, &mut *sink, mode)
        .with_subscriber(client.dispatch().clone())
        .await;
    let finalized = sink.finalize();
    let summary = result?;
    finalized?;
    Ok(summary)
}

async fn run(
    client: &StoreClient,
    ctx: &QueryContext,
    query: &Query,
    sink: &mut dyn Sink,
    mode: SchemaMode,
) -> Result<ExportSummary, Error> {
    let schema = match mode {
        SchemaMode::Streaming => ColumnSchema::new(),
        SchemaMode::PreScan => {
            let schema = prescan(client, ctx, query).await?;
            sink.begin(schema.labels())?;
            schema
        }
    };
    let mut unifier = RowUnifier::with_schema(schema);
    let mut summary = ExportSummary::default();

    let mut cursor = client.open(ctx, query.range, &query.matchers).await?;
    let result = pump(&mut cursor, ctx, query, sink, &mut unifier, &mut summary).await;
    cursor.close();
    result?;

    summary.columns = unifier.schema().columns();
    debug!(
        series = summary.series,
        rows = summary.rows,
        columns = summary.columns.len(),
        "export finished"
    );
    Ok(summary)
}

async fn pump(
    cursor: &mut SeriesCursor,
    ctx: &QueryContext,
    query: &Query,
    sink: &mut dyn Sink,
    unifier: &mut RowUnifier,
    summary: &mut ExportSummary,
) -> Result<(), Error> {
    while cursor.advance().await {
        let series = match cursor.current() {
            Some(series) => series,
            None => continue,
        };
        summary.series += 1;
        let samples = series.samples(query.range);
        for bucket in resample(samples, query.resolution, query.range) {
            ctx.check()?;
            let bucket = bucket.map_err(|e| Error::decode(series.labels(), e))?;
            let row = unifier.unify(bucket, series.labels());
            sink.write_row(&row)?;
            summary.rows += 1;
        }
    }
    match cursor.take_err() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Collect the label names of all series selected by `query`, in the order
/// they are first seen, without transferring chunks.
pub async fn prescan(
    client: &StoreClient,
    ctx: &QueryContext,
    query: &Query,
) -> Result<ColumnSchema, Error> {
    let mut schema = ColumnSchema::new();
    let mut cursor = client.open_labels_only(ctx, query.range, &query.matchers).await?;
    while cursor.advance().await {
        if let Some(series) = cursor.current() {
            schema.observe(series.labels());
        }
    }
    let result = cursor.take_err();
    cursor.close();
    if let Some(e) = result {
        return Err(e);
    }
    debug!(columns = schema.labels().len(), "pre-scanned label columns");
    Ok(schema)
}
