//! Destinations for exported rows.
//!
//! A [`Sink`] receives the rows of one export in order and is finalized
//! exactly once, whether the export succeeded or not.

use std::io;
use std::io::BufWriter;
use std::io::Write;
use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::array::Float64Array;
use arrow::array::Int64Array;
use arrow::array::StringBuilder;
use arrow::array::UInt64Array;
use arrow::csv;
use arrow::datatypes::DataType;
use arrow::datatypes::Field;
use arrow::datatypes::Schema;
use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::basic::ZstdLevel;
use parquet::file::properties::WriterProperties;
use tracing::debug;

use super::resample::Bucket;
use super::schema::Row;
use super::schema::AGGREGATE_COLUMNS;
use super::schema::EMPTY;
use super::Error;

/// A consumer of exported rows.
pub trait Sink: Send {
    /// Announce the label columns before the first row, when they are known
    /// up front as with [`SchemaMode::PreScan`](crate::SchemaMode).
    ///
    /// Rows then start with exactly these columns. They can still gain
    /// columns if a series changed between the scan and the export.
    fn begin(&mut self, label_columns: &[String]) -> Result<(), Error> {
        let _ = label_columns;
        Ok(())
    }

    /// Write one row.
    ///
    /// The label columns of a row always start with the label columns of
    /// every row written before it.
    fn write_row(&mut self, row: &Row) -> Result<(), Error>;

    /// Flush everything and release the destination.
    fn finalize(self: Box<Self>) -> Result<(), Error>;
}

/// Writes each row as one JSON object per line, as soon as it arrives.
///
/// Keys are in column order. Non-finite floats are written as `null`.
pub struct JsonLinesSink<W: Write> {
    out: BufWriter<W>,
}

impl<W: Write> JsonLinesSink<W> {
    /// Write to `out`, buffered.
    pub fn new(out: W) -> JsonLinesSink<W> {
        JsonLinesSink {
            out: BufWriter::new(out),
        }
    }
}

impl<W: Write + Send> Sink for JsonLinesSink<W> {
    fn write_row(&mut self, row: &Row) -> Result<(), Error> {
        serde_json::to_writer(&mut self.out, row).map_err(Error::sink)?;
        self.out.write_all(b"\n").map_err(Error::sink)
    }

    fn finalize(mut self: Box<Self>) -> Result<(), Error> {
        self.out.flush().map_err(Error::sink)
    }
}

/// The file format of an [`ArrowSink`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrowFormat {
    /// Parquet, ZSTD compressed.
    Parquet,
    /// CSV with a header line.
    Csv,
}

/// Rows per record batch and Parquet row group, unless configured.
pub const DEFAULT_BATCH_SIZE: usize = 64 * 1024;

/// Writes rows as one dense table.
///
/// A table's columns are fixed when its first batch is written. If the
/// columns were announced with [`Sink::begin`], full batches are written as
/// rows arrive; otherwise the columns may still grow, so rows are kept
/// until finalize. A row with a column the table does not have fails with
/// [`ErrorKind::Sink`](crate::ErrorKind).
///
/// Columns that first appeared after a row was written are filled with the
/// empty string for that row. Label columns are `Utf8`, `_bucket_start` is
/// `Int64` milliseconds, `_count` is `UInt64` and the remaining aggregates
/// are `Float64`.
pub struct ArrowSink<W: Write + Send> {
    format: ArrowFormat,
    batch_size: usize,
    out: Option<W>,
    writer: Option<TableWriter<W>>,
    labels: Option<Vec<String>>,
    pending: Vec<Row>,
}

enum TableWriter<W: Write + Send> {
    Parquet(ArrowWriter<W>),
    Csv(csv::Writer<W>),
}

impl<W: Write + Send> ArrowSink<W> {
    /// Write a table in `format` to `out`.
    pub fn new(out: W, format: ArrowFormat) -> ArrowSink<W> {
        ArrowSink {
            format,
            batch_size: DEFAULT_BATCH_SIZE,
            out: Some(out),
            writer: None,
            labels: None,
            pending: Vec::new(),
        }
    }

    /// Convert and write rows `batch_size` at a time. For Parquet this is
    /// also the row group size.
    pub fn with_batch_size(mut self, batch_size: usize) -> ArrowSink<W> {
        self.batch_size = batch_size.max(1);
        self
    }

    fn schema(labels: &[String]) -> SchemaRef {
        let mut fields = Vec::with_capacity(labels.len() + AGGREGATE_COLUMNS.len());
        for name in labels {
            fields.push(Field::new(name.as_str(), DataType::Utf8, false));
        }
        let types = [
            DataType::Int64,
            DataType::UInt64,
            DataType::Float64,
            DataType::Float64,
            DataType::Float64,
            DataType::Float64,
        ];
        for (name, data_type) in AGGREGATE_COLUMNS.iter().zip(types) {
            fields.push(Field::new(*name, data_type, false));
        }
        Arc::new(Schema::new(fields))
    }

    fn record_batch(schema: SchemaRef, labels: usize, rows: &[Row]) -> Result<RecordBatch, ArrowError> {
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
        for i in 0..labels {
            let mut builder = StringBuilder::new();
            for row in rows {
                builder.append_value(row.label_values().get(i).map_or(EMPTY, String::as_str));
            }
            columns.push(Arc::new(builder.finish()));
        }

        let buckets = || rows.iter().map(Row::bucket);
        let floats = |f: fn(&Bucket) -> f64| -> ArrayRef {
            Arc::new(Float64Array::from_iter_values(buckets().map(f)))
        };
        columns.push(Arc::new(Int64Array::from_iter_values(buckets().map(|b| b.start))));
        columns.push(Arc::new(UInt64Array::from_iter_values(buckets().map(|b| b.count))));
        columns.push(floats(|b| b.sum));
        columns.push(floats(|b| b.min));
        columns.push(floats(|b| b.max));
        columns.push(floats(Bucket::avg));

        RecordBatch::try_new(schema, columns)
    }

    fn open(&mut self, schema: SchemaRef) -> Result<&mut TableWriter<W>, Error> {
        if self.writer.is_none() {
            let out = self
                .out
                .take()
                .ok_or_else(|| Error::sink("the table was already finished"))?;
            debug!(columns = schema.fields().len(), "writing table");
            let writer = match self.format {
                ArrowFormat::Parquet => {
                    let props = WriterProperties::builder()
                        .set_compression(Compression::ZSTD(ZstdLevel::try_new(3).map_err(Error::sink)?))
                        .set_max_row_group_size(self.batch_size)
                        .build();
                    let writer = ArrowWriter::try_new(out, schema, Some(props)).map_err(Error::sink)?;
                    TableWriter::Parquet(writer)
                }
                ArrowFormat::Csv => {
                    TableWriter::Csv(csv::WriterBuilder::new().with_header(true).build(out))
                }
            };
            self.writer = Some(writer);
        }
        self.writer
            .as_mut()
            .ok_or_else(|| Error::sink("the table was already finished"))
    }

    /// Write the pending rows as one batch over the fixed label columns.
    fn flush(&mut self) -> Result<(), Error> {
        let labels = self.labels.as_deref().unwrap_or_default();
        let schema = ArrowSink::<W>::schema(labels);
        let batch = ArrowSink::<W>::record_batch(schema.clone(), labels.len(), &self.pending)
            .map_err(Error::sink)?;
        self.pending.clear();
        match self.open(schema)? {
            TableWriter::Parquet(writer) => writer.write(&batch).map_err(Error::sink),
            TableWriter::Csv(writer) => writer.write(&batch).map_err(Error::sink),
        }
    }
}

impl<W: Write + Send> Sink for ArrowSink<W> {
    fn begin(&mut self, label_columns: &[String]) -> Result<(), Error> {
        if self.writer.is_none() && self.pending.is_empty() {
            self.labels = Some(label_columns.to_vec());
        }
        Ok(())
    }

    fn write_row(&mut self, row: &Row) -> Result<(), Error> {
        let fixed = match &self.labels {
            Some(labels) => labels.len(),
            None => {
                self.pending.push(row.clone());
                return Ok(());
            }
        };
        if let Some(extra) = row.label_columns().get(fixed) {
            return Err(Error::sink(format!(
                "label column {:?} appeared after the table columns were fixed",
                extra
            )));
        }
        self.pending.push(row.clone());
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn finalize(mut self: Box<Self>) -> Result<(), Error> {
        if self.labels.is_none() {
            // The last row has the widest schema.
            let labels = self.pending.last().map(|row| row.label_columns().to_vec());
            self.labels = Some(labels.unwrap_or_default());
        }
        // An empty batch still yields the header or the Parquet schema.
        if !self.pending.is_empty() || self.writer.is_none() {
            self.flush()?;
        }
        let mut out = match self.writer.take() {
            Some(TableWriter::Parquet(writer)) => writer.into_inner().map_err(Error::sink)?,
            Some(TableWriter::Csv(writer)) => writer.into_inner(),
            None => return Err(Error::sink("the table was already finished")),
        };
        out.flush().map_err(Error::sink)
    }
}

/// Discards all rows. Useful to measure or validate an export.
#[derive(Debug, Default)]
pub struct NullSink;

impl Sink for NullSink {
    fn write_row(&mut self, _row: &Row) -> Result<(), Error> {
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<(), Error> {
        Ok(())
    }
}

/// Open `path` for a sink, `-` meaning standard output.
pub fn output(path: &str) -> io::Result<Box<dyn Write + Send>> {
    if path == "-" {
        Ok(Box::new(io::stdout()))
    } else {
        Ok(Box::new(std::fs::File::create(path)?))
    }
}
