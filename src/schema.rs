use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::Serialize;
use serde::Serializer;

use super::labels::Labels;
use super::resample::Bucket;

/// The aggregate columns that follow the label columns of every row, in
/// order.
pub const AGGREGATE_COLUMNS: [&str; 6] = ["_bucket_start", "_count", "_sum", "_min", "_max", "_avg"];

/// The value of a label column for a series without that label.
pub const EMPTY: &str = "";

/// The column a label is exported under.
///
/// Labels named like an aggregate column get a `label` prefix, so `_count`
/// becomes `label_count`.
pub fn column_name(label: &str) -> Cow<'_, str> {
    if AGGREGATE_COLUMNS.contains(&label) {
        Cow::Owned(format!("label{}", label))
    } else {
        Cow::Borrowed(label)
    }
}

/// The label columns of an export, in the order they were first seen.
///
/// Columns are only ever appended. Rows keep the column list they were
/// created with, so growing the schema does not change earlier rows.
#[derive(Clone, Debug, Default)]
pub struct ColumnSchema {
    columns: Arc<Vec<String>>,
    index: HashMap<String, usize>,
}

impl ColumnSchema {
    /// A schema without label columns.
    pub fn new() -> ColumnSchema {
        ColumnSchema::default()
    }

    /// A schema seeded with the given label names, in order.
    pub fn from_labels<I, S>(names: I) -> ColumnSchema
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut schema = ColumnSchema::new();
        for name in names {
            schema.observe_name(name.as_ref());
        }
        schema
    }

    /// Append the columns for labels of `labels` not seen before. Returns
    /// whether the schema grew.
    pub fn observe(&mut self, labels: &Labels) -> bool {
        let mut grew = false;
        for name in labels.names() {
            grew |= self.observe_name(name);
        }
        grew
    }

    fn observe_name(&mut self, label: &str) -> bool {
        let column = column_name(label);
        if self.index.contains_key(column.as_ref()) {
            return false;
        }
        let column = column.into_owned();
        self.index.insert(column.clone(), self.columns.len());
        Arc::make_mut(&mut self.columns).push(column);
        true
    }

    fn position(&self, label: &str) -> Option<usize> {
        self.index.get(column_name(label).as_ref()).copied()
    }

    /// The label columns.
    pub fn labels(&self) -> &[String] {
        &self.columns
    }

    /// All columns: the label columns followed by [`AGGREGATE_COLUMNS`].
    pub fn columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .cloned()
            .chain(AGGREGATE_COLUMNS.iter().map(|&c| c.to_owned()))
            .collect()
    }
}

/// One output row: a value for every label column of the schema at the time
/// the row was made, and the aggregates of one bucket.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    columns: Arc<Vec<String>>,
    values: Vec<String>,
    bucket: Bucket,
}

impl Row {
    /// The label columns of this row.
    pub fn label_columns(&self) -> &[String] {
        &self.columns
    }

    /// The label values, parallel to [`Row::label_columns`]. Missing labels
    /// hold [`EMPTY`].
    pub fn label_values(&self) -> &[String] {
        &self.values
    }

    /// `(column, value)` pairs of the label columns.
    pub fn labels(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .iter()
            .zip(&self.values)
            .map(|(c, v)| (c.as_str(), v.as_str()))
    }

    /// The value of label column `column`, if the row has that column.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.values[i].as_str())
    }

    /// The aggregates.
    pub fn bucket(&self) -> &Bucket {
        &self.bucket
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let b = &self.bucket;
        let mut map = serializer.serialize_map(Some(self.columns.len() + AGGREGATE_COLUMNS.len()))?;
        for (column, value) in self.labels() {
            map.serialize_entry(column, value)?;
        }
        map.serialize_entry(AGGREGATE_COLUMNS[0], &b.start)?;
        map.serialize_entry(AGGREGATE_COLUMNS[1], &b.count)?;
        map.serialize_entry(AGGREGATE_COLUMNS[2], &b.sum)?;
        map.serialize_entry(AGGREGATE_COLUMNS[3], &b.min)?;
        map.serialize_entry(AGGREGATE_COLUMNS[4], &b.max)?;
        map.serialize_entry(AGGREGATE_COLUMNS[5], &b.avg())?;
        map.end()
    }
}

/// Shapes buckets of differently labelled series into rows over one growing
/// [`ColumnSchema`].
#[derive(Debug, Default)]
pub struct RowUnifier {
    schema: ColumnSchema,
}

impl RowUnifier {
    /// A unifier starting from an empty schema.
    pub fn new() -> RowUnifier {
        RowUnifier::default()
    }

    /// A unifier starting from a seeded schema, e.g. from a pre-scan.
    pub fn with_schema(schema: ColumnSchema) -> RowUnifier {
        RowUnifier { schema }
    }

    /// Make the row for one bucket of the series labelled `labels`, first
    /// adding any label not seen before to the schema.
    pub fn unify(&mut self, bucket: Bucket, labels: &Labels) -> Row {
        self.schema.observe(labels);
        let mut values = vec![EMPTY.to_owned(); self.schema.columns.len()];
        for (name, value) in labels {
            if let Some(i) = self.schema.position(name) {
                values[i].clone_from(value);
            }
        }
        Row {
            columns: self.schema.columns.clone(),
            values,
            bucket,
        }
    }

    /// The schema so far.
    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }
}
