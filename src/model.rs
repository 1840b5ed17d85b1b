use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use store_api::storepb;

use super::chunk::SeriesSamples;
use super::labels::Labels;
use super::matcher::Matcher;
use super::resample::Resolution;
use super::Error;
use super::ErrorI;

/// An inclusive range of millisecond timestamps, `min <= max`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimeRange {
    min: i64,
    max: i64,
}

impl TimeRange {
    /// Create the range `[min, max]`, both in milliseconds since the epoch.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::QueryTranslation`](crate::ErrorKind) if
    /// `min > max`.
    pub fn new(min: i64, max: i64) -> Result<TimeRange, Error> {
        if min > max {
            return Err(Error(ErrorI::InvalidTimeRange { min, max }));
        }
        Ok(TimeRange { min, max })
    }

    /// Create a range from two instants, truncated to milliseconds.
    pub fn from_system_times(min: SystemTime, max: SystemTime) -> Result<TimeRange, Error> {
        TimeRange::new(millis(min), millis(max))
    }

    /// The first included timestamp.
    pub fn min(&self) -> i64 {
        self.min
    }

    /// The last included timestamp.
    pub fn max(&self) -> i64 {
        self.max
    }

    /// Whether `t` lies in the range.
    pub fn contains(&self, t: i64) -> bool {
        self.min <= t && t <= self.max
    }

    /// Whether `[min, max]` intersects the range.
    pub fn overlaps(&self, min: i64, max: i64) -> bool {
        min <= self.max && self.min <= max
    }
}

fn millis(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
        Err(e) => i64::try_from(e.duration().as_millis())
            .map(|ms| -ms)
            .unwrap_or(i64::MIN),
    }
}

/// One decoded sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    /// Milliseconds since the epoch.
    pub timestamp: i64,
    /// The sample value.
    pub value: f64,
}

impl Sample {
    /// Create a sample.
    pub fn new(timestamp: i64, value: f64) -> Sample {
        Sample { timestamp, value }
    }
}

/// One series as received from the store: its labels and its still-encoded
/// chunks.
#[derive(Clone, Debug)]
pub struct RawSeries {
    labels: Labels,
    chunks: Vec<storepb::AggrChunk>,
}

impl RawSeries {
    /// Create a series from labels and chunks in store order.
    pub fn new(labels: Labels, chunks: Vec<storepb::AggrChunk>) -> RawSeries {
        RawSeries { labels, chunks }
    }

    pub(crate) fn from_pb(series: storepb::Series) -> Result<RawSeries, Error> {
        Ok(RawSeries {
            labels: Labels::from_pb(series.labels)?,
            chunks: series.chunks,
        })
    }

    /// The series' labels.
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// The encoded chunks, ordered by time.
    pub fn chunks(&self) -> &[storepb::AggrChunk] {
        &self.chunks
    }

    /// Lazily decode all chunks, keeping only samples inside `range`.
    ///
    /// The iterator stops after the first error.
    pub fn samples(&self, range: TimeRange) -> SeriesSamples<'_> {
        SeriesSamples::new(&self.chunks, range)
    }
}

/// The parameters of one export: which series, over which time range, at
/// which resolution.
#[derive(Clone, Debug)]
pub struct Query {
    /// The inclusive time range.
    pub range: TimeRange,
    /// All matchers must hold for a series to be exported.
    pub matchers: Vec<Matcher>,
    /// The bucket width.
    pub resolution: Resolution,
}

impl Query {
    /// Create a query.
    ///
    /// # Errors
    ///
    /// Fails if `matchers` is empty or `resolution` is not a positive whole
    /// number of milliseconds.
    pub fn new(
        range: TimeRange,
        matchers: Vec<Matcher>,
        resolution: Duration,
    ) -> Result<Query, Error> {
        if matchers.is_empty() {
            return Err(Error(ErrorI::NoMatchers));
        }
        Ok(Query {
            range,
            matchers,
            resolution: Resolution::new(resolution)?,
        })
    }
}
