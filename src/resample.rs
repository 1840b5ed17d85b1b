//! Streaming aggregation of samples into fixed-width time buckets.
//!
//! Buckets are aligned to the start of the query range:
//!
//! ```text
//! start(t) = min + floor((t - min) / resolution) * resolution
//! ```
//!
//! Only the bucket currently being filled is kept in memory. Buckets without
//! samples are not emitted.

use std::fmt;
use std::iter::FusedIterator;
use std::time::Duration;

use super::model::Sample;
use super::model::TimeRange;
use super::Error;
use super::ErrorI;

/// A bucket width, a positive whole number of milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Resolution(i64);

impl Resolution {
    /// Convert a duration into a resolution.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::QueryTranslation`](crate::ErrorKind) if the
    /// duration is zero, not a whole number of milliseconds, or too long.
    pub fn new(d: Duration) -> Result<Resolution, Error> {
        if d.is_zero() {
            return Err(Error(ErrorI::InvalidResolution("must be positive".into())));
        }
        if d.subsec_nanos() % 1_000_000 != 0 {
            return Err(Error(ErrorI::InvalidResolution(format!(
                "{:?} is not a whole number of milliseconds",
                d
            ))));
        }
        match i64::try_from(d.as_millis()) {
            Ok(ms) => Ok(Resolution(ms)),
            Err(_) => Err(Error(ErrorI::InvalidResolution(format!("{:?} is too long", d)))),
        }
    }

    /// A resolution of `ms` milliseconds.
    pub fn from_millis(ms: i64) -> Result<Resolution, Error> {
        if ms <= 0 {
            return Err(Error(ErrorI::InvalidResolution("must be positive".into())));
        }
        Ok(Resolution(ms))
    }

    /// The width in milliseconds.
    pub fn as_millis(&self) -> i64 {
        self.0
    }

    /// The start of the bucket containing `t`, for buckets aligned at `origin`.
    pub fn bucket_start(&self, origin: i64, t: i64) -> i64 {
        let offset = (t as i128 - origin as i128).div_euclid(self.0 as i128) * self.0 as i128;
        (origin as i128 + offset) as i64
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", humantime::format_duration(Duration::from_millis(self.0 as u64)))
    }
}

/// The summary of the samples of one series inside one bucket.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bucket {
    /// The bucket's first millisecond.
    pub start: i64,
    /// The number of samples, NaNs included. Never zero.
    pub count: u64,
    /// The sum of the values; NaN if any value is NaN.
    pub sum: f64,
    /// The smallest non-NaN value, or NaN if all values are NaN.
    pub min: f64,
    /// The largest non-NaN value, or NaN if all values are NaN.
    pub max: f64,
}

impl Bucket {
    fn empty(start: i64) -> Bucket {
        Bucket {
            start,
            count: 0,
            sum: 0.0,
            min: f64::NAN,
            max: f64::NAN,
        }
    }

    fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        // `f64::min` and `f64::max` ignore a NaN operand.
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// `sum / count`.
    pub fn avg(&self) -> f64 {
        self.sum / self.count as f64
    }
}

/// Aggregate `samples` into buckets of `resolution` aligned at `range.min()`.
///
/// Samples are expected in non-decreasing timestamp order; those outside
/// `range` are ignored. Order is not checked: a sample that falls outside the
/// current bucket closes it, so unordered input yields buckets whose starts
/// repeat or go backwards. The first error of the input ends the output after
/// being passed through.
pub fn resample<I, E>(samples: I, resolution: Resolution, range: TimeRange) -> Resampler<I::IntoIter>
where
    I: IntoIterator<Item = Result<Sample, E>>,
{
    Resampler {
        samples: samples.into_iter(),
        resolution,
        range,
        current: None,
        done: false,
    }
}

/// The iterator returned by [`resample`].
pub struct Resampler<I> {
    samples: I,
    resolution: Resolution,
    range: TimeRange,
    current: Option<Bucket>,
    done: bool,
}

impl<I, E> Iterator for Resampler<I>
where
    I: Iterator<Item = Result<Sample, E>>,
{
    type Item = Result<Bucket, E>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let sample = match self.samples.next() {
                Some(Ok(sample)) => sample,
                Some(Err(e)) => {
                    self.done = true;
                    self.current = None;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    return self.current.take().map(Ok);
                }
            };
            if !self.range.contains(sample.timestamp) {
                continue;
            }
            let start = self.resolution.bucket_start(self.range.min(), sample.timestamp);
            match &mut self.current {
                Some(bucket) if bucket.start == start => bucket.add(sample.value),
                current => {
                    let mut next = Bucket::empty(start);
                    next.add(sample.value);
                    if let Some(finished) = current.replace(next) {
                        return Some(Ok(finished));
                    }
                }
            }
        }
    }
}

impl<I, E> FusedIterator for Resampler<I> where I: Iterator<Item = Result<Sample, E>> {}

#[cfg(test)]
mod test {
    use super::resample;
    use super::Bucket;
    use super::Resolution;
    use crate::model::Sample;
    use crate::model::TimeRange;
    use crate::ErrorKind;
    use std::convert::Infallible;
    use std::time::Duration;

    fn buckets(samples: &[(i64, f64)], resolution: i64, range: (i64, i64)) -> Vec<Bucket> {
        let samples = samples
            .iter()
            .map(|&(t, v)| Ok::<_, Infallible>(Sample::new(t, v)));
        resample(
            samples,
            Resolution::from_millis(resolution).unwrap(),
            TimeRange::new(range.0, range.1).unwrap(),
        )
        .map(|b| b.unwrap())
        .collect()
    }

    fn bucket(start: i64, count: u64, sum: f64, min: f64, max: f64) -> Bucket {
        Bucket {
            start,
            count,
            sum,
            min,
            max,
        }
    }

    #[test]
    fn sparse_buckets() {
        let got = buckets(
            &[(1000, 1.0), (1200, 2.0), (2100, 5.0), (4900, 10.0)],
            1000,
            (1000, 5000),
        );
        assert_eq!(
            got,
            [
                bucket(1000, 2, 3.0, 1.0, 2.0),
                bucket(2000, 1, 5.0, 5.0, 5.0),
                bucket(4000, 1, 10.0, 10.0, 10.0),
            ],
        );
        let avgs: Vec<f64> = got.iter().map(Bucket::avg).collect();
        assert_eq!(avgs, [1.5, 5.0, 10.0]);
    }

    #[test]
    fn aligned_to_range_start() {
        let got = buckets(&[(1234, 1.0), (1500, 1.0), (1733, 1.0), (1734, 1.0)], 500, (1234, 2000));
        let starts: Vec<i64> = got.iter().map(|b| b.start).collect();
        assert_eq!(starts, [1234, 1734]);
        assert_eq!(got[0].count, 3);
        assert_eq!(got[1].count, 1);
    }

    #[test]
    fn outside_range_is_ignored() {
        let got = buckets(&[(0, 100.0), (10, 1.0), (20, 2.0), (31, 100.0)], 5, (10, 30));
        assert_eq!(got, [bucket(10, 1, 1.0, 1.0, 1.0), bucket(20, 1, 2.0, 2.0, 2.0)]);
    }

    #[test]
    fn unordered_input() {
        let got = buckets(&[(2000, 1.0), (1000, 2.0), (1500, 3.0), (2500, 4.0)], 1000, (0, 5000));
        assert_eq!(
            got,
            [
                bucket(2000, 1, 1.0, 1.0, 1.0),
                bucket(1000, 2, 5.0, 2.0, 3.0),
                bucket(2000, 1, 4.0, 4.0, 4.0),
            ],
        );
    }

    #[test]
    fn negative_timestamps() {
        let got = buckets(&[(-25, 1.0), (-21, 2.0), (-20, 3.0), (-1, 4.0)], 10, (-30, 0));
        let starts: Vec<i64> = got.iter().map(|b| b.start).collect();
        assert_eq!(starts, [-30, -20, -10]);
    }

    #[test]
    fn extreme_range() {
        let got = buckets(
            &[(i64::MIN, 1.0), (i64::MAX, 2.0)],
            i64::MAX,
            (i64::MIN, i64::MAX),
        );
        let starts: Vec<i64> = got.iter().map(|b| b.start).collect();
        assert_eq!(starts, [i64::MIN, i64::MAX - 1]);
    }

    #[test]
    fn nan_handling() {
        let got = buckets(&[(0, 1.0), (1, f64::NAN), (2, 3.0)], 10, (0, 100));
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].count, 3);
        assert!(got[0].sum.is_nan());
        assert!(got[0].avg().is_nan());
        assert_eq!(got[0].min, 1.0);
        assert_eq!(got[0].max, 3.0);

        let got = buckets(&[(0, f64::NAN), (1, f64::NAN)], 10, (0, 100));
        assert_eq!(got[0].count, 2);
        assert!(got[0].min.is_nan());
        assert!(got[0].max.is_nan());
    }

    #[test]
    fn infinities() {
        let got = buckets(&[(0, f64::INFINITY), (1, -1.0)], 10, (0, 100));
        assert_eq!(got[0].sum, f64::INFINITY);
        assert_eq!(got[0].min, -1.0);
        assert_eq!(got[0].max, f64::INFINITY);
    }

    #[test]
    fn repeatable() {
        let samples: Vec<(i64, f64)> = (0..1000).map(|i| (i * 7, (i % 13) as f64)).collect();
        let first = buckets(&samples, 60, (0, 7000));
        let second = buckets(&samples, 60, (0, 7000));
        assert_eq!(first, second);
        assert_eq!(first.iter().map(|b| b.count).sum::<u64>(), 1000);
        assert!(first.windows(2).all(|w| w[0].start < w[1].start));
        assert!(first.iter().all(|b| b.start % 60 == 0));
    }

    #[test]
    fn error_ends_output() {
        let samples = vec![
            Ok(Sample::new(0, 1.0)),
            Ok(Sample::new(20, 1.0)),
            Err("corrupt"),
            Ok(Sample::new(40, 1.0)),
        ];
        let range = TimeRange::new(0, 100).unwrap();
        let got: Vec<_> = resample(samples, Resolution::from_millis(10).unwrap(), range).collect();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].as_ref().map(|b| b.start), Ok(0));
        assert_eq!(got[1], Err("corrupt"));
    }

    #[test]
    fn empty_input() {
        assert!(buckets(&[], 10, (0, 100)).is_empty());
    }

    #[test]
    fn resolution() {
        assert_eq!(Resolution::new(Duration::from_secs(60)).unwrap().as_millis(), 60_000);
        assert_eq!(Resolution::new(Duration::from_millis(1)).unwrap().as_millis(), 1);
        for d in [Duration::ZERO, Duration::from_micros(1500)] {
            let err = Resolution::new(d).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::QueryTranslation);
        }
        assert!(Resolution::from_millis(0).is_err());
        assert_eq!(Resolution::from_millis(90_000).unwrap().to_string(), "1m 30s");
    }
}
