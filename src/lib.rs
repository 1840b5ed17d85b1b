//! Export raw series from a [Thanos](https://thanos.io) Store API into
//! tabular analytics output.
//!
//! The pipeline is pull-driven: a [`SeriesCursor`] receives one raw series at
//! a time, its XOR chunks are decoded lazily ([`chunk`]), folded into
//! fixed-width time buckets ([`resample`](mod@resample)), reshaped against the growing
//! column schema ([`RowUnifier`]) and handed to a [`Sink`]. Nothing upstream
//! runs ahead of what the sink has consumed.
//!
//! Usage
//! =====
//!
//! ```rust,no_run
//! use obslytics::sink::JsonLinesSink;
//! use obslytics::{Query, QueryContext, SchemaMode, TimeRange};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), obslytics::Error> {
//!     let client = obslytics::builder()
//!         .connect_timeout(Duration::from_secs(5))
//!         .build("http://127.0.0.1:10901")?;
//!
//!     let query = Query::new(
//!         TimeRange::new(1_600_000_000_000, 1_600_003_600_000)?,
//!         obslytics::parse_selector(r#"up{job="node"}"#)?,
//!         Duration::from_secs(60),
//!     )?;
//!
//!     let ctx = QueryContext::new().with_timeout(Duration::from_secs(300));
//!     let sink = Box::new(JsonLinesSink::new(std::io::stdout()));
//!     let summary = obslytics::export(&client, &ctx, &query, sink, SchemaMode::Streaming).await?;
//!     eprintln!("wrote {} rows from {} series", summary.rows, summary.series);
//!     Ok(())
//! }
//! ```

#![allow(clippy::type_complexity)]
#![deny(missing_docs)]

/// The re-exported `url` dependency of this crate.
///
/// Use this to avoid depending on a potentially-incompatible `url` version yourself.
pub extern crate url;

use std::error;
use std::fmt;
use std::io;
use std::path::PathBuf;

use store_api::tonic;

use ErrorInner as ErrorI;

pub use builder::builder;
pub use builder::Builder;
pub use chunk::DecodeError;
pub use client::QueryContext;
pub use client::SeriesCursor;
pub use client::StoreClient;
pub use config::InputConfig;
pub use export::export;
pub use export::prescan;
pub use export::ExportSummary;
pub use export::SchemaMode;
pub use labels::Labels;
pub use matcher::parse_selector;
pub use matcher::MatchOp;
pub use matcher::Matcher;
pub use model::Query;
pub use model::RawSeries;
pub use model::Sample;
pub use model::TimeRange;
pub use resample::resample;
pub use resample::Bucket;
pub use resample::Resolution;
pub use schema::column_name;
pub use schema::ColumnSchema;
pub use schema::Row;
pub use schema::RowUnifier;
pub use schema::AGGREGATE_COLUMNS;
pub use sink::Sink;
pub use tls::TlsConfig;

mod bstream;
mod builder;
pub mod chunk;
mod client;
mod config;
mod export;
mod labels;
mod matcher;
mod model;
pub mod resample;
mod schema;
pub mod sink;
mod tls;

/// The category of an [`Error`].
///
/// Callers decide on retries and exit codes from the kind alone; only
/// [`ErrorKind::Connection`] is worth retrying, and only by restarting the
/// whole export.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Dialing the store or the transport underneath the stream failed.
    Connection,
    /// A matcher, time range or resolution could not be turned into a request.
    QueryTranslation,
    /// The store aborted the stream or returned a partial response.
    RemoteAbort,
    /// A chunk was corrupt or the samples of a series were out of order.
    Decode,
    /// The output sink failed to write or finalize.
    Sink,
    /// The query context was cancelled.
    Cancelled,
    /// The query context's deadline expired.
    DeadlineExceeded,
    /// The input configuration or TLS material is unusable.
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::ErrorKind::*;
        f.write_str(match self {
            Connection => "connection error",
            QueryTranslation => "query translation error",
            RemoteAbort => "remote abort",
            Decode => "decode error",
            Sink => "sink error",
            Cancelled => "cancelled",
            DeadlineExceeded => "deadline exceeded",
            Config => "configuration error",
        })
    }
}

/// The error type of every fallible operation in this crate.
///
/// Apart from [`Error::kind`], [`Error::sink`] and the [`std::error::Error`]
/// (and [`std::fmt::Debug`] and [`std::fmt::Display`]) implementation, nothing
/// of this type is exposed. The original cause is available through
/// [`std::error::Error::source`].
pub struct Error(ErrorInner);

impl Error {
    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        use self::ErrorInner::*;
        match &self.0 {
            Dial { .. } | Transport(_) => ErrorKind::Connection,
            InvalidLabelName(_)
            | InvalidRegex { .. }
            | InvalidSelector { .. }
            | UnknownMatcherType(_)
            | NoMatchers
            | InvalidTimeRange { .. }
            | InvalidResolution(_) => ErrorKind::QueryTranslation,
            RemoteStatus(_) | PartialResponse(_) => ErrorKind::RemoteAbort,
            Decode { .. } | DuplicateLabel { .. } => ErrorKind::Decode,
            Sink(_) => ErrorKind::Sink,
            Cancelled => ErrorKind::Cancelled,
            DeadlineExceeded => ErrorKind::DeadlineExceeded,
            InvalidEndpoint(_)
            | ReadFile { .. }
            | ParseConfig { .. }
            | UnsupportedInput(_)
            | Tls(_)
            | TlsSetup(_)
            | TlsKeyWithoutCert => ErrorKind::Config,
        }
    }

    /// Wrap a failure of a [`Sink`] implementation.
    ///
    /// The cause is kept as is and displayed verbatim.
    pub fn sink<E>(cause: E) -> Error
    where
        E: Into<Box<dyn error::Error + Send + Sync>>,
    {
        Error(ErrorI::Sink(cause.into()))
    }

    fn decode(series: &Labels, cause: DecodeError) -> Error {
        Error(ErrorI::Decode {
            series: series.to_string(),
            cause,
        })
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        use self::ErrorInner::*;
        match &self.0 {
            Dial { cause, .. } => Some(cause),
            Transport(status) | RemoteStatus(status) => Some(status),
            InvalidRegex { cause, .. } => Some(cause),
            Decode { cause, .. } => Some(cause),
            Sink(cause) => Some(cause.as_ref()),
            ReadFile { cause, .. } => Some(cause),
            ParseConfig { cause, .. } => Some(cause),
            Tls(cause) => Some(cause),
            TlsSetup(cause) => Some(cause),
            _ => None,
        }
    }
}

#[derive(Debug)]
enum ErrorInner {
    Dial {
        endpoint: String,
        cause: tonic::transport::Error,
    },
    Transport(tonic::Status),
    InvalidLabelName(String),
    InvalidRegex {
        name: String,
        cause: regex::Error,
    },
    InvalidSelector {
        selector: String,
        reason: String,
    },
    UnknownMatcherType(i32),
    NoMatchers,
    InvalidTimeRange {
        min: i64,
        max: i64,
    },
    InvalidResolution(String),
    RemoteStatus(tonic::Status),
    PartialResponse(String),
    Decode {
        series: String,
        cause: DecodeError,
    },
    DuplicateLabel {
        series: String,
        name: String,
    },
    Sink(Box<dyn error::Error + Send + Sync>),
    Cancelled,
    DeadlineExceeded,
    InvalidEndpoint(String),
    ReadFile {
        path: PathBuf,
        cause: io::Error,
    },
    ParseConfig {
        path: PathBuf,
        cause: serde_yaml::Error,
    },
    UnsupportedInput(String),
    Tls(tonic::transport::Error),
    TlsSetup(rustls::Error),
    TlsKeyWithoutCert,
}

impl fmt::Display for ErrorInner {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::ErrorInner::*;
        match self {
            Dial { endpoint, cause } => write!(f, "dialing store {}: {}", endpoint, cause),
            Transport(status) => write!(f, "connection to store failed: {}", status.message()),
            InvalidLabelName(name) => write!(f, "invalid label name {:?}", name),
            InvalidRegex { name, cause } => {
                write!(f, "invalid regular expression for label {:?}: {}", name, cause)
            }
            InvalidSelector { selector, reason } => {
                write!(f, "invalid selector {:?}: {}", selector, reason)
            }
            UnknownMatcherType(t) => write!(f, "unknown label matcher type {}", t),
            NoMatchers => write!(f, "at least one label matcher is required"),
            InvalidTimeRange { min, max } => {
                write!(f, "invalid time range: min {} is after max {}", min, max)
            }
            InvalidResolution(reason) => write!(f, "invalid resolution: {}", reason),
            RemoteStatus(status) => write!(
                f,
                "store aborted the series stream ({:?}): {}",
                status.code(),
                status.message()
            ),
            PartialResponse(warning) => {
                write!(f, "store returned a partial response: {}", warning)
            }
            Decode { series, cause } => write!(f, "decoding series {}: {}", series, cause),
            DuplicateLabel { series, name } => {
                write!(f, "duplicate label {:?} in series {}", name, series)
            }
            Sink(cause) => write!(f, "{}", cause),
            Cancelled => write!(f, "export cancelled"),
            DeadlineExceeded => write!(f, "export deadline exceeded"),
            InvalidEndpoint(reason) => write!(f, "invalid store endpoint: {}", reason),
            ReadFile { path, cause } => write!(f, "reading {}: {}", path.display(), cause),
            ParseConfig { path, cause } => write!(f, "parsing {}: {}", path.display(), cause),
            UnsupportedInput(kind) => write!(f, "unsupported input type {:?}", kind),
            Tls(cause) => write!(f, "configuring client TLS: {}", cause),
            TlsSetup(cause) => write!(f, "configuring client TLS: {}", cause),
            TlsKeyWithoutCert => write!(f, "both client key and certificate must be provided"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::Error;
    use super::ErrorI;
    use super::ErrorKind;
    use std::error::Error as _;
    use std::io;

    #[test]
    fn kinds() {
        assert_eq!(Error(ErrorI::NoMatchers).kind(), ErrorKind::QueryTranslation);
        assert_eq!(
            Error(ErrorI::PartialResponse("store down".into())).kind(),
            ErrorKind::RemoteAbort,
        );
        assert_eq!(Error(ErrorI::Cancelled).kind(), ErrorKind::Cancelled);
        assert_eq!(Error(ErrorI::TlsKeyWithoutCert).kind(), ErrorKind::Config);
    }

    #[test]
    fn sink_error_is_verbatim() {
        let err = Error::sink(io::Error::new(io::ErrorKind::Other, "disk full"));
        assert_eq!(err.kind(), ErrorKind::Sink);
        assert_eq!(err.to_string(), "disk full");
        assert!(err.source().is_some());
    }
}
