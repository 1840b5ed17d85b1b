use std::error::Error as _;
use std::future::Future;
use std::io;
use std::time::Duration;

use store_api::storepb;
use store_api::storepb::series_response;
use store_api::storepb::store_client::StoreClient as GrpcClient;
use store_api::tonic::transport;
use store_api::tonic::transport::Channel;
use store_api::tonic::transport::Endpoint;
use store_api::tonic::Code;
use store_api::tonic::Status;
use store_api::tonic::Streaming;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::instrument::WithSubscriber;
use tracing::trace;
use tracing::Dispatch;

use super::matcher::translate;
use super::matcher::Matcher;
use super::model::RawSeries;
use super::model::TimeRange;
use super::tls::InsecureConnector;
use super::Error;
use super::ErrorI;

/// Cancellation and deadline of one export.
///
/// Clones share the cancellation state.
#[derive(Clone, Debug, Default)]
pub struct QueryContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl QueryContext {
    /// A context without deadline that is only cancelled explicitly.
    pub fn new() -> QueryContext {
        QueryContext::default()
    }

    /// Use `token` for cancellation, e.g. a child of a process-wide token.
    pub fn with_token(mut self, token: CancellationToken) -> QueryContext {
        self.token = token;
        self
    }

    /// Expire `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> QueryContext {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Expire at `deadline`. An earlier deadline is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> QueryContext {
        self.deadline = Some(self.deadline.map_or(deadline, |d| d.min(deadline)));
        self
    }

    /// Cancel every operation using this context or a clone of it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fail if the context is cancelled or its deadline has passed.
    pub fn check(&self) -> Result<(), Error> {
        if self.token.is_cancelled() {
            return Err(Error(ErrorI::Cancelled));
        }
        if self.deadline.map_or(false, |d| d <= Instant::now()) {
            return Err(Error(ErrorI::DeadlineExceeded));
        }
        Ok(())
    }

    /// Wait until the context is cancelled or its deadline passes, and
    /// return the corresponding error.
    pub async fn done(&self) -> Error {
        let deadline = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Error(ErrorI::Cancelled),
            _ = deadline => Error(ErrorI::DeadlineExceeded),
        }
    }

    /// Run `fut` unless the context ends first.
    pub(crate) async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Error> {
        self.check()?;
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            out = fut => Ok(out),
        }
    }
}

/// A client for the `Series` call of a Thanos Store API endpoint.
///
/// Build one with [`builder`](crate::builder). Every [`StoreClient::open`]
/// dials its own connection, owned by the returned cursor.
#[derive(Clone)]
pub struct StoreClient {
    uri: String,
    endpoint: Endpoint,
    insecure: Option<InsecureConnector>,
    dispatch: Dispatch,
}

impl StoreClient {
    pub(crate) fn new(
        uri: String,
        endpoint: Endpoint,
        insecure: Option<InsecureConnector>,
        dispatch: Dispatch,
    ) -> StoreClient {
        StoreClient {
            uri,
            endpoint,
            insecure,
            dispatch,
        }
    }

    /// The store's URI.
    pub fn uri(&self) -> String {
        self.uri.clone()
    }

    pub(crate) fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Request all series matching every one of `matchers` with their raw
    /// chunks in `range`.
    ///
    /// Partial responses are never accepted: the store is asked to abort
    /// instead, and a warning in the response ends the stream with an
    /// [`ErrorKind::RemoteAbort`](crate::ErrorKind) error.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Connection`](crate::ErrorKind) if the store
    /// cannot be reached, [`ErrorKind::QueryTranslation`](crate::ErrorKind)
    /// without matchers, [`ErrorKind::RemoteAbort`](crate::ErrorKind) if the
    /// store rejects the request, or when `ctx` ends first.
    pub async fn open(
        &self,
        ctx: &QueryContext,
        range: TimeRange,
        matchers: &[Matcher],
    ) -> Result<SeriesCursor, Error> {
        let request = series_request(range, matchers, false)?;
        self.open_request(ctx, request)
            .with_subscriber(self.dispatch.clone())
            .await
    }

    /// Like [`StoreClient::open`], but the store sends only labels, no
    /// chunks.
    pub async fn open_labels_only(
        &self,
        ctx: &QueryContext,
        range: TimeRange,
        matchers: &[Matcher],
    ) -> Result<SeriesCursor, Error> {
        let request = series_request(range, matchers, true)?;
        self.open_request(ctx, request)
            .with_subscriber(self.dispatch.clone())
            .await
    }

    async fn open_request(
        &self,
        ctx: &QueryContext,
        request: storepb::SeriesRequest,
    ) -> Result<SeriesCursor, Error> {
        let uri = self.uri();
        debug!(endpoint = %uri, "connecting to store");
        let connect = async {
            match &self.insecure {
                Some(connector) => self.endpoint.connect_with_connector(connector.clone()).await,
                None => self.endpoint.connect().await,
            }
        };
        let channel = ctx
            .run(connect)
            .await?
            .map_err(|cause| Error(ErrorI::Dial { endpoint: uri, cause }))?;
        // Series responses can be huge, accept anything gRPC can frame.
        let mut client = GrpcClient::new(channel.clone()).max_decoding_message_size(i32::MAX as usize);
        debug!(
            min_time = request.min_time,
            max_time = request.max_time,
            matchers = request.matchers.len(),
            skip_chunks = request.skip_chunks,
            "requesting series"
        );
        let response = ctx.run(client.series(request)).await?.map_err(status_error)?;
        Ok(SeriesCursor {
            ctx: ctx.clone(),
            dispatch: self.dispatch.clone(),
            stream: Some(response.into_inner()),
            channel: Some(channel),
            current: None,
            err: None,
            received: 0,
        })
    }
}

fn series_request(
    range: TimeRange,
    matchers: &[Matcher],
    skip_chunks: bool,
) -> Result<storepb::SeriesRequest, Error> {
    if matchers.is_empty() {
        return Err(Error(ErrorI::NoMatchers));
    }
    Ok(storepb::SeriesRequest {
        min_time: range.min(),
        max_time: range.max(),
        matchers: translate(matchers),
        max_resolution_window: 0,
        aggregates: vec![storepb::Aggr::Count as i32, storepb::Aggr::Sum as i32],
        partial_response_disabled: false,
        partial_response_strategy: storepb::PartialResponseStrategy::Abort as i32,
        skip_chunks,
        hints: None,
    })
}

fn status_error(status: Status) -> Error {
    if status.code() == Code::Unavailable || broken_connection(&status) {
        Error(ErrorI::Transport(status))
    } else {
        Error(ErrorI::RemoteStatus(status))
    }
}

/// Whether tonic synthesized `status` from a failure of the connection
/// underneath the stream, rather than receiving it from the store.
///
/// A status sent by the store has no source.
fn broken_connection(status: &Status) -> bool {
    let mut source = status.source();
    while let Some(err) = source {
        if err.is::<io::Error>() || err.is::<transport::Error>() {
            return true;
        }
        if let Some(e) = err.downcast_ref::<hyper::Error>() {
            if e.is_closed() || e.is_incomplete_message() || e.is_timeout() {
                return true;
            }
        }
        if let Some(e) = err.downcast_ref::<h2::Error>() {
            // A reset stream is the store's doing.
            return e.is_io() || e.is_go_away();
        }
        source = err.source();
    }
    false
}

/// A pull-based cursor over the series of one `Series` call.
///
/// ```rust,no_run
/// # async fn f(client: obslytics::StoreClient, query: obslytics::Query)
/// #     -> Result<(), obslytics::Error> {
/// let ctx = obslytics::QueryContext::new();
/// let mut cursor = client.open(&ctx, query.range, &query.matchers).await?;
/// while cursor.advance().await {
///     let series = cursor.current().unwrap();
///     println!("{} has {} chunks", series.labels(), series.chunks().len());
/// }
/// let result = cursor.take_err();
/// cursor.close();
/// result.map_or(Ok(()), Err)
/// # }
/// ```
///
/// Dropping the cursor closes it.
pub struct SeriesCursor {
    ctx: QueryContext,
    dispatch: Dispatch,
    stream: Option<Streaming<storepb::SeriesResponse>>,
    channel: Option<Channel>,
    current: Option<RawSeries>,
    err: Option<Error>,
    received: u64,
}

impl SeriesCursor {
    /// Wait for the next series.
    ///
    /// Returns `false` at the end of the stream and on error; check
    /// [`SeriesCursor::err`] to tell them apart. Once `false` was returned,
    /// it is returned forever. Cancellation or expiry of the query context
    /// ends the wait immediately with an error.
    pub async fn advance(&mut self) -> bool {
        let dispatch = self.dispatch.clone();
        self.advance_inner().with_subscriber(dispatch).await
    }

    async fn advance_inner(&mut self) -> bool {
        self.current = None;
        let stream = match (&mut self.stream, &self.err) {
            (Some(stream), None) => stream,
            _ => return false,
        };
        let result = loop {
            let message = {
                let ctx = &self.ctx;
                tokio::select! {
                    biased;
                    err = ctx.done() => Err(err),
                    message = stream.message() => message.map_err(status_error),
                }
            };
            let response = match message {
                Ok(Some(response)) => response,
                Ok(None) => break Ok(None),
                Err(e) => break Err(e),
            };
            match response.result {
                Some(series_response::Result::Series(series)) => {
                    break RawSeries::from_pb(series).map(Some);
                }
                Some(series_response::Result::Warning(warning)) => {
                    break Err(Error(ErrorI::PartialResponse(warning)));
                }
                Some(series_response::Result::Hints(_)) | None => {
                    trace!("ignoring series response without series");
                }
            }
        };
        match result {
            Ok(Some(series)) => {
                self.received += 1;
                trace!(series = %series.labels(), chunks = series.chunks().len(), "received series");
                self.current = Some(series);
                true
            }
            Ok(None) => {
                debug!(series = self.received, "end of series stream");
                self.release();
                false
            }
            Err(e) => {
                debug!(series = self.received, "series stream failed");
                self.err = Some(e);
                self.release();
                false
            }
        }
    }

    /// The series received by the last successful [`SeriesCursor::advance`].
    pub fn current(&self) -> Option<&RawSeries> {
        self.current.as_ref()
    }

    /// Take ownership of the current series.
    pub fn take_current(&mut self) -> Option<RawSeries> {
        self.current.take()
    }

    /// The error that ended the stream, if any.
    pub fn err(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    /// Take the error that ended the stream, if any.
    pub fn take_err(&mut self) -> Option<Error> {
        self.err.take()
    }

    /// The number of series received so far.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Release the stream and the connection.
    ///
    /// Safe to call any number of times, also after an error or before the
    /// stream was drained. Later calls to [`SeriesCursor::advance`] return
    /// `false`.
    pub fn close(&mut self) {
        self.current = None;
        let dispatch = self.dispatch.clone();
        tracing::dispatcher::with_default(&dispatch, || self.release());
    }

    fn release(&mut self) {
        // The request side was closed after its only message. Dropping the
        // response stream resets the HTTP/2 stream if the store is still
        // sending; dropping the last channel handle closes the connection.
        if self.stream.take().is_some() {
            debug!("closing series stream");
        }
        self.channel.take();
    }
}

impl Drop for SeriesCursor {
    fn drop(&mut self) {
        self.close();
    }
}
