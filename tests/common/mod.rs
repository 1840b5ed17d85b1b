#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use obslytics::chunk::encode_raw_chunk;
use obslytics::Error;
use obslytics::Matcher;
use obslytics::Row;
use obslytics::Sample;
use obslytics::Sink;
use store_api::storepb;
use store_api::storepb::series_response;
use store_api::storepb::store_server::Store;
use store_api::storepb::store_server::StoreServer;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tonic::transport::Identity;
use tonic::transport::Server;
use tonic::transport::ServerTlsConfig;
use tonic::Request;
use tonic::Response;
use tonic::Status;

/// What the fake store sends after the matching series.
#[derive(Clone)]
pub enum Ending {
    /// End the stream normally.
    Done,
    /// Never end the stream.
    Hang,
    /// Send a partial-response warning.
    Warning(String),
    /// Fail the stream.
    Fail(Status),
}

/// A Store API server holding a fixed set of series.
#[derive(Clone)]
pub struct FakeStore {
    series: Vec<storepb::Series>,
    ending: Ending,
    /// Fail the call itself instead of streaming.
    reject: Option<Status>,
    /// Send a hints response before the series.
    hints: bool,
    requests: Arc<Mutex<Vec<storepb::SeriesRequest>>>,
}

impl FakeStore {
    pub fn new(series: Vec<storepb::Series>) -> FakeStore {
        FakeStore {
            series,
            ending: Ending::Done,
            reject: None,
            hints: false,
            requests: Arc::default(),
        }
    }

    pub fn ending(mut self, ending: Ending) -> FakeStore {
        self.ending = ending;
        self
    }

    pub fn reject(mut self, status: Status) -> FakeStore {
        self.reject = Some(status);
        self
    }

    pub fn hints(mut self) -> FakeStore {
        self.hints = true;
        self
    }

    pub fn requests(&self) -> Vec<storepb::SeriesRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Serve on a fresh local port and return the endpoint.
    pub async fn serve(&self) -> String {
        let port = self.spawn(Server::builder()).await;
        format!("http://127.0.0.1:{}", port)
    }

    /// Serve over TLS with the self-signed certificate in `tests/data`.
    pub async fn serve_tls(&self) -> String {
        let data = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data");
        let identity = Identity::from_pem(
            fs::read(data.join("store.crt")).unwrap(),
            fs::read(data.join("store.key")).unwrap(),
        );
        let server = Server::builder()
            .tls_config(ServerTlsConfig::new().identity(identity))
            .unwrap();
        let port = self.spawn(server).await;
        format!("https://127.0.0.1:{}", port)
    }

    async fn spawn(&self, mut server: Server) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let incoming = TcpListenerStream::new(listener);
        let service = StoreServer::new(self.clone());
        tokio::spawn(async move {
            server
                .add_service(service)
                .serve_with_incoming(incoming)
                .await
                .unwrap();
        });
        addr.port()
    }
}

fn matches(series: &storepb::Series, matchers: &[Matcher]) -> bool {
    matchers.iter().all(|m| {
        let value = series
            .labels
            .iter()
            .find(|l| l.name == m.name())
            .map_or("", |l| l.value.as_str());
        m.matches(value)
    })
}

fn response(result: series_response::Result) -> Result<storepb::SeriesResponse, Status> {
    Ok(storepb::SeriesResponse {
        result: Some(result),
    })
}

#[tonic::async_trait]
impl Store for FakeStore {
    type SeriesStream =
        Pin<Box<dyn Stream<Item = Result<storepb::SeriesResponse, Status>> + Send + 'static>>;

    async fn series(
        &self,
        request: Request<storepb::SeriesRequest>,
    ) -> Result<Response<Self::SeriesStream>, Status> {
        let request = request.into_inner();
        self.requests.lock().unwrap().push(request.clone());
        if let Some(status) = &self.reject {
            return Err(status.clone());
        }
        let matchers = request
            .matchers
            .iter()
            .map(Matcher::from_pb)
            .collect::<Result<Vec<_>, Error>>()
            .map_err(|e| Status::invalid_argument(e.to_string()))?;

        let mut responses = Vec::new();
        if self.hints {
            responses.push(response(series_response::Result::Hints(Default::default())));
        }
        for series in &self.series {
            if !matches(series, &matchers) {
                continue;
            }
            let mut series = series.clone();
            if request.skip_chunks {
                series.chunks.clear();
            }
            responses.push(response(series_response::Result::Series(series)));
        }
        let head = tokio_stream::iter(responses);
        let stream: Self::SeriesStream = match &self.ending {
            Ending::Done => Box::pin(head),
            Ending::Hang => Box::pin(head.chain(tokio_stream::pending())),
            Ending::Warning(w) => Box::pin(head.chain(tokio_stream::once(response(
                series_response::Result::Warning(w.clone()),
            )))),
            Ending::Fail(status) => Box::pin(head.chain(tokio_stream::once(Err(status.clone())))),
        };
        Ok(Response::new(stream))
    }
}

/// A series with one raw chunk holding `samples`.
pub fn series(labels: &[(&str, &str)], samples: &[(i64, f64)]) -> storepb::Series {
    let samples: Vec<Sample> = samples.iter().map(|&(t, v)| Sample::new(t, v)).collect();
    series_with_chunks(labels, vec![encode_raw_chunk(&samples)])
}

pub fn series_with_chunks(
    labels: &[(&str, &str)],
    chunks: Vec<storepb::AggrChunk>,
) -> storepb::Series {
    storepb::Series {
        labels: labels
            .iter()
            .map(|&(name, value)| storepb::Label {
                name: name.into(),
                value: value.into(),
            })
            .collect(),
        chunks,
    }
}

/// A sink keeping rows in memory.
#[derive(Clone, Default)]
pub struct Recorder {
    pub rows: Arc<Mutex<Vec<Row>>>,
    pub finalized: Arc<AtomicUsize>,
    /// Fail writing the row with this index.
    pub fail_at: Option<usize>,
}

impl Recorder {
    pub fn rows(&self) -> Vec<Row> {
        self.rows.lock().unwrap().clone()
    }

    pub fn finalized(&self) -> usize {
        self.finalized.load(Ordering::SeqCst)
    }

    pub fn sink(&self) -> Box<dyn Sink> {
        Box::new(self.clone())
    }
}

impl Sink for Recorder {
    fn write_row(&mut self, row: &Row) -> Result<(), Error> {
        let mut rows = self.rows.lock().unwrap();
        if self.fail_at == Some(rows.len()) {
            return Err(Error::sink("sink is full"));
        }
        rows.push(row.clone());
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<(), Error> {
        self.finalized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// The label values and bucket of a row, for compact assertions.
pub fn flatten(row: &Row) -> (Vec<String>, i64, u64, f64) {
    let b = row.bucket();
    (row.label_values().to_vec(), b.start, b.count, b.sum)
}
