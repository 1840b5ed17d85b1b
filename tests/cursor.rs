mod common;

use std::time::Duration;

use common::series;
use common::Ending;
use common::FakeStore;
use obslytics::ErrorKind;
use obslytics::QueryContext;
use obslytics::Sample;
use obslytics::TimeRange;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::sync::oneshot;

fn store() -> FakeStore {
    FakeStore::new(vec![
        series(&[("__name__", "up"), ("job", "a")], &[(1000, 1.0), (2000, 2.0)]),
        series(&[("__name__", "up"), ("job", "b")], &[(1500, 3.0)]),
    ])
}

fn range() -> TimeRange {
    TimeRange::new(0, 10_000).unwrap()
}

/// Forward one connection to `upstream` until the returned sender fires,
/// then drop both sockets.
async fn relay(upstream: &str) -> (String, oneshot::Sender<()>) {
    let upstream = upstream.trim_start_matches("http://").to_owned();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (cut, cut_rx) = oneshot::channel();
    tokio::spawn(async move {
        let (mut downstream, _) = listener.accept().await.unwrap();
        let mut upstream = TcpStream::connect(upstream).await.unwrap();
        tokio::select! {
            _ = tokio::io::copy_bidirectional(&mut downstream, &mut upstream) => {}
            _ = cut_rx => {}
        }
    });
    (format!("http://127.0.0.1:{}", addr.port()), cut)
}

#[tokio::test]
async fn iterate() {
    let store = store();
    let client = obslytics::builder().build(&store.serve().await).unwrap();
    let ctx = QueryContext::new();
    let matchers = obslytics::parse_selector("up").unwrap();
    let mut cursor = client.open(&ctx, range(), &matchers).await.unwrap();

    let mut seen = Vec::new();
    while cursor.advance().await {
        let series = cursor.take_current().unwrap();
        let samples: Vec<Sample> = series.samples(range()).collect::<Result<_, _>>().unwrap();
        seen.push((series.labels().to_string(), samples.len()));
    }
    assert!(cursor.err().is_none());
    assert_eq!(cursor.received(), 2);
    assert_eq!(
        seen,
        [
            (r#"{__name__="up",job="a"}"#.to_owned(), 2),
            (r#"{__name__="up",job="b"}"#.to_owned(), 1),
        ],
    );
    assert!(!cursor.advance().await);
    cursor.close();
    cursor.close();
}

#[tokio::test]
async fn labels_only() {
    let store = store();
    let client = obslytics::builder().build(&store.serve().await).unwrap();
    let ctx = QueryContext::new();
    let matchers = obslytics::parse_selector(r#"{job="b"}"#).unwrap();
    let mut cursor = client.open_labels_only(&ctx, range(), &matchers).await.unwrap();
    assert!(cursor.advance().await);
    assert!(cursor.current().unwrap().chunks().is_empty());
    assert!(!cursor.advance().await);
    assert!(cursor.err().is_none());
    assert!(store.requests()[0].skip_chunks);
}

#[tokio::test]
async fn cancel_while_waiting() {
    let store = store().ending(Ending::Hang);
    let client = obslytics::builder().build(&store.serve().await).unwrap();
    let ctx = QueryContext::new();
    let matchers = obslytics::parse_selector("up").unwrap();
    let mut cursor = client.open(&ctx, range(), &matchers).await.unwrap();
    assert!(cursor.advance().await);
    assert!(cursor.advance().await);

    let token = ctx.token().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });
    let advanced = tokio::time::timeout(Duration::from_secs(10), cursor.advance())
        .await
        .expect("advance did not observe cancellation");
    assert!(!advanced);
    assert_eq!(cursor.take_err().unwrap().kind(), ErrorKind::Cancelled);
    assert!(!cursor.advance().await);
    cursor.close();
    cursor.close();
    assert!(!cursor.advance().await);
}

#[tokio::test]
async fn connection_lost_mid_stream() {
    let store = store().ending(Ending::Hang);
    let (endpoint, cut) = relay(&store.serve().await).await;
    let client = obslytics::builder().build(&endpoint).unwrap();
    let ctx = QueryContext::new();
    let matchers = obslytics::parse_selector("up").unwrap();
    let mut cursor = client.open(&ctx, range(), &matchers).await.unwrap();
    assert!(cursor.advance().await);
    assert!(cursor.advance().await);

    cut.send(()).unwrap();
    let advanced = tokio::time::timeout(Duration::from_secs(10), cursor.advance())
        .await
        .expect("advance did not observe the lost connection");
    assert!(!advanced);
    let err = cursor.take_err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Connection, "{}", err);
    assert!(!cursor.advance().await);
}

#[tokio::test]
async fn close_before_drained() {
    let store = store().ending(Ending::Hang);
    let client = obslytics::builder().build(&store.serve().await).unwrap();
    let ctx = QueryContext::new();
    let matchers = obslytics::parse_selector("up").unwrap();
    let mut cursor = client.open(&ctx, range(), &matchers).await.unwrap();
    assert!(cursor.advance().await);
    cursor.close();
    assert!(cursor.current().is_none());
    assert!(!cursor.advance().await);
    assert!(cursor.err().is_none());
}

#[tokio::test]
async fn warning() {
    let store = store().ending(Ending::Warning("partial".into()));
    let client = obslytics::builder().build(&store.serve().await).unwrap();
    let ctx = QueryContext::new();
    let matchers = obslytics::parse_selector("up").unwrap();
    let mut cursor = client.open(&ctx, range(), &matchers).await.unwrap();
    assert!(cursor.advance().await);
    assert!(cursor.advance().await);
    assert!(!cursor.advance().await);
    assert_eq!(cursor.err().unwrap().kind(), ErrorKind::RemoteAbort);
    assert_eq!(cursor.received(), 2);
}
