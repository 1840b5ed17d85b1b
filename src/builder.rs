use std::time::Duration;

use store_api::tonic::transport::Endpoint;
use tracing::debug;
use tracing::warn;
use tracing::Dispatch;
use tracing_core::subscriber::NoSubscriber;
use url::Host;
use url::Url;

use super::client::StoreClient;
use super::tls::TlsConfig;
use super::Error;
use super::ErrorI;

/// Create a [`Builder`] for constructing a [`StoreClient`].
///
/// See the crate's root documentation for an example.
pub fn builder() -> Builder {
    Builder {
        tls: None,
        dispatch: Dispatch::new(NoSubscriber::default()),
        connect_timeout: None,
    }
}

/// Builder for constructing a [`StoreClient`].
///
/// See the crate's root documentation for an example.
#[derive(Clone)]
pub struct Builder {
    tls: Option<TlsConfig>,
    dispatch: Dispatch,
    connect_timeout: Option<Duration>,
}

impl Builder {
    /// Connect with TLS.
    ///
    /// An endpoint without scheme then defaults to `https`.
    pub fn tls(mut self, tls: TlsConfig) -> Builder {
        self.tls = Some(tls);
        self
    }
    /// Send the client's diagnostics to `dispatch`.
    ///
    /// By default the client emits nothing. It never logs errors, it returns
    /// them; events are lifecycle only (connect, request, end of stream,
    /// close).
    ///
    /// # Example
    ///
    /// ```
    /// let subscriber = tracing_subscriber::fmt().finish();
    /// let builder = obslytics::builder()
    ///     .dispatch(tracing::Dispatch::new(subscriber));
    /// ```
    pub fn dispatch(mut self, dispatch: Dispatch) -> Builder {
        self.dispatch = dispatch;
        self
    }
    /// Give up dialing the store after `timeout`.
    pub fn connect_timeout(mut self, timeout: Duration) -> Builder {
        self.connect_timeout = Some(timeout);
        self
    }
    /// Build the [`StoreClient`] for the store at `endpoint`.
    ///
    /// The `endpoint` is a gRPC address like `http://thanos-store:10901` or
    /// just `thanos-store:10901`, in which case the scheme follows the TLS
    /// setting. No connection is made until a query is opened.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Config`](crate::ErrorKind) if the endpoint is
    /// not a valid `http` or `https` address, if its scheme contradicts the
    /// TLS setting, or if the TLS material cannot be loaded.
    ///
    /// With [`TlsConfig::insecure_skip_verify`] the store's certificate is not
    /// verified at all.
    ///
    /// # Example
    ///
    /// ```
    /// # use obslytics::Error;
    /// # fn main() -> Result<(), Error> {
    /// let client = obslytics::builder().build("127.0.0.1:10901")?;
    /// assert_eq!(client.uri(), "http://127.0.0.1:10901/");
    /// # Ok(())
    /// # }
    /// ```
    pub fn build(self, endpoint: &str) -> Result<StoreClient, Error> {
        let dispatch = self.dispatch.clone();
        tracing::dispatcher::with_default(&dispatch, || self.build_inner(endpoint))
    }

    fn build_inner(self, endpoint: &str) -> Result<StoreClient, Error> {
        let url = parse_endpoint(endpoint, self.tls.is_some())?;
        let tls = match url.scheme() {
            "https" => Some(self.tls.unwrap_or_default()),
            _ => None,
        };
        let mut insecure = None;
        let mut endpoint = match &tls {
            Some(tls) if tls.insecure_skip_verify => {
                warn!("TLS certificate verification of the store is disabled");
                let (host, port) = host_port(&url)?;
                // The connector does the handshake; the channel must not try.
                let plain = new_endpoint(&format!("http://{}:{}", host, port))?;
                insecure = Some(tls.insecure_connector(host, port)?);
                plain
            }
            Some(tls) => {
                debug!("enabling client to server TLS");
                new_endpoint(url.as_str())?
                    .tls_config(tls.client_config()?)
                    .map_err(|e| Error(ErrorI::Tls(e)))?
            }
            None => new_endpoint(url.as_str())?,
        };
        if let Some(timeout) = self.connect_timeout {
            endpoint = endpoint.connect_timeout(timeout);
        }
        Ok(StoreClient::new(url.to_string(), endpoint, insecure, self.dispatch))
    }
}

fn new_endpoint(uri: &str) -> Result<Endpoint, Error> {
    Endpoint::from_shared(uri.to_owned())
        .map_err(|e| Error(ErrorI::InvalidEndpoint(format!("{}: {}", uri, e))))
}

fn host_port(url: &Url) -> Result<(Host<&str>, u16), Error> {
    match (url.host(), url.port_or_known_default()) {
        (Some(host), Some(port)) => Ok((host, port)),
        _ => Err(Error(ErrorI::InvalidEndpoint(format!("{}: missing host or port", url)))),
    }
}

fn parse_endpoint(endpoint: &str, tls: bool) -> Result<Url, Error> {
    let invalid = |reason: &str| Error(ErrorI::InvalidEndpoint(format!("{:?}: {}", endpoint, reason)));
    let url = if endpoint.contains("://") {
        Url::parse(endpoint)
    } else {
        let scheme = if tls { "https" } else { "http" };
        Url::parse(&format!("{}://{}", scheme, endpoint))
    };
    let url = url.map_err(|e| invalid(&e.to_string()))?;
    match url.scheme() {
        "http" if tls => return Err(invalid("TLS is configured but the scheme is http")),
        "http" | "https" => {}
        _ => return Err(invalid("scheme must be http or https")),
    }
    if !url.has_host() {
        return Err(invalid("missing host"));
    }
    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("must not have a path, query or fragment"));
    }
    Ok(url)
}
