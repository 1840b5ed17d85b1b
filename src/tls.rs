use std::fs;
use std::future::Future;
use std::io;
use std::net::IpAddr;
use std::path::Path;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use hyper_util::rt::TokioIo;
use rustls::client::danger::HandshakeSignatureValid;
use rustls::client::danger::ServerCertVerified;
use rustls::client::danger::ServerCertVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::CertificateDer;
use rustls::pki_types::ServerName;
use rustls::pki_types::UnixTime;
use rustls::DigitallySignedStruct;
use rustls::SignatureScheme;
use serde::Deserialize;
use store_api::tonic::transport::Certificate;
use store_api::tonic::transport::ClientTlsConfig;
use store_api::tonic::transport::Identity;
use store_api::tonic::transport::Uri;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tower::Service;
use tracing::debug;
use url::Host;

use super::Error;
use super::ErrorI;

/// Client TLS settings for the connection to the store.
///
/// Without `ca_file`, the system's root certificates are trusted.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TlsConfig {
    /// PEM client certificate, for mutual TLS. Requires `key_file`.
    pub cert_file: Option<PathBuf>,
    /// PEM client private key, for mutual TLS. Requires `cert_file`.
    pub key_file: Option<PathBuf>,
    /// PEM bundle of the certificate authorities to trust.
    pub ca_file: Option<PathBuf>,
    /// The name to verify the store's certificate against, instead of the
    /// endpoint's host.
    pub server_name: Option<String>,
    /// Accept any certificate the store presents. `ca_file` is then unused.
    pub insecure_skip_verify: bool,
}

impl TlsConfig {
    pub(crate) fn client_config(&self) -> Result<ClientTlsConfig, Error> {
        let mut config = ClientTlsConfig::new();
        match &self.ca_file {
            Some(ca_file) => {
                config = config.ca_certificate(Certificate::from_pem(read(ca_file)?));
                debug!(ca_file = %ca_file.display(), "TLS client using provided certificate pool");
            }
            None => {
                config = config.with_native_roots();
                debug!("TLS client using system certificate pool");
            }
        }
        if let Some((cert_file, key_file)) = self.identity_files()? {
            config = config.identity(Identity::from_pem(read(cert_file)?, read(key_file)?));
            debug!(cert_file = %cert_file.display(), "TLS client authentication enabled");
        }
        if let Some(server_name) = &self.server_name {
            config = config.domain_name(server_name);
        }
        Ok(config)
    }

    /// A connector doing its own TLS handshake with certificate verification
    /// turned off, for `host:port`.
    pub(crate) fn insecure_connector(
        &self,
        host: Host<&str>,
        port: u16,
    ) -> Result<InsecureConnector, Error> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = rustls::ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| Error(ErrorI::TlsSetup(e)))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate(provider)));
        let mut config = match self.identity_files()? {
            Some((cert_file, key_file)) => {
                let (chain, key) = load_identity(cert_file, key_file)?;
                debug!(cert_file = %cert_file.display(), "TLS client authentication enabled");
                builder
                    .with_client_auth_cert(chain, key)
                    .map_err(|e| Error(ErrorI::TlsSetup(e)))?
            }
            None => builder.with_no_client_auth(),
        };
        config.alpn_protocols.push(b"h2".to_vec());
        debug!("TLS client skipping certificate verification");

        let addr = format!("{}:{}", host, port);
        let server_name = match (&self.server_name, host) {
            (Some(name), _) => ServerName::try_from(name.clone()),
            (None, Host::Domain(domain)) => ServerName::try_from(domain.to_owned()),
            (None, Host::Ipv4(ip)) => Ok(ServerName::from(IpAddr::V4(ip))),
            (None, Host::Ipv6(ip)) => Ok(ServerName::from(IpAddr::V6(ip))),
        }
        .map_err(|e| Error(ErrorI::InvalidEndpoint(format!("TLS server name: {}", e))))?;
        Ok(InsecureConnector {
            tls: TlsConnector::from(Arc::new(config)),
            addr,
            server_name,
        })
    }

    fn identity_files(&self) -> Result<Option<(&Path, &Path)>, Error> {
        match (&self.cert_file, &self.key_file) {
            (Some(cert_file), Some(key_file)) => Ok(Some((cert_file.as_path(), key_file.as_path()))),
            (None, None) => Ok(None),
            _ => Err(Error(ErrorI::TlsKeyWithoutCert)),
        }
    }
}

fn read(path: &Path) -> Result<Vec<u8>, Error> {
    fs::read(path).map_err(|cause| {
        Error(ErrorI::ReadFile {
            path: path.to_owned(),
            cause,
        })
    })
}

fn load_identity(
    cert_file: &Path,
    key_file: &Path,
) -> Result<(Vec<CertificateDer<'static>>, rustls::pki_types::PrivateKeyDer<'static>), Error> {
    let read_file = |path: &Path, cause: io::Error| {
        Error(ErrorI::ReadFile {
            path: path.to_owned(),
            cause,
        })
    };
    let pem = read(cert_file)?;
    let chain = rustls_pemfile::certs(&mut pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| read_file(cert_file, e))?;
    let pem = read(key_file)?;
    let key = rustls_pemfile::private_key(&mut pem.as_slice())
        .map_err(|e| read_file(key_file, e))?
        .ok_or_else(|| {
            let cause = io::Error::new(io::ErrorKind::InvalidData, "no private key found");
            read_file(key_file, cause)
        })?;
    Ok((chain, key))
}

/// Dials the store and runs the TLS handshake without verifying the store's
/// certificate.
///
/// The URI handed in by the channel is ignored; the address was fixed when
/// the client was built.
#[derive(Clone)]
pub(crate) struct InsecureConnector {
    tls: TlsConnector,
    addr: String,
    server_name: ServerName<'static>,
}

impl std::fmt::Debug for InsecureConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsecureConnector")
            .field("addr", &self.addr)
            .field("server_name", &self.server_name)
            .finish_non_exhaustive()
    }
}

impl Service<Uri> for InsecureConnector {
    type Response = TokioIo<TlsStream<TcpStream>>;
    type Error = io::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, io::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _uri: Uri) -> Self::Future {
        let InsecureConnector {
            tls,
            addr,
            server_name,
        } = self.clone();
        Box::pin(async move {
            let tcp = TcpStream::connect(&addr).await?;
            tcp.set_nodelay(true)?;
            let stream = tls.connect(server_name, tcp).await?;
            Ok(TokioIo::new(stream))
        })
    }
}

#[derive(Debug)]
struct AcceptAnyCertificate(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    // Signatures are still checked, the handshake proves key possession.
    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        let algorithms = &self.0.signature_verification_algorithms;
        rustls::crypto::verify_tls12_signature(message, cert, dss, algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        let algorithms = &self.0.signature_verification_algorithms;
        rustls::crypto::verify_tls13_signature(message, cert, dss, algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
