use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::builder::Builder;
use super::client::StoreClient;
use super::tls::TlsConfig;
use super::Error;
use super::ErrorI;

/// The only input type there is.
const STORE_API: &str = "STOREAPI";

/// Where to read series from, as given in an input configuration file:
///
/// ```yaml
/// type: STOREAPI
/// endpoint: thanos-store:10901
/// tls_config:
///   ca_file: ca.pem
///   server_name: store.example
/// ```
///
/// `type` is optional. Without `tls_config`, the connection is plaintext
/// unless `endpoint` says `https://`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct InputConfig {
    /// The input type, `STOREAPI` if given.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// The gRPC address of the store.
    pub endpoint: String,
    /// TLS settings; their presence enables TLS.
    #[serde(default)]
    pub tls_config: Option<TlsConfig>,
}

impl InputConfig {
    /// Read a YAML input configuration file.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Config`](crate::ErrorKind) if the file cannot
    /// be read or parsed, or names an input type other than `STOREAPI`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<InputConfig, Error> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|cause| {
            Error(ErrorI::ReadFile {
                path: path.to_owned(),
                cause,
            })
        })?;
        let config: InputConfig = serde_yaml::from_str(&text).map_err(|cause| {
            Error(ErrorI::ParseConfig {
                path: path.to_owned(),
                cause,
            })
        })?;
        if let Some(kind) = &config.kind {
            if !kind.eq_ignore_ascii_case(STORE_API) {
                return Err(Error(ErrorI::UnsupportedInput(kind.clone())));
            }
        }
        Ok(config)
    }

    /// Build a client for this input from `builder`, which carries the
    /// settings not part of the file.
    pub fn client(&self, builder: Builder) -> Result<StoreClient, Error> {
        let builder = match &self.tls_config {
            Some(tls) => builder.tls(tls.clone()),
            None => builder,
        };
        builder.build(&self.endpoint)
    }
}
