//! Client configuration and the send path.
//!
//! # Design
//! `Client` is built once and reused. Its fields never change after
//! `ClientBuilder::build`, so `send` takes `&self` and the client can be
//! shared across threads; concurrency safety of the actual I/O is the
//! transport's contract. Each `send` builds the request against
//! `scheme://host:port`, hands it to the transport, and buffers the response.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::constants::{DEFAULT_PORT, DEFAULT_SCHEME, DEFAULT_TIMEOUT};
use crate::error::{Error, Result};
use crate::request::Request;
use crate::response::{parse_response, Response};
use crate::transport::{ReqwestTransport, Transport, TransportSettings};

/// HTTP client bound to one `scheme://host:port`.
#[derive(Debug, Clone)]
pub struct Client {
    scheme: String,
    host: String,
    port: u16,
    transport: Arc<dyn Transport>,
}

impl Client {
    /// Start configuring a client for `host`.
    pub fn builder(host: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(host)
    }

    /// Build a client from a deserialized [`ClientConfig`].
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut builder = ClientBuilder::new(config.host.clone());
        if let Some(scheme) = &config.scheme {
            builder = builder.scheme(scheme.clone());
        }
        if let Some(port) = config.port {
            builder = builder.port(port);
        }
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        match (&config.client_cert_file, &config.client_key_file) {
            (Some(cert), Some(key)) => builder = builder.client_certificate_file(cert, key),
            (None, None) => {}
            _ => {
                return Err(Error::Certificate(
                    "client_cert_file and client_key_file must be set together".to_string(),
                ))
            }
        }
        if let Some(server_name) = &config.tls_server_name {
            builder = builder.tls_server_name(server_name.clone());
        }
        if config.skip_verify_certificates {
            builder = builder.skip_verify_certificates();
        }
        builder.build()
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `scheme://host:port`, the URL every request path is joined onto.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    /// Build `request`, execute it, and buffer the response.
    ///
    /// Non-2xx statuses are returned as ordinary responses. Errors from
    /// request building and from the transport are returned unchanged.
    #[instrument(skip_all, fields(method = %request.method(), path = request.path()))]
    pub fn send(&self, mut request: Request) -> Result<Response> {
        let http_request = request.build(&self.base_url())?;
        debug!(url = %http_request.uri(), "sending request");

        let http_response = self.transport.execute(http_request)?;
        debug!(status = %http_response.status(), "received response");

        parse_response(http_response)
    }
}

/// Fluent configuration for [`Client`]. Later calls overwrite earlier ones
/// that set the same field; certificate material is validated by `build`.
pub struct ClientBuilder {
    scheme: String,
    host: String,
    port: u16,
    transport: Option<Arc<dyn Transport>>,
    timeout: Option<Duration>,
    certificate: Option<CertificateSource>,
    tls_server_name: Option<String>,
    skip_verify: bool,
}

enum CertificateSource {
    Pem { cert: Vec<u8>, key: Vec<u8> },
    File { cert: PathBuf, key: PathBuf },
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("transport", &self.transport)
            .field("timeout", &self.timeout)
            .field("certificate", &self.certificate.is_some())
            .field("tls_server_name", &self.tls_server_name)
            .field("skip_verify", &self.skip_verify)
            .finish()
    }
}

impl ClientBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            host: host.into(),
            port: DEFAULT_PORT,
            transport: None,
            timeout: None,
            certificate: None,
            tls_server_name: None,
            skip_verify: false,
        }
    }

    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Replace the default transport. TLS and timeout settings only apply to
    /// the default transport and are ignored when one is supplied here.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Client certificate and private key as PEM bytes.
    pub fn client_certificate_pem(mut self, cert: impl Into<Vec<u8>>, key: impl Into<Vec<u8>>) -> Self {
        self.certificate = Some(CertificateSource::Pem {
            cert: cert.into(),
            key: key.into(),
        });
        self
    }

    /// Client certificate and private key read from PEM files at build time.
    pub fn client_certificate_file(mut self, cert: impl AsRef<Path>, key: impl AsRef<Path>) -> Self {
        self.certificate = Some(CertificateSource::File {
            cert: cert.as_ref().to_path_buf(),
            key: key.as_ref().to_path_buf(),
        });
        self
    }

    /// Name used for TLS server verification instead of the host.
    pub fn tls_server_name(mut self, server_name: impl Into<String>) -> Self {
        self.tls_server_name = Some(server_name.into());
        self
    }

    pub fn skip_verify_certificates(mut self) -> Self {
        self.skip_verify = true;
        self
    }

    pub fn build(self) -> Result<Client> {
        let identity = self.certificate.as_ref().map(load_identity).transpose()?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => {
                if identity.is_some()
                    || self.timeout.is_some()
                    || self.tls_server_name.is_some()
                    || self.skip_verify
                {
                    warn!("TLS and timeout options do not apply to a custom transport");
                }
                transport
            }
            None => {
                let settings = TransportSettings {
                    timeout: Some(self.timeout.unwrap_or(DEFAULT_TIMEOUT)),
                    identity,
                    server_name: self.tls_server_name,
                    skip_verify: self.skip_verify,
                };
                Arc::new(ReqwestTransport::with_settings(settings, &self.host, self.port)?)
            }
        };

        Ok(Client {
            scheme: self.scheme,
            host: self.host,
            port: self.port,
            transport,
        })
    }
}

fn load_identity(source: &CertificateSource) -> Result<reqwest::Identity> {
    let (cert, key) = match source {
        CertificateSource::Pem { cert, key } => (cert.clone(), key.clone()),
        CertificateSource::File { cert, key } => (read_pem(cert)?, read_pem(key)?),
    };

    let mut pem = key;
    pem.push(b'\n');
    pem.extend_from_slice(&cert);
    reqwest::Identity::from_pem(&pem).map_err(|e| Error::Certificate(e.to_string()))
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| Error::Certificate(format!("read {} error {e}", path.display())))
}

/// Client settings as a plain record, e.g. a section of an application's
/// config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub scheme: Option<String>,
    pub port: Option<u16>,
    pub timeout_secs: Option<u64>,
    pub client_cert_file: Option<PathBuf>,
    pub client_key_file: Option<PathBuf>,
    pub tls_server_name: Option<String>,
    pub skip_verify_certificates: bool,
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Mutex;

    use http::header::CONTENT_TYPE;
    use http::{Method, StatusCode};

    use super::*;
    use crate::error::TransportError;
    use crate::transport::{HttpRequest, HttpResponse, ResponseBody};

    /// Records the last request and answers with a fixed JSON body.
    #[derive(Debug, Default)]
    struct FakeTransport {
        seen: Mutex<Vec<String>>,
    }

    impl Transport for FakeTransport {
        fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request.uri().to_string());
            let body: ResponseBody = Box::new(Cursor::new(br#"{"hello":"world"}"#.to_vec()));
            Ok(http::Response::builder()
                .status(200)
                .header(CONTENT_TYPE, "application/json")
                .body(body)
                .unwrap())
        }
    }

    #[derive(Debug)]
    struct RefusingTransport;

    impl Transport for RefusingTransport {
        fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            Err(TransportError::Connection("connection refused".to_string()))
        }
    }

    #[test]
    fn defaults() {
        let client = Client::builder("127.0.0.1").build().unwrap();
        assert_eq!(client.scheme(), "https");
        assert_eq!(client.host(), "127.0.0.1");
        assert_eq!(client.port(), 443);
        assert_eq!(client.base_url(), "https://127.0.0.1:443");
    }

    #[test]
    fn base_url_from_options() {
        let client = Client::builder("127.0.0.1")
            .scheme("http")
            .port(8080)
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn later_options_overwrite_earlier() {
        let client = Client::builder("127.0.0.1")
            .port(80)
            .host("127.0.0.2")
            .port(8081)
            .build()
            .unwrap();
        assert_eq!(client.host(), "127.0.0.2");
        assert_eq!(client.port(), 8081);
    }

    #[test]
    fn skip_verify_and_server_name_build() {
        let client = Client::builder("127.0.0.1")
            .tls_server_name("example.com")
            .skip_verify_certificates()
            .build();
        assert!(client.is_ok());
    }

    #[test]
    fn send_goes_through_transport() {
        let client = Client::builder("127.0.0.1")
            .scheme("http")
            .port(8080)
            .transport(FakeTransport::default())
            .build()
            .unwrap();

        let response = client.send(Request::new(Method::GET, "/api/test")).unwrap();
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.raw_body().as_ref(), br#"{"hello":"world"}"#);

        let body: serde_json::Value = response.unmarshal_json_body().unwrap();
        assert_eq!(body, serde_json::json!({"hello": "world"}));
    }

    #[test]
    fn transport_errors_pass_through() {
        let client = Client::builder("127.0.0.1")
            .transport(RefusingTransport)
            .build()
            .unwrap();
        let err = client.send(Request::new(Method::GET, "/")).unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportError::Connection(ref msg)) if msg == "connection refused"
        ));
    }

    #[test]
    fn build_errors_stop_before_transport() {
        let client = Client::builder("127.0.0.1")
            .transport(RefusingTransport)
            .build()
            .unwrap();
        let request = Request::new(Method::GET, "/").with_header("bad header", "x");
        assert!(matches!(client.send(request), Err(Error::InvalidRequest(_))));
    }

    const CLIENT_CRT: &[u8] = include_bytes!("../tests/fixtures/client.crt");
    const CLIENT_KEY: &[u8] = include_bytes!("../tests/fixtures/client.key");

    #[test]
    fn valid_pem_builds_client() {
        let client = Client::builder("127.0.0.1")
            .client_certificate_pem(CLIENT_CRT, CLIENT_KEY)
            .build();
        assert!(client.is_ok(), "{:?}", client.err());
    }

    #[test]
    fn valid_certificate_files_build_client() {
        let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
        let client = Client::builder("127.0.0.1")
            .client_certificate_file(fixtures.join("client.crt"), fixtures.join("client.key"))
            .build();
        assert!(client.is_ok(), "{:?}", client.err());
    }

    #[test]
    fn load_identity_accepts_key_and_certificate() {
        let source = CertificateSource::Pem {
            cert: CLIENT_CRT.to_vec(),
            key: CLIENT_KEY.to_vec(),
        };
        assert!(load_identity(&source).is_ok());
    }

    #[test]
    fn malformed_pem_is_certificate_error() {
        let err = Client::builder("127.0.0.1")
            .client_certificate_pem(b"not a certificate".to_vec(), b"not a key".to_vec())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Certificate(_)));
    }

    #[test]
    fn missing_certificate_file_is_certificate_error() {
        let err = Client::builder("127.0.0.1")
            .client_certificate_file("/nonexistent/client.crt", "/nonexistent/client.key")
            .build()
            .unwrap_err();
        match err {
            Error::Certificate(msg) => assert!(msg.contains("/nonexistent/client.crt"), "{msg}"),
            other => panic!("expected Error::Certificate, got {other:?}"),
        }
    }

    #[test]
    fn certificate_is_validated_even_with_custom_transport() {
        let err = Client::builder("127.0.0.1")
            .transport(FakeTransport::default())
            .client_certificate_pem(b"garbage".to_vec(), b"garbage".to_vec())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Certificate(_)));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"host":"127.0.0.1","scheme":"http","port":8080}"#).unwrap();
        assert_eq!(config.port, Some(8080));
        assert!(config.timeout_secs.is_none());
        assert!(!config.skip_verify_certificates);

        let client = Client::from_config(&config).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn config_without_overrides_uses_constants() {
        let config = ClientConfig {
            host: "example.com".to_string(),
            ..ClientConfig::default()
        };
        let client = Client::from_config(&config).unwrap();
        assert_eq!(client.base_url(), "https://example.com:443");
    }

    #[test]
    fn config_requires_cert_and_key_together() {
        let config = ClientConfig {
            host: "127.0.0.1".to_string(),
            client_cert_file: Some(PathBuf::from("client.crt")),
            ..ClientConfig::default()
        };
        assert!(matches!(Client::from_config(&config), Err(Error::Certificate(_))));
    }
}
