//! Transport seam: the one place a request actually touches the network.
//!
//! # Design
//! Requests and responses cross this boundary as plain `http` types so the
//! request pipeline and the response parser never depend on a specific HTTP
//! library. `ReqwestTransport` is the default backend; anything implementing
//! [`Transport`] can replace it through `ClientBuilder::transport`.

use std::fmt;
use std::io::Read;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderValue, HOST};
use http::uri::{Authority, Uri};

use crate::error::{Error, Result, TransportError};

/// A fully built request, ready for a transport.
pub type HttpRequest = http::Request<Option<Bytes>>;

/// Response body as delivered by a transport, read once by the parser.
pub type ResponseBody = Box<dyn Read + Send>;

/// A raw response as delivered by a transport.
pub type HttpResponse = http::Response<ResponseBody>;

/// Executes one request and returns one response.
///
/// Implementations must not treat non-2xx statuses as errors; status handling
/// belongs to the caller.
pub trait Transport: Send + Sync + fmt::Debug {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Settings the client builder hands to the default transport.
#[derive(Default)]
pub(crate) struct TransportSettings {
    pub timeout: Option<Duration>,
    pub identity: Option<reqwest::Identity>,
    pub server_name: Option<String>,
    pub skip_verify: bool,
}

impl fmt::Debug for TransportSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSettings")
            .field("timeout", &self.timeout)
            .field("identity", &self.identity.is_some())
            .field("server_name", &self.server_name)
            .field("skip_verify", &self.skip_verify)
            .finish()
    }
}

/// [`Transport`] backed by the blocking [`reqwest`] client.
///
/// Must not be used from inside an async runtime's worker threads.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
    // TLS name requests are addressed to; resolution is pinned to the real host.
    server_name: Option<String>,
}

impl ReqwestTransport {
    /// Wrap an existing [`reqwest::blocking::Client`].
    pub fn from_client(client: reqwest::blocking::Client) -> Self {
        Self {
            client,
            server_name: None,
        }
    }

    /// Build a transport for `host:port` from the builder's settings.
    pub(crate) fn with_settings(settings: TransportSettings, host: &str, port: u16) -> Result<Self> {
        let mut builder = reqwest::blocking::Client::builder()
            .use_rustls_tls()
            .danger_accept_invalid_certs(settings.skip_verify)
            .timeout(settings.timeout);

        if let Some(identity) = settings.identity {
            builder = builder.identity(identity);
        }

        let server_name = match settings.server_name {
            Some(server_name) => {
                let target = resolve_target(host, port)?;
                builder = builder.resolve(&server_name, target);
                Some(server_name)
            }
            None => None,
        };

        let client = builder
            .build()
            .map_err(|e| Error::Build(e.to_string()))?;
        Ok(Self {
            client,
            server_name,
        })
    }

    /// Point TLS requests at the override name, keeping the original
    /// authority as `Host` unless the request already carries one.
    fn apply_server_name(&self, request: &mut HttpRequest) -> Result<(), TransportError> {
        let Some(server_name) = &self.server_name else {
            return Ok(());
        };
        if request.uri().scheme_str() != Some("https") {
            return Ok(());
        }
        let Some(original) = request.uri().authority().cloned() else {
            return Ok(());
        };

        let authority = match original.port_u16() {
            Some(port) => format!("{server_name}:{port}"),
            None => server_name.clone(),
        };
        let authority = authority
            .parse::<Authority>()
            .map_err(|e| TransportError::Other(Box::new(e)))?;

        let mut parts = request.uri().clone().into_parts();
        parts.authority = Some(authority);
        *request.uri_mut() = Uri::from_parts(parts).map_err(|e| TransportError::Other(Box::new(e)))?;

        if !request.headers().contains_key(HOST) {
            let host = HeaderValue::from_str(original.as_str())
                .map_err(|e| TransportError::Other(Box::new(e)))?;
            request.headers_mut().insert(HOST, host);
        }
        Ok(())
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, mut request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.apply_server_name(&mut request)?;

        let (parts, body) = request.into_parts();
        let mut builder = self
            .client
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers);
        if let Some(body) = body {
            builder = builder.body(body.to_vec());
        }

        let response = builder.send().map_err(map_reqwest_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        let mut raw = http::Response::new(Box::new(response) as ResponseBody);
        *raw.status_mut() = status;
        *raw.headers_mut() = headers;
        Ok(raw)
    }
}

fn resolve_target(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .map_err(|e| Error::Build(format!("resolve {host}:{port} error {e}")))?
        .next()
        .ok_or_else(|| Error::Build(format!("resolve {host}:{port} returned no address")))
}

/// Map a reqwest error to our [`TransportError`].
fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connection(err.to_string())
    } else {
        TransportError::Other(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn override_transport(server_name: &str) -> ReqwestTransport {
        let settings = TransportSettings {
            server_name: Some(server_name.to_string()),
            ..TransportSettings::default()
        };
        ReqwestTransport::with_settings(settings, "127.0.0.1", 8443).unwrap()
    }

    fn request(uri: &str) -> HttpRequest {
        http::Request::builder().uri(uri).body(None).unwrap()
    }

    #[test]
    fn server_name_rewrites_https_authority() {
        let transport = override_transport("api.internal");
        let mut req = request("https://127.0.0.1:8443/v1/items?a=1");
        transport.apply_server_name(&mut req).unwrap();

        assert_eq!(req.uri(), "https://api.internal:8443/v1/items?a=1");
        assert_eq!(req.headers()[HOST], "127.0.0.1:8443");
    }

    #[test]
    fn server_name_keeps_explicit_host() {
        let transport = override_transport("api.internal");
        let mut req = request("https://127.0.0.1:8443/");
        req.headers_mut()
            .insert(HOST, HeaderValue::from_static("virtual.example"));
        transport.apply_server_name(&mut req).unwrap();

        assert_eq!(req.uri().host(), Some("api.internal"));
        assert_eq!(req.headers()[HOST], "virtual.example");
    }

    #[test]
    fn server_name_ignores_plain_http() {
        let transport = override_transport("api.internal");
        let mut req = request("http://127.0.0.1:8443/");
        transport.apply_server_name(&mut req).unwrap();

        assert_eq!(req.uri(), "http://127.0.0.1:8443/");
        assert!(req.headers().get(HOST).is_none());
    }

    #[test]
    fn unresolvable_target_is_build_error() {
        let err = resolve_target("host.invalid.", 443).unwrap_err();
        assert!(matches!(err, Error::Build(_)));
    }
}
