//! Outgoing request descriptor and the pipeline that turns it into an
//! [`HttpRequest`].
//!
//! # Design
//! `Request` is assembled with chaining options and consumed by `build`,
//! which joins the path onto a base URL, encodes the body, settles headers
//! and the query string, and yields a plain `http::Request` for a transport.
//! Options that can fail (invalid header names or values) record the first
//! error and surface it from `build`, so the chain itself never breaks.

use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, HOST};
use http::{HeaderMap, Method};
use url::Url;

use crate::body::Body;
use crate::error::{Error, Result};
use crate::query::QueryParams;
use crate::transport::HttpRequest;

/// A single outgoing request, relative to a client's base URL.
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    host: String,
    headers: HeaderMap,
    query_params: Option<QueryParams>,
    body: Option<Body>,
    // First failing option; reported by every `build` call.
    error: Option<String>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            host: String::new(),
            headers: HeaderMap::new(),
            query_params: None,
            body: None,
            error: None,
        }
    }

    /// Override the `Host` sent with the request without changing the URL
    /// the request is sent to. An empty host leaves the URL authority in use.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set a header, replacing any previous values under the same name.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value.as_ref()),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            (Err(e), _) => self.record(format!("header name {name:?}: {e}")),
            (_, Err(e)) => self.record(format!("header value for {name}: {e}")),
        }
        self
    }

    /// Set every header in `headers`.
    pub fn with_headers<I, K, V>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        headers
            .into_iter()
            .fold(self, |request, (name, value)| request.with_header(name, value))
    }

    pub fn with_query_params(mut self, query_params: QueryParams) -> Self {
        self.query_params = Some(query_params);
        self
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn query_params(&self) -> Option<&QueryParams> {
        self.query_params.as_ref()
    }

    fn record(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(message);
        }
    }

    /// Produce the request to send to `base_url`.
    ///
    /// The body encoder's content type is applied only when a `Content-Type`
    /// header was already set on this request; otherwise the request goes out
    /// without one. A form body's file sources are drained here, so building
    /// the same request twice does not resend file contents.
    pub fn build(&mut self, base_url: &str) -> Result<HttpRequest> {
        if let Some(message) = &self.error {
            return Err(Error::InvalidRequest(message.clone()));
        }

        let mut url = join_url(base_url, &self.path)?;

        let mut body = None;
        if let Some(params) = self.body.as_mut() {
            let (content_type, data) = params
                .build()
                .map_err(|e| Error::Encoding(format!("build body params error {e}")))?;
            let has_content_type = self
                .headers
                .get(CONTENT_TYPE)
                .is_some_and(|value| !value.is_empty());
            if !content_type.is_empty() && has_content_type {
                let value = HeaderValue::from_str(&content_type)
                    .map_err(|e| Error::Encoding(format!("build body params error {e}")))?;
                self.headers.insert(CONTENT_TYPE, value);
            }
            body = Some(data);
        }

        if let Some(query_params) = self.query_params.as_ref().filter(|q| !q.is_empty()) {
            url.set_query(Some(&query_params.encode()));
        }

        let mut request = http::Request::builder()
            .method(self.method.clone())
            .uri(url.as_str())
            .body(body)
            .map_err(|e| Error::Url(format!("new http request error {e}")))?;

        *request.headers_mut() = self.headers.clone();

        if !self.host.is_empty() {
            let host = HeaderValue::from_str(&self.host)
                .map_err(|e| Error::InvalidRequest(format!("host {:?}: {e}", self.host)))?;
            request.headers_mut().insert(HOST, host);
        }

        Ok(request)
    }
}

/// Join `path` onto `base_url`, collapsing repeated `/` and resolving dot
/// segments. A `?query` suffix on `path` becomes the URL query.
pub(crate) fn join_url(base_url: &str, path: &str) -> Result<Url> {
    let mut url =
        Url::parse(base_url).map_err(|e| Error::Url(format!("build url path error {e}")))?;
    if url.cannot_be_a_base() {
        return Err(Error::Url(format!(
            "build url path error {base_url} cannot be a base"
        )));
    }
    if path.chars().any(char::is_control) {
        return Err(Error::Url(format!(
            "build url path error invalid control character in {path:?}"
        )));
    }

    let (path, query) = match path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path, None),
    };

    let mut joined = url.path().trim_end_matches('/').to_string();
    for segment in path.split('/').filter(|segment| !segment.is_empty()) {
        joined.push('/');
        joined.push_str(segment);
    }
    // An empty path yields `/` instead of leaving the base bare; both address
    // the same resource on the wire.
    if joined.is_empty() || path.ends_with('/') {
        joined.push('/');
    }

    url.set_path(&joined);
    url.set_query(query);
    Ok(url)
}
