//! Buffered response value and JSON decode helper.

use std::io::Read;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;

use crate::constants::CONTENT_TYPE_JSON;
use crate::error::{Error, Result};
use crate::transport::HttpResponse;

/// A response with its body fully read into memory.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    raw_body: Bytes,
}

impl Response {
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn raw_body(&self) -> &Bytes {
        &self.raw_body
    }

    /// Decode the body as JSON.
    ///
    /// Fails with [`Error::ContentType`] unless the `Content-Type` header
    /// contains `application/json`, whether or not the body parses.
    pub fn unmarshal_json_body<T: DeserializeOwned>(&self) -> Result<T> {
        let content_type = self
            .headers
            .get(CONTENT_TYPE)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .unwrap_or_default();
        if !content_type.contains(CONTENT_TYPE_JSON) {
            return Err(Error::ContentType(content_type));
        }
        Ok(serde_json::from_slice(&self.raw_body)?)
    }
}

/// Drain a transport response into a [`Response`]. The body source is
/// dropped before returning, on success and on read failure alike.
pub fn parse_response(response: HttpResponse) -> Result<Response> {
    let (parts, mut body) = response.into_parts();

    let mut raw_body = Vec::new();
    let read = body.read_to_end(&mut raw_body);
    drop(body);
    read?;

    Ok(Response {
        status: parts.status,
        headers: parts.headers,
        raw_body: Bytes::from(raw_body),
    })
}
