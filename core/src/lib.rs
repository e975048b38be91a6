//! Convenience layer over a blocking HTTP client.
//!
//! # Overview
//! A [`Client`] is configured once with scheme, host, port, TLS and timeout
//! settings. Each call describes a [`Request`] (method, path, headers, query
//! parameters, body) which `Client::send` turns into an `http::Request`,
//! executes on a [`Transport`], and buffers into a [`Response`].
//!
//! # Design
//! - `Request::build` is public, so the request pipeline can be used without
//!   a client (the caller then executes the request itself).
//! - Bodies are a closed enum: JSON or multipart form.
//! - The transport sits behind a trait; the default is blocking `reqwest`.
//!
//! ```no_run
//! use http::Method;
//! use reqkit::{Body, Client, Request};
//!
//! # fn main() -> reqkit::Result<()> {
//! let client = Client::builder("127.0.0.1").scheme("http").port(8080).build()?;
//! let request = Request::new(Method::POST, "/api/test")
//!     .with_header("Content-Type", "application/json")
//!     .with_body(Body::json(&serde_json::json!({"msg": "hello world"})));
//! let response = client.send(request)?;
//! let reply: serde_json::Value = response.unmarshal_json_body()?;
//! println!("{} {reply}", response.status_code());
//! # Ok(())
//! # }
//! ```

pub mod body;
pub mod client;
pub mod constants;
pub mod error;
pub mod query;
pub mod request;
pub mod response;
pub mod transport;

pub use body::{Body, FormBody, JsonBody};
pub use client::{Client, ClientBuilder, ClientConfig};
pub use error::{Error, Result, TransportError};
pub use query::QueryParams;
pub use request::Request;
pub use response::{parse_response, Response};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, ResponseBody, Transport};
