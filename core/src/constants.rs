//! Named defaults and header values shared across the crate.

use std::time::Duration;

/// Scheme used when the client builder is given none.
pub const DEFAULT_SCHEME: &str = "https";

/// Port used when the client builder is given none.
pub const DEFAULT_PORT: u16 = 443;

/// Whole-request timeout applied by the default transport.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_JSON_UTF8: &str = "application/json; charset=UTF-8";
pub const CONTENT_TYPE_MULTIPART: &str = "multipart/form-data";
pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";
