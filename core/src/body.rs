//! Request body encoders.
//!
//! # Design
//! `Body` is a closed set of payload shapes sharing one `build` step that
//! yields the content type and the encoded bytes. JSON is serialized when the
//! body is created and any serialization error is held until `build`, so
//! request construction stays infallible. Form bodies are written as
//! multipart/form-data with a fresh boundary on every build.

use std::fmt;
use std::io::Read;

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use uuid::Uuid;

use crate::constants::{CONTENT_TYPE_JSON_UTF8, CONTENT_TYPE_MULTIPART, CONTENT_TYPE_OCTET_STREAM};
use crate::error::{Error, Result};

/// Request body attached to a [`Request`](crate::Request).
#[derive(Debug)]
pub enum Body {
    Json(JsonBody),
    Form(FormBody),
}

impl Body {
    /// Shorthand for `Body::Json(JsonBody::new(value))`.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        Body::Json(JsonBody::new(value))
    }

    /// Encode the body, returning its content type and bytes.
    ///
    /// File attachments of a form body are drained by this call; building the
    /// same form twice sends empty file parts the second time.
    pub fn build(&mut self) -> Result<(String, Bytes)> {
        match self {
            Body::Json(json) => json.build(),
            Body::Form(form) => form.build(),
        }
    }
}

impl From<JsonBody> for Body {
    fn from(body: JsonBody) -> Self {
        Body::Json(body)
    }
}

impl From<FormBody> for Body {
    fn from(body: FormBody) -> Self {
        Body::Form(body)
    }
}

/// A JSON payload, UTF-8 encoded.
#[derive(Debug)]
pub struct JsonBody {
    data: Bytes,
    error: Option<serde_json::Error>,
}

impl JsonBody {
    pub fn new<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(data) => Self {
                data: Bytes::from(data),
                error: None,
            },
            Err(err) => Self {
                data: Bytes::new(),
                error: Some(err),
            },
        }
    }

    fn build(&self) -> Result<(String, Bytes)> {
        if let Some(err) = &self.error {
            return Err(Error::Encoding(format!("marshal error {err}")));
        }
        Ok((CONTENT_TYPE_JSON_UTF8.to_string(), self.data.clone()))
    }
}

/// A multipart/form-data payload with scalar fields and file attachments.
#[derive(Debug, Default)]
pub struct FormBody {
    fields: Vec<(String, String)>,
    files: Vec<FormFile>,
}

struct FormFile {
    field_name: String,
    file_name: String,
    reader: Box<dyn Read + Send>,
}

impl fmt::Debug for FormFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormFile")
            .field("field_name", &self.field_name)
            .field("file_name", &self.file_name)
            .finish_non_exhaustive()
    }
}

impl FormBody {
    /// Create a form from scalar fields; they are written in iteration order.
    pub fn new<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
            files: Vec::new(),
        }
    }

    /// Attach a file part whose content is read from `reader` at build time.
    pub fn add_file(
        &mut self,
        field_name: impl Into<String>,
        file_name: impl Into<String>,
        reader: impl Read + Send + 'static,
    ) {
        self.files.push(FormFile {
            field_name: field_name.into(),
            file_name: file_name.into(),
            reader: Box::new(reader),
        });
    }

    /// Chaining form of [`add_file`](Self::add_file).
    pub fn with_file(
        mut self,
        field_name: impl Into<String>,
        file_name: impl Into<String>,
        reader: impl Read + Send + 'static,
    ) -> Self {
        self.add_file(field_name, file_name, reader);
        self
    }

    fn build(&mut self) -> Result<(String, Bytes)> {
        let mut writer = MultipartWriter::new();

        for (key, value) in &self.fields {
            writer.write_field(key, value);
        }

        for file in &mut self.files {
            let mut content = Vec::new();
            file.reader.read_to_end(&mut content).map_err(|e| {
                Error::Encoding(format!("copy file {} error {e}", file.file_name))
            })?;
            writer.write_file(&file.field_name, &file.file_name, &content);
        }

        let content_type = writer.content_type();
        Ok((content_type, writer.finish()))
    }
}

/// Serializes parts into a single buffer. Output is only exposed by `finish`,
/// so a failed build never leaks a partial body.
struct MultipartWriter {
    boundary: String,
    buffer: BytesMut,
}

impl MultipartWriter {
    fn new() -> Self {
        Self {
            boundary: Uuid::new_v4().simple().to_string(),
            buffer: BytesMut::new(),
        }
    }

    fn content_type(&self) -> String {
        format!("{CONTENT_TYPE_MULTIPART}; boundary={}", self.boundary)
    }

    fn write_field(&mut self, name: &str, value: &str) {
        let disposition = format!("form-data; name=\"{}\"", escape_quotes(name));
        self.open_part(&disposition, None);
        self.buffer.put_slice(value.as_bytes());
    }

    fn write_file(&mut self, field_name: &str, file_name: &str, content: &[u8]) {
        let disposition = format!(
            "form-data; name=\"{}\"; filename=\"{}\"",
            escape_quotes(field_name),
            escape_quotes(file_name)
        );
        self.open_part(&disposition, Some(CONTENT_TYPE_OCTET_STREAM));
        self.buffer.put_slice(content);
    }

    fn open_part(&mut self, disposition: &str, content_type: Option<&str>) {
        if !self.buffer.is_empty() {
            self.buffer.put_slice(b"\r\n");
        }
        self.buffer.put_slice(format!("--{}\r\n", self.boundary).as_bytes());
        self.buffer
            .put_slice(format!("Content-Disposition: {disposition}\r\n").as_bytes());
        if let Some(content_type) = content_type {
            self.buffer
                .put_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        self.buffer.put_slice(b"\r\n");
    }

    fn finish(mut self) -> Bytes {
        if !self.buffer.is_empty() {
            self.buffer.put_slice(b"\r\n");
        }
        self.buffer
            .put_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        self.buffer.freeze()
    }
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
