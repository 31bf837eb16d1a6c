//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! A [`Response`] is a plain value: middlewares receive one back from
//! `next.handle(req)`, tweak it, and return it. The server host converts it
//! into a hyper response only at the very end.

use std::path::Path;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use tracing::{error, warn};

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`ResponseBuilder::bytes`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Css,          // text/css; charset=utf-8
    Html,         // text/html; charset=utf-8
    JavaScript,   // application/javascript
    Json,         // application/json
    OctetStream,  // application/octet-stream  (binary / file download)
    Pdf,          // application/pdf
    Png,          // image/png
    Svg,          // image/svg+xml
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Css         => "text/css; charset=utf-8",
            Self::Html        => "text/html; charset=utf-8",
            Self::JavaScript  => "application/javascript",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Pdf         => "application/pdf",
            Self::Png         => "image/png",
            Self::Svg         => "image/svg+xml",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }

    /// Best guess from a file extension; unknown extensions are binary.
    pub fn from_path(path: &Path) -> Self {
        let ext = path.extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("css")          => Self::Css,
            Some("htm" | "html") => Self::Html,
            Some("js" | "mjs")   => Self::JavaScript,
            Some("json")         => Self::Json,
            Some("pdf")          => Self::Pdf,
            Some("png")          => Self::Png,
            Some("svg")          => Self::Svg,
            Some("txt")          => Self::Text,
            Some("xml")          => Self::Xml,
            _                    => Self::OctetStream,
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// # Shortcuts (200 OK, no custom headers needed)
///
/// ```rust
/// use http::StatusCode;
/// use tether::Response;
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
/// ```
///
/// # Builder (custom status or headers)
///
/// ```rust
/// use http::StatusCode;
/// use tether::{ContentType, Response};
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/users/42")
///     .json(br#"{"id":42}"#.to_vec());
///
/// Response::builder()
///     .bytes(ContentType::Xml, b"<ok/>".to_vec());
/// ```
#[derive(Clone, Debug)]
pub struct Response {
    pub(crate) body: Vec<u8>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) status: StatusCode,
}

impl Response {
    /// `200 OK` — `application/json`.
    pub fn json(body: Vec<u8>) -> Self {
        Self::builder().bytes(ContentType::Json, body)
    }

    /// `200 OK` — `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// `200 OK` — `text/html; charset=utf-8`.
    pub fn html(body: impl Into<String>) -> Self {
        Self::builder().html(body)
    }

    /// `200 OK` — `application/xml`.
    pub fn xml(body: impl Into<String>) -> Self {
        Self::builder().bytes(ContentType::Xml, body.into().into_bytes())
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self { body: Vec::new(), headers: Vec::new(), status: code }
    }

    /// Redirect to `location` with `code` (usually 301, 302, 307 or 308).
    pub fn redirect(location: &str, code: StatusCode) -> Self {
        Self::builder().status(code).header("location", location).no_body()
    }

    /// Serves the file at `path` inline, typed by its extension.
    ///
    /// A file that cannot be read yields `404 Not Found`.
    pub fn file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read(path) {
            Ok(body) => Self::builder().bytes(ContentType::from_path(path), body),
            Err(e) => {
                warn!(path = %path.display(), "file response unavailable: {e}");
                Self::status(StatusCode::NOT_FOUND)
            }
        }
    }

    /// Serves the file at `path` as an attachment named `filename`, or by its
    /// own file name when `filename` is empty.
    pub fn download(path: impl AsRef<Path>, filename: &str) -> Self {
        let path = path.as_ref();
        let mut response = Self::file(path);
        if !response.status.is_success() {
            return response;
        }
        let name = if filename.is_empty() {
            path.file_name().and_then(|n| n.to_str()).unwrap_or("download")
        } else {
            filename
        };
        response.set_header("content-disposition", &format!("attachment; filename=\"{}\"", quote(name)));
        response
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: StatusCode::OK }
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replaces every value of `name` with `value`.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_owned(), value.to_owned()));
    }

    pub fn set_status(&mut self, code: StatusCode) {
        self.status = code;
    }

    pub fn set_body(&mut self, body: Vec<u8>) {
        self.body = body;
    }

    /// Appends to the body.
    pub fn write(&mut self, data: impl AsRef<[u8]>) {
        self.body.extend_from_slice(data.as_ref());
    }

    /// Converts into the hyper-facing response.
    ///
    /// Headers that are not valid HTTP are a programming error upstream; they
    /// turn the whole response into `500 Internal Server Error`.
    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut builder = http::Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
            .body(Full::new(Bytes::from(self.body)))
            .unwrap_or_else(|e| {
                error!("invalid response: {e}");
                let mut fallback = http::Response::new(Full::default());
                *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                fallback
            })
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::status(StatusCode::OK)
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`.
/// Terminated by a typed body method — you always know what you're sending.
pub struct ResponseBuilder {
    headers: Vec<(String, String)>,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn json(self, body: Vec<u8>) -> Response {
        self.bytes(ContentType::Json, body)
    }

    pub fn text(self, body: impl Into<String>) -> Response {
        self.bytes(ContentType::Text, body.into().into_bytes())
    }

    pub fn html(self, body: impl Into<String>) -> Response {
        self.bytes(ContentType::Html, body.into().into_bytes())
    }

    /// Terminate with a typed body. Use this for XML, binary, scripts, etc.
    pub fn bytes(self, content_type: ContentType, body: Vec<u8>) -> Response {
        let mut headers = vec![("content-type".to_owned(), content_type.as_str().to_owned())];
        headers.extend(self.headers);
        Response { body, headers, status: self.status }
    }

    /// Terminate with no body (e.g. `204 No Content`, redirects).
    pub fn no_body(self) -> Response {
        Response { body: Vec::new(), headers: self.headers, status: self.status }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Implement on your own types to return them directly from route handlers.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a status directly from a handler: `return StatusCode::NOT_FOUND`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

/// Escapes `name` for a quoted header parameter, dropping control characters.
fn quote(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len());
    for c in name.chars().filter(|c| !c.is_control()) {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted
}
