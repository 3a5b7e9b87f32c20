//! Response construction and writing.
//!
//! # Responsibilities
//! - Represent what a handler answers with
//! - Write the status line, one `Content-Type` header and the body
//! - Render the fixed 404 / 500 HTML pages
//!
//! # Design Decisions
//! - No `Content-Length` or `Connection` header: the client reads to close
//! - Content type is inferred from the request path unless the handler set one
//! - Handler diagnostics appear in a 500 page only when explicitly enabled

use http::StatusCode;
use tokio::io::{AsyncWrite, AsyncWriteExt};

const FALLBACK_CONTENT_TYPE: &str = "text/html";
const INDEX_FILE: &str = "index.html";

/// A handler's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    /// Explicit content type; inferred from the request path when `None`.
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Response {
    /// A `200 OK` response with the given body.
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: None,
            body: body.into(),
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

impl From<String> for Response {
    fn from(body: String) -> Self {
        Self::new(body)
    }
}

impl From<&str> for Response {
    fn from(body: &str) -> Self {
        Self::new(body)
    }
}

impl From<Vec<u8>> for Response {
    fn from(body: Vec<u8>) -> Self {
        Self::new(body)
    }
}

/// Infer a content type from the extension of `hint_path`.
///
/// A path ending in `/` is treated as its index document.
pub fn content_type_for(hint_path: &str) -> String {
    let path = if hint_path.is_empty() || hint_path.ends_with('/') {
        format!("{hint_path}{INDEX_FILE}")
    } else {
        hint_path.to_string()
    };
    mime_guess::from_path(&path)
        .first_raw()
        .unwrap_or(FALLBACK_CONTENT_TYPE)
        .to_string()
}

/// Writes one response onto a connection.
pub struct ResponseWriter<'a, W: ?Sized> {
    stream: &'a mut W,
}

impl<'a, W> ResponseWriter<'a, W>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    pub fn new(stream: &'a mut W) -> Self {
        Self { stream }
    }

    /// Write the status line and the content type inferred from `hint_path`.
    pub async fn send_status(&mut self, status: StatusCode, hint_path: &str) -> std::io::Result<()> {
        self.send_head(status, &content_type_for(hint_path)).await
    }

    /// Write the status line and an explicit content type.
    pub async fn send_head(&mut self, status: StatusCode, content_type: &str) -> std::io::Result<()> {
        let head = format!(
            "HTTP/1.0 {} {}\r\nContent-Type: {}\r\n\r\n",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown"),
            content_type
        );
        self.stream.write_all(head.as_bytes()).await
    }

    pub async fn send_body(&mut self, body: &[u8]) -> std::io::Result<()> {
        self.stream.write_all(body).await?;
        self.stream.flush().await
    }

    /// Write a complete response; `hint_path` is used when it carries no content type.
    pub async fn send(&mut self, response: &Response, hint_path: &str) -> std::io::Result<()> {
        match &response.content_type {
            Some(content_type) => self.send_head(response.status, content_type).await?,
            None => self.send_status(response.status, hint_path).await?,
        }
        self.send_body(&response.body).await
    }
}

/// Escape text for inclusion in HTML.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Body of the fixed 404 page.
pub fn not_found_page(url: &str) -> String {
    format!(
        "<head><title>Error 404: Not Found</title></head>\
         <body><h1>Error response</h1><p>Error code 404.\
         <p>Message: The URI \"{}\" is not available.\
         <p>Error code explanation: 404 = Nothing matches the given URI.</body>",
        escape_html(url)
    )
}

/// Body of the fixed 500 page, optionally embedding a diagnostic.
pub fn internal_error_page(url: &str, diagnostic: Option<&str>) -> String {
    let explanation = match diagnostic {
        Some(detail) => escape_html(detail).replace('\n', "<br />\n"),
        None => "The handler failed. Details are in the server log.".to_string(),
    };
    format!(
        "<head><title>Error 500: Internal Server Error</title></head>\
         <body><h1>Error response</h1><p>Error code 500.\
         <p>Message: The server encountered an error processing the request \"{}\".\
         <p>Error code explanation: <br /> <br />{}</body>",
        escape_html(url),
        explanation
    )
}
