//! Request framing off a raw byte stream.
//!
//! # Data Flow
//! ```text
//! socket bytes → rolling buffer
//!     → request line   (up to first CRLF)
//!     → header block   (up to CRLF CRLF)
//!     → body           (exactly Content-Length bytes)
//!     → Request
//! ```
//!
//! # Design Decisions
//! - One buffer for the whole request: bytes read past a terminator seed the next field
//! - Every socket read is bounded by the connection's read timeout
//! - A body cut short by the peer closing becomes an empty body, not an error
//! - The head is capped so a peer cannot grow the buffer without bound

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::http::error::RequestError;
use crate::http::request::{Headers, Request};

const READ_CHUNK: usize = 4096;
const LINE_END: &[u8] = b"\r\n";
const HEAD_END: &[u8] = b"\r\n\r\n";

/// Size guards applied while framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramerLimits {
    /// Maximum bytes buffered while looking for the end of the headers.
    pub max_head_bytes: usize,
    /// Maximum accepted `Content-Length`.
    pub max_body_bytes: usize,
}

impl Default for FramerLimits {
    fn default() -> Self {
        Self {
            max_head_bytes: 64 * 1024,
            max_body_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Read one request from `stream`.
pub async fn receive<S>(
    stream: &mut S,
    timeout: Option<Duration>,
    limits: FramerLimits,
) -> Result<Request, RequestError>
where
    S: AsyncRead + Unpin + ?Sized,
{
    RequestFramer::new(stream, timeout, limits).receive().await
}

/// Reads a single request off a connection.
pub struct RequestFramer<'a, S: ?Sized> {
    stream: &'a mut S,
    timeout: Option<Duration>,
    limits: FramerLimits,
    buf: Vec<u8>,
}

impl<'a, S> RequestFramer<'a, S>
where
    S: AsyncRead + Unpin + ?Sized,
{
    pub fn new(stream: &'a mut S, timeout: Option<Duration>, limits: FramerLimits) -> Self {
        Self {
            stream,
            timeout,
            limits,
            buf: Vec::with_capacity(READ_CHUNK),
        }
    }

    /// Frame the request: request line, header block, then body.
    pub async fn receive(mut self) -> Result<Request, RequestError> {
        let line_end = self
            .read_until(LINE_END, 0, RequestError::IncompleteRequest)
            .await?;
        // The header terminator may begin at the request line's own CRLF.
        let head_end = self
            .read_until(HEAD_END, line_end, RequestError::IncompleteRequestHeader)
            .await?;

        let request_line = String::from_utf8_lossy(&self.buf[..line_end]).into_owned();
        let headers = if head_end > line_end {
            Headers::parse(&String::from_utf8_lossy(&self.buf[line_end + LINE_END.len()..head_end]))
        } else {
            Headers::new()
        };

        let (method, path, version) = parse_request_line(&request_line)?;

        let content_length = content_length(&headers)?;
        if content_length > self.limits.max_body_bytes {
            return Err(RequestError::BodyTooLarge {
                declared: content_length,
                limit: self.limits.max_body_bytes,
            });
        }
        let body = self.read_body(head_end + HEAD_END.len(), content_length).await?;

        Ok(Request {
            method,
            path,
            version,
            headers,
            body,
        })
    }

    /// Read until `needle` appears at or after `from`, returning its offset.
    async fn read_until(
        &mut self,
        needle: &[u8],
        from: usize,
        on_close: RequestError,
    ) -> Result<usize, RequestError> {
        let mut search_from = from;
        loop {
            if let Some(pos) = find(&self.buf[search_from..], needle) {
                return Ok(search_from + pos);
            }
            if self.buf.len() >= self.limits.max_head_bytes {
                return Err(RequestError::HeaderTooLarge {
                    limit: self.limits.max_head_bytes,
                });
            }
            // A terminator may straddle the old end of the buffer.
            search_from = self.buf.len().saturating_sub(needle.len() - 1).max(from);
            if self.fill().await? == 0 {
                return Err(on_close);
            }
        }
    }

    async fn read_body(&mut self, start: usize, len: usize) -> Result<Vec<u8>, RequestError> {
        while self.buf.len() - start < len {
            if self.fill().await? == 0 {
                tracing::debug!(
                    expected = len,
                    received = self.buf.len() - start,
                    "Peer closed mid-body, using empty body"
                );
                return Ok(Vec::new());
            }
        }
        Ok(self.buf[start..start + len].to_vec())
    }

    /// Read one chunk into the buffer. Returns 0 when the peer has closed.
    async fn fill(&mut self) -> Result<usize, RequestError> {
        let mut chunk = [0u8; READ_CHUNK];
        let read = self.stream.read(&mut chunk);
        let n = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| RequestError::RequestTimedOut)??,
            None => read.await?,
        };
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(n)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn content_length(headers: &Headers) -> Result<usize, RequestError> {
    match headers.get("Content-Length") {
        None => Ok(0),
        Some(value) => value.trim().parse().map_err(|_| {
            RequestError::IncorrectRequestSyntax(format!("invalid Content-Length {value:?}"))
        }),
    }
}

/// Split a request line into method, path and optional version.
///
/// The line is split on whitespace into at most three tokens; the third keeps
/// whatever text remains.
pub fn parse_request_line(line: &str) -> Result<(String, String, Option<String>), RequestError> {
    let mut tokens: Vec<&str> = Vec::with_capacity(3);
    let mut rest = line.trim();
    while !rest.is_empty() && tokens.len() < 2 {
        match rest.find(char::is_whitespace) {
            Some(i) => {
                tokens.push(&rest[..i]);
                rest = rest[i..].trim_start();
            }
            None => {
                tokens.push(rest);
                rest = "";
            }
        }
    }

    match tokens[..] {
        [method, path] => Ok((
            method.to_string(),
            path.to_string(),
            (!rest.is_empty()).then(|| rest.to_string()),
        )),
        _ => Err(RequestError::IncorrectRequestSyntax(format!(
            "bad request line {line:?}"
        ))),
    }
}
