use std::collections::HashMap;
use std::fmt;

use bytes::{Bytes, BytesMut};

use crate::http::request::{Method, RequestHead, Version};

/// Upper bound on buffered head bytes before the request is rejected.
const MAX_HEAD_SIZE: usize = 64 * 1024;

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    InvalidRequest,
    InvalidMethod,
    InvalidVersion,
    InvalidHeader,
    InvalidContentLength,
    HeadTooLarge,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ParseError::InvalidRequest => "malformed request line",
            ParseError::InvalidMethod => "unknown request method",
            ParseError::InvalidVersion => "unparseable HTTP version",
            ParseError::InvalidHeader => "malformed header line",
            ParseError::InvalidContentLength => "unparseable Content-Length",
            ParseError::HeadTooLarge => "request head exceeds size limit",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for ParseError {}

/// One framing event, in the order the wire produced it.
///
/// A well-formed request always decodes to `Head`, zero or more
/// `BodyChunk`s, then `End`. The connection layer consumes these in
/// sequence and never sees raw bytes.
#[derive(Debug)]
pub enum RequestEvent {
    Head(RequestHead),
    BodyChunk(Bytes),
    End,
}

#[derive(Clone, Copy)]
enum DecodeState {
    Head,
    Body { remaining: usize },
}

/// Incremental HTTP/1.x request decoder.
///
/// Bytes go in via `buffer_mut`, framing events come out of `next_event`.
/// Bytes belonging to pipelined follow-up requests stay buffered until the
/// current request's events have been drained.
pub struct RequestDecoder {
    buffer: BytesMut,
    state: DecodeState,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            state: DecodeState::Head,
        }
    }

    /// The read buffer; the connection appends socket bytes here.
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Try to produce the next framing event from buffered bytes.
    ///
    /// `Ok(None)` means more data is needed.
    pub fn next_event(&mut self) -> Result<Option<RequestEvent>, ParseError> {
        match self.state {
            DecodeState::Head => {
                let Some(headers_end) = find_headers_end(&self.buffer) else {
                    if self.buffer.len() > MAX_HEAD_SIZE {
                        return Err(ParseError::HeadTooLarge);
                    }
                    return Ok(None);
                };

                let head_bytes = self.buffer.split_to(headers_end + 4);
                let head = parse_request_head(&head_bytes[..headers_end])?;

                let remaining = match head.header("Content-Length") {
                    Some(v) => v.parse().map_err(|_| ParseError::InvalidContentLength)?,
                    None => 0,
                };
                self.state = DecodeState::Body { remaining };

                Ok(Some(RequestEvent::Head(head)))
            }

            DecodeState::Body { remaining } => {
                if remaining == 0 {
                    self.state = DecodeState::Head;
                    return Ok(Some(RequestEvent::End));
                }

                if self.buffer.is_empty() {
                    return Ok(None);
                }

                let take = remaining.min(self.buffer.len());
                let chunk = self.buffer.split_to(take).freeze();
                self.state = DecodeState::Body {
                    remaining: remaining - take,
                };

                Ok(Some(RequestEvent::BodyChunk(chunk)))
            }
        }
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses a request head (request line + headers, no trailing CRLFCRLF).
pub fn parse_request_head(buf: &[u8]) -> Result<RequestHead, ParseError> {
    let headers_str = std::str::from_utf8(buf).map_err(|_| ParseError::InvalidRequest)?;

    let mut lines = headers_str.split("\r\n");

    // Request line
    let request_line = lines.next().ok_or(ParseError::InvalidRequest)?;
    let mut parts = request_line.split_whitespace();

    let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    let uri = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version_str = parts.next().ok_or(ParseError::InvalidRequest)?;

    let method = Method::from_str(method_str).ok_or(ParseError::InvalidMethod)?;
    let version = Version::parse(version_str).ok_or(ParseError::InvalidVersion)?;

    // Headers
    let mut headers = HashMap::new();

    for line in lines {
        if line.is_empty() {
            continue;
        }

        let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;

        headers.insert(key.trim().to_string(), value.trim().to_string());
    }

    Ok(RequestHead {
        method,
        uri: uri.to_string(),
        version,
        headers,
    })
}

fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}
