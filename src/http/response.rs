use std::collections::HashMap;

use crate::http::request::{RequestHead, Version};

/// HTTP status codes this server produces.
///
/// - `Ok` (200): File served
/// - `Forbidden` (403): Path traversal attempt detected
/// - `NotFound` (404): Resolved file missing or open failure
/// - `InternalServerError` (500): Unexpected server error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 500 Internal Server Error
    InternalServerError,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use static_server::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::InternalServerError => 500,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }
}

/// Head of an outbound HTTP response: status line plus headers.
///
/// The body is not part of this type. File bodies are streamed behind the
/// head by the writer, error diagnostics are written as a single chunk.
#[derive(Debug)]
pub struct ResponseHead {
    /// Version echoed from the request
    pub version: Version,
    /// The HTTP status code
    pub status: StatusCode,
    /// Response headers as key-value pairs
    pub headers: HashMap<String, String>,
}

impl ResponseHead {
    /// A bare head with no headers set.
    pub fn new(version: Version, status: StatusCode) -> Self {
        Self {
            version,
            status,
            headers: HashMap::new(),
        }
    }

    /// Builds a response head for the given request, mirroring the
    /// request's keep-alive expectation where HTTP/1.x leaves the default
    /// ambiguous.
    ///
    /// With no caller-set `Connection` header:
    /// - HTTP/1.0 request with explicit keep-alive gets
    ///   `Connection: keep-alive` back,
    /// - HTTP/1.1+ request with explicit close gets `Connection: close`
    ///   back,
    /// - everything else is left unset so the protocol's native default
    ///   applies (1.0 = close, 1.1 = keep-alive).
    pub fn for_request(request: &RequestHead, status: StatusCode) -> Self {
        let mut head = Self {
            version: request.version,
            status,
            headers: HashMap::new(),
        };

        match (request.keep_alive(), request.version.major, request.version.minor) {
            (true, 1, 0) => {
                head.headers
                    .insert("Connection".to_string(), "keep-alive".to_string());
            }
            (false, 1, minor) if minor >= 1 => {
                head.headers
                    .insert("Connection".to_string(), "close".to_string());
            }
            _ => {}
        }

        head
    }

    /// Adds or replaces a header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}
