//! Response streaming for resolved targets
//!
//! Opens the resolved file without blocking the reactor, emits a response
//! head sized to the file, streams the content, and maps filesystem
//! failures to HTTP error responses.

use std::io;

use tokio::fs::File;
use tokio::net::TcpStream;
use tracing::debug;

use crate::files::resolver::{Resolution, ResolvedTarget};
use crate::http::request::RequestHead;
use crate::http::response::{ResponseHead, StatusCode};
use crate::http::writer::ResponseWriter;

/// Byte region of a file streamed as a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRegion {
    pub offset: u64,
    pub length: u64,
}

/// What a serve attempt put on the wire.
///
/// Drives the connection fate: only a served file leaves the connection
/// eligible for keep-alive, every error response is followed by a close.
#[derive(Debug)]
pub enum ResponseOutcome {
    /// 200 with the file region as body.
    Served(FileRegion),
    /// 403 for a traversal attempt.
    Forbidden,
    /// 404, target missing.
    NotFound(String),
    /// 404 with detail, open failed for a reason other than not-found.
    IoError(String),
    /// 500, non-I/O failure after open.
    Internal(String),
}

impl ResponseOutcome {
    pub fn allows_keep_alive(&self) -> bool {
        matches!(self, ResponseOutcome::Served(_))
    }

    /// The status code this outcome put on the wire.
    pub fn status(&self) -> StatusCode {
        match self {
            ResponseOutcome::Served(_) => StatusCode::Ok,
            ResponseOutcome::Forbidden => StatusCode::Forbidden,
            ResponseOutcome::NotFound(_) | ResponseOutcome::IoError(_) => StatusCode::NotFound,
            ResponseOutcome::Internal(_) => StatusCode::InternalServerError,
        }
    }
}

/// Serves one resolved request, writing the complete response (head, body,
/// flush) to `stream`.
///
/// An `Err` return means the transport failed mid-response; the caller can
/// only close. An `Ok` outcome always corresponds to a well-formed
/// response on the wire.
pub async fn serve(
    stream: &mut TcpStream,
    request: &RequestHead,
    resolution: &Resolution,
) -> anyhow::Result<ResponseOutcome> {
    match resolution {
        Resolution::Forbidden => {
            write_error(stream, request, StatusCode::Forbidden, "403 Forbidden\r\n").await?;
            Ok(ResponseOutcome::Forbidden)
        }

        Resolution::NotFound => {
            write_error(stream, request, StatusCode::NotFound, "404 Not Found\r\n").await?;
            Ok(ResponseOutcome::NotFound("no such file".to_string()))
        }

        Resolution::Target(target) => stream_target(stream, request, target).await,
    }
}

async fn stream_target(
    stream: &mut TcpStream,
    request: &RequestHead,
    target: &ResolvedTarget,
) -> anyhow::Result<ResponseOutcome> {
    let mut file = match File::open(&target.path).await {
        Ok(file) => file,

        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let body = format!("404 Not Found\r\n{e}\r\n");
            write_error(stream, request, StatusCode::NotFound, &body).await?;
            return Ok(ResponseOutcome::NotFound(e.to_string()));
        }

        // Open failures other than not-found still answer 404; the error
        // detail lands in the diagnostic body.
        Err(e) => {
            let body = format!("404 Not Found\r\nio error: {e}\r\n");
            write_error(stream, request, StatusCode::NotFound, &body).await?;
            return Ok(ResponseOutcome::IoError(e.to_string()));
        }
    };

    let length = match file.metadata().await {
        Ok(meta) => meta.len(),
        Err(e) => {
            let body = format!("500 Internal Server Error\r\n{e}\r\n");
            write_error(stream, request, StatusCode::InternalServerError, &body).await?;
            return Ok(ResponseOutcome::Internal(e.to_string()));
        }
    };

    let region = FileRegion { offset: 0, length };

    let head = ResponseHead::for_request(request, StatusCode::Ok)
        .header("Content-Length", length.to_string())
        .header("Content-Type", target.media_type);

    let mut writer = ResponseWriter::new(stream);
    writer.write_head(&head).await?;
    writer.stream_file(&mut file, region.length).await?;
    writer.finish().await?;

    debug!(path = %target.path.display(), bytes = region.length, "served file");

    // `file` drops here, and on every early return and `?` above.
    Ok(ResponseOutcome::Served(region))
}

async fn write_error(
    stream: &mut TcpStream,
    request: &RequestHead,
    status: StatusCode,
    body: &str,
) -> anyhow::Result<()> {
    let head = ResponseHead::for_request(request, status)
        .header("Content-Length", body.len().to_string())
        .header("Content-Type", "text/plain; charset=utf-8");

    let mut writer = ResponseWriter::new(stream);
    writer.write_head(&head).await?;
    writer.write_body(body.as_bytes()).await?;
    writer.finish().await?;

    Ok(())
}
