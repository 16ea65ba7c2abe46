use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::http::response::ResponseHead;

/// Chunk size for streamed file bodies.
const BUFFER_SIZE: usize = 8192;

fn serialize_head(head: &ResponseHead) -> Vec<u8> {
    let mut buf = Vec::new();

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        head.version,
        head.status.as_u16(),
        head.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    // Headers
    for (k, v) in &head.headers {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    buf
}

/// Writes response heads and bodies to the client socket.
///
/// Borrowed per response. Head, body chunks and completion go out strictly
/// in that order; `finish` flushes so a following close never truncates
/// the response.
pub struct ResponseWriter<'a, W> {
    stream: &'a mut W,
}

impl<'a, W: AsyncWrite + Unpin> ResponseWriter<'a, W> {
    pub fn new(stream: &'a mut W) -> Self {
        Self { stream }
    }

    pub async fn write_head(&mut self, head: &ResponseHead) -> anyhow::Result<()> {
        self.stream.write_all(&serialize_head(head)).await?;
        Ok(())
    }

    pub async fn write_body(&mut self, chunk: &[u8]) -> anyhow::Result<()> {
        self.stream.write_all(chunk).await?;
        Ok(())
    }

    /// Streams `length` bytes of `file` as the response body.
    ///
    /// Stops early if the file yields fewer bytes than the declared
    /// length; the caller treats the write settling as response-body
    /// completion either way.
    pub async fn stream_file(&mut self, file: &mut File, length: u64) -> anyhow::Result<u64> {
        let mut buf = [0u8; BUFFER_SIZE];
        let mut written: u64 = 0;

        while written < length {
            let want = ((length - written) as usize).min(BUFFER_SIZE);
            let n = file.read(&mut buf[..want]).await?;

            if n == 0 {
                break;
            }

            self.stream.write_all(&buf[..n]).await?;
            written += n as u64;
        }

        Ok(written)
    }

    /// Marks the end of a response and flushes buffered bytes to the peer.
    pub async fn finish(&mut self) -> anyhow::Result<()> {
        self.stream.flush().await?;
        Ok(())
    }
}
