use std::fmt;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::config::StaticFilesConfig;
use crate::files::resolver::{self, Resolution};
use crate::files::streamer;
use crate::http::parser::{RequestDecoder, RequestEvent};
use crate::http::request::{RequestHead, Version};
use crate::http::response::{ResponseHead, StatusCode};
use crate::http::writer::ResponseWriter;

/// Lifecycle states of one connection.
///
/// Transitions only in the fixed cycle
/// Idle → ReceivingBody → SendingResponse → Idle. Anything else means the
/// framing layer delivered events out of protocol order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Between requests, waiting for a request head.
    Idle,
    /// Head received, draining the (ignored) request body.
    ReceivingBody,
    /// Body drained, response being written.
    SendingResponse,
}

/// A framing event arrived in a state that cannot accept it.
///
/// Unrecoverable for the connection, never for the process: the caller
/// answers with a best-effort 500 and closes.
#[derive(Debug)]
pub enum ProtocolError {
    OutOfOrder {
        event: &'static str,
        state: ConnectionState,
    },
    MissingRequest,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::OutOfOrder { event, state } => {
                write!(f, "event {event} not valid in state {state:?}")
            }
            ProtocolError::MissingRequest => {
                write!(f, "request completed with no request head bound")
            }
        }
    }
}

impl std::error::Error for ProtocolError {}

/// The per-connection state machine, with transition functions that
/// return a typed error instead of panicking on misuse.
#[derive(Debug)]
pub struct StateMachine {
    state: ConnectionState,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Idle,
        }
    }

    pub fn current(&self) -> ConnectionState {
        self.state
    }

    /// Idle → ReceivingBody, on request head.
    pub fn request_received(&mut self) -> Result<(), ProtocolError> {
        self.transition(ConnectionState::Idle, ConnectionState::ReceivingBody, "request-head")
    }

    /// Valid only while ReceivingBody; the chunk itself is discarded.
    pub fn body_received(&self) -> Result<(), ProtocolError> {
        if self.state != ConnectionState::ReceivingBody {
            return Err(ProtocolError::OutOfOrder {
                event: "request-body",
                state: self.state,
            });
        }
        Ok(())
    }

    /// ReceivingBody → SendingResponse, on request end.
    pub fn request_complete(&mut self) -> Result<(), ProtocolError> {
        self.transition(
            ConnectionState::ReceivingBody,
            ConnectionState::SendingResponse,
            "request-end",
        )
    }

    /// SendingResponse → Idle, after the response settled.
    pub fn response_complete(&mut self) -> Result<(), ProtocolError> {
        self.transition(
            ConnectionState::SendingResponse,
            ConnectionState::Idle,
            "response-complete",
        )
    }

    fn transition(
        &mut self,
        from: ConnectionState,
        to: ConnectionState,
        event: &'static str,
    ) -> Result<(), ProtocolError> {
        if self.state != from {
            return Err(ProtocolError::OutOfOrder {
                event,
                state: self.state,
            });
        }
        self.state = to;
        Ok(())
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-request context, created on request-head and cleared on response
/// completion. Carries everything the response needs so no control flow
/// hides in captured closures.
struct PendingRequest {
    head: RequestHead,
    keep_alive: bool,
    resolution: Resolution,
}

/// One accepted client connection.
///
/// Owns the socket, the framing decoder and the state machine, and runs
/// the request/response cycle until the connection closes.
pub struct Connection {
    stream: TcpStream,
    decoder: RequestDecoder,
    machine: StateMachine,
    pending: Option<PendingRequest>,
    config: StaticFilesConfig,
    force_close: bool,
}

impl Connection {
    pub fn new(stream: TcpStream, config: StaticFilesConfig) -> Self {
        Self {
            stream,
            decoder: RequestDecoder::new(),
            machine: StateMachine::new(),
            pending: None,
            config,
            force_close: false,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            let event = match self.next_event().await? {
                Some(event) => event,
                None => {
                    // Peer half-closed.
                    match self.machine.current() {
                        ConnectionState::Idle | ConnectionState::ReceivingBody => {
                            debug!("peer closed, no response worth finishing");
                        }
                        ConnectionState::SendingResponse => {
                            // No write is in flight between loop
                            // iterations, so the response has already
                            // settled; closing now is closing after it.
                            self.force_close = true;
                        }
                    }
                    break;
                }
            };

            match event {
                RequestEvent::Head(head) => self.on_request_head(head).await?,
                RequestEvent::BodyChunk(chunk) => self.on_request_body(chunk).await?,
                RequestEvent::End => {
                    let keep_alive = self.on_request_end().await?;
                    if !keep_alive {
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Reads framing events, refilling the decoder from the socket as
    /// needed. `Ok(None)` means the peer half-closed.
    async fn next_event(&mut self) -> anyhow::Result<Option<RequestEvent>> {
        loop {
            match self.decoder.next_event() {
                Ok(Some(event)) => return Ok(Some(event)),
                Ok(None) => {}
                Err(e) => return Err(anyhow::anyhow!("HTTP parse error: {e}")),
            }

            let n = self.stream.read_buf(self.decoder.buffer_mut()).await?;

            if n == 0 {
                return Ok(None);
            }
        }
    }

    async fn on_request_head(&mut self, head: RequestHead) -> anyhow::Result<()> {
        if let Err(e) = self.machine.request_received() {
            return Err(self.protocol_failure(e).await);
        }

        let keep_alive = head.keep_alive();

        // Resolution starts now, before the body is drained. The body is
        // never needed, but its chunks still have to be consumed to keep
        // the framing aligned.
        let resolution = resolver::resolve(&head.uri, &self.config.root, self.config.spa).await;

        self.pending = Some(PendingRequest {
            head,
            keep_alive,
            resolution,
        });

        Ok(())
    }

    async fn on_request_body(&mut self, _chunk: Bytes) -> anyhow::Result<()> {
        if let Err(e) = self.machine.body_received() {
            return Err(self.protocol_failure(e).await);
        }

        // Chunks are discarded; this server never inspects request bodies.
        Ok(())
    }

    /// Emits the response for the pending request. Returns the keep-alive
    /// decision: `false` means the caller must stop and let the
    /// connection close.
    async fn on_request_end(&mut self) -> anyhow::Result<bool> {
        if let Err(e) = self.machine.request_complete() {
            return Err(self.protocol_failure(e).await);
        }

        let Some(pending) = self.pending.take() else {
            return Err(self.protocol_failure(ProtocolError::MissingRequest).await);
        };

        let outcome = streamer::serve(&mut self.stream, &pending.head, &pending.resolution).await?;

        if let Err(e) = self.machine.response_complete() {
            return Err(self.protocol_failure(e).await);
        }

        info!(
            method = ?pending.head.method,
            uri = %pending.head.uri,
            status = outcome.status().as_u16(),
            "request served"
        );

        let keep_alive = pending.keep_alive && outcome.allows_keep_alive() && !self.force_close;

        if !keep_alive {
            // Flush-then-close so the close never truncates the response.
            self.stream.shutdown().await.ok();
        }

        Ok(keep_alive)
    }

    /// Answers a protocol-order violation with a best-effort 500, closes
    /// the stream, and hands the error back for the accept loop to log.
    async fn protocol_failure(&mut self, err: ProtocolError) -> anyhow::Error {
        warn!(error = %err, "protocol order violated, closing connection");

        let body = "500 Internal Server Error\r\n";
        let head = ResponseHead::new(Version::HTTP_11, StatusCode::InternalServerError)
            .header("Content-Length", body.len().to_string())
            .header("Content-Type", "text/plain; charset=utf-8")
            .header("Connection", "close");

        let mut writer = ResponseWriter::new(&mut self.stream);
        let _ = writer.write_head(&head).await;
        let _ = writer.write_body(body.as_bytes()).await;
        let _ = writer.finish().await;
        let _ = self.stream.shutdown().await;

        anyhow::Error::new(err)
    }
}
