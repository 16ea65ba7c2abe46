//! HTTP protocol implementation.
//!
//! This module implements an HTTP/1.x server with support for keep-alive connections.
//!
//! # Architecture
//!
//! The HTTP layer is organized into several submodules:
//!
//! - **`connection`**: The main connection handler implementing the request-response state machine
//! - **`parser`**: Incremental decoder turning raw bytes into framing events (head, body chunk, end)
//! - **`request`**: HTTP request-head representation and keep-alive derivation
//! - **`response`**: HTTP response-head representation with request-aware defaults
//! - **`writer`**: Serializes response heads and streams bodies to the client
//! - **`mime`**: MIME type detection based on file extensions
//!
//! # Connection State Machine
//!
//! Each client connection goes through a fixed cycle:
//!
//! ```text
//!        ┌─────────────┐
//!        │    Idle     │ ← Wait for a request head
//!        └──────┬──────┘
//!               │ Head received
//!               ▼
//!        ┌──────────────────┐
//!        │  ReceivingBody   │ ← Drain (and discard) the request body
//!        └──────┬───────────┘
//!               │ Request end
//!               ▼
//!        ┌──────────────────┐
//!        │ SendingResponse  │ ← Stream the resolved file (or error)
//!        └──────┬───────────┘
//!               │ Response complete
//!               ├─ Keep-Alive → Idle (same connection)
//!               └─ Close → connection ends
//! ```
//!
//! Any event outside this cycle is a protocol-order violation: the
//! connection is answered with a 500 and closed, never silently continued.
//!
//! # Example
//!
//! ```ignore
//! use static_server::config::StaticFilesConfig;
//! use static_server::http::connection::Connection;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let listener = TcpListener::bind("127.0.0.1:8888").await?;
//!     let config = StaticFilesConfig::default();
//!
//!     loop {
//!         let (socket, _addr) = listener.accept().await?;
//!         let config = config.clone();
//!         tokio::spawn(async move {
//!             let mut conn = Connection::new(socket, config);
//!             if let Err(e) = conn.run().await {
//!                 eprintln!("Connection error: {}", e);
//!             }
//!         });
//!     }
//! }
//! ```

pub mod connection;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
