//! Static file serving
//!
//! This module implements the policy layer on top of the HTTP protocol
//! code: mapping request URIs to filesystem paths and streaming the
//! resolved files back as responses.

pub mod resolver;
pub mod streamer;

pub use resolver::{Resolution, ResolvedTarget};
pub use streamer::{FileRegion, ResponseOutcome};
