//! Request URI to filesystem path resolution
//!
//! Pure decision logic: given the request URI and the SPA flag, compute
//! which file under the root to serve and the Content-Type to declare.
//! Holds no state; safe to call concurrently from any number of
//! connection tasks.

use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

use crate::http::mime;

/// Result of resolving a request URI against the server root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Serve this file.
    Target(ResolvedTarget),
    /// Path traversal attempt, answer 403.
    Forbidden,
    /// Nothing to serve (non-SPA miss), answer 404.
    NotFound,
}

/// Absolute serving target, computed once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Filesystem path to stream.
    pub path: PathBuf,
    /// Declared Content-Type, from the final path's extension.
    pub media_type: &'static str,
}

/// Resolves `uri` to a file under `root`.
///
/// Steps, in order:
/// 1. Reject any URI containing `..`, checked textually on the raw URI
///    before percent-decoding.
/// 2. Percent-decode and join onto the root.
/// 3. Stat; a directory gets `index.html` appended.
/// 4. In SPA mode, HTML-like or missing targets are replaced wholesale
///    with the root `index.html`. The rule runs after the directory
///    append, so a request for `/` (directory, then `index.html`) is
///    still eligible, and existing non-HTML assets are served as-is.
/// 5. Outside SPA mode a missing target is `NotFound`.
///
/// The stat goes through `tokio::fs`, so resolution never blocks a
/// reactor thread.
pub async fn resolve(uri: &str, root: &Path, spa: bool) -> Resolution {
    if uri.contains("..") {
        return Resolution::Forbidden;
    }

    let decoded = percent_decode_str(uri).decode_utf8_lossy();
    let mut path = root.join(decoded.trim_start_matches('/'));

    let meta = tokio::fs::metadata(&path).await;
    let exists = meta.is_ok();
    let is_dir = meta.map(|m| m.is_dir()).unwrap_or(false);

    if !spa && !exists {
        return Resolution::NotFound;
    }

    if is_dir {
        path.push("index.html");
    }

    if spa && (path.to_string_lossy().ends_with(".html") || !exists) {
        path = root.join("index.html");
    }

    let media_type = mime::from_path(&path);

    Resolution::Target(ResolvedTarget { path, media_type })
}
