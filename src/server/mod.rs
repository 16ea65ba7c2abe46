//! Server lifecycle: socket binding and the accept loop.

pub mod listener;
