//! Debug Adapter Protocol server for jsd scripts.
//!
//! A session reads framed requests from a byte stream, runs the launched script on
//! its own thread and blocks that thread at breakpoints and steps until the client
//! resumes it.
pub mod adapter;
pub mod breakpoints;
pub mod controller;
pub mod error;
pub mod executor;
pub mod handler;
pub mod handles;
pub mod inspect;
pub mod log;
pub mod protocol;
pub mod server;
pub mod transport;

pub use server::{ServerOptions, serve, start};

/// The only thread a session reports; the engine is single-threaded.
pub const THREAD_ID: i64 = 1;

pub(crate) type DynResult<T> = miette::Result<T, Box<dyn std::error::Error + Send + Sync>>;
