//! Capture Service
//!
//! Long-running mode: captures on request over a local Unix socket.

pub mod protocol;
pub mod server;

pub use protocol::{Command, Reply, MAX_COMMAND_LEN};
pub use server::{CaptureService, ServiceError};
