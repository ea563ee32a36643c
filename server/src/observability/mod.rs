//! Observability
//!
//! Structured logging to stderr. stdout stays free for scripted use.

pub mod tracing;

pub use self::tracing::{default_directives, init};
