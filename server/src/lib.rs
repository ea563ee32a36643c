//! kmsgrab
//!
//! Screenshots straight from the kernel display pipeline (KMS/DRM), without a
//! display server. Usable as a one-shot tool or as a capture service driven
//! over a local socket.

pub mod capture;
pub mod config;
pub mod encode;
pub mod observability;
pub mod pipeline;
pub mod privilege;
pub mod service;
