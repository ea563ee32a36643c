//! Control Protocol
//!
//! One ASCII command per connection, one reply line back.

/// Largest command read from a connection; anything beyond is ignored.
pub const MAX_COMMAND_LEN: usize = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Grab,
    Unsupported,
}

impl Command {
    /// Parse a raw request. Surrounding whitespace is ignored and matching is
    /// exact, so `grab` or `GRAB now` are unsupported.
    pub fn parse(request: &[u8]) -> Self {
        match request.trim_ascii() {
            b"GRAB" => Self::Grab,
            _ => Self::Unsupported,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Ok,
    GrabFailed,
    Unsupported,
}

impl Reply {
    pub const fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::Ok => b"OK\n",
            Self::GrabFailed => b"ERR grab failed\n",
            Self::Unsupported => b"ERR unsupported command\n",
        }
    }
}
