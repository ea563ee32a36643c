//! Unix socket server.
//!
//! Requests are handled strictly one at a time: a capture runs to completion
//! before the next connection is accepted.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

use super::protocol::{Command, Reply, MAX_COMMAND_LEN};
use crate::pipeline::CaptureHandler;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Unable to bind control socket {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unable to restrict permissions of {path}: {source}")]
    Permissions {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Accept failed: {0}")]
    Accept(#[source] io::Error),
}

pub struct CaptureService<H> {
    listener: UnixListener,
    path: PathBuf,
    handler: Arc<H>,
}

impl<H: CaptureHandler> CaptureService<H> {
    /// Bind the control socket, replacing a stale one, owner-only.
    pub fn bind(path: impl Into<PathBuf>, handler: H) -> Result<Self, ServiceError> {
        use std::os::unix::fs::PermissionsExt;

        let path = path.into();
        remove_socket(&path);

        let listener = UnixListener::bind(&path).map_err(|source| ServiceError::Bind {
            path: path.clone(),
            source,
        })?;

        if let Err(source) = std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
        {
            remove_socket(&path);
            return Err(ServiceError::Permissions { path, source });
        }

        info!(path = %path.display(), "Capture service listening");

        Ok(Self {
            listener,
            path,
            handler: Arc::new(handler),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.path
    }

    /// Serve requests until `shutdown` resolves or accepting fails.
    ///
    /// The socket file is removed on the way out either way.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ServiceError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Capture service shutting down");
                    break Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _addr)) => self.handle(stream).await,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                        debug!("Accept interrupted, retrying");
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                        break Err(ServiceError::Accept(e));
                    }
                },
            }
        };

        remove_socket(&self.path);
        result
    }

    async fn handle(&self, mut stream: UnixStream) {
        let mut buf = [0u8; MAX_COMMAND_LEN];
        let len = loop {
            match stream.read(&mut buf).await {
                Ok(len) => break len,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!(error = %e, "Failed to read request");
                    return;
                }
            }
        };

        let reply = match Command::parse(&buf[..len]) {
            Command::Grab => self.grab().await,
            Command::Unsupported => {
                debug!(request = %String::from_utf8_lossy(&buf[..len]).trim(), "Unsupported command");
                Reply::Unsupported
            }
        };

        if let Err(e) = stream.write_all(reply.as_bytes()).await {
            warn!(error = %e, "Failed to send reply");
            return;
        }
        if let Err(e) = stream.shutdown().await {
            debug!(error = %e, "Failed to close connection");
        }
    }

    async fn grab(&self) -> Reply {
        let handler = Arc::clone(&self.handler);
        match tokio::task::spawn_blocking(move || handler.capture()).await {
            Ok(Ok(report)) => {
                debug!(
                    path = %report.destination.display(),
                    width = report.output.0,
                    height = report.output.1,
                    "Grab completed"
                );
                Reply::Ok
            }
            Ok(Err(e)) => {
                error!(error = %e, "Grab failed");
                Reply::GrabFailed
            }
            Err(e) => {
                error!(error = %e, "Capture task did not complete");
                Reply::GrabFailed
            }
        }
    }
}

/// Remove a socket file. A missing file is fine; other failures are logged.
fn remove_socket(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Removed socket");
            true
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not remove socket");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_socket_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kmsgrab.sock");
        std::fs::write(&path, b"").unwrap();

        assert!(remove_socket(&path));
        assert!(!path.exists());
    }

    #[test]
    fn test_remove_socket_missing_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!remove_socket(&dir.path().join("absent.sock")));
    }

    #[test]
    fn test_remove_socket_failure_is_reported() {
        // a directory cannot be removed with remove_file
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taken");
        std::fs::create_dir(&path).unwrap();

        assert!(!remove_socket(&path));
        assert!(path.is_dir());
    }
}
