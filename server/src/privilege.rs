//! Privilege Policy
//!
//! Device access usually needs elevated rights while the output file should
//! belong to the invoking user. The pipeline asks its policy for a
//! `WriteScope` around the file write; dropping the scope restores the
//! previous effective identity so the next capture can reopen the device.

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PrivilegeError {
    #[error("Unable to switch effective uid to {uid}: {source}")]
    SetEuid {
        uid: u32,
        #[source]
        source: std::io::Error,
    },
}

/// Hook run around writing the output file.
pub trait PrivilegePolicy: Send + Sync {
    fn enter_write_scope(&self) -> Result<WriteScope, PrivilegeError>;
}

/// Active until dropped; restores the effective uid if it was changed.
#[derive(Debug)]
#[must_use = "privileges are restored as soon as the scope is dropped"]
pub struct WriteScope {
    restore_euid: Option<libc::uid_t>,
}

impl WriteScope {
    pub const fn unchanged() -> Self {
        Self { restore_euid: None }
    }
}

impl Drop for WriteScope {
    fn drop(&mut self) {
        if let Some(euid) = self.restore_euid.take() {
            if let Err(e) = set_euid(euid) {
                warn!(euid, error = %e, "Failed to restore effective uid");
            } else {
                debug!(euid, "Restored effective uid");
            }
        }
    }
}

/// Writes with whatever identity the process already has.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepPrivileges;

impl PrivilegePolicy for KeepPrivileges {
    fn enter_write_scope(&self) -> Result<WriteScope, PrivilegeError> {
        Ok(WriteScope::unchanged())
    }
}

/// Writes as the real (invoking) user of a setuid process.
#[derive(Debug, Clone, Copy, Default)]
pub struct DropToRealUser;

impl PrivilegePolicy for DropToRealUser {
    fn enter_write_scope(&self) -> Result<WriteScope, PrivilegeError> {
        let (uid, euid) = current_ids();
        if uid == euid {
            return Ok(WriteScope::unchanged());
        }

        set_euid(uid).map_err(|source| PrivilegeError::SetEuid { uid, source })?;
        debug!(uid, euid, "Dropped effective uid for writing");

        Ok(WriteScope {
            restore_euid: Some(euid),
        })
    }
}

#[allow(unsafe_code)]
fn current_ids() -> (libc::uid_t, libc::uid_t) {
    // SAFETY: getuid/geteuid cannot fail and touch no memory.
    unsafe { (libc::getuid(), libc::geteuid()) }
}

#[allow(unsafe_code)]
fn set_euid(uid: libc::uid_t) -> std::io::Result<()> {
    // SAFETY: plain syscall wrapper with no pointer arguments.
    if unsafe { libc::seteuid(uid) } == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}
