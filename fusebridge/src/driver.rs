//! Interface to the native filesystem-callback library.
//!
//! The library itself is a black box behind [`FuseDriver`]: something that,
//! given a mount session, installs native hooks for the kinds in the
//! session's hook mask, runs a blocking dispatch loop on the calling thread,
//! and issues every hook invocation through the session's
//! [`CallGateway`](crate::CallGateway). The bridge never links the library
//! directly; production code supplies an FFI-backed implementation, tests a
//! scripted one.

use std::path::{Path, PathBuf};

use crate::error::DriverError;
use crate::op::OpSet;
use crate::worker::CallGateway;

/// The foreign dispatch loop and platform (un)mount primitives.
///
/// Contract for `run`:
/// - it is invoked on a dedicated worker thread and owns that thread until
///   it returns;
/// - it must issue `Operation::Init` through the gateway once the mount is
///   operational (the `Init` hook is always present in the mask);
/// - hooks are invoked strictly sequentially: the loop must not issue a
///   second call before the first one's reply is returned;
/// - it returns `Ok(())` after the mount has been detached, `Err` if the
///   mount could not be established.
///
/// `unmount` is the platform primitive that detaches a mountpoint and
/// thereby makes the corresponding `run` loop wind down and return. It is
/// called from a blocking-friendly context, never from the control thread's
/// scheduler directly.
pub trait FuseDriver: Send + Sync + 'static {
    fn run(&self, session: WorkerSession) -> Result<(), DriverError>;

    fn unmount(&self, mountpoint: &Path) -> Result<(), DriverError>;
}

/// Everything a driver needs to serve one mount.
pub struct WorkerSession {
    mountpoint: PathBuf,
    mntopts: String,
    hooks: OpSet,
    gateway: CallGateway,
}

impl WorkerSession {
    pub(crate) fn new(
        mountpoint: PathBuf,
        mntopts: String,
        hooks: OpSet,
        gateway: CallGateway,
    ) -> Self {
        Self {
            mountpoint,
            mntopts,
            hooks,
            gateway,
        }
    }

    pub fn mountpoint(&self) -> &Path {
        &self.mountpoint
    }

    /// The formatted mount option string, empty when no options were given.
    pub fn mntopts(&self) -> &str {
        &self.mntopts
    }

    /// Kinds the driver should install native hooks for.
    pub fn hooks(&self) -> OpSet {
        self.hooks
    }

    pub fn gateway(&self) -> &CallGateway {
        &self.gateway
    }
}

/// Formats mount options as the single `-o`-prefixed, comma-joined argv
/// token the native library expects. No options yields an empty string, to
/// be dropped from the argument vector entirely.
pub fn format_options<S: AsRef<str>>(options: &[S]) -> String {
    if options.is_empty() {
        return String::new();
    }
    let joined: Vec<&str> = options.iter().map(AsRef::as_ref).collect();
    format!("-o{}", joined.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_options_empty() {
        assert_eq!(format_options::<&str>(&[]), "");
    }

    #[test]
    fn test_format_options_single() {
        assert_eq!(format_options(&["allow_other"]), "-oallow_other");
    }

    #[test]
    fn test_format_options_joined_with_commas() {
        assert_eq!(
            format_options(&["allow_other", "default_permissions", "ro"]),
            "-oallow_other,default_permissions,ro"
        );
    }
}
