//! Error types for the mount lifecycle.

use thiserror::Error;

/// Errors surfaced by the management surface (`mount`/`unmount`).
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The slot table has no free entry.
    #[error("mount table full ({0} slots)")]
    CapacityExhausted(usize),

    /// The driver refused to establish the mount.
    #[error("mount failed: {0}")]
    MountFailed(String),

    /// The platform unmount primitive reported an error; the mount is
    /// still live.
    #[error("unmount failed: {0}")]
    UnmountFailed(String),

    /// Spawning the worker thread failed.
    #[error("worker spawn failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by a [`FuseDriver`](crate::FuseDriver) implementation.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The mount could not be established (bad path, permission denied,
    /// already mounted).
    #[error("mount refused: {0}")]
    MountRefused(String),

    /// The dispatch loop terminated abnormally after mounting.
    #[error("mount loop terminated: {0}")]
    Terminated(String),

    /// An I/O error from the platform mount/unmount primitives.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_error_display() {
        let err = BridgeError::CapacityExhausted(1024);
        assert!(err.to_string().contains("1024"));

        let err = BridgeError::MountFailed("permission denied".to_string());
        assert!(err.to_string().contains("mount failed"));
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn test_driver_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no mountpoint");
        let err: DriverError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }
}
