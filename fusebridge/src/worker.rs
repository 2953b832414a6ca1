//! The per-mount worker thread and its call gateway.
//!
//! The worker thread runs the driver's blocking dispatch loop. Every hook
//! invocation flows through [`CallGateway::call`]: populate the wake
//! message, signal the control thread, park on the instance's rendezvous
//! until the reply lands. The thread's last act is an exit notification so
//! the control thread can release the slot and join the handle.

use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::dispatch::Wake;
use crate::driver::{FuseDriver, WorkerSession};
use crate::handler::OpReply;
use crate::instance::CallerContext;
use crate::op::Operation;
use crate::rendezvous::SyncPair;

/// The worker-side entry point for issuing one synchronous call through the
/// bridge.
#[derive(Clone)]
pub struct CallGateway {
    slot: usize,
    pair: Arc<SyncPair>,
    wake_tx: mpsc::UnboundedSender<Wake>,
}

impl CallGateway {
    pub(crate) fn new(
        slot: usize,
        pair: Arc<SyncPair>,
        wake_tx: mpsc::UnboundedSender<Wake>,
    ) -> Self {
        Self {
            slot,
            pair,
            wake_tx,
        }
    }

    /// Issues one operation and blocks until the control thread replies.
    ///
    /// Must only be called from the worker thread owning this mount; calls
    /// on one instance are strictly serialized by construction. If the
    /// dispatch bridge is gone the call fails with `EIO` instead of
    /// parking forever.
    pub fn call(&self, ctx: CallerContext, op: Operation) -> OpReply {
        let kind = op.kind();
        let gate = self.pair.channel_for(kind);
        let wake = Wake::Call {
            slot: self.slot,
            ctx,
            op,
            pair: Arc::clone(&self.pair),
        };
        if self.wake_tx.send(wake).is_err() {
            warn!(slot = self.slot, op = %kind, "dispatch bridge unavailable");
            return OpReply::errno(libc::EIO);
        }
        gate.wait()
    }

    /// Announces that the dispatch loop has returned and the instance can
    /// be torn down.
    pub(crate) fn notify_exited(&self) {
        let _ = self.wake_tx.send(Wake::Exited { slot: self.slot });
    }
}

/// Body of the worker thread: run the driver loop, report a failed mount
/// through the dedicated error kind, and always announce exit.
pub(crate) fn run(driver: Arc<dyn FuseDriver>, session: WorkerSession) {
    let gateway = session.gateway().clone();
    let mountpoint = session.mountpoint().to_path_buf();

    debug!(path = %mountpoint.display(), "mount worker starting");
    match driver.run(session) {
        Ok(()) => {
            debug!(path = %mountpoint.display(), "mount loop exited");
        }
        Err(e) => {
            warn!(path = %mountpoint.display(), error = %e, "mount loop failed");
            let _ = gateway.call(
                CallerContext::default(),
                Operation::MountError {
                    message: e.to_string(),
                },
            );
        }
    }
    gateway.notify_exited();
}

/// Spawns the worker thread for one mount.
pub(crate) fn spawn(
    driver: Arc<dyn FuseDriver>,
    session: WorkerSession,
) -> std::io::Result<JoinHandle<()>> {
    let name = format!("fusebridge-worker-{}", session.gateway().slot);
    std::thread::Builder::new()
        .name(name)
        .spawn(move || run(driver, session))
}
