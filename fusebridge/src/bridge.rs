//! The management surface: mount, unmount, context query.
//!
//! A [`Bridge`] and its [`Dispatcher`] are created together and share the
//! slot table, the wake channel, and the driver. The bridge lives on the
//! control thread; the only things that ever cross to the worker threads
//! are the call gateways handed out at mount time.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::dispatch::{Dispatcher, Wake};
use crate::driver::{format_options, FuseDriver, WorkerSession};
use crate::error::BridgeError;
use crate::handler::HandlerTable;
use crate::instance::MountInstance;
use crate::op::OpKind;
use crate::slot::{self, SlotTable};
use crate::telemetry::{BridgeMetrics, MetricsSnapshot};
use crate::worker::{self, CallGateway};

/// Bridge construction parameters.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Maximum number of concurrently mounted instances.
    pub capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            capacity: slot::DEFAULT_CAPACITY,
        }
    }
}

/// State shared between the bridge and its dispatcher, owned by the
/// control thread.
pub(crate) struct Shared {
    pub(crate) table: RefCell<SlotTable>,
    pub(crate) wake_tx: mpsc::UnboundedSender<Wake>,
    pub(crate) driver: Arc<dyn FuseDriver>,
    pub(crate) metrics: Arc<BridgeMetrics>,
}

/// Handle for mounting and unmounting adapter instances.
///
/// Cheap to clone; all clones share one slot table and dispatcher. Not
/// `Send`: the bridge belongs to the control thread, like everything else
/// that touches handlers.
#[derive(Clone)]
pub struct Bridge {
    shared: Rc<Shared>,
}

impl Bridge {
    /// Creates a bridge with the default configuration. The returned
    /// dispatcher must be spawned on the control thread's `LocalSet` before
    /// the first mount:
    ///
    /// ```ignore
    /// let (bridge, dispatcher) = Bridge::new(driver);
    /// let shutdown = CancellationToken::new();
    /// local.spawn_local(dispatcher.run(shutdown.clone()));
    /// ```
    pub fn new(driver: Arc<dyn FuseDriver>) -> (Self, Dispatcher) {
        Self::with_config(driver, BridgeConfig::default())
    }

    pub fn with_config(driver: Arc<dyn FuseDriver>, config: BridgeConfig) -> (Self, Dispatcher) {
        let (wake_tx, wake_rx) = mpsc::unbounded_channel();
        let shared = Rc::new(Shared {
            table: RefCell::new(SlotTable::with_capacity(config.capacity)),
            wake_tx,
            driver,
            metrics: Arc::new(BridgeMetrics::new()),
        });
        let dispatcher = Dispatcher::new(Rc::clone(&shared), wake_rx);
        (Self { shared }, dispatcher)
    }

    /// Mounts an adapter instance at `mountpoint`.
    ///
    /// Allocates a slot (a full table fails here, synchronously), spawns
    /// the worker thread, and resolves once the driver's loop reports in:
    /// `Ok` when the first `init` arrives, `Err` when the driver refuses
    /// the mount. On failure the instance tears itself down; nothing
    /// lingers in the table.
    pub async fn mount(
        &self,
        mountpoint: impl Into<PathBuf>,
        options: Vec<String>,
        handlers: HandlerTable,
    ) -> Result<(), BridgeError> {
        let path = mountpoint.into();
        let (ready_tx, ready_rx) = oneshot::channel();

        let instance = self.shared.table.borrow_mut().allocate_with(|slot| {
            MountInstance::new(slot, path.clone(), options, handlers, ready_tx)
        })?;
        self.shared.metrics.mount_started();
        info!(
            slot = instance.slot(),
            path = %path.display(),
            hooks = instance.handlers().registered().len(),
            live = self.shared.table.borrow().live(),
            "mounting"
        );

        // Init is always hooked so readiness is observable even when the
        // embedder registered nothing.
        let hooks = instance.handlers().registered().with(OpKind::Init);
        let mntopts = format_options(instance.options());
        let gateway = CallGateway::new(
            instance.slot(),
            instance.pair(),
            self.shared.wake_tx.clone(),
        );
        let session = WorkerSession::new(path.clone(), mntopts, hooks, gateway);

        match worker::spawn(Arc::clone(&self.shared.driver), session) {
            Ok(handle) => instance.attach_worker(handle),
            Err(e) => {
                // The worker never existed; free the slot directly.
                self.shared.table.borrow_mut().release(instance.slot());
                self.shared.metrics.mount_released();
                warn!(path = %path.display(), error = %e, "worker spawn failed");
                return Err(BridgeError::Io(e));
            }
        }

        match ready_rx.await {
            Ok(result) => result,
            Err(_) => Err(BridgeError::MountFailed(
                "mount readiness never resolved".to_string(),
            )),
        }
    }

    /// Unmounts the instance mounted at `mountpoint`.
    ///
    /// No live instance at that path is a no-op success (double unmounts
    /// land here). Otherwise the instance is marked garbage, the platform
    /// primitive is invoked off the control thread, and the call resolves
    /// once the worker has exited, which happens only after any in-flight
    /// operation completed. If the platform primitive fails, the garbage
    /// mark is rolled back and the mount keeps running.
    pub async fn unmount(&self, mountpoint: impl AsRef<Path>) -> Result<(), BridgeError> {
        let path = mountpoint.as_ref();
        let instance = self.shared.table.borrow().find_by_path(path);
        let Some(instance) = instance else {
            debug!(path = %path.display(), "unmount for a path with no live mount");
            return Ok(());
        };

        info!(slot = instance.slot(), path = %path.display(), "unmounting");
        instance.set_garbage(true);
        let exited = instance.subscribe_exit();

        let driver = Arc::clone(&self.shared.driver);
        let target = path.to_path_buf();
        let detached = tokio::task::spawn_blocking(move || driver.unmount(&target)).await;
        match detached {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(path = %path.display(), error = %e, "platform unmount failed; mount left running");
                instance.set_garbage(false);
                return Err(BridgeError::UnmountFailed(e.to_string()));
            }
            Err(e) => {
                instance.set_garbage(false);
                return Err(BridgeError::UnmountFailed(e.to_string()));
            }
        }

        let _ = exited.await;
        Ok(())
    }

    /// Whether a live (non-garbage) instance is mounted at `mountpoint`.
    pub fn is_mounted(&self, mountpoint: impl AsRef<Path>) -> bool {
        self.shared
            .table
            .borrow()
            .find_by_path(mountpoint.as_ref())
            .is_some()
    }

    /// Point-in-time bridge counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_capacity() {
        assert_eq!(BridgeConfig::default().capacity, slot::DEFAULT_CAPACITY);
        assert_eq!(slot::DEFAULT_CAPACITY, 1024);
    }
}
