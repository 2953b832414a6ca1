//! One live mount: path, handler table, synchronization pair, lifecycle
//! bookkeeping.
//!
//! Instances are owned by the control thread (`Rc` in the slot table); the
//! worker thread only ever holds the `Arc`ed synchronization pair, handed to
//! it through its call gateway. The `garbage` flag is the single piece of
//! lifecycle state both roles care about, and it is written exclusively on
//! the control thread.

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::BridgeError;
use crate::handler::HandlerTable;
use crate::rendezvous::SyncPair;

/// Identity of the native caller, captured at each call's entry and valid
/// only for the synchronous extent of the handler it is delivered to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallerContext {
    pub uid: u32,
    pub gid: u32,
    pub pid: i32,
}

/// A mounted adapter instance.
pub(crate) struct MountInstance {
    slot: usize,
    path: PathBuf,
    options: Vec<String>,
    handlers: HandlerTable,
    pair: Arc<SyncPair>,
    /// Unmount requested; no new operation may begin dispatch.
    garbage: Cell<bool>,
    /// Resolved once, on the first Init (Ok) or mount error (Err).
    ready: RefCell<Option<oneshot::Sender<Result<(), BridgeError>>>>,
    /// Unmount callers waiting for the worker to exit.
    exit_waiters: RefCell<Vec<oneshot::Sender<()>>>,
    worker: RefCell<Option<JoinHandle<()>>>,
}

impl MountInstance {
    pub(crate) fn new(
        slot: usize,
        path: PathBuf,
        options: Vec<String>,
        handlers: HandlerTable,
        ready: oneshot::Sender<Result<(), BridgeError>>,
    ) -> Rc<Self> {
        Rc::new(Self {
            slot,
            path,
            options,
            handlers,
            pair: Arc::new(SyncPair::new()),
            garbage: Cell::new(false),
            ready: RefCell::new(Some(ready)),
            exit_waiters: RefCell::new(Vec::new()),
            worker: RefCell::new(None),
        })
    }

    pub(crate) fn slot(&self) -> usize {
        self.slot
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn options(&self) -> &[String] {
        &self.options
    }

    pub(crate) fn handlers(&self) -> &HandlerTable {
        &self.handlers
    }

    pub(crate) fn pair(&self) -> Arc<SyncPair> {
        Arc::clone(&self.pair)
    }

    pub(crate) fn is_garbage(&self) -> bool {
        self.garbage.get()
    }

    pub(crate) fn set_garbage(&self, garbage: bool) {
        self.garbage.set(garbage);
    }

    pub(crate) fn attach_worker(&self, handle: JoinHandle<()>) {
        let prev = self.worker.borrow_mut().replace(handle);
        debug_assert!(prev.is_none(), "worker attached twice");
    }

    pub(crate) fn take_worker(&self) -> Option<JoinHandle<()>> {
        self.worker.borrow_mut().take()
    }

    /// Resolves the mount-ready signal. Later calls are no-ops, so the
    /// first of Init / mount-error / premature-exit wins.
    pub(crate) fn resolve_ready(&self, result: Result<(), BridgeError>) {
        if let Some(tx) = self.ready.borrow_mut().take() {
            debug!(slot = self.slot, ok = result.is_ok(), "mount readiness resolved");
            let _ = tx.send(result);
        }
    }

    /// Registers interest in this instance's teardown.
    pub(crate) fn subscribe_exit(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.exit_waiters.borrow_mut().push(tx);
        rx
    }

    /// Fires all exit subscriptions.
    pub(crate) fn notify_exit(&self) {
        for tx in self.exit_waiters.borrow_mut().drain(..) {
            let _ = tx.send(());
        }
    }

    #[cfg(test)]
    pub(crate) fn stub(slot: usize, path: &str) -> Rc<Self> {
        let (tx, _rx) = oneshot::channel();
        Self::new(slot, PathBuf::from(path), Vec::new(), HandlerTable::new(), tx)
    }
}
