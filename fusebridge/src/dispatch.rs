//! Control-thread dispatch: turns wake notifications into handler
//! invocations and, on every path, a posted reply.
//!
//! # Architecture
//!
//! ```text
//! worker thread                    control thread
//! ─────────────                    ──────────────
//! native hook fires
//!   build Operation ── Wake ─────► Dispatcher::run
//!   park on rendezvous              ├─ no instance / garbage ──► reply EIO
//!                                   ├─ no handler ─────────────► reply 0
//!                                   └─ handler future (spawned locally)
//!                                        └─ resolve ──► decode ──► reply
//!   wake, return status ◄──────────────────────────────────────────┘
//! ```
//!
//! The one hard rule: every call that reaches the dispatcher gets exactly
//! one reply, whatever goes wrong on the way: a missing handler, a
//! panicking embedder, an instance mid-teardown. A worker thread parked on
//! its rendezvous with no reply coming is a deadlock the kernel can observe.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::bridge::Shared;
use crate::error::BridgeError;
use crate::handler::{OpOutput, OpReply};
use crate::instance::CallerContext;
use crate::op::marshal;
use crate::op::{OpKind, Operation};
use crate::rendezvous::SyncPair;

thread_local! {
    /// Caller identity of the operation currently being dispatched, set for
    /// the synchronous extent of the handler invocation only.
    static CURRENT: Cell<Option<CallerContext>> = const { Cell::new(None) };
}

/// Identity (uid/gid/pid) of the native caller whose operation is being
/// dispatched right now.
///
/// Only meaningful inside the synchronous part of a handler, i.e. the closure
/// body, before its future first suspends. Anywhere else this returns
/// `None`.
pub fn current_context() -> Option<CallerContext> {
    CURRENT.with(Cell::get)
}

/// Cross-thread wake message observed by the dispatcher.
pub(crate) enum Wake {
    /// A worker thread populated an operation and parked on its rendezvous.
    Call {
        slot: usize,
        ctx: CallerContext,
        op: Operation,
        pair: Arc<SyncPair>,
    },
    /// A worker thread's dispatch loop returned; tear the instance down.
    Exited { slot: usize },
}

/// The control-thread half of the bridge.
///
/// Holds `Rc`s into the bridge's shared state, so the returned future is
/// not `Send`: spawn it on a `LocalSet` alongside the embedder's handlers.
pub struct Dispatcher {
    shared: Rc<Shared>,
    rx: mpsc::UnboundedReceiver<Wake>,
}

impl Dispatcher {
    pub(crate) fn new(shared: Rc<Shared>, rx: mpsc::UnboundedReceiver<Wake>) -> Self {
        Self { shared, rx }
    }

    /// Runs until shutdown is signalled, then fails any still-queued calls
    /// so no worker thread is left parked.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("dispatch bridge starting");

        loop {
            let wake = tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("dispatch bridge shutting down");
                    break;
                }

                wake = self.rx.recv() => wake,
            };
            match wake {
                Some(wake) => self.handle(wake),
                None => break,
            }
        }

        self.rx.close();
        while let Ok(wake) = self.rx.try_recv() {
            match wake {
                Wake::Call { slot, op, pair, .. } => {
                    let kind = op.kind();
                    debug!(slot, op = %kind, "failing call during shutdown");
                    pair.channel_for(kind).post(OpReply::errno(libc::EIO));
                }
                Wake::Exited { slot } => self.reap(slot),
            }
        }

        info!("dispatch bridge stopped");
    }

    fn handle(&self, wake: Wake) {
        match wake {
            Wake::Call {
                slot,
                ctx,
                op,
                pair,
            } => self.dispatch_call(slot, ctx, op, pair),
            Wake::Exited { slot } => self.reap(slot),
        }
    }

    fn dispatch_call(&self, slot: usize, ctx: CallerContext, op: Operation, pair: Arc<SyncPair>) {
        let kind = op.kind();
        trace!(slot, op = %kind, "dispatching");

        let instance = self.shared.table.borrow().get(slot);

        // Lifecycle transitions ride on their operation kinds.
        match (&op, instance.as_ref()) {
            (Operation::Init, Some(instance)) => instance.resolve_ready(Ok(())),
            (Operation::MountError { message }, Some(instance)) => {
                self.shared.metrics.mount_failed();
                instance.resolve_ready(Err(BridgeError::MountFailed(message.clone())));
            }
            _ => {}
        }

        let Some(instance) = instance else {
            warn!(slot, op = %kind, "call for unoccupied slot");
            pair.channel_for(kind).post(OpReply::errno(libc::EIO));
            return;
        };

        // Once unmount has begun only teardown notifications flow; any
        // other call is refused without reaching embedder code.
        if instance.is_garbage() && !matches!(kind, OpKind::Destroy | OpKind::MountError) {
            debug!(slot, op = %kind, "refusing dispatch on unmounting instance");
            pair.channel_for(kind).post(OpReply::errno(libc::EIO));
            return;
        }

        self.shared.metrics.call_dispatched();

        let Some(handler) = instance.handlers().get(kind) else {
            trace!(slot, op = %kind, "no handler registered, auto-completing");
            self.shared.metrics.call_auto_completed();
            pair.channel_for(kind).post(OpReply::ok());
            return;
        };

        let args = marshal::args(&op);

        CURRENT.with(|current| current.set(Some(ctx)));
        let created = panic::catch_unwind(AssertUnwindSafe(|| handler(args)));
        CURRENT.with(|current| current.set(None));

        let fut = match created {
            Ok(fut) => fut,
            Err(_) => {
                warn!(slot, op = %kind, "handler panicked during invocation");
                self.shared.metrics.call_failed();
                pair.channel_for(kind).post(OpReply::errno(libc::EIO));
                return;
            }
        };

        let metrics = Arc::clone(&self.shared.metrics);
        tokio::task::spawn_local(async move {
            let reply = match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(reply) => reply,
                Err(_) => {
                    warn!(slot, op = %kind, "handler panicked");
                    OpReply::errno(libc::EIO)
                }
            };
            if reply.status < 0 {
                metrics.call_failed();
            }
            complete(kind, op, pair, reply);
        });
    }

    /// Releases a slot after its worker announced exit: join the thread,
    /// resolve any still-pending waiters, free the entry.
    fn reap(&self, slot: usize) {
        let Some(instance) = self.shared.table.borrow_mut().release(slot) else {
            warn!(slot, "exit notification for unoccupied slot");
            return;
        };

        if let Some(handle) = instance.take_worker() {
            // The exit notification was the worker's final act; the join
            // completes immediately.
            if handle.join().is_err() {
                warn!(slot, "worker thread panicked");
            }
        }

        instance.resolve_ready(Err(BridgeError::MountFailed(
            "mount loop exited before initialization".to_string(),
        )));
        instance.notify_exit();
        self.shared.metrics.mount_released();
        info!(slot, path = %instance.path().display(), "mount released");
    }
}

/// Decodes a handler reply into the waiting worker's out-parameters and
/// posts it on the right channel.
fn complete(kind: OpKind, op: Operation, pair: Arc<SyncPair>, mut reply: OpReply) {
    // A structured output of the wrong shape for this kind is discarded;
    // the reply degrades to status-only.
    if let Some(output) = reply.output.take() {
        if marshal::output_matches(kind, &output) {
            reply.output = Some(output);
        } else {
            warn!(op = %kind, "discarding handler output of the wrong shape");
        }
    }

    match op {
        Operation::Readdir { filler, .. } => {
            let entries = match reply.output.take() {
                Some(OpOutput::Entries(entries)) => entries,
                _ => Vec::new(),
            };
            let status = reply.status;
            // Driving the filler is deferred to its own task; the listing
            // channel keeps this fan-out from aliasing the primary
            // call/response slot.
            tokio::task::spawn_local(async move {
                let mut filler = filler;
                for name in &entries {
                    if filler(name) {
                        break;
                    }
                }
                pair.listing.post(OpReply {
                    status,
                    output: None,
                });
            });
        }
        Operation::Readlink { buf, .. } => {
            if let Some(OpOutput::Target(target)) = reply.output.take() {
                buf.fill_with_nul(target.as_bytes());
            }
            pair.call.post(OpReply {
                status: reply.status,
                output: None,
            });
        }
        _ => pair.channel_for(kind).post(reply),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::{DirFiller, OpBuffer};
    use parking_lot::Mutex;
    use std::path::PathBuf;

    #[test]
    fn test_mismatched_output_degrades_to_status_only() {
        let pair = Arc::new(SyncPair::new());
        let op = Operation::Getattr {
            path: PathBuf::from("/f"),
        };
        complete(
            OpKind::Getattr,
            op,
            Arc::clone(&pair),
            OpReply {
                status: 0,
                output: Some(OpOutput::Fd(3)),
            },
        );
        let reply = pair.call.wait();
        assert_eq!(reply.status, 0);
        assert!(reply.output.is_none());
    }

    #[test]
    fn test_readlink_target_copied_into_buffer() {
        let pair = Arc::new(SyncPair::new());
        let mut backing = [0u8; 16];
        let op = Operation::Readlink {
            path: PathBuf::from("/l"),
            buf: unsafe { OpBuffer::from_raw(backing.as_mut_ptr(), backing.len()) },
        };
        complete(OpKind::Readlink, op, Arc::clone(&pair), OpReply::target("/real"));
        let reply = pair.call.wait();
        assert_eq!(reply.status, 0);
        assert!(reply.output.is_none());
        assert_eq!(&backing[..6], b"/real\0");
    }

    #[tokio::test]
    async fn test_readdir_completion_drives_filler() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let pair = Arc::new(SyncPair::new());
                let collected = Arc::new(Mutex::new(Vec::new()));
                let sink = Arc::clone(&collected);
                let filler: DirFiller = Box::new(move |name| {
                    sink.lock().push(name.to_string());
                    false
                });
                let op = Operation::Readdir {
                    path: PathBuf::from("/d"),
                    filler,
                };
                complete(
                    OpKind::Readdir,
                    op,
                    Arc::clone(&pair),
                    OpReply::entries(vec!["a".to_string(), "b".to_string()]),
                );

                let waiter = Arc::clone(&pair);
                let reply = tokio::task::spawn_blocking(move || waiter.listing.wait())
                    .await
                    .unwrap();
                assert_eq!(reply.status, 0);
                assert_eq!(*collected.lock(), vec!["a", "b"]);
            })
            .await;
    }

    #[tokio::test]
    async fn test_readdir_filler_stops_when_full() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let pair = Arc::new(SyncPair::new());
                let collected = Arc::new(Mutex::new(Vec::new()));
                let sink = Arc::clone(&collected);
                let filler: DirFiller = Box::new(move |name| {
                    sink.lock().push(name.to_string());
                    true // full after the first entry
                });
                let op = Operation::Readdir {
                    path: PathBuf::from("/d"),
                    filler,
                };
                complete(
                    OpKind::Readdir,
                    op,
                    Arc::clone(&pair),
                    OpReply::entries(vec!["a".to_string(), "b".to_string(), "c".to_string()]),
                );

                let waiter = Arc::clone(&pair);
                let reply = tokio::task::spawn_blocking(move || waiter.listing.wait())
                    .await
                    .unwrap();
                assert_eq!(reply.status, 0);
                assert_eq!(*collected.lock(), vec!["a"]);
            })
            .await;
    }

    #[test]
    fn test_no_context_outside_dispatch() {
        assert!(current_context().is_none());
    }
}
