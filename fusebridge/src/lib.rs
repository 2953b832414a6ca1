//! FuseBridge - synchronous filesystem callbacks on a cooperative scheduler
//!
//! This library adapts a callback-driven native filesystem interface (a
//! FUSE-style library that invokes hooks synchronously on a dedicated thread
//! per mount) onto embedder logic running on a single-threaded cooperative
//! scheduler. The native side blocks; the embedder side suspends; the bridge
//! in between is a strict call/response rendezvous per mounted instance.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────┐      ┌──────────────────────────────────┐
//! │ worker thread (per mount)   │      │ control thread (LocalSet)        │
//! │                             │      │                                  │
//! │ FuseDriver::run             │      │ Dispatcher::run                  │
//! │   hook ─► CallGateway::call ┼─wake─►   lookup slot / handler          │
//! │             park on         │      │   marshal args ─► handler future │
//! │             SyncPair  ◄─────┼─post─┤   decode output ─► reply         │
//! └─────────────────────────────┘      └──────────────────────────────────┘
//! ```
//!
//! Calls on one mount are strictly serialized (the native loop is
//! single-threaded); calls on different mounts interleave freely on the
//! control thread.
//!
//! # Example
//!
//! ```ignore
//! use fusebridge::{Bridge, HandlerTable, OpArgs, OpKind, OpReply};
//!
//! let handlers = HandlerTable::new()
//!     .with(OpKind::Getattr, |args| async move {
//!         match args {
//!             OpArgs::Getattr { path } if path == std::path::Path::new("/") => {
//!                 OpReply::attr(Default::default())
//!             }
//!             _ => OpReply::errno(libc::ENOENT),
//!         }
//!     });
//!
//! let (bridge, dispatcher) = Bridge::new(driver);
//! local.spawn_local(dispatcher.run(shutdown));
//! bridge.mount("/mnt/a", vec![], handlers).await?;
//! ```

mod bridge;
mod dispatch;
mod driver;
mod error;
mod handler;
mod instance;
mod rendezvous;
mod slot;
mod worker;

pub mod attr;
pub mod op;
pub mod telemetry;

pub use attr::{FileAttr, FsStats, TimeSpec};
pub use bridge::{Bridge, BridgeConfig};
pub use dispatch::{current_context, Dispatcher};
pub use driver::{format_options, FuseDriver, WorkerSession};
pub use error::{BridgeError, DriverError};
pub use handler::{HandlerTable, OpHandler, OpOutput, OpReply};
pub use instance::CallerContext;
pub use op::marshal::OpArgs;
pub use op::{DirFiller, OpBuffer, OpKind, OpSet, Operation};
pub use slot::DEFAULT_CAPACITY;
pub use telemetry::{BridgeMetrics, MetricsSnapshot};
pub use worker::CallGateway;
