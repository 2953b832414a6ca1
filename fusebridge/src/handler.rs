//! The per-mount handler table and the reply types handlers produce.
//!
//! A handler is an async function over the marshaled argument list; its
//! resolution is the operation's completion. Absence of a handler for a
//! kind means two things: the driver never installs the corresponding
//! native hook, and if a call of that kind reaches the bridge anyway it is
//! auto-completed as a success without running any embedder code.

use std::fmt;
use std::future::Future;

use futures::future::LocalBoxFuture;
use futures::FutureExt;

use crate::attr::{FileAttr, FsStats};
use crate::op::marshal::OpArgs;
use crate::op::{OpKind, OpSet};

/// Structured output accompanying a successful reply, for the kinds that
/// produce one.
#[derive(Debug, Clone, PartialEq)]
pub enum OpOutput {
    /// `getattr` / `fgetattr` attributes.
    Attr(FileAttr),
    /// `statfs` statistics.
    Stats(FsStats),
    /// Handle from `open` / `opendir` / `create`.
    Fd(u32),
    /// Entry names from `readdir`.
    Entries(Vec<String>),
    /// Link target from `readlink`.
    Target(String),
}

/// A handler's reply: the status code returned to the native caller, plus
/// optional structured output.
///
/// Status follows the native convention: `0` for success, a negative errno
/// for failure, and a positive byte count for `read`/`write`.
#[derive(Debug, Clone, PartialEq)]
pub struct OpReply {
    pub status: i32,
    pub output: Option<OpOutput>,
}

impl OpReply {
    /// Plain success.
    pub fn ok() -> Self {
        Self {
            status: 0,
            output: None,
        }
    }

    /// Failure with an errno constant (`libc::ENOENT` etc.); the sign is
    /// normalized to the negative wire convention.
    pub fn errno(errno: i32) -> Self {
        Self {
            status: -errno.abs(),
            output: None,
        }
    }

    /// Success reporting a transferred byte count (`read`/`write`).
    pub fn bytes(n: usize) -> Self {
        Self {
            status: n as i32,
            output: None,
        }
    }

    pub fn attr(attr: FileAttr) -> Self {
        Self {
            status: 0,
            output: Some(OpOutput::Attr(attr)),
        }
    }

    pub fn stats(stats: FsStats) -> Self {
        Self {
            status: 0,
            output: Some(OpOutput::Stats(stats)),
        }
    }

    pub fn fd(fd: u32) -> Self {
        Self {
            status: 0,
            output: Some(OpOutput::Fd(fd)),
        }
    }

    pub fn entries(entries: Vec<String>) -> Self {
        Self {
            status: 0,
            output: Some(OpOutput::Entries(entries)),
        }
    }

    pub fn target(target: impl Into<String>) -> Self {
        Self {
            status: 0,
            output: Some(OpOutput::Target(target.into())),
        }
    }
}

/// An embedder-supplied operation handler.
///
/// Runs on the control thread's cooperative scheduler; the returned future
/// may suspend arbitrarily. The future need not be `Send`.
pub type OpHandler = Box<dyn Fn(OpArgs) -> LocalBoxFuture<'static, OpReply>>;

/// One optional handler per operation kind.
pub struct HandlerTable {
    handlers: [Option<OpHandler>; OpKind::COUNT],
}

impl HandlerTable {
    /// An empty table: every kind auto-succeeds.
    pub fn new() -> Self {
        Self {
            handlers: std::array::from_fn(|_| None),
        }
    }

    /// Registers a handler for `kind`, consuming and returning the table
    /// for chaining.
    pub fn with<F, Fut>(mut self, kind: OpKind, handler: F) -> Self
    where
        F: Fn(OpArgs) -> Fut + 'static,
        Fut: Future<Output = OpReply> + 'static,
    {
        self.set(kind, handler);
        self
    }

    /// Registers a handler for `kind`, replacing any existing one.
    pub fn set<F, Fut>(&mut self, kind: OpKind, handler: F)
    where
        F: Fn(OpArgs) -> Fut + 'static,
        Fut: Future<Output = OpReply> + 'static,
    {
        self.handlers[kind.index()] = Some(Box::new(move |args| handler(args).boxed_local()));
    }

    /// The handler registered for `kind`, if any.
    pub fn get(&self, kind: OpKind) -> Option<&OpHandler> {
        self.handlers[kind.index()].as_ref()
    }

    /// The set of kinds with a registered handler; this becomes the
    /// driver's hook-registration mask.
    pub fn registered(&self) -> OpSet {
        let mut set = OpSet::EMPTY;
        for kind in OpKind::ALL {
            if self.handlers[kind.index()].is_some() {
                set.insert(kind);
            }
        }
        set
    }
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerTable")
            .field("registered", &self.registered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_normalizes_sign() {
        assert_eq!(OpReply::errno(libc::ENOENT).status, -libc::ENOENT);
        assert_eq!(OpReply::errno(-libc::ENOENT).status, -libc::ENOENT);
    }

    #[test]
    fn test_bytes_is_positive_status() {
        let reply = OpReply::bytes(12);
        assert_eq!(reply.status, 12);
        assert!(reply.output.is_none());
    }

    #[test]
    fn test_empty_table_registers_nothing() {
        let table = HandlerTable::new();
        assert!(table.registered().is_empty());
        assert!(table.get(OpKind::Read).is_none());
    }

    #[tokio::test]
    async fn test_registered_handler_is_invocable() {
        let table = HandlerTable::new().with(OpKind::Getattr, |_args| async {
            OpReply::attr(FileAttr {
                size: 7,
                ..FileAttr::default()
            })
        });

        let set = table.registered();
        assert!(set.contains(OpKind::Getattr));
        assert_eq!(set.len(), 1);

        let handler = table.get(OpKind::Getattr).unwrap();
        let reply = handler(OpArgs::Getattr {
            path: "/x".into(),
        })
        .await;
        assert_eq!(reply.status, 0);
        match reply.output {
            Some(OpOutput::Attr(attr)) => assert_eq!(attr.size, 7),
            other => panic!("expected attr output, got {:?}", other),
        }
    }
}
