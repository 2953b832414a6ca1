//! The operation envelope: one tagged variant per filesystem operation.
//!
//! The driver side of a call builds an [`Operation`] from the native
//! callback's arguments; the control thread consumes it to build the
//! handler's argument list and, after the handler resolves, to decode
//! outputs back toward the waiting worker. Every supported kind has exactly
//! one variant, so a field can never be read under the wrong kind's
//! interpretation.

mod buffer;
pub mod marshal;

pub use buffer::OpBuffer;

use std::fmt;
use std::path::PathBuf;

use crate::attr::TimeSpec;

/// Callback supplied by the driver for directory listings. Invoked once per
/// entry name; returns `true` when the kernel buffer is full and the fan-out
/// should stop.
pub type DirFiller = Box<dyn FnMut(&str) -> bool + Send>;

/// The fixed set of operation kinds the bridge supports.
///
/// `Init` and `Destroy` are the driver's lifecycle hooks; `MountError` is a
/// bridge-internal kind the worker issues when the mount cannot be
/// established, and is never installed as a driver hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Init,
    MountError,
    Access,
    Statfs,
    Getattr,
    Fgetattr,
    Flush,
    Fsync,
    Fsyncdir,
    Readdir,
    Truncate,
    Ftruncate,
    Utimens,
    Readlink,
    Chown,
    Chmod,
    Setxattr,
    Getxattr,
    Open,
    Opendir,
    Read,
    Write,
    Release,
    Releasedir,
    Create,
    Unlink,
    Rename,
    Link,
    Symlink,
    Mkdir,
    Rmdir,
    Destroy,
}

impl OpKind {
    /// Number of operation kinds.
    pub const COUNT: usize = 32;

    /// All kinds, in declaration order.
    pub const ALL: [OpKind; OpKind::COUNT] = [
        OpKind::Init,
        OpKind::MountError,
        OpKind::Access,
        OpKind::Statfs,
        OpKind::Getattr,
        OpKind::Fgetattr,
        OpKind::Flush,
        OpKind::Fsync,
        OpKind::Fsyncdir,
        OpKind::Readdir,
        OpKind::Truncate,
        OpKind::Ftruncate,
        OpKind::Utimens,
        OpKind::Readlink,
        OpKind::Chown,
        OpKind::Chmod,
        OpKind::Setxattr,
        OpKind::Getxattr,
        OpKind::Open,
        OpKind::Opendir,
        OpKind::Read,
        OpKind::Write,
        OpKind::Release,
        OpKind::Releasedir,
        OpKind::Create,
        OpKind::Unlink,
        OpKind::Rename,
        OpKind::Link,
        OpKind::Symlink,
        OpKind::Mkdir,
        OpKind::Rmdir,
        OpKind::Destroy,
    ];

    /// Stable index into kind-keyed tables.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The hook name, as a driver or log line would spell it.
    pub fn name(self) -> &'static str {
        match self {
            OpKind::Init => "init",
            OpKind::MountError => "error",
            OpKind::Access => "access",
            OpKind::Statfs => "statfs",
            OpKind::Getattr => "getattr",
            OpKind::Fgetattr => "fgetattr",
            OpKind::Flush => "flush",
            OpKind::Fsync => "fsync",
            OpKind::Fsyncdir => "fsyncdir",
            OpKind::Readdir => "readdir",
            OpKind::Truncate => "truncate",
            OpKind::Ftruncate => "ftruncate",
            OpKind::Utimens => "utimens",
            OpKind::Readlink => "readlink",
            OpKind::Chown => "chown",
            OpKind::Chmod => "chmod",
            OpKind::Setxattr => "setxattr",
            OpKind::Getxattr => "getxattr",
            OpKind::Open => "open",
            OpKind::Opendir => "opendir",
            OpKind::Read => "read",
            OpKind::Write => "write",
            OpKind::Release => "release",
            OpKind::Releasedir => "releasedir",
            OpKind::Create => "create",
            OpKind::Unlink => "unlink",
            OpKind::Rename => "rename",
            OpKind::Link => "link",
            OpKind::Symlink => "symlink",
            OpKind::Mkdir => "mkdir",
            OpKind::Rmdir => "rmdir",
            OpKind::Destroy => "destroy",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of operation kinds, used as the hook-registration mask handed to
/// the driver: only kinds in the set get a native hook installed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpSet(u64);

impl OpSet {
    pub const EMPTY: OpSet = OpSet(0);

    pub fn insert(&mut self, kind: OpKind) {
        self.0 |= 1 << kind.index();
    }

    pub fn with(mut self, kind: OpKind) -> Self {
        self.insert(kind);
        self
    }

    pub fn contains(self, kind: OpKind) -> bool {
        self.0 & (1 << kind.index()) != 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// One filesystem operation in flight, as built by the driver side.
///
/// Numeric conventions follow the native interface: `mode` carries
/// permission bits or open flags depending on the kind, `fd` is the handle
/// returned by a previous open/create, offsets and sizes are in bytes.
pub enum Operation {
    /// The dispatch loop came up; the mount is live.
    Init,
    /// The mount could not be established; issued by the worker itself.
    MountError { message: String },
    Access { path: PathBuf, mode: i32 },
    Statfs { path: PathBuf },
    Getattr { path: PathBuf },
    Fgetattr { path: PathBuf, fd: u64 },
    Flush { path: PathBuf, fd: u64 },
    Fsync { path: PathBuf, fd: u64, datasync: bool },
    Fsyncdir { path: PathBuf, fd: u64, datasync: bool },
    Readdir { path: PathBuf, filler: DirFiller },
    Truncate { path: PathBuf, size: u64 },
    Ftruncate { path: PathBuf, fd: u64, size: u64 },
    Utimens { path: PathBuf, atime: TimeSpec, mtime: TimeSpec },
    /// The handler returns the link target; the bridge copies it into `buf`.
    Readlink { path: PathBuf, buf: OpBuffer },
    Chown { path: PathBuf, uid: u32, gid: u32 },
    Chmod { path: PathBuf, mode: u32 },
    Setxattr {
        path: PathBuf,
        name: String,
        value: OpBuffer,
        size: usize,
        position: u32,
        flags: i32,
    },
    Getxattr {
        path: PathBuf,
        name: String,
        value: OpBuffer,
        size: usize,
        position: u32,
    },
    Open { path: PathBuf, flags: i32 },
    Opendir { path: PathBuf, flags: i32 },
    Read {
        path: PathBuf,
        fd: u64,
        buf: OpBuffer,
        size: usize,
        offset: u64,
    },
    Write {
        path: PathBuf,
        fd: u64,
        buf: OpBuffer,
        size: usize,
        offset: u64,
    },
    Release { path: PathBuf, fd: u64 },
    Releasedir { path: PathBuf, fd: u64 },
    Create { path: PathBuf, mode: u32 },
    Unlink { path: PathBuf },
    Rename { src: PathBuf, dest: PathBuf },
    Link { path: PathBuf, dest: PathBuf },
    Symlink { src: PathBuf, dest: PathBuf },
    Mkdir { path: PathBuf, mode: u32 },
    Rmdir { path: PathBuf },
    /// The dispatch loop is unwinding; the mount is going away.
    Destroy,
}

impl Operation {
    /// The kind tag of this operation.
    pub fn kind(&self) -> OpKind {
        match self {
            Operation::Init => OpKind::Init,
            Operation::MountError { .. } => OpKind::MountError,
            Operation::Access { .. } => OpKind::Access,
            Operation::Statfs { .. } => OpKind::Statfs,
            Operation::Getattr { .. } => OpKind::Getattr,
            Operation::Fgetattr { .. } => OpKind::Fgetattr,
            Operation::Flush { .. } => OpKind::Flush,
            Operation::Fsync { .. } => OpKind::Fsync,
            Operation::Fsyncdir { .. } => OpKind::Fsyncdir,
            Operation::Readdir { .. } => OpKind::Readdir,
            Operation::Truncate { .. } => OpKind::Truncate,
            Operation::Ftruncate { .. } => OpKind::Ftruncate,
            Operation::Utimens { .. } => OpKind::Utimens,
            Operation::Readlink { .. } => OpKind::Readlink,
            Operation::Chown { .. } => OpKind::Chown,
            Operation::Chmod { .. } => OpKind::Chmod,
            Operation::Setxattr { .. } => OpKind::Setxattr,
            Operation::Getxattr { .. } => OpKind::Getxattr,
            Operation::Open { .. } => OpKind::Open,
            Operation::Opendir { .. } => OpKind::Opendir,
            Operation::Read { .. } => OpKind::Read,
            Operation::Write { .. } => OpKind::Write,
            Operation::Release { .. } => OpKind::Release,
            Operation::Releasedir { .. } => OpKind::Releasedir,
            Operation::Create { .. } => OpKind::Create,
            Operation::Unlink { .. } => OpKind::Unlink,
            Operation::Rename { .. } => OpKind::Rename,
            Operation::Link { .. } => OpKind::Link,
            Operation::Symlink { .. } => OpKind::Symlink,
            Operation::Mkdir { .. } => OpKind::Mkdir,
            Operation::Rmdir { .. } => OpKind::Rmdir,
            Operation::Destroy => OpKind::Destroy,
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Operation").field(&self.kind().name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_covers_every_kind_once() {
        assert_eq!(OpKind::ALL.len(), OpKind::COUNT);
        for (i, kind) in OpKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_opset_insert_and_contains() {
        let mut set = OpSet::EMPTY;
        assert!(set.is_empty());
        set.insert(OpKind::Read);
        set.insert(OpKind::Destroy);
        assert!(set.contains(OpKind::Read));
        assert!(set.contains(OpKind::Destroy));
        assert!(!set.contains(OpKind::Write));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_opset_with_is_chainable() {
        let set = OpSet::EMPTY.with(OpKind::Getattr).with(OpKind::Readdir);
        assert!(set.contains(OpKind::Getattr));
        assert!(set.contains(OpKind::Readdir));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_operation_kind_tags() {
        let op = Operation::Read {
            path: PathBuf::from("/f"),
            fd: 3,
            buf: OpBuffer::empty(),
            size: 0,
            offset: 0,
        };
        assert_eq!(op.kind(), OpKind::Read);
        assert_eq!(Operation::Init.kind(), OpKind::Init);
        assert_eq!(Operation::Destroy.kind(), OpKind::Destroy);
    }

    #[test]
    fn test_kind_names_are_unique() {
        let mut names: Vec<&str> = OpKind::ALL.iter().map(|k| k.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), OpKind::COUNT);
    }
}
