//! Builds the per-kind positional argument list handed to handlers.
//!
//! `args` is a total function over the envelope: every kind maps to exactly
//! one argument shape, and adding a kind without extending the match here is
//! a compile error rather than a runtime surprise.

use std::path::PathBuf;

use crate::attr::TimeSpec;
use crate::handler::OpOutput;
use crate::op::{OpBuffer, OpKind, Operation};

/// The canonical argument list for one operation kind, as a handler sees it.
///
/// Buffer-bearing variants carry a zero-copy [`OpBuffer`] view; everything
/// else is owned. The shapes mirror [`Operation`] minus driver-side plumbing
/// (the directory filler, the readlink output buffer).
#[derive(Debug, Clone)]
pub enum OpArgs {
    Init,
    MountError { message: String },
    Access { path: PathBuf, mode: i32 },
    Statfs { path: PathBuf },
    Getattr { path: PathBuf },
    Fgetattr { path: PathBuf, fd: u64 },
    Flush { path: PathBuf, fd: u64 },
    Fsync { path: PathBuf, fd: u64, datasync: bool },
    Fsyncdir { path: PathBuf, fd: u64, datasync: bool },
    Readdir { path: PathBuf },
    Truncate { path: PathBuf, size: u64 },
    Ftruncate { path: PathBuf, fd: u64, size: u64 },
    Utimens { path: PathBuf, atime: TimeSpec, mtime: TimeSpec },
    Readlink { path: PathBuf },
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
    Destroy,
}

impl OpArgs {
    /// The kind these arguments belong to.
    pub fn kind(&self) -> OpKind {
        match self {
            OpArgs::Init => OpKind::Init,
            OpArgs::MountError { .. } => OpKind::MountError,
            OpArgs::Access { .. } => OpKind::Access,
            OpArgs::Statfs { .. } => OpKind::Statfs,
            OpArgs::Getattr { .. } => OpKind::Getattr,
            OpArgs::Fgetattr { .. } => OpKind::Fgetattr,
            OpArgs::Flush { .. } => OpKind::Flush,
            OpArgs::Fsync { .. } => OpKind::Fsync,
            OpArgs::Fsyncdir { .. } => OpKind::Fsyncdir,
            OpArgs::Readdir { .. } => OpKind::Readdir,
            OpArgs::Truncate { .. } => OpKind::Truncate,
            OpArgs::Ftruncate { .. } => OpKind::Ftruncate,
            OpArgs::Utimens { .. } => OpKind::Utimens,
            OpArgs::Readlink { .. } => OpKind::Readlink,
            OpArgs::Chown { .. } => OpKind::Chown,
            OpArgs::Chmod { .. } => OpKind::Chmod,
            OpArgs::Setxattr { .. } => OpKind::Setxattr,
            OpArgs::Getxattr { .. } => OpKind::Getxattr,
            OpArgs::Open { .. } => OpKind::Open,
            OpArgs::Opendir { .. } => OpKind::Opendir,
            OpArgs::Read { .. } => OpKind::Read,
            OpArgs::Write { .. } => OpKind::Write,
            OpArgs::Release { .. } => OpKind::Release,
            OpArgs::Releasedir { .. } => OpKind::Releasedir,
            OpArgs::Create { .. } => OpKind::Create,
            OpArgs::Unlink { .. } => OpKind::Unlink,
            OpArgs::Rename { .. } => OpKind::Rename,
            OpArgs::Link { .. } => OpKind::Link,
            OpArgs::Symlink { .. } => OpKind::Symlink,
            OpArgs::Mkdir { .. } => OpKind::Mkdir,
            OpArgs::Rmdir { .. } => OpKind::Rmdir,
            OpArgs::Destroy => OpKind::Destroy,
        }
    }
}

/// Builds the handler argument list for an in-flight operation.
pub fn args(op: &Operation) -> OpArgs {
    match op {
        Operation::Init => OpArgs::Init,
        Operation::MountError { message } => OpArgs::MountError {
            message: message.clone(),
        },
        Operation::Access { path, mode } => OpArgs::Access {
            path: path.clone(),
            mode: *mode,
        },
        Operation::Statfs { path } => OpArgs::Statfs { path: path.clone() },
        Operation::Getattr { path } => OpArgs::Getattr { path: path.clone() },
        Operation::Fgetattr { path, fd } => OpArgs::Fgetattr {
            path: path.clone(),
            fd: *fd,
        },
        Operation::Flush { path, fd } => OpArgs::Flush {
            path: path.clone(),
            fd: *fd,
        },
        Operation::Fsync { path, fd, datasync } => OpArgs::Fsync {
            path: path.clone(),
            fd: *fd,
            datasync: *datasync,
        },
        Operation::Fsyncdir { path, fd, datasync } => OpArgs::Fsyncdir {
            path: path.clone(),
            fd: *fd,
            datasync: *datasync,
        },
        Operation::Readdir { path, .. } => OpArgs::Readdir { path: path.clone() },
        Operation::Truncate { path, size } => OpArgs::Truncate {
            path: path.clone(),
            size: *size,
        },
        Operation::Ftruncate { path, fd, size } => OpArgs::Ftruncate {
            path: path.clone(),
            fd: *fd,
            size: *size,
        },
        Operation::Utimens { path, atime, mtime } => OpArgs::Utimens {
            path: path.clone(),
            atime: *atime,
            mtime: *mtime,
        },
        Operation::Readlink { path, .. } => OpArgs::Readlink { path: path.clone() },
        Operation::Chown { path, uid, gid } => OpArgs::Chown {
            path: path.clone(),
            uid: *uid,
            gid: *gid,
        },
        Operation::Chmod { path, mode } => OpArgs::Chmod {
            path: path.clone(),
            mode: *mode,
        },
        Operation::Setxattr {
            path,
            name,
            value,
            size,
            position,
            flags,
        } => OpArgs::Setxattr {
            path: path.clone(),
            name: name.clone(),
            value: value.clone(),
            size: *size,
            position: *position,
            flags: *flags,
        },
        Operation::Getxattr {
            path,
            name,
            value,
            size,
            position,
        } => OpArgs::Getxattr {
            path: path.clone(),
            name: name.clone(),
            value: value.clone(),
            size: *size,
            position: *position,
        },
        Operation::Open { path, flags } => OpArgs::Open {
            path: path.clone(),
            flags: *flags,
        },
        Operation::Opendir { path, flags } => OpArgs::Opendir {
            path: path.clone(),
            flags: *flags,
        },
        Operation::Read {
            path,
            fd,
            buf,
            size,
            offset,
        } => OpArgs::Read {
            path: path.clone(),
            fd: *fd,
            buf: buf.clone(),
            size: *size,
            offset: *offset,
        },
        Operation::Write {
            path,
            fd,
            buf,
            size,
            offset,
        } => OpArgs::Write {
            path: path.clone(),
            fd: *fd,
            buf: buf.clone(),
            size: *size,
            offset: *offset,
        },
        Operation::Release { path, fd } => OpArgs::Release {
            path: path.clone(),
            fd: *fd,
        },
        Operation::Releasedir { path, fd } => OpArgs::Releasedir {
            path: path.clone(),
            fd: *fd,
        },
        Operation::Create { path, mode } => OpArgs::Create {
            path: path.clone(),
            mode: *mode,
        },
        Operation::Unlink { path } => OpArgs::Unlink { path: path.clone() },
        Operation::Rename { src, dest } => OpArgs::Rename {
            src: src.clone(),
            dest: dest.clone(),
        },
        Operation::Link { path, dest } => OpArgs::Link {
            path: path.clone(),
            dest: dest.clone(),
        },
        Operation::Symlink { src, dest } => OpArgs::Symlink {
            src: src.clone(),
            dest: dest.clone(),
        },
        Operation::Mkdir { path, mode } => OpArgs::Mkdir {
            path: path.clone(),
            mode: *mode,
        },
        Operation::Rmdir { path } => OpArgs::Rmdir { path: path.clone() },
        Operation::Destroy => OpArgs::Destroy,
    }
}

/// Whether a structured output is meaningful for the given kind.
///
/// A mismatch is tolerated by discarding the output and treating the reply
/// as status-only; handlers should not rely on this.
pub(crate) fn output_matches(kind: OpKind, output: &OpOutput) -> bool {
    matches!(
        (kind, output),
        (OpKind::Getattr | OpKind::Fgetattr, OpOutput::Attr(_))
            | (OpKind::Statfs, OpOutput::Stats(_))
            | (OpKind::Readdir, OpOutput::Entries(_))
            | (OpKind::Open | OpKind::Opendir | OpKind::Create, OpOutput::Fd(_))
            | (OpKind::Readlink, OpOutput::Target(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::FileAttr;
    use std::path::Path;

    #[test]
    fn test_args_kind_matches_operation_kind() {
        let ops = [
            Operation::Init,
            Operation::Getattr {
                path: PathBuf::from("/a"),
            },
            Operation::Rename {
                src: PathBuf::from("/a"),
                dest: PathBuf::from("/b"),
            },
            Operation::Destroy,
        ];
        for op in &ops {
            assert_eq!(args(op).kind(), op.kind());
        }
    }

    #[test]
    fn test_read_args_carry_positional_fields() {
        let mut backing = [0u8; 4];
        let op = Operation::Read {
            path: PathBuf::from("/file"),
            fd: 42,
            buf: unsafe { OpBuffer::from_raw(backing.as_mut_ptr(), backing.len()) },
            size: 4,
            offset: 10,
        };
        match args(&op) {
            OpArgs::Read {
                path,
                fd,
                buf,
                size,
                offset,
            } => {
                assert_eq!(path, Path::new("/file"));
                assert_eq!(fd, 42);
                assert_eq!(buf.len(), 4);
                assert_eq!(size, 4);
                assert_eq!(offset, 10);
            }
            other => panic!("wrong argument shape: {:?}", other),
        }
    }

    #[test]
    fn test_utimens_args_carry_times() {
        let op = Operation::Utimens {
            path: PathBuf::from("/f"),
            atime: TimeSpec::from_millis(1_000),
            mtime: TimeSpec::from_millis(2_000),
        };
        match args(&op) {
            OpArgs::Utimens { atime, mtime, .. } => {
                assert_eq!(atime.as_millis(), 1_000);
                assert_eq!(mtime.as_millis(), 2_000);
            }
            other => panic!("wrong argument shape: {:?}", other),
        }
    }

    #[test]
    fn test_readdir_args_omit_the_filler() {
        let op = Operation::Readdir {
            path: PathBuf::from("/dir"),
            filler: Box::new(|_| false),
        };
        match args(&op) {
            OpArgs::Readdir { path } => assert_eq!(path, Path::new("/dir")),
            other => panic!("wrong argument shape: {:?}", other),
        }
    }

    #[test]
    fn test_output_matches_per_kind() {
        let attr = OpOutput::Attr(FileAttr::default());
        assert!(output_matches(OpKind::Getattr, &attr));
        assert!(output_matches(OpKind::Fgetattr, &attr));
        assert!(!output_matches(OpKind::Read, &attr));

        let fd = OpOutput::Fd(7);
        assert!(output_matches(OpKind::Open, &fd));
        assert!(output_matches(OpKind::Create, &fd));
        assert!(!output_matches(OpKind::Getattr, &fd));

        let entries = OpOutput::Entries(vec!["a".to_string()]);
        assert!(output_matches(OpKind::Readdir, &entries));
        assert!(!output_matches(OpKind::Open, &entries));

        let target = OpOutput::Target("/t".to_string());
        assert!(output_matches(OpKind::Readlink, &target));
        assert!(!output_matches(OpKind::Statfs, &target));
    }
}
