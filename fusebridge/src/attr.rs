//! Attribute and statistics types carried across the bridge.
//!
//! These mirror the native `stat`/`statvfs` shapes closely enough that a
//! driver shim can copy them field-for-field into its out-parameters. All
//! fields default to zero so handlers only populate what they know, matching
//! the partial-decode behavior of the native side.

/// A second/nanosecond timestamp with millisecond wire granularity.
///
/// Timestamps cross the bridge as whole milliseconds; sub-millisecond
/// precision is truncated on the way in. `as_millis` and `from_millis`
/// round-trip exactly for any millisecond value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeSpec {
    /// Whole seconds since the epoch.
    pub secs: i64,
    /// Nanoseconds within the second.
    pub nanos: u32,
}

impl TimeSpec {
    /// The epoch.
    pub const ZERO: TimeSpec = TimeSpec { secs: 0, nanos: 0 };

    pub fn new(secs: i64, nanos: u32) -> Self {
        Self { secs, nanos }
    }

    /// Builds a timestamp from whole milliseconds since the epoch.
    pub fn from_millis(millis: u64) -> Self {
        Self {
            secs: (millis / 1_000) as i64,
            nanos: ((millis % 1_000) as u32) * 1_000_000,
        }
    }

    /// Returns the timestamp as whole milliseconds since the epoch.
    ///
    /// Nanosecond precision below one millisecond is discarded.
    pub fn as_millis(&self) -> u64 {
        self.secs as u64 * 1_000 + (self.nanos / 1_000_000) as u64
    }
}

/// File attributes produced by `getattr`/`fgetattr` handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileAttr {
    pub dev: u64,
    pub ino: u64,
    /// File type and permission bits (`st_mode`).
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u64,
    pub size: u64,
    pub blksize: u32,
    pub blocks: u64,
    pub atime: TimeSpec,
    pub mtime: TimeSpec,
    pub ctime: TimeSpec,
}

/// Filesystem statistics produced by `statfs` handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsStats {
    pub bsize: u32,
    pub frsize: u32,
    pub blocks: u64,
    pub bfree: u64,
    pub bavail: u64,
    pub files: u64,
    pub ffree: u64,
    pub favail: u64,
    pub fsid: u32,
    pub flag: u32,
    pub namemax: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timespec_from_millis() {
        let ts = TimeSpec::from_millis(1_234_567);
        assert_eq!(ts.secs, 1_234);
        assert_eq!(ts.nanos, 567_000_000);
    }

    #[test]
    fn test_timespec_millis_round_trip() {
        for millis in [0u64, 1, 999, 1_000, 1_234_567_891_234] {
            assert_eq!(TimeSpec::from_millis(millis).as_millis(), millis);
        }
    }

    #[test]
    fn test_timespec_truncates_sub_millisecond() {
        let ts = TimeSpec::new(1, 999_999);
        assert_eq!(ts.as_millis(), 1_000);
    }

    #[test]
    fn test_file_attr_defaults_to_zero() {
        let attr = FileAttr::default();
        assert_eq!(attr.mode, 0);
        assert_eq!(attr.size, 0);
        assert_eq!(attr.mtime, TimeSpec::ZERO);
    }
}
