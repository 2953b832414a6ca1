//! Blocking rendezvous between a worker thread and the control thread.
//!
//! Each mount owns a [`SyncPair`]: the primary channel answers every
//! operation, and a dedicated `listing` channel answers directory listings,
//! whose completion requires an extra round of asynchronous fan-out on the
//! control thread and therefore cannot share the primary call/response slot.

use parking_lot::{Condvar, Mutex};

use crate::handler::OpReply;
use crate::op::OpKind;

/// A capacity-one handoff: the control thread posts a value, the worker
/// thread blocks until it arrives.
///
/// The protocol is strict call/response per instance, so at most one value
/// is ever in flight; `post` before `wait` is fine (the value is held until
/// consumed).
pub struct Rendezvous<T> {
    slot: Mutex<Option<T>>,
    ready: Condvar,
}

impl<T> Rendezvous<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    /// Deposits a value and wakes the waiter.
    pub fn post(&self, value: T) {
        let mut slot = self.slot.lock();
        debug_assert!(slot.is_none(), "rendezvous posted twice without a wait");
        *slot = Some(value);
        self.ready.notify_one();
    }

    /// Blocks the calling thread until a value is posted, then takes it.
    pub fn wait(&self) -> T {
        let mut slot = self.slot.lock();
        loop {
            if let Some(value) = slot.take() {
                return value;
            }
            self.ready.wait(&mut slot);
        }
    }
}

impl<T> Default for Rendezvous<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The per-mount synchronization pair.
pub struct SyncPair {
    /// Primary call/response channel.
    pub(crate) call: Rendezvous<OpReply>,
    /// Dedicated channel for directory-listing completion.
    pub(crate) listing: Rendezvous<OpReply>,
}

impl SyncPair {
    pub fn new() -> Self {
        Self {
            call: Rendezvous::new(),
            listing: Rendezvous::new(),
        }
    }

    /// The channel a call of the given kind waits on.
    pub(crate) fn channel_for(&self, kind: OpKind) -> &Rendezvous<OpReply> {
        if kind == OpKind::Readdir {
            &self.listing
        } else {
            &self.call
        }
    }
}

impl Default for SyncPair {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_post_then_wait() {
        let rv = Rendezvous::new();
        rv.post(7u32);
        assert_eq!(rv.wait(), 7);
    }

    #[test]
    fn test_wait_blocks_until_post() {
        let rv = Arc::new(Rendezvous::new());
        let rv2 = Arc::clone(&rv);
        let waiter = thread::spawn(move || rv2.wait());
        thread::sleep(Duration::from_millis(20));
        rv.post(42u32);
        assert_eq!(waiter.join().unwrap(), 42);
    }

    #[test]
    fn test_listing_channel_is_distinct() {
        let pair = SyncPair::new();
        assert!(std::ptr::eq(
            pair.channel_for(OpKind::Readdir),
            &pair.listing
        ));
        assert!(std::ptr::eq(pair.channel_for(OpKind::Read), &pair.call));
        assert!(std::ptr::eq(pair.channel_for(OpKind::Getattr), &pair.call));
    }
}
