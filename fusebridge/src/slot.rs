//! Fixed-capacity registry of live mount instances.

use std::path::Path;
use std::rc::Rc;

use crate::error::BridgeError;
use crate::instance::MountInstance;

/// Default number of concurrently mounted instances.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Slot-indexed registry. A slot index is stable for the lifetime of the
/// instance occupying it and is only reused after that instance has been
/// released.
pub(crate) struct SlotTable {
    slots: Vec<Option<Rc<MountInstance>>>,
    capacity: usize,
}

impl SlotTable {
    pub(crate) fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            capacity,
        }
    }

    /// Allocates the lowest free slot and installs the instance built for
    /// it. Fails once `capacity` instances are live; the builder is not
    /// invoked in that case.
    pub(crate) fn allocate_with(
        &mut self,
        build: impl FnOnce(usize) -> Rc<MountInstance>,
    ) -> Result<Rc<MountInstance>, BridgeError> {
        let slot = match self.slots.iter().position(Option::is_none) {
            Some(free) => free,
            None if self.slots.len() < self.capacity => {
                self.slots.push(None);
                self.slots.len() - 1
            }
            None => return Err(BridgeError::CapacityExhausted(self.capacity)),
        };
        let instance = build(slot);
        self.slots[slot] = Some(Rc::clone(&instance));
        Ok(instance)
    }

    /// Frees a slot, returning the instance that occupied it.
    pub(crate) fn release(&mut self, slot: usize) -> Option<Rc<MountInstance>> {
        self.slots.get_mut(slot).and_then(Option::take)
    }

    pub(crate) fn get(&self, slot: usize) -> Option<Rc<MountInstance>> {
        self.slots.get(slot).and_then(|s| s.as_ref().map(Rc::clone))
    }

    /// Linear scan by mount path, skipping instances already marked
    /// garbage (an unmount for those is in progress).
    pub(crate) fn find_by_path(&self, path: &Path) -> Option<Rc<MountInstance>> {
        self.slots
            .iter()
            .flatten()
            .find(|instance| !instance.is_garbage() && instance.path() == path)
            .map(Rc::clone)
    }

    /// Number of live instances.
    pub(crate) fn live(&self) -> usize {
        self.slots.iter().flatten().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alloc(table: &mut SlotTable, path: &'static str) -> Result<Rc<MountInstance>, BridgeError> {
        table.allocate_with(|slot| MountInstance::stub(slot, path))
    }

    #[test]
    fn test_allocates_lowest_free_slot() {
        let mut table = SlotTable::new();
        let a = alloc(&mut table, "/mnt/a").unwrap();
        let b = alloc(&mut table, "/mnt/b").unwrap();
        let c = alloc(&mut table, "/mnt/c").unwrap();
        assert_eq!((a.slot(), b.slot(), c.slot()), (0, 1, 2));

        table.release(1);
        let d = alloc(&mut table, "/mnt/d").unwrap();
        assert_eq!(d.slot(), 1);
        assert_eq!(table.live(), 3);
    }

    #[test]
    fn test_capacity_is_enforced_and_recoverable() {
        let mut table = SlotTable::new();
        for i in 0..DEFAULT_CAPACITY {
            assert!(alloc(&mut table, "/mnt/x").is_ok(), "allocation {} failed", i);
        }
        assert!(matches!(
            alloc(&mut table, "/mnt/overflow"),
            Err(BridgeError::CapacityExhausted(DEFAULT_CAPACITY))
        ));

        table.release(17);
        let again = alloc(&mut table, "/mnt/again").unwrap();
        assert_eq!(again.slot(), 17);
    }

    #[test]
    fn test_find_by_path_skips_garbage() {
        let mut table = SlotTable::new();
        let a = alloc(&mut table, "/mnt/a").unwrap();
        assert!(table.find_by_path(Path::new("/mnt/a")).is_some());
        assert!(table.find_by_path(Path::new("/mnt/missing")).is_none());

        a.set_garbage(true);
        assert!(table.find_by_path(Path::new("/mnt/a")).is_none());
    }

    #[test]
    fn test_release_unknown_slot_is_none() {
        let mut table = SlotTable::with_capacity(4);
        assert!(table.release(3).is_none());
        assert!(table.get(99).is_none());
    }
}
