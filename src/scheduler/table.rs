/*
 * Process Table
 *
 * Fixed-capacity slot array indexed by pid slot. Each slot owns its process
 * object and carries the slot's current generation; a handle resolves only
 * while its generation matches. The generation is bumped when the process
 * exits (not when its storage is reclaimed), so a zombie is unreachable by
 * pid from the moment it terminates.
 *
 * The object stays in its slot until final teardown: the run ring and the
 * wait/dispose queues address processes by slot index, and those indices
 * must stay stable for as long as anything links to them. The slot becomes
 * allocatable again once the object is removed.
 *
 * Every access runs under an interrupt-level elevation; the table itself
 * takes no locks.
 */

use alloc::boxed::Box;
use heapless::Vec;

use super::process::{PROCESS_CAPACITY, Process, ProcessHandle};

/// One pid slot: the owned process object, if any, and the slot's current
/// generation.
pub(crate) struct TableSlot {
    pub entry: Option<Box<Process>>,
    pub generation: u64,
}

/// Fixed-capacity process table.
pub(crate) struct ProcessTable {
    slots: Vec<TableSlot, PROCESS_CAPACITY>,
}

impl ProcessTable {
    pub fn new() -> Self {
        let mut slots = Vec::new();
        for _ in 0..PROCESS_CAPACITY {
            let _ = slots.push(TableSlot {
                entry: None,
                generation: 0,
            });
        }
        Self { slots }
    }

    /// Linear scan for a free slot. Installs the process and stamps its
    /// pid from the slot's current generation.
    ///
    /// # Arguments
    ///
    /// * `process` - The process object to take ownership of.
    ///
    /// # Returns
    ///
    /// The minted handle, or None when the table is full (the process is
    /// dropped, which unwinds its allocations).
    pub fn allocate(&mut self, mut process: Box<Process>) -> Option<ProcessHandle> {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.entry.is_none() {
                let handle = ProcessHandle {
                    slot: index as u16,
                    generation: slot.generation,
                };
                process.pid = handle;
                slot.entry = Some(process);
                return Some(handle);
            }
        }
        None
    }

    /// Resolve a handle: occupied slot with a matching generation, or
    /// nothing. Stale and invalid handles fall out here.
    pub fn lookup(&self, handle: ProcessHandle) -> Option<&Process> {
        let slot = self.slots.get(handle.slot as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_deref()
    }

    pub fn lookup_mut(&mut self, handle: ProcessHandle) -> Option<&mut Process> {
        let slot = self.slots.get_mut(handle.slot as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_deref_mut()
    }

    /// Resolve a handle to its slot index.
    pub fn resolve(&self, handle: ProcessHandle) -> Option<u16> {
        self.lookup(handle).map(|_| handle.slot)
    }

    /// Retire the pid: bump the slot's generation so no existing handle
    /// resolves here again. The object itself stays put.
    pub fn retire(&mut self, slot: u16) {
        let slot = &mut self.slots[slot as usize];
        slot.generation = slot.generation.wrapping_add(1);
    }

    /// Remove and return the owned process object, freeing the slot for
    /// reallocation.
    pub fn remove(&mut self, slot: u16) -> Option<Box<Process>> {
        self.slots[slot as usize].entry.take()
    }

    /// Direct access for the intrusive structures. The slot must be
    /// occupied: these are index-validity invariants, not lookups.
    pub fn proc(&self, slot: u16) -> &Process {
        self.slots[slot as usize]
            .entry
            .as_deref()
            .expect("empty process slot behind an intrusive link")
    }

    pub fn proc_mut(&mut self, slot: u16) -> &mut Process {
        self.slots[slot as usize]
            .entry
            .as_deref_mut()
            .expect("empty process slot behind an intrusive link")
    }

    /// Occupied slot indices, for structural checks.
    #[cfg(test)]
    pub fn occupied(&self) -> alloc::vec::Vec<u16> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.entry.is_some())
            .map(|(i, _)| i as u16)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::process::test_process;

    #[test]
    fn allocate_mints_handles_from_slot_generations() {
        let mut table = ProcessTable::new();

        let first = table.allocate(test_process(ProcessHandle::INVALID)).unwrap();
        assert_eq!(first.slot, 0);
        assert_eq!(first.generation, 0);

        let second = table.allocate(test_process(first)).unwrap();
        assert_eq!(second.slot, 1);
        assert!(table.lookup(second).is_some());
        assert_eq!(table.lookup(second).unwrap().ppid, first);
    }

    #[test]
    fn retired_handles_never_resolve_again() {
        let mut table = ProcessTable::new();
        let handle = table.allocate(test_process(ProcessHandle::INVALID)).unwrap();

        table.retire(handle.slot);
        assert!(table.lookup(handle).is_none(), "retired pid must not resolve");

        // The object is still there for the queues; only resolution is gone.
        assert_eq!(table.proc(handle.slot).pid, handle);

        // Reclaim, reallocate: same slot, next generation; the old handle
        // still resolves to nothing.
        table.remove(handle.slot);
        let reused = table.allocate(test_process(ProcessHandle::INVALID)).unwrap();
        assert_eq!(reused.slot, handle.slot);
        assert_eq!(reused.generation, handle.generation + 1);
        assert!(table.lookup(handle).is_none());
        assert!(table.lookup(reused).is_some());
    }

    #[test]
    fn allocate_fails_when_full() {
        let mut table = ProcessTable::new();
        for _ in 0..PROCESS_CAPACITY {
            assert!(table.allocate(test_process(ProcessHandle::INVALID)).is_some());
        }
        assert!(table.allocate(test_process(ProcessHandle::INVALID)).is_none());

        // Freeing any slot makes allocation possible again.
        table.remove(7);
        let handle = table.allocate(test_process(ProcessHandle::INVALID)).unwrap();
        assert_eq!(handle.slot, 7);
    }

    #[test]
    fn invalid_handle_resolves_to_nothing() {
        let table = ProcessTable::new();
        assert!(table.lookup(ProcessHandle::INVALID).is_none());
        assert!(table.resolve(ProcessHandle::INVALID).is_none());
    }
}
