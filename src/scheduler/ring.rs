/*
 * Run Ring
 *
 * The scheduler's ready set: a circular doubly-linked list threaded through
 * every Running process via its next/prev fields. Links are slot indices
 * into the process table, so no raw pointers cross the structure.
 *
 * The ring's cursor (the currently executing process) lives in the
 * scheduler; the operations here only edit links. New runnables are spliced
 * in directly after the given position, so a process resumed by the current
 * one runs next: FIFO among same-tick wakers with a stable cursor.
 *
 * All operations run under an interrupt-level elevation.
 */

use super::table::ProcessTable;

impl ProcessTable {
    /// Make `slot` a ring of one, linked to itself. Bootstrap only.
    pub(crate) fn ring_init_single(&mut self, slot: u16) {
        let p = self.proc_mut(slot);
        p.next = Some(slot);
        p.prev = Some(slot);
    }

    /// Splice `slot` in directly after `at`.
    pub(crate) fn ring_insert_after(&mut self, at: u16, slot: u16) {
        let Some(after) = self.proc(at).next else {
            debug_assert!(false, "ring insert at a position that is not linked");
            return;
        };
        {
            let p = self.proc_mut(slot);
            p.prev = Some(at);
            p.next = Some(after);
        }
        self.proc_mut(at).next = Some(slot);
        self.proc_mut(after).prev = Some(slot);
    }

    /// Unlink `slot` from the ring. Its own links are left in place so the
    /// preempt path can advance off a process that just departed.
    pub(crate) fn ring_unlink(&mut self, slot: u16) {
        let (Some(prev), Some(next)) = (self.proc(slot).prev, self.proc(slot).next) else {
            debug_assert!(false, "ring unlink of a process that is not linked");
            return;
        };
        self.proc_mut(prev).next = Some(next);
        self.proc_mut(next).prev = Some(prev);
    }

    /// The ring members reachable from `start`, in run order.
    #[cfg(test)]
    pub(crate) fn ring_members(&self, start: u16) -> alloc::vec::Vec<u16> {
        let mut members = alloc::vec::Vec::new();
        let mut at = start;
        loop {
            assert!(
                !members.contains(&at),
                "ring revisited slot {at} before closing the cycle"
            );
            members.push(at);
            at = self.proc(at).next.expect("ring link missing");
            if at == start {
                break;
            }
        }
        members
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::process::{ProcessHandle, test_process};

    fn table_with(n: usize) -> (ProcessTable, alloc::vec::Vec<u16>) {
        let mut table = ProcessTable::new();
        let mut slots = alloc::vec::Vec::new();
        for _ in 0..n {
            let handle = table.allocate(test_process(ProcessHandle::INVALID)).unwrap();
            slots.push(handle.slot);
        }
        (table, slots)
    }

    #[test]
    fn insert_after_keeps_run_order() {
        let (mut table, s) = table_with(4);
        table.ring_init_single(s[0]);

        // Splicing after the same position reverses into "runs next" order.
        table.ring_insert_after(s[0], s[1]);
        table.ring_insert_after(s[0], s[2]);
        table.ring_insert_after(s[0], s[3]);
        assert_eq!(table.ring_members(s[0]), [s[0], s[3], s[2], s[1]]);
    }

    #[test]
    fn unlink_leaves_departing_links_usable() {
        let (mut table, s) = table_with(3);
        table.ring_init_single(s[0]);
        table.ring_insert_after(s[0], s[1]);
        table.ring_insert_after(s[1], s[2]);

        table.ring_unlink(s[1]);
        assert_eq!(table.ring_members(s[0]), [s[0], s[2]]);

        // The departed process still knows where the ring continues.
        assert_eq!(table.proc(s[1]).next, Some(s[2]));
        assert_eq!(table.proc(s[1]).prev, Some(s[0]));
    }

    #[test]
    fn unlink_of_a_pair_collapses_to_self_loop() {
        let (mut table, s) = table_with(2);
        table.ring_init_single(s[0]);
        table.ring_insert_after(s[0], s[1]);

        table.ring_unlink(s[1]);
        assert_eq!(table.ring_members(s[0]), [s[0]]);
        assert_eq!(table.proc(s[0]).next, Some(s[0]));
        assert_eq!(table.proc(s[0]).prev, Some(s[0]));
    }

    #[test]
    fn resume_then_suspend_leaves_ring_unchanged() {
        let (mut table, s) = table_with(3);
        table.ring_init_single(s[0]);
        table.ring_insert_after(s[0], s[1]);
        let before = table.ring_members(s[0]);

        table.ring_insert_after(s[0], s[2]);
        table.ring_unlink(s[2]);
        assert_eq!(table.ring_members(s[0]), before);
    }
}
