/*
 * Wait and Dispose Queues
 *
 * Two singly-linked FIFOs share the per-process `next_in_queue` link, and a
 * process sits on at most one of them at a time:
 *
 * - each process's wait queue holds its zombie children until the parent
 *   reaps them
 * - the global dispose queue holds processes whose storage is to be torn
 *   down at idle time (orphaned zombies, reaped children, and the unreaped
 *   zombies an exiting parent leaves behind)
 *
 * A zombie is never on the run ring, so queue membership and ring
 * membership are mutually exclusive by construction.
 *
 * All operations run under an interrupt-level elevation.
 */

use super::table::ProcessTable;

impl ProcessTable {
    /// Append `child` to `parent`'s wait queue of zombie children.
    pub(crate) fn wait_push_back(&mut self, parent: u16, child: u16) {
        self.proc_mut(child).next_in_queue = None;
        match self.proc(parent).wait_tail {
            None => {
                let p = self.proc_mut(parent);
                p.wait_head = Some(child);
                p.wait_tail = Some(child);
            }
            Some(tail) => {
                self.proc_mut(tail).next_in_queue = Some(child);
                self.proc_mut(parent).wait_tail = Some(child);
            }
        }
    }

    /// Dequeue the oldest zombie child, if any. Emptying the queue clears
    /// both ends.
    pub(crate) fn wait_pop_front(&mut self, parent: u16) -> Option<u16> {
        let head = self.proc(parent).wait_head?;
        let next = self.proc_mut(head).next_in_queue.take();
        let p = self.proc_mut(parent);
        p.wait_head = next;
        if next.is_none() {
            p.wait_tail = None;
        }
        Some(head)
    }

    /// Members of `parent`'s wait queue, oldest first.
    #[cfg(test)]
    pub(crate) fn wait_members(&self, parent: u16) -> alloc::vec::Vec<u16> {
        let mut members = alloc::vec::Vec::new();
        let mut at = self.proc(parent).wait_head;
        while let Some(slot) = at {
            members.push(slot);
            at = self.proc(slot).next_in_queue;
        }
        members
    }
}

/// Global FIFO of processes awaiting storage teardown.
pub(crate) struct DisposeQueue {
    head: Option<u16>,
    tail: Option<u16>,
}

impl DisposeQueue {
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Append one process.
    pub fn push_back(&mut self, table: &mut ProcessTable, slot: u16) {
        table.proc_mut(slot).next_in_queue = None;
        match self.tail {
            None => {
                self.head = Some(slot);
                self.tail = Some(slot);
            }
            Some(tail) => {
                table.proc_mut(tail).next_in_queue = Some(slot);
                self.tail = Some(slot);
            }
        }
    }

    /// Move a whole wait-queue chain onto the back of this queue in one
    /// splice. The chain keeps its internal links; its tail must already
    /// terminate the list.
    pub fn append_chain(&mut self, table: &mut ProcessTable, chain_head: u16, chain_tail: u16) {
        debug_assert!(table.proc(chain_tail).next_in_queue.is_none());
        match self.tail {
            None => self.head = Some(chain_head),
            Some(tail) => table.proc_mut(tail).next_in_queue = Some(chain_head),
        }
        self.tail = Some(chain_tail);
    }

    /// Pop the oldest entry.
    pub fn pop_front(&mut self, table: &mut ProcessTable) -> Option<u16> {
        let head = self.head?;
        let next = table.proc_mut(head).next_in_queue.take();
        self.head = next;
        if next.is_none() {
            self.tail = None;
        }
        Some(head)
    }

    /// Queue members, oldest first.
    #[cfg(test)]
    pub fn members(&self, table: &ProcessTable) -> alloc::vec::Vec<u16> {
        let mut members = alloc::vec::Vec::new();
        let mut at = self.head;
        while let Some(slot) = at {
            members.push(slot);
            at = table.proc(slot).next_in_queue;
        }
        members
    }
}
