/*
 * Process Objects
 *
 * This module defines the Process structure and its identity types. A
 * Process is the unit the scheduler multiplexes the CPU over: it owns its
 * saved CPU state, a kernel-mode stack, and the resources the collaborating
 * subsystems hand it (address space, file descriptor table, working
 * directory).
 *
 * Identity is a (slot, generation) pair. The slot indexes the process
 * table; the generation is bumped every time a process departs the slot, so
 * a stale handle can never resolve to a later occupant. There is no
 * reference counting of process objects: generations are the only
 * stale-reference defense, and they make resolution O(1).
 */

use alloc::boxed::Box;
use core::fmt;

use crate::arch::{CpuContext, FpuState};
use crate::io::{FileTableRef, WorkingDirRef};
use crate::memory::AddressSpaceRef;

/// Number of process table slots.
pub const PROCESS_CAPACITY: usize = 1024;

/// Size of each process's kernel-mode stack (64 KiB).
pub const KERNEL_STACK_SIZE: usize = 64 * 1024;

/// Externally visible identity of a process.
///
/// Equality is structural. A handle resolves only while the slot's current
/// generation matches; after the process exits, the slot generation moves
/// on and the handle resolves to nothing, forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle {
    pub(crate) slot: u16,
    pub(crate) generation: u64,
}

impl ProcessHandle {
    /// The handle that resolves to no process.
    pub const INVALID: ProcessHandle = ProcessHandle {
        slot: PROCESS_CAPACITY as u16,
        generation: 0,
    };

    pub fn is_valid(&self) -> bool {
        (self.slot as usize) < PROCESS_CAPACITY
    }
}

impl fmt::Display for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "pid {}:{}", self.slot, self.generation)
        } else {
            write!(f, "pid <invalid>")
        }
    }
}

/// Process state machine.
///
/// `Running` means "linked into the run ring". A new process starts
/// `Sleeping` and enters the ring via resume. `WaitingForChildTerm` is the
/// blocked state a parent sits in until any child exits. `Zombie` is
/// terminal: the process keeps its storage only until the parent reaps it
/// (or the dispose queue drains it, when no parent remains).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Sleeping,
    WaitingForChildTerm,
    Zombie,
}

/// A kernel-scheduled process.
///
/// Resource fields are declared in teardown order (address space, extended
/// state, architectural state, kernel stack, descriptor table, working
/// directory), so dropping the object releases them in exactly that order.
pub struct Process {
    pub pid: ProcessHandle,
    pub ppid: ProcessHandle,
    pub state: ProcessState,

    pub address_space: Option<AddressSpaceRef>,
    pub extended_state: Box<FpuState>,
    pub cpu_context: Box<CpuContext>,
    pub kernel_stack: Box<[u8]>,
    pub fd_table: Option<FileTableRef>,
    pub cwd: Option<WorkingDirRef>,

    // Run-ring links; meaningful only while `state == Running`. Unlinking
    // patches the neighbours but leaves these in place, so the preempt path
    // can still advance off a process that just left the ring.
    pub(crate) next: Option<u16>,
    pub(crate) prev: Option<u16>,

    // Zombie children awaiting reap by this process.
    pub(crate) wait_head: Option<u16>,
    pub(crate) wait_tail: Option<u16>,

    /// Membership link for exactly one of: the parent's wait queue, the
    /// global dispose queue.
    pub(crate) next_in_queue: Option<u16>,

    /// Live children plus zombie children still sitting on the wait queue.
    pub child_count: u32,

    pub return_code: i32,
    pub terminated_normally: bool,
}

impl Process {
    /// Top of this process's kernel stack; syscall entries run on it.
    pub(crate) fn stack_top(&self) -> usize {
        self.kernel_stack.as_ptr() as usize + KERNEL_STACK_SIZE
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("ppid", &self.ppid)
            .field("state", &self.state)
            .field("child_count", &self.child_count)
            .field("return_code", &self.return_code)
            .finish()
    }
}

/// Bare process object for structure-level tests; no table, no scheduler.
#[cfg(test)]
pub(crate) fn test_process(ppid: ProcessHandle) -> Box<Process> {
    Box::new(Process {
        pid: ProcessHandle::INVALID,
        ppid,
        state: ProcessState::Sleeping,
        address_space: None,
        extended_state: Box::new(FpuState::zeroed()),
        cpu_context: Box::new(CpuContext::zeroed()),
        kernel_stack: alloc::vec![0u8; 128].into_boxed_slice(),
        fd_table: None,
        cwd: None,
        next: None,
        prev: None,
        wait_head: None,
        wait_tail: None,
        next_in_queue: None,
        child_count: 0,
        return_code: 0,
        terminated_normally: false,
    })
}
