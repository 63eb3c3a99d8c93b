/*
 * ISR Stack Plumbing
 *
 * Two stack tops are published here and consumed by the interrupt entry
 * paths wired up in the descriptor-table module:
 *
 * - the dedicated scheduler interrupt stack, set once at scheduler init
 * - the syscall entry stack, which follows the current process across
 *   every context switch (its kernel stack top)
 */

use core::sync::atomic::{AtomicU64, Ordering};

static ISR_STACK_TOP: AtomicU64 = AtomicU64::new(0);
static SYSCALL_STACK_TOP: AtomicU64 = AtomicU64::new(0);

/// Publish the top of the dedicated scheduler interrupt stack.
pub fn set_isr_stack(top: usize) {
    ISR_STACK_TOP.store(top as u64, Ordering::SeqCst);
}

/// Publish the stack top syscall entries for the current process switch to.
pub fn set_syscalls_stack(top: usize) {
    SYSCALL_STACK_TOP.store(top as u64, Ordering::SeqCst);
}

pub fn isr_stack() -> usize {
    ISR_STACK_TOP.load(Ordering::SeqCst) as usize
}

pub fn syscalls_stack() -> usize {
    SYSCALL_STACK_TOP.load(Ordering::SeqCst) as usize
}
