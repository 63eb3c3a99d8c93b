/*
 * x86_64 Architecture Backend
 *
 * Bare-metal implementation of the surface the scheduler consumes:
 * - int_level: raise/lower the CPU interrupt-masking level
 * - state: the saved architectural frame and the FXSAVE extended-state area
 * - timer: preempt callback registration and the voluntary-reschedule interrupt
 * - stacks: ISR and per-process syscall stack tops
 *
 * The IDT and GDT themselves are programmed by the descriptor-table module
 * of the kernel image; this backend only provides the entry points and the
 * values those tables consume.
 */

pub mod int_level;
pub mod stacks;
pub mod timer;

mod state;

pub use state::{ARCH_STATE_SIZE, CpuContext, EXT_STATE_SIZE, FpuState, InterruptFrame};
