/*
 * Architecture Facade
 *
 * The scheduler consumes a small, fixed hardware surface: interrupt-level
 * control, a way to trigger the preempt interrupt on demand, the saved
 * architectural and extended CPU state blobs, and the ISR/syscall stack
 * plumbing. This module selects the backend that provides that surface.
 *
 * On bare metal the `x86_64` backend talks to the real machine. Every other
 * build (including `cargo test` on a development host) gets the `hosted`
 * backend, a deterministic software model with the same interface, so the
 * scheduler's semantics can be exercised without hardware.
 */

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub mod x86_64;
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub use self::x86_64::{ARCH_STATE_SIZE, CpuContext, EXT_STATE_SIZE, FpuState, int_level, stacks, timer};

#[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
pub mod hosted;
#[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
pub use self::hosted::{ARCH_STATE_SIZE, CpuContext, EXT_STATE_SIZE, FpuState, int_level, stacks, timer};

/// Signature of the preempt callback the scheduler registers with the timer.
/// The argument is the architectural state frame saved on the stack of the
/// interrupted process; the callback both reads and overwrites it.
pub type PreemptCallback = fn(&mut CpuContext);
