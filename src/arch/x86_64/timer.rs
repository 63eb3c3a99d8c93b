/*
 * Preempt Timer Plumbing
 *
 * The periodic timer (IRQ0) and the voluntary-reschedule software interrupt
 * share one callback: the scheduler's preempt path. The interrupt stubs in
 * the descriptor-table module spill the architectural state, hand a pointer
 * to it through `on_timer_interrupt` / `on_yield_interrupt`, restore the
 * possibly-rewritten frame, and iretq into whichever process the callback
 * chose.
 *
 * `trigger_preempt` fires the software vector with `int`, which the CPU
 * services even while interrupts are masked. That is what lets the
 * scheduler yield from inside an elevation.
 */

use pic8259::ChainedPics;
use spin::Mutex;

use super::CpuContext;
use crate::arch::PreemptCallback;

/// Vector the periodic timer is remapped to (IRQ0).
pub const TIMER_VECTOR: u8 = 0x20;

/// Software vector used for voluntary reschedules.
pub const YIELD_VECTOR: u8 = 0x81;

/// Master/slave PIC pair, remapped to 0x20..0x2f by platform bring-up.
static PICS: Mutex<ChainedPics> = Mutex::new(unsafe { ChainedPics::new(0x20, 0x28) });

static CALLBACK: Mutex<Option<PreemptCallback>> = Mutex::new(None);

/// Register the function the timer interrupts hand the saved frame to.
///
/// # Arguments
///
/// * `callback` - Function given the on-stack frame on every preempt.
///
/// # Returns
///
/// False if a callback is already installed.
pub fn set_callback(callback: PreemptCallback) -> bool {
    let mut slot = CALLBACK.lock();
    if slot.is_some() {
        return false;
    }
    *slot = Some(callback);
    true
}

/// Entered from the IRQ0 stub with the frame saved on the interrupted stack.
///
/// # Arguments
///
/// * `frame` - The architectural state the stub spilled; rewritten in place.
pub fn on_timer_interrupt(frame: &mut CpuContext) {
    let callback = *CALLBACK.lock();
    if let Some(callback) = callback {
        callback(frame);
    }
    unsafe {
        PICS.lock().notify_end_of_interrupt(TIMER_VECTOR);
    }
}

/// Entered from the software-vector stub. No EOI: the PIC was not involved.
pub fn on_yield_interrupt(frame: &mut CpuContext) {
    let callback = *CALLBACK.lock();
    if let Some(callback) = callback {
        callback(frame);
    }
}

/// Request an immediate preempt. The `int` instruction is serviced even with
/// interrupts masked, so this works from inside an elevation.
pub fn trigger_preempt() {
    unsafe {
        core::arch::asm!("int {vector}", vector = const YIELD_VECTOR, options(nomem, nostack));
    }
}
