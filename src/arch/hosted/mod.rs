/*
 * Hosted Architecture Model
 *
 * A deterministic software model of the surface the scheduler consumes,
 * used on every build that is not bare metal, most importantly `cargo
 * test` on a development host. The model keeps the real backend's contract:
 *
 * - the interrupt-enable flag is a plain bit; elevations stack
 * - `trigger_preempt` services the registered callback synchronously and
 *   regardless of the interrupt level, like the `int` instruction
 * - extended state moves between a simulated FPU register file and the
 *   per-process blobs
 *
 * One contract cannot be modeled: a real preempt abandons the interrupted
 * control flow until the process is scheduled again, while here
 * `trigger_preempt` returns to its caller. Callers that never regain
 * control on hardware (a process that exited, a process that suspended
 * itself) do return here; tests account for that.
 */

use bitflags::bitflags;
use spin::Mutex;

bitflags! {
    /// Flag bits of the modeled CPU.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CpuFlags: u64 {
        const INTERRUPT_ENABLE = 1 << 9;
    }
}

/// Architectural state of the modeled CPU: a register file plus the frame
/// fields an interrupt would save.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuContext {
    pub gpr: [u64; 15],
    pub ip: u64,
    pub sp: u64,
    pub flags: u64,
}

/// Size of the architectural state blob.
pub const ARCH_STATE_SIZE: usize = core::mem::size_of::<CpuContext>();

impl CpuContext {
    pub const fn zeroed() -> Self {
        Self {
            gpr: [0; 15],
            ip: 0,
            sp: 0,
            flags: 0,
        }
    }

    /// Context that enters `entry` on `stack_top` with interrupts enabled.
    pub fn with_entry(entry: u64, stack_top: u64) -> Self {
        let mut ctx = Self::zeroed();
        ctx.ip = entry;
        ctx.sp = stack_top;
        ctx.flags = CpuFlags::INTERRUPT_ENABLE.bits();
        ctx
    }
}

/// Extended-state blob, same size and alignment contract as the FXSAVE area.
#[repr(C, align(16))]
#[derive(Clone, Copy)]
pub struct FpuState {
    area: [u8; 512],
}

/// Size of the extended state blob.
pub const EXT_STATE_SIZE: usize = core::mem::size_of::<FpuState>();

/// The modeled FPU register file.
static SIM_FPU: Mutex<FpuState> = Mutex::new(FpuState::zeroed());

impl FpuState {
    pub const fn zeroed() -> Self {
        Self { area: [0; 512] }
    }

    /// Snapshot the modeled extended CPU state into this blob.
    pub fn save(&mut self) {
        *self = *SIM_FPU.lock();
    }

    /// Load this blob into the modeled extended CPU state.
    pub fn restore(&self) {
        *SIM_FPU.lock() = *self;
    }

    pub fn as_bytes(&self) -> &[u8; 512] {
        &self.area
    }
}

/// Fill the modeled FPU register file (test hook).
pub fn set_sim_fpu(byte: u8) {
    SIM_FPU.lock().area = [byte; 512];
}

pub mod int_level {
    use core::sync::atomic::{AtomicBool, Ordering};

    static INT_ENABLED: AtomicBool = AtomicBool::new(true);

    /// Prior interrupt-masking state returned by [`elevate`].
    #[derive(Debug, Clone, Copy)]
    pub struct SavedLevel {
        enabled: bool,
    }

    /// Mask interrupts on the modeled CPU and report the prior level.
    ///
    /// # Returns
    ///
    /// The prior level, to be handed back to [`recover`].
    pub fn elevate() -> SavedLevel {
        let enabled = INT_ENABLED.swap(false, Ordering::SeqCst);
        SavedLevel { enabled }
    }

    /// Restore the level returned by the matching [`elevate`].
    ///
    /// # Arguments
    ///
    /// * `level` - The saved level from the matching elevation.
    pub fn recover(level: SavedLevel) {
        INT_ENABLED.store(level.enabled, Ordering::SeqCst);
    }

    pub fn are_enabled() -> bool {
        INT_ENABLED.load(Ordering::SeqCst)
    }

    /// RAII elevation; recovered on drop.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ember_kernel_rust::arch::int_level::IntLevelGuard;
    ///
    /// let _guard = IntLevelGuard::new();
    /// // Critical section - the modeled timer cannot preempt here
    /// ```
    pub struct IntLevelGuard {
        saved: SavedLevel,
    }

    impl IntLevelGuard {
        pub fn new() -> Self {
            Self { saved: elevate() }
        }
    }

    impl Default for IntLevelGuard {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Drop for IntLevelGuard {
        fn drop(&mut self) {
            recover(self.saved);
        }
    }

    pub(super) fn reset() {
        INT_ENABLED.store(true, Ordering::SeqCst);
    }
}

pub mod timer {
    use spin::Mutex;

    use super::CpuContext;
    use crate::arch::PreemptCallback;

    static CALLBACK: Mutex<Option<PreemptCallback>> = Mutex::new(None);

    /// Frame of the context currently running on the modeled CPU. A trigger
    /// hands a copy to the callback and stores back whatever it rewrote, the
    /// way the interrupt stub treats the on-stack frame.
    static LIVE_FRAME: Mutex<CpuContext> = Mutex::new(CpuContext::zeroed());

    /// Register the preempt callback.
    ///
    /// # Arguments
    ///
    /// * `callback` - Function handed the live frame on every trigger.
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

    /// Service the preempt interrupt synchronously, regardless of the
    /// interrupt level: the modeled `int` instruction.
    pub fn trigger_preempt() {
        let callback = *CALLBACK.lock();
        if let Some(callback) = callback {
            let mut frame = *LIVE_FRAME.lock();
            callback(&mut frame);
            *LIVE_FRAME.lock() = frame;
        }
    }

    /// Frame of the modeled CPU (test hook).
    pub fn live_frame() -> CpuContext {
        *LIVE_FRAME.lock()
    }

    /// Replace the frame of the modeled CPU (test hook).
    pub fn set_live_frame(frame: CpuContext) {
        *LIVE_FRAME.lock() = frame;
    }

    pub(super) fn reset() {
        *CALLBACK.lock() = None;
        *LIVE_FRAME.lock() = CpuContext::zeroed();
    }
}

pub mod stacks {
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

    pub(super) fn reset() {
        ISR_STACK_TOP.store(0, Ordering::SeqCst);
        SYSCALL_STACK_TOP.store(0, Ordering::SeqCst);
    }
}

/// Return the whole model to its power-on state (test hook).
pub fn reset() {
    int_level::reset();
    timer::reset();
    stacks::reset();
    *SIM_FPU.lock() = FpuState::zeroed();
}
