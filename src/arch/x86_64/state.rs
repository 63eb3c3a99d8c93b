/*
 * Saved CPU State
 *
 * Two blobs travel with every process:
 *
 * 1. CpuContext: the architectural state the interrupt entry path spills
 *    onto the stack, all general-purpose registers plus the frame the CPU
 *    pushes itself (RIP, CS, RFLAGS, RSP, SS). The preempt path copies this
 *    structure out of and back into the interrupted stack.
 *
 * 2. FpuState: the FXSAVE area holding x87/SSE state. The FXSAVE and
 *    FXRSTOR instructions require the area to be 16-byte aligned, which is
 *    what the alignment attribute (and the scheduler's alignment check at
 *    process creation) is about.
 */

use bitflags::bitflags;

bitflags! {
    /// RFLAGS bits needed when fabricating a fresh context.
    #[derive(Debug, Clone, Copy)]
    pub struct RFlags: u64 {
        /// Bit 1 reads back as set on every x86 CPU.
        const RESERVED_1 = 1 << 1;
        const INTERRUPT_ENABLE = 1 << 9;
    }
}

/// Frame pushed by the CPU on interrupt entry, in push order.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct InterruptFrame {
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

/// Complete architectural state of an interrupted process: the registers the
/// interrupt stub pushes, then the hardware frame. Layout matches the stack
/// image the stub produces, so the preempt path can treat the on-stack frame
/// and the per-process copy interchangeably.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CpuContext {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rbp: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rbx: u64,
    pub rax: u64,
    pub frame: InterruptFrame,
}

/// Size of the architectural state blob.
pub const ARCH_STATE_SIZE: usize = core::mem::size_of::<CpuContext>();

impl CpuContext {
    pub const fn zeroed() -> Self {
        Self {
            r15: 0,
            r14: 0,
            r13: 0,
            r12: 0,
            r11: 0,
            r10: 0,
            r9: 0,
            r8: 0,
            rbp: 0,
            rdi: 0,
            rsi: 0,
            rdx: 0,
            rcx: 0,
            rbx: 0,
            rax: 0,
            frame: InterruptFrame {
                rip: 0,
                cs: 0,
                rflags: 0,
                rsp: 0,
                ss: 0,
            },
        }
    }

    /// Context that enters `entry` on `stack_top` with interrupts enabled,
    /// as if the code there had just been interrupted.
    pub fn with_entry(entry: u64, stack_top: u64) -> Self {
        let mut ctx = Self::zeroed();
        ctx.frame.rip = entry;
        ctx.frame.cs = 0x08; // kernel code segment
        ctx.frame.rflags = (RFlags::RESERVED_1 | RFlags::INTERRUPT_ENABLE).bits();
        ctx.frame.rsp = stack_top;
        ctx.frame.ss = 0x10; // kernel data segment
        ctx
    }
}

/// FXSAVE area: x87/SSE state, 512 bytes, 16-byte aligned.
#[repr(C, align(16))]
#[derive(Clone, Copy)]
pub struct FpuState {
    area: [u8; 512],
}

/// Size of the extended state blob.
pub const EXT_STATE_SIZE: usize = core::mem::size_of::<FpuState>();

impl FpuState {
    pub const fn zeroed() -> Self {
        Self { area: [0; 512] }
    }

    /// Snapshot the live extended CPU state into this blob.
    pub fn save(&mut self) {
        unsafe {
            core::arch::asm!("fxsave64 [{}]", in(reg) self.area.as_mut_ptr(), options(nostack));
        }
    }

    /// Load this blob into the extended CPU state.
    pub fn restore(&self) {
        unsafe {
            core::arch::asm!("fxrstor64 [{}]", in(reg) self.area.as_ptr(), options(nostack));
        }
    }

    pub fn as_bytes(&self) -> &[u8; 512] {
        &self.area
    }
}
