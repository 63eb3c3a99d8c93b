/*
 * Address Space Interface
 *
 * Per-process address spaces are owned by the virtual-memory manager; the
 * scheduler does exactly two things with one. It activates the address
 * space of the incoming process on every context switch, and it drops the
 * owning reference during process teardown, at which point the manager
 * reclaims the page tables.
 */

use alloc::boxed::Box;

/// Interface to one process's virtual address space.
pub trait AddressSpace: Send {
    /// Make this address space the active one (load its hardware root).
    fn activate(&self);
}

/// Owning reference handed to the scheduler at process setup. Dropping it
/// returns the address space to the virtual-memory manager.
pub type AddressSpaceRef = Box<dyn AddressSpace + Send>;
