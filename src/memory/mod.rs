/*
 * Memory Interfaces
 *
 * The scheduler's two points of contact with memory management:
 *
 * - address_space: the collaborator interface to the virtual-memory
 *   manager's per-process address spaces (activated on context switch,
 *   dropped on process teardown)
 * - heap: the kernel heap on bare metal, plus the fallible allocation
 *   helpers process creation is built on
 */

pub mod address_space;
pub mod heap;

pub use address_space::{AddressSpace, AddressSpaceRef};
