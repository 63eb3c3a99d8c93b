/*
 * Ember Kernel - Process Manager & Scheduler
 *
 * This crate is the process-management core of the Ember kernel: kernel-level
 * process objects, a preemptive round-robin scheduler driven by the periodic
 * timer interrupt, and the primitives the rest of the kernel uses to block,
 * resume, wait for children, and reap terminated peers.
 *
 * The subsystems it collaborates with (the heap backing store, the
 * virtual-memory manager, the file-descriptor table, working-directory
 * tracking, and the descriptor-table programming) live elsewhere in the
 * kernel and appear here only as interfaces (see `memory`, `io`, and the
 * `arch` facade).
 *
 * Key components:
 * - arch: interrupt-level control, preempt timer, CPU state blobs, ISR
 *   stack plumbing; one backend for bare metal, one deterministic software
 *   model for hosted builds and tests
 * - scheduler: the process table, run ring, wait/dispose queues, and the
 *   full lifecycle API
 * - memory/io: collaborator interfaces the scheduler owns resources through
 * - utils: serial output and the logging facade
 */

#![no_std]
#![allow(dead_code)]

extern crate alloc;

// Pulls in memcpy/memset symbols for bare-metal images.
#[cfg(target_os = "none")]
extern crate rlibc;

#[macro_use]
pub mod utils;

pub mod arch;
pub mod io;
pub mod memory;
pub mod scheduler;
