/*
 * Kernel Heap
 *
 * On bare metal the kernel heap is a linked_list_allocator over a region
 * the memory manager maps and hands in during bring-up; it backs Box, Vec
 * and every other allocation in the kernel. Hosted builds use the host
 * allocator instead, so the global-allocator registration is target-gated.
 *
 * Process creation needs allocation *failure* to be an observable outcome
 * rather than a panic: a kernel that cannot allocate one more process must
 * roll back cleanly and keep running. The try_* helpers below return None
 * on exhaustion; ownership unwinds whatever was already allocated.
 *
 * The alloc_error_handler for bare-metal images is defined by the kernel
 * binary that links this crate, not here.
 */

use alloc::alloc::{alloc, alloc_zeroed};
use alloc::boxed::Box;
use core::alloc::Layout;
use core::ptr;

#[cfg(target_os = "none")]
use linked_list_allocator::LockedHeap;

#[cfg(target_os = "none")]
#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Hand the allocator its backing region.
///
/// # Safety
/// The region must be mapped, writable, unused by anything else, and this
/// must be called exactly once, before the first allocation.
#[cfg(target_os = "none")]
pub unsafe fn init(start: *mut u8, size: usize) {
    log::info!("kernel heap: {} KiB at {:p}", size / 1024, start);
    unsafe { ALLOCATOR.lock().init(start, size) };
}

/// Allocate a zero-filled byte slice, or None when the heap is exhausted.
pub fn try_zeroed_slice(len: usize) -> Option<Box<[u8]>> {
    if len == 0 {
        return Some(alloc::vec::Vec::new().into_boxed_slice());
    }
    let layout = Layout::array::<u8>(len).ok()?;
    let raw = unsafe { alloc_zeroed(layout) };
    if raw.is_null() {
        return None;
    }
    Some(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(raw, len)) })
}

/// Allocate a zero-filled `T`, or None when the heap is exhausted.
///
/// # Safety
/// The all-zero bit pattern must be a valid `T`.
pub unsafe fn try_boxed_zeroed<T>() -> Option<Box<T>> {
    let layout = Layout::new::<T>();
    debug_assert!(layout.size() != 0);
    let raw = unsafe { alloc_zeroed(layout) } as *mut T;
    if raw.is_null() {
        return None;
    }
    Some(unsafe { Box::from_raw(raw) })
}

/// Move `value` to the heap, or None when the heap is exhausted.
pub fn try_boxed<T>(value: T) -> Option<Box<T>> {
    let layout = Layout::new::<T>();
    debug_assert!(layout.size() != 0);
    let raw = unsafe { alloc(layout) } as *mut T;
    if raw.is_null() {
        return None;
    }
    unsafe { raw.write(value) };
    Some(unsafe { Box::from_raw(raw) })
}
