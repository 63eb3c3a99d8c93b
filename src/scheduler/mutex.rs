/*
 * Sleeping Mutex
 *
 * A FIFO mutex for kernel paths that may hold a resource across a
 * suspension. Contending processes leave the run ring instead of spinning;
 * release hands the lock directly to the oldest waiter, which is resumed
 * already owning it. Fair by construction: arrival order is wakeup order.
 *
 * The elevation around both operations is what makes the park/handoff pair
 * atomic on the uniprocessor: no preempt can land between enqueueing and
 * leaving the ring, so a wakeup cannot be lost.
 *
 * Not for interrupt context: lock() can block.
 */

use heapless::Deque;
use spin::Mutex;

use super::{ProcessHandle, current_process_id, resume, suspend_self, yield_now};
use crate::arch::int_level::IntLevelGuard;

/// Upper bound on processes parked on one mutex.
const MAX_WAITERS: usize = 32;

struct Inner {
    locked: bool,
    waiters: Deque<ProcessHandle, MAX_WAITERS>,
}

/// FIFO sleeping mutex with direct handoff.
pub struct SleepMutex {
    inner: Mutex<Inner>,
}

impl SleepMutex {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                locked: false,
                waiters: Deque::new(),
            }),
        }
    }

    /// Acquire the mutex, sleeping while another process holds it.
    pub fn lock(&self) {
        loop {
            let _lvl = IntLevelGuard::new();
            let me = current_process_id();
            let parked = {
                let mut inner = self.inner.lock();
                if !inner.locked {
                    inner.locked = true;
                    return;
                }
                inner.waiters.push_back(me).is_ok()
            };
            if parked {
                // The holder hands the lock over before resuming us, so
                // ownership is ours as soon as control returns.
                suspend_self(true);
                return;
            }
            // Waiter queue full; give the holder a chance and retry.
            yield_now();
        }
    }

    /// Release the mutex. The oldest waiter, if any, receives it directly
    /// and re-enters the run ring.
    pub fn unlock(&self) {
        let _lvl = IntLevelGuard::new();
        let next = {
            let mut inner = self.inner.lock();
            match inner.waiters.pop_front() {
                // Ownership passes to the waiter; the mutex stays locked.
                Some(handle) => Some(handle),
                None => {
                    inner.locked = false;
                    None
                }
            }
        };
        if let Some(handle) = next {
            resume(handle);
        }
    }

    pub fn is_locked(&self) -> bool {
        self.inner.lock().locked
    }
}

impl Default for SleepMutex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::testutil::{reinit, tick};
    use crate::scheduler::{ProcessState, make_new_process, with_process_data};
    use crate::utils::testing;

    #[test]
    fn uncontended_lock_never_blocks() {
        let _serial = testing::lock();
        reinit();

        let mutex = SleepMutex::new();
        let before = current_process_id();
        mutex.lock();
        assert!(mutex.is_locked());
        assert_eq!(current_process_id(), before);
        mutex.unlock();
        assert!(!mutex.is_locked());
    }

    #[test]
    fn contended_lock_parks_and_handoff_wakes_fifo() {
        let _serial = testing::lock();
        reinit();

        let kernel = current_process_id();
        let mutex = SleepMutex::new();
        mutex.lock();

        let w1 = make_new_process(kernel);
        let w2 = make_new_process(kernel);
        resume(w1);
        resume(w2);

        // w2 was resumed last, so it runs first; both contend and park. Each
        // park is itself a yield, so the cursor moves on without a tick.
        tick();
        assert_eq!(current_process_id(), w2);
        mutex.lock();
        assert_eq!(with_process_data(w2, |p| p.state), Some(ProcessState::Sleeping));
        assert_eq!(current_process_id(), w1);

        mutex.lock();
        assert_eq!(with_process_data(w1, |p| p.state), Some(ProcessState::Sleeping));
        assert_eq!(current_process_id(), kernel);

        // Handoff order follows arrival order: w2 parked before w1.
        mutex.unlock();
        assert_eq!(with_process_data(w2, |p| p.state), Some(ProcessState::Running));
        assert_eq!(with_process_data(w1, |p| p.state), Some(ProcessState::Sleeping));
        assert!(mutex.is_locked(), "ownership moved, lock never opened");

        tick();
        assert_eq!(current_process_id(), w2);
        mutex.unlock();
        assert_eq!(with_process_data(w1, |p| p.state), Some(ProcessState::Running));

        tick();
        assert_eq!(current_process_id(), w1);
        mutex.unlock();
        assert!(!mutex.is_locked());
    }
}
