/*
 * Test Serialization
 *
 * The scheduler and the hosted architecture model are process-wide
 * singletons. The test harness runs tests on multiple threads, so every
 * test that touches either takes this lock first.
 */

use spin::{Mutex, MutexGuard};

static GLOBAL: Mutex<()> = Mutex::new(());

pub fn lock() -> MutexGuard<'static, ()> {
    GLOBAL.lock()
}
