/*
 * Preemptive Process Manager & Round-Robin Scheduler
 *
 * This module owns the lifecycle of kernel-level processes and multiplexes
 * the single hardware execution context over them.
 *
 * SCHEDULING MODEL:
 * ================
 *
 * Running processes form a circular doubly-linked ring. A cursor names the
 * process executing right now; every timer tick the preempt path saves the
 * interrupted state, advances the cursor one step, and loads the next
 * process's state into the interrupted frame. Round-robin, no priorities,
 * no accounting.
 *
 * CONCURRENCY DISCIPLINE:
 * ======================
 *
 * There is no parallelism, only the interleaving of thread context and
 * interrupt context. Every mutation of shared scheduler state happens
 * inside an interrupt-level elevation, which masks the timer; the spin lock
 * around the singleton is therefore uncontended by construction and exists
 * to give Rust an exclusive borrow. The preempt path runs with interrupts
 * already disabled and takes the same lock.
 *
 * One rule keeps the voluntary-reschedule path sound: the scheduler lock is
 * always released before the preempt interrupt is triggered. The elevation
 * can stay held across the trigger (the `int` instruction fires regardless
 * of the masking level).
 *
 * PROCESS LIFECYCLE:
 * =================
 *
 *   Sleeping --resume--> Running --suspend--> Sleeping | WaitingForChildTerm
 *   any live state --exit--> Zombie --reap/orphan--> dispose queue --poll--> gone
 *
 * A zombie parks on its parent's wait queue until the parent reaps it and
 * reads the exit status; orphaned zombies go straight to the dispose queue.
 * The dispose queue is drained at idle time, outside interrupt context,
 * because teardown gives memory back to collaborating subsystems.
 *
 * Identity is (slot, generation): the generation is bumped the moment a
 * process exits, so its pid resolves to nothing from that point on. There
 * is no window in which a recycled slot can be confused with its previous
 * occupant.
 */

pub mod mutex;
pub mod process;

mod queues;
mod ring;
mod table;

pub use process::{KERNEL_STACK_SIZE, PROCESS_CAPACITY, Process, ProcessHandle, ProcessState};

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

use spin::Mutex;

use crate::arch::{self, CpuContext, FpuState};
use crate::arch::int_level::IntLevelGuard;
use crate::memory::AddressSpaceRef;
use crate::memory::heap;
use queues::DisposeQueue;
use table::ProcessTable;

/// Size of the dedicated scheduler interrupt stack (64 KiB).
pub const SCHEDULER_STACK_SIZE: usize = 64 * 1024;

/// Scheduler singleton: the process table, the run-ring cursor, and the
/// dispose queue.
struct Scheduler {
    table: ProcessTable,
    /// Slot of the currently executing process. Its `next` is what runs
    /// after the next preempt.
    current: u16,
    dispose: DisposeQueue,
}

static SCHEDULER: Mutex<Option<Scheduler>> = Mutex::new(None);
static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Dedicated stack the preempt path runs on.
#[repr(C, align(16))]
struct AlignedStack(UnsafeCell<[u8; SCHEDULER_STACK_SIZE]>);

unsafe impl Sync for AlignedStack {}

static SCHEDULER_STACK: AlignedStack = AlignedStack(UnsafeCell::new([0; SCHEDULER_STACK_SIZE]));

/// True once [`init`] has completed.
pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::SeqCst)
}

/// Run `f` against the singleton. Callers hold the elevation; this helper
/// only takes the lock.
fn with_scheduler<R>(f: impl FnOnce(&mut Scheduler) -> R) -> Option<R> {
    let mut guard = SCHEDULER.lock();
    guard.as_mut().map(f)
}

// ============================================================================
// INITIALIZATION
// ============================================================================

/// Bring up process management.
///
/// Creates the kernel bootstrap process as a self-looped run ring, adopts
/// `kernel_address_space` (the virtual-memory manager's wrapper around the
/// active hardware root) as its address space, publishes the dedicated
/// interrupt stack, and registers the preempt path as the timer callback.
///
/// Bootstrap failures cannot be rolled back; they are logged at error
/// severity and the kernel continues in a degraded state.
///
/// # Arguments
///
/// * `kernel_address_space` - Owning wrapper around the address space that
///   is live at bring-up; adopted by the kernel bootstrap process.
pub fn init(kernel_address_space: AddressSpaceRef) {
    {
        let _lvl = IntLevelGuard::new();
        let mut guard = SCHEDULER.lock();
        if guard.is_some() {
            log::warn!("process manager already initialized");
            return;
        }
        *guard = Some(Scheduler {
            table: ProcessTable::new(),
            current: 0,
            dispose: DisposeQueue::new(),
        });
    }

    let kernel_pid = make_new_process(ProcessHandle::INVALID);
    if !kernel_pid.is_valid() {
        log::error!("failed to allocate the kernel bootstrap process");
        return;
    }

    {
        let _lvl = IntLevelGuard::new();
        with_scheduler(|s| {
            let slot = kernel_pid.slot;
            {
                let kernel = s.table.proc_mut(slot);
                kernel.state = ProcessState::Running;
                kernel.address_space = Some(kernel_address_space);
            }
            s.table.ring_init_single(slot);
            s.current = slot;
        });
    }

    let stack_top = SCHEDULER_STACK.0.get() as usize + SCHEDULER_STACK_SIZE;
    arch::stacks::set_isr_stack(stack_top);

    if !arch::timer::set_callback(preempt) {
        log::error!("failed to register the preempt timer callback");
    }

    INITIALIZED.store(true, Ordering::SeqCst);
    log::info!("process manager initialized ({PROCESS_CAPACITY} slots)");
}

// ============================================================================
// PROCESS CREATION
// ============================================================================

/// Create a new process in the `Sleeping` state and return its handle.
///
/// Four allocations back a process: the object itself, its kernel stack,
/// the architectural state blob (zeroed), and the extended state blob. If
/// any of them fails, everything already allocated is released and the
/// invalid handle is returned; the same happens when the table is full.
///
/// # Arguments
///
/// * `parent` - Handle of the creating process; if it resolves, its child
///   count is charged with the new process.
///
/// # Returns
///
/// The new process's handle, or [`ProcessHandle::INVALID`] on failure.
pub fn make_new_process(parent: ProcessHandle) -> ProcessHandle {
    // Allocations happen outside the elevation; an early return unwinds the
    // ones already made.
    let Some(kernel_stack) = heap::try_zeroed_slice(KERNEL_STACK_SIZE) else {
        return ProcessHandle::INVALID;
    };
    let Some(cpu_context) = (unsafe { heap::try_boxed_zeroed::<CpuContext>() }) else {
        return ProcessHandle::INVALID;
    };
    let Some(extended_state) = (unsafe { heap::try_boxed_zeroed::<FpuState>() }) else {
        return ProcessHandle::INVALID;
    };

    let extended_ptr: *const FpuState = &*extended_state;
    if extended_ptr as usize % 16 != 0 {
        log::error!("extended state blob is not 16-byte aligned");
    }

    let Some(new_process) = heap::try_boxed(Process {
        pid: ProcessHandle::INVALID,
        ppid: parent,
        state: ProcessState::Sleeping,
        address_space: None,
        extended_state,
        cpu_context,
        kernel_stack,
        fd_table: None,
        cwd: None,
        next: None,
        prev: None,
        wait_head: None,
        wait_tail: None,
        next_in_queue: None,
        child_count: 0,
        return_code: 0,
        terminated_normally: false,
    }) else {
        return ProcessHandle::INVALID;
    };

    let _lvl = IntLevelGuard::new();
    let handle = with_scheduler(|s| {
        let handle = s.table.allocate(new_process)?;
        if let Some(parent_slot) = s.table.resolve(parent) {
            s.table.proc_mut(parent_slot).child_count += 1;
        }
        Some(handle)
    })
    .flatten();

    handle.unwrap_or(ProcessHandle::INVALID)
}

// ============================================================================
// HANDLES AND ACCESS
// ============================================================================

/// Identity of the currently executing process.
pub fn current_process_id() -> ProcessHandle {
    let _lvl = IntLevelGuard::new();
    with_scheduler(|s| s.table.proc(s.current).pid).unwrap_or(ProcessHandle::INVALID)
}

/// Run `f` against the process `handle` resolves to. Access is
/// closure-scoped because a reference into the table cannot outlive the
/// elevation.
///
/// # Arguments
///
/// * `handle` - The process identity to resolve.
/// * `f` - Closure that receives a reference to the process.
///
/// # Returns
///
/// The result of the closure, or None for a stale or invalid handle.
pub fn with_process_data<R>(handle: ProcessHandle, f: impl FnOnce(&Process) -> R) -> Option<R> {
    let _lvl = IntLevelGuard::new();
    with_scheduler(|s| s.table.lookup(handle).map(f)).flatten()
}

/// Mutable variant of [`with_process_data`]; this is how a spawner installs
/// the entry context, address space, and descriptor table on a process it
/// just created, before resuming it.
pub fn with_process_data_mut<R>(
    handle: ProcessHandle,
    f: impl FnOnce(&mut Process) -> R,
) -> Option<R> {
    let _lvl = IntLevelGuard::new();
    with_scheduler(|s| s.table.lookup_mut(handle).map(f)).flatten()
}

// ============================================================================
// RESUME / SUSPEND / YIELD
// ============================================================================

impl Scheduler {
    /// Link `slot` into the ring right after the cursor and mark it Running.
    fn make_runnable(&mut self, slot: u16) {
        self.table.proc_mut(slot).state = ProcessState::Running;
        let cursor = self.current;
        self.table.ring_insert_after(cursor, slot);
    }
}

/// Make a sleeping process runnable. It is spliced in directly after the
/// current process, so it runs next. Resuming a process that is already
/// running is a logic error; it is logged and ignored so the ring stays
/// intact. Stale handles are a no-op.
///
/// # Arguments
///
/// * `handle` - The process to link into the run ring.
pub fn resume(handle: ProcessHandle) {
    let _lvl = IntLevelGuard::new();
    with_scheduler(|s| {
        let Some(slot) = s.table.resolve(handle) else {
            return;
        };
        if s.table.proc(slot).state == ProcessState::Running {
            log::warn!("resume of {handle} ignored: already running");
            return;
        }
        s.make_runnable(slot);
    });
}

/// Take a process off the run ring. Stale handles are a no-op.
///
/// Suspending the current process yields immediately; control returns here
/// only after the process has been resumed and scheduled again.
///
/// # Arguments
///
/// * `handle` - The process to take off the ring.
/// * `override_state` - When true the state is forced to `Sleeping`;
///   when false the caller has already stored the blocked state it wants,
///   and the process will not re-enter the ring until an explicit resume.
pub fn suspend(handle: ProcessHandle, override_state: bool) {
    let _lvl = IntLevelGuard::new();
    let was_current = with_scheduler(|s| {
        let slot = s.table.resolve(handle)?;
        if override_state {
            s.table.proc_mut(slot).state = ProcessState::Sleeping;
        }
        s.table.ring_unlink(slot);
        Some(slot == s.current)
    })
    .flatten();

    if was_current == Some(true) {
        yield_now();
        // back on track
    }
}

/// [`suspend`] applied to the calling process.
pub fn suspend_self(override_state: bool) {
    suspend(current_process_id(), override_state);
}

/// Hand over the CPU immediately by firing the preempt interrupt now. The
/// ring itself is not touched here; whatever the cursor's `next` is runs.
pub fn yield_now() {
    if !is_initialized() {
        return;
    }
    arch::timer::trigger_preempt();
}

// ============================================================================
// EXIT / WAIT / REAP
// ============================================================================

/// Terminate the current process with `return_code`.
///
/// The pid stops resolving immediately. The zombie parks on the parent's
/// wait queue (waking the parent if it blocked in
/// [`wait_for_child_termination`]) or goes straight to the dispose queue
/// when no parent remains. Zombie children this process never reaped are
/// handed to the dispose queue as well: nobody is left to reap them.
///
/// On hardware control never returns: the exiting process left the ring
/// before yielding.
///
/// # Arguments
///
/// * `return_code` - Exit status the parent reads when it reaps the zombie.
pub fn exit(return_code: i32) {
    let _lvl = IntLevelGuard::new();
    with_scheduler(|s| {
        let slot = s.current;

        // Orphaned grandchildren first: splice this process's own wait
        // queue onto the dispose queue and clear it.
        let chain = {
            let p = s.table.proc(slot);
            p.wait_head.zip(p.wait_tail)
        };
        if let Some((head, tail)) = chain {
            s.dispose.append_chain(&mut s.table, head, tail);
            let p = s.table.proc_mut(slot);
            p.wait_head = None;
            p.wait_tail = None;
        }

        {
            let p = s.table.proc_mut(slot);
            p.return_code = return_code;
            p.terminated_normally = true;
            p.state = ProcessState::Zombie;
        }

        // From here on the pid resolves to nothing.
        s.table.retire(slot);

        let parent = s.table.proc(slot).ppid;
        match s.table.resolve(parent) {
            None => s.dispose.push_back(&mut s.table, slot),
            Some(parent_slot) => {
                s.table.wait_push_back(parent_slot, slot);
                if s.table.proc(parent_slot).state == ProcessState::WaitingForChildTerm {
                    s.make_runnable(parent_slot);
                }
            }
        }

        s.table.ring_unlink(slot);
    });

    yield_now();
}

/// A reaped child: its exit status plus the claim on its remaining storage.
#[must_use = "a reaped child still owns kernel memory; pass it to dispose()"]
pub struct ReapedChild {
    pub return_code: i32,
    pub terminated_normally: bool,
    slot: u16,
}

enum WaitOutcome {
    Reaped(ReapedChild),
    Finished,
    Blocked(u16),
}

/// Reap one terminated child of the current process.
///
/// The child credit is consumed only when a zombie is actually handed out,
/// so a fruitless poll costs nothing.
///
/// # Arguments
///
/// * `return_immediately` - When true this is a non-blocking poll; when
///   false the caller blocks in `WaitingForChildTerm` until a child exits.
///
/// # Returns
///
/// The reaped child, which is the caller's to [`dispose`], or None when
/// the process has no unreaped children left (or a poll found no zombie).
pub fn wait_for_child_termination(return_immediately: bool) -> Option<ReapedChild> {
    let _lvl = IntLevelGuard::new();

    let outcome = with_scheduler(|s| {
        let slot = s.current;
        if s.table.proc(slot).child_count == 0 {
            return WaitOutcome::Finished;
        }
        if let Some(child) = s.table.wait_pop_front(slot) {
            s.table.proc_mut(slot).child_count -= 1;
            return WaitOutcome::Reaped(s.reap_ticket(child));
        }
        if return_immediately {
            return WaitOutcome::Finished;
        }
        s.table.proc_mut(slot).state = ProcessState::WaitingForChildTerm;
        s.table.ring_unlink(slot);
        WaitOutcome::Blocked(slot)
    })?;

    match outcome {
        WaitOutcome::Reaped(child) => Some(child),
        WaitOutcome::Finished => None,
        WaitOutcome::Blocked(slot) => {
            // Woken by a child's exit; the zombie is on our queue by then.
            yield_now();
            with_scheduler(|s| {
                let child = s.table.wait_pop_front(slot)?;
                s.table.proc_mut(slot).child_count -= 1;
                Some(s.reap_ticket(child))
            })
            .flatten()
        }
    }
}

impl Scheduler {
    fn reap_ticket(&self, child: u16) -> ReapedChild {
        let p = self.table.proc(child);
        ReapedChild {
            return_code: p.return_code,
            terminated_normally: p.terminated_normally,
            slot: child,
        }
    }
}

// ============================================================================
// DISPOSE QUEUE
// ============================================================================

/// Queue a reaped child's storage for teardown at idle time.
///
/// # Arguments
///
/// * `child` - The claim returned by [`wait_for_child_termination`].
pub fn dispose(child: ReapedChild) {
    let _lvl = IntLevelGuard::new();
    with_scheduler(|s| s.dispose.push_back(&mut s.table, child.slot));
}

/// Tear down one disposed process, if any.
///
/// # Returns
///
/// True when work was done, false when the queue was empty.
///
/// The queue pop runs under elevation; the release of the process's
/// resources (address space, extended state, architectural state, kernel
/// stack, descriptor table, working directory, then the object itself)
/// runs outside it. That is safe because a process on the dispose queue is
/// unreachable from every other structure. Intended to be driven by an
/// idle loop until it reports false.
pub fn poll_dispose_queue() -> bool {
    let victim = {
        let _lvl = IntLevelGuard::new();
        with_scheduler(|s| {
            let slot = s.dispose.pop_front(&mut s.table)?;
            s.table.remove(slot)
        })
        .flatten()
    };

    match victim {
        Some(process) => {
            drop(process);
            true
        }
        None => false,
    }
}

// ============================================================================
// PREEMPT PATH
// ============================================================================

/// Timer callback: rotate the ring and switch CPU state.
///
/// `frame` is the architectural state saved on the stack of the interrupted
/// process. The steps are fixed: copy the frame into the outgoing process,
/// snapshot its extended state, advance the cursor, restore the incoming
/// extended state, overwrite the frame, activate the incoming address
/// space, and point syscall entries at the incoming kernel stack.
///
/// Runs in interrupt context with interrupts disabled, on the dedicated
/// scheduler stack. Never allocates, never touches the dispose queue.
///
/// # Arguments
///
/// * `frame` - The saved frame of the interrupted process; rewritten in
///   place with the state of whichever process runs next.
fn preempt(frame: &mut CpuContext) {
    if !is_initialized() {
        return;
    }
    let mut guard = SCHEDULER.lock();
    let Some(s) = guard.as_mut() else {
        return;
    };

    let outgoing = s.current;
    {
        let p = s.table.proc_mut(outgoing);
        *p.cpu_context = *frame;
        p.extended_state.save();
    }

    let Some(incoming) = s.table.proc(outgoing).next else {
        debug_assert!(false, "run ring broken at slot {outgoing}");
        return;
    };
    s.current = incoming;

    {
        let p = s.table.proc_mut(incoming);
        p.extended_state.restore();
        *frame = *p.cpu_context;
    }

    if let Some(address_space) = s.table.proc(incoming).address_space.as_ref() {
        address_space.activate();
    }
    let stack_top = s.table.proc(incoming).stack_top();
    arch::stacks::set_syscalls_stack(stack_top);
}

// ============================================================================
// STRUCTURAL CHECKS (tests)
// ============================================================================

#[cfg(test)]
impl Scheduler {
    /// Assert the quiescent-state invariants: the ring is one cycle whose
    /// members are exactly the Running processes, child accounting adds up,
    /// and nothing sits on two queues (or on a queue and the ring).
    fn check_invariants(&self) {
        use alloc::collections::BTreeSet;

        let ring = self.table.ring_members(self.current);
        let ring_set: BTreeSet<u16> = ring.iter().copied().collect();
        let occupied = self.table.occupied();

        for &slot in &occupied {
            let p = self.table.proc(slot);
            assert_eq!(
                p.state == ProcessState::Running,
                ring_set.contains(&slot),
                "slot {slot}: state {:?} disagrees with ring membership",
                p.state
            );
        }

        let mut queued: BTreeSet<u16> = BTreeSet::new();
        for &slot in &occupied {
            let p = self.table.proc(slot);
            if p.state != ProcessState::Zombie {
                let live_children = occupied
                    .iter()
                    .filter(|&&q| {
                        let c = self.table.proc(q);
                        c.ppid == p.pid && c.state != ProcessState::Zombie
                    })
                    .count() as u32;
                let zombies_waiting = self.table.wait_members(slot).len() as u32;
                assert_eq!(
                    p.child_count,
                    live_children + zombies_waiting,
                    "slot {slot}: child accounting off"
                );
            }
            for member in self.table.wait_members(slot) {
                assert!(queued.insert(member), "slot {member} on two wait queues");
                assert!(!ring_set.contains(&member), "queued slot {member} in ring");
            }
        }
        for member in self.dispose.members(&self.table) {
            assert!(queued.insert(member), "slot {member} queued twice");
            assert!(!ring_set.contains(&member), "disposed slot {member} in ring");
        }
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use crate::memory::AddressSpace;
    use core::sync::atomic::{AtomicUsize, Ordering};

    /// Address space stub that counts activations.
    pub struct CountingAddressSpace(pub &'static AtomicUsize);

    impl AddressSpace for CountingAddressSpace {
        fn activate(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub static KERNEL_ASPACE_ACTIVATIONS: AtomicUsize = AtomicUsize::new(0);

    /// Tear the singleton down and bring it back up against a fresh hosted
    /// architecture model. Callers must already hold the global test lock.
    pub fn reinit() {
        INITIALIZED.store(false, Ordering::SeqCst);
        *SCHEDULER.lock() = None;
        crate::arch::hosted::reset();
        KERNEL_ASPACE_ACTIVATIONS.store(0, Ordering::SeqCst);
        init(alloc::boxed::Box::new(CountingAddressSpace(
            &KERNEL_ASPACE_ACTIVATIONS,
        )));
        assert!(is_initialized());
    }

    /// One deterministic timer tick.
    pub fn tick() {
        crate::arch::timer::trigger_preempt();
    }

    /// Assert the structural invariants at a quiescent point.
    pub fn check() {
        let _lvl = IntLevelGuard::new();
        with_scheduler(|s| s.check_invariants()).expect("scheduler up");
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::*;
    use super::*;
    use crate::arch::hosted;
    use crate::utils::testing;

    #[test]
    fn create_resume_wait_exit_reap_cycle() {
        let _serial = testing::lock();
        reinit();

        let kernel = current_process_id();
        let child = make_new_process(kernel);
        assert!(child.is_valid());
        assert_eq!(with_process_data(kernel, |p| p.child_count), Some(1));
        assert_eq!(with_process_data(child, |p| p.state), Some(ProcessState::Sleeping));

        resume(child);
        assert_eq!(with_process_data(child, |p| p.state), Some(ProcessState::Running));
        check();

        // No zombie yet: the parent parks and the child becomes current.
        assert!(wait_for_child_termination(false).is_none());
        assert_eq!(current_process_id(), child);
        assert_eq!(
            with_process_data(kernel, |p| p.state),
            Some(ProcessState::WaitingForChildTerm)
        );
        check();

        // The child exits: parent woken, child parked as an unaddressable zombie.
        exit(42);
        assert_eq!(current_process_id(), kernel);
        assert!(with_process_data(child, |_| ()).is_none());
        assert_eq!(with_process_data(kernel, |p| p.state), Some(ProcessState::Running));
        check();

        let reaped = wait_for_child_termination(false).expect("a zombie to reap");
        assert_eq!(reaped.return_code, 42);
        assert!(reaped.terminated_normally);
        assert_eq!(with_process_data(kernel, |p| p.child_count), Some(0));

        dispose(reaped);
        check();
        assert!(poll_dispose_queue());
        assert!(!poll_dispose_queue());
        check();
    }

    #[test]
    fn stale_handles_never_resolve_after_slot_reuse() {
        let _serial = testing::lock();
        reinit();

        let kernel = current_process_id();
        let first = make_new_process(kernel);
        resume(first);
        tick();
        assert_eq!(current_process_id(), first);
        exit(0);

        let reaped = wait_for_child_termination(true).expect("zombie");
        dispose(reaped);
        assert!(poll_dispose_queue());

        // Same slot, next generation; the stale pid keeps resolving to nothing.
        let second = make_new_process(kernel);
        assert_eq!(second.slot, first.slot);
        assert_eq!(second.generation, first.generation + 1);
        assert!(with_process_data(first, |_| ()).is_none());
        assert!(with_process_data(second, |_| ()).is_some());
        check();
    }

    #[test]
    fn orphaned_zombie_goes_straight_to_the_dispose_queue() {
        let _serial = testing::lock();
        reinit();

        let kernel = current_process_id();
        let a = make_new_process(kernel);
        resume(a);
        tick();
        assert_eq!(current_process_id(), a);

        let b = make_new_process(a);
        resume(b);

        // A exits first: it parks on the kernel's wait queue.
        exit(1);
        assert_eq!(current_process_id(), b);
        check();

        // B's parent pid no longer resolves, so B is orphaned at exit and
        // goes straight to the dispose queue.
        exit(7);
        assert_eq!(current_process_id(), kernel);
        assert!(poll_dispose_queue(), "orphan should be queued for teardown");
        assert!(!poll_dispose_queue());

        let reaped = wait_for_child_termination(false).expect("A is still reapable");
        assert_eq!(reaped.return_code, 1);
        dispose(reaped);
        assert!(poll_dispose_queue());
        assert_eq!(with_process_data(kernel, |p| p.child_count), Some(0));
        check();
    }

    #[test]
    fn exiting_parent_hands_unreaped_zombies_to_the_dispose_queue() {
        let _serial = testing::lock();
        reinit();

        let kernel = current_process_id();
        let a = make_new_process(kernel);
        resume(a);
        tick();
        assert_eq!(current_process_id(), a);

        let b = make_new_process(a);
        resume(b);
        tick();
        assert_eq!(current_process_id(), b);

        // B dies while A lives: zombie on A's wait queue, never reaped.
        exit(5);
        assert_eq!(current_process_id(), kernel);
        tick();
        assert_eq!(current_process_id(), a);

        // A exits without reaping B; B is spliced to the dispose queue and
        // A itself parks on the kernel's wait queue.
        exit(6);
        assert_eq!(current_process_id(), kernel);
        assert!(poll_dispose_queue(), "grandchild zombie should be disposed");
        assert!(!poll_dispose_queue(), "A is awaiting reap, not disposal");

        let reaped = wait_for_child_termination(true).expect("A is reapable");
        assert_eq!(reaped.return_code, 6);
        dispose(reaped);
        assert!(poll_dispose_queue());
        check();
    }

    #[test]
    fn full_table_fails_creation_cleanly() {
        let _serial = testing::lock();
        reinit();

        let kernel = current_process_id();
        let mut created = 0;
        loop {
            let handle = make_new_process(kernel);
            if !handle.is_valid() {
                break;
            }
            created += 1;
            assert!(created <= PROCESS_CAPACITY, "table never reported full");
        }
        // The kernel process occupies one slot.
        assert_eq!(created, PROCESS_CAPACITY - 1);

        // Still full, still clean.
        assert!(!make_new_process(kernel).is_valid());
        assert_eq!(
            with_process_data(kernel, |p| p.child_count),
            Some((PROCESS_CAPACITY - 1) as u32)
        );
        check();
    }

    #[test]
    fn preempt_rotates_round_robin_with_cursor_advancing_first() {
        let _serial = testing::lock();
        reinit();

        let kernel = current_process_id();
        // Splice so the ring reads kernel -> p1 -> p2 -> p3.
        let p3 = make_new_process(kernel);
        let p2 = make_new_process(kernel);
        let p1 = make_new_process(kernel);
        resume(p3);
        resume(p2);
        resume(p1);
        check();

        tick();
        assert_eq!(current_process_id(), p1);

        // Park the kernel process so only the three runnables rotate.
        suspend(kernel, true);
        check();

        let mut order = alloc::vec::Vec::new();
        for _ in 0..5 {
            tick();
            order.push(current_process_id());
        }
        assert_eq!(order, [p2, p3, p1, p2, p3]);
        check();
    }

    #[test]
    fn suspend_self_round_trip_returns_to_the_ring() {
        let _serial = testing::lock();
        reinit();

        let kernel = current_process_id();
        let p = make_new_process(kernel);
        resume(p);
        tick();
        assert_eq!(current_process_id(), p);

        suspend_self(true);
        assert_eq!(current_process_id(), kernel);
        assert_eq!(with_process_data(p, |x| x.state), Some(ProcessState::Sleeping));
        check();

        resume(p);
        check();
        tick();
        assert_eq!(current_process_id(), p);
    }

    #[test]
    fn fruitless_poll_keeps_the_child_credit() {
        let _serial = testing::lock();
        reinit();

        let kernel = current_process_id();
        let child = make_new_process(kernel);
        resume(child);

        // Child is alive: the poll returns nothing and consumes nothing.
        assert!(wait_for_child_termination(true).is_none());
        assert_eq!(with_process_data(kernel, |p| p.child_count), Some(1));
        assert_eq!(current_process_id(), kernel, "a poll must not yield");

        tick();
        exit(3);
        let reaped = wait_for_child_termination(true).expect("the credit survived");
        assert_eq!(reaped.return_code, 3);
        dispose(reaped);
        assert!(poll_dispose_queue());
        check();
    }

    #[test]
    fn wait_with_no_children_returns_nothing() {
        let _serial = testing::lock();
        reinit();

        let kernel = current_process_id();
        assert!(wait_for_child_termination(true).is_none());
        // Even the blocking form must not park a childless process.
        assert!(wait_for_child_termination(false).is_none());
        assert_eq!(with_process_data(kernel, |p| p.state), Some(ProcessState::Running));
        assert_eq!(current_process_id(), kernel);
        check();
    }

    #[test]
    fn zombies_are_reaped_in_exit_order() {
        let _serial = testing::lock();
        reinit();

        let kernel = current_process_id();
        let c1 = make_new_process(kernel);
        let c2 = make_new_process(kernel);
        resume(c1);
        tick();
        assert_eq!(current_process_id(), c1);
        exit(11);

        resume(c2);
        tick();
        assert_eq!(current_process_id(), c2);
        exit(22);

        let first = wait_for_child_termination(true).expect("first zombie");
        let second = wait_for_child_termination(true).expect("second zombie");
        assert_eq!(first.return_code, 11);
        assert_eq!(second.return_code, 22);

        dispose(first);
        dispose(second);
        assert!(poll_dispose_queue());
        assert!(poll_dispose_queue());
        assert!(!poll_dispose_queue());
        check();
    }

    #[test]
    fn resuming_a_running_process_leaves_the_ring_intact() {
        let _serial = testing::lock();
        reinit();

        let kernel = current_process_id();
        let p = make_new_process(kernel);
        resume(p);
        resume(p); // logic error, must not corrupt
        check();

        tick();
        assert_eq!(current_process_id(), p);
        tick();
        assert_eq!(current_process_id(), kernel);
    }

    #[test]
    fn stale_handle_operations_are_no_ops() {
        let _serial = testing::lock();
        reinit();

        let kernel = current_process_id();
        let child = make_new_process(kernel);
        resume(child);
        tick();
        assert_eq!(current_process_id(), child);
        exit(0);

        // The pid is dead: every operation through it falls out cleanly.
        resume(child);
        suspend(child, true);
        assert!(with_process_data(child, |_| ()).is_none());
        check();

        let reaped = wait_for_child_termination(true).expect("zombie");
        dispose(reaped);
        assert!(poll_dispose_queue());
    }

    #[test]
    fn preempt_switches_cpu_and_extended_state() {
        let _serial = testing::lock();
        reinit();

        let kernel = current_process_id();
        let child = make_new_process(kernel);
        with_process_data_mut(child, |p| {
            *p.cpu_context = CpuContext::with_entry(0x4000, 0x8000);
        });
        resume(child);

        // Distinct live frame and FPU contents while the kernel runs.
        let mut kernel_frame = CpuContext::zeroed();
        kernel_frame.ip = 0x1111;
        hosted::timer::set_live_frame(kernel_frame);
        hosted::set_sim_fpu(0xa5);

        tick();
        assert_eq!(current_process_id(), child);

        // The child's fabricated context is live now; the kernel's state was
        // captured, architectural and extended alike.
        assert_eq!(hosted::timer::live_frame().ip, 0x4000);
        assert_eq!(hosted::timer::live_frame().sp, 0x8000);
        assert_eq!(with_process_data(kernel, |p| p.cpu_context.ip), Some(0x1111));
        assert_eq!(
            with_process_data(kernel, |p| p.extended_state.as_bytes()[0]),
            Some(0xa5)
        );

        // Syscall entries now run on the child's kernel stack.
        let child_top = with_process_data(child, |p| {
            p.kernel_stack.as_ptr() as usize + KERNEL_STACK_SIZE
        })
        .unwrap();
        assert_eq!(crate::arch::stacks::syscalls_stack(), child_top);

        // The child has no address space; switching back to the kernel
        // process activates the bootstrap one.
        let before = KERNEL_ASPACE_ACTIVATIONS.load(core::sync::atomic::Ordering::SeqCst);
        tick();
        assert_eq!(current_process_id(), kernel);
        assert_eq!(
            KERNEL_ASPACE_ACTIVATIONS.load(core::sync::atomic::Ordering::SeqCst),
            before + 1
        );
    }
}
