/*
 * Scheduler Public API
 *
 * The façade every other subsystem calls through; nothing outside this
 * module touches `SchedCore` directly. `SchedulerManager` and
 * `ThreadManager` are both thin zero-sized handles onto the one global
 * `CORE` cell, split by concern: thread identity/lifecycle operations on
 * `ThreadManager`, donation/policy/boot operations on `SchedulerManager`.
 */

use core::cell::UnsafeCell;

use super::config;
use super::error::SchedError;
use super::fixed_point::Fixed;
use super::sched_core::SchedCore;
use super::thread::{Thread, ThreadId};
use crate::arch::x86_64::interrupts;

/// No software lock guards this. `schedule()` context-switches onto a
/// different thread's stack and never runs back to its own call frame until
/// some later switch resumes it, so an RAII guard taken before the switch
/// never gets dropped by the thread that took it: the next thread's very
/// first scheduler call would spin forever on an already-held lock that no
/// one is ever coming back to release. Interrupt-disable around every call
/// into `with_core` (see every call site below) is the only synchronization
/// this needs on a single CPU.
struct CoreCell(UnsafeCell<Option<SchedCore>>);

unsafe impl Sync for CoreCell {}

static CORE: CoreCell = CoreCell(UnsafeCell::new(None));

/// Caller must already have interrupts disabled for the duration of `f`.
fn with_core<R>(f: impl FnOnce(&mut SchedCore) -> R) -> R {
    let core = unsafe { &mut *CORE.0.get() };
    f(core.as_mut().expect("scheduler not initialized"))
}

/// Thread lifecycle and scheduling operations. A zero-sized handle onto the
/// global `CORE`.
pub struct ThreadManager;

impl ThreadManager {
    /// `thread_create`. Safe to call from any context except inside
    /// `schedule()` itself.
    pub fn spawn(name: &str, priority: i32, entry: extern "C" fn(usize), arg: usize) -> Result<ThreadId, SchedError> {
        interrupts::without_interrupts(|| with_core(|c| c.thread_create(name, priority, entry, arg)))
    }

    /// The calling thread's own id.
    pub fn current_id() -> ThreadId {
        interrupts::without_interrupts(|| with_core(|c| c.current()))
    }

    pub fn with_current<R>(f: impl FnOnce(&Thread) -> R) -> R {
        interrupts::without_interrupts(|| {
            with_core(|c| {
                let tid = c.current();
                f(c.get(tid).expect("current thread missing from arena"))
            })
        })
    }

    /// `thread_exit`. Never returns.
    pub fn exit(_status: i32) -> ! {
        interrupts::disable();
        with_core(|c| c.thread_exit())
    }

    pub fn block_current() {
        interrupts::without_interrupts(|| with_core(|c| c.thread_block()));
    }

    pub fn unblock(tid: ThreadId) {
        interrupts::without_interrupts(|| with_core(|c| c.thread_unblock(tid)));
    }

    pub fn yield_now() {
        interrupts::without_interrupts(|| with_core(|c| c.thread_yield()));
    }

    pub fn set_priority(priority: i32) {
        interrupts::without_interrupts(|| {
            with_core(|c| {
                let tid = c.current();
                c.set_priority(tid, priority);
            })
        });
    }

    pub fn get_priority() -> i32 {
        Self::with_current(|t| t.priority)
    }

    /// The live (possibly donation-boosted) priority of an arbitrary thread,
    /// not just the caller's own.
    pub fn priority_of(tid: ThreadId) -> i32 {
        interrupts::without_interrupts(|| with_core(|c| c.get(tid).map(|t| t.priority).unwrap_or(config::PRI_MIN)))
    }

    pub fn set_nice(nice: i32) {
        interrupts::without_interrupts(|| {
            with_core(|c| {
                let tid = c.current();
                c.set_nice(tid, nice);
            })
        });
    }

    pub fn get_nice() -> i32 {
        Self::with_current(|t| t.nice)
    }

    pub fn get_recent_cpu() -> i32 {
        Self::with_current(super::mlfq::get_recent_cpu_percent)
    }

    pub fn get_load_avg() -> i32 {
        interrupts::without_interrupts(|| with_core(|c| super::mlfq::get_load_avg_percent(c.load_avg())))
    }

    /// For diagnostics and tests: visit every live thread. Runs with
    /// interrupts disabled, so keep `f` short.
    pub fn foreach(mut f: impl FnMut(&Thread)) {
        interrupts::without_interrupts(|| with_core(|c| c.thread_foreach(|t| f(t))));
    }
}

/// Donation/lock-facing and boot/init operations. Kept as a separate
/// zero-sized type from `ThreadManager` (lifecycle vs. policy).
pub struct SchedulerManager;

impl SchedulerManager {
    /// Must be called once, very early, with interrupts disabled, on
    /// whatever stack booted the kernel. Adopts that execution as the
    /// initial thread.
    pub fn init() {
        interrupts::without_interrupts(|| {
            let core = unsafe { &mut *CORE.0.get() };
            assert!(core.is_none(), "SchedulerManager::init called twice");
            *core = Some(SchedCore::thread_init());
        });
    }

    /// Enables MLFQ if `mlfqs` is set, creates the idle thread, and leaves
    /// the boot thread as `current`. Call after `init()`, before the first
    /// `schedule()`.
    pub fn start(mlfqs: bool) {
        config::set_mlfqs(mlfqs);
        interrupts::without_interrupts(|| {
            with_core(|c| {
                c.thread_start();
            })
        });
    }

    /// Hand control to the scheduler for the first time: switches away from
    /// the boot thread into whatever is ready (normally the idle thread,
    /// until real work is spawned).
    pub fn kick_off() {
        interrupts::without_interrupts(|| with_core(|c| c.kick_off()));
    }

    pub fn block_current() {
        ThreadManager::block_current();
    }

    pub fn donate_priority(waiter: ThreadId) {
        interrupts::without_interrupts(|| with_core(|c| c.donate_priority(waiter)));
    }

    pub fn remove_donation(tid: ThreadId) {
        interrupts::without_interrupts(|| with_core(|c| c.remove_donation(tid)));
    }

    pub fn reset_priority(tid: ThreadId) {
        interrupts::without_interrupts(|| with_core(|c| c.reset_priority(tid)));
    }

    pub fn set_waiting_on(tid: ThreadId, holder: Option<ThreadId>) {
        interrupts::without_interrupts(|| {
            with_core(|c| {
                if let Some(t) = c.get_mut(tid) {
                    t.waiting_on = holder;
                }
            })
        });
    }

    pub fn is_idle(tid: ThreadId) -> bool {
        interrupts::without_interrupts(|| with_core(|c| c.is_idle(tid)))
    }

    /// Called from the timer interrupt handler. See `tick.rs`.
    pub(super) fn on_tick() -> bool {
        interrupts::without_interrupts(|| {
            with_core(|c| {
                c.on_tick();
                c.should_yield_on_return()
            })
        })
    }

    pub fn load_avg() -> Fixed {
        interrupts::without_interrupts(|| with_core(|c| c.load_avg()))
    }

    pub fn ready_len() -> usize {
        interrupts::without_interrupts(|| with_core(|c| c.ready_len()))
    }
}
