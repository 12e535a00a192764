/*
 * Scheduler Core
 *
 * Owns the thread arena, the ready queue, and the current-thread pointer,
 * and implements the `thread_*` lifecycle and `schedule()`. Keeps a
 * `Vec<Thread>` arena with linear lookup by id (acceptable at this thread
 * count) and a monotonic id counter, dispatching through the
 * priority-ordered list in `ordered_list.rs` rather than round-robin.
 */

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use spin::Mutex;

use super::config::{self, PRI_MIN, TIME_SLICE};
use super::context;
use super::donation;
use super::error::SchedError;
use super::fixed_point::Fixed;
use super::mlfq;
use super::ordered_list::OrderedList;
use super::thread::{Thread, ThreadId, ThreadStatus, STACK_SIZE};
use crate::memory::page_alloc;

/// Guards the TID counter separately from the scheduler's main lock so
/// allocating an id never has to contend with whatever is holding the
/// scheduler lock (§4.D: "TID allocation with dedicated lock").
static NEXT_TID: Mutex<usize> = Mutex::new(0);

fn alloc_tid() -> ThreadId {
    let mut next = NEXT_TID.lock();
    let tid = ThreadId(*next);
    *next += 1;
    tid
}

/// The scheduler core singleton. Exactly one instance exists, guarded by
/// the global `CORE` mutex in `manager.rs`.
pub struct SchedCore {
    threads: Vec<Thread>,
    ready: OrderedList<ThreadId>,
    current: Option<ThreadId>,
    idle: Option<ThreadId>,

    /// Ticks left before `TIME_SLICE`-based preemption is requested.
    /// Distinct from `total_ticks`: this resets on every switch, the
    /// global tick count drives the MLFQ per-4/per-second boundaries.
    ticks_this_quantum: u32,
    total_ticks: u64,

    load_avg: Fixed,

    /// Set by the tick handler inside interrupt context; consulted by the
    /// interrupt-return path (§5 "yield-on-return").
    yield_on_return: bool,
}

impl SchedCore {
    fn find(&self, tid: ThreadId) -> Option<&Thread> {
        self.threads.iter().find(|t| t.tid == tid)
    }

    fn find_mut(&mut self, tid: ThreadId) -> Option<&mut Thread> {
        self.threads.iter_mut().find(|t| t.tid == tid)
    }

    /// Adopt the currently executing code as the initial ("main") thread.
    /// Called exactly once, with interrupts disabled, before any other
    /// scheduler operation.
    pub fn thread_init() -> Self {
        let tid = alloc_tid();
        // The initial thread has no separately allocated stack: it is
        // already running on whatever stack brought us here. An empty
        // placeholder keeps `Thread`'s shape uniform without pretending
        // to own that memory.
        let mut main = Thread::new(tid, String::from("main"), Box::new([]), config::PRI_DEFAULT);
        main.status = ThreadStatus::Running;

        SchedCore {
            threads: alloc::vec![main],
            ready: OrderedList::new(),
            current: Some(tid),
            idle: None,
            ticks_this_quantum: TIME_SLICE,
            total_ticks: 0,
            load_avg: Fixed::ZERO,
            yield_on_return: false,
        }
    }

    /// Create the idle thread. Returns its id so `manager::enable` can mark
    /// it separately if needed.
    pub fn thread_start(&mut self) -> ThreadId {
        let tid = self
            .thread_create_internal("idle", PRI_MIN, idle_entry, 0)
            .expect("failed to allocate idle thread");
        self.idle = Some(tid);
        tid
    }

    fn thread_create_internal(
        &mut self,
        name: &str,
        priority: i32,
        entry: extern "C" fn(usize),
        arg: usize,
    ) -> Result<ThreadId, SchedError> {
        let page = page_alloc::alloc_page().ok_or(SchedError::OutOfThreads)?;
        let stack = unsafe { Box::from_raw(core::slice::from_raw_parts_mut(page, STACK_SIZE)) };

        let tid = alloc_tid();
        let stack_top = unsafe { stack.as_ptr().add(stack.len()) as *mut u8 };
        let sp = context::prepare_initial_context(stack_top, entry as usize, arg);

        let mut thread = Thread::new(tid, String::from(name), stack, priority);
        thread.stack_pointer = sp;
        thread.status = ThreadStatus::Blocked;

        self.threads.push(thread);
        self.unblock_locked(tid);

        Ok(tid)
    }

    /// `thread_create(name, priority, fn, aux)`: allocate a stack, prepare
    /// its initial context, make it ready, and preempt the caller if the
    /// new thread now outranks it.
    pub fn thread_create(
        &mut self,
        name: &str,
        priority: i32,
        entry: extern "C" fn(usize),
        arg: usize,
    ) -> Result<ThreadId, SchedError> {
        let priority = if config::mlfqs_enabled() {
            priority
        } else {
            config::clamp_priority(priority)
        };
        let tid = self.thread_create_internal(name, priority, entry, arg)?;
        self.maybe_preempt_current();
        Ok(tid)
    }

    /// Internal unblock, used both by the public `thread_unblock` and by
    /// thread creation (a freshly created thread starts `Blocked` and is
    /// immediately made ready).
    fn unblock_locked(&mut self, tid: ThreadId) {
        if let Some(t) = self.find_mut(tid) {
            debug_assert_eq!(t.status, ThreadStatus::Blocked, "unblock requires a blocked thread");
            t.status = ThreadStatus::Ready;
            let priority = t.priority;
            self.ready.insert_sorted(tid, priority);
        }
    }

    /// `thread_unblock`: callable at any interrupt level. Does not preempt.
    pub fn thread_unblock(&mut self, tid: ThreadId) {
        self.unblock_locked(tid);
    }

    /// `thread_block`: the calling (current) thread blocks and the
    /// scheduler picks a successor. Caller must hold interrupts disabled
    /// and must not be running in interrupt context.
    pub fn thread_block(&mut self) {
        let cur = self.current.expect("thread_block with no current thread");
        if let Some(t) = self.find_mut(cur) {
            t.status = ThreadStatus::Blocked;
        }
        self.schedule();
    }

    /// `thread_yield`: put the current thread back on the ready list
    /// (unless it is idle) and reschedule.
    pub fn thread_yield(&mut self) {
        let cur = self.current.expect("thread_yield with no current thread");
        if Some(cur) != self.idle {
            if let Some(t) = self.find_mut(cur) {
                t.status = ThreadStatus::Ready;
                let priority = t.priority;
                self.ready.insert_sorted(cur, priority);
            }
        }
        self.schedule();
    }

    /// `thread_exit`: never returns. Marks the current thread `Dying` and
    /// switches away; the successor's tail of `schedule()` reclaims the
    /// page once it is no longer "current" anywhere.
    pub fn thread_exit(&mut self) -> ! {
        let cur = self.current.expect("thread_exit with no current thread");
        assert_ne!(Some(cur), self.idle, "the idle thread must never exit");
        if let Some(t) = self.find_mut(cur) {
            t.status = ThreadStatus::Dying;
        }
        self.schedule();
        unreachable!("schedule() never returns into a Dying thread");
    }

    /// `thread_foreach`: callable with interrupts off.
    pub fn thread_foreach<F: FnMut(&Thread)>(&self, mut f: F) {
        for t in &self.threads {
            f(t);
        }
    }

    pub fn thread_foreach_mut<F: FnMut(&mut Thread)>(&mut self, mut f: F) {
        for t in &mut self.threads {
            f(t);
        }
    }

    pub fn get(&self, tid: ThreadId) -> Option<&Thread> {
        self.find(tid)
    }

    pub fn get_mut(&mut self, tid: ThreadId) -> Option<&mut Thread> {
        self.find_mut(tid)
    }

    pub fn current(&self) -> ThreadId {
        self.current.expect("scheduler not initialized")
    }

    pub fn is_idle(&self, tid: ThreadId) -> bool {
        Some(tid) == self.idle
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn load_avg(&self) -> Fixed {
        self.load_avg
    }

    pub fn should_yield_on_return(&mut self) -> bool {
        core::mem::replace(&mut self.yield_on_return, false)
    }

    /// If some ready thread now outranks the running one, yield. Called
    /// after thread creation and after any priority change that might
    /// raise a ready thread above the current one (§4.E).
    pub fn maybe_preempt_current(&mut self) {
        let cur_priority = self.current.and_then(|c| self.find(c)).map(|t| t.priority);
        if let (Some(cur_priority), Some(head_priority)) = (cur_priority, self.ready.front_priority()) {
            if head_priority > cur_priority {
                self.thread_yield();
            }
        }
    }

    // ------------------------------------------------------------------
    // donation / priority (component E) and nice/mlfq (component F)
    // ------------------------------------------------------------------

    pub fn donate_priority(&mut self, waiter: ThreadId) {
        donation::donate_priority(&mut self.threads, &mut self.ready, waiter);
    }

    pub fn remove_donation(&mut self, tid: ThreadId) {
        donation::remove_donation(&mut self.threads, &mut self.ready, tid);
    }

    pub fn reset_priority(&mut self, tid: ThreadId) {
        donation::reset_priority(&mut self.threads, &mut self.ready, tid);
    }

    /// `set_priority`: a no-op under MLFQ (§4.F).
    pub fn set_priority(&mut self, tid: ThreadId, new_base: i32) {
        if config::mlfqs_enabled() {
            return;
        }
        if let Some(t) = self.find_mut(tid) {
            t.base_priority = config::clamp_priority(new_base);
        }
        self.reset_priority(tid);
        if Some(tid) == self.current {
            self.maybe_preempt_current();
        }
    }

    pub fn set_nice(&mut self, tid: ThreadId, nice: i32) {
        let nice = config::clamp_nice(nice);
        if let Some(t) = self.find_mut(tid) {
            t.nice = nice;
            mlfq::recompute_priority(t);
        }
        let (priority, status) = match self.find(tid) {
            Some(t) => (t.priority, t.status),
            None => return,
        };
        if status == ThreadStatus::Ready {
            self.ready.remove(tid);
            self.ready.insert_sorted(tid, priority);
        }
        if Some(tid) == self.current {
            self.maybe_preempt_current();
        }
    }

    // ------------------------------------------------------------------
    // tick handler (component G)
    // ------------------------------------------------------------------

    /// Called from interrupt context on every timer tick. Returns whether
    /// the running thread used kernel or user time, for the caller's
    /// accounting; actual preemption is only *requested* here via the
    /// yield-on-return latch, never performed directly from IRQ context.
    pub fn on_tick(&mut self) {
        self.total_ticks += 1;
        self.ticks_this_quantum = self.ticks_this_quantum.saturating_sub(1);

        let cur = self.current;
        let cur_is_idle = cur.map(|c| self.is_idle(c)).unwrap_or(true);

        if config::mlfqs_enabled() {
            if let Some(cur) = cur {
                if let Some(t) = self.find_mut(cur) {
                    mlfq::tick_recent_cpu(t, cur_is_idle);
                }
            }

            if self.total_ticks % config::TIMER_FREQ as u64 == 0 {
                let ready_count = self.ready.len();
                self.load_avg = mlfq::recompute_load_avg_and_decay(
                    &mut self.threads,
                    self.load_avg,
                    ready_count,
                    cur_is_idle,
                );
            }

            if self.total_ticks % 4 == 0 {
                mlfq::recompute_all_priorities(&mut self.threads);
                let current_priorities: Vec<(ThreadId, i32)> =
                    self.threads.iter().map(|t| (t.tid, t.priority)).collect();
                for (tid, priority) in current_priorities {
                    self.ready.set_priority(tid, priority);
                }
                self.ready.sort_by_priority(|tid| {
                    self.threads.iter().find(|t| t.tid == tid).map(|t| t.priority).unwrap_or(PRI_MIN)
                });
            }
        }

        if self.ticks_this_quantum == 0 || self.ready_outranks_current() {
            self.yield_on_return = true;
        }
    }

    fn ready_outranks_current(&self) -> bool {
        let cur_priority = self.current.and_then(|c| self.find(c)).map(|t| t.priority);
        match (cur_priority, self.ready.front_priority()) {
            (Some(cur), Some(head)) => head > cur,
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // dispatch
    // ------------------------------------------------------------------

    /// `schedule()`: requires interrupts off and `current.status != Running`
    /// already arranged by the caller. Picks the next thread (idle if the
    /// ready list is empty) and performs the context switch.
    fn schedule(&mut self) {
        let next = self.ready.pop_front().unwrap_or_else(|| self.idle.expect("idle thread not started"));

        let prev = self.current;
        self.current = Some(next);
        self.ticks_this_quantum = TIME_SLICE;

        if let Some(t) = self.find_mut(next) {
            t.status = ThreadStatus::Running;
        }

        if prev == Some(next) {
            // Degenerate self-switch (e.g. yielding with an empty ready
            // list): nothing to swap.
            return;
        }

        let next_sp = self.find(next).map(|t| t.stack_pointer).unwrap();

        // SAFETY: `prev`'s Thread stays in the arena across the switch (we
        // only ever remove a thread's entry once the id `context::switch`
        // reports below names it), so the borrow below is sound: the switch
        // itself doesn't touch `self`.
        if let Some(prev) = prev {
            let prev_sp_slot: *mut usize = self
                .find_mut(prev)
                .map(|t| &mut t.stack_pointer as *mut usize)
                .unwrap();
            let resumed_from = unsafe { context::switch(&mut *prev_sp_slot, next_sp, prev.0) };

            // Execution resumes here once some future switch brings this
            // thread back. That switch's return value names whoever just
            // ran immediately before this resumption - not necessarily
            // `prev` above, which only describes this call's own
            // switch-out and is stale once this thread has since been
            // switched in and out again via a different caller. Reap the
            // reported thread if it was left dying.
            if let Some(pos) = self.threads.iter().position(|t| t.tid.0 == resumed_from) {
                if self.threads[pos].status == ThreadStatus::Dying {
                    let dying = self.threads.remove(pos);
                    free_stack(dying);
                }
            }
        }
    }

    /// Drive the very first switch away from the adopted initial thread,
    /// e.g. into the idle thread once `thread_start` has created it.
    pub fn kick_off(&mut self) {
        self.schedule();
    }
}

/// A dying thread's stack (except the adopted initial thread's, which is an
/// ordinary empty heap box) came from `page_alloc::alloc_page`, not the
/// global allocator. Dropping the `Box<[u8]>` normally would hand that
/// pointer to `dealloc` for an allocation it never made, corrupting the
/// heap. Pull the stack out, forget the box, and return the page instead.
fn free_stack(thread: Thread) {
    let Thread { stack, .. } = thread;
    if stack.is_empty() {
        return;
    }
    let ptr = stack.as_ptr() as *mut u8;
    core::mem::forget(stack);
    unsafe {
        page_alloc::free_page(ptr);
    }
}

extern "C" fn idle_entry(_arg: usize) {
    loop {
        super::manager::SchedulerManager::block_current();
        x86_64::instructions::hlt();
    }
}
