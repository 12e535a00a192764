/*
 * Donating Lock
 *
 * A mutex built on a spinlock-guarded inner state, the same shape a
 * teaching kernel's bare mutex (`Spinlock<MutexInner { locked: bool }>`
 * plus a pair of TODOs for "block instead of spin" and "wake a waiter on
 * release") takes once those TODOs are finished: the spin loop is replaced
 * with `thread_block`/`thread_unblock`, `locked: bool` grows into a waiter
 * list ordered by priority, and acquiring while the lock is held donates
 * the waiter's priority up the holder chain.
 */

use alloc::vec::Vec;
use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};

use spin::Mutex as Spinlock;

use crate::scheduler::manager::{SchedulerManager, ThreadManager};
use crate::scheduler::thread::ThreadId;
use crate::scheduler::ordered_list::OrderedList;

struct LockInner {
    holder: Option<ThreadId>,
    waiters: OrderedList<ThreadId>,
}

/// A mutex that donates the waiter's priority to the current holder while
/// blocked, and hands itself directly to the highest-priority waiter on
/// release rather than waking everyone to race for it.
pub struct Lock<T> {
    inner: Spinlock<LockInner>,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Sync for Lock<T> {}
unsafe impl<T: Send> Send for Lock<T> {}

pub struct LockGuard<'a, T> {
    lock: &'a Lock<T>,
}

impl<T> Lock<T> {
    pub const fn new(data: T) -> Self {
        Lock {
            inner: Spinlock::new(LockInner { holder: None, waiters: OrderedList::new() }),
            data: UnsafeCell::new(data),
        }
    }

    /// Acquire the lock, donating priority up the holder chain and
    /// blocking while it is held by someone else.
    pub fn acquire(&self) -> LockGuard<'_, T> {
        let me = ThreadManager::current_id();

        let holder = {
            let mut inner = self.inner.lock();
            if inner.holder.is_none() {
                inner.holder = Some(me);
                None
            } else {
                // Inserted at today's priority; `release` resyncs every
                // waiter against its live priority before picking the
                // highest, so a later donation reaching a queued waiter
                // doesn't leave it stuck behind a stale snapshot here.
                let priority = ThreadManager::get_priority();
                inner.waiters.insert_sorted(me, priority);
                inner.holder
            }
        };

        if let Some(holder) = holder {
            SchedulerManager::set_waiting_on(me, Some(holder));
            SchedulerManager::donate_priority(me);
            ThreadManager::block_current();
            // Resumed only once `release` has already set `holder = me`
            // for us and rehomed/cleared our donation bookkeeping.
        }

        LockGuard { lock: self }
    }

    fn release(&self) {
        let me = ThreadManager::current_id();
        let (next, remaining) = {
            let mut inner = self.inner.lock();
            debug_assert_eq!(inner.holder, Some(me), "released by a thread that doesn't hold the lock");

            // A queued waiter's priority can have risen since it was
            // inserted (e.g. a second, unrelated donation reached it while
            // it sat here); resync against live priorities before picking
            // the highest one.
            inner.waiters.sort_by_priority(|tid| ThreadManager::priority_of(tid));

            let next = inner.waiters.pop_front();
            inner.holder = next;
            let remaining: Vec<ThreadId> = inner.waiters.iter().collect();
            (next, remaining)
        };

        match next {
            Some(next) => {
                // Clears `next`'s donation to `me` and resets `me`'s
                // priority back to its base (or to whatever its own
                // donors still warrant).
                SchedulerManager::remove_donation(next);

                // Anyone still waiting was donating to `me`; the lock now
                // belongs to `next`, so re-home their donation onto it.
                for w in remaining {
                    SchedulerManager::remove_donation(w);
                    SchedulerManager::set_waiting_on(w, Some(next));
                    SchedulerManager::donate_priority(w);
                }

                ThreadManager::unblock(next);
            }
            None => {
                SchedulerManager::reset_priority(me);
            }
        }
    }
}

impl<'a, T> Deref for LockGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> DerefMut for LockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T> Drop for LockGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
