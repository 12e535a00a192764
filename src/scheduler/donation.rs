/*
 * Priority Donation
 *
 * The three operations the lock implementation needs: `donate_priority`,
 * `remove_donation`, `reset_priority`. Kept in the same "operate on the
 * arena + ready list" shape as the rest of the scheduler core so it reads
 * as one system rather than a bolted-on extra.
 */

use alloc::vec::Vec;

use super::config::PRI_MIN;
use super::ordered_list::OrderedList;
use super::thread::{Thread, ThreadId, ThreadStatus};

fn find_mut(threads: &mut [Thread], tid: ThreadId) -> Option<&mut Thread> {
    threads.iter_mut().find(|t| t.tid == tid)
}

fn find(threads: &[Thread], tid: ThreadId) -> Option<&Thread> {
    threads.iter().find(|t| t.tid == tid)
}

/// `t.priority = max(t.base_priority, highest donor priority, PRI_MIN)`,
/// then, if `t` is on the ready list, reposition it there so the list stays
/// sorted by the invariant the ready queue maintains at all times.
pub fn reset_priority(threads: &mut Vec<Thread>, ready: &mut OrderedList<ThreadId>, tid: ThreadId) {
    let new_priority = {
        let t = match find(threads, tid) {
            Some(t) => t,
            None => return,
        };
        let donor_max = t.donations.front_priority().unwrap_or(PRI_MIN);
        t.base_priority.max(donor_max).max(PRI_MIN)
    };

    let was_ready = {
        let t = find_mut(threads, tid).unwrap();
        t.priority = new_priority;
        t.status == ThreadStatus::Ready
    };

    if was_ready {
        ready.remove(tid);
        ready.insert_sorted(tid, new_priority);
    }
}

/// Called with interrupts off when `waiter` is about to block on a lock
/// currently held by `waiter.waiting_on`. Walks the holder chain, donating
/// `waiter`'s effective priority at each step, until it reaches a thread
/// that holds no lock of its own.
pub fn donate_priority(threads: &mut Vec<Thread>, ready: &mut OrderedList<ThreadId>, waiter: ThreadId) {
    let mut donor = waiter;
    loop {
        let donor_priority = match find(threads, donor) {
            Some(t) => t.priority,
            None => return,
        };

        let holder = match find(threads, donor).and_then(|t| t.waiting_on) {
            Some(h) => h,
            None => {
                // Terminal thread in the chain: make sure its own priority
                // reflects whatever it has directly received.
                reset_priority(threads, ready, donor);
                return;
            }
        };

        if let Some(h) = find_mut(threads, holder) {
            h.donations.remove(donor);
            h.donations.insert_sorted(donor, donor_priority);
        }

        reset_priority(threads, ready, holder);
        donor = holder;
    }
}

/// Called when `tid` acquires a lock (so its donation to the previous
/// holder is no longer owed) or is removed from a lock's waiters without
/// acquiring (e.g. a timeout). Detaches `tid` from whichever donations list
/// it is sitting in and clears its holder reference.
pub fn remove_donation(threads: &mut Vec<Thread>, ready: &mut OrderedList<ThreadId>, tid: ThreadId) {
    let holder = match find_mut(threads, tid) {
        Some(t) => t.waiting_on.take(),
        None => return,
    };

    if let Some(holder) = holder {
        if let Some(h) = find_mut(threads, holder) {
            h.donations.remove(tid);
        }
        reset_priority(threads, ready, holder);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::config::PRI_DEFAULT;
    use alloc::boxed::Box;
    use alloc::string::ToString;

    fn make_thread(tid: usize, priority: i32) -> Thread {
        let stack = alloc::vec![0u8; 64].into_boxed_slice();
        let mut t = Thread::new(ThreadId(tid), tid.to_string().into(), stack, priority);
        t.status = ThreadStatus::Ready;
        t
    }

    #[test]
    fn nested_donation_chain_of_three() {
        // H holds a lock, M blocks on H, L blocks on M: priorities
        // H=10, M=20, L=30.
        let mut threads = alloc::vec![make_thread(1, 10), make_thread(2, 20), make_thread(3, 30)];
        let mut ready = OrderedList::new();
        for t in &threads {
            ready.insert_sorted(t.tid, t.priority);
        }

        let h = ThreadId(1);
        let m = ThreadId(2);
        let l = ThreadId(3);

        find_mut(&mut threads, m).unwrap().waiting_on = Some(h);
        donate_priority(&mut threads, &mut ready, m);
        assert_eq!(find(&threads, h).unwrap().priority, 20);

        find_mut(&mut threads, l).unwrap().waiting_on = Some(m);
        donate_priority(&mut threads, &mut ready, l);

        assert_eq!(find(&threads, h).unwrap().priority, 30);
        assert_eq!(find(&threads, m).unwrap().priority, 30);
        assert_eq!(find(&threads, l).unwrap().priority, 30);

        // L stops waiting on M without acquiring (e.g. timed out).
        remove_donation(&mut threads, &mut ready, l);
        assert_eq!(find(&threads, m).unwrap().priority, 20);
        assert_eq!(find(&threads, h).unwrap().priority, 20);
    }

    #[test]
    fn multi_donor_keeps_highest_until_both_release() {
        // R holds a lock; D1 (40) and D2 (50) both wait on it.
        let mut threads = alloc::vec![make_thread(1, PRI_DEFAULT), make_thread(2, 40), make_thread(3, 50)];
        let mut ready = OrderedList::new();
        for t in &threads {
            ready.insert_sorted(t.tid, t.priority);
        }
        let r = ThreadId(1);
        let d1 = ThreadId(2);
        let d2 = ThreadId(3);

        find_mut(&mut threads, d1).unwrap().waiting_on = Some(r);
        donate_priority(&mut threads, &mut ready, d1);
        find_mut(&mut threads, d2).unwrap().waiting_on = Some(r);
        donate_priority(&mut threads, &mut ready, d2);

        assert_eq!(find(&threads, r).unwrap().priority, 50);

        // D2 acquires: its donation is removed, R drops to D1's level.
        remove_donation(&mut threads, &mut ready, d2);
        assert_eq!(find(&threads, r).unwrap().priority, 40);

        // D1 acquires too: R returns to its base priority.
        remove_donation(&mut threads, &mut ready, d1);
        assert_eq!(find(&threads, r).unwrap().priority, PRI_DEFAULT);
    }
}
