/*
 * MLFQ Policy
 *
 * The BSD 4.4-style multi-level feedback queue: priorities are derived
 * purely from `nice` and a decayed `recent_cpu`, recomputed on a fixed
 * schedule rather than changed directly by `set_priority`. Active only
 * when `config::mlfqs_enabled()` is set at boot.
 */

use alloc::vec::Vec;

use super::config::{clamp_priority, PRI_MAX};
use super::fixed_point::Fixed;
use super::thread::{Thread, ThreadStatus};

/// `priority = PRI_MAX - recent_cpu/4 - 2*nice`, run every 4th tick for
/// every thread (including the one currently running).
pub fn recompute_priority(thread: &mut Thread) {
    let term = thread.recent_cpu.div_int(4).to_int_trunc();
    let p = PRI_MAX - term - 2 * thread.nice;
    thread.priority = clamp_priority(p);
    // Under MLFQ, base_priority tracks the derived value too: manual
    // set_priority is a no-op in this mode (§4.F), and keeping the two in
    // sync means a later switch back to strict mode has a sane starting
    // point instead of a stale creation-time default.
    thread.base_priority = thread.priority;
}

pub fn recompute_all_priorities(threads: &mut Vec<Thread>) {
    for t in threads.iter_mut() {
        recompute_priority(t);
    }
}

/// Per-tick recurrence: the running thread's `recent_cpu` increments by one
/// fixed-point unit. The idle thread never accumulates CPU time.
pub fn tick_recent_cpu(running: &mut Thread, is_idle: bool) {
    if !is_idle {
        running.recent_cpu = running.recent_cpu + 1;
    }
}

/// Once-per-second recurrence: advances `load_avg` from the current ready
/// count, then decays every thread's `recent_cpu` by the resulting factor.
pub fn recompute_load_avg_and_decay(
    threads: &mut Vec<Thread>,
    load_avg: Fixed,
    ready_count: usize,
    current_is_idle: bool,
) -> Fixed {
    let ready_for_avg = ready_count + if current_is_idle { 0 } else { 1 };

    let fifty_nine_sixtieths = Fixed::from_int(59).div_int(60);
    let one_sixtieth = Fixed::from_int(1).div_int(60);
    let new_load_avg =
        fifty_nine_sixtieths * load_avg + one_sixtieth.mul_int(ready_for_avg as i32);

    let two_load_avg = new_load_avg.mul_int(2);
    let decay = two_load_avg / (two_load_avg + 1);

    for t in threads.iter_mut() {
        t.recent_cpu = decay * t.recent_cpu + t.nice;
    }

    new_load_avg
}

pub fn get_load_avg_percent(load_avg: Fixed) -> i32 {
    load_avg.mul_int(100).to_int_round()
}

pub fn get_recent_cpu_percent(thread: &Thread) -> i32 {
    thread.recent_cpu.mul_int(100).to_int_round()
}

pub fn ready_count_excluding(threads: &[Thread]) -> usize {
    threads.iter().filter(|t| t.status == ThreadStatus::Ready).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::config::PRI_MAX;
    use crate::scheduler::thread::{Thread, ThreadId};
    use alloc::string::ToString;

    fn make_thread(nice: i32) -> Thread {
        let stack = alloc::vec![0u8; 64].into_boxed_slice();
        let mut t = Thread::new(ThreadId(1), "t".to_string(), stack, PRI_MAX);
        t.nice = nice;
        t
    }

    #[test]
    fn single_thread_baseline_starts_at_pri_max() {
        let mut t = make_thread(0);
        recompute_priority(&mut t);
        assert_eq!(t.priority, PRI_MAX);
    }

    #[test]
    fn cpu_bound_thread_priority_decreases_as_recent_cpu_grows() {
        let mut t = make_thread(0);
        for _ in 0..400 {
            tick_recent_cpu(&mut t, false);
        }
        recompute_priority(&mut t);
        assert!(t.priority < PRI_MAX);
    }

    #[test]
    fn higher_nice_never_increases_priority() {
        let mut low_nice = make_thread(0);
        let mut high_nice = make_thread(10);
        recompute_priority(&mut low_nice);
        recompute_priority(&mut high_nice);
        assert!(high_nice.priority <= low_nice.priority);
    }

    #[test]
    fn load_avg_bootstraps_toward_known_fixed_point_value() {
        // One ready thread every second, starting from load_avg = 0: after
        // k seconds, load_avg = 1 - (59/60)^k. At k=60 this is ~0.6322,
        // i.e. get_load_avg_percent ~= 63.
        let mut threads: alloc::vec::Vec<Thread> = alloc::vec::Vec::new();
        let mut load_avg = Fixed::ZERO;
        for _ in 0..60 {
            load_avg = recompute_load_avg_and_decay(&mut threads, load_avg, 0, false);
        }
        let percent = get_load_avg_percent(load_avg);
        assert!((60..=67).contains(&percent), "got {percent}");
    }

    #[test]
    fn idle_system_load_avg_stays_at_zero() {
        let mut threads: alloc::vec::Vec<Thread> = alloc::vec::Vec::new();
        let mut load_avg = Fixed::ZERO;
        for _ in 0..10 {
            load_avg = recompute_load_avg_and_decay(&mut threads, load_avg, 0, true);
        }
        assert_eq!(get_load_avg_percent(load_avg), 0);
    }
}
