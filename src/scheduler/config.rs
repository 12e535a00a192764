/*
 * Scheduler Configuration
 *
 * Compile-time constants and the one piece of boot-time configuration the
 * scheduler accepts: whether to run the MLFQ policy instead of strict
 * priority scheduling.
 */

use core::sync::atomic::{AtomicBool, Ordering};

/// Lowest priority a thread may hold.
pub const PRI_MIN: i32 = 0;
/// Priority assigned to a thread at creation unless overridden.
pub const PRI_DEFAULT: i32 = 31;
/// Highest priority a thread may hold.
pub const PRI_MAX: i32 = 63;

/// Lowest `nice` value.
pub const NICE_MIN: i32 = -20;
/// Highest `nice` value.
pub const NICE_MAX: i32 = 20;

/// Ticks a thread may run before preemption is requested.
pub const TIME_SLICE: u32 = 4;

/// Timer frequency assumed by the MLFQ per-second recurrence.
pub const TIMER_FREQ: u32 = 100;

/// Set once at boot by the `-o mlfqs` command-line option; `false` selects
/// the strict priority-donation scheduler.
static MLFQS: AtomicBool = AtomicBool::new(false);

/// Select the MLFQ policy. Must be called before `thread_init`; calling it
/// afterward would leave already-created threads initialized under the
/// wrong policy's assumptions about `priority`/`recent_cpu`.
pub fn set_mlfqs(enabled: bool) {
    MLFQS.store(enabled, Ordering::SeqCst);
}

pub fn mlfqs_enabled() -> bool {
    MLFQS.load(Ordering::SeqCst)
}

pub fn clamp_priority(p: i32) -> i32 {
    p.clamp(PRI_MIN, PRI_MAX)
}

pub fn clamp_nice(n: i32) -> i32 {
    n.clamp(NICE_MIN, NICE_MAX)
}
