/*
 * Timer Tick Handler
 *
 * The timer device itself is an external collaborator: this kernel does
 * not program the PIT/APIC or field a hardware IRQ for it. What belongs to
 * the scheduler is the consuming side — the accounting
 * `sched_core::SchedCore::on_tick` does on every tick and the "should we
 * yield" decision it produces.
 */

use super::manager::{SchedulerManager, ThreadManager};

/// Call once per timer tick (real or simulated). Performs MLFQ accounting
/// and yields immediately if the tick decided the running thread's slice
/// is over or a higher-priority thread became ready.
pub fn on_tick() {
    if SchedulerManager::on_tick() {
        ThreadManager::yield_now();
    }
}
