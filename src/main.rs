/*
 * Threadcore Kernel Entry Point
 *
 * Entry point for a bare-metal kernel built around the BOOTBOOT bootloader
 * protocol. This kernel's only job is to boot, stand up enough of itself
 * to run kernel threads, and demonstrate the priority-donation/MLFQ
 * scheduler against a handful of built-in threads before idling — there is
 * no userspace, no filesystem, no IPC.
 */

#![no_std]
#![no_main]
#![feature(abi_x86_interrupt)]
#![feature(alloc_error_handler)]
#![allow(dead_code)]

extern crate alloc;

use core::panic::PanicInfo;

mod arch;
mod drivers;
mod io;
mod memory;
mod scheduler;
mod sync;
mod utils;

use scheduler::{SchedulerManager, ThreadManager};
use sync::Lock;

#[repr(C, align(16))]
pub struct AlignedBspStack([u8; 64 * 1024]);

#[unsafe(no_mangle)]
pub static mut BSP_STACK: AlignedBspStack = AlignedBspStack([0; 64 * 1024]);

/// ===============================
///  EARLY ENTRY POINT (_start)
/// ===============================
///
/// Called directly by the bootloader. No SMP: just switch onto our own
/// stack and jump to `kstart`.
///
#[unsafe(naked)]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn _start() -> ! {
    core::arch::naked_asm!(
        "lea rax, [rip + BSP_STACK]",
        "add rax, {stack_size}",
        "mov rsp, rax",
        "jmp kstart",

        stack_size = const 64 * 1024,
    );
}

/// Demonstrate strict-priority preemption: a low-priority thread runs
/// until a higher-priority thread becomes ready, at which point it must be
/// preempted immediately rather than finishing its slice.
extern "C" fn low_priority_worker(id: usize) {
    for i in 0..5 {
        log::info!("worker[{}] (low) step {}", id, i);
        for _ in 0..200_000 {
            core::hint::spin_loop();
        }
    }
    log::info!("worker[{}] (low) done", id);
}

extern "C" fn high_priority_worker(id: usize) {
    log::info!("worker[{}] (high) running", id);
    log::info!("worker[{}] (high) done", id);
}

/// Shared resource for the donation demo: a low-*base*-priority thread
/// holds it while a high-priority thread blocks on it, which must raise
/// the holder's effective priority for as long as it's held.
static DONATION_LOCK: Lock<u32> = Lock::new(0);

/// Acquires the lock, then blocks itself (simulating work that yields the
/// CPU while still holding the lock, e.g. waiting on I/O) until `kstart`
/// explicitly wakes it back up once a higher-priority thread is blocked
/// waiting on the same lock.
extern "C" fn donation_holder(_arg: usize) {
    log::info!("donation-holder: acquiring lock at priority {}", ThreadManager::get_priority());
    let mut guard = DONATION_LOCK.acquire();
    log::info!("donation-holder: lock acquired, blocking while still holding it");
    ThreadManager::block_current();

    log::info!("donation-holder: resumed, priority now {}", ThreadManager::get_priority());
    for _ in 0..200_000 {
        core::hint::spin_loop();
    }
    *guard += 1;
    drop(guard);
    log::info!("donation-holder: released lock, priority back to {}", ThreadManager::get_priority());
}

extern "C" fn donation_waiter(_arg: usize) {
    log::info!("donation-waiter: blocking on lock at priority {}", ThreadManager::get_priority());
    let guard = DONATION_LOCK.acquire();
    log::info!("donation-waiter: acquired lock, value = {}", *guard);
}

/// ===============================
///  RUST KERNEL ENTRY POINT
/// ===============================
///
/// Now running on our safe, large BSP stack.
/// APs never run this function.
///
#[unsafe(no_mangle)]
pub extern "C" fn kstart() -> ! {
    utils::debug::init_debug_infrastructure();
    utils::debug::logger::init(true);
    log::info!("threadcore kernel starting...");

    arch::x86_64::gdt::init();
    // CRITICAL: must run before anything that could fault (memory init,
    // scheduler setup) or an unhandled exception triple-faults the CPU.
    arch::x86_64::idt::init();

    memory::init();
    log::info!("memory management initialized");

    // Adopts this execution (still running on BSP_STACK) as the initial
    // thread. `false` here selects the strict priority-donation scheduler;
    // flip to `true` to boot into the MLFQ policy instead, mirroring
    // Pintos's `-o mlfqs` boot argument.
    SchedulerManager::init();
    SchedulerManager::start(false);

    // donation-holder's priority (35) is above this thread's (31) so
    // creating it preempts immediately: it must be the one to grab the
    // lock before anyone can block on it.
    let holder_tid = ThreadManager::spawn("donation-holder", 35, donation_holder, 0)
        .expect("failed to spawn donation-holder");

    // donation-waiter's priority (50) preempts immediately too, and finds
    // the lock already held: it blocks there and donates up to the holder.
    ThreadManager::spawn("donation-waiter", 50, donation_waiter, 0)
        .expect("failed to spawn donation-waiter");

    // Wake the holder back up — still holding the lock, now running at the
    // waiter's donated priority — so it can finish and release it.
    ThreadManager::unblock(holder_tid);

    ThreadManager::spawn("worker-low", 20, low_priority_worker, 1)
        .expect("failed to spawn worker-low");
    ThreadManager::spawn("worker-high", 40, high_priority_worker, 2)
        .expect("failed to spawn worker-high");

    log::info!("kernel initialization complete, starting scheduler");

    arch::x86_64::interrupts::enable();
    SchedulerManager::kick_off();

    // Reached only once every spawned thread has exited and the idle
    // thread is the only one left ready.
    loop {
        x86_64::instructions::hlt();
    }
}

///  PANIC HANDLER
/// ===============================
///
/// Logging may fail early, but this is safe once the logger is up.
///
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    x86_64::instructions::interrupts::disable();

    if let Some(location) = info.location() {
        log::error!(
            "PANIC at {}:{}: {}",
            location.file(),
            location.line(),
            info.message()
        );
    } else {
        log::error!("PANIC: {}", info.message());
    }

    loop {
        x86_64::instructions::hlt();
    }
}
