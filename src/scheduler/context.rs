/*
 * Context Switch
 *
 * A context switch here is a primitive that swaps stack pointers and
 * "returns as" the new thread. Switching through a full interrupt frame
 * and `iretq` only makes sense if every switch originates from an
 * interrupt handler; this kernel also switches voluntarily from ordinary
 * function calls (`thread_yield`, `thread_block`), so a simpler stack-swap
 * primitive (`CpuContext` + `extern "C" fn context_switch(old, new, tid) ->
 * tid`) is used instead.
 */

use core::arch::global_asm;

/// Callee-saved registers plus the instruction pointer a switched-out
/// thread resumes at. Caller-saved registers are already on the stack by
/// the time `context_switch` runs (it's an ordinary `extern "C"` call), so
/// only the callee-saved set needs to survive the switch.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuContext {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub rbx: u64,
    pub rbp: u64,
    pub rip: u64,
}

unsafe extern "C" {
    /// Saves the caller's callee-saved registers onto its own stack (at
    /// `*old_sp`), switches `rsp` to `new_sp`, and returns into whatever
    /// context is sitting there — either a previously-switched-out thread
    /// resuming after this same call, or a freshly prepared stack whose
    /// return address is `thread_trampoline`.
    ///
    /// `from_tid` is the caller's own id. It rides in a register that the
    /// switch never saves or restores (only the callee-saved set is), so it
    /// survives untouched through the stack swap and is handed back as the
    /// return value — which means whoever resumes out of a *previous* call
    /// to this function receives, as that call's return value, the id of
    /// whichever thread just performed the switch that woke them up. That's
    /// the only reliable way to learn who last ran: a value computed before
    /// a switch describes the world as of the call that's switching away,
    /// not the call that eventually resumes.
    fn context_switch(old_sp: *mut usize, new_sp: usize, from_tid: usize) -> usize;
}

/// Switch from `from`'s stack to `to`'s stack, returning the id of whichever
/// thread's own switch call is what actually resumed execution here. Must be
/// called with interrupts disabled and `from` already marked non-`Running`.
pub fn switch(from_sp: &mut usize, to_sp: usize, from_tid: usize) -> usize {
    unsafe { context_switch(from_sp as *mut usize, to_sp, from_tid) }
}

/// Lay out a brand-new thread's stack so that the first `context_switch`
/// into it pops a `CpuContext` whose `rip` is `thread_trampoline`, which
/// then calls `entry(arg)` on behalf of the new thread.
///
/// Returns the initial stack pointer to store as the thread's
/// `stack_pointer` field.
pub fn prepare_initial_context(stack_top: *mut u8, entry: usize, arg: usize) -> usize {
    unsafe {
        let mut sp = (stack_top as usize) & !0xf;

        // Trampoline reads (entry, arg) off the stack just below the
        // CpuContext context_switch will pop.
        sp -= core::mem::size_of::<usize>();
        *(sp as *mut usize) = arg;
        sp -= core::mem::size_of::<usize>();
        *(sp as *mut usize) = entry;

        sp -= core::mem::size_of::<CpuContext>();
        let ctx = sp as *mut CpuContext;
        *ctx = CpuContext {
            r15: 0,
            r14: 0,
            r13: 0,
            r12: 0,
            rbx: 0,
            rbp: 0,
            rip: thread_trampoline as usize as u64,
        };

        sp
    }
}

/// Entry point every freshly created thread's stack is wired to resume at.
/// Pops `(entry, arg)` that `prepare_initial_context` placed below the
/// saved `CpuContext`, calls `entry(arg)`, and exits the thread if `entry`
/// ever returns instead of calling `ThreadManager::exit` itself.
#[unsafe(naked)]
extern "C" fn thread_trampoline() -> ! {
    core::arch::naked_asm!(
        "pop rdi",
        "pop rax",
        "call rax",
        "jmp {exit}",
        exit = sym trampoline_exit,
    );
}

extern "C" fn trampoline_exit() -> ! {
    super::manager::ThreadManager::exit(0);
}

global_asm!(
    r#"
.global context_switch
context_switch:
    push rbp
    push rbx
    push r12
    push r13
    push r14
    push r15
    mov [rdi], rsp
    mov rsp, rsi
    pop r15
    pop r14
    pop r13
    pop r12
    pop rbx
    pop rbp
    mov rax, rdx
    ret
"#
);
