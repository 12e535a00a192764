/*
 * Scheduler Error Type
 *
 * The scheduler's only recoverable failure modes: running out of thread
 * slots, and looking a thread up by an identifier that no longer refers to
 * a live thread. Everything else (wrong interrupt level, wrong thread
 * status, out-of-range priority) is a precondition violation and asserts
 * instead of returning an error, per the kernel's fatal/recoverable split.
 */

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    /// `thread_create` could not allocate a stack page for the new thread.
    OutOfThreads,
    /// A `ThreadId` does not name a live thread.
    ThreadNotFound,
    /// An operation that requires `BLOCKED` found some other status.
    NotBlocked,
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::OutOfThreads => write!(f, "out of thread slots"),
            SchedError::ThreadNotFound => write!(f, "thread not found"),
            SchedError::NotBlocked => write!(f, "thread is not blocked"),
        }
    }
}
