/*
 * Synchronization Primitives
 *
 * `Lock<T>`: a mutex that blocks waiters instead of spinning and donates
 * priority to whoever is holding it.
 */

pub mod lock;

pub use lock::{Lock, LockGuard};
