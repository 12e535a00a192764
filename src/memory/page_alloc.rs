/*
 * Page Allocator
 *
 * Thread stacks need their own pages, separate from the heap's byte-grained
 * allocator: a stack is fixed-size and exited threads return whole pages,
 * not arbitrary byte ranges. Grounded in `phys.rs`'s bitmap-over-a-fixed-
 * range shape (same "0 = free, 1 = used" bitmap, same `Mutex<()>` guarding
 * it), but over a static backing array instead of the BOOTBOOT memory map,
 * since there is no physical memory map to walk without it.
 */

use spin::Mutex;

use crate::scheduler::thread::STACK_SIZE;

/// Enough pages for a generous number of concurrent kernel threads.
const PAGE_COUNT: usize = 256;
const ARENA_SIZE: usize = PAGE_COUNT * STACK_SIZE;

static mut ARENA: [u8; ARENA_SIZE] = [0u8; ARENA_SIZE];

/// One bit per page: 0 = free, 1 = used.
static BITMAP: Mutex<[u64; PAGE_COUNT / 64]> = Mutex::new([0; PAGE_COUNT / 64]);

/// Allocate one zeroed `STACK_SIZE`-byte page. Returns `None` if the arena
/// is exhausted.
pub fn alloc_page() -> Option<*mut u8> {
    let mut bitmap = BITMAP.lock();
    for (word_idx, word) in bitmap.iter_mut().enumerate() {
        if *word == u64::MAX {
            continue;
        }
        let bit = word.trailing_ones() as usize;
        let page_idx = word_idx * 64 + bit;
        if page_idx >= PAGE_COUNT {
            break;
        }
        *word |= 1 << bit;

        #[allow(static_mut_refs)]
        let base = unsafe { ARENA.as_mut_ptr().add(page_idx * STACK_SIZE) };
        unsafe {
            core::ptr::write_bytes(base, 0, STACK_SIZE);
        }
        return Some(base);
    }
    None
}

/// Return a page obtained from `alloc_page` back to the free pool.
///
/// # Safety
/// `page` must be a pointer previously returned by `alloc_page` and not
/// still reachable from any live thread's stack pointer.
pub unsafe fn free_page(page: *mut u8) {
    #[allow(static_mut_refs)]
    let base = unsafe { ARENA.as_mut_ptr() };
    let offset = (page as usize).wrapping_sub(base as usize);
    debug_assert_eq!(offset % STACK_SIZE, 0, "unaligned page pointer passed to free_page");
    let page_idx = offset / STACK_SIZE;
    debug_assert!(page_idx < PAGE_COUNT, "page pointer outside the page arena");

    let mut bitmap = BITMAP.lock();
    bitmap[page_idx / 64] &= !(1 << (page_idx % 64));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_returns_distinct_zeroed_pages() {
        let a = alloc_page().expect("arena should have free pages");
        let b = alloc_page().expect("arena should have free pages");
        assert_ne!(a, b);
        unsafe {
            free_page(a);
            free_page(b);
        }
    }

    #[test]
    fn freed_page_is_reused() {
        let a = alloc_page().unwrap();
        unsafe { free_page(a) };
        let b = alloc_page().unwrap();
        assert_eq!(a, b);
        unsafe { free_page(b) };
    }
}
