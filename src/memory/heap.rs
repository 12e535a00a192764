/*
 * Kernel Heap Allocator
 *
 * Backs Rust's global allocator (`Box`, `Vec`, `String`, ...) with the
 * `linked_list_allocator` crate. No paging subsystem here (no address
 * spaces, no userspace to isolate from), so the backing store is a single
 * static byte array living in the kernel's own BSS rather than a mapped
 * virtual range.
 */

use linked_list_allocator::LockedHeap;

/// 2 MiB: comfortably covers the thread arena, stacks, and scheduler
/// bookkeeping this kernel allocates; this is a teaching kernel, not a
/// general-purpose one.
pub const HEAP_SIZE: usize = 2 * 1024 * 1024;

static mut HEAP: [u8; HEAP_SIZE] = [0u8; HEAP_SIZE];

#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Initialize the kernel heap. Must be called exactly once, before any
/// allocation (`Box`, `Vec`, ...) is attempted.
pub fn init() {
    log::info!("initializing kernel heap ({} KiB)", HEAP_SIZE / 1024);
    unsafe {
        #[allow(static_mut_refs)]
        let heap = &mut HEAP;
        ALLOCATOR.lock().init(heap.as_mut_ptr(), heap.len());
    }
}

#[alloc_error_handler]
fn alloc_error(layout: core::alloc::Layout) -> ! {
    panic!("kernel heap allocation failed: {:?}", layout);
}
