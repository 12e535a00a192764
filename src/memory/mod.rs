/*
 * Memory Management
 *
 * No paging or address-space layer: this kernel has one address space and
 * no user/kernel isolation to enforce. Just the two allocators that still
 * have a job: bytes (`heap`) and whole pages for thread stacks
 * (`page_alloc`).
 */

pub mod heap;
pub mod page_alloc;

pub fn init() {
    heap::init();
}
