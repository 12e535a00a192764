/*
 * x86_64 Architecture Support Module
 *
 * Submodules:
 * - gdt: Global Descriptor Table management
 * - idt: Interrupt Descriptor Table and exception handling
 * - interrupts: Interrupt control utilities
 */

pub mod gdt;
pub mod idt;
pub mod interrupts;

