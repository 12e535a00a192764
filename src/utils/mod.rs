/*
 * Kernel Utilities and Support Functions
 *
 * Key components:
 * - writer: Serial port text output functionality (`print!`/`serial_println!`)
 * - macros: Kernel-specific print and debug macros
 * - debug: IRQ-safe logging primitives and the `log::Log` implementation
 *   installed at boot
 *
 */

pub mod writer;
#[macro_use]
pub mod macros;
pub mod debug;
