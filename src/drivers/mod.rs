/*
 * Hardware Drivers
 *
 * Only the serial (UART) driver is wired up: it backs the kernel logger
 * (see `utils::debug`), which is the one piece of hardware this kernel
 * needs. No framebuffer, no keyboard, no block devices — there's no
 * console or shell here for them to serve.
 */

pub mod serial;
