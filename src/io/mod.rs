/*
 * Input/Output System
 *
 * Low-level port I/O for direct hardware communication.
 */

pub mod pio;

pub use pio::{Io, Pio, ReadOnly};
