/*
 * Kernel Utilities and Support Functions
 *
 * Support infrastructure shared across the subsystem: the serial text sink,
 * the print macros built on it, and the logging facade.
 *
 * Key components:
 * - writer: serial port text output
 * - macros: print and serial_println macros
 * - logger: structured logging via the log facade
 */

#[macro_use]
pub mod macros;
pub mod logger;
pub mod writer;

#[cfg(test)]
pub mod testing;
