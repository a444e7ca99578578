//! HD44780 character LCD module.
//!
//! [driver] holds the instruction encoder ([driver::HD44780Driver]) and the parallel GPIO
//! transport ([driver::GpioHD44780Driver]). [HD44780Display] builds the user-facing operations on
//! top of any driver.

pub mod driver;
mod display;

pub use display::*;
