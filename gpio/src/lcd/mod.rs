//! Character LCD drivers.

pub mod hd44780;

use crate::GpioError;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum LcdError {
    #[error("GPIO error: {0}")]
    Gpio(#[from] GpioError),
    #[error("the display has not been initialized")]
    NotInitialized,
    #[error("the 5x10 font is only available in one-line mode")]
    UnsupportedFont,
    #[error("line {0} is out of range, only lines 0 and 1 are addressable")]
    LineOutOfRange(u8),
    #[error("address {address:#04x} is out of range (max {max:#04x})")]
    AddressOutOfRange { address: u16, max: u8 },
    #[error("CGRAM slot {slot} is out of range for the active font (max {max})")]
    SlotOutOfRange { slot: u8, max: u8 },
    #[error("glyph pattern must have {expected} rows, got {actual}")]
    PatternLength { expected: usize, actual: usize },
    #[error("formatted text needs {required} bytes, but the buffer only holds {capacity}")]
    WouldTruncate { required: usize, capacity: usize },
}

pub type LcdResult<T> = Result<T, LcdError>;
