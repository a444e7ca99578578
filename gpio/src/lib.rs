pub mod delay;
pub mod gpiod;
pub mod lcd;
pub mod raw;

#[cfg(test)]
pub(crate) mod testing;

pub use delay::*;

use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("pin already in use")]
    AlreadyInUse,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the feature is not supported on this backend")]
    NotSupported,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

/// Checks whether any line index appears more than once.
pub(crate) fn has_duplicates(indices: &[usize]) -> bool {
    indices
        .iter()
        .enumerate()
        .any(|(i, index)| indices[i + 1..].contains(index))
}

/// A source of digital output lines.
///
/// Every line handed out is exclusively claimed until the returned handle is dropped, so two
/// drivers can never toggle the same physical line.
pub trait GpioDriver: Debug {
    /// Gets the amount of GPIO lines available.
    fn count(&self) -> GpioResult<usize>;

    /// Claims the line at the given index and configures it as an output, driven low.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if the index is out of range.
    /// - `GpioError::AlreadyInUse` if the line is already claimed.
    fn get_output(&self, index: usize) -> GpioResult<Box<dyn GpioOutput + '_>>;

    /// Claims the lines at the given indices as a single output bus, driven low.
    ///
    /// Index `0` of the bus is the least significant bit. Repeating an index is
    /// `GpioError::InvalidArgument`.
    fn get_output_bus<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>>;
}

pub trait GpioOutput: Debug {
    /// Writes the state of the GPIO line.
    fn write(&self, value: bool) -> GpioResult<()>;
}

pub trait GpioBusOutput<const N: usize>: Debug {
    fn write(&self, values: &[bool; N]) -> GpioResult<()>;
}

impl dyn GpioBusOutput<8> + '_ {
    /// Writes the values to the GPIO lines in the bus.
    /// The values are written as a byte, LSb first.
    pub fn write_byte(&self, value: u8) -> GpioResult<()> {
        let mut values = [false; 8];
        for (i, line) in values.iter_mut().enumerate() {
            *line = (value & (1 << i)) != 0;
        }
        self.write(&values)
    }
}

impl dyn GpioBusOutput<4> + '_ {
    /// Writes the values to the GPIO lines in the bus.
    /// The values are written as a nibble, LSb first.
    pub fn write_nibble(&self, value: u8) -> GpioResult<()> {
        if value > 0b1111 {
            return Err(GpioError::InvalidArgument);
        }

        let mut values = [false; 4];
        for (i, line) in values.iter_mut().enumerate() {
            *line = (value & (1 << i)) != 0;
        }
        self.write(&values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug)]
    struct LatchBus<const N: usize> {
        last: Cell<[bool; N]>,
    }

    impl<const N: usize> LatchBus<N> {
        fn new() -> Self {
            LatchBus {
                last: Cell::new([false; N]),
            }
        }
    }

    impl<const N: usize> GpioBusOutput<N> for LatchBus<N> {
        fn write(&self, values: &[bool; N]) -> GpioResult<()> {
            self.last.set(*values);
            Ok(())
        }
    }

    #[test]
    fn nibble_is_written_lsb_first() {
        let bus = LatchBus::<4>::new();
        let output: &dyn GpioBusOutput<4> = &bus;
        output.write_nibble(0b0011).unwrap();
        assert_eq!(bus.last.get(), [true, true, false, false]);
    }

    #[test]
    fn nibble_rejects_wide_values() {
        let bus = LatchBus::<4>::new();
        let output: &dyn GpioBusOutput<4> = &bus;
        assert_eq!(output.write_nibble(0x10), Err(GpioError::InvalidArgument));
        assert_eq!(bus.last.get(), [false; 4]);
    }

    #[test]
    fn byte_is_written_lsb_first() {
        let bus = LatchBus::<8>::new();
        let output: &dyn GpioBusOutput<8> = &bus;
        output.write_byte(0xC5).unwrap();
        assert_eq!(
            bus.last.get(),
            [true, false, true, false, false, false, true, true]
        );
    }

    #[test]
    fn repeated_indices_are_detected() {
        assert!(has_duplicates(&[4, 4, 5, 6]));
        assert!(has_duplicates(&[4, 5, 6, 4]));
        assert!(!has_duplicates(&[4, 5, 6, 7]));
        assert!(!has_duplicates(&[]));
    }

    #[test]
    fn io_errors_keep_their_kind() {
        let err: GpioError = std::io::Error::from(std::io::ErrorKind::PermissionDenied).into();
        assert_eq!(err, GpioError::Io(std::io::ErrorKind::PermissionDenied));
    }
}
