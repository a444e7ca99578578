//! GpiodDriver implementation for driving output lines through the Linux GPIO character device,
//! using the gpiod library.
use crate::{GpioBusOutput, GpioDriver, GpioError, GpioOutput, GpioResult, has_duplicates};
use bitvec::vec::BitVec;
use log::debug;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::AtomicU8;

/// GpiodDriver hands out output lines of a single GPIO chip (e.g. `/dev/gpiochip0`).
pub struct GpiodDriver {
    chip: gpiod::Chip,
    used_pins: BitVec<AtomicU8>,
}

impl GpiodDriver {
    pub fn new(chip: gpiod::Chip) -> Self {
        let n = chip.num_lines() as usize;
        let bits = BitVec::repeat(false, n);
        Self {
            chip,
            used_pins: bits,
        }
    }

    /// Opens the chip at the given path, e.g. `/dev/gpiochip0`.
    pub fn open(path: &str) -> GpioResult<Self> {
        Ok(Self::new(gpiod::Chip::new(path)?))
    }

    fn claim(&self, indices: &[usize]) -> GpioResult<()> {
        let n = self.count()?;

        if indices.iter().any(|&index| index >= n) || has_duplicates(indices) {
            return Err(GpioError::InvalidArgument);
        }

        if indices.iter().any(|&index| self.used_pins[index]) {
            return Err(GpioError::AlreadyInUse);
        }

        for &index in indices {
            self.used_pins.set_aliased(index, true);
        }
        Ok(())
    }

    fn release(&self, indices: &[usize]) {
        for &index in indices {
            self.used_pins.set_aliased(index, false);
        }
    }

    fn request(&self, indices: &[usize]) -> GpioResult<gpiod::Lines<gpiod::Output>> {
        self.claim(indices)?;

        let lines = self.chip.request_lines(
            gpiod::Options::output(
                indices
                    .iter()
                    .map(|&index| index as u32)
                    .collect::<Vec<_>>(),
            )
            .consumer(env!("CARGO_PKG_NAME")),
        );

        match lines {
            Ok(lines) => {
                debug!("{:?} claimed lines {:?}", self, indices);
                Ok(lines)
            }
            Err(err) => {
                self.release(indices);
                Err(err.into())
            }
        }
    }
}

impl Debug for GpiodDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodDriver({})", self.chip.name())
    }
}

impl GpioDriver for GpiodDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.chip.num_lines() as usize)
    }

    fn get_output(&self, index: usize) -> GpioResult<Box<dyn GpioOutput + '_>> {
        let line = self.request(&[index])?;
        let output = GpiodOutput {
            driver: self,
            pin_index: index,
            line,
        };
        output.write(false)?;
        Ok(Box::new(output))
    }

    fn get_output_bus<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>> {
        let line = self.request(&indices)?;
        let output = GpiodBusOutput {
            driver: self,
            pin_indices: indices,
            line,
        };
        output.write(&[false; N])?;
        Ok(Box::new(output))
    }
}

struct GpiodOutput<'a> {
    driver: &'a GpiodDriver,
    pin_index: usize,
    line: gpiod::Lines<gpiod::Output>,
}

impl Debug for GpiodOutput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}][output]", self.driver, self.pin_index)
    }
}

impl GpioOutput for GpiodOutput<'_> {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.line.set_values([value])?;
        Ok(())
    }
}

impl Drop for GpiodOutput<'_> {
    fn drop(&mut self) {
        self.driver.release(&[self.pin_index]);
    }
}

struct GpiodBusOutput<'a, const N: usize> {
    driver: &'a GpiodDriver,
    pin_indices: [usize; N],
    line: gpiod::Lines<gpiod::Output>,
}

impl<const N: usize> Debug for GpiodBusOutput<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}{:?}[output]", self.driver, self.pin_indices)
    }
}

impl<const N: usize> GpioBusOutput<N> for GpiodBusOutput<'_, N> {
    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        self.line.set_values(*values)?;
        Ok(())
    }
}

impl<const N: usize> Drop for GpiodBusOutput<'_, N> {
    fn drop(&mut self) {
        self.driver.release(&self.pin_indices);
    }
}
