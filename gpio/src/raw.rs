//! RawGpioDriver drives the BCM283x GPIO block directly through its memory-mapped registers.
//!
//! This is the fastest backend, since every write is a single volatile store, but it requires
//! access to `/dev/gpiomem` (or `/dev/mem` as root) on a Raspberry Pi.
use crate::{GpioBusOutput, GpioDriver, GpioError, GpioOutput, GpioResult, has_duplicates};
use bitvec::vec::BitVec;
use log::debug;
use memmap2::{MmapOptions, MmapRaw};
use std::fmt::{Debug, Formatter};
use std::fs::OpenOptions;
use std::sync::atomic::AtomicU8;

pub struct RawGpioDriver {
    mmap: MmapRaw,
    used_pins: BitVec<AtomicU8>,
}

impl RawGpioDriver {
    const GPIO_BASE: u32 = 0x3F200000;

    const PIN_COUNT: usize = 58;

    const FUNCTION_INPUT: u32 = 0b000;
    const FUNCTION_OUTPUT: u32 = 0b001;

    // Register offsets, in bytes
    const GPSET0: usize = 0x1C;
    const GPCLR0: usize = 0x28;

    fn create(path: &str, offset: u64) -> GpioResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let mmap = MmapOptions::new()
            .offset(offset)
            .len(4096)
            .map_raw(&file)?;

        Ok(RawGpioDriver {
            mmap,
            used_pins: BitVec::repeat(false, Self::PIN_COUNT),
        })
    }

    /// Maps the GPIO block through `/dev/gpiomem`, which exposes only the GPIO registers and does
    /// not require root.
    pub fn new_gpiomem() -> GpioResult<Self> {
        Self::create("/dev/gpiomem", 0)
    }

    /// Maps the GPIO block through `/dev/mem`. Requires root.
    pub fn new_mem() -> GpioResult<Self> {
        Self::create("/dev/mem", Self::GPIO_BASE as u64)
    }

    #[cfg(test)]
    fn new_anon() -> GpioResult<Self> {
        let mmap = MmapOptions::new().len(4096).map_anon()?;
        Ok(RawGpioDriver {
            mmap: mmap.into(),
            used_pins: BitVec::repeat(false, Self::PIN_COUNT),
        })
    }

    fn register(&self, byte_offset: usize) -> *mut u32 {
        let base = self.mmap.as_mut_ptr() as *mut u32;
        // SAFETY: every offset used by this driver lies within the 4096 byte mapping.
        unsafe { base.add(byte_offset / 4) }
    }

    fn raw_set_pin_function(&self, pin_index: usize, function: u32) -> GpioResult<()> {
        if pin_index >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }

        // GPFSELn register
        let register_ptr = self.register((pin_index / 10) * 4);
        let shift = (pin_index % 10) * 3;

        let mut register_value = unsafe { register_ptr.read_volatile() };
        register_value &= !(0b111 << shift);
        register_value |= function << shift;
        unsafe { register_ptr.write_volatile(register_value) };

        Ok(())
    }

    fn raw_set_pin_output(&self, pin_index: usize, high: bool) -> GpioResult<()> {
        if pin_index >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }

        // GPSETn/GPCLRn register
        let base = if high { Self::GPSET0 } else { Self::GPCLR0 };
        let register_ptr = self.register(base + (pin_index / 32) * 4);
        let shift = pin_index % 32;

        unsafe { register_ptr.write_volatile(1 << shift) };

        Ok(())
    }

    fn claim(&self, indices: &[usize]) -> GpioResult<()> {
        if indices.iter().any(|&index| index >= Self::PIN_COUNT) || has_duplicates(indices) {
            return Err(GpioError::InvalidArgument);
        }

        if indices.iter().any(|&index| self.used_pins[index]) {
            return Err(GpioError::AlreadyInUse);
        }

        for &index in indices {
            self.used_pins.set_aliased(index, true);
            self.raw_set_pin_output(index, false)?;
            self.raw_set_pin_function(index, Self::FUNCTION_OUTPUT)?;
        }

        debug!("{:?} claimed pins {:?}", self, indices);
        Ok(())
    }

    fn release(&self, indices: &[usize]) {
        for &index in indices {
            _ = self.raw_set_pin_function(index, Self::FUNCTION_INPUT);
            self.used_pins.set_aliased(index, false);
        }
    }
}

impl Debug for RawGpioDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawGpioDriver({:?})", self.mmap.as_ptr().addr())
    }
}

impl GpioDriver for RawGpioDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(Self::PIN_COUNT)
    }

    fn get_output(&self, index: usize) -> GpioResult<Box<dyn GpioOutput + '_>> {
        self.claim(&[index])?;
        Ok(Box::new(RawGpioOutput {
            driver: self,
            pin_index: index,
        }))
    }

    fn get_output_bus<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>> {
        self.claim(&indices)?;
        Ok(Box::new(RawGpioBusOutput {
            driver: self,
            pin_indices: indices,
        }))
    }
}

struct RawGpioOutput<'a> {
    driver: &'a RawGpioDriver,
    pin_index: usize,
}

impl Debug for RawGpioOutput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}][output]", self.driver, self.pin_index)
    }
}

impl GpioOutput for RawGpioOutput<'_> {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.driver.raw_set_pin_output(self.pin_index, value)
    }
}

impl Drop for RawGpioOutput<'_> {
    fn drop(&mut self) {
        self.driver.release(&[self.pin_index]);
    }
}

struct RawGpioBusOutput<'a, const N: usize> {
    driver: &'a RawGpioDriver,
    pin_indices: [usize; N],
}

impl<const N: usize> Debug for RawGpioBusOutput<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}{:?}[output]", self.driver, self.pin_indices)
    }
}

impl<const N: usize> GpioBusOutput<N> for RawGpioBusOutput<'_, N> {
    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        for (&pin_index, &value) in self.pin_indices.iter().zip(values) {
            self.driver.raw_set_pin_output(pin_index, value)?;
        }
        Ok(())
    }
}

impl<const N: usize> Drop for RawGpioBusOutput<'_, N> {
    fn drop(&mut self) {
        self.driver.release(&self.pin_indices);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(driver: &RawGpioDriver, byte_offset: usize) -> u32 {
        unsafe { driver.register(byte_offset).read_volatile() }
    }

    #[test]
    fn claimed_pin_is_switched_to_output() {
        let gpio = RawGpioDriver::new_anon().unwrap();
        let _pin = gpio.get_output(17).unwrap();
        // GPFSEL1, pin 17 occupies bits 21..24
        assert_eq!((read(&gpio, 4) >> 21) & 0b111, 0b001);
    }

    #[test]
    fn writes_hit_set_and_clear_registers() {
        let gpio = RawGpioDriver::new_anon().unwrap();
        let pin = gpio.get_output(40).unwrap();

        pin.write(true).unwrap();
        assert_eq!(read(&gpio, RawGpioDriver::GPSET0 + 4), 1 << 8);

        pin.write(false).unwrap();
        assert_eq!(read(&gpio, RawGpioDriver::GPCLR0 + 4), 1 << 8);
    }

    #[test]
    fn pins_cannot_be_claimed_twice() {
        let gpio = RawGpioDriver::new_anon().unwrap();
        let pin = gpio.get_output(5).unwrap();
        assert_eq!(gpio.get_output(5).unwrap_err(), GpioError::AlreadyInUse);
        assert_eq!(
            gpio.get_output_bus([4, 5, 6, 7]).unwrap_err(),
            GpioError::AlreadyInUse
        );

        drop(pin);
        assert!(gpio.get_output_bus([4, 5, 6, 7]).is_ok());
    }

    #[test]
    fn out_of_range_pins_are_rejected() {
        let gpio = RawGpioDriver::new_anon().unwrap();
        assert_eq!(gpio.get_output(58).unwrap_err(), GpioError::InvalidArgument);
    }

    #[test]
    fn bus_with_repeated_pin_is_rejected() {
        let gpio = RawGpioDriver::new_anon().unwrap();
        assert_eq!(
            gpio.get_output_bus([4, 4, 5, 6]).unwrap_err(),
            GpioError::InvalidArgument
        );
        // Nothing was claimed.
        assert!(gpio.get_output_bus([4, 5, 6, 7]).is_ok());
    }

    #[test]
    fn released_pins_fall_back_to_input() {
        let gpio = RawGpioDriver::new_anon().unwrap();
        drop(gpio.get_output(3).unwrap());
        assert_eq!((read(&gpio, 0) >> 9) & 0b111, 0b000);
    }
}
