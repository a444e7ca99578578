use crate::lcd::hd44780::driver::{DisplayConfig, HD44780Driver, InterfaceMode};
use crate::lcd::LcdResult;
use crate::{Delay, GpioBusOutput, GpioOutput, GpioResult};
use log::{debug, trace};

#[derive(Debug, Copy, Clone)]
pub enum GpioHD44780Bus<'a> {
    Bus8Bit(&'a dyn GpioBusOutput<8>),
    Bus4Bit(&'a dyn GpioBusOutput<4>),
}

impl GpioHD44780Bus<'_> {
    pub fn mode(&self) -> InterfaceMode {
        match self {
            GpioHD44780Bus::Bus8Bit(_) => InterfaceMode::EightBit,
            GpioHD44780Bus::Bus4Bit(_) => InterfaceMode::FourBit,
        }
    }
}

/// GpioHD44780Driver drives an HD44780 controller over parallel GPIO lines, write-only.
///
/// The R/W line is optional. When wired, it is held low; when not, the module's R/W pin must be
/// tied to GND. Timing is open-loop: the driver never polls the busy flag and instead waits a
/// fixed time after every transfer.
#[derive(Debug)]
pub struct GpioHD44780Driver<'a> {
    pin_e: &'a dyn GpioOutput,
    pin_rw: Option<&'a dyn GpioOutput>,
    pin_rs: &'a dyn GpioOutput,
    data_bus: GpioHD44780Bus<'a>,
    delay: &'a dyn Delay,
}

impl<'a> GpioHD44780Driver<'a> {
    /// How long E is held high. The datasheet minimum is 230..450 ns, this also covers the
    /// ~37 µs execution time of most instructions.
    pub const ENABLE_PULSE_US: u32 = 40;
    /// Wait between setting RS and the first E pulse of a byte.
    pub const SETUP_DELAY_US: u32 = 100;

    const SYNC_LONG_GAP_MS: u32 = 5;
    const SYNC_SHORT_GAP_US: u32 = 150;

    /// Creates a driver talking over D4..D7.
    ///
    /// # Parameters
    ///
    /// - `pin_e`: Enable output pin.
    /// - `pin_rw`: Optional read/write output pin, held low.
    /// - `pin_rs`: Register select output pin.
    /// - `data_bus`: D4..D7, D4 being the least significant line.
    /// - `delay`: Blocking delay used for all the controller timing.
    pub fn new_4bit(
        pin_e: &'a dyn GpioOutput,
        pin_rw: Option<&'a dyn GpioOutput>,
        pin_rs: &'a dyn GpioOutput,
        data_bus: &'a dyn GpioBusOutput<4>,
        delay: &'a dyn Delay,
    ) -> Self {
        GpioHD44780Driver {
            pin_e,
            pin_rw,
            pin_rs,
            data_bus: GpioHD44780Bus::Bus4Bit(data_bus),
            delay,
        }
    }

    /// Creates a driver talking over D0..D7, D0 being the least significant line.
    ///
    /// See [Self::new_4bit] for the parameters.
    pub fn new_8bit(
        pin_e: &'a dyn GpioOutput,
        pin_rw: Option<&'a dyn GpioOutput>,
        pin_rs: &'a dyn GpioOutput,
        data_bus: &'a dyn GpioBusOutput<8>,
        delay: &'a dyn Delay,
    ) -> Self {
        GpioHD44780Driver {
            pin_e,
            pin_rw,
            pin_rs,
            data_bus: GpioHD44780Bus::Bus8Bit(data_bus),
            delay,
        }
    }

    fn pulse_e(&self) -> GpioResult<()> {
        self.pin_e.write(true)?;
        self.delay.delay_us(Self::ENABLE_PULSE_US);
        self.pin_e.write(false)?;
        Ok(())
    }

    /// Puts the low four bits of `value` on D4..D7 and pulses E once. RS is left untouched.
    ///
    /// On an 8-bit bus, D0..D3 are driven low.
    pub fn send_nibble(&mut self, value: u8) -> LcdResult<()> {
        let nibble = value & 0x0F;
        match self.data_bus {
            GpioHD44780Bus::Bus4Bit(bus) => bus.write_nibble(nibble)?,
            GpioHD44780Bus::Bus8Bit(bus) => bus.write_byte(nibble << 4)?,
        }
        self.pulse_e()?;
        Ok(())
    }

    /// Sends a full byte to the instruction (`is_instruction`) or data register.
    ///
    /// Over a 4-bit bus the high nibble goes first.
    pub fn send_byte(&mut self, value: u8, is_instruction: bool) -> LcdResult<()> {
        trace!("Sending data: {:08b}, RS: {}", value, !is_instruction);

        self.pin_rs.write(!is_instruction)?;
        self.delay.delay_us(Self::SETUP_DELAY_US);

        match self.data_bus {
            GpioHD44780Bus::Bus8Bit(bus) => {
                bus.write_byte(value)?;
                self.pulse_e()?;
            }
            GpioHD44780Bus::Bus4Bit(_) => {
                trace!("Writing HN: {:04b}", value >> 4);
                self.send_nibble(value >> 4)?;
                trace!("Writing LN: {:04b}", value & 0x0F);
                self.send_nibble(value & 0x0F)?;
            }
        }

        Ok(())
    }

    /// Drives every line low: instruction register, write mode, E idle, empty bus.
    fn reset_lines(&mut self) -> GpioResult<()> {
        self.pin_e.write(false)?;
        self.pin_rs.write(false)?;
        if let Some(rw) = self.pin_rw {
            rw.write(false)?;
        }
        match self.data_bus {
            GpioHD44780Bus::Bus8Bit(bus) => bus.write_byte(0)?,
            GpioHD44780Bus::Bus4Bit(bus) => bus.write_nibble(0)?,
        }
        Ok(())
    }

    /// Forces the controller into a known interface width, whatever state it was left in.
    ///
    /// The function set `0011` is sent three times, since the controller may be in 4-bit mode
    /// waiting for a second nibble. On a 4-bit bus, `0010` then switches it to 4-bit mode.
    fn synchronize(&mut self) -> LcdResult<()> {
        match self.data_bus {
            GpioHD44780Bus::Bus8Bit(_) => {
                self.send_byte(0b00110000, true)?;
                self.delay.delay_ms(Self::SYNC_LONG_GAP_MS);
                self.send_byte(0b00110000, true)?;
                self.delay.delay_ms(Self::SYNC_LONG_GAP_MS);
                self.send_byte(0b00110000, true)?;
                self.delay.delay_us(Self::SYNC_SHORT_GAP_US);
            }
            GpioHD44780Bus::Bus4Bit(_) => {
                self.send_nibble(0b0011)?;
                self.delay.delay_ms(Self::SYNC_LONG_GAP_MS);
                self.send_nibble(0b0011)?;
                self.delay.delay_ms(Self::SYNC_LONG_GAP_MS);
                self.send_nibble(0b0011)?;
                self.delay.delay_us(Self::SYNC_SHORT_GAP_US);
                self.send_nibble(0b0010)?;
                self.delay.delay_us(Self::SYNC_SHORT_GAP_US);
            }
        }
        Ok(())
    }
}

impl HD44780Driver for GpioHD44780Driver<'_> {
    /// Initializes the display following the datasheet's "initializing by instruction" sequence.
    ///
    /// - drives all lines low and waits for the supply to settle,
    /// - synchronizes the interface width (see [GpioHD44780Driver::synchronize]),
    /// - sends function set, display control, clear display and entry mode set.
    ///
    /// Nothing is sent if the configuration is invalid.
    fn init(&mut self, config: &DisplayConfig) -> LcdResult<()> {
        config.validate()?;

        debug!("Initializing HD44780 over {:?}: {:?}", self.data_bus.mode(), config);

        self.reset_lines()?;
        self.delay.delay_ms(config.supply.power_on_delay_ms());

        self.synchronize()?;
        self.configure(config)?;

        debug!("HD44780 initialized.");
        Ok(())
    }

    fn interface_mode(&self) -> InterfaceMode {
        self.data_bus.mode()
    }

    fn send_command(&mut self, command: u8) -> LcdResult<()> {
        self.send_byte(command, true)
    }

    fn send_data(&mut self, data: u8) -> LcdResult<()> {
        self.send_byte(data, false)
    }

    fn wait_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }
}
