//! Simulated hardware for the driver tests.
//!
//! [SimBoard] records every line write against a virtual clock that only advances when a delay is
//! requested, so timing assertions are exact and tests run instantly.
use crate::lcd::hd44780::driver::{DisplayConfig, GpioHD44780Driver, HD44780Driver, InterfaceMode};
use crate::lcd::LcdResult;
use crate::{Delay, GpioBusOutput, GpioError, GpioOutput, GpioResult};
use std::cell::{Cell, RefCell};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Line {
    E,
    Rs,
    Rw,
    /// D0..D7
    Data(usize),
}

#[derive(Copy, Clone, Debug)]
pub struct LineWrite {
    pub at_us: u64,
    pub line: Line,
    pub level: bool,
}

#[derive(Copy, Clone, Debug, Default)]
struct Levels {
    e: bool,
    rs: bool,
    rw: bool,
    data: [bool; 8],
}

impl Levels {
    fn data_byte(&self) -> u8 {
        self.data
            .iter()
            .enumerate()
            .fold(0, |byte, (i, &level)| byte | ((level as u8) << i))
    }

    fn apply(&mut self, write: &LineWrite) {
        match write.line {
            Line::E => self.e = write.level,
            Line::Rs => self.rs = write.level,
            Line::Rw => self.rw = write.level,
            Line::Data(i) => self.data[i] = write.level,
        }
    }
}

/// One E pulse, as the controller would latch it.
#[derive(Copy, Clone, Debug)]
pub struct Pulse {
    pub rs: bool,
    /// D0..D7 while E was high.
    pub data: u8,
    pub rise_us: u64,
    pub high_us: u64,
    /// Time between the last RS write and E rising.
    pub rs_setup_us: u64,
    /// RS did not change while E was high.
    pub rs_stable: bool,
    /// No data line changed while E was high.
    pub data_stable: bool,
}

impl Pulse {
    /// Gets the nibble carried on D4..D7.
    pub fn nibble(&self) -> u8 {
        self.data >> 4
    }

    pub fn fall_us(&self) -> u64 {
        self.rise_us + self.high_us
    }
}

#[derive(Debug, Default)]
pub struct SimBoard {
    now_us: Cell<u64>,
    levels: Cell<Levels>,
    last_rs_us: Cell<u64>,
    base: Cell<(Levels, u64)>,
    log: RefCell<Vec<LineWrite>>,
}

impl SimBoard {
    fn record(&self, line: Line, level: bool) {
        let write = LineWrite {
            at_us: self.now_us.get(),
            line,
            level,
        };
        let mut levels = self.levels.get();
        levels.apply(&write);
        self.levels.set(levels);
        if line == Line::Rs {
            self.last_rs_us.set(write.at_us);
        }
        self.log.borrow_mut().push(write);
    }

    pub fn now_us(&self) -> u64 {
        self.now_us.get()
    }

    /// Forgets the recorded writes. Line levels are kept.
    pub fn clear(&self) {
        self.base.set((self.levels.get(), self.last_rs_us.get()));
        self.log.borrow_mut().clear();
    }

    /// Gets the number of line writes recorded since the last [Self::clear].
    pub fn writes(&self) -> usize {
        self.log.borrow().len()
    }

    pub fn level_e(&self) -> bool {
        self.levels.get().e
    }

    pub fn level_rw(&self) -> bool {
        self.levels.get().rw
    }

    /// Replays the recorded writes and extracts every complete E pulse.
    pub fn pulses(&self) -> Vec<Pulse> {
        let (mut levels, mut last_rs_us) = self.base.get();
        let mut open: Option<Pulse> = None;
        let mut pulses = Vec::new();

        for write in self.log.borrow().iter() {
            match write.line {
                Line::E if write.level && !levels.e => {
                    open = Some(Pulse {
                        rs: levels.rs,
                        data: levels.data_byte(),
                        rise_us: write.at_us,
                        high_us: 0,
                        rs_setup_us: write.at_us - last_rs_us,
                        rs_stable: true,
                        data_stable: true,
                    });
                }
                Line::E if !write.level && levels.e => {
                    if let Some(mut pulse) = open.take() {
                        pulse.high_us = write.at_us - pulse.rise_us;
                        pulses.push(pulse);
                    }
                }
                Line::Rs => {
                    if let Some(pulse) = open.as_mut() {
                        pulse.rs_stable &= write.level == levels.rs;
                    }
                    last_rs_us = write.at_us;
                }
                Line::Data(i) => {
                    if let Some(pulse) = open.as_mut() {
                        pulse.data_stable &= write.level == levels.data[i];
                    }
                }
                _ => {}
            }
            levels.apply(write);
        }

        pulses
    }
}

impl Delay for SimBoard {
    fn delay_us(&self, us: u32) {
        self.now_us.set(self.now_us.get() + us as u64);
    }
}

#[derive(Debug)]
pub struct SimOutput<'a> {
    board: &'a SimBoard,
    line: Line,
}

impl GpioOutput for SimOutput<'_> {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.board.record(self.line, value);
        Ok(())
    }
}

/// Bus whose bit 0 is wired to data line `first`.
#[derive(Debug)]
pub struct SimBus<'a> {
    board: &'a SimBoard,
    first: usize,
}

impl<const N: usize> GpioBusOutput<N> for SimBus<'_> {
    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        for (i, &value) in values.iter().enumerate() {
            self.board.record(Line::Data(self.first + i), value);
        }
        Ok(())
    }
}

/// A full HD44780 line set wired to a [SimBoard].
pub struct SimLines<'a> {
    board: &'a SimBoard,
    e: SimOutput<'a>,
    rs: SimOutput<'a>,
    rw: SimOutput<'a>,
    high_bus: SimBus<'a>,
    full_bus: SimBus<'a>,
}

impl<'a> SimLines<'a> {
    pub fn new(board: &'a SimBoard) -> Self {
        SimLines {
            board,
            e: SimOutput { board, line: Line::E },
            rs: SimOutput { board, line: Line::Rs },
            rw: SimOutput { board, line: Line::Rw },
            high_bus: SimBus { board, first: 4 },
            full_bus: SimBus { board, first: 0 },
        }
    }

    pub fn driver_4bit(&self) -> GpioHD44780Driver<'_> {
        GpioHD44780Driver::new_4bit(&self.e, Some(&self.rw), &self.rs, &self.high_bus, self.board)
    }

    pub fn driver_8bit(&self) -> GpioHD44780Driver<'_> {
        GpioHD44780Driver::new_8bit(&self.e, Some(&self.rw), &self.rs, &self.full_bus, self.board)
    }
}

/// Joins consecutive 4-bit pulses into `(rs, byte)` transfers, high nibble first.
pub fn join_nibbles(pulses: &[Pulse]) -> Vec<(bool, u8)> {
    assert_eq!(pulses.len() % 2, 0, "dangling nibble");
    pulses
        .chunks(2)
        .map(|pair| (pair[0].rs, (pair[0].nibble() << 4) | pair[1].nibble()))
        .collect()
}

/// Transport-less [HD44780Driver] that records what it is asked to send.
#[derive(Debug)]
pub struct CommandLog {
    pub mode: InterfaceMode,
    /// `(is_instruction, byte)`
    pub sent: Vec<(bool, u8)>,
    pub inits: Vec<DisplayConfig>,
    pub waited_us: u32,
    /// Makes every transfer fail, as if a line could not be written.
    pub fail_writes: bool,
}

impl Default for CommandLog {
    fn default() -> Self {
        CommandLog {
            mode: InterfaceMode::FourBit,
            sent: Vec::new(),
            inits: Vec::new(),
            waited_us: 0,
            fail_writes: false,
        }
    }
}

impl CommandLog {
    fn transfer(&mut self, is_instruction: bool, byte: u8) -> LcdResult<()> {
        if self.fail_writes {
            return Err(GpioError::Io(std::io::ErrorKind::BrokenPipe).into());
        }
        self.sent.push((is_instruction, byte));
        Ok(())
    }

    pub fn commands(&self) -> Vec<u8> {
        self.sent
            .iter()
            .filter(|(is_instruction, _)| *is_instruction)
            .map(|&(_, byte)| byte)
            .collect()
    }

    pub fn data(&self) -> Vec<u8> {
        self.sent
            .iter()
            .filter(|(is_instruction, _)| !*is_instruction)
            .map(|&(_, byte)| byte)
            .collect()
    }
}

impl HD44780Driver for CommandLog {
    fn init(&mut self, config: &DisplayConfig) -> LcdResult<()> {
        config.validate()?;
        self.inits.push(*config);
        Ok(())
    }

    fn interface_mode(&self) -> InterfaceMode {
        self.mode
    }

    fn send_command(&mut self, command: u8) -> LcdResult<()> {
        self.transfer(true, command)
    }

    fn send_data(&mut self, data: u8) -> LcdResult<()> {
        self.transfer(false, data)
    }

    fn wait_us(&mut self, us: u32) {
        self.waited_us += us;
    }
}
