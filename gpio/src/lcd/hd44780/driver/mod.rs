//! HD44780 instruction set.
//!
//! The controller is write-only from this driver's point of view: nothing is ever read back, so
//! every instruction is followed by a fixed wait covering its worst-case execution time.
//!
//! | Instruction          | Opcode     |
//! |----------------------|------------|
//! | Clear display        | `00000001` |
//! | Return home          | `0000001?` |
//! | Entry mode set       | `000001IS` |
//! | Display control      | `00001DCB` |
//! | Cursor/display shift | `0001SR??` |
//! | Function set         | `001DNF??` |
//! | Set CGRAM address    | `01AAAAAA` |
//! | Set DDRAM address    | `1AAAAAAA` |
mod gpio;

use crate::lcd::{LcdError, LcdResult};
pub use gpio::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Extra wait after clear display and return home. Both take up to 1.52 ms, far longer than the
/// ~40 µs of every other instruction.
pub const CLEAR_EXECUTION_US: u32 = 2000;

/// Highest DDRAM address accepted by the set DDRAM address instruction.
pub const DDRAM_ADDRESS_MAX: u8 = 0b01111111;

/// Highest CGRAM address accepted by the set CGRAM address instruction.
pub const CGRAM_ADDRESS_MAX: u8 = 0b00111111;

pub trait HD44780Driver: Debug {
    /// Runs the power-on initialization sequence and leaves the controller configured as
    /// described by `config`. Calling it again replays the whole sequence.
    fn init(&mut self, config: &DisplayConfig) -> LcdResult<()>;

    /// Gets the data bus width the driver talks over.
    fn interface_mode(&self) -> InterfaceMode;

    /// Clears the display and sets the cursor to the home position.
    fn clear_display(&mut self) -> LcdResult<()> {
        self.send_command(0b00000001)?;
        self.wait_us(CLEAR_EXECUTION_US);
        Ok(())
    }

    /// Sets the cursor to the home position and undoes any display shift.
    fn return_home(&mut self) -> LcdResult<()> {
        self.send_command(0b00000010)?;
        self.wait_us(CLEAR_EXECUTION_US);
        Ok(())
    }

    /// Sets the direction the cursor moves after each write, and whether the display shifts
    /// along with it.
    fn set_entry_mode(&mut self, cursor_direction: CursorDirection, shift: bool) -> LcdResult<()> {
        let mut command = 0b00000100;
        if cursor_direction == CursorDirection::Right {
            command |= 0b00000010;
        }
        if shift {
            command |= 0b00000001;
        }
        self.send_command(command)
    }

    /// Sets the display on/off, cursor on/off, and blinking on/off.
    fn set_display_control(
        &mut self,
        display_on: bool,
        cursor_on: bool,
        blink_on: bool,
    ) -> LcdResult<()> {
        let mut command = 0b00001000;
        if display_on {
            command |= 0b00000100;
        }
        if cursor_on {
            command |= 0b00000010;
        }
        if blink_on {
            command |= 0b00000001;
        }
        self.send_command(command)
    }

    /// Moves the cursor or shifts the whole display by one position, without writing anything.
    fn cursor_shift(&mut self, target: ShiftTarget, direction: CursorDirection) -> LcdResult<()> {
        let mut command = 0b00010000;
        if target == ShiftTarget::Display {
            command |= 0b00001000;
        }
        if direction == CursorDirection::Right {
            command |= 0b00000100;
        }
        self.send_command(command)
    }

    /// Sets the interface width, line count and font.
    fn function_set(&mut self, mode: InterfaceMode, lines: LineCount, font: Font) -> LcdResult<()> {
        let mut command = 0b00100000;
        if mode == InterfaceMode::EightBit {
            command |= 0b00010000;
        }
        if lines == LineCount::Two {
            command |= 0b00001000;
        }
        if font == Font::Dots5x10 {
            command |= 0b00000100;
        }
        self.send_command(command)
    }

    /// Sets the CGRAM address. Following data writes land in the character generator.
    fn set_cgram_address(&mut self, address: u8) -> LcdResult<()> {
        if address > CGRAM_ADDRESS_MAX {
            return Err(LcdError::AddressOutOfRange {
                address: address as u16,
                max: CGRAM_ADDRESS_MAX,
            });
        }
        let command = 0b01000000 | address;
        self.send_command(command)
    }

    /// Sets the DDRAM address, i.e. moves the cursor.
    fn set_ddram_address(&mut self, address: u8) -> LcdResult<()> {
        if address > DDRAM_ADDRESS_MAX {
            return Err(LcdError::AddressOutOfRange {
                address: address as u16,
                max: DDRAM_ADDRESS_MAX,
            });
        }
        let command = 0b10000000 | address;
        self.send_command(command)
    }

    /// Sends the configuration part of the init sequence that is the same for every interface:
    /// function set, display control, clear display and entry mode set.
    fn configure(&mut self, config: &DisplayConfig) -> LcdResult<()> {
        self.function_set(self.interface_mode(), config.lines, config.font)?;
        self.set_display_control(config.display_on, config.cursor_on, config.blink_on)?;
        self.clear_display()?;
        self.set_entry_mode(config.cursor_direction, config.shift_follow)
    }

    // Low-level commands
    // These are used by the high-level functions above, and implemented by the transport.

    /// Sends an instruction to the HD44780 controller (RS = 0).
    fn send_command(&mut self, command: u8) -> LcdResult<()>;

    /// Sends data to the HD44780 controller (RS = 1).
    fn send_data(&mut self, data: u8) -> LcdResult<()>;

    /// Blocks for the given amount of microseconds.
    fn wait_us(&mut self, us: u32);
}

/// Width of the parallel data bus.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InterfaceMode {
    /// D4..D7 only, each byte is sent as two nibbles, high nibble first.
    FourBit,
    /// D0..D7, each byte is sent in a single transfer.
    EightBit,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CursorDirection {
    /// Moves the cursor to the left after writing data.
    Left,
    /// Moves the cursor to the right after writing data.
    Right,
}

/// What a [HD44780Driver::cursor_shift] moves.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ShiftTarget {
    Cursor,
    Display,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LineCount {
    One,
    #[default]
    Two,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Font {
    /// 5x8 dots, 8 programmable glyphs.
    #[default]
    Dots5x8,
    /// 5x10 dots, 4 programmable glyphs. Only available in one-line mode.
    Dots5x10,
}

impl Font {
    /// Gets the number of CGRAM slots available with this font.
    pub fn cgram_slots(self) -> u8 {
        match self {
            Font::Dots5x8 => 8,
            Font::Dots5x10 => 4,
        }
    }

    /// Gets the number of pattern rows that define one glyph.
    pub fn pattern_rows(self) -> usize {
        match self {
            Font::Dots5x8 => 8,
            Font::Dots5x10 => 10,
        }
    }

    /// Computes the CGRAM address of the given glyph slot.
    ///
    /// Slots never alias: an index past the last slot is rejected instead of wrapping into the
    /// next glyph's rows.
    pub fn cgram_address(self, slot: u8) -> LcdResult<u8> {
        if slot >= self.cgram_slots() {
            return Err(LcdError::SlotOutOfRange {
                slot,
                max: self.cgram_slots() - 1,
            });
        }
        Ok(match self {
            Font::Dots5x8 => slot << 3,
            Font::Dots5x10 => slot << 4,
        })
    }
}

/// Supply voltage of the module, which decides how long to wait after power-on before talking
/// to the controller.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SupplyVoltage {
    /// 2.7 V. The datasheet asks for 40 ms.
    #[default]
    Low,
    /// 5 V. The datasheet asks for 15 ms.
    Standard,
}

impl SupplyVoltage {
    pub fn power_on_delay_ms(self) -> u32 {
        match self {
            SupplyVoltage::Low => 50,
            SupplyVoltage::Standard => 20,
        }
    }
}

/// Settings applied by the init sequence.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DisplayConfig {
    pub lines: LineCount,
    pub font: Font,
    pub supply: SupplyVoltage,
    pub display_on: bool,
    pub cursor_on: bool,
    pub blink_on: bool,
    pub cursor_direction: CursorDirection,
    /// Shift the display along with the cursor on every write.
    pub shift_follow: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            lines: LineCount::Two,
            font: Font::Dots5x8,
            supply: SupplyVoltage::Low,
            display_on: true,
            cursor_on: false,
            blink_on: false,
            cursor_direction: CursorDirection::Right,
            shift_follow: false,
        }
    }
}

impl DisplayConfig {
    /// Checks the combination of settings is one the controller supports.
    pub fn validate(&self) -> LcdResult<()> {
        if self.font == Font::Dots5x10 && self.lines == LineCount::Two {
            return Err(LcdError::UnsupportedFont);
        }
        Ok(())
    }
}

/// Computes the DDRAM address of a position on a two-row display. Row 0 starts at `0x00`, row 1
/// at `0x40`.
///
/// The column is not checked against the display width, only against the DDRAM address space.
pub fn ddram_address(line: u8, column: u8) -> LcdResult<u8> {
    let base: u8 = match line {
        0 => 0x00,
        1 => 0x40,
        _ => return Err(LcdError::LineOutOfRange(line)),
    };
    let address = base as u16 + column as u16;
    if address > DDRAM_ADDRESS_MAX as u16 {
        return Err(LcdError::AddressOutOfRange {
            address,
            max: DDRAM_ADDRESS_MAX,
        });
    }
    Ok(address as u8)
}
