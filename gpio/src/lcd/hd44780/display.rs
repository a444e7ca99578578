use crate::lcd::hd44780::driver::{
    CursorDirection, DisplayConfig, HD44780Driver, InterfaceMode, ShiftTarget, ddram_address,
};
use crate::lcd::{LcdError, LcdResult};
use arrayvec::ArrayVec;
use log::{debug, warn};
use std::fmt;
use std::fmt::Write;

/// Capacity, in characters, of the buffer [HD44780Display::print_fmt] formats into: one row of a
/// 16x2 display.
pub const PRINT_BUFFER_LEN: usize = 16;

/// Formats and prints to an [HD44780Display], like [print!].
///
/// Uses a buffer of [PRINT_BUFFER_LEN] characters. Text that does not fit is not printed at all
/// and [LcdError::WouldTruncate] is returned instead.
#[macro_export]
macro_rules! lcd_print {
    ($lcd:expr, $($arg:tt)*) => {
        $lcd.print_fmt(format_args!($($arg)*))
    };
}

/// User-facing operations of an HD44780 display, on top of any [HD44780Driver].
///
/// The controller is never read back, so this keeps a copy of the settings last written to it.
/// Every operation except [Self::init] fails with [LcdError::NotInitialized] until the display
/// has been initialized.
#[derive(Debug)]
pub struct HD44780Display<D: HD44780Driver> {
    driver: D,
    config: DisplayConfig,
    initialized: bool,
}

impl<D: HD44780Driver> HD44780Display<D> {
    pub fn new(driver: D) -> Self {
        HD44780Display {
            driver,
            config: DisplayConfig::default(),
            initialized: false,
        }
    }

    /// Runs the init sequence with the given settings. Can be called again at any time to
    /// resynchronize with the controller.
    pub fn init(&mut self, config: DisplayConfig) -> LcdResult<()> {
        self.initialized = false;
        self.driver.init(&config)?;
        self.config = config;
        self.initialized = true;
        Ok(())
    }

    fn ensure_initialized(&self) -> LcdResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(LcdError::NotInitialized)
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Gets the settings as last written to the controller.
    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    pub fn interface_mode(&self) -> InterfaceMode {
        self.driver.interface_mode()
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    pub fn clear(&mut self) -> LcdResult<()> {
        self.ensure_initialized()?;
        self.driver.clear_display()
    }

    pub fn home(&mut self) -> LcdResult<()> {
        self.ensure_initialized()?;
        self.driver.return_home()
    }

    /// Moves the cursor to `column` of `line` (0 or 1).
    ///
    /// The column is not checked against the width of the display.
    pub fn move_cursor(&mut self, line: u8, column: u8) -> LcdResult<()> {
        self.ensure_initialized()?;
        let address = ddram_address(line, column)?;
        self.driver.set_ddram_address(address)
    }

    /// Writes the string at the cursor. Non-ASCII characters are replaced by `?`.
    pub fn print(&mut self, s: &str) -> LcdResult<()> {
        self.ensure_initialized()?;
        for c in s.chars() {
            self.driver.send_data(cell(c))?;
        }
        Ok(())
    }

    /// Formats into a buffer of [PRINT_BUFFER_LEN] characters and writes the result at the cursor.
    pub fn print_fmt(&mut self, args: fmt::Arguments<'_>) -> LcdResult<()> {
        self.print_fmt_in::<PRINT_BUFFER_LEN>(args)
    }

    /// Formats into a buffer of `N` characters and writes the result at the cursor.
    ///
    /// Every character takes one cell, non-ASCII ones being shown as `?`. If the text does not
    /// fit, nothing is written and [LcdError::WouldTruncate] reports how many cells it needed.
    pub fn print_fmt_in<const N: usize>(&mut self, args: fmt::Arguments<'_>) -> LcdResult<()> {
        self.ensure_initialized()?;

        let mut buffer = CellBuffer::<N>::new();
        _ = buffer.write_fmt(args);
        if buffer.required > N {
            return Err(LcdError::WouldTruncate {
                required: buffer.required,
                capacity: N,
            });
        }

        for &byte in &buffer.cells {
            self.driver.send_data(byte)?;
        }
        Ok(())
    }

    /// Programs the glyph in CGRAM `slot`, one byte per row, the 5 low bits being the dots.
    ///
    /// The pattern must have 8 rows with the 5x8 font (slots 0..=7) or 10 rows with the 5x10
    /// font (slots 0..=3). Afterwards the address counter points into CGRAM, so move the cursor
    /// before printing again.
    pub fn create_char(&mut self, pattern: &[u8], slot: u8) -> LcdResult<()> {
        self.ensure_initialized()?;

        let font = self.config.font;
        let address = font.cgram_address(slot)?;
        if pattern.len() != font.pattern_rows() {
            return Err(LcdError::PatternLength {
                expected: font.pattern_rows(),
                actual: pattern.len(),
            });
        }

        debug!("Defining glyph {} as {:02x?}", slot, pattern);

        self.driver.set_cgram_address(address)?;
        for &row in pattern {
            self.driver.send_data(row)?;
        }
        Ok(())
    }

    /// Sends the display control flags of `config`, keeping them only once written.
    fn send_display_control(&mut self, config: DisplayConfig) -> LcdResult<()> {
        self.ensure_initialized()?;
        self.driver
            .set_display_control(config.display_on, config.cursor_on, config.blink_on)?;
        self.config = config;
        Ok(())
    }

    /// Turns the display on or off. The contents are kept while off.
    pub fn display_state(&mut self, on: bool) -> LcdResult<()> {
        self.send_display_control(DisplayConfig {
            display_on: on,
            ..self.config
        })
    }

    /// Shows or hides the underline cursor.
    pub fn cursor_state(&mut self, on: bool) -> LcdResult<()> {
        self.send_display_control(DisplayConfig {
            cursor_on: on,
            ..self.config
        })
    }

    /// Turns blinking of the character at the cursor on or off.
    pub fn blink_state(&mut self, on: bool) -> LcdResult<()> {
        self.send_display_control(DisplayConfig {
            blink_on: on,
            ..self.config
        })
    }

    /// Sets where the cursor goes after each write, and whether the display shifts along.
    pub fn entry_setting(&mut self, direction: CursorDirection, shift: bool) -> LcdResult<()> {
        self.ensure_initialized()?;
        self.driver.set_entry_mode(direction, shift)?;
        self.config.cursor_direction = direction;
        self.config.shift_follow = shift;
        Ok(())
    }

    /// Moves the cursor or scrolls the display by one position.
    pub fn shift_setting(&mut self, target: ShiftTarget, direction: CursorDirection) -> LcdResult<()> {
        self.ensure_initialized()?;
        self.driver.cursor_shift(target, direction)
    }
}

/// Maps a character to the cell shown for it.
fn cell(c: char) -> u8 {
    if c.is_ascii() {
        c as u8
    } else {
        warn!("Non-ASCII character: {}", c);
        b'?'
    }
}

/// Formatted text as display cells. Keeps counting past the capacity.
struct CellBuffer<const N: usize> {
    cells: ArrayVec<u8, N>,
    required: usize,
}

impl<const N: usize> CellBuffer<N> {
    fn new() -> Self {
        CellBuffer {
            cells: ArrayVec::new(),
            required: 0,
        }
    }
}

impl<const N: usize> Write for CellBuffer<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            self.required += 1;
            _ = self.cells.try_push(cell(c));
        }
        Ok(())
    }
}
