mod config;

use crate::config::{Backend, Config};
use dotenv::dotenv;
use lcd16x2_gpio::gpiod::GpiodDriver;
use lcd16x2_gpio::lcd::hd44780::HD44780Display;
use lcd16x2_gpio::lcd::hd44780::driver::{Font, GpioHD44780Driver, HD44780Driver};
use lcd16x2_gpio::raw::RawGpioDriver;
use lcd16x2_gpio::{GpioDriver, StdDelay, lcd_print};
use log::{debug, info, warn};
use std::thread;
use std::time::Duration;
use sysinfo::System;
use time::OffsetDateTime;

/// A small bell, 5x8.
const BELL: [u8; 8] = [0x04, 0x0E, 0x0E, 0x0E, 0x1F, 0x00, 0x04, 0x00];

fn main() -> eyre::Result<()> {
    dotenv().ok();
    pretty_env_logger::init();

    const UNKNOWN_STR: &str = "???";

    info!("lcd16x2 demo starting...");
    info!(
        "Host {} ({}), {}",
        System::host_name().as_deref().unwrap_or(UNKNOWN_STR),
        System::cpu_arch(),
        System::long_os_version().as_deref().unwrap_or(UNKNOWN_STR),
    );

    debug!("Trying to load config...");
    let config = if let Some(config) = Config::try_load()? {
        info!("Config loaded.");
        config
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        config.save()?;
        info!("Default config saved.");
        config
    };
    debug!("{:?}", config);

    match &config.backend {
        Backend::Gpiod { chip } => run(&GpiodDriver::open(chip)?, &config),
        Backend::Raw { dev_mem: true } => run(&RawGpioDriver::new_mem()?, &config),
        Backend::Raw { dev_mem: false } => run(&RawGpioDriver::new_gpiomem()?, &config),
    }
}

fn run<G: GpioDriver>(gpio: &G, config: &Config) -> eyre::Result<()> {
    debug!("{:?} initialized.", gpio);

    let pins = &config.pins;
    info!(
        "LCD @ E: {}, RW: {:?}, RS: {}, Data: {:?}",
        pins.e, pins.rw, pins.rs, pins.data
    );

    let pin_e = gpio.get_output(pins.e)?;
    let pin_rs = gpio.get_output(pins.rs)?;
    let pin_rw = pins.rw.map(|index| gpio.get_output(index)).transpose()?;
    let delay = StdDelay;

    match pins.data.len() {
        4 => {
            let indices: [usize; 4] = pins.data.as_slice().try_into()?;
            let data_bus = gpio.get_output_bus(indices)?;
            let driver = GpioHD44780Driver::new_4bit(
                &*pin_e,
                pin_rw.as_deref(),
                &*pin_rs,
                &*data_bus,
                &delay,
            );
            show(HD44780Display::new(driver), config)
        }
        8 => {
            let indices: [usize; 8] = pins.data.as_slice().try_into()?;
            let data_bus = gpio.get_output_bus(indices)?;
            let driver = GpioHD44780Driver::new_8bit(
                &*pin_e,
                pin_rw.as_deref(),
                &*pin_rs,
                &*data_bus,
                &delay,
            );
            show(HD44780Display::new(driver), config)
        }
        n => Err(eyre::eyre!("Invalid number of data pins: {}", n)),
    }
}

fn show<D: HD44780Driver>(mut lcd: HD44780Display<D>, config: &Config) -> eyre::Result<()> {
    lcd.init(config.display)?;
    info!("{:?} initialized.", lcd.interface_mode());

    let mut bell = BELL.to_vec();
    if config.display.font == Font::Dots5x10 {
        bell.resize(Font::Dots5x10.pattern_rows(), 0);
    }
    lcd.create_char(&bell, 0)?;

    lcd.home()?;
    lcd.print("\x00 lcd16x2")?;
    lcd_print!(lcd, " v{}", env!("CARGO_PKG_VERSION"))?;

    info!("Starting clock...");
    loop {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| {
            warn!("Local offset unknown, showing UTC.");
            OffsetDateTime::now_utc()
        });

        lcd.move_cursor(1, 4)?;
        lcd_print!(
            lcd,
            "{:02}:{:02}:{:02}",
            now.hour(),
            now.minute(),
            now.second()
        )?;

        thread::sleep(Duration::from_secs(1));
    }
}
