use dotenv::var;
use lcd16x2_gpio::lcd::hd44780::driver::DisplayConfig;
use serde::{Deserialize, Serialize};
use eyre::WrapErr;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

const DEFAULT_CONFIG_FILE: &str = "lcd.json";

/// Where the GPIO lines come from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backend {
    /// Linux GPIO character device, e.g. `/dev/gpiochip0`.
    Gpiod { chip: String },
    /// Raspberry Pi registers, through `/dev/mem` when `dev_mem` is set, `/dev/gpiomem` otherwise.
    Raw {
        #[serde(default)]
        dev_mem: bool,
    },
}

/// Line numbers of the display's pins on the chosen backend.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Pins {
    pub e: usize,
    pub rs: usize,
    #[serde(default)]
    pub rw: Option<usize>,
    /// D4..D7 for a 4-bit bus or D0..D7 for an 8-bit bus, least significant first.
    pub data: Vec<usize>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub backend: Backend,
    pub pins: Pins,
    #[serde(default)]
    pub display: DisplayConfig,
}

impl Config {
    fn path() -> String {
        var("LCD_CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string())
    }

    /// Loads the config file, or gives `None` if there is none yet.
    ///
    /// A file that exists but cannot be read or parsed is an error, so it never gets replaced.
    pub fn try_load() -> eyre::Result<Option<Self>> {
        Self::load_from(Path::new(&Self::path()))
    }

    pub fn save(&self) -> eyre::Result<()> {
        self.save_to(Path::new(&Self::path()))
    }

    fn load_from(path: &Path) -> eyre::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let file = File::open(path).wrap_err_with(|| format!("Cannot open {}", path.display()))?;
        let config = serde_json::from_reader(BufReader::new(file))
            .wrap_err_with(|| format!("Invalid config in {}", path.display()))?;
        Ok(Some(config))
    }

    fn save_to(&self, path: &Path) -> eyre::Result<()> {
        let file = File::create(path).wrap_err_with(|| format!("Cannot create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backend: Backend::Gpiod {
                chip: "/dev/gpiochip0".to_string(),
            },
            pins: Pins {
                e: 17,
                rs: 22,
                rw: Some(27),
                data: vec![26, 16, 20, 21],
            },
            display: DisplayConfig::default(),
        }
    }
}
