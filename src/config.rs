//! Runtime configuration and compile-time constants.
//!
//! The configuration file is JSON. Every hardware parameter that depends on
//! wiring (pin numbers, button polarity, I2C addresses, display geometry)
//! lives in the file; values that define the kiosk's behaviour live here as
//! constants.
//!
//! ```json
//! {
//!   "buttons": { "cancel": 26, "enter": 19, "increment": 13, "decrement": 6,
//!                "polarity": "active_low" },
//!   "displays": { "i2c_bus": "/dev/i2c-1",
//!                 "operator": { "address": 40, "rows": 4, "columns": 20 },
//!                 "customer": { "address": 39, "rows": 2, "columns": 16 } },
//!   "reader": { "device": "/dev/ttyACM0" },
//!   "api": { "base_url": "https://intern.example.org/",
//!            "username": "kiosk", "password": "...",
//!            "client_id": "...", "client_secret": "..." },
//!   "timing": { "tick_ms": 20 }
//! }
//! ```
//!
//! Instead of `api`, a `ledger` section (`{ "path": "ledger.csv" }`) runs the
//! kiosk against a local CSV-seeded ledger. When both are present `api` wins.

use crate::error::{KioskError, Result};
use crate::input::Polarity;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Number of coffee vouchers credited by the "buy coffee vouchers" action.
pub const COFFEE_BLOCK_SIZE: u32 = 10;

/// How long the settlement outcome stays on screen.
pub const CONFIRMATION_DWELL_SECS: u32 = 5;

/// How long short notices ("User not found", "Card registered!") stay on screen.
pub const NOTICE_DWELL: Duration = Duration::from_secs(2);

/// Default polling tick for the button loop.
pub const DEFAULT_TICK_MS: u64 = 20;

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct KioskConfig {
    pub buttons: ButtonPins,
    pub displays: DisplaysConfig,
    pub reader: ReaderConfig,
    #[serde(default)]
    pub api: Option<ApiConfig>,
    #[serde(default)]
    pub ledger: Option<LedgerConfig>,
    #[serde(default)]
    pub timing: TimingConfig,
}

/// Which backend the kiosk settles against.
#[derive(Debug, Clone, Copy)]
pub enum BackendConfig<'a> {
    Api(&'a ApiConfig),
    Ledger(&'a LedgerConfig),
}

/// Sysfs GPIO numbers of the four panel buttons.
#[derive(Debug, Clone, Deserialize)]
pub struct ButtonPins {
    pub cancel: u64,
    pub enter: u64,
    pub increment: u64,
    pub decrement: u64,
    /// Which pin level means "pressed". Depends on the wiring, see [`Polarity`].
    #[serde(default)]
    pub polarity: Polarity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplaysConfig {
    /// I2C bus device shared by both displays.
    #[serde(default = "default_i2c_bus")]
    pub i2c_bus: PathBuf,
    pub operator: PanelConfig,
    pub customer: PanelConfig,
}

/// One character display on the bus.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PanelConfig {
    /// 7-bit I2C address.
    pub address: u8,
    #[serde(default = "default_rows")]
    pub rows: u8,
    #[serde(default = "default_columns")]
    pub columns: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReaderConfig {
    pub device: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    pub path: PathBuf,
}

/// Member system API endpoint and OAuth2 password-grant credentials.
#[derive(Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"***")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

impl TimingConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            tick_ms: DEFAULT_TICK_MS,
        }
    }
}

impl KioskConfig {
    /// Reads and parses the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: KioskConfig = serde_json::from_str(raw)?;
        config.backend()?;
        Ok(config)
    }

    pub fn backend(&self) -> Result<BackendConfig<'_>> {
        match (&self.api, &self.ledger) {
            (Some(api), _) => Ok(BackendConfig::Api(api)),
            (None, Some(ledger)) => Ok(BackendConfig::Ledger(ledger)),
            (None, None) => Err(KioskError::NoBackend),
        }
    }
}

fn default_i2c_bus() -> PathBuf {
    PathBuf::from("/dev/i2c-1")
}

fn default_rows() -> u8 {
    4
}

fn default_columns() -> u8 {
    20
}

fn default_tick_ms() -> u64 {
    DEFAULT_TICK_MS
}

fn default_timeout_secs() -> u64 {
    10
}
