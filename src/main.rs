//! Voucher Kiosk
//!
//! Wires the configured GPIO buttons, I2C displays, card reader and voucher
//! backend (remote API or local ledger) together and serves customers until a
//! fatal error occurs.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- kiosk.json
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set to `debug` or `info` to control logging verbosity

use linux_embedded_hal::{I2cdev, SysfsPin};
use log::info;
use std::env;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::process;
use voucher_kiosk::config::{BackendConfig, ButtonPins, DisplaysConfig, PanelConfig, ReaderConfig};
use voucher_kiosk::{
    Backend, Buttons, Displays, Kiosk, KioskConfig, KioskError, Ledger, LineCardReader, PinPanel,
    RemoteBackend, Result, SerialLcd, SystemClock, Terminal, UreqTransport,
};

type PanelTerminal = Terminal<PinPanel<SysfsPin>, SerialLcd<I2cdev>, SystemClock>;

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return Err(KioskError::MissingArgument);
    }

    let config = KioskConfig::load(Path::new(&args[1]))?;
    info!("Loaded configuration from {}", args[1]);

    let displays = open_displays(&config.displays)?;
    let buttons = Buttons::new(open_buttons(&config.buttons)?, config.buttons.polarity);
    let terminal = Terminal::new(buttons, displays, SystemClock, config.timing.tick());

    match config.backend()? {
        BackendConfig::Api(api) => {
            let transport = UreqTransport::new(&api.base_url, api.timeout());
            let backend = RemoteBackend::connect(transport, api.clone())?;
            info!("Connected to {}", api.base_url);
            serve(backend, terminal, &config.reader)
        }
        BackendConfig::Ledger(ledger) => {
            let backend = Ledger::load(&ledger.path)?;
            info!("Loaded ledger from {}", ledger.path.display());
            serve(backend, terminal, &config.reader)
        }
    }
}

fn serve<B: Backend>(backend: B, terminal: PanelTerminal, reader: &ReaderConfig) -> Result<()> {
    let reader = LineCardReader::new(BufReader::new(File::open(&reader.device)?));

    let mut kiosk = Kiosk::new(backend, reader, terminal);
    kiosk.power_on()?;
    info!("Kiosk ready");
    kiosk.run()
}

fn open_displays(config: &DisplaysConfig) -> Result<Displays<SerialLcd<I2cdev>>> {
    let operator = open_lcd(&config.i2c_bus, config.operator)?;
    let customer = open_lcd(&config.i2c_bus, config.customer)?;
    Ok(Displays::new(operator, customer))
}

fn open_lcd(bus: &Path, panel: PanelConfig) -> Result<SerialLcd<I2cdev>> {
    let i2c = I2cdev::new(bus)
        .map_err(|e| KioskError::Hardware(format!("{}: {}", bus.display(), e)))?;
    let mut lcd = SerialLcd::new(i2c, panel.address, panel.rows, panel.columns);
    lcd.hide_cursor()?;
    Ok(lcd)
}

fn open_buttons(pins: &ButtonPins) -> Result<PinPanel<SysfsPin>> {
    Ok(PinPanel::new(
        open_pin(pins.cancel)?,
        open_pin(pins.enter)?,
        open_pin(pins.increment)?,
        open_pin(pins.decrement)?,
    ))
}

fn open_pin(number: u64) -> Result<SysfsPin> {
    let pin = SysfsPin::new(number);
    pin.export()
        .map_err(|e| KioskError::Hardware(format!("GPIO {}: {}", number, e)))?;
    pin.into_input_pin()
        .map_err(|e| KioskError::Hardware(format!("GPIO {}: {}", number, e)))
}
