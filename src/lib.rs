//! # Voucher Kiosk
//!
//! Firmware for a button-driven NFC voucher kiosk. An operator serves one
//! customer per card tap: the card is resolved against the voucher backend,
//! balances are shown on two character displays, and a four-button panel
//! drives the menus that end in at most one balance mutation.
//!
//! ## Design Principles
//!
//! - **One mutation per session**: the only balance change is issued from the
//!   settlement state and always awaited
//! - **No input bleed**: every menu starts from a fresh button state
//! - **Identity stays private**: the customer display shows balances only
//! - **Hardware at the seams**: buttons, displays, reader and clock are traits,
//!   so whole sessions run in memory under test
//! - **Swappable backend**: the member system's REST API in production, a
//!   CSV-seeded [`Ledger`] offline and under test
//!
//! ## Example
//!
//! ```no_run
//! use std::io::Cursor;
//! use std::time::Duration;
//! use voucher_kiosk::{
//!     Buttons, Displays, InstantClock, Kiosk, Ledger, LineCardReader, MemoryDisplay,
//!     Polarity, ScriptedPanel, Terminal,
//! };
//!
//! let terminal = Terminal::new(
//!     Buttons::new(ScriptedPanel::new(Polarity::ActiveLow), Polarity::ActiveLow),
//!     Displays::new(MemoryDisplay::new(4, 20), MemoryDisplay::new(2, 16)),
//!     InstantClock::new(),
//!     Duration::from_millis(20),
//! );
//! let reader = LineCardReader::new(Cursor::new("04A1B2C3\n"));
//! let mut kiosk = Kiosk::new(Ledger::new(), reader, terminal);
//! kiosk.run_session().unwrap();
//! ```

pub mod backend;
pub mod config;
pub mod display;
pub mod error;
pub mod input;
pub mod kiosk;
pub mod lcd;
pub mod ledger;
pub mod menu;
pub mod reader;
pub mod remote;
pub mod session;
pub mod terminal;

pub use backend::{Backend, CardId, CardOwner, MemberId};
pub use config::KioskConfig;
pub use display::{CharDisplay, Displays, MemoryDisplay, Screen};
pub use error::{KioskError, Result};
pub use input::{Button, ButtonSource, Buttons, PinPanel, Polarity, ScriptedPanel};
pub use kiosk::{Kiosk, SessionEnd};
pub use lcd::SerialLcd;
pub use ledger::Ledger;
pub use reader::{CardReader, LineCardReader};
pub use remote::{RemoteBackend, UreqTransport};
pub use session::{Customer, Settlement};
pub use terminal::{Clock, InstantClock, SystemClock, Terminal};
