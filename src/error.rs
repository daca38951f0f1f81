//! Error types for the voucher kiosk.

use thiserror::Error;

/// Result type alias for kiosk operations
pub type Result<T> = std::result::Result<T, KioskError>;

/// Errors that can occur while running the kiosk.
///
/// Only [`KioskError::Backend`] is recovered from inside a session; every
/// other variant is fatal and ends the process.
#[derive(Error, Debug)]
pub enum KioskError {
    /// Failed to open or read a file or device
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Ledger CSV parsing error
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration file could not be parsed
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// Configuration names neither a remote API nor a local ledger
    #[error("Invalid configuration: an \"api\" or \"ledger\" section is required")]
    NoBackend,

    /// Missing configuration file argument
    #[error("Missing configuration file argument. Usage: voucher-kiosk <config.json>")]
    MissingArgument,

    /// The backend collaborator failed to answer a request
    #[error("Backend error: {0}")]
    Backend(String),

    /// A character display rejected a write
    #[error("Display error: {0}")]
    Display(String),

    /// A button pin could not be sampled
    #[error("Input error: {0}")]
    Input(String),

    /// The card reader stopped producing card ids
    #[error("Card reader closed")]
    ReaderClosed,

    /// Pin or bus initialization failed
    #[error("Hardware setup error: {0}")]
    Hardware(String),
}
