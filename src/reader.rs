//! NFC card reader.
//!
//! The reader hands over one card identifier per line, which is how both
//! keyboard-wedge USB readers and a pipe from an NFC daemon behave.

use crate::backend::CardId;
use crate::error::{KioskError, Result};
use log::debug;
use std::io::BufRead;

pub trait CardReader {
    /// Blocks until a card is presented.
    fn read_card_id(&mut self) -> Result<CardId>;
}

/// Reads card ids line by line from any buffered source.
pub struct LineCardReader<R> {
    source: R,
    line: String,
}

impl<R: BufRead> LineCardReader<R> {
    pub fn new(source: R) -> Self {
        LineCardReader {
            source,
            line: String::new(),
        }
    }
}

impl<R: BufRead> CardReader for LineCardReader<R> {
    fn read_card_id(&mut self) -> Result<CardId> {
        loop {
            self.line.clear();
            if self.source.read_line(&mut self.line)? == 0 {
                return Err(KioskError::ReaderClosed);
            }
            match CardId::parse(&self.line) {
                Some(card) => {
                    debug!("Read card {}", card);
                    return Ok(card);
                }
                None => continue,
            }
        }
    }
}
