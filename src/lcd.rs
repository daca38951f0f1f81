//! Serial character LCD over I2C.
//!
//! The panels take a command prefix byte (`0xFE`) followed by a command code
//! and its arguments; any other byte is printed at the cursor. Rows start at
//! DDRAM addresses `0x00`, `0x40`, `0x14` and `0x54`.

use crate::display::CharDisplay;
use crate::error::{KioskError, Result};
use embedded_hal::i2c::I2c;

const PREFIX: u8 = 0xFE;
const CMD_CLEAR: u8 = 0x51;
const CMD_SET_CURSOR: u8 = 0x45;
const CMD_UNDERLINE_OFF: u8 = 0x48;
const CMD_BLINK_OFF: u8 = 0x4C;
const CMD_BRIGHTNESS: u8 = 0x53;

const ROW_OFFSETS: [u8; 4] = [0x00, 0x40, 0x14, 0x54];

/// Widest line the controller addresses.
const MAX_COLUMNS: u8 = 40;

const BRIGHTNESS_ON: u8 = 8;
const BRIGHTNESS_OFF: u8 = 1;

/// One serial LCD at a fixed I2C address.
pub struct SerialLcd<I2C> {
    i2c: I2C,
    address: u8,
    rows: u8,
    columns: u8,
}

impl<I2C: I2c> SerialLcd<I2C> {
    pub fn new(i2c: I2C, address: u8, rows: u8, columns: u8) -> Self {
        SerialLcd {
            i2c,
            address,
            rows: rows.min(ROW_OFFSETS.len() as u8),
            columns: columns.min(MAX_COLUMNS),
        }
    }

    /// Hides the cursor so only text is visible.
    pub fn hide_cursor(&mut self) -> Result<()> {
        self.command(&[CMD_UNDERLINE_OFF])?;
        self.command(&[CMD_BLINK_OFF])
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    fn command(&mut self, bytes: &[u8]) -> Result<()> {
        let mut frame = Vec::with_capacity(bytes.len() + 1);
        frame.push(PREFIX);
        frame.extend_from_slice(bytes);
        self.send(&frame)
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.i2c
            .write(self.address, bytes)
            .map_err(|e| KioskError::Display(format!("0x{:02x}: {:?}", self.address, e)))
    }
}

/// Maps text to the panel's ASCII character ROM.
fn encode(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() {
                c as u8
            } else {
                b'?'
            }
        })
        .collect()
}

impl<I2C: I2c> CharDisplay for SerialLcd<I2C> {
    fn clear(&mut self) -> Result<()> {
        self.command(&[CMD_CLEAR])
    }

    fn write_at(&mut self, text: &str, row: u8, col: u8) -> Result<()> {
        if row >= self.rows || col >= self.columns {
            return Ok(());
        }
        let address = ROW_OFFSETS[row as usize] + col;
        self.command(&[CMD_SET_CURSOR, address])?;

        let mut bytes = encode(text);
        bytes.truncate((self.columns - col) as usize);
        if bytes.is_empty() {
            return Ok(());
        }
        self.send(&bytes)
    }

    fn set_backlight(&mut self, on: bool) -> Result<()> {
        let level = if on { BRIGHTNESS_ON } else { BRIGHTNESS_OFF };
        self.command(&[CMD_BRIGHTNESS, level])
    }

    fn size(&self) -> (u8, u8) {
        (self.rows, self.columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};

    #[derive(Default)]
    struct RecordingBus {
        writes: Vec<(u8, Vec<u8>)>,
        fail: bool,
    }

    impl ErrorType for RecordingBus {
        type Error = ErrorKind;
    }

    impl I2c for RecordingBus {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> std::result::Result<(), Self::Error> {
            if self.fail {
                return Err(ErrorKind::Other);
            }
            for op in operations {
                if let Operation::Write(bytes) = op {
                    self.writes.push((address, bytes.to_vec()));
                }
            }
            Ok(())
        }
    }

    fn lcd() -> SerialLcd<RecordingBus> {
        SerialLcd::new(RecordingBus::default(), 0x28, 4, 20)
    }

    #[test]
    fn test_clear_and_cursor_commands() {
        let mut lcd = lcd();
        lcd.clear().unwrap();
        lcd.hide_cursor().unwrap();

        let bus = lcd.release();
        assert_eq!(
            bus.writes,
            vec![
                (0x28, vec![0xFE, 0x51]),
                (0x28, vec![0xFE, 0x48]),
                (0x28, vec![0xFE, 0x4C]),
            ]
        );
    }

    #[test]
    fn test_write_positions_cursor_per_row() {
        let mut lcd = lcd();
        lcd.write_at("Hi", 2, 3).unwrap();

        let bus = lcd.release();
        assert_eq!(bus.writes[0], (0x28, vec![0xFE, 0x45, 0x17]));
        assert_eq!(bus.writes[1], (0x28, b"Hi".to_vec()));
    }

    #[test]
    fn test_write_truncates_and_replaces_non_ascii() {
        let mut lcd = SerialLcd::new(RecordingBus::default(), 0x27, 2, 16);
        lcd.write_at("Kjøp kaffe nå, takk", 1, 10).unwrap();
        lcd.write_at("ignored", 2, 0).unwrap();

        let bus = lcd.release();
        assert_eq!(bus.writes.len(), 2);
        assert_eq!(bus.writes[0], (0x27, vec![0xFE, 0x45, 0x4A]));
        assert_eq!(bus.writes[1], (0x27, b"Kj?p k".to_vec()));
    }

    #[test]
    fn test_geometry_is_clamped_to_controller() {
        let mut lcd = SerialLcd::new(RecordingBus::default(), 0x28, 9, 255);
        assert_eq!(lcd.size(), (4, 40));

        lcd.write_at("x", 3, 200).unwrap();
        lcd.write_at("y", 3, 39).unwrap();

        let bus = lcd.release();
        assert_eq!(bus.writes.len(), 2);
        assert_eq!(bus.writes[0], (0x28, vec![0xFE, 0x45, 0x54 + 39]));
        assert_eq!(bus.writes[1], (0x28, b"y".to_vec()));
    }

    #[test]
    fn test_backlight_levels() {
        let mut lcd = lcd();
        lcd.set_backlight(true).unwrap();
        lcd.set_backlight(false).unwrap();

        let bus = lcd.release();
        assert_eq!(bus.writes[0].1, vec![0xFE, 0x53, 8]);
        assert_eq!(bus.writes[1].1, vec![0xFE, 0x53, 1]);
    }

    #[test]
    fn test_bus_failure_is_display_error() {
        let bus = RecordingBus {
            fail: true,
            ..RecordingBus::default()
        };
        let mut lcd = SerialLcd::new(bus, 0x28, 4, 20);
        assert!(matches!(lcd.clear(), Err(KioskError::Display(_))));
    }
}
