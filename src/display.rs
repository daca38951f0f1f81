//! Display broadcast over the operator and customer character displays.
//!
//! Text is split on `\n` and written line by line to successive rows.
//! [`Displays::show`] clears the targets first; [`Displays::show_at`],
//! [`Displays::show_line`] and [`Displays::show_right`] only reposition the
//! cursor, which is what live fields (the amount stepper, the confirmation
//! countdown) use to update without redrawing the rest.

use crate::error::Result;

/// A character display addressed by row and column.
pub trait CharDisplay {
    fn clear(&mut self) -> Result<()>;

    /// Writes `text` starting at `row`/`col`. Text past the last column is dropped.
    fn write_at(&mut self, text: &str, row: u8, col: u8) -> Result<()>;

    fn set_backlight(&mut self, on: bool) -> Result<()>;

    /// `(rows, columns)`.
    fn size(&self) -> (u8, u8);
}

/// The two physical displays of the kiosk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Large display facing the operator; shows identity and menus.
    Operator,
    /// Small display facing the customer; never shows identity.
    Customer,
}

pub const BOTH: &[Screen] = &[Screen::Operator, Screen::Customer];
pub const OPERATOR: &[Screen] = &[Screen::Operator];
pub const CUSTOMER: &[Screen] = &[Screen::Customer];

/// Owns both displays and fans writes out to a chosen subset.
pub struct Displays<D> {
    operator: D,
    customer: D,
}

impl<D: CharDisplay> Displays<D> {
    pub fn new(operator: D, customer: D) -> Self {
        Displays { operator, customer }
    }

    pub fn get(&self, screen: Screen) -> &D {
        match screen {
            Screen::Operator => &self.operator,
            Screen::Customer => &self.customer,
        }
    }

    pub fn get_mut(&mut self, screen: Screen) -> &mut D {
        match screen {
            Screen::Operator => &mut self.operator,
            Screen::Customer => &mut self.customer,
        }
    }

    /// Clears every target and writes `text` from the top-left corner.
    pub fn show(&mut self, targets: &[Screen], text: &str) -> Result<()> {
        for &screen in targets {
            let display = self.get_mut(screen);
            display.clear()?;
            write_lines(display, text, 0, 0)?;
        }
        Ok(())
    }

    /// Writes `text` at `row`/`col` on every target without clearing.
    pub fn show_at(&mut self, targets: &[Screen], text: &str, row: u8, col: u8) -> Result<()> {
        for &screen in targets {
            write_lines(self.get_mut(screen), text, row, col)?;
        }
        Ok(())
    }

    /// Rewrites one whole row, padding with blanks so stale characters disappear.
    pub fn show_line(&mut self, targets: &[Screen], text: &str, row: u8) -> Result<()> {
        for &screen in targets {
            let display = self.get_mut(screen);
            let (_, columns) = display.size();
            let line = format!("{:<width$}", text, width = columns as usize);
            display.write_at(&line, row, 0)?;
        }
        Ok(())
    }

    /// Writes a short field flush against the right edge of `row`.
    pub fn show_right(&mut self, targets: &[Screen], text: &str, row: u8) -> Result<()> {
        for &screen in targets {
            let display = self.get_mut(screen);
            let (_, columns) = display.size();
            let col = columns.saturating_sub(text.chars().count() as u8);
            display.write_at(text, row, col)?;
        }
        Ok(())
    }

    pub fn clear(&mut self, targets: &[Screen]) -> Result<()> {
        for &screen in targets {
            self.get_mut(screen).clear()?;
        }
        Ok(())
    }

    pub fn set_backlight(&mut self, targets: &[Screen], on: bool) -> Result<()> {
        for &screen in targets {
            self.get_mut(screen).set_backlight(on)?;
        }
        Ok(())
    }
}

fn write_lines<D: CharDisplay>(display: &mut D, text: &str, row: u8, col: u8) -> Result<()> {
    let (rows, _) = display.size();
    for (offset, line) in text.split('\n').enumerate() {
        let target = row as usize + offset;
        if target >= rows as usize {
            break;
        }
        display.write_at(line, target as u8, col)?;
    }
    Ok(())
}

/// A display held in memory as a grid of characters.
#[derive(Debug, Clone)]
pub struct MemoryDisplay {
    rows: u8,
    columns: u8,
    cells: Vec<Vec<char>>,
    backlight: bool,
    clears: usize,
}

impl MemoryDisplay {
    pub fn new(rows: u8, columns: u8) -> Self {
        MemoryDisplay {
            rows,
            columns,
            cells: vec![vec![' '; columns as usize]; rows as usize],
            backlight: false,
            clears: 0,
        }
    }

    /// One row with trailing blanks removed.
    pub fn line(&self, row: u8) -> String {
        self.cells
            .get(row as usize)
            .map(|cells| cells.iter().collect::<String>().trim_end().to_string())
            .unwrap_or_default()
    }

    /// All rows joined by `\n`, trailing blanks removed.
    pub fn contents(&self) -> String {
        (0..self.rows)
            .map(|row| self.line(row))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn backlight(&self) -> bool {
        self.backlight
    }

    /// How many times the display has been cleared.
    pub fn clears(&self) -> usize {
        self.clears
    }
}

impl CharDisplay for MemoryDisplay {
    fn clear(&mut self) -> Result<()> {
        for row in &mut self.cells {
            row.iter_mut().for_each(|c| *c = ' ');
        }
        self.clears += 1;
        Ok(())
    }

    fn write_at(&mut self, text: &str, row: u8, col: u8) -> Result<()> {
        if let Some(cells) = self.cells.get_mut(row as usize) {
            for (cell, c) in cells.iter_mut().skip(col as usize).zip(text.chars()) {
                *cell = c;
            }
        }
        Ok(())
    }

    fn set_backlight(&mut self, on: bool) -> Result<()> {
        self.backlight = on;
        Ok(())
    }

    fn size(&self) -> (u8, u8) {
        (self.rows, self.columns)
    }
}
