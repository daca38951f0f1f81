//! Blocking menus driven by the button panel.
//!
//! Every menu goes `Rendered → AwaitingInput → {Selected | Cancelled}`. The
//! [`run`] driver owns the polling loop: it resets the button state, renders
//! the menu once, then feeds one [`Snapshot`] per tick into
//! [`Menu::handle`] until the menu resolves, redrawing only after a change.
//!
//! Three menus implement [`Menu`]:
//!
//! - [`ChoiceMenu`]: cycle through tagged options with wrap-around
//! - [`TextMenu`]: build a string one character at a time
//! - [`AmountMenu`]: numeric stepper floored at zero, where cancel yields `0`

use crate::display::{CharDisplay, Displays, Screen};
use crate::error::Result;
use crate::input::{ButtonSource, Snapshot, Step};
use crate::terminal::{Clock, Terminal};
use log::debug;

/// How a menu ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuOutcome<T> {
    Selected(T),
    Cancelled,
}

impl<T> MenuOutcome<T> {
    pub fn selected(self) -> Option<T> {
        match self {
            MenuOutcome::Selected(value) => Some(value),
            MenuOutcome::Cancelled => None,
        }
    }
}

/// Result of feeding one poll into a menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled<T> {
    /// Nothing visible changed.
    Unchanged,
    /// State changed; the menu needs a refresh.
    Changed,
    Done(MenuOutcome<T>),
}

pub trait Menu {
    type Value;

    /// Draws the menu from scratch.
    fn render<D: CharDisplay>(&self, displays: &mut Displays<D>) -> Result<()>;

    /// Redraws after [`Handled::Changed`].
    fn refresh<D: CharDisplay>(&self, displays: &mut Displays<D>) -> Result<()> {
        self.render(displays)
    }

    fn handle(&mut self, input: Snapshot) -> Handled<Self::Value>;
}

/// Runs `menu` until it resolves.
pub fn run<M, S, D, C>(terminal: &mut Terminal<S, D, C>, mut menu: M) -> Result<MenuOutcome<M::Value>>
where
    M: Menu,
    S: ButtonSource,
    D: CharDisplay,
    C: Clock,
{
    terminal.buttons.reset();
    menu.render(&mut terminal.displays)?;

    loop {
        let input = terminal.buttons.poll()?;
        match menu.handle(input) {
            Handled::Done(outcome) => return Ok(outcome),
            Handled::Changed => menu.refresh(&mut terminal.displays)?,
            Handled::Unchanged => {}
        }
        terminal.idle_tick();
    }
}

/// Pick one of several tagged options.
///
/// Options are `(tag, label)` pairs; the tag is what comes back in
/// [`MenuOutcome::Selected`], so callers match on an enum rather than on the
/// label text.
pub struct ChoiceMenu<'a, T> {
    targets: &'a [Screen],
    prompt: &'a str,
    options: &'a [(T, &'a str)],
    index: usize,
}

impl<'a, T: Copy> ChoiceMenu<'a, T> {
    pub fn new(targets: &'a [Screen], prompt: &'a str, options: &'a [(T, &'a str)]) -> Self {
        debug_assert!(options.len() >= 2, "a choice needs at least two options");
        ChoiceMenu {
            targets,
            prompt,
            options,
            index: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn highlighted(&self) -> Option<T> {
        self.options.get(self.index).map(|(tag, _)| *tag)
    }

    fn option_line(&self) -> String {
        let label = self.options.get(self.index).map_or("", |(_, label)| *label);
        format!("> {}", label)
    }
}

impl<T: Copy> Menu for ChoiceMenu<'_, T> {
    type Value = T;

    fn render<D: CharDisplay>(&self, displays: &mut Displays<D>) -> Result<()> {
        displays.show(self.targets, &format!("{}\n{}", self.prompt, self.option_line()))
    }

    fn refresh<D: CharDisplay>(&self, displays: &mut Displays<D>) -> Result<()> {
        displays.show_line(self.targets, &self.option_line(), 1)
    }

    fn handle(&mut self, input: Snapshot) -> Handled<T> {
        let count = self.options.len();
        if input.cancel || count == 0 {
            return Handled::Done(MenuOutcome::Cancelled);
        }
        if input.enter {
            return match self.highlighted() {
                Some(tag) => Handled::Done(MenuOutcome::Selected(tag)),
                None => Handled::Done(MenuOutcome::Cancelled),
            };
        }
        match input.step {
            Some(Step::Up) => {
                self.index = (self.index + 1) % count;
                Handled::Changed
            }
            Some(Step::Down) => {
                self.index = (self.index + count - 1) % count;
                Handled::Changed
            }
            None => Handled::Unchanged,
        }
    }
}

/// Characters offered by the text entry menu, in cycling order.
pub const CHARSET: &str = "abcdefghijklmnopqrstuvwxyz0123456789-_.";

/// Longest string the text entry menu accepts.
pub const MAX_TEXT_LEN: usize = 32;

/// One candidate in the text entry menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Glyph {
    Char(char),
    /// Removes the last character.
    Erase,
    /// Finishes entry.
    Done,
}

impl Glyph {
    fn label(self) -> String {
        match self {
            Glyph::Char(c) => c.to_string(),
            Glyph::Erase => "<".to_string(),
            Glyph::Done => "OK".to_string(),
        }
    }
}

/// Free-text entry, one character at a time.
///
/// Increment/decrement cycle the candidate glyph, enter applies it. Unlike the
/// other menus enter acts on its rising edge here, so a long press commits a
/// character only once.
pub struct TextMenu<'a> {
    targets: &'a [Screen],
    prompt: &'a str,
    glyphs: Vec<Glyph>,
    index: usize,
    text: String,
    enter_held: bool,
}

impl<'a> TextMenu<'a> {
    pub fn new(targets: &'a [Screen], prompt: &'a str) -> Self {
        let mut glyphs: Vec<Glyph> = CHARSET.chars().map(Glyph::Char).collect();
        glyphs.push(Glyph::Erase);
        glyphs.push(Glyph::Done);
        TextMenu {
            targets,
            prompt,
            glyphs,
            index: 0,
            text: String::new(),
            enter_held: false,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn candidate(&self) -> Glyph {
        self.glyphs[self.index]
    }

    fn entry_line(&self, width: usize) -> String {
        let line = format!("{}[{}]", self.text, self.candidate().label());
        let skip = line.chars().count().saturating_sub(width);
        line.chars().skip(skip).collect()
    }

    fn apply(&mut self) -> Handled<String> {
        match self.candidate() {
            Glyph::Char(c) => {
                if self.text.len() < MAX_TEXT_LEN {
                    self.text.push(c);
                }
                Handled::Changed
            }
            Glyph::Erase => {
                self.text.pop();
                Handled::Changed
            }
            Glyph::Done => Handled::Done(MenuOutcome::Selected(self.text.clone())),
        }
    }
}

impl Menu for TextMenu<'_> {
    type Value = String;

    fn render<D: CharDisplay>(&self, displays: &mut Displays<D>) -> Result<()> {
        displays.show(self.targets, self.prompt)?;
        self.refresh(displays)
    }

    fn refresh<D: CharDisplay>(&self, displays: &mut Displays<D>) -> Result<()> {
        for &screen in self.targets {
            let (_, columns) = displays.get(screen).size();
            displays.show_line(&[screen], &self.entry_line(columns as usize), 1)?;
        }
        Ok(())
    }

    fn handle(&mut self, input: Snapshot) -> Handled<String> {
        if input.cancel {
            return Handled::Done(MenuOutcome::Cancelled);
        }

        let pressed = input.enter && !self.enter_held;
        self.enter_held = input.enter;
        if pressed {
            return self.apply();
        }

        let count = self.glyphs.len();
        match input.step {
            Some(Step::Up) => {
                self.index = (self.index + 1) % count;
                Handled::Changed
            }
            Some(Step::Down) => {
                self.index = (self.index + count - 1) % count;
                Handled::Changed
            }
            None => Handled::Unchanged,
        }
    }
}

/// Numeric stepper starting at zero.
///
/// Cancel resolves to `Selected(0)`; callers treat `0` as "no amount" whether
/// it came from cancel or from confirming at zero.
pub struct AmountMenu<'a> {
    targets: &'a [Screen],
    prompt: &'a str,
    clean: bool,
    row: u8,
    amount: u32,
}

impl<'a> AmountMenu<'a> {
    /// With `clean == false` the targets keep their content and only `row`
    /// is rewritten, so the stepper can sit on top of an information screen.
    pub fn new(targets: &'a [Screen], prompt: &'a str, clean: bool, row: u8) -> Self {
        AmountMenu {
            targets,
            prompt,
            clean,
            row,
            amount: 0,
        }
    }

    pub fn amount(&self) -> u32 {
        self.amount
    }

    fn value_line(&self) -> String {
        format!("{}: {:>3}", self.prompt, self.amount)
    }
}

impl Menu for AmountMenu<'_> {
    type Value = u32;

    fn render<D: CharDisplay>(&self, displays: &mut Displays<D>) -> Result<()> {
        if self.clean {
            displays.clear(self.targets)?;
        }
        self.refresh(displays)
    }

    fn refresh<D: CharDisplay>(&self, displays: &mut Displays<D>) -> Result<()> {
        displays.show_line(self.targets, &self.value_line(), self.row)
    }

    fn handle(&mut self, input: Snapshot) -> Handled<u32> {
        if input.cancel {
            debug!("Amount entry cancelled at {}", self.amount);
            return Handled::Done(MenuOutcome::Selected(0));
        }
        if input.enter {
            return Handled::Done(MenuOutcome::Selected(self.amount));
        }
        match input.step {
            Some(Step::Up) => {
                self.amount = self.amount.saturating_add(1);
                Handled::Changed
            }
            Some(Step::Down) if self.amount > 0 => {
                self.amount -= 1;
                Handled::Changed
            }
            _ => Handled::Unchanged,
        }
    }
}
