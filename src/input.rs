//! Debounced input from the four-button control panel.
//!
//! Cancel and enter are level-triggered: every poll reports whether they are
//! held right now. Increment and decrement are edge-triggered with hold
//! suppression: a press fires once and the button then stays the *active
//! button* until a poll samples it released, so holding a button changes a
//! value by one unit per physical press rather than once per polling tick.
//!
//! # Invariants
//!
//! - A button never re-triggers before a released sample has been observed
//! - After [`Buttons::reset`] every button that is still held is ignored
//!   until it has been released once

use crate::error::{KioskError, Result};
use embedded_hal::digital::InputPin;
use serde::Deserialize;
use std::collections::VecDeque;

/// The four physical buttons on the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Cancel,
    Enter,
    Increment,
    Decrement,
}

/// Which pin level means "pressed".
///
/// With the panel's internal pull-ups the line idles high and a press pulls
/// it low, which is [`Polarity::ActiveLow`]. Panels wired with pull-downs
/// need [`Polarity::ActiveHigh`]. This must be checked against the actual
/// wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    #[default]
    ActiveLow,
    ActiveHigh,
}

impl Polarity {
    /// Converts a sampled pin level into a pressed flag.
    pub fn is_pressed(self, high: bool) -> bool {
        match self {
            Polarity::ActiveLow => !high,
            Polarity::ActiveHigh => high,
        }
    }

    /// The pin level a button shows when `pressed`.
    pub fn level(self, pressed: bool) -> bool {
        match self {
            Polarity::ActiveLow => !pressed,
            Polarity::ActiveHigh => pressed,
        }
    }
}

/// One boolean per button. Used for raw pin levels as well as for pressed flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Levels {
    pub cancel: bool,
    pub enter: bool,
    pub increment: bool,
    pub decrement: bool,
}

impl Levels {
    /// Every button at the same level.
    pub fn all(value: bool) -> Self {
        Levels {
            cancel: value,
            enter: value,
            increment: value,
            decrement: value,
        }
    }

    pub fn get(&self, button: Button) -> bool {
        match button {
            Button::Cancel => self.cancel,
            Button::Enter => self.enter,
            Button::Increment => self.increment,
            Button::Decrement => self.decrement,
        }
    }

    pub fn set(&mut self, button: Button, value: bool) {
        match button {
            Button::Cancel => self.cancel = value,
            Button::Enter => self.enter = value,
            Button::Increment => self.increment = value,
            Button::Decrement => self.decrement = value,
        }
    }

    fn map(self, f: impl Fn(bool) -> bool) -> Self {
        Levels {
            cancel: f(self.cancel),
            enter: f(self.enter),
            increment: f(self.increment),
            decrement: f(self.decrement),
        }
    }
}

/// A single logical activation of increment or decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Up,
    Down,
}

/// What one poll of the panel means to a menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Snapshot {
    /// Cancel is held (level-triggered).
    pub cancel: bool,
    /// Enter is held (level-triggered).
    pub enter: bool,
    /// Increment or decrement fired on this poll.
    pub step: Option<Step>,
}

/// Anything that can sample the raw pin levels of the panel.
pub trait ButtonSource {
    fn sample(&mut self) -> Result<Levels>;
}

/// Hold-suppression state between polls.
#[derive(Debug, Clone, Default)]
pub struct ButtonState {
    /// Increment/decrement button that fired and has not been released yet.
    active: Option<Button>,
    /// Buttons held across a reset; ignored until sampled released.
    blocked: Levels,
}

impl ButtonState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State for a freshly opened menu: nothing active, every button must be
    /// seen released before it counts.
    pub fn fresh() -> Self {
        ButtonState {
            active: None,
            blocked: Levels::all(true),
        }
    }

    pub fn active(&self) -> Option<Button> {
        self.active
    }

    /// Folds one poll of pressed flags into the state.
    pub fn update(&mut self, pressed: Levels) -> Snapshot {
        for button in [
            Button::Cancel,
            Button::Enter,
            Button::Increment,
            Button::Decrement,
        ] {
            if !pressed.get(button) {
                self.blocked.set(button, false);
            }
        }

        if let Some(active) = self.active {
            if !pressed.get(active) {
                self.active = None;
            }
        }

        let live = |button: Button| pressed.get(button) && !self.blocked.get(button);

        let step = if self.active.is_some() {
            None
        } else if live(Button::Increment) {
            self.active = Some(Button::Increment);
            Some(Step::Up)
        } else if live(Button::Decrement) {
            self.active = Some(Button::Decrement);
            Some(Step::Down)
        } else {
            None
        };

        Snapshot {
            cancel: live(Button::Cancel),
            enter: live(Button::Enter),
            step,
        }
    }
}

/// Debounced view over a [`ButtonSource`].
pub struct Buttons<S> {
    source: S,
    polarity: Polarity,
    state: ButtonState,
}

impl<S: ButtonSource> Buttons<S> {
    pub fn new(source: S, polarity: Polarity) -> Self {
        Buttons {
            source,
            polarity,
            state: ButtonState::new(),
        }
    }

    /// Samples the panel once.
    pub fn poll(&mut self) -> Result<Snapshot> {
        let raw = self.source.sample()?;
        let polarity = self.polarity;
        Ok(self.state.update(raw.map(|high| polarity.is_pressed(high))))
    }

    /// Discards all hold state so a residual press cannot leak into the next menu.
    pub fn reset(&mut self) {
        self.state = ButtonState::fresh();
    }

    pub fn state(&self) -> &ButtonState {
        &self.state
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

/// Four GPIO input pins.
pub struct PinPanel<P> {
    cancel: P,
    enter: P,
    increment: P,
    decrement: P,
}

impl<P: InputPin> PinPanel<P> {
    pub fn new(cancel: P, enter: P, increment: P, decrement: P) -> Self {
        PinPanel {
            cancel,
            enter,
            increment,
            decrement,
        }
    }
}

fn read_pin<P: InputPin>(pin: &mut P, button: Button) -> Result<bool> {
    pin.is_high()
        .map_err(|e| KioskError::Input(format!("{:?} pin: {:?}", button, e)))
}

impl<P: InputPin> ButtonSource for PinPanel<P> {
    fn sample(&mut self) -> Result<Levels> {
        Ok(Levels {
            cancel: read_pin(&mut self.cancel, Button::Cancel)?,
            enter: read_pin(&mut self.enter, Button::Enter)?,
            increment: read_pin(&mut self.increment, Button::Increment)?,
            decrement: read_pin(&mut self.decrement, Button::Decrement)?,
        })
    }
}

/// Replays a fixed sequence of samples. Fails once the script runs out, so a
/// menu waiting for input that never comes ends instead of spinning.
#[derive(Debug, Clone)]
pub struct ScriptedPanel {
    polarity: Polarity,
    samples: VecDeque<Levels>,
}

impl ScriptedPanel {
    pub fn new(polarity: Polarity) -> Self {
        ScriptedPanel {
            polarity,
            samples: VecDeque::new(),
        }
    }

    /// `ticks` samples with every button released.
    pub fn idle(mut self, ticks: usize) -> Self {
        for _ in 0..ticks {
            self.push(Levels::default());
        }
        self
    }

    /// Holds `button` for `ticks` samples.
    pub fn hold(mut self, button: Button, ticks: usize) -> Self {
        let mut pressed = Levels::default();
        pressed.set(button, true);
        for _ in 0..ticks {
            self.push(pressed);
        }
        self
    }

    /// One press followed by one release.
    pub fn tap(self, button: Button) -> Self {
        self.hold(button, 1).idle(1)
    }

    /// `count` separate presses of `button`.
    pub fn taps(mut self, button: Button, count: usize) -> Self {
        for _ in 0..count {
            self = self.tap(button);
        }
        self
    }

    /// Appends an arbitrary set of pressed flags.
    pub fn pressed(mut self, pressed: Levels) -> Self {
        self.push(pressed);
        self
    }

    pub fn remaining(&self) -> usize {
        self.samples.len()
    }

    fn push(&mut self, pressed: Levels) {
        let polarity = self.polarity;
        self.samples.push_back(pressed.map(|p| polarity.level(p)));
    }
}

impl ButtonSource for ScriptedPanel {
    fn sample(&mut self) -> Result<Levels> {
        self.samples
            .pop_front()
            .ok_or_else(|| KioskError::Input("button script exhausted".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn poll_all(buttons: &mut Buttons<ScriptedPanel>) -> Vec<Snapshot> {
        let mut out = Vec::new();
        while buttons.source().remaining() > 0 {
            out.push(buttons.poll().unwrap());
        }
        out
    }

    fn steps(snapshots: &[Snapshot]) -> Vec<Step> {
        snapshots.iter().filter_map(|s| s.step).collect()
    }

    #[test]
    fn test_polarity_conversion() {
        assert!(Polarity::ActiveLow.is_pressed(false));
        assert!(!Polarity::ActiveLow.is_pressed(true));
        assert!(Polarity::ActiveHigh.is_pressed(true));
        assert!(!Polarity::ActiveLow.level(true));
    }

    #[test]
    fn test_held_increment_fires_once() {
        let panel = ScriptedPanel::new(Polarity::ActiveLow).hold(Button::Increment, 10);
        let mut buttons = Buttons::new(panel, Polarity::ActiveLow);

        let snapshots = poll_all(&mut buttons);
        assert_eq!(steps(&snapshots), vec![Step::Up]);
        assert_eq!(buttons.state().active(), Some(Button::Increment));
    }

    #[test]
    fn test_release_rearms_increment() {
        let panel = ScriptedPanel::new(Polarity::ActiveHigh)
            .hold(Button::Increment, 3)
            .idle(1)
            .hold(Button::Increment, 3);
        let mut buttons = Buttons::new(panel, Polarity::ActiveHigh);

        let snapshots = poll_all(&mut buttons);
        assert_eq!(steps(&snapshots), vec![Step::Up, Step::Up]);
    }

    #[test]
    fn test_decrement_suppressed_while_increment_held() {
        let mut both = Levels::default();
        both.increment = true;
        both.decrement = true;
        let panel = ScriptedPanel::new(Polarity::ActiveHigh)
            .hold(Button::Increment, 1)
            .pressed(both)
            .hold(Button::Decrement, 1)
            .idle(1)
            .tap(Button::Decrement);
        let mut buttons = Buttons::new(panel, Polarity::ActiveHigh);

        let snapshots = poll_all(&mut buttons);
        assert_eq!(steps(&snapshots), vec![Step::Up, Step::Down, Step::Down]);
    }

    #[test]
    fn test_cancel_and_enter_are_level_triggered() {
        let panel = ScriptedPanel::new(Polarity::ActiveLow).hold(Button::Enter, 3);
        let mut buttons = Buttons::new(panel, Polarity::ActiveLow);

        let snapshots = poll_all(&mut buttons);
        assert!(snapshots.iter().all(|s| s.enter && !s.cancel));
    }

    #[test]
    fn test_reset_ignores_held_cancel_until_release() {
        let panel = ScriptedPanel::new(Polarity::ActiveLow)
            .hold(Button::Cancel, 3)
            .idle(1)
            .hold(Button::Cancel, 1);
        let mut buttons = Buttons::new(panel, Polarity::ActiveLow);
        buttons.reset();

        let snapshots = poll_all(&mut buttons);
        let cancels: Vec<bool> = snapshots.iter().map(|s| s.cancel).collect();
        assert_eq!(cancels, vec![false, false, false, false, true]);
    }

    #[test]
    fn test_reset_clears_active_button() {
        let panel = ScriptedPanel::new(Polarity::ActiveHigh)
            .hold(Button::Decrement, 2)
            .idle(1)
            .tap(Button::Decrement);
        let mut buttons = Buttons::new(panel, Polarity::ActiveHigh);

        buttons.poll().unwrap();
        assert_eq!(buttons.state().active(), Some(Button::Decrement));
        buttons.reset();
        assert_eq!(buttons.state().active(), None);

        let snapshots = poll_all(&mut buttons);
        assert_eq!(steps(&snapshots), vec![Step::Down]);
    }

    #[test]
    fn test_exhausted_script_is_an_error() {
        let panel = ScriptedPanel::new(Polarity::ActiveLow);
        let mut buttons = Buttons::new(panel, Polarity::ActiveLow);
        assert!(matches!(buttons.poll(), Err(KioskError::Input(_))));
    }

    struct FixedPin(bool);

    impl embedded_hal::digital::ErrorType for FixedPin {
        type Error = Infallible;
    }

    impl InputPin for FixedPin {
        fn is_high(&mut self) -> std::result::Result<bool, Self::Error> {
            Ok(self.0)
        }

        fn is_low(&mut self) -> std::result::Result<bool, Self::Error> {
            Ok(!self.0)
        }
    }

    #[test]
    fn test_pin_panel_reads_levels() {
        let mut panel = PinPanel::new(
            FixedPin(true),
            FixedPin(false),
            FixedPin(true),
            FixedPin(true),
        );
        let levels = panel.sample().unwrap();
        assert_eq!(
            levels,
            Levels {
                cancel: true,
                enter: false,
                increment: true,
                decrement: true,
            }
        );

        let mut buttons = Buttons::new(panel, Polarity::ActiveLow);
        let snapshot = buttons.poll().unwrap();
        assert!(snapshot.enter);
        assert!(!snapshot.cancel);
        assert_eq!(snapshot.step, None);
    }
}
