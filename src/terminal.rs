//! The kiosk's hardware context: buttons, displays, clock and polling tick.
//!
//! Built once at start-up and passed by `&mut` into menus and the session
//! controller. Nothing else holds a display or the button panel.

use crate::display::{CharDisplay, Displays};
use crate::input::{ButtonSource, Buttons};
use std::thread;
use std::time::Duration;

/// Source of blocking delays.
pub trait Clock {
    fn sleep(&mut self, duration: Duration);
}

/// Real time via [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Returns immediately and adds up the time it was asked to wait.
#[derive(Debug, Clone, Default)]
pub struct InstantClock {
    elapsed: Duration,
}

impl InstantClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

impl Clock for InstantClock {
    fn sleep(&mut self, duration: Duration) {
        self.elapsed += duration;
    }
}

pub struct Terminal<S, D, C> {
    pub buttons: Buttons<S>,
    pub displays: Displays<D>,
    pub clock: C,
    /// Delay between two button polls.
    pub tick: Duration,
}

impl<S, D, C> Terminal<S, D, C>
where
    S: ButtonSource,
    D: CharDisplay,
    C: Clock,
{
    pub fn new(buttons: Buttons<S>, displays: Displays<D>, clock: C, tick: Duration) -> Self {
        Terminal {
            buttons,
            displays,
            clock,
            tick,
        }
    }

    /// Blocks for `duration`.
    pub fn pause(&mut self, duration: Duration) {
        self.clock.sleep(duration);
    }

    /// Blocks for one polling tick.
    pub fn idle_tick(&mut self) {
        let tick = self.tick;
        self.clock.sleep(tick);
    }
}
