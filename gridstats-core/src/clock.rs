//! Time source for "current year" defaults.

use chrono::Datelike;

/// Source of the current calendar year.
pub trait Clock: Send + Sync {
    fn current_year(&self) -> i32;
}

/// Wall-clock year in the local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn current_year(&self) -> i32 {
        chrono::Local::now().year()
    }
}

/// A clock pinned to one year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub i32);

impl Clock for FixedClock {
    fn current_year(&self) -> i32 {
        self.0
    }
}
