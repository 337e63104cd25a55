//! Busy-wait helpers.
//!
//! Spinning is the only way harts wait for each other outside the wait state. The poll loop and
//! the pause between polls are kept apart so call sites do not change when the backoff does.

use crate::hart::Hart;

/// What a spinning hart does between two polls of its condition.
pub trait Backoff {
    fn snooze<H: Hart + ?Sized>(&mut self, hart: &H);
}

/// Pause with a single spin-loop hint.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpinHint;

impl Backoff for SpinHint {
    fn snooze<H: Hart + ?Sized>(&mut self, hart: &H) {
        hart.relax();
    }
}

/// Pause with an inexact [`Hart::delay`] of a fixed length.
#[derive(Debug, Clone, Copy)]
pub struct HartDelay(pub u32);

impl Backoff for HartDelay {
    fn snooze<H: Hart + ?Sized>(&mut self, hart: &H) {
        hart.delay(self.0);
    }
}

/// Spin until `done` returns `true`, snoozing between polls.
///
/// Returns the number of failed polls.
pub fn spin_until<H, B, F>(hart: &H, backoff: &mut B, mut done: F) -> u64
where
    H: Hart + ?Sized,
    B: Backoff,
    F: FnMut() -> bool,
{
    let mut polls = 0u64;
    while !done() {
        polls += 1;
        backoff.snooze(hart);
    }
    polls
}
