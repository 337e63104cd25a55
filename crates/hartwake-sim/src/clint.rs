use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use hartwake_platform::HartId;

/// Why [`SoftwareInterruptLines::wait`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitExit {
    Pending,
    PoweredOff,
}

#[derive(Debug, Default)]
struct Line {
    msip: Mutex<bool>,
    wake: Condvar,
}

/// Machine software interrupt pending bits, one per hart (the CLINT `msip` words).
///
/// The lines are level triggered: raising an already pending line does not queue a second
/// interrupt, and clearing an already clear line is a no-op.
#[derive(Debug)]
pub struct SoftwareInterruptLines {
    lines: Box<[Line]>,
    powered_off: AtomicBool,
}

impl SoftwareInterruptLines {
    pub fn new(hart_count: usize) -> Self {
        Self {
            lines: (0..hart_count).map(|_| Line::default()).collect(),
            powered_off: AtomicBool::new(false),
        }
    }

    pub fn hart_count(&self) -> usize {
        self.lines.len()
    }

    /// Set the pending bit of `hart` and wake it if it is in the wait state.
    ///
    /// # Panics
    ///
    /// Panics if `hart` is not a hart of this machine.
    pub fn raise(&self, hart: HartId) {
        let line = self.line(hart);
        *lock(&line.msip) = true;
        line.wake.notify_all();
    }

    /// Clear the pending bit of `hart`.
    ///
    /// # Panics
    ///
    /// Panics if `hart` is not a hart of this machine.
    pub fn clear(&self, hart: HartId) {
        *lock(&self.line(hart).msip) = false;
    }

    pub fn is_pending(&self, hart: HartId) -> bool {
        *lock(&self.line(hart).msip)
    }

    pub fn is_powered_off(&self) -> bool {
        self.powered_off.load(Ordering::SeqCst)
    }

    /// Block `hart` until its line is pending and `enabled`, or until power-off.
    ///
    /// With the source disabled in `mie` only a power-off ends the wait.
    pub(crate) fn wait(&self, hart: HartId, enabled: bool) -> WaitExit {
        let line = self.line(hart);
        let mut msip = lock(&line.msip);
        loop {
            if self.is_powered_off() {
                return WaitExit::PoweredOff;
            }
            if enabled && *msip {
                return WaitExit::Pending;
            }
            msip = line
                .wake
                .wait(msip)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Wake every hart and make all further waits return [`WaitExit::PoweredOff`].
    pub(crate) fn power_off(&self) {
        self.powered_off.store(true, Ordering::SeqCst);
        for line in self.lines.iter() {
            // Taking the lock orders the flag store before any sleeper re-checks it.
            drop(lock(&line.msip));
            line.wake.notify_all();
        }
    }

    fn line(&self, hart: HartId) -> &Line {
        self.lines
            .get(hart.index())
            .unwrap_or_else(|| panic!("{hart} is not wired to the software interrupt controller"))
    }
}

fn lock(msip: &Mutex<bool>) -> MutexGuard<'_, bool> {
    msip.lock().unwrap_or_else(PoisonError::into_inner)
}
