//! Shared state of the self-test.
//!
//! All harts see one [`SelfTestState`]. It holds no locks: every field has exactly one writer, and
//! the only way to write a field is through the handle that belongs to that writer.
//!
//! | field | writer | handle |
//! |---|---|---|
//! | check-in flag `h` | hart `h` | [`HartLedger`] |
//! | wake counter `h` | hart `h` | [`HartLedger`] |
//! | handled counter `h` | hart `h`, inside its own trap handler | [`HartLedger`] |
//! | release gate, cycle count | hart 0 | [`Coordinator`] |
//! | outcome per configuration | the giver of the current round | [`Giver`] |
//!
//! Cross-hart visibility of everything except the barrier fields is only guaranteed after the
//! next barrier.

#[cfg(all(feature = "loom", test))]
use loom::sync::atomic::{AtomicBool, AtomicU32};
#[cfg(not(all(feature = "loom", test)))]
use std::sync::atomic::{AtomicBool, AtomicU32};

use std::sync::atomic::Ordering;

use hartwake_platform::{Hart, HartId};

use crate::driver::{Configuration, Round};
use crate::outcome::{SelfTestResult, TestFailure};

pub struct SelfTestState<const N: usize> {
    check_in: [AtomicBool; N],
    release: AtomicBool,
    barrier_cycles: AtomicU32,
    wake_count: [AtomicU32; N],
    handled_count: [AtomicU32; N],
    outcome: [AtomicU32; Configuration::COUNT],
}

impl<const N: usize> SelfTestState<N> {
    pub fn new() -> Self {
        Self {
            check_in: std::array::from_fn(|_| AtomicBool::new(false)),
            release: AtomicBool::new(false),
            barrier_cycles: AtomicU32::new(0),
            wake_count: std::array::from_fn(|_| AtomicU32::new(0)),
            handled_count: std::array::from_fn(|_| AtomicU32::new(0)),
            outcome: std::array::from_fn(|_| AtomicU32::new(0)),
        }
    }

    /// Write access to the calling hart's own fields.
    ///
    /// # Panics
    ///
    /// Panics if the hart is not one of the `N` harts this state was built for.
    pub fn ledger<H: Hart + ?Sized>(&self, hart: &H) -> HartLedger<'_, N> {
        let id = hart.hart_id();
        assert!(id.index() < N, "{id} is outside the {N}-hart self-test");
        HartLedger {
            state: self,
            hart: id.index(),
        }
    }

    /// Write access to the barrier release gate. Only hart 0 gets one.
    pub fn coordinator<H: Hart + ?Sized>(&self, hart: &H) -> Option<Coordinator<'_, N>> {
        hart.hart_id()
            .is_primary()
            .then_some(Coordinator { state: self })
    }

    /// Write access to the outcome record. Only the giver of `round` gets one.
    pub fn giver<H: Hart + ?Sized>(&self, hart: &H, round: Round) -> Option<Giver<'_, N>> {
        (hart.hart_id() == round.giver(N)).then_some(Giver { state: self })
    }

    pub fn checked_in_count(&self) -> usize {
        self.check_in
            .iter()
            .filter(|flag| flag.load(Ordering::SeqCst))
            .count()
    }

    pub fn is_checked_in(&self, hart: HartId) -> bool {
        self.check_in[hart.index()].load(Ordering::SeqCst)
    }

    pub fn release_open(&self) -> bool {
        self.release.load(Ordering::SeqCst)
    }

    /// Number of completed barrier releases.
    pub fn barrier_cycles(&self) -> u32 {
        self.barrier_cycles.load(Ordering::SeqCst)
    }

    pub fn wake_count(&self, hart: HartId) -> u32 {
        self.wake_count[hart.index()].load(Ordering::SeqCst)
    }

    pub fn handled_count(&self, hart: HartId) -> u32 {
        self.handled_count[hart.index()].load(Ordering::SeqCst)
    }

    /// Recorded failure for `configuration`, if any.
    pub fn outcome(&self, configuration: Configuration) -> Option<TestFailure> {
        TestFailure::from_code(self.outcome[configuration.index()].load(Ordering::SeqCst))
    }

    /// Composite result over both configurations.
    pub fn result(&self) -> SelfTestResult {
        let code = self
            .outcome
            .iter()
            .map(|outcome| outcome.load(Ordering::SeqCst))
            .sum();
        SelfTestResult::from_code(code)
    }
}

impl<const N: usize> Default for SelfTestState<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// A hart's write handle to its own check-in flag and counters.
pub struct HartLedger<'a, const N: usize> {
    state: &'a SelfTestState<N>,
    hart: usize,
}

impl<const N: usize> HartLedger<'_, N> {
    pub fn hart(&self) -> HartId {
        HartId::new(self.hart)
    }

    pub fn check_in(&self) {
        self.state.check_in[self.hart].store(true, Ordering::SeqCst);
    }

    pub fn check_out(&self) {
        self.state.check_in[self.hart].store(false, Ordering::SeqCst);
    }

    /// Zero both counters at the start of a taker round.
    pub fn reset_counters(&self) {
        self.state.handled_count[self.hart].store(0, Ordering::SeqCst);
        self.state.wake_count[self.hart].store(0, Ordering::SeqCst);
    }

    /// Count one exit from the wait state. Returns the new count.
    pub fn record_wake(&self) -> u32 {
        self.state.wake_count[self.hart].fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Count one handled software interrupt. Returns the new count.
    pub fn record_handled(&self) -> u32 {
        self.state.handled_count[self.hart].fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn wake_count(&self) -> u32 {
        self.state.wake_count[self.hart].load(Ordering::SeqCst)
    }
}

/// Hart 0's write handle to the barrier release gate.
pub struct Coordinator<'a, const N: usize> {
    state: &'a SelfTestState<N>,
}

impl<const N: usize> Coordinator<'_, N> {
    /// Release everyone waiting at the barrier. Returns the number of this cycle (1-based).
    pub fn open_release(&self) -> u32 {
        let cycle = self.state.barrier_cycles.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.release.store(true, Ordering::SeqCst);
        cycle
    }

    pub fn close_release(&self) {
        self.state.release.store(false, Ordering::SeqCst);
    }
}

/// The current giver's write handle to the outcome record.
pub struct Giver<'a, const N: usize> {
    state: &'a SelfTestState<N>,
}

impl<const N: usize> Giver<'_, N> {
    pub fn record(&self, configuration: Configuration, failure: Option<TestFailure>) {
        let code = failure.map_or(0, TestFailure::code);
        self.state.outcome[configuration.index()].store(code, Ordering::SeqCst);
    }
}
