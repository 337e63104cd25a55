#![forbid(unsafe_code)]

//! Multi-hart WFI wake self-test.
//!
//! Every hart runs the same [`WfiSelfTest`] image. Harts line up at a shared barrier, then take
//! turns: one hart (the *giver*) repeatedly raises the software interrupt of all others (the
//! *takers*), which sit in the wait state counting wakes. The exercise runs once with machine
//! interrupts globally disabled (takers acknowledge the line themselves) and once with them
//! enabled (the handler acknowledges it), each time first with hart 0 and then with the last hart
//! as the giver.
//!
//! The primary hart returns `0` when both configurations pass, otherwise the sum of the
//! per-configuration failure codes ([`TestFailure::code`]).

pub mod barrier;
pub mod config;
pub mod driver;
pub mod outcome;
pub mod state;
pub mod wfi;

pub use barrier::synchronize;
pub use config::{
    ConfigError, SelfTestConfig, DEFAULT_SETTLE_DELAY, DEFAULT_STIMULUS_DELAY, DEFAULT_WFI_ROUNDS,
};
pub use driver::{Configuration, Round, WfiSelfTest};
pub use outcome::{RoundReport, RoundVerdict, SelfTestResult, TakerCounts, TestFailure};
pub use state::{Coordinator, Giver, HartLedger, SelfTestState};
pub use wfi::{acknowledge_software_interrupt, run_wfi_cycle};

#[cfg(test)]
pub(crate) mod testing;
