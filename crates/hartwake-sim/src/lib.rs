#![forbid(unsafe_code)]

//! Host-side multi-hart machine implementing the `hartwake-platform` capability traits.
//!
//! Each hart runs on its own OS thread. The wait state is a sleep on the hart's software
//! interrupt pending line, and traps are delivered at the points where real hardware could take
//! them: around the wait state, on a global enable, and inside delays and spin polls.
//!
//! A hang of the booted firmware is turned into [`MachineError::Watchdog`]; the machine then
//! powers off, which unwinds every hart at its next platform call.

mod clint;
mod error;
mod hart;
mod machine;

pub use clint::SoftwareInterruptLines;
pub use error::{MachineError, Result};
pub use hart::{HartSnapshot, HartState, SimHart};
pub use machine::{ExitReport, Machine, MachineConfig, MAX_HARTS};
