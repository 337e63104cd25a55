#![forbid(unsafe_code)]

//! Capability interface between the WFI wake protocol and the platform it runs on.
//!
//! Everything that is board specific (CSR encoding, the trap vector, hart start-up, delays) sits
//! behind [`Hart`] and [`Firmware`]. The protocol crate only ever talks to these traits, so the
//! same code runs on the host simulator and on a real hart backend.

pub mod firmware;
pub mod hart;
pub mod interrupts;
pub mod spin;

pub use firmware::Firmware;
pub use hart::{Hart, HartId};
pub use interrupts::{InterruptSource, MSTATUS_MIE};
pub use spin::{spin_until, Backoff, HartDelay, SpinHint};
