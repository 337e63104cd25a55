//! Multi-hart WFI wake self-test and the simulated machine it runs on.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use hartwake::selftest::{SelfTestConfig, WfiSelfTest};
//! use hartwake::sim::{Machine, MachineConfig};
//!
//! let machine = Machine::new(MachineConfig::default())?;
//! let test = Arc::new(WfiSelfTest::<4>::new(SelfTestConfig::default())?);
//! let report = machine.boot(test.clone())?;
//! assert_eq!(report.exit_code, 0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use hartwake_platform as platform;
pub use hartwake_selftest as selftest;
pub use hartwake_sim as sim;
