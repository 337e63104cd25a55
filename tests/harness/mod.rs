#![allow(dead_code)]

use std::sync::Once;
use std::time::Duration;

use hartwake::selftest::SelfTestConfig;
use hartwake::sim::{Machine, MachineConfig};

pub const QUANTUM: Duration = Duration::from_micros(20);

/// Short delays so a full run takes well under a second per configuration.
pub fn fast_config(wfi_rounds: u32) -> SelfTestConfig {
    SelfTestConfig {
        wfi_rounds,
        settle_delay: 500,
        stimulus_delay: 250,
    }
}

pub fn machine(hart_count: usize, watchdog: Duration) -> Machine {
    init_tracing();
    Machine::new(MachineConfig {
        hart_count,
        delay_quantum: QUANTUM,
        watchdog: Some(watchdog),
    })
    .expect("valid machine config")
}

/// Route logs through the test writer; set `RUST_LOG` to see them.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
