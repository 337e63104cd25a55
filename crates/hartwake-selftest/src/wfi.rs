//! The taker side: counting exits from the wait state.

use hartwake_platform::Hart;

use crate::driver::Configuration;
use crate::state::SelfTestState;

/// Run one taker round: wait for `rounds` wakes, then return.
///
/// Any exit from the wait state counts, whatever caused it. With interrupts globally disabled no
/// handler runs, so the taker acknowledges its own software interrupt before waiting again; with
/// them enabled, [`acknowledge_software_interrupt`] has already done so by the time the wait
/// state returns.
pub fn run_wfi_cycle<H, const N: usize>(
    hart: &H,
    state: &SelfTestState<N>,
    configuration: Configuration,
    rounds: u32,
) where
    H: Hart + ?Sized,
{
    let ledger = state.ledger(hart);
    ledger.reset_counters();

    while ledger.wake_count() < rounds {
        hart.wait_for_interrupt();
        let wakes = ledger.record_wake();
        tracing::trace!(wakes, "woke from wfi");
        if configuration == Configuration::InterruptsDisabled {
            hart.clear_software(hart.hart_id());
        }
    }
}

/// Software interrupt handler: count the interrupt and acknowledge it.
///
/// The fence keeps the acknowledge ordered before the next wait state, which must not see the
/// line still pending.
pub fn acknowledge_software_interrupt<H, const N: usize>(hart: &H, state: &SelfTestState<N>)
where
    H: Hart + ?Sized,
{
    state.ledger(hart).record_handled();
    hart.clear_software(hart.hart_id());
    hart.fence();
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Duration;

    use hartwake_platform::{Firmware, HartId, InterruptSource};
    use hartwake_sim::{Machine, MachineConfig, SimHart};

    fn machine() -> Machine {
        Machine::new(MachineConfig {
            hart_count: 2,
            delay_quantum: Duration::from_micros(20),
            watchdog: Some(Duration::from_secs(10)),
        })
        .unwrap()
    }

    /// Hart 1 pre-raises its own line, so its first wait returns straight away.
    struct SelfWake {
        state: SelfTestState<2>,
    }

    impl Firmware<SimHart> for SelfWake {
        fn main(&self, hart: &SimHart) -> i32 {
            loop {
                hart.wait_for_interrupt();
            }
        }

        fn secondary_main(&self, hart: &SimHart) {
            hart.disable_global();
            hart.enable_source(InterruptSource::SOFTWARE);
            hart.raise_software(hart.hart_id());

            run_wfi_cycle(hart, &self.state, Configuration::InterruptsDisabled, 1);
            assert!(!hart.software_pending(), "taker acknowledges its own line");
            panic!("cycle done");
        }
    }

    #[test]
    fn any_wake_counts_and_is_acknowledged_by_the_taker_when_masked() {
        let firmware = Arc::new(SelfWake {
            state: SelfTestState::new(),
        });
        let err = machine().boot(firmware.clone()).unwrap_err();
        assert!(err.to_string().contains("cycle done"), "{err}");
        assert_eq!(firmware.state.wake_count(HartId::new(1)), 1);
        assert_eq!(firmware.state.handled_count(HartId::new(1)), 0);
    }

    /// Hart 0 wakes hart 1 `ROUNDS` times with interrupts enabled on hart 1.
    struct HandledWakes {
        state: SelfTestState<2>,
    }

    const ROUNDS: u32 = 3;

    impl Firmware<SimHart> for HandledWakes {
        fn main(&self, hart: &SimHart) -> i32 {
            hart.delay(500);
            for _ in 0..ROUNDS {
                hart.raise_software(HartId::new(1));
                hart.delay(500);
            }
            0
        }

        fn secondary_main(&self, hart: &SimHart) {
            hart.enable_source(InterruptSource::SOFTWARE);
            hart.enable_global();
            run_wfi_cycle(hart, &self.state, Configuration::InterruptsEnabled, ROUNDS);
            loop {
                hart.wait_for_interrupt();
            }
        }

        fn software_interrupt(&self, hart: &SimHart) {
            acknowledge_software_interrupt(hart, &self.state);
        }
    }

    #[test]
    fn every_wake_is_matched_by_a_handled_interrupt_when_enabled() {
        let firmware = Arc::new(HandledWakes {
            state: SelfTestState::new(),
        });
        let report = machine().boot(firmware.clone()).unwrap();
        assert_eq!(report.exit_code, 0);
        assert_eq!(firmware.state.wake_count(HartId::new(1)), ROUNDS);
        assert_eq!(firmware.state.handled_count(HartId::new(1)), ROUNDS);
        assert_eq!(report.traps, vec![0, u64::from(ROUNDS)]);
    }
}
