mod harness;

use std::sync::Arc;
use std::time::Duration;

use hartwake::platform::{Firmware, Hart, HartId};
use hartwake::selftest::{Configuration, Round, RoundVerdict, TestFailure, WfiSelfTest};
use hartwake::sim::SimHart;
use pretty_assertions::assert_eq;

const ROUNDS: u32 = 2;
const DOUBLE_COUNTER: HartId = HartId::new(1);

/// The self-test with a handler on hart 1 that counts every interrupt twice but acknowledges it.
struct DoubleCount {
    inner: WfiSelfTest<3>,
}

impl Firmware<SimHart> for DoubleCount {
    fn main(&self, hart: &SimHart) -> i32 {
        self.inner.run(hart)
    }

    fn secondary_main(&self, hart: &SimHart) {
        self.inner.run(hart);
    }

    fn software_interrupt(&self, hart: &SimHart) {
        if hart.hart_id() == DOUBLE_COUNTER {
            self.inner.state().ledger(hart).record_handled();
        }
        Firmware::<SimHart>::software_interrupt(&self.inner, hart);
    }

    fn hart_count(&self) -> Option<usize> {
        Some(3)
    }
}

#[test]
fn second_round_is_skipped_once_the_first_has_failed() {
    let machine = harness::machine(3, Duration::from_secs(60));
    let firmware = Arc::new(DoubleCount {
        inner: WfiSelfTest::new(harness::fast_config(ROUNDS)).unwrap(),
    });

    let report = machine.boot(firmware.clone()).unwrap();
    assert_eq!(report.exit_code, 2);

    let test = &firmware.inner;
    assert_eq!(
        test.state().outcome(Configuration::InterruptsEnabled),
        Some(TestFailure::InterruptsEnabled)
    );
    assert_eq!(test.state().outcome(Configuration::InterruptsDisabled), None);

    let first = test
        .report(Configuration::InterruptsEnabled, Round::First)
        .unwrap();
    assert_eq!(
        first.verdict,
        RoundVerdict::Failed {
            failure: TestFailure::InterruptsEnabled,
            hart: DOUBLE_COUNTER,
        }
    );

    // Takers still ran the second round, but its counts were not judged.
    let second = test
        .report(Configuration::InterruptsEnabled, Round::Second)
        .unwrap();
    assert_eq!(second.verdict, RoundVerdict::Skipped);
    assert_eq!(second.giver, HartId::new(2));
    assert!(second.takers.iter().all(|counts| counts.wakes == ROUNDS));
}
