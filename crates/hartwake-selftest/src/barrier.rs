//! Reusable all-hart rendezvous.
//!
//! Every hart raises its check-in flag. Hart 0 waits for all `N` flags and opens the release
//! gate; the other harts wait for the gate, then lower their flag. Hart 0 keeps the gate open
//! until every flag is down again and only then closes it, so the barrier is back in its idle
//! state (gate closed, no flags) before hart 0 leaves.
//!
//! A hart re-entering before hart 0 has closed the gate would otherwise walk straight through
//! the previous cycle's open gate, so non-coordinators wait for the gate to close before
//! checking in.

use hartwake_platform::{spin_until, Hart, HartDelay, SpinHint};

use crate::state::SelfTestState;

/// Block until all `N` harts have called `synchronize` for the current cycle.
pub fn synchronize<H, const N: usize>(hart: &H, state: &SelfTestState<N>)
where
    H: Hart + ?Sized,
{
    let ledger = state.ledger(hart);

    match state.coordinator(hart) {
        Some(coordinator) => {
            ledger.check_in();
            spin_until(hart, &mut SpinHint, || state.checked_in_count() == N);

            let cycle = coordinator.open_release();
            tracing::debug!(cycle, "barrier released");

            ledger.check_out();
            spin_until(hart, &mut SpinHint, || state.checked_in_count() == 0);
            coordinator.close_release();
        }
        None => {
            // Stagger the pollers by hart id to spread the load on the shared flags.
            let mut backoff = HartDelay(hart.hart_id().index() as u32);

            spin_until(hart, &mut backoff, || !state.release_open());
            ledger.check_in();
            spin_until(hart, &mut backoff, || state.release_open());
            ledger.check_out();
        }
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use hartwake_platform::Firmware;
    use hartwake_sim::{Machine, MachineConfig, SimHart};

    const CYCLES: usize = 20;

    /// Every hart passes the barrier `CYCLES` times and checks nobody is left behind.
    struct BarrierLoop<const N: usize> {
        state: SelfTestState<N>,
        arrivals: [AtomicU32; CYCLES],
        early_exits: AtomicU32,
    }

    impl<const N: usize> BarrierLoop<N> {
        fn new() -> Self {
            Self {
                state: SelfTestState::new(),
                arrivals: std::array::from_fn(|_| AtomicU32::new(0)),
                early_exits: AtomicU32::new(0),
            }
        }

        fn run(&self, hart: &SimHart) {
            for (cycle, arrivals) in self.arrivals.iter().enumerate() {
                arrivals.fetch_add(1, Ordering::SeqCst);
                // Uneven arrival times.
                hart.delay(((hart.hart_id().index() + cycle) % 3) as u32 * 10);
                synchronize(hart, &self.state);
                if arrivals.load(Ordering::SeqCst) != N as u32 {
                    self.early_exits.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
    }

    impl<const N: usize> Firmware<SimHart> for BarrierLoop<N> {
        fn main(&self, hart: &SimHart) -> i32 {
            self.run(hart);
            0
        }

        fn secondary_main(&self, hart: &SimHart) {
            self.run(hart);
        }
    }

    fn run_barrier_loop<const N: usize>() -> Arc<BarrierLoop<N>> {
        let machine = Machine::new(MachineConfig {
            hart_count: N,
            delay_quantum: Duration::from_micros(10),
            watchdog: Some(Duration::from_secs(20)),
        })
        .unwrap();
        let firmware = Arc::new(BarrierLoop::<N>::new());
        machine.boot(firmware.clone()).unwrap();
        firmware
    }

    #[test]
    fn no_hart_leaves_before_all_arrived() {
        let firmware = run_barrier_loop::<4>();
        assert_eq!(firmware.early_exits.load(Ordering::SeqCst), 0);
        assert_eq!(firmware.state.barrier_cycles(), CYCLES as u32);
    }

    #[test]
    fn barrier_is_idle_after_every_cycle() {
        let firmware = run_barrier_loop::<3>();
        // Hart 0 exits last from the final cycle, after closing the gate.
        assert!(!firmware.state.release_open());
        assert_eq!(firmware.state.checked_in_count(), 0);
    }

    #[test]
    fn two_harts_are_enough() {
        let firmware = run_barrier_loop::<2>();
        assert_eq!(firmware.early_exits.load(Ordering::SeqCst), 0);
    }
}

#[cfg(all(test, feature = "loom"))]
mod loom_tests {
    use super::*;

    use loom::sync::atomic::{AtomicU32, Ordering};
    use loom::sync::Arc;
    use loom::thread;

    use crate::testing::FixedHart;

    const CYCLES: usize = 2;

    #[test]
    fn barrier_releases_only_after_every_check_in() {
        let mut builder = loom::model::Builder::new();
        builder.preemption_bound = Some(3);
        builder.check(|| {
            let state = Arc::new(SelfTestState::<2>::new());
            let arrivals = Arc::new([AtomicU32::new(0), AtomicU32::new(0)]);

            let secondary = {
                let state = state.clone();
                let arrivals = arrivals.clone();
                thread::spawn(move || {
                    let hart = FixedHart::new(1);
                    for arrived in arrivals.iter().take(CYCLES) {
                        arrived.fetch_add(1, Ordering::SeqCst);
                        synchronize(&hart, &*state);
                        assert_eq!(arrived.load(Ordering::SeqCst), 2);
                    }
                })
            };

            let hart = FixedHart::new(0);
            for arrived in arrivals.iter().take(CYCLES) {
                arrived.fetch_add(1, Ordering::SeqCst);
                synchronize(&hart, &*state);
                assert_eq!(arrived.load(Ordering::SeqCst), 2);
            }

            secondary.join().unwrap();
            assert!(!state.release_open());
            assert_eq!(state.checked_in_count(), 0);
        });
    }
}
