//! Orchestration: who gives, who takes, and in which configuration.

use std::fmt;
use std::sync::OnceLock;

use hartwake_platform::{Firmware, Hart, HartId, InterruptSource};

use crate::barrier::synchronize;
use crate::config::{ConfigError, SelfTestConfig};
use crate::outcome::{RoundReport, RoundVerdict, SelfTestResult, TakerCounts, TestFailure};
use crate::state::{Giver, SelfTestState};
use crate::wfi::{acknowledge_software_interrupt, run_wfi_cycle};

/// Global interrupt configuration a pair of rounds runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Configuration {
    /// `mstatus.MIE` clear: wakes are not trapped, takers acknowledge them.
    InterruptsDisabled,
    /// `mstatus.MIE` set: every wake traps and the handler acknowledges it.
    InterruptsEnabled,
}

impl Configuration {
    pub const COUNT: usize = 2;

    /// Execution order.
    pub const ALL: [Configuration; Self::COUNT] = [
        Configuration::InterruptsDisabled,
        Configuration::InterruptsEnabled,
    ];

    pub const fn index(self) -> usize {
        match self {
            Configuration::InterruptsDisabled => 0,
            Configuration::InterruptsEnabled => 1,
        }
    }

    /// The failure recorded when a round in this configuration does not pass.
    pub const fn failure(self) -> TestFailure {
        match self {
            Configuration::InterruptsDisabled => TestFailure::InterruptsDisabled,
            Configuration::InterruptsEnabled => TestFailure::InterruptsEnabled,
        }
    }

    /// Set the calling hart's global interrupt flag accordingly.
    pub fn apply<H: Hart + ?Sized>(self, hart: &H) {
        match self {
            Configuration::InterruptsDisabled => hart.disable_global(),
            Configuration::InterruptsEnabled => hart.enable_global(),
        }
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Configuration::InterruptsDisabled => f.write_str("interrupts-disabled"),
            Configuration::InterruptsEnabled => f.write_str("interrupts-enabled"),
        }
    }
}

/// One of the two rounds run per configuration. Each picks a different giver so that both the
/// first and the last hart issue stimuli.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Round {
    /// Hart 0 gives.
    First,
    /// Hart `N - 1` gives.
    Second,
}

impl Round {
    pub const ALL: [Round; 2] = [Round::First, Round::Second];

    pub const fn index(self) -> usize {
        match self {
            Round::First => 0,
            Round::Second => 1,
        }
    }

    pub const fn giver(self, hart_count: usize) -> HartId {
        match self {
            Round::First => HartId::PRIMARY,
            Round::Second => HartId::new(hart_count - 1),
        }
    }

    /// Every hart except the giver, in ascending order.
    pub fn takers(self, hart_count: usize) -> impl Iterator<Item = HartId> {
        let giver = self.giver(hart_count);
        (0..hart_count)
            .map(HartId::new)
            .filter(move |hart| *hart != giver)
    }
}

/// The self-test firmware for an `N`-hart machine.
///
/// Every hart runs [`WfiSelfTest::run`]. The primary hart returns the composite result code; the
/// others park in the wait state once the test is over.
pub struct WfiSelfTest<const N: usize> {
    config: SelfTestConfig,
    state: SelfTestState<N>,
    reports: [[OnceLock<RoundReport>; 2]; Configuration::COUNT],
}

impl<const N: usize> WfiSelfTest<N> {
    pub fn new(config: SelfTestConfig) -> Result<Self, ConfigError> {
        config.validate(N)?;
        Ok(Self {
            config,
            state: SelfTestState::new(),
            reports: Default::default(),
        })
    }

    pub fn config(&self) -> &SelfTestConfig {
        &self.config
    }

    pub fn state(&self) -> &SelfTestState<N> {
        &self.state
    }

    /// The giver's report for `round` of `configuration`, once that round has been judged.
    pub fn report(&self, configuration: Configuration, round: Round) -> Option<&RoundReport> {
        self.reports[configuration.index()][round.index()].get()
    }

    /// All reports judged so far, in execution order.
    pub fn reports(&self) -> Vec<&RoundReport> {
        Configuration::ALL
            .into_iter()
            .flat_map(|configuration| {
                Round::ALL
                    .into_iter()
                    .filter_map(move |round| self.report(configuration, round))
            })
            .collect()
    }

    pub fn result(&self) -> SelfTestResult {
        self.state.result()
    }

    /// Run the whole test on the calling hart.
    ///
    /// Returns the composite result code on hart 0. Never returns on any other hart.
    pub fn run<H: Hart + ?Sized>(&self, hart: &H) -> i32 {
        hart.disable_global();
        hart.clear_software(hart.hart_id());
        hart.enable_source(InterruptSource::SOFTWARE);
        synchronize(hart, &self.state);

        for configuration in Configuration::ALL {
            configuration.apply(hart);
            synchronize(hart, &self.state);
            for round in Round::ALL {
                self.play(hart, configuration, round);
                synchronize(hart, &self.state);
            }
        }
        synchronize(hart, &self.state);

        if !hart.hart_id().is_primary() {
            loop {
                hart.wait_for_interrupt();
            }
        }

        let result = self.result();
        if result.passed() {
            tracing::info!("wfi self-test passed");
        } else {
            tracing::info!(code = result.code(), failures = ?result.failures(), "wfi self-test failed");
        }
        result.code() as i32
    }

    fn play<H: Hart + ?Sized>(&self, hart: &H, configuration: Configuration, round: Round) {
        match self.state.giver(hart, round) {
            Some(giver) => self.give(hart, &giver, configuration, round),
            None => run_wfi_cycle(hart, &self.state, configuration, self.config.wfi_rounds),
        }
    }

    fn give<H: Hart + ?Sized>(
        &self,
        hart: &H,
        giver: &Giver<'_, N>,
        configuration: Configuration,
        round: Round,
    ) {
        let rounds = self.config.wfi_rounds;

        hart.delay(self.config.settle_delay);
        for burst in 1..=rounds {
            for taker in round.takers(N) {
                hart.raise_software(taker);
            }
            tracing::debug!(burst, "stimulus sent");
            hart.delay(self.config.stimulus_delay);
        }

        let takers: Vec<_> = round
            .takers(N)
            .map(|taker| TakerCounts {
                hart: taker,
                wakes: self.state.wake_count(taker),
                handled: self.state.handled_count(taker),
            })
            .collect();

        // A failure from the first round stands.
        let report = if round == Round::Second && self.state.outcome(configuration).is_some() {
            RoundReport {
                configuration,
                round,
                giver: hart.hart_id(),
                takers,
                verdict: RoundVerdict::Skipped,
            }
        } else {
            let report = RoundReport::judge(configuration, round, hart.hart_id(), rounds, takers);
            giver.record(configuration, report.failure());
            report
        };

        if let RoundVerdict::Failed { hart: taker, .. } = report.verdict {
            if let Some(counts) = report.takers.iter().find(|counts| counts.hart == taker) {
                tracing::warn!(
                    %configuration,
                    taker = %counts.hart,
                    wakes = counts.wakes,
                    handled = counts.handled,
                    expected = rounds,
                    "taker failed"
                );
            }
        }
        tracing::info!(%configuration, ?round, verdict = ?report.verdict, "round judged");

        let _ = self.reports[configuration.index()][round.index()].set(report);
    }
}

impl<H: Hart, const N: usize> Firmware<H> for WfiSelfTest<N> {
    fn main(&self, hart: &H) -> i32 {
        self.run(hart)
    }

    fn secondary_main(&self, hart: &H) {
        self.run(hart);
    }

    fn software_interrupt(&self, hart: &H) {
        acknowledge_software_interrupt(hart, &self.state);
    }

    fn hart_count(&self) -> Option<usize> {
        Some(N)
    }
}
