use std::fmt;

use hartwake_platform::HartId;

use crate::driver::{Configuration, Round};

/// Failure of one configuration. The codes are distinct so their sum identifies the failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TestFailure {
    /// Wake count or handling mismatch with interrupts globally disabled.
    InterruptsDisabled = 1,
    /// Wake count or handling mismatch with interrupts globally enabled.
    InterruptsEnabled = 2,
}

impl TestFailure {
    pub const fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(TestFailure::InterruptsDisabled),
            2 => Some(TestFailure::InterruptsEnabled),
            _ => None,
        }
    }
}

impl fmt::Display for TestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestFailure::InterruptsDisabled => {
                f.write_str("wake mismatch with interrupts globally disabled")
            }
            TestFailure::InterruptsEnabled => {
                f.write_str("wake mismatch with interrupts globally enabled")
            }
        }
    }
}

/// Composite exit code of the self-test: `0` when everything passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelfTestResult {
    code: u32,
}

impl SelfTestResult {
    pub const PASSED: SelfTestResult = SelfTestResult { code: 0 };

    pub fn from_code(code: u32) -> Self {
        Self { code }
    }

    pub fn code(self) -> u32 {
        self.code
    }

    pub fn passed(self) -> bool {
        self.code == 0
    }

    pub fn failures(self) -> Vec<TestFailure> {
        [TestFailure::InterruptsDisabled, TestFailure::InterruptsEnabled]
            .into_iter()
            .filter(|failure| self.code & failure.code() != 0)
            .collect()
    }
}

/// Counters of one taker as read by the giver at the end of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TakerCounts {
    pub hart: HartId,
    pub wakes: u32,
    pub handled: u32,
}

impl TakerCounts {
    /// Whether this taker behaved as expected for `configuration` with round length `rounds`.
    ///
    /// With interrupts disabled a taker passes with the full wake count, or with no handled
    /// interrupts at all; it fails only when it missed wakes while a handler ran. With interrupts
    /// enabled every wake must have been handled.
    pub fn passes(&self, configuration: Configuration, rounds: u32) -> bool {
        match configuration {
            Configuration::InterruptsDisabled => self.wakes == rounds || self.handled == 0,
            Configuration::InterruptsEnabled => self.wakes == rounds && self.handled == rounds,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundVerdict {
    Passed,
    /// `hart` is the first taker (in hart order) that did not pass.
    Failed { failure: TestFailure, hart: HartId },
    /// Not judged because the configuration had already failed in the first round.
    Skipped,
}

/// What the giver saw at the end of one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundReport {
    pub configuration: Configuration,
    pub round: Round,
    pub giver: HartId,
    pub takers: Vec<TakerCounts>,
    pub verdict: RoundVerdict,
}

impl RoundReport {
    /// Judge a completed round from the takers' counters.
    pub fn judge(
        configuration: Configuration,
        round: Round,
        giver: HartId,
        rounds: u32,
        takers: Vec<TakerCounts>,
    ) -> Self {
        let verdict = match takers
            .iter()
            .find(|counts| !counts.passes(configuration, rounds))
        {
            Some(counts) => RoundVerdict::Failed {
                failure: configuration.failure(),
                hart: counts.hart,
            },
            None => RoundVerdict::Passed,
        };
        Self {
            configuration,
            round,
            giver,
            takers,
            verdict,
        }
    }

    pub fn failure(&self) -> Option<TestFailure> {
        match self.verdict {
            RoundVerdict::Failed { failure, .. } => Some(failure),
            RoundVerdict::Passed | RoundVerdict::Skipped => None,
        }
    }
}
