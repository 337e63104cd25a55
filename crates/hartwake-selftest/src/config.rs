use thiserror::Error;

/// Wake-and-resume cycles every taker goes through per round.
pub const DEFAULT_WFI_ROUNDS: u32 = 5;

/// Delay units the giver waits for takers to reach the wait state before the first stimulus.
pub const DEFAULT_SETTLE_DELAY: u32 = 500;

/// Delay units between two stimulus bursts, for takers to count the wake and wait again.
pub const DEFAULT_STIMULUS_DELAY: u32 = 500;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("round length must be at least 1")]
    ZeroRounds,

    #[error("the self-test needs at least 2 harts, got {0}")]
    TooFewHarts(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfTestConfig {
    /// Round length: stimulus bursts per round, and wakes every taker must count.
    pub wfi_rounds: u32,
    pub settle_delay: u32,
    pub stimulus_delay: u32,
}

impl SelfTestConfig {
    pub fn validate(&self, hart_count: usize) -> Result<(), ConfigError> {
        if hart_count < 2 {
            return Err(ConfigError::TooFewHarts(hart_count));
        }
        if self.wfi_rounds == 0 {
            return Err(ConfigError::ZeroRounds);
        }
        Ok(())
    }
}

impl Default for SelfTestConfig {
    fn default() -> Self {
        Self {
            wfi_rounds: DEFAULT_WFI_ROUNDS,
            settle_delay: DEFAULT_SETTLE_DELAY,
            stimulus_delay: DEFAULT_STIMULUS_DELAY,
        }
    }
}
