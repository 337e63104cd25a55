#![forbid(unsafe_code)]

use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use hartwake_selftest::{
    SelfTestConfig, WfiSelfTest, DEFAULT_SETTLE_DELAY, DEFAULT_STIMULUS_DELAY, DEFAULT_WFI_ROUNDS,
};
use hartwake_sim::{Machine, MachineConfig, MachineError};
use tracing_subscriber::EnvFilter;

/// Exit code for a hang or any other machine-level error, as opposed to a test verdict.
const MACHINE_ERROR_EXIT: i32 = 101;

/// Hart counts the self-test is instantiated for.
const SUPPORTED_HARTS: [usize; 4] = [2, 3, 4, 8];

#[derive(Parser, Debug)]
#[command(
    name = "hartwake",
    version,
    about = "Run the multi-hart WFI wake self-test on a simulated machine."
)]
struct Args {
    /// Number of harts (2, 3, 4 or 8)
    #[arg(long, default_value_t = 4, value_parser = parse_harts)]
    harts: usize,

    /// Wakes every taker must count per round
    #[arg(long, value_name = "N", default_value_t = DEFAULT_WFI_ROUNDS)]
    rounds: u32,

    /// Delay units the giver waits before the first stimulus of a round
    #[arg(long, value_name = "UNITS", default_value_t = DEFAULT_SETTLE_DELAY)]
    settle_delay: u32,

    /// Delay units between two stimulus bursts
    #[arg(long, value_name = "UNITS", default_value_t = DEFAULT_STIMULUS_DELAY)]
    stimulus_delay: u32,

    /// Wall-clock length of one delay unit, in microseconds
    #[arg(long, value_name = "US", default_value_t = 20)]
    delay_quantum_us: u64,

    /// Give up on a hung test after this many milliseconds (0 waits forever)
    #[arg(long, value_name = "MS", default_value_t = 30_000)]
    watchdog_ms: u64,

    /// Log filter (tracing-subscriber EnvFilter syntax).
    ///
    /// Environment variable: `HARTWAKE_LOG`.
    #[arg(long, env = "HARTWAKE_LOG", default_value = "info")]
    log_level: String,
}

fn parse_harts(raw: &str) -> Result<usize, String> {
    let harts: usize = raw.parse().map_err(|err| format!("{err}"))?;
    if SUPPORTED_HARTS.contains(&harts) {
        Ok(harts)
    } else {
        Err(format!("supported hart counts are {SUPPORTED_HARTS:?}"))
    }
}

fn main() {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(code) => process::exit(code),
        Err(err) => {
            tracing::error!("{err:#}");
            process::exit(MACHINE_ERROR_EXIT);
        }
    }
}

fn run(args: &Args) -> anyhow::Result<i32> {
    let config = SelfTestConfig {
        wfi_rounds: args.rounds,
        settle_delay: args.settle_delay,
        stimulus_delay: args.stimulus_delay,
    };
    let machine = Machine::new(MachineConfig {
        hart_count: args.harts,
        delay_quantum: Duration::from_micros(args.delay_quantum_us),
        watchdog: (args.watchdog_ms != 0).then(|| Duration::from_millis(args.watchdog_ms)),
    })
    .context("configure machine")?;

    match args.harts {
        2 => run_self_test::<2>(&machine, config),
        3 => run_self_test::<3>(&machine, config),
        4 => run_self_test::<4>(&machine, config),
        8 => run_self_test::<8>(&machine, config),
        other => bail!("no self-test image for {other} harts"),
    }
}

fn run_self_test<const N: usize>(machine: &Machine, config: SelfTestConfig) -> anyhow::Result<i32> {
    let test = Arc::new(WfiSelfTest::<N>::new(config).context("invalid self-test config")?);

    let report = match machine.boot(test.clone()) {
        Ok(report) => report,
        Err(err) => {
            if let MachineError::Watchdog { harts, .. } = &err {
                for snapshot in harts {
                    tracing::error!(
                        hart = %snapshot.hart,
                        state = ?snapshot.state,
                        msip = snapshot.msip,
                        traps = snapshot.traps,
                        "hart state at watchdog expiry"
                    );
                }
            }
            return Err(err).context(format!("{N}-hart self-test did not complete"));
        }
    };

    for round in test.reports() {
        println!(
            "{:<20} {:<7} giver {}: {:?}",
            round.configuration.to_string(),
            format!("{:?}", round.round),
            round.giver,
            round.verdict
        );
    }

    let result = test.result();
    if result.passed() {
        println!("PASS ({N} harts, {:?})", report.elapsed);
    } else {
        println!("FAIL code {} {:?}", result.code(), result.failures());
    }
    Ok(report.exit_code)
}
