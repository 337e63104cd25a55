use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use hartwake_platform::{Firmware, HartId};

use crate::clint::SoftwareInterruptLines;
use crate::error::{MachineError, Result};
use crate::hart::{HartMonitor, HartSnapshot, HartState, PowerOff, SimHart};

/// Largest machine that can be configured.
pub const MAX_HARTS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineConfig {
    /// Number of harts started at boot. Must be in `1..=MAX_HARTS`.
    pub hart_count: usize,
    /// Host time represented by one unit of [`hartwake_platform::Hart::delay`].
    pub delay_quantum: Duration,
    /// How long the primary hart may run before the boot is declared hung.
    ///
    /// `None` waits forever, which is only useful under an external timeout.
    pub watchdog: Option<Duration>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            hart_count: 4,
            delay_quantum: Duration::from_micros(20),
            watchdog: Some(Duration::from_secs(30)),
        }
    }
}

/// Result of a completed boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitReport {
    /// Value returned by the primary hart's [`Firmware::main`].
    pub exit_code: i32,
    /// Software interrupt traps delivered per hart.
    pub traps: Vec<u64>,
    pub elapsed: Duration,
}

pub(crate) struct MachineShared {
    pub(crate) config: MachineConfig,
    pub(crate) lines: SoftwareInterruptLines,
    pub(crate) harts: Box<[HartMonitor]>,
}

impl MachineShared {
    fn snapshot(&self) -> Vec<HartSnapshot> {
        self.harts
            .iter()
            .enumerate()
            .map(|(idx, monitor)| {
                let hart = HartId::new(idx);
                HartSnapshot {
                    hart,
                    state: monitor.state(),
                    msip: self.lines.is_pending(hart),
                    traps: monitor.traps(),
                }
            })
            .collect()
    }
}

enum HartEvent {
    Exited { code: i32 },
    Returned,
    PoweredOff,
    Panicked { hart: HartId, message: String },
}

/// A multi-hart machine that boots a [`Firmware`] image on host threads.
#[derive(Debug, Clone)]
pub struct Machine {
    config: MachineConfig,
}

impl Machine {
    pub fn new(config: MachineConfig) -> Result<Self> {
        if config.hart_count == 0 || config.hart_count > MAX_HARTS {
            return Err(MachineError::InvalidHartCount(config.hart_count));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn hart_count(&self) -> usize {
        self.config.hart_count
    }

    /// Start every hart on `firmware` and wait for the primary hart to exit.
    ///
    /// Hart 0 runs [`Firmware::main`]; all others run [`Firmware::secondary_main`]. Once the
    /// primary returns, the watchdog fires, or any hart panics, the machine is powered off and all
    /// hart threads are joined before this returns.
    pub fn boot<F>(&self, firmware: Arc<F>) -> Result<ExitReport>
    where
        F: Firmware<SimHart> + 'static,
    {
        if let Some(expected) = firmware.hart_count() {
            if expected != self.config.hart_count {
                return Err(MachineError::HartCountMismatch {
                    expected,
                    actual: self.config.hart_count,
                });
            }
        }

        let firmware: Arc<dyn Firmware<SimHart>> = firmware;
        let shared = Arc::new(MachineShared {
            config: self.config.clone(),
            lines: SoftwareInterruptLines::new(self.config.hart_count),
            harts: (0..self.config.hart_count)
                .map(|_| HartMonitor::new())
                .collect(),
        });

        tracing::debug!(harts = self.config.hart_count, "booting machine");
        let start = Instant::now();
        let (events_tx, events) = mpsc::channel();
        let mut handles = Vec::with_capacity(self.config.hart_count);
        for idx in 0..self.config.hart_count {
            let hart = HartId::new(idx);
            let hart_shared = shared.clone();
            let firmware = firmware.clone();
            let events_tx = events_tx.clone();
            let spawned = thread::Builder::new()
                .name(hart.to_string())
                .spawn(move || {
                    let event = run_hart(hart, hart_shared.clone(), firmware);
                    hart_shared.harts[hart.index()].set_state(HartState::Stopped);
                    let _ = events_tx.send(event);
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    shutdown(&shared, handles);
                    return Err(MachineError::Spawn { hart, source });
                }
            }
        }
        drop(events_tx);

        let outcome = self.wait_for_exit(&shared, &events);
        let traps = shared.harts.iter().map(HartMonitor::traps).collect();
        shutdown(&shared, handles);

        let exit_code = outcome?;
        let elapsed = start.elapsed();
        tracing::debug!(exit_code, ?elapsed, "machine powered off");
        Ok(ExitReport {
            exit_code,
            traps,
            elapsed,
        })
    }

    fn wait_for_exit(&self, shared: &MachineShared, events: &Receiver<HartEvent>) -> Result<i32> {
        let deadline = self.config.watchdog.map(|timeout| Instant::now() + timeout);
        loop {
            let event = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    events.recv_timeout(remaining)
                }
                None => events.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match event {
                Ok(HartEvent::Exited { code }) => return Ok(code),
                Ok(HartEvent::Returned | HartEvent::PoweredOff) => continue,
                Ok(HartEvent::Panicked { hart, message }) => {
                    return Err(MachineError::HartPanicked { hart, message })
                }
                Err(RecvTimeoutError::Timeout) => {
                    let harts = shared.snapshot();
                    let timeout = self.config.watchdog.unwrap_or_default();
                    tracing::error!(?timeout, ?harts, "watchdog expired");
                    return Err(MachineError::Watchdog { timeout, harts });
                }
                Err(RecvTimeoutError::Disconnected) => return Err(MachineError::NoExitCode),
            }
        }
    }
}

fn run_hart(
    hart: HartId,
    shared: Arc<MachineShared>,
    firmware: Arc<dyn Firmware<SimHart>>,
) -> HartEvent {
    let span = tracing::debug_span!("hart", id = hart.index());
    let _enter = span.enter();

    let sim = SimHart::new(hart, shared, firmware.clone());
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        if hart.is_primary() {
            Some(firmware.main(&sim))
        } else {
            firmware.secondary_main(&sim);
            None
        }
    }));

    match result {
        Ok(Some(code)) => HartEvent::Exited { code },
        Ok(None) => HartEvent::Returned,
        Err(payload) if payload.is::<PowerOff>() => HartEvent::PoweredOff,
        Err(payload) => HartEvent::Panicked {
            hart,
            message: panic_message(payload.as_ref()),
        },
    }
}

fn shutdown(shared: &MachineShared, handles: Vec<JoinHandle<()>>) {
    shared.lines.power_off();
    for handle in handles {
        // Hart bodies catch their own unwinds.
        let _ = handle.join();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
