use std::cell::Cell;
use std::panic;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use hartwake_platform::{Firmware, Hart, HartId, InterruptSource, MSTATUS_MIE};

use crate::clint::WaitExit;
use crate::machine::MachineShared;

/// Longest uninterrupted sleep inside [`Hart::delay`]; traps are polled at least this often.
const DELAY_POLL_SLICE: Duration = Duration::from_millis(1);

/// Coarse execution state of a hart, as seen from outside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HartState {
    Running = 0,
    /// In the wait state.
    Waiting = 1,
    /// Executing the software interrupt handler.
    InTrap = 2,
    /// The hart's entry point returned or the hart was powered off.
    Stopped = 3,
}

impl HartState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => HartState::Running,
            1 => HartState::Waiting,
            2 => HartState::InTrap,
            _ => HartState::Stopped,
        }
    }
}

/// Point-in-time view of one hart, used for hang diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HartSnapshot {
    pub hart: HartId,
    pub state: HartState,
    pub msip: bool,
    /// Software interrupt traps delivered so far.
    pub traps: u64,
}

/// Shared, externally observable per-hart bookkeeping.
#[derive(Debug)]
pub(crate) struct HartMonitor {
    state: AtomicU8,
    traps: AtomicU64,
}

impl HartMonitor {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(HartState::Running as u8),
            traps: AtomicU64::new(0),
        }
    }

    pub(crate) fn state(&self) -> HartState {
        HartState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn set_state(&self, state: HartState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub(crate) fn traps(&self) -> u64 {
        self.traps.load(Ordering::SeqCst)
    }
}

/// Unwind payload used to stop a hart thread at power-off.
pub(crate) struct PowerOff;

/// A simulated hart. Only usable from the thread that runs it.
///
/// The CSR state (`mstatus.MIE`, `mie`) lives in the hart itself; the pending lines live in the
/// machine's [`crate::SoftwareInterruptLines`].
pub struct SimHart {
    id: HartId,
    machine: Arc<MachineShared>,
    firmware: Arc<dyn Firmware<SimHart>>,
    mstatus: Cell<u64>,
    mie: Cell<InterruptSource>,
}

impl SimHart {
    pub(crate) fn new(
        id: HartId,
        machine: Arc<MachineShared>,
        firmware: Arc<dyn Firmware<SimHart>>,
    ) -> Self {
        Self {
            id,
            machine,
            firmware,
            mstatus: Cell::new(0),
            mie: Cell::new(InterruptSource::empty()),
        }
    }

    /// The `mie` bits currently set on this hart.
    pub fn enabled_sources(&self) -> InterruptSource {
        self.mie.get()
    }

    /// Whether this hart's own software interrupt line is pending.
    pub fn software_pending(&self) -> bool {
        self.machine.lines.is_pending(self.id)
    }

    fn monitor(&self) -> &HartMonitor {
        &self.machine.harts[self.id.index()]
    }

    fn check_power(&self) {
        if self.machine.lines.is_powered_off() {
            self.monitor().set_state(HartState::Stopped);
            panic::resume_unwind(Box::new(PowerOff));
        }
    }

    fn software_trap_ready(&self) -> bool {
        self.mstatus.get() & MSTATUS_MIE != 0
            && self.mie.get().contains(InterruptSource::SOFTWARE)
            && self.software_pending()
    }

    /// Take every trap that is currently deliverable.
    ///
    /// A handler that does not acknowledge its line traps again straight away, exactly like a
    /// level-triggered source on hardware.
    fn take_pending_traps(&self) {
        self.check_power();
        while self.software_trap_ready() {
            self.trap();
            self.check_power();
            thread::yield_now();
        }
    }

    fn trap(&self) {
        // mstatus.MPIE <- MIE, MIE <- 0; `mret` restores it.
        let saved = self.mstatus.get();
        self.mstatus.set(saved & !MSTATUS_MIE);
        self.monitor().set_state(HartState::InTrap);
        tracing::trace!(
            hart = %self.id,
            mcause = ?InterruptSource::SOFTWARE.cause_code(),
            "software interrupt trap"
        );

        self.firmware.software_interrupt(self);

        self.monitor().traps.fetch_add(1, Ordering::SeqCst);
        self.monitor().set_state(HartState::Running);
        self.mstatus.set(saved);
    }
}

impl Hart for SimHart {
    fn hart_id(&self) -> HartId {
        self.id
    }

    fn hart_count(&self) -> usize {
        self.machine.harts.len()
    }

    fn enable_global(&self) {
        self.mstatus.set(self.mstatus.get() | MSTATUS_MIE);
        self.take_pending_traps();
    }

    fn disable_global(&self) {
        self.mstatus.set(self.mstatus.get() & !MSTATUS_MIE);
    }

    fn global_enabled(&self) -> bool {
        self.mstatus.get() & MSTATUS_MIE != 0
    }

    fn enable_source(&self, source: InterruptSource) {
        self.mie.set(self.mie.get() | source);
        self.take_pending_traps();
    }

    fn disable_source(&self, source: InterruptSource) {
        self.mie.set(self.mie.get() - source);
    }

    fn raise_software(&self, target: HartId) {
        tracing::trace!(hart = %self.id, %target, "raise msip");
        self.machine.lines.raise(target);
        self.take_pending_traps();
    }

    fn clear_software(&self, target: HartId) {
        self.machine.lines.clear(target);
    }

    fn wait_for_interrupt(&self) {
        self.take_pending_traps();

        let enabled = self.mie.get().contains(InterruptSource::SOFTWARE);
        self.monitor().set_state(HartState::Waiting);
        let exit = self.machine.lines.wait(self.id, enabled);
        self.monitor().set_state(HartState::Running);
        if exit == WaitExit::PoweredOff {
            self.check_power();
        }

        self.take_pending_traps();
    }

    fn delay(&self, count: u32) {
        let deadline = Instant::now() + self.machine.config.delay_quantum * count;
        loop {
            self.take_pending_traps();
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(DELAY_POLL_SLICE));
        }
    }

    fn relax(&self) {
        self.take_pending_traps();
        std::hint::spin_loop();
        thread::yield_now();
    }
}
