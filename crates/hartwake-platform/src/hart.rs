use core::fmt;

use crate::interrupts::InterruptSource;

/// Identifier of a hart, in `[0, hart_count)`.
///
/// Assigned by the boot sequence and stable for the lifetime of the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HartId(usize);

impl HartId {
    /// The boot hart. It coordinates barriers and reports the final result.
    pub const PRIMARY: HartId = HartId(0);

    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }

    pub const fn is_primary(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for HartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hart{}", self.0)
    }
}

impl From<usize> for HartId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

/// Per-hart view of the platform.
///
/// A `Hart` is only ever used from the hart it describes: the enable flags it manipulates are
/// that hart's own CSRs. Cross-hart effects go exclusively through
/// [`Hart::raise_software`]/[`Hart::clear_software`], which target another hart's pending line.
///
/// Every call is an instruction boundary: if a software interrupt is pending, locally enabled and
/// the global flag is set, the platform delivers the trap to [`crate::Firmware::software_interrupt`]
/// before the call returns.
pub trait Hart {
    /// This hart's identity.
    fn hart_id(&self) -> HartId;

    /// Number of harts started by the platform.
    fn hart_count(&self) -> usize;

    /// Set `mstatus.MIE`.
    ///
    /// A software interrupt that is already pending and enabled is taken immediately.
    fn enable_global(&self);

    /// Clear `mstatus.MIE`. Pending conditions are kept; only their delivery is masked.
    fn disable_global(&self);

    fn global_enabled(&self) -> bool;

    /// Set the `mie` bits in `source`.
    fn enable_source(&self, source: InterruptSource);

    /// Clear the `mie` bits in `source`.
    fn disable_source(&self, source: InterruptSource);

    /// Set the software-interrupt pending line (MSIP) of `target`. Any hart may target any hart.
    fn raise_software(&self, target: HartId);

    /// Clear the software-interrupt pending line of `target`.
    ///
    /// Clearing an already clear line is a no-op.
    fn clear_software(&self, target: HartId);

    /// Enter the wait state (`wfi`).
    ///
    /// Returns once an interrupt that is enabled in `mie` is pending, whether or not the global
    /// flag allows the trap to be taken. Implementations may also return spuriously.
    fn wait_for_interrupt(&self);

    /// Inexact busy delay of roughly `count` platform-defined units.
    ///
    /// The delay is interruptible: pending traps are still delivered while it runs.
    fn delay(&self, count: u32);

    /// A single iteration of a spin loop.
    fn relax(&self) {
        core::hint::spin_loop();
    }

    /// Full memory fence (`fence`).
    fn fence(&self) {
        core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
    }
}
