use crate::hart::Hart;

/// Program image booted on every hart of a platform.
///
/// The default methods stand in for the weak symbols a C runtime would provide: a firmware that
/// does not care about secondary harts or software interrupts only implements [`Firmware::main`].
pub trait Firmware<H: Hart>: Send + Sync {
    /// Entry point of the primary hart. The return value is the program's exit code.
    fn main(&self, hart: &H) -> i32;

    /// Entry point of every hart except the primary one.
    ///
    /// By default secondary harts park in the wait state forever.
    fn secondary_main(&self, hart: &H) {
        loop {
            hart.wait_for_interrupt();
        }
    }

    /// Machine software interrupt handler, run on the interrupted hart with `mstatus.MIE` masked.
    ///
    /// The handler owns acknowledging the source: the default does nothing, so a pending line
    /// that nobody clears traps again as soon as the handler returns.
    fn software_interrupt(&self, hart: &H) {
        let _ = hart;
    }

    /// Number of harts the image was built for, if it was built for a fixed count.
    fn hart_count(&self) -> Option<usize> {
        None
    }
}
