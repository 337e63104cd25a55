use bitflags::bitflags;

/// `mstatus.MIE`: the machine-mode global interrupt enable.
pub const MSTATUS_MIE: u64 = 1 << 3;

bitflags! {
    /// Machine-mode interrupt sources, laid out as the `mie`/`mip` register bits.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct InterruptSource: u64 {
        /// Machine software interrupt (MSIP), the inter-hart wake source.
        const SOFTWARE = 1 << 3;
        const TIMER = 1 << 7;
        const EXTERNAL = 1 << 11;
    }
}

impl InterruptSource {
    /// `mcause` exception code for the single source in `self`, if exactly one is set.
    pub fn cause_code(self) -> Option<u64> {
        if self.bits().count_ones() != 1 {
            return None;
        }
        Some(u64::from(self.bits().trailing_zeros()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_match_mie_bit_positions() {
        assert_eq!(InterruptSource::SOFTWARE.bits(), 0x8);
        assert_eq!(InterruptSource::TIMER.bits(), 0x80);
        assert_eq!(InterruptSource::EXTERNAL.bits(), 0x800);
        assert_eq!(MSTATUS_MIE, 0x8);
    }

    #[test]
    fn cause_code_requires_a_single_source() {
        assert_eq!(InterruptSource::SOFTWARE.cause_code(), Some(3));
        assert_eq!(InterruptSource::TIMER.cause_code(), Some(7));
        assert_eq!(InterruptSource::EXTERNAL.cause_code(), Some(11));
        assert_eq!(
            (InterruptSource::SOFTWARE | InterruptSource::TIMER).cause_code(),
            None
        );
        assert_eq!(InterruptSource::empty().cause_code(), None);
    }
}
