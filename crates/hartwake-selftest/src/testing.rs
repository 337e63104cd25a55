//! Test doubles shared by the unit tests.

use hartwake_platform::{Hart, HartId, InterruptSource};

/// A hart with a fixed id and no interrupt hardware. Delays and spin polls just yield.
pub(crate) struct FixedHart {
    id: HartId,
}

impl FixedHart {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            id: HartId::new(index),
        }
    }
}

impl Hart for FixedHart {
    fn hart_id(&self) -> HartId {
        self.id
    }

    fn hart_count(&self) -> usize {
        self.id.index() + 1
    }

    fn enable_global(&self) {}

    fn disable_global(&self) {}

    fn global_enabled(&self) -> bool {
        false
    }

    fn enable_source(&self, _source: InterruptSource) {}

    fn disable_source(&self, _source: InterruptSource) {}

    fn raise_software(&self, _target: HartId) {}

    fn clear_software(&self, _target: HartId) {}

    fn wait_for_interrupt(&self) {
        test_yield();
    }

    fn delay(&self, _count: u32) {
        test_yield();
    }

    fn relax(&self) {
        test_yield();
    }
}

#[cfg(feature = "loom")]
fn test_yield() {
    loom::thread::yield_now();
}

#[cfg(not(feature = "loom"))]
fn test_yield() {
    std::thread::yield_now();
}
