//! Shift-indexed circular RHS history.
//!
//! Each level keeps three RHS generations in three fixed storage slots.
//! Instead of moving data, a shift index selects which slot the next RHS
//! evaluation overwrites:
//!
//! - `slot(k) = (shift + k) % 3`
//! - the kernels write `slot(0)`, the current generation
//! - after the full update the shift advances by one
//!
//! Right after a write to `slot(0)` the slots hold, in order,
//! f(t), f(t - 2h), f(t - h). [`ShiftRing::previous`] names the older
//! generations by age.

/// Number of RHS generations kept per level.
pub const N_GENERATIONS: usize = 3;

/// Shift index of one level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShiftRing(usize);

impl ShiftRing {
    /// Ring starting at shift 0.
    pub fn new() -> Self {
        Self(0)
    }

    /// Raw shift value in `0..3`.
    #[inline]
    pub fn shift(self) -> usize {
        self.0
    }

    /// Slot of generation offset `k`.
    #[inline]
    pub fn slot(self, k: usize) -> usize {
        (self.0 + k) % N_GENERATIONS
    }

    /// Slot the next RHS evaluation writes.
    #[inline]
    pub fn current(self) -> usize {
        self.0
    }

    /// Slot holding the RHS from `age` steps before the current one
    /// (`age` in `1..3`).
    #[inline]
    pub fn previous(self, age: usize) -> usize {
        (self.0 + N_GENERATIONS - age % N_GENERATIONS) % N_GENERATIONS
    }

    /// Rotate once; called exactly once per completed full update.
    #[inline]
    pub fn advance(&mut self) {
        self.0 = (self.0 + 1) % N_GENERATIONS;
    }
}
