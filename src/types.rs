//! Crate-wide scalar and identifier types shared by every component.

use crate::math::N;

/// Upper bound on the number of qubits a single fused block or kernel
/// call may operate on at once (`spec.md` §3 "Fused block").
pub const F_MAX: usize = 6;

/// A physical bit position, `0 <= p < N`, after translation through
/// the permutation map.
pub type PhysicalBit = N;

/// A logical qubit index, `0 <= q < N`, as gate arguments are given.
pub type LogicalQubit = N;

/// Identity of one simulated rank (`spec.md` §5 "inter-process" tier).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RankId(pub N);

impl RankId {
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl From<usize> for RankId {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for RankId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rank#{}", self.0)
    }
}
