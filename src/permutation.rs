//! Qubit permutation layer, `spec.md` §4.B.
//!
//! `pi[q]` is the physical bit position currently holding logical
//! qubit `q`; `pi_inv[p]` is its inverse. The two are kept in lock
//! step so both directions are O(1).

use crate::{error::EngineError, types::LogicalQubit, types::PhysicalBit};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PermutationMap {
    pi: Vec<PhysicalBit>,
    pi_inv: Vec<LogicalQubit>,
}

impl PermutationMap {
    /// The identity permutation over `num_qubits` positions.
    pub fn identity(num_qubits: usize) -> Self {
        let pi: Vec<PhysicalBit> = (0..num_qubits).collect();
        let pi_inv = pi.clone();
        Self { pi, pi_inv }
    }

    pub fn num_qubits(&self) -> usize {
        self.pi.len()
    }

    /// Physical bit position currently holding logical qubit `q`.
    #[inline]
    pub fn lookup(&self, logical: LogicalQubit) -> PhysicalBit {
        self.pi[logical]
    }

    /// Logical qubit currently held at physical bit position `p`.
    #[inline]
    pub fn inverse(&self, physical: PhysicalBit) -> LogicalQubit {
        self.pi_inv[physical]
    }

    /// Swap the physical positions of two logical qubits. Crate-private:
    /// only the interchange protocol is allowed to mutate a live
    /// permutation, always alongside the matching data move.
    pub(crate) fn swap(&mut self, a: LogicalQubit, b: LogicalQubit) {
        if a == b {
            return;
        }
        let (pa, pb) = (self.pi[a], self.pi[b]);
        self.pi.swap(a, b);
        self.pi_inv.swap(pa, pb);
    }

    /// Swap two physical bit positions, updating whichever logical
    /// qubits currently sit there. Used when the interchange protocol
    /// reasons in terms of physical positions rather than logical qubits.
    pub(crate) fn swap_physical(&mut self, pa: PhysicalBit, pb: PhysicalBit) {
        if pa == pb {
            return;
        }
        let (la, lb) = (self.pi_inv[pa], self.pi_inv[pb]);
        self.pi.swap(la, lb);
        self.pi_inv.swap(pa, pb);
    }

    /// Translate a physical-address integer (bit `p` is physical qubit
    /// `p`'s value) into the logical-address integer (bit `q` is
    /// logical qubit `q`'s value), used to turn a measurement outcome
    /// expressed in physical addressing back into the logical bit
    /// string `spec.md` §6's event output reports.
    pub fn to_logical_value(&self, physical_value: usize) -> usize {
        (0..self.num_qubits())
            .filter(|&p| physical_value & (1 << p) != 0)
            .fold(0usize, |acc, p| acc | (1 << self.inverse(p)))
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let n = self.pi.len();
        if self.pi_inv.len() != n {
            return Err(EngineError::Configuration(
                "permutation and its inverse have mismatched length".into(),
            ));
        }
        for q in 0..n {
            if self.pi_inv[self.pi[q]] != q {
                return Err(EngineError::Configuration(format!(
                    "permutation is not self-consistent at logical qubit {q}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_round_trips() {
        let pi = PermutationMap::identity(5);
        for q in 0..5 {
            assert_eq!(pi.inverse(pi.lookup(q)), q);
        }
        pi.validate().unwrap();
    }

    #[test]
    fn swap_preserves_bijection() {
        let mut pi = PermutationMap::identity(5);
        pi.swap(1, 3);
        assert_eq!(pi.lookup(1), 3);
        assert_eq!(pi.lookup(3), 1);
        pi.validate().unwrap();
        for q in 0..5 {
            assert_eq!(pi.inverse(pi.lookup(q)), q);
        }
    }

    #[test]
    fn to_logical_value_round_trips_through_a_swap() {
        let mut pi = PermutationMap::identity(3);
        pi.swap(0, 2);
        // logical qubit 0 now lives at physical position 2.
        assert_eq!(pi.to_logical_value(0b100), 0b001);
        assert_eq!(pi.to_logical_value(0b001), 0b100);
    }

    #[test]
    fn swap_physical_matches_swap() {
        let mut by_logical = PermutationMap::identity(4);
        by_logical.swap(0, 2);
        let mut by_physical = PermutationMap::identity(4);
        by_physical.swap_physical(0, 2);
        assert_eq!(by_logical, by_physical);
    }
}
