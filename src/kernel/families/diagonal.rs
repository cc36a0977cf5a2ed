//! Diagonal kernels: phase-shift, Z, sqrt-Z and its adjoint,
//! controlled phase-shift, and exponential Pauli-Z chains
//! (`spec.md` §4.E "Diagonal").

use crate::{
    error::EngineError,
    index_math::OperatedBits,
    kernel::apply_diagonal,
    math::{count_bits, phase_from_rad, C, C_IMAG, C_ONE},
};

/// Pauli-Z on one physical qubit.
pub fn z(slice: &mut [C], qubit: usize, local_qubits: usize) -> Result<(), EngineError> {
    let bits = OperatedBits::new(&[qubit])?;
    apply_diagonal(slice, &bits, local_qubits, &[C_ONE, -C_ONE], false);
    Ok(())
}

/// `sqrt(Z)` (the `S` gate) and its adjoint.
pub fn sqrt_z(slice: &mut [C], qubit: usize, local_qubits: usize, adjoint: bool) -> Result<(), EngineError> {
    let bits = OperatedBits::new(&[qubit])?;
    apply_diagonal(slice, &bits, local_qubits, &[C_ONE, C_IMAG], adjoint);
    Ok(())
}

/// `u1(theta)`, the single-qubit phase-shift by `theta` radians.
pub fn phase_shift(slice: &mut [C], qubit: usize, local_qubits: usize, theta: f64, adjoint: bool) -> Result<(), EngineError> {
    phase_shift_coeff(slice, qubit, local_qubits, phase_from_rad(theta), adjoint)
}

/// `u1` given an explicit complex coefficient instead of an angle
/// (`spec.md` §6 "coefficient forms").
pub fn phase_shift_coeff(slice: &mut [C], qubit: usize, local_qubits: usize, coeff: C, adjoint: bool) -> Result<(), EngineError> {
    let bits = OperatedBits::new(&[qubit])?;
    apply_diagonal(slice, &bits, local_qubits, &[C_ONE, coeff], adjoint);
    Ok(())
}

/// Controlled phase-shift: the phase fires only when every control
/// *and* the target bit are 1.
pub fn controlled_phase(
    slice: &mut [C],
    controls: &[usize],
    target: usize,
    local_qubits: usize,
    theta: f64,
    adjoint: bool,
) -> Result<(), EngineError> {
    controlled_phase_coeff(slice, controls, target, local_qubits, phase_from_rad(theta), adjoint)
}

pub fn controlled_phase_coeff(
    slice: &mut [C],
    controls: &[usize],
    target: usize,
    local_qubits: usize,
    coeff: C,
    adjoint: bool,
) -> Result<(), EngineError> {
    let mut raw: Vec<usize> = controls.to_vec();
    raw.push(target);
    let bits = OperatedBits::new(&raw)?;
    let k = bits.len();
    let full_mask = (1usize << k) - 1;
    let mut table = vec![C_ONE; 1 << k];
    table[full_mask] = coeff;
    apply_diagonal(slice, &bits, local_qubits, &table, adjoint);
    Ok(())
}

/// As [`exp_pauli_z_chain`], given the coefficient directly instead of
/// an angle (`spec.md` §6 "coefficient forms").
pub fn exp_pauli_z_chain_coeff(slice: &mut [C], qubits: &[usize], local_qubits: usize, alpha: C, adjoint: bool) -> Result<(), EngineError> {
    let bits = OperatedBits::new(qubits)?;
    let k = bits.len();
    let table: Vec<C> = (0..1usize << k)
        .map(|v| if count_bits(v) % 2 == 0 { alpha } else { alpha.conj() })
        .collect();
    apply_diagonal(slice, &bits, local_qubits, &table, adjoint);
    Ok(())
}

/// `exp(i * theta * Z_{q1} Z_{q2} ... Z_{qn})` (`spec.md` §4.E
/// tie-break rule, applied as a diagonal phase instead of a swap
/// coefficient since every factor is `Z`).
pub fn exp_pauli_z_chain(slice: &mut [C], qubits: &[usize], local_qubits: usize, theta: f64, adjoint: bool) -> Result<(), EngineError> {
    exp_pauli_z_chain_coeff(slice, qubits, local_qubits, phase_from_rad(theta), adjoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::C_ZERO;

    #[test]
    fn z_is_self_adjoint_and_involutive() {
        let mut slice = vec![C_ONE, C_ONE];
        z(&mut slice, 0, 1).unwrap();
        z(&mut slice, 0, 1).unwrap();
        assert_eq!(slice, vec![C_ONE, C_ONE]);
    }

    #[test]
    fn sqrt_z_then_adjoint_is_identity() {
        let mut slice = vec![C_ZERO, C_ONE];
        sqrt_z(&mut slice, 0, 1, false).unwrap();
        sqrt_z(&mut slice, 0, 1, true).unwrap();
        assert!((slice[1] - C_ONE).norm() < 1e-12);
    }

    #[test]
    fn controlled_phase_only_fires_when_all_bits_set() {
        let mut slice = vec![C_ONE; 4];
        controlled_phase(&mut slice, &[0], 1, 2, std::f64::consts::PI, false).unwrap();
        assert!((slice[0] - C_ONE).norm() < 1e-12);
        assert!((slice[1] - C_ONE).norm() < 1e-12);
        assert!((slice[2] - C_ONE).norm() < 1e-12);
        assert!((slice[3] - (-C_ONE)).norm() < 1e-9);
    }
}
