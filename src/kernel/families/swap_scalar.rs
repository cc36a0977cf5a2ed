//! Swap-with-scalar kernels: X, Y, CNOT, Toffoli, SWAP and
//! exponential-SWAP, and the exponential Pauli-X/Y chains
//! (`spec.md` §4.E "Swap-with-scalar").

use crate::{
    error::EngineError,
    index_math::{expand, mask_variant, OperatedBits},
    kernel::{apply_exp_pauli_mix, apply_pairs, exp_pauli_x_pair_coeff, exp_pauli_y_pair_coeff, ControlSpec},
    math::{phase_from_rad, C},
};

const X: [C; 4] = [
    C::new(0.0, 0.0),
    C::new(1.0, 0.0),
    C::new(1.0, 0.0),
    C::new(0.0, 0.0),
];

const Y: [C; 4] = [
    C::new(0.0, 0.0),
    C::new(0.0, -1.0),
    C::new(0.0, 1.0),
    C::new(0.0, 0.0),
];

/// Pauli-X on `target`, firing only when every control in `controls`
/// is at its required polarity. `controls = []` gives plain `X`;
/// one fire-on-1 control gives `CNOT`; two give `Toffoli`.
pub fn x(slice: &mut [C], target: usize, controls: &[ControlSpec], local_qubits: usize, adjoint: bool) -> Result<(), EngineError> {
    let (bits, pos, polarity) = crate::kernel::single_target_operated(target, controls)?;
    apply_pairs(slice, &bits, local_qubits, pos, &polarity, X, adjoint);
    Ok(())
}

/// Pauli-Y, with the same control semantics as [`x`].
pub fn y(slice: &mut [C], target: usize, controls: &[ControlSpec], local_qubits: usize, adjoint: bool) -> Result<(), EngineError> {
    let (bits, pos, polarity) = crate::kernel::single_target_operated(target, controls)?;
    apply_pairs(slice, &bits, local_qubits, pos, &polarity, Y, adjoint);
    Ok(())
}

/// `CNOT(target, control)`, fire-on-1.
pub fn cnot(slice: &mut [C], target: usize, control: usize, local_qubits: usize) -> Result<(), EngineError> {
    x(slice, target, &[ControlSpec { physical: control, fire_on: true }], local_qubits, false)
}

/// `Toffoli(target, control1, control2)`, fire-on-1.
pub fn toffoli(slice: &mut [C], target: usize, control1: usize, control2: usize, local_qubits: usize) -> Result<(), EngineError> {
    x(
        slice,
        target,
        &[
            ControlSpec { physical: control1, fire_on: true },
            ControlSpec { physical: control2, fire_on: true },
        ],
        local_qubits,
        false,
    )
}

/// `SWAP(a, b)`: exchange the amplitudes at `|...1_a...0_b...>` and
/// `|...0_a...1_b...>`, leaving `|00>` and `|11>` fixed.
pub fn swap(slice: &mut [C], a: usize, b: usize, local_qubits: usize) -> Result<(), EngineError> {
    let bits = OperatedBits::new(&[a, b])?;
    let k = bits.len();
    for x in 0..(1usize << (local_qubits - k)) {
        let base = expand(x, &bits, local_qubits);
        let idx01 = mask_variant(base, &bits, 0b01);
        let idx10 = mask_variant(base, &bits, 0b10);
        slice.swap(idx01, idx10);
    }
    Ok(())
}

/// `exp(i * theta * SWAP(a, b))`: phase `e^{i theta}` on `|00>`/`|11>`,
/// a rotation mixing `|01>`/`|10>`.
pub fn exp_swap(slice: &mut [C], a: usize, b: usize, local_qubits: usize, theta: f64, adjoint: bool) -> Result<(), EngineError> {
    let theta = if adjoint { -theta } else { theta };
    let bits = OperatedBits::new(&[a, b])?;
    let k = bits.len();
    let phase = phase_from_rad(theta);
    let (cos, sin) = (theta.cos(), theta.sin());
    for x in 0..(1usize << (local_qubits - k)) {
        let base = expand(x, &bits, local_qubits);
        let idx00 = mask_variant(base, &bits, 0b00);
        let idx11 = mask_variant(base, &bits, 0b11);
        slice[idx00] *= phase;
        slice[idx11] *= phase;
        let idx01 = mask_variant(base, &bits, 0b01);
        let idx10 = mask_variant(base, &bits, 0b10);
        let (a01, a10) = (slice[idx01], slice[idx10]);
        slice[idx01] = C::new(cos, 0.0) * a01 + C::new(0.0, sin) * a10;
        slice[idx10] = C::new(0.0, sin) * a01 + C::new(cos, 0.0) * a10;
    }
    Ok(())
}

/// As [`exp_pauli_x_chain`], given `alpha = cos(theta) + i sin(theta)`
/// directly instead of an angle (`spec.md` §6 "coefficient forms"):
/// `exp(i theta X_{q1} ... X_{qn}) = cos(theta) I + i sin(theta) X^{⊗n}`,
/// a two-amplitude mix of every complementary address pair rather
/// than a pure permutation (`spec.md` §4.E "Two-amplitude mixing").
pub fn exp_pauli_x_chain_coeff(slice: &mut [C], qubits: &[usize], local_qubits: usize, alpha: C, adjoint: bool) -> Result<(), EngineError> {
    let sin_theta = if adjoint { -alpha.im } else { alpha.im };
    let bits = OperatedBits::new(qubits)?;
    apply_exp_pauli_mix(slice, &bits, local_qubits, alpha.re, exp_pauli_x_pair_coeff(sin_theta));
    Ok(())
}

/// `exp(i * theta * X_{q1} X_{q2} ... X_{qn})`.
pub fn exp_pauli_x_chain(slice: &mut [C], qubits: &[usize], local_qubits: usize, theta: f64, adjoint: bool) -> Result<(), EngineError> {
    exp_pauli_x_chain_coeff(slice, qubits, local_qubits, phase_from_rad(theta), adjoint)
}

/// As [`exp_pauli_y_chain`], given `alpha = cos(theta) + i sin(theta)`
/// directly instead of an angle. `Y^{⊗n}|w⟩ = i^n (-1)^{popcount(w)}
/// |complement(w)⟩`, so `exp(i theta Y^{⊗n})`'s mixing term is
/// `i^{n+1} (-1)^{popcount(w)} sin(theta)` per `spec.md` §4.E's
/// n-qubit-Y-chain tie-break rule.
pub fn exp_pauli_y_chain_coeff(slice: &mut [C], qubits: &[usize], local_qubits: usize, alpha: C, adjoint: bool) -> Result<(), EngineError> {
    let sin_theta = if adjoint { -alpha.im } else { alpha.im };
    let bits = OperatedBits::new(qubits)?;
    let n = bits.len();
    apply_exp_pauli_mix(slice, &bits, local_qubits, alpha.re, exp_pauli_y_pair_coeff(n, sin_theta));
    Ok(())
}

/// `exp(i * theta * Y_{q1} Y_{q2} ... Y_{qn})`.
pub fn exp_pauli_y_chain(slice: &mut [C], qubits: &[usize], local_qubits: usize, theta: f64, adjoint: bool) -> Result<(), EngineError> {
    exp_pauli_y_chain_coeff(slice, qubits, local_qubits, phase_from_rad(theta), adjoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{C_ONE, C_ZERO};

    #[test]
    fn x_twice_is_identity() {
        let mut slice = vec![C_ONE, C_ZERO];
        x(&mut slice, 0, &[], 1, false).unwrap();
        x(&mut slice, 0, &[], 1, false).unwrap();
        assert!((slice[0] - C_ONE).norm() < 1e-12);
        assert!(slice[1].norm() < 1e-12);
    }

    #[test]
    fn cnot_flips_target_only_when_control_fires() {
        // |c t> ordering: bit0 = t(=0), bit1 = c(=1) -> index 0b10 = 2.
        let mut slice = vec![C_ZERO; 4];
        slice[0b10] = C_ONE;
        cnot(&mut slice, 0, 1, 2).unwrap();
        assert!((slice[0b11] - C_ONE).norm() < 1e-12);
    }

    #[test]
    fn swap_twice_is_identity() {
        let mut slice = vec![C_ZERO, C_ONE, C_ZERO, C_ZERO];
        swap(&mut slice, 0, 1, 2).unwrap();
        assert!((slice[0b10] - C_ONE).norm() < 1e-12);
        swap(&mut slice, 0, 1, 2).unwrap();
        assert!((slice[0b01] - C_ONE).norm() < 1e-12);
    }

    #[test]
    fn toffoli_flips_only_when_both_controls_fire() {
        let mut slice = vec![C_ZERO; 8];
        slice[0b110] = C_ONE; // q0=0, q1=1, q2=1
        toffoli(&mut slice, 0, 1, 2, 3).unwrap();
        assert!((slice[0b111] - C_ONE).norm() < 1e-12);

        let mut slice2 = vec![C_ZERO; 8];
        slice2[0b100] = C_ONE; // only one control set
        toffoli(&mut slice2, 0, 1, 2, 3).unwrap();
        assert!((slice2[0b100] - C_ONE).norm() < 1e-12);
    }

    #[test]
    fn exp_pauli_x_single_qubit_matches_closed_form() {
        // exp(i theta X) = [[cos, i sin], [i sin, cos]].
        let theta = std::f64::consts::FRAC_PI_3;
        let mut slice = vec![C_ONE, C_ZERO];
        exp_pauli_x_chain(&mut slice, &[0], 1, theta, false).unwrap();
        assert!((slice[0] - C::new(theta.cos(), 0.0)).norm() < 1e-12);
        assert!((slice[1] - C::new(0.0, theta.sin())).norm() < 1e-12);
    }

    #[test]
    fn exp_pauli_x_adjoint_undoes_rotation() {
        let theta = 0.83;
        let original = vec![C::new(0.4, 0.2), C::new(-0.1, 0.5), C::new(0.3, -0.3), C::new(0.2, 0.1)];
        let mut slice = original.clone();
        exp_pauli_x_chain(&mut slice, &[0, 1], 2, theta, false).unwrap();
        exp_pauli_x_chain(&mut slice, &[0, 1], 2, theta, true).unwrap();
        for (got, want) in slice.iter().zip(original.iter()) {
            assert!((got - want).norm() < 1e-9);
        }
    }

    #[test]
    fn exp_pauli_y_two_qubit_matches_closed_form() {
        // eYY_{1,2}(theta) a_{00} -> cos*a00 - i*sin*a11 (ket/exponential_pauli_y.hpp).
        let theta = 0.42;
        let mut slice = vec![C_ONE, C_ZERO, C_ZERO, C_ZERO];
        exp_pauli_y_chain(&mut slice, &[0, 1], 2, theta, false).unwrap();
        assert!((slice[0b00] - C::new(theta.cos(), 0.0)).norm() < 1e-12);
        assert!((slice[0b11] - C::new(0.0, -theta.sin())).norm() < 1e-12);
        assert!(slice[0b01].norm() < 1e-12);
        assert!(slice[0b10].norm() < 1e-12);
    }

    #[test]
    fn exp_pauli_y_adjoint_undoes_rotation() {
        let theta = 1.1;
        let original = vec![C::new(0.1, 0.4), C::new(0.3, -0.2), C::new(-0.2, 0.1), C::new(0.25, 0.25)];
        let mut slice = original.clone();
        exp_pauli_y_chain(&mut slice, &[0, 1], 2, theta, false).unwrap();
        exp_pauli_y_chain(&mut slice, &[0, 1], 2, theta, true).unwrap();
        for (got, want) in slice.iter().zip(original.iter()) {
            assert!((got - want).norm() < 1e-9);
        }
    }
}
