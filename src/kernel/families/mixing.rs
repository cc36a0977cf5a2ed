//! Two-amplitude mixing kernels: Hadamard, U1/U2/U3, controlled-V,
//! controlled rotations, and the `+/-pi/2` rotations
//! (`spec.md` §4.E "Two-amplitude mixing").

use crate::{
    error::EngineError,
    kernel::{apply_pairs, single_target_operated, ControlSpec},
    math::C,
};

const FRAC_1_SQRT_2: f64 = std::f64::consts::FRAC_1_SQRT_2;

fn hadamard_matrix() -> [C; 4] {
    let h = FRAC_1_SQRT_2;
    [C::new(h, 0.0), C::new(h, 0.0), C::new(h, 0.0), C::new(-h, 0.0)]
}

pub fn hadamard(slice: &mut [C], target: usize, local_qubits: usize) -> Result<(), EngineError> {
    let (bits, pos, polarity) = single_target_operated(target, &[])?;
    apply_pairs(slice, &bits, local_qubits, pos, &polarity, hadamard_matrix(), false);
    Ok(())
}

/// `u1(lambda)`, re-expressed as the degenerate 2x2 form (`spec.md`
/// §4.E groups U1/U2/U3 together under mixing; `kernel::families::diagonal::phase_shift`
/// is the fast diagonal-only path for the same gate).
pub fn u1(slice: &mut [C], target: usize, local_qubits: usize, lambda: f64, adjoint: bool) -> Result<(), EngineError> {
    let (bits, pos, polarity) = single_target_operated(target, &[])?;
    let coeff = crate::math::phase_from_rad(lambda);
    let m = [C::new(1.0, 0.0), C::new(0.0, 0.0), C::new(0.0, 0.0), coeff];
    apply_pairs(slice, &bits, local_qubits, pos, &polarity, m, adjoint);
    Ok(())
}

pub fn u2(slice: &mut [C], target: usize, local_qubits: usize, phi: f64, lambda: f64, adjoint: bool) -> Result<(), EngineError> {
    let (bits, pos, polarity) = single_target_operated(target, &[])?;
    let h = FRAC_1_SQRT_2;
    let e_l = crate::math::phase_from_rad(lambda);
    let e_p = crate::math::phase_from_rad(phi);
    let e_pl = crate::math::phase_from_rad(phi + lambda);
    let m = [C::new(h, 0.0), -e_l * h, e_p * h, e_pl * h];
    apply_pairs(slice, &bits, local_qubits, pos, &polarity, m, adjoint);
    Ok(())
}

pub fn u3(
    slice: &mut [C],
    target: usize,
    local_qubits: usize,
    theta: f64,
    phi: f64,
    lambda: f64,
    adjoint: bool,
) -> Result<(), EngineError> {
    let (bits, pos, polarity) = single_target_operated(target, &[])?;
    let (c, s) = ((theta / 2.0).cos(), (theta / 2.0).sin());
    let e_l = crate::math::phase_from_rad(lambda);
    let e_p = crate::math::phase_from_rad(phi);
    let e_pl = crate::math::phase_from_rad(phi + lambda);
    let m = [
        C::new(c, 0.0),
        -e_l * s,
        e_p * s,
        e_pl * c,
    ];
    apply_pairs(slice, &bits, local_qubits, pos, &polarity, m, adjoint);
    Ok(())
}

/// `X` rotated by `+/- pi/2`, a frequently used building block
/// (`spec.md` §6 "x-rotation-half-pi").
pub fn rx90(slice: &mut [C], target: usize, local_qubits: usize, adjoint: bool) -> Result<(), EngineError> {
    let (bits, pos, polarity) = single_target_operated(target, &[])?;
    let f = FRAC_1_SQRT_2;
    let m = [C::new(f, 0.0), C::new(0.0, -f), C::new(0.0, -f), C::new(f, 0.0)];
    apply_pairs(slice, &bits, local_qubits, pos, &polarity, m, adjoint);
    Ok(())
}

pub fn ry90(slice: &mut [C], target: usize, local_qubits: usize, adjoint: bool) -> Result<(), EngineError> {
    let (bits, pos, polarity) = single_target_operated(target, &[])?;
    let f = FRAC_1_SQRT_2;
    let m = [C::new(f, 0.0), C::new(-f, 0.0), C::new(f, 0.0), C::new(f, 0.0)];
    apply_pairs(slice, &bits, local_qubits, pos, &polarity, m, adjoint);
    Ok(())
}

/// Controlled application of an arbitrary 2x2 unitary `v`.
pub fn controlled_v(
    slice: &mut [C],
    control: usize,
    target: usize,
    local_qubits: usize,
    v: [C; 4],
    adjoint: bool,
) -> Result<(), EngineError> {
    multi_controlled_v(slice, &[ControlSpec { physical: control, fire_on: true }], target, local_qubits, v, adjoint)
}

/// `CnUm` generalization: `v` applied to `target`, firing only when
/// every entry of `controls` matches its required polarity
/// (`spec.md` §6 "multi-target and multi-control variants (CnUm)").
pub fn multi_controlled_v(
    slice: &mut [C],
    controls: &[ControlSpec],
    target: usize,
    local_qubits: usize,
    v: [C; 4],
    adjoint: bool,
) -> Result<(), EngineError> {
    let (bits, pos, polarity) = single_target_operated(target, controls)?;
    apply_pairs(slice, &bits, local_qubits, pos, &polarity, v, adjoint);
    Ok(())
}

fn rx_matrix(theta: f64) -> [C; 4] {
    let (c, s) = ((theta / 2.0).cos(), (theta / 2.0).sin());
    [C::new(c, 0.0), C::new(0.0, -s), C::new(0.0, -s), C::new(c, 0.0)]
}

fn ry_matrix(theta: f64) -> [C; 4] {
    let (c, s) = ((theta / 2.0).cos(), (theta / 2.0).sin());
    [C::new(c, 0.0), C::new(-s, 0.0), C::new(s, 0.0), C::new(c, 0.0)]
}

fn rz_matrix(theta: f64) -> [C; 4] {
    let half = theta / 2.0;
    [crate::math::phase_from_rad(-half), C::new(0.0, 0.0), C::new(0.0, 0.0), crate::math::phase_from_rad(half)]
}

pub fn crx(slice: &mut [C], control: usize, target: usize, local_qubits: usize, theta: f64, adjoint: bool) -> Result<(), EngineError> {
    controlled_v(slice, control, target, local_qubits, rx_matrix(theta), adjoint)
}

pub fn cry(slice: &mut [C], control: usize, target: usize, local_qubits: usize, theta: f64, adjoint: bool) -> Result<(), EngineError> {
    controlled_v(slice, control, target, local_qubits, ry_matrix(theta), adjoint)
}

pub fn crz(slice: &mut [C], control: usize, target: usize, local_qubits: usize, theta: f64, adjoint: bool) -> Result<(), EngineError> {
    controlled_v(slice, control, target, local_qubits, rz_matrix(theta), adjoint)
}
