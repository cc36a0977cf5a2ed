//! Local gate kernels, `spec.md` §4.E.
//!
//! Every kernel here is a pure in-place function over the `2^k`
//! amplitudes addressed by one operated-qubit set, applied once per
//! `x in [0, 2^(L-k))` via [`crate::index_math::expand`] /
//! [`crate::index_math::mask_variant`]. That addressing is already
//! page-agnostic — cases (i)/(ii)/(iii) of the page-aware dispatch the
//! spec describes are an iteration-order optimization, not a semantic
//! difference, so the primitives below implement case (ii) (the
//! general case) directly; [`Stride`] names the optimization without
//! this crate implementing the tiled fast path.
//!
//! Four families, matching `spec.md` §4.E:
//! - [`families::diagonal`] — phase-only kernels ([`apply_diagonal`]).
//! - [`families::swap_scalar`] — permutation-with-scalar kernels
//!   ([`apply_permute_with_coeff`]).
//! - [`families::mixing`] — two-amplitude-pair kernels ([`apply_pairs`]).
//!
//! Non-unitary projection ([`apply_projection`]) lives in this module
//! directly rather than its own family, since every caller
//! ([`crate::measurement`]) reduces it across ranks before rescaling.

pub mod families;

use crate::{
    error::EngineError,
    index_math::{expand, mask_variant, OperatedBits},
    math::{count_bits, C, C_ZERO},
};

/// One control qubit's physical position and required firing value
/// (`spec.md` §3 "Qubit kinds").
#[derive(Clone, Copy, Debug)]
pub struct ControlSpec {
    pub physical: usize,
    pub fire_on: bool,
}

/// Build the sorted [`OperatedBits`] for one target plus its controls,
/// and the control-polarity array in the same sorted order, for
/// [`apply_pairs`] callers.
pub fn single_target_operated(
    target: usize,
    controls: &[ControlSpec],
) -> Result<(OperatedBits, usize, Vec<bool>), EngineError> {
    let mut raw: Vec<usize> = controls.iter().map(|c| c.physical).collect();
    raw.push(target);
    let bits = OperatedBits::new(&raw)?;
    let sorted = bits.as_slice();
    let target_pos = sorted
        .iter()
        .position(|&b| b as usize == target)
        .expect("target bit must be present in its own operated set");
    let mut polarity = vec![false; sorted.len()];
    for c in controls {
        let pos = sorted
            .iter()
            .position(|&b| b as usize == c.physical)
            .expect("control bit must be present in the operated set");
        polarity[pos] = c.fire_on;
    }
    Ok((bits, target_pos, polarity))
}

/// Cache-aware iteration strategy, `spec.md` §4.E "Cache-aware
/// iteration (optional)". Selected once per fused block; `Tiled` is
/// accepted but currently iterates identically to `Straight` — the
/// inner-loop reordering itself is a performance optimization this
/// crate does not implement, never a semantic one (`spec.md` requires
/// the two strategies produce identical results up to floating-point
/// associativity).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Stride {
    #[default]
    Straight,
    Tiled { window_bits: u32 },
}

/// Diagonal family: multiply the amplitude at each operated-bit
/// combination by `phase_table[variant]` (`spec.md` §4.E "Diagonal").
/// `phase_table` has `2^bits.len()` entries; entries for variants a
/// control filters out should be `C_ONE` so the gate is a no-op there.
pub fn apply_diagonal(slice: &mut [C], bits: &OperatedBits, local_qubits: usize, phase_table: &[C], adjoint: bool) {
    let k = bits.len();
    debug_assert_eq!(phase_table.len(), 1 << k);
    for x in 0..(1usize << (local_qubits - k)) {
        let base = expand(x, bits, local_qubits);
        for variant in 0..(1usize << k) {
            let idx = mask_variant(base, bits, variant);
            let coeff = if adjoint { phase_table[variant].conj() } else { phase_table[variant] };
            slice[idx] *= coeff;
        }
    }
}

/// Two-amplitude mixing family: apply the 2x2 matrix `m` (row-major
/// `[m00, m01, m10, m11]`) to the pair differing in the bit at
/// `bits.as_slice()[target_pos]`, with every other bit in `bits` held
/// fixed at the polarity given by `control_polarity` (same order as
/// `bits.as_slice()`, `target_pos`'s own entry ignored). One pair per
/// `x` (`spec.md` §4.E "Two-amplitude mixing").
pub fn apply_pairs(
    slice: &mut [C],
    bits: &OperatedBits,
    local_qubits: usize,
    target_pos: usize,
    control_polarity: &[bool],
    m: [C; 4],
    adjoint: bool,
) {
    let k = bits.len();
    debug_assert_eq!(control_polarity.len(), k);
    let mut fixed = 0usize;
    for (i, &polarity) in control_polarity.iter().enumerate() {
        if i != target_pos && polarity {
            fixed |= 1 << i;
        }
    }
    let v0 = fixed & !(1 << target_pos);
    let v1 = fixed | (1 << target_pos);
    let m = if adjoint {
        // Conjugate transpose.
        [m[0].conj(), m[2].conj(), m[1].conj(), m[3].conj()]
    } else {
        m
    };
    for x in 0..(1usize << (local_qubits - k)) {
        let base = expand(x, bits, local_qubits);
        let idx0 = mask_variant(base, bits, v0);
        let idx1 = mask_variant(base, bits, v1);
        let (a0, a1) = (slice[idx0], slice[idx1]);
        slice[idx0] = m[0] * a0 + m[1] * a1;
        slice[idx1] = m[2] * a0 + m[3] * a1;
    }
}

/// Swap-with-scalar family: `new[v] = coeff(v) * old[v ^ full_mask]`
/// for every operated-bit combination `v`, where `full_mask` flips
/// every bit of `bits` at once (`spec.md` §4.E "Swap-with-scalar").
/// Used by kernels whose action *is* a pure permutation with a
/// per-index scalar, i.e. the `theta = pi/2` corner of an exponential
/// Pauli chain (plain `X`/`Y` chains) rather than the general
/// mixing form; see [`apply_exp_pauli_mix`] for the latter. Every
/// input this writes over is read first, matching the family's
/// read-then-write discipline.
pub fn apply_permute_with_coeff(
    slice: &mut [C],
    bits: &OperatedBits,
    local_qubits: usize,
    coeff: impl Fn(usize) -> C,
) {
    let k = bits.len();
    let full_mask = (1usize << k) - 1;
    for x in 0..(1usize << (local_qubits - k)) {
        let base = expand(x, bits, local_qubits);
        for variant in 0..(1usize << (k.max(1) - 1)) {
            let complement = variant ^ full_mask;
            let idx_v = mask_variant(base, bits, variant);
            let idx_c = mask_variant(base, bits, complement);
            let (a, b) = (slice[idx_v], slice[idx_c]);
            slice[idx_v] = coeff(variant) * b;
            slice[idx_c] = coeff(complement) * a;
        }
    }
}

/// General exponential-Pauli-chain mixing: for every complementary
/// pair `(v, v^full_mask)` of the `2^k` operated-bit addresses,
/// `new[v] = cos_theta * old[v] + pair_coeff(w) * old[w]` where
/// `w = complement(v)` (`spec.md` §4.E "Two-amplitude mixing",
/// generalized from pairs to `2^(k-1)` pairs over the full operated
/// set). `pair_coeff(w)` is indexed by the *source* address `w` and
/// carries the `i sin(theta)` factor together with whatever fixed
/// phase the specific Pauli chain's complement-mapping contributes
/// (`+1` for X, `i^{n+1}` times a parity sign for Y — see
/// `P^{⊗n}|w⟩ = c(w) |complement(w)⟩`). Every input this writes over
/// is read first.
pub fn apply_exp_pauli_mix(
    slice: &mut [C],
    bits: &OperatedBits,
    local_qubits: usize,
    cos_theta: f64,
    pair_coeff: impl Fn(usize) -> C,
) {
    let k = bits.len();
    let full_mask = (1usize << k) - 1;
    let cos_theta = C::new(cos_theta, 0.0);
    for x in 0..(1usize << (local_qubits - k)) {
        let base = expand(x, bits, local_qubits);
        for variant in 0..(1usize << (k.max(1) - 1)) {
            let complement = variant ^ full_mask;
            let idx_v = mask_variant(base, bits, variant);
            let idx_c = mask_variant(base, bits, complement);
            let (a, b) = (slice[idx_v], slice[idx_c]);
            slice[idx_v] = cos_theta * a + pair_coeff(complement) * b;
            slice[idx_c] = cos_theta * b + pair_coeff(variant) * a;
        }
    }
}

/// Pair-coefficient rule for an `n`-qubit exponential Pauli-X chain:
/// `X^{⊗n}|v⟩ = |v̄⟩` with coefficient `1` regardless of `v`, so the
/// mixing term is just `i sin(theta)` for every pair
/// (`exp(i theta X_1 ... X_n) = cos(theta) I + i sin(theta) X^{⊗n}`).
pub fn exp_pauli_x_pair_coeff(sin_theta: f64) -> impl Fn(usize) -> C {
    let term = C::new(0.0, sin_theta);
    move |_variant: usize| term
}

/// Pair-coefficient rule for an `n`-qubit exponential Pauli-Y chain:
/// `Y^{⊗n}|v⟩ = i^n (-1)^{popcount(v)} |v̄⟩`, so
/// `exp(i theta Y^{⊗n})`'s mixing term contributed by `old[v]` to
/// `new[complement(v)]` is `i^{n+1} (-1)^{popcount(v)} sin(theta)`
/// (`spec.md` §4.E "the coefficient is i^n adjusted by the parity of
/// the bit pattern after the address swap").
pub fn exp_pauli_y_pair_coeff(n: usize, sin_theta: f64) -> impl Fn(usize) -> C {
    use crate::math::I_POW_TABLE;
    let base = I_POW_TABLE[(n + 1) % 4] * sin_theta;
    move |variant: usize| {
        if count_bits(variant) % 2 == 0 {
            base
        } else {
            -base
        }
    }
}

/// Probability mass in the `keep` half of `bit` on this slice alone
/// (`spec.md` §4.G: summed by the caller across ranks before deciding
/// whether to error or to rescale).
pub fn projection_probability(slice: &[C], bit: usize, local_qubits: usize, keep: bool) -> Result<f64, crate::error::EngineError> {
    let bits = OperatedBits::new(&[bit])?;
    let mut retained = 0.0f64;
    for x in 0..(1usize << (local_qubits - 1)) {
        let base = expand(x, &bits, local_qubits);
        let idx0 = mask_variant(base, &bits, 0);
        let idx1 = mask_variant(base, &bits, 1);
        retained += if keep { slice[idx1].norm_sqr() } else { slice[idx0].norm_sqr() };
    }
    Ok(retained)
}

/// Zero the discarded half of `bit` and multiply the surviving half
/// by `scale`, unconditionally. Used once a caller has already
/// validated the (possibly cross-rank) retained probability mass is
/// nonzero; a rank whose own local contribution happens to be zero is
/// not an error here, since the mass lives on other ranks.
pub fn rescale_projection(slice: &mut [C], bit: usize, local_qubits: usize, keep: bool, scale: f64) -> Result<(), crate::error::EngineError> {
    let bits = OperatedBits::new(&[bit])?;
    for x in 0..(1usize << (local_qubits - 1)) {
        let base = expand(x, &bits, local_qubits);
        let idx0 = mask_variant(base, &bits, 0);
        let idx1 = mask_variant(base, &bits, 1);
        if keep {
            slice[idx0] = C_ZERO;
            slice[idx1] *= scale;
        } else {
            slice[idx1] = C_ZERO;
            slice[idx0] *= scale;
        }
    }
    Ok(())
}

/// Projection family: zero the half of the amplitudes where `bit`
/// does not equal `keep`, then rescale the surviving half by
/// `1/sqrt(retained_probability)` (`spec.md` §4.E "Projection", §4.G
/// "Clear / Set"). For a single slice; [`crate::measurement`] composes
/// [`projection_probability`]/[`rescale_projection`] directly to
/// reduce across every simulated rank first.
///
/// Returns the retained probability mass, or
/// [`crate::error::EngineError::Arithmetic`] if it is (numerically)
/// zero, per `SPEC_FULL.md`'s resolution of the "division by zero"
/// open question.
pub fn apply_projection(
    slice: &mut [C],
    bit: usize,
    local_qubits: usize,
    keep: bool,
) -> Result<f64, crate::error::EngineError> {
    let retained = projection_probability(slice, bit, local_qubits, keep)?;
    if !retained.is_finite() || retained <= f64::EPSILON * (1usize << local_qubits) as f64 {
        return Err(crate::error::EngineError::Arithmetic {
            detail: "projection would discard all probability mass".into(),
        });
    }
    let scale = retained.sqrt().recip();
    rescale_projection(slice, bit, local_qubits, keep, scale)?;
    Ok(retained)
}
