//! Measurement & sampling, `spec.md` §4.G.
//!
//! The PRNG is a `rand_pcg::Pcg64` seeded once from `RunConfig::seed`
//! and owned by the caller (`EngineContext`, component I), consumed in
//! lock-step across every simulated rank so the draw is identical
//! everywhere — the in-process equivalent of "the PRNG must produce
//! the same draw on all ranks".

use rand::Rng;
use rand_pcg::Pcg64;

use crate::{
    container::Container,
    error::EngineError,
    index_math::{expand, mask_variant, OperatedBits},
    interchange::{ensure_local, Transport},
    kernel::{projection_probability, rescale_projection},
    math::C,
    partition::PartitionPolicy,
    permutation::PermutationMap,
    types::RankId,
};

/// Single-qubit projective measurement on an already-local physical
/// bit. Returns the collapsed outcome.
pub fn single_qubit(
    container: &mut Container,
    qubit_physical: usize,
    local_qubits: usize,
    rng: &mut Pcg64,
) -> Result<bool, EngineError> {
    let mut p0 = 0.0f64;
    let mut p1 = 0.0f64;
    for r in 0..container.world_size() {
        for block in container.blocks(RankId(r)) {
            p0 += projection_probability(block, qubit_physical, local_qubits, false)?;
            p1 += projection_probability(block, qubit_physical, local_qubits, true)?;
        }
    }
    let total = p0 + p1;
    if !total.is_finite() || total <= f64::EPSILON {
        return Err(EngineError::Arithmetic {
            detail: "measurement probability reduction produced no mass".into(),
        });
    }
    let u: f64 = rng.gen();
    let outcome = !(u < p0 / total);
    let retained = if outcome { p1 } else { p0 };
    let scale = retained.sqrt().recip();
    for r in 0..container.world_size() {
        for block in container.blocks_mut(RankId(r)) {
            rescale_projection(block, qubit_physical, local_qubits, outcome, scale)?;
        }
    }
    Ok(outcome)
}

/// Unconditional projection onto `|0>` of `qubit`, across every rank.
pub fn clear(container: &mut Container, qubit_physical: usize, local_qubits: usize) -> Result<(), EngineError> {
    project_all_ranks(container, qubit_physical, local_qubits, false)
}

/// Unconditional projection onto `|1>` of `qubit`, across every rank.
pub fn set(container: &mut Container, qubit_physical: usize, local_qubits: usize) -> Result<(), EngineError> {
    project_all_ranks(container, qubit_physical, local_qubits, true)
}

fn project_all_ranks(container: &mut Container, qubit_physical: usize, local_qubits: usize, keep: bool) -> Result<(), EngineError> {
    let mut retained = 0.0f64;
    for r in 0..container.world_size() {
        for block in container.blocks(RankId(r)) {
            retained += projection_probability(block, qubit_physical, local_qubits, keep)?;
        }
    }
    if !retained.is_finite() || retained <= f64::EPSILON {
        return Err(EngineError::Arithmetic {
            detail: "clear/set would discard all probability mass".into(),
        });
    }
    let scale = retained.sqrt().recip();
    for r in 0..container.world_size() {
        for block in container.blocks_mut(RankId(r)) {
            rescale_projection(block, qubit_physical, local_qubits, keep, scale)?;
        }
    }
    Ok(())
}

/// A destructive cumulative-distribution scan over every rank's
/// amplitudes (`spec.md` §4.G "Full measurement"). Building one
/// consumes the state only in the sense that its results assume the
/// vector is not mutated afterward; construct a fresh one per
/// measurement/event-generation episode.
pub struct Cdf {
    per_rank_scan: Vec<Vec<f64>>,
    rank_cumulative: Vec<f64>,
}

impl Cdf {
    pub fn build(container: &Container) -> Self {
        let mut per_rank_scan = Vec::with_capacity(container.world_size());
        let mut rank_cumulative = Vec::with_capacity(container.world_size() + 1);
        rank_cumulative.push(0.0);
        let mut running = 0.0f64;
        for r in 0..container.world_size() {
            let mut scan = Vec::with_capacity(container.slice(RankId(r)).len());
            let mut acc = 0.0f64;
            for amp in container.slice(RankId(r)) {
                acc += amp.norm_sqr();
                scan.push(acc);
            }
            running += acc;
            rank_cumulative.push(running);
            per_rank_scan.push(scan);
        }
        Self { per_rank_scan, rank_cumulative }
    }

    pub fn total(&self) -> f64 {
        *self.rank_cumulative.last().unwrap_or(&0.0)
    }

    /// Draw the `(rank, local_offset)` whose cumulative bucket contains
    /// `u * total()`, binary-searching first across ranks then within
    /// the winning rank's local scan.
    pub fn draw(&self, u: f64) -> (RankId, usize) {
        let target = (u * self.total()).min(self.total());
        let num_ranks = self.per_rank_scan.len();
        let rank = match self.rank_cumulative[1..].binary_search_by(|probe| probe.partial_cmp(&target).unwrap()) {
            Ok(i) => i,
            Err(i) => i,
        }
        .min(num_ranks.saturating_sub(1));
        let prior = self.rank_cumulative[rank];
        let local_target = target - prior;
        let scan = &self.per_rank_scan[rank];
        let offset = match scan.binary_search_by(|probe| probe.partial_cmp(&local_target).unwrap()) {
            Ok(i) => i,
            Err(i) => i,
        }
        .min(scan.len().saturating_sub(1));
        (RankId(rank), offset)
    }
}

/// One shot of full measurement (`spec.md` §4.G), destructive:
/// collapses the register to the drawn basis state. Returns the
/// *logical* result, translated through `pi` (`spec.md` §6 event
/// output: "bits of the logical result").
pub fn full_measurement(
    container: &mut Container,
    policy: &PartitionPolicy,
    pi: &PermutationMap,
    rng: &mut Pcg64,
) -> usize {
    let cdf = Cdf::build(container);
    let u: f64 = rng.gen();
    let (rank, offset) = cdf.draw(u);
    container.collapse_to(rank, offset);
    pi.to_logical_value(policy.rank_index_to_qubit_value(rank, offset))
}

/// Many shots reusing one already-built scan (`spec.md` §4.G "Event
/// generation"). Non-destructive: these are read-only samples of the
/// current distribution, not a projective measurement.
pub fn generate_events(policy: &PartitionPolicy, pi: &PermutationMap, cdf: &Cdf, rng: &mut Pcg64, num_events: usize) -> Vec<usize> {
    (0..num_events)
        .map(|_| {
            let u: f64 = rng.gen();
            let (rank, offset) = cdf.draw(u);
            pi.to_logical_value(policy.rank_index_to_qubit_value(rank, offset))
        })
        .collect()
}

/// Expectation values of `X`, `Y`, `Z` for every logical qubit
/// (`spec.md` §4.G "Expectation of Pauli").
pub struct PauliExpectation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Covers every logical qubit in the register (`spec.md` §4.G: "a
/// table indexed by logical qubit"), not just those already local:
/// any qubit currently sitting in the unit or global tier is brought
/// local first, the same way every other gate dispatch does
/// (`spec.md` §4.F), since the reduction kernel only knows how to
/// address a local physical bit.
pub fn expectation_table<T: Transport>(
    container: &mut Container,
    pi: &mut PermutationMap,
    policy: &PartitionPolicy,
    transport: &mut T,
) -> Result<Vec<PauliExpectation>, EngineError> {
    let local_qubits = container.local_qubits();
    let mut table = Vec::with_capacity(policy.total_qubits());
    for q in 0..policy.total_qubits() {
        let p = ensure_local(container, pi, policy, transport, q, &[])?;
        table.push(expectation_one_qubit(container, p, local_qubits));
    }
    Ok(table)
}

fn expectation_one_qubit(container: &Container, bit: usize, local_qubits: usize) -> PauliExpectation {
    let bits = match OperatedBits::new(&[bit]) {
        Ok(b) => b,
        Err(_) => return PauliExpectation { x: 0.0, y: 0.0, z: 0.0 },
    };
    let (mut ex, mut ey, mut ez) = (0.0f64, 0.0f64, 0.0f64);
    for r in 0..container.world_size() {
        for block in container.blocks(RankId(r)) {
            for x in 0..(1usize << (local_qubits - 1)) {
                let base = expand(x, &bits, local_qubits);
                let idx0 = mask_variant(base, &bits, 0);
                let idx1 = mask_variant(base, &bits, 1);
                let (a0, a1): (C, C) = (block[idx0], block[idx1]);
                ex += 2.0 * (a0.conj() * a1).re;
                ey += 2.0 * (a0.conj() * a1).im;
                ez += a0.norm_sqr() - a1.norm_sqr();
            }
        }
    }
    PauliExpectation { x: ex, y: ey, z: ez }
}
