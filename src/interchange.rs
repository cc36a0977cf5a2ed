//! Interchange protocol, `spec.md` §4.F.
//!
//! Brings a non-local logical qubit into a local physical position by
//! exchanging amplitude blocks between the ranks (or, for a unit-tier
//! qubit whose bit lives in the data-block portion, between data
//! blocks of the *same* rank) that hold its two halves, then updates
//! the permutation map to match.
//!
//! [`Transport`] is the seam described in `SPEC_FULL.md` §3 "Resolved
//! ambiguity (process topology)": [`InProcessTransport`] moves data
//! between two `Vec<C>` blocks owned by the same [`Container`]; a real
//! MPI binding would implement the same trait over an actual
//! communicator without the interchange algorithm below changing.

use crate::{
    container::Container,
    error::EngineError,
    math::{C, C_ZERO},
    partition::PartitionPolicy,
    permutation::PermutationMap,
    types::RankId,
};

pub trait Transport {
    /// Exchange the equal-length segments `local` and `remote`, using
    /// `buffer` as scratch (`buffer.len() >= local.len()`). After the
    /// call, `local` holds what `remote` held and vice versa.
    fn exchange_segment(
        &mut self,
        local: &mut [C],
        remote: &mut [C],
        buffer: &mut [C],
    ) -> Result<(), EngineError>;
}

/// The only [`Transport`] implementation in this crate: ranks are
/// simulated in-process, so "send" and "receive" are just copies
/// through a shared buffer (`spec.md` §4.F step 2, reproduced exactly
/// even though no real message passing occurs).
pub struct InProcessTransport;

impl Transport for InProcessTransport {
    fn exchange_segment(
        &mut self,
        local: &mut [C],
        remote: &mut [C],
        buffer: &mut [C],
    ) -> Result<(), EngineError> {
        let len = local.len();
        if remote.len() != len || buffer.len() < len {
            return Err(EngineError::Transport(format!(
                "segment length mismatch: local={len} remote={} buffer>={}",
                remote.len(),
                buffer.len()
            )));
        }
        buffer[..len].copy_from_slice(remote);
        remote.copy_from_slice(local);
        local[..len].copy_from_slice(&buffer[..len]);
        Ok(())
    }
}

/// Pick a free local physical position to pair with the qubit being
/// localized, preferring non-page positions (`spec.md` §4.F "the
/// implementation picks victims greedily by preferring non-page local
/// positions").
pub fn pick_victim_local_bit(
    local_qubits: usize,
    num_page_qubits: usize,
    reserved_physical: &[usize],
) -> Result<usize, EngineError> {
    let non_page_end = local_qubits - num_page_qubits;
    (0..non_page_end)
        .chain(non_page_end..local_qubits)
        .find(|p| !reserved_physical.contains(p))
        .ok_or_else(|| EngineError::Unsupported {
            kernel: "interchange",
            detail: "no free local physical position available for victim selection".into(),
        })
}

/// Ensure `logical_qubit` is physically local (`spec.md` §4.F).
/// Idempotent: a qubit already local triggers no interchange and no
/// victim selection. Returns the (possibly new) physical position.
pub fn ensure_local<T: Transport>(
    container: &mut Container,
    pi: &mut PermutationMap,
    policy: &PartitionPolicy,
    transport: &mut T,
    logical_qubit: usize,
    reserved_physical: &[usize],
) -> Result<usize, EngineError> {
    let local_qubits = policy.local_qubits();
    let unit_qubits = policy.unit_qubits();
    let physical = pi.lookup(logical_qubit);

    if physical < local_qubits {
        return Ok(physical);
    }

    let victim = pick_victim_local_bit(local_qubits, container.num_page_qubits(), reserved_physical)?;

    if physical < local_qubits + unit_qubits {
        let unit_bit = physical - local_qubits;
        interchange_unit_bit(container, pi, policy, transport, unit_bit, victim)?;
    } else {
        let global_bit = physical - local_qubits - unit_qubits;
        interchange_global_bit(container, pi, policy, transport, global_bit, victim)?;
    }

    Ok(victim)
}

fn procs_per_unit_of(policy: &PartitionPolicy) -> usize {
    match *policy {
        PartitionPolicy::Simple { .. } => 1,
        PartitionPolicy::Unit { procs_per_unit, .. } => procs_per_unit,
    }
}

/// Interchange across ranks for a global-tier bit (`spec.md` §4.F,
/// simple-mode case).
fn interchange_global_bit<T: Transport>(
    container: &mut Container,
    pi: &mut PermutationMap,
    policy: &PartitionPolicy,
    transport: &mut T,
    global_bit: usize,
    local_bit: usize,
) -> Result<(), EngineError> {
    let procs_per_unit = procs_per_unit_of(policy);
    let world_size = policy.world_size();
    let mut visited = vec![false; world_size];
    for r in 0..world_size {
        if visited[r] {
            continue;
        }
        let global_value = r / procs_per_unit;
        if global_value & (1 << global_bit) != 0 {
            continue;
        }
        let rank_in_unit = r % procs_per_unit;
        let partner_global = global_value | (1 << global_bit);
        let partner = partner_global * procs_per_unit + rank_in_unit;
        visited[r] = true;
        visited[partner] = true;
        exchange_local_bit_halves(container, transport, RankId(r), RankId(partner), local_bit)?;
    }
    let local_qubits = policy.local_qubits();
    let unit_qubits = policy.unit_qubits();
    pi.swap_physical(local_qubits + unit_qubits + global_bit, local_bit);
    Ok(())
}

/// Interchange a unit-tier bit: if it falls in the rank-selector
/// portion of the unit bits, it is a cross-rank exchange within the
/// unit; otherwise it only reorders data blocks already held by the
/// same rank and needs no [`Transport`] call at all.
fn interchange_unit_bit<T: Transport>(
    container: &mut Container,
    pi: &mut PermutationMap,
    policy: &PartitionPolicy,
    transport: &mut T,
    unit_bit: usize,
    local_bit: usize,
) -> Result<(), EngineError> {
    let procs_per_unit = procs_per_unit_of(policy);
    let rank_selector_bits = procs_per_unit.trailing_zeros() as usize;
    let unit_qubits = policy.unit_qubits();
    let data_block_bits = unit_qubits - rank_selector_bits;
    let local_qubits = policy.local_qubits();

    if unit_bit >= data_block_bits {
        let sub_bit = unit_bit - data_block_bits;
        let world_size = policy.world_size();
        let mut visited = vec![false; world_size];
        for r in 0..world_size {
            if visited[r] {
                continue;
            }
            let unit_index = r / procs_per_unit;
            let rank_in_unit = r % procs_per_unit;
            if rank_in_unit & (1 << sub_bit) != 0 {
                continue;
            }
            let partner_rank_in_unit = rank_in_unit | (1 << sub_bit);
            let partner = unit_index * procs_per_unit + partner_rank_in_unit;
            visited[r] = true;
            visited[partner] = true;
            exchange_local_bit_halves(container, transport, RankId(r), RankId(partner), local_bit)?;
        }
    } else {
        for r in 0..policy.world_size() {
            swap_data_block_bit_within_rank(container, RankId(r), unit_bit, local_bit);
        }
    }

    pi.swap_physical(local_qubits + unit_bit, local_bit);
    Ok(())
}

/// One paired exchange between two ranks, swapping `local`'s
/// `local_bit == 1` half against `remote`'s `local_bit == 0` half
/// (`spec.md` §4.F steps 2-3). The buffer is reused across every
/// stride-sized chunk and across calls (taken from and returned to the
/// container, since it cannot be borrowed at the same time as the two
/// rank slices).
fn exchange_local_bit_halves<T: Transport>(
    container: &mut Container,
    transport: &mut T,
    rank: RankId,
    partner: RankId,
    local_bit: usize,
) -> Result<(), EngineError> {
    let chunk_len = 1usize << local_bit;
    let stride = chunk_len << 1;

    let mut buffer = container.take_buffer();
    if buffer.len() < chunk_len {
        buffer.resize(chunk_len, C_ZERO);
    }

    let result = (|| -> Result<(), EngineError> {
        let (local_full, remote_full) = container.slice_pair_mut(rank, partner);
        for (local_chunk, remote_chunk) in local_full
            .chunks_exact_mut(stride)
            .zip(remote_full.chunks_exact_mut(stride))
        {
            let (_local_lo, local_hi) = local_chunk.split_at_mut(chunk_len);
            let (remote_lo, _remote_hi) = remote_chunk.split_at_mut(chunk_len);
            transport.exchange_segment(local_hi, remote_lo, &mut buffer[..chunk_len])?;
        }
        Ok(())
    })();

    container.restore_buffer(buffer);
    result
}

/// Same-rank reorder of two data blocks' halves at `local_bit`, for a
/// unit bit that lives entirely within one rank's data-block index
/// (`spec.md` §3 "unit" tier).
fn swap_data_block_bit_within_rank(
    container: &mut Container,
    rank: RankId,
    unit_bit: usize,
    local_bit: usize,
) {
    let local_qubits = container.local_qubits();
    let block_len = 1usize << local_qubits;
    let chunk_len = 1usize << local_bit;
    let stride = chunk_len << 1;
    let slice = container.slice_mut(rank);
    // Blocks `2b` and `2b+1` along `unit_bit` pair up; within each pair,
    // swap block `2b`'s local_bit==1 half with block `2b+1`'s local_bit==0 half.
    let num_blocks = slice.len() / block_len;
    let block_stride = 1usize << (unit_bit + 1);
    for base in (0..num_blocks).step_by(block_stride) {
        let lo_block = base;
        let hi_block = base + (1 << unit_bit);
        if hi_block >= num_blocks {
            continue;
        }
        for offset in (0..block_len).step_by(stride) {
            let lo_start = lo_block * block_len + offset + chunk_len;
            let hi_start = hi_block * block_len + offset;
            for k in 0..chunk_len {
                slice.swap(lo_start + k, hi_start + k);
            }
        }
    }
}
