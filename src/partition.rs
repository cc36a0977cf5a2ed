//! Partitioning policy, `spec.md` §4.C: maps physical bit positions to
//! local/unit/global tiers and answers the six placement queries.

use crate::{
    config::{PartitionMode, RunConfig},
    error::EngineError,
    types::RankId,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartitionPolicy {
    /// `N = L + G`; each rank owns exactly one block of `2^L` amplitudes.
    Simple { local_qubits: usize, world_size: usize },
    /// `N = L + U + G`; `procs_per_unit` ranks cooperate on the data
    /// blocks of one replica.
    Unit {
        local_qubits: usize,
        unit_qubits: usize,
        procs_per_unit: usize,
        world_size: usize,
    },
}

impl PartitionPolicy {
    /// Build and validate a policy from a [`RunConfig`], per
    /// `spec.md` §4.C / §7 ("configuration" error kind).
    pub fn new(cfg: &RunConfig) -> Result<Self, EngineError> {
        cfg.validate()?;
        let local_qubits = cfg.local_qubits();
        Ok(match cfg.mode {
            PartitionMode::Simple => PartitionPolicy::Simple {
                local_qubits,
                world_size: cfg.world_size,
            },
            PartitionMode::Unit => PartitionPolicy::Unit {
                local_qubits,
                unit_qubits: cfg.num_unit_qubits.unwrap_or(0),
                procs_per_unit: cfg.num_processes_per_unit.unwrap_or(1),
                world_size: cfg.world_size,
            },
        })
    }

    pub fn world_size(&self) -> usize {
        match *self {
            PartitionPolicy::Simple { world_size, .. } => world_size,
            PartitionPolicy::Unit { world_size, .. } => world_size,
        }
    }

    pub fn local_qubits(&self) -> usize {
        match *self {
            PartitionPolicy::Simple { local_qubits, .. } => local_qubits,
            PartitionPolicy::Unit { local_qubits, .. } => local_qubits,
        }
    }

    pub fn global_qubits(&self) -> usize {
        self.world_size().trailing_zeros() as usize
    }

    pub fn unit_qubits(&self) -> usize {
        match *self {
            PartitionPolicy::Simple { .. } => 0,
            PartitionPolicy::Unit { unit_qubits, .. } => unit_qubits,
        }
    }

    fn procs_per_unit(&self) -> usize {
        match *self {
            PartitionPolicy::Simple { .. } => 1,
            PartitionPolicy::Unit { procs_per_unit, .. } => procs_per_unit,
        }
    }

    /// Bits of `unit_qubits` that select a rank within its unit.
    fn unit_rank_bits(&self) -> u32 {
        self.procs_per_unit().trailing_zeros()
    }

    /// Number of data blocks each rank holds (`spec.md` §3 "Local slice").
    pub fn blocks_per_rank(&self) -> usize {
        match *self {
            PartitionPolicy::Simple { .. } => 1,
            PartitionPolicy::Unit { .. } => 1usize << (self.unit_qubits() as u32 - self.unit_rank_bits()),
        }
    }

    /// `N`, the total qubit count this policy addresses.
    pub fn total_qubits(&self) -> usize {
        self.local_qubits() + self.unit_qubits() + self.global_qubits()
    }

    /// The `G`-bit integer formed by `rank`'s global bits.
    pub fn global_bit_value(&self, rank: RankId) -> usize {
        rank.as_usize() / self.procs_per_unit()
    }

    /// `rank`'s position within its unit (unit mode only; always 0 in
    /// simple mode since `procs_per_unit == 1`).
    pub fn rank_in_unit(&self, rank: RankId) -> usize {
        rank.as_usize() % self.procs_per_unit()
    }

    /// The `U`-bit pattern addressed by `data_block_index` on the rank
    /// at `rank_in_unit` within its unit.
    pub fn unit_qubit_value(&self, data_block_index: usize, rank_in_unit: usize) -> usize {
        let shift = self.unit_qubits() as u32 - self.unit_rank_bits();
        (rank_in_unit << shift) | data_block_index
    }

    /// Locate which `(rank, local_offset)` holds amplitude `a[v]`.
    pub fn qubit_value_to_rank_index(&self, v: usize) -> (RankId, usize) {
        let l = self.local_qubits();
        let u = self.unit_qubits();
        let local_mask = (1usize << l) - 1;
        let local_bits = v & local_mask;
        let global_val = v >> (l + u);
        match *self {
            PartitionPolicy::Simple { .. } => (RankId(global_val), local_bits),
            PartitionPolicy::Unit { procs_per_unit, .. } => {
                let unit_mask = (1usize << u) - 1;
                let unit_val = (v >> l) & unit_mask;
                let rank_bits = self.unit_rank_bits();
                let rank_in_unit = unit_val >> (u as u32 - rank_bits);
                let data_block_index = unit_val & ((1usize << (u as u32 - rank_bits)) - 1);
                let rank = global_val * procs_per_unit + rank_in_unit;
                let local_offset = (data_block_index << l) | local_bits;
                (RankId(rank), local_offset)
            }
        }
    }

    /// Invert [`Self::qubit_value_to_rank_index`].
    pub fn rank_index_to_qubit_value(&self, rank: RankId, local_offset: usize) -> usize {
        let l = self.local_qubits();
        let u = self.unit_qubits();
        let local_mask = (1usize << l) - 1;
        match *self {
            PartitionPolicy::Simple { .. } => (rank.as_usize() << l) | (local_offset & local_mask),
            PartitionPolicy::Unit { procs_per_unit, .. } => {
                let rank_bits = self.unit_rank_bits();
                let global_val = rank.as_usize() / procs_per_unit;
                let rank_in_unit = rank.as_usize() % procs_per_unit;
                let data_block_index = local_offset >> l;
                let local_bits = local_offset & local_mask;
                let unit_val = (rank_in_unit << (u as u32 - rank_bits)) | data_block_index;
                (global_val << (l + u)) | (unit_val << l) | local_bits
            }
        }
    }
}
