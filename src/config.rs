//! Runtime configuration the driver supplies once, per `spec.md` §6
//! "Runtime configuration".

use crate::{error::EngineError, math::N};

#[cfg_attr(feature = "gate-stream", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PartitionMode {
    #[default]
    Simple,
    Unit,
}

#[cfg_attr(feature = "gate-stream", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunConfig {
    /// Total qubit count `N`.
    pub num_qubits: N,
    /// MPI-communicator size in the real protocol; the number of
    /// simulated ranks here.
    pub world_size: N,
    pub mode: PartitionMode,
    /// Required iff `mode == Unit`; `0 <= num_unit_qubits <= N - log2(world_size)`.
    pub num_unit_qubits: Option<N>,
    /// Required iff `mode == Unit`; must divide `world_size`.
    pub num_processes_per_unit: Option<N>,
    /// Intra-process parallelism width; `>= 1`, default 1.
    pub num_threads_per_process: N,
    /// `0 <= num_page_qubits <= L`; default 2.
    pub num_page_qubits: N,
    /// Seed for the measurement PRNG; default 1.
    pub seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            num_qubits: 1,
            world_size: 1,
            mode: PartitionMode::Simple,
            num_unit_qubits: None,
            num_processes_per_unit: None,
            num_threads_per_process: 1,
            num_page_qubits: 2,
            seed: 1,
        }
    }
}

impl RunConfig {
    /// Validate the configuration, per `spec.md` §7 "configuration"
    /// error kind.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.world_size == 0 || !self.world_size.is_power_of_two() {
            return Err(EngineError::Configuration(format!(
                "world_size must be a power of two, got {}",
                self.world_size
            )));
        }
        let g = self.world_size.trailing_zeros() as N;
        if self.num_qubits < g {
            return Err(EngineError::Configuration(format!(
                "N={} is too small for world_size={} (needs >= {} qubits)",
                self.num_qubits, self.world_size, g
            )));
        }
        if self.num_threads_per_process == 0 {
            return Err(EngineError::Configuration(
                "num_threads_per_process must be >= 1".into(),
            ));
        }
        match self.mode {
            PartitionMode::Simple => {
                if self.num_unit_qubits.is_some() || self.num_processes_per_unit.is_some() {
                    return Err(EngineError::Configuration(
                        "num_unit_qubits/num_processes_per_unit only apply in unit mode".into(),
                    ));
                }
            }
            PartitionMode::Unit => {
                let u = self.num_unit_qubits.ok_or_else(|| {
                    EngineError::Configuration("unit mode requires num_unit_qubits".into())
                })?;
                let ppu = self.num_processes_per_unit.ok_or_else(|| {
                    EngineError::Configuration(
                        "unit mode requires num_processes_per_unit".into(),
                    )
                })?;
                if u > self.num_qubits - g {
                    return Err(EngineError::Configuration(format!(
                        "num_unit_qubits={} exceeds N - log2(world_size) = {}",
                        u,
                        self.num_qubits - g
                    )));
                }
                if ppu == 0 || self.world_size % ppu != 0 {
                    return Err(EngineError::Configuration(format!(
                        "num_processes_per_unit={} must divide world_size={}",
                        ppu, self.world_size
                    )));
                }
                // ppu ranks split the unit tier's 2^u data blocks among
                // themselves; log2(ppu) of those bits select the rank,
                // so there must be at least that many to spend.
                let rank_bits = ppu.trailing_zeros() as N;
                if rank_bits > u {
                    return Err(EngineError::Configuration(format!(
                        "num_processes_per_unit={} needs {} unit bits to select a rank, but num_unit_qubits={}",
                        ppu, rank_bits, u
                    )));
                }
            }
        }
        let l = self.local_qubits();
        if self.num_page_qubits > l {
            return Err(EngineError::Configuration(format!(
                "num_page_qubits={} exceeds local qubit count L={}",
                self.num_page_qubits, l
            )));
        }
        Ok(())
    }

    /// `L`, the number of local qubits, derived from `N`, `world_size`
    /// and (in unit mode) `num_unit_qubits`.
    pub fn local_qubits(&self) -> N {
        let g = self.world_size.trailing_zeros() as N;
        let u = match self.mode {
            PartitionMode::Simple => 0,
            PartitionMode::Unit => self.num_unit_qubits.unwrap_or(0),
        };
        self.num_qubits.saturating_sub(g + u)
    }

    pub fn global_qubits(&self) -> N {
        self.world_size.trailing_zeros() as N
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_mode_defaults_validate() {
        let cfg = RunConfig {
            num_qubits: 4,
            world_size: 2,
            ..Default::default()
        };
        cfg.validate().unwrap();
        assert_eq!(cfg.local_qubits(), 3);
        assert_eq!(cfg.global_qubits(), 1);
    }

    #[test]
    fn n_too_small_for_world_size_is_configuration_error() {
        let cfg = RunConfig {
            num_qubits: 1,
            world_size: 4,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn unit_mode_requires_unit_fields() {
        let cfg = RunConfig {
            num_qubits: 6,
            world_size: 2,
            mode: PartitionMode::Unit,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn unit_mode_rejects_more_ranks_per_unit_than_unit_bits() {
        // num_unit_qubits=0 has no bits to spend on a rank index, but
        // num_processes_per_unit=2 would need one.
        let cfg = RunConfig {
            num_qubits: 6,
            world_size: 2,
            mode: PartitionMode::Unit,
            num_unit_qubits: Some(0),
            num_processes_per_unit: Some(2),
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn unit_mode_accepts_exact_fit_of_ranks_to_unit_bits() {
        let cfg = RunConfig {
            num_qubits: 7,
            world_size: 4,
            mode: PartitionMode::Unit,
            num_unit_qubits: Some(2),
            num_processes_per_unit: Some(2),
            ..Default::default()
        };
        cfg.validate().unwrap();
    }
}
