#![allow(dead_code)]
#![warn(clippy::cargo)]
#![allow(clippy::comparison_chain)]
#![doc = include_str!("../README.md")]

pub mod config;
pub mod container;
pub mod error;
pub mod fusion;
pub mod gate;
pub mod index_math;
pub mod interchange;
pub mod interpreter;
pub mod kernel;
pub mod logger;
pub mod math;
pub mod measurement;
#[cfg(feature = "parallel")]
pub mod parallel;
pub mod partition;
pub mod permutation;
pub mod types;

#[doc(hidden)]
pub mod prelude {
    pub use crate::{
        config::{PartitionMode, RunConfig},
        container::Container,
        error::{EngineError, EngineResult},
        gate::{GateParam, GateRecord, LogicalControl},
        interpreter::{EngineContext, EventKind, Interpreter, Output},
        partition::PartitionPolicy,
        permutation::PermutationMap,
        types::{LogicalQubit, PhysicalBit, RankId, F_MAX},
    };
}
