//! Error kinds, per `spec.md` §7 "Error handling design".
//!
//! Every fallible engine call returns [`EngineError`]; the engine
//! never attempts partial recovery and never calls `process::exit`
//! itself — only the `cli` driver decides exit codes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad command line / config value, `N` too small for `world_size`,
    /// a gate-list source that could not be opened.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A gate variant is not implemented for the current
    /// partition/page configuration.
    #[error("unsupported for this partition: kernel `{kernel}` ({detail})")]
    Unsupported {
        kernel: &'static str,
        detail: String,
    },

    /// Qubit index out of range, duplicate target/control, or a
    /// control/target overlap a variant forbids.
    #[error("malformed gate: {detail}")]
    MalformedGate { detail: String },

    /// NaN or infinity observed during a probability reduction, or a
    /// projection that would discard all probability mass.
    #[error("arithmetic error: {detail}")]
    Arithmetic { detail: String },

    /// A simulated-rank data exchange failed. Stands in for the
    /// "any collective reporting failure is fatal to all ranks" rule
    /// a real MPI `Transport` would enforce.
    #[error("transport error: {0}")]
    Transport(String),

    /// Output stream failure on the root rank.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EngineResult<T = ()> = Result<T, EngineError>;
