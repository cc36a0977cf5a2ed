//! The gate-stream wire format, `spec.md` §6 "Gate-list input": a
//! finite ordered sequence of tagged records, each carrying logical
//! qubit indices, control polarities, and phase parameters. The
//! textual circuit-file parser that would produce this sequence is a
//! Non-goal; this module only defines the record shape the
//! interpreter consumes (per "Cyclic / polymorphic gate hierarchy" in
//! `SPEC_FULL.md`'s Design Notes: a closed tagged-variant instead of
//! the abstract-gate-with-virtual-descendants shape).

use crate::{error::EngineError, types::LogicalQubit};

#[cfg_attr(feature = "gate-stream", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LogicalControl {
    pub qubit: LogicalQubit,
    pub fire_on: bool,
}

/// Either an angle in radians or an explicit complex coefficient, per
/// "coefficient forms" in `spec.md` §6.
#[cfg_attr(feature = "gate-stream", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GateParam {
    Angle(f64),
    /// `(re, im)`, kept as a plain pair rather than `num_complex::Complex`
    /// so this type needs no extra serde feature on that dependency.
    Coefficient(f64, f64),
}

impl GateParam {
    pub fn to_coeff(self) -> crate::math::C {
        match self {
            GateParam::Angle(rad) => crate::math::phase_from_rad(rad),
            GateParam::Coefficient(re, im) => crate::math::C::new(re, im),
        }
    }

    /// Only meaningful when the param was built from an angle; used by
    /// kernels (e.g. exp-SWAP) whose action is not expressible as a
    /// single phase coefficient alone.
    pub fn angle_or(self, fallback: f64) -> f64 {
        match self {
            GateParam::Angle(rad) => rad,
            GateParam::Coefficient(..) => fallback,
        }
    }
}

/// One tagged record of the gate stream. Every tag in `spec.md` §6's
/// enumerated set is represented; `adjoint` distinguishes each record's
/// adjoint form where the spec calls for one.
#[cfg_attr(feature = "gate-stream", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "gate-stream", serde(tag = "gate"))]
pub enum GateRecord {
    Hadamard { target: LogicalQubit, adjoint: bool },
    PauliX { target: LogicalQubit, controls: Vec<LogicalControl>, adjoint: bool },
    PauliY { target: LogicalQubit, controls: Vec<LogicalControl>, adjoint: bool },
    PauliZ { target: LogicalQubit, adjoint: bool },
    SqrtZ { target: LogicalQubit, adjoint: bool },
    XRotationHalfPi { target: LogicalQubit, adjoint: bool },
    YRotationHalfPi { target: LogicalQubit, adjoint: bool },
    U1 { target: LogicalQubit, lambda: GateParam, adjoint: bool },
    U2 { target: LogicalQubit, phi: f64, lambda: f64, adjoint: bool },
    U3 { target: LogicalQubit, theta: f64, phi: f64, lambda: f64, adjoint: bool },
    ExpPauliX { qubits: Vec<LogicalQubit>, param: GateParam, adjoint: bool },
    ExpPauliY { qubits: Vec<LogicalQubit>, param: GateParam, adjoint: bool },
    ExpPauliZ { qubits: Vec<LogicalQubit>, param: GateParam, adjoint: bool },
    Cnot { target: LogicalQubit, control: LogicalQubit, adjoint: bool },
    Toffoli { target: LogicalQubit, control1: LogicalQubit, control2: LogicalQubit },
    ControlledPhase { controls: Vec<LogicalQubit>, target: LogicalQubit, param: GateParam, adjoint: bool },
    ControlledV {
        control: LogicalQubit,
        target: LogicalQubit,
        matrix: [(f64, f64); 4],
        adjoint: bool,
    },
    /// `CnUm` generalization: one arbitrary single-qubit unitary
    /// applied to `target`, firing only when every entry of `controls`
    /// matches its polarity (`spec.md` §6 "multi-target and
    /// multi-control variants (CnUm) ... up to F_MAX operated qubits").
    MultiControlledUnitary {
        target: LogicalQubit,
        controls: Vec<LogicalControl>,
        matrix: [(f64, f64); 4],
        adjoint: bool,
    },
    Swap { a: LogicalQubit, b: LogicalQubit },
    ExpSwap { a: LogicalQubit, b: LogicalQubit, theta: f64, adjoint: bool },
    Clear { qubit: LogicalQubit },
    Set { qubit: LogicalQubit },
    /// Destructive measurement of the entire register, collapsing to
    /// one basis state (`spec.md` §6 output record 3, "Measurement
    /// result: v"). Single-qubit projective measurement is exposed as
    /// a library primitive ([`crate::measurement::single_qubit`]) but
    /// has no gate tag of its own in the enumerated set.
    ProjectiveMeasurement,
    BeginMeasurement,
    EndOfOperations,
    GenerateEvents { count: usize },
    /// Accepted for format completeness; the modular-exponentiation
    /// routine it denotes is a composite built from this crate's
    /// primitives, not something this crate expands itself (`spec.md`
    /// §1 lists Shor box among the higher-level routines that remain
    /// external collaborators). Dispatch surfaces
    /// [`crate::error::EngineError::Unsupported`].
    ShorBox { base: u64, modulus: u64, qubits: Vec<LogicalQubit> },
    /// `|<reference_index|psi>|^2`, the "fidelity against a stored
    /// circuit index" diagnostic.
    Fidelity { reference_index: usize },
}

impl GateRecord {
    /// The logical qubits this record reads or writes, in no
    /// particular order. Used by [`crate::fusion::FusionCache`] to
    /// compute a run's union operated-qubit set and by the interpreter
    /// to decide which qubits must be made local before dispatch.
    pub fn operated_qubits(&self) -> Vec<LogicalQubit> {
        use GateRecord::*;
        match self {
            Hadamard { target, .. }
            | PauliZ { target, .. }
            | SqrtZ { target, .. }
            | XRotationHalfPi { target, .. }
            | YRotationHalfPi { target, .. }
            | U1 { target, .. }
            | U2 { target, .. }
            | U3 { target, .. }
            | Clear { qubit: target }
            | Set { qubit: target } => vec![*target],
            PauliX { target, controls, .. } | PauliY { target, controls, .. } => {
                let mut v: Vec<_> = controls.iter().map(|c| c.qubit).collect();
                v.push(*target);
                v
            }
            ExpPauliX { qubits, .. } | ExpPauliY { qubits, .. } | ExpPauliZ { qubits, .. } => qubits.clone(),
            Cnot { target, control, .. } => vec![*target, *control],
            Toffoli { target, control1, control2 } => vec![*target, *control1, *control2],
            ControlledPhase { controls, target, .. } => {
                let mut v = controls.clone();
                v.push(*target);
                v
            }
            ControlledV { control, target, .. } => vec![*control, *target],
            MultiControlledUnitary { target, controls, .. } => {
                let mut v: Vec<_> = controls.iter().map(|c| c.qubit).collect();
                v.push(*target);
                v
            }
            Swap { a, b } | ExpSwap { a, b, .. } => vec![*a, *b],
            ShorBox { qubits, .. } => qubits.clone(),
            ProjectiveMeasurement | BeginMeasurement | EndOfOperations | GenerateEvents { .. } | Fidelity { .. } => vec![],
        }
    }

    /// Catches the `spec.md` §7 "malformed gate" cases the interpreter
    /// must reject *before* translating anything through the
    /// permutation map: an operated qubit `>= num_qubits`, or a
    /// duplicate target/control (which also covers a control
    /// overlapping its own target). Called once per record at the top
    /// of [`crate::interpreter::Interpreter::run`], ahead of fusion and
    /// `ensure_local`, so an out-of-range index never reaches
    /// `PermutationMap::lookup`'s direct array index.
    pub fn validate(&self, num_qubits: usize) -> Result<(), EngineError> {
        let mut qs = self.operated_qubits();
        for &q in &qs {
            if q >= num_qubits {
                return Err(EngineError::MalformedGate {
                    detail: format!("qubit index {q} out of range for N={num_qubits}"),
                });
            }
        }
        qs.sort_unstable();
        if qs.windows(2).any(|w| w[0] == w[1]) {
            return Err(EngineError::MalformedGate {
                detail: "duplicate target/control qubit in gate".into(),
            });
        }
        if let GateRecord::Fidelity { reference_index } = self {
            let limit = 1usize.checked_shl(num_qubits as u32).unwrap_or(usize::MAX);
            if *reference_index >= limit {
                return Err(EngineError::MalformedGate {
                    detail: format!("fidelity reference index {reference_index} out of range for N={num_qubits}"),
                });
            }
        }
        Ok(())
    }

    /// Whether the fusion cache may fold this record into a run
    /// (`spec.md` §4.H: "gates not safe to fuse (measurements,
    /// population transfer, non-unitary projections) terminate the
    /// current fused block").
    pub fn is_fusable(&self) -> bool {
        !matches!(
            self,
            GateRecord::Clear { .. }
                | GateRecord::Set { .. }
                | GateRecord::ProjectiveMeasurement
                | GateRecord::BeginMeasurement
                | GateRecord::EndOfOperations
                | GateRecord::GenerateEvents { .. }
                | GateRecord::ShorBox { .. }
                | GateRecord::Fidelity { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operated_qubits_include_controls() {
        let g = GateRecord::Cnot { target: 0, control: 1, adjoint: false };
        let mut qs = g.operated_qubits();
        qs.sort();
        assert_eq!(qs, vec![0, 1]);
    }

    #[test]
    fn measurement_tags_are_not_fusable() {
        assert!(!GateRecord::ProjectiveMeasurement.is_fusable());
        assert!(GateRecord::Hadamard { target: 0, adjoint: false }.is_fusable());
    }

    #[test]
    fn validate_rejects_out_of_range_qubit() {
        let g = GateRecord::Hadamard { target: 3, adjoint: false };
        assert!(matches!(g.validate(3), Err(EngineError::MalformedGate { .. })));
        assert!(g.validate(4).is_ok());
    }

    #[test]
    fn validate_rejects_control_overlapping_target() {
        let g = GateRecord::Cnot { target: 0, control: 0, adjoint: false };
        assert!(matches!(g.validate(2), Err(EngineError::MalformedGate { .. })));
    }

    #[test]
    fn validate_rejects_out_of_range_fidelity_reference() {
        let g = GateRecord::Fidelity { reference_index: 8 };
        assert!(matches!(g.validate(3), Err(EngineError::MalformedGate { .. })));
        assert!(g.validate(4).is_ok());
    }
}
