//! End-to-end scenarios over the public interpreter API.

use ampvec::{
    config::RunConfig,
    gate::{GateParam, GateRecord},
    interpreter::{EngineContext, Interpreter, Output},
    measurement::PauliExpectation,
    types::RankId,
};

#[derive(Default)]
struct Recorder {
    finished: Vec<(f64, f64)>,
    expectations: Vec<Vec<(f64, f64, f64)>>,
    measurements: Vec<usize>,
    event_lists: Vec<Vec<usize>>,
    fidelities: Vec<(usize, f64)>,
}

impl Output for Recorder {
    fn operations_finished(&mut self, cumulative: f64, delta: f64) {
        self.finished.push((cumulative, delta));
    }
    fn expectation_values(&mut self, table: &[PauliExpectation], _cumulative: f64, _delta: f64) {
        self.expectations.push(table.iter().map(|e| (e.x, e.y, e.z)).collect());
    }
    fn measurement_result(&mut self, value: usize, _cumulative: f64, _delta: f64) {
        self.measurements.push(value);
    }
    fn events(&mut self, values: &[usize], _cumulative: f64, _delta: f64) {
        self.event_lists.push(values.to_vec());
    }
    fn fidelity(&mut self, reference_index: usize, value: f64, _cumulative: f64, _delta: f64) {
        self.fidelities.push((reference_index, value));
    }
}

fn cfg(num_qubits: usize, world_size: usize) -> RunConfig {
    RunConfig {
        num_qubits,
        world_size,
        num_page_qubits: 0,
        ..Default::default()
    }
}

const FRAC_1_SQRT_2: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Scenario 1: Hadamard on |000>, then measure q0.
#[test]
fn scenario_hadamard_then_measure() {
    let mut ctx = EngineContext::new(&cfg(3, 1), 0, false).unwrap();
    let mut out = Recorder::default();
    let gates = vec![
        GateRecord::Hadamard { target: 0, adjoint: false },
        GateRecord::EndOfOperations,
    ];
    Interpreter::run(&mut ctx, gates, &mut out).unwrap();
    let slice = ctx.container.slice(RankId(0));
    assert!((slice[0b000] - num_complex::Complex::new(FRAC_1_SQRT_2, 0.0)).norm() < 1e-9);
    assert!((slice[0b001] - num_complex::Complex::new(FRAC_1_SQRT_2, 0.0)).norm() < 1e-9);
    for v in [0b010, 0b011, 0b100, 0b101, 0b110, 0b111] {
        assert!(slice[v].norm() < 1e-9);
    }
    assert_eq!(out.finished.len(), 1);

    // Measuring collapses deterministically onto q0's outcome; either
    // basis state below is a legal post-measurement result.
    let mut out2 = Recorder::default();
    Interpreter::run(&mut ctx, vec![GateRecord::ProjectiveMeasurement], &mut out2).unwrap();
    let result = out2.measurements[0];
    assert!(result == 0b000 || result == 0b001);
    let slice = ctx.container.slice(RankId(0));
    for (v, amp) in slice.iter().enumerate() {
        if v == result {
            assert!((amp.norm() - 1.0).abs() < 1e-9);
        } else {
            assert!(amp.norm() < 1e-9);
        }
    }
}

/// Scenario 2: Bell pair.
#[test]
fn scenario_bell_pair() {
    let mut ctx = EngineContext::new(&cfg(2, 1), 0, false).unwrap();
    let mut out = Recorder::default();
    let gates = vec![
        GateRecord::Hadamard { target: 0, adjoint: false },
        GateRecord::Cnot { target: 1, control: 0, adjoint: false },
        GateRecord::BeginMeasurement,
    ];
    Interpreter::run(&mut ctx, gates, &mut out).unwrap();
    let slice = ctx.container.slice(RankId(0));
    assert!((slice[0b00] - num_complex::Complex::new(FRAC_1_SQRT_2, 0.0)).norm() < 1e-9);
    assert!((slice[0b11] - num_complex::Complex::new(FRAC_1_SQRT_2, 0.0)).norm() < 1e-9);
    assert!(slice[0b01].norm() < 1e-9);
    assert!(slice[0b10].norm() < 1e-9);

    let table = &out.expectations[0];
    assert!(table[0].2.abs() < 1e-9); // <Q0_z>
    assert!(table[1].2.abs() < 1e-9); // <Q1_z>

    let mut out2 = Recorder::default();
    Interpreter::run(&mut ctx, vec![GateRecord::ProjectiveMeasurement], &mut out2).unwrap();
    let result = out2.measurements[0];
    assert!(result == 0b00 || result == 0b11);
}

/// Scenario 3: Toffoli verifies AND.
#[test]
fn scenario_toffoli_verifies_and() {
    // q0=0, q1=1, q2=1 -> physical value 0b110.
    let mut ctx = EngineContext::new(&cfg(3, 1), 0b110, false).unwrap();
    let mut out = Recorder::default();
    let gates = vec![GateRecord::Toffoli { target: 0, control1: 1, control2: 2 }];
    Interpreter::run(&mut ctx, gates, &mut out).unwrap();
    let slice = ctx.container.slice(RankId(0));
    assert!((slice[0b111].norm() - 1.0).abs() < 1e-9);

    // q0=0, q1=0, q2=1 -> unchanged, only one control fires.
    let mut ctx2 = EngineContext::new(&cfg(3, 1), 0b100, false).unwrap();
    let mut out2 = Recorder::default();
    Interpreter::run(&mut ctx2, vec![GateRecord::Toffoli { target: 0, control1: 1, control2: 2 }], &mut out2).unwrap();
    let slice2 = ctx2.container.slice(RankId(0));
    assert!((slice2[0b100].norm() - 1.0).abs() < 1e-9);
}

/// Scenario 4: phase-shift then its adjoint restores |+>.
#[test]
fn scenario_phase_shift_adjoint_restores_state() {
    let mut ctx = EngineContext::new(&cfg(1, 1), 0, false).unwrap();
    let mut out = Recorder::default();
    let theta = std::f64::consts::FRAC_PI_4;
    let gates = vec![
        GateRecord::Hadamard { target: 0, adjoint: false },
        GateRecord::U1 { target: 0, lambda: GateParam::Angle(theta), adjoint: false },
        GateRecord::U1 { target: 0, lambda: GateParam::Angle(theta), adjoint: true },
    ];
    Interpreter::run(&mut ctx, gates, &mut out).unwrap();
    let slice = ctx.container.slice(RankId(0));
    assert!((slice[0] - num_complex::Complex::new(FRAC_1_SQRT_2, 0.0)).norm() < 1e-9);
    assert!((slice[1] - num_complex::Complex::new(FRAC_1_SQRT_2, 0.0)).norm() < 1e-9);
}

/// Scenario 5: interchange round-trip, simple mode, world_size=2.
#[test]
fn scenario_interchange_round_trip() {
    // q0=1, q1=0 with identity pi: physical value 0b01.
    let mut ctx = EngineContext::new(&cfg(2, 2), 0b01, false).unwrap();
    let mut out = Recorder::default();
    Interpreter::run(&mut ctx, vec![GateRecord::PauliX { target: 1, controls: vec![], adjoint: false }], &mut out).unwrap();

    let mut out2 = Recorder::default();
    Interpreter::run(&mut ctx, vec![GateRecord::ProjectiveMeasurement], &mut out2).unwrap();
    assert_eq!(out2.measurements[0], 0b11);
}

/// Scenario 6: generate-events sampling over a uniform 3-qubit superposition.
#[test]
fn scenario_generate_events_sampling_is_uniform() {
    let mut ctx = EngineContext::new(&cfg(3, 1), 0, false).unwrap();
    let mut out = Recorder::default();
    let gates = vec![
        GateRecord::Hadamard { target: 0, adjoint: false },
        GateRecord::Hadamard { target: 1, adjoint: false },
        GateRecord::Hadamard { target: 2, adjoint: false },
        GateRecord::GenerateEvents { count: 10_000 },
    ];
    Interpreter::run(&mut ctx, gates, &mut out).unwrap();
    let events = &out.event_lists[0];
    assert_eq!(events.len(), 10_000);

    let mut histogram = [0u32; 8];
    for &v in events {
        histogram[v] += 1;
    }
    let expected = 10_000.0 / 8.0;
    let variance = 10_000.0 * (1.0 / 8.0) * (7.0 / 8.0);
    let four_sigma = 4.0 * variance.sqrt();
    for count in histogram {
        assert!((count as f64 - expected).abs() < four_sigma, "bucket {count} outside 4-sigma band");
    }
}

/// Clear/Set idempotence (`spec.md` §8 round-trip laws).
#[test]
fn clear_then_measure_is_zero_set_then_measure_is_one() {
    let mut ctx = EngineContext::new(&cfg(1, 1), 0, false).unwrap();
    let mut out = Recorder::default();
    Interpreter::run(&mut ctx, vec![GateRecord::Clear { qubit: 0 }, GateRecord::ProjectiveMeasurement], &mut out).unwrap();
    assert_eq!(out.measurements[0], 0);

    let mut ctx2 = EngineContext::new(&cfg(1, 1), 0, false).unwrap();
    let mut out2 = Recorder::default();
    Interpreter::run(&mut ctx2, vec![GateRecord::Set { qubit: 0 }, GateRecord::ProjectiveMeasurement], &mut out2).unwrap();
    assert_eq!(out2.measurements[0], 1);
}

/// Double-Hadamard, double-X and SWAP-twice round-trips.
#[test]
fn involution_round_trips() {
    let mut ctx = EngineContext::new(&cfg(2, 1), 0b01, false).unwrap();
    let mut out = Recorder::default();
    let gates = vec![
        GateRecord::Hadamard { target: 0, adjoint: false },
        GateRecord::Hadamard { target: 0, adjoint: false },
        GateRecord::PauliX { target: 1, controls: vec![], adjoint: false },
        GateRecord::PauliX { target: 1, controls: vec![], adjoint: false },
        GateRecord::Swap { a: 0, b: 1 },
        GateRecord::Swap { a: 0, b: 1 },
    ];
    Interpreter::run(&mut ctx, gates, &mut out).unwrap();
    let slice = ctx.container.slice(RankId(0));
    assert!((slice[0b01].norm() - 1.0).abs() < 1e-9);
}

/// Shor-box is accepted for format completeness but unsupported at dispatch.
#[test]
fn shor_box_is_unsupported() {
    let mut ctx = EngineContext::new(&cfg(3, 1), 0, false).unwrap();
    let mut out = Recorder::default();
    let gates = vec![GateRecord::ShorBox { base: 2, modulus: 15, qubits: vec![0, 1, 2] }];
    let err = Interpreter::run(&mut ctx, gates, &mut out).unwrap_err();
    assert!(matches!(err, ampvec::error::EngineError::Unsupported { kernel: "shor_box", .. }));
}
