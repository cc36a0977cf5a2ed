//! Batch gate-stream driver (`spec.md` §6 "External interfaces"),
//! feature `cli`: reads a JSON array of tagged gate records from a
//! file or standard input, runs them through the interpreter, and
//! writes the four output record types to standard output.

use std::{
    io::{Read, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;

use ampvec::{
    config::{PartitionMode, RunConfig},
    error::EngineError,
    gate::GateRecord,
    interpreter::{EngineContext, Interpreter, Output},
    measurement::PauliExpectation,
};

#[derive(Parser, Debug)]
#[command(name = "ampvec-run", author, version, about = "Run a gate stream against the distributed amplitude vector simulator", long_about = None)]
struct CliArgs {
    /// Gate-stream JSON file; standard input if omitted.
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Total qubit count N.
    #[arg(short = 'n', long)]
    num_qubits: usize,

    /// Number of simulated ranks; must be a power of two.
    #[arg(long, default_value_t = 1)]
    world_size: usize,

    /// Partitioning mode.
    #[arg(long, value_enum, default_value_t = CliPartitionMode::Simple)]
    mode: CliPartitionMode,

    #[arg(long)]
    num_unit_qubits: Option<usize>,

    #[arg(long)]
    num_processes_per_unit: Option<usize>,

    /// Intra-process parallelism width.
    #[arg(long, default_value_t = 1)]
    num_threads_per_process: usize,

    /// Page qubit count; defaults to 2 when world_size > 1, else 0.
    #[arg(long)]
    num_page_qubits: Option<usize>,

    /// Measurement PRNG seed.
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Initial basis-state index k.
    #[arg(long, default_value_t = 0)]
    initial_k: usize,

    /// Enable "[start]"/"[end]" timing log lines on standard error.
    #[arg(long)]
    log_timings: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum CliPartitionMode {
    Simple,
    Unit,
}

struct StdoutOutput<W: Write> {
    out: W,
    num_qubits: usize,
}

impl<W: Write> Output for StdoutOutput<W> {
    fn operations_finished(&mut self, cumulative: f64, delta: f64) {
        let _ = writeln!(self.out, "Operations finished: {cumulative:.6} {delta:.6}");
    }

    fn expectation_values(&mut self, table: &[PauliExpectation], cumulative: f64, delta: f64) {
        for (q, e) in table.iter().enumerate() {
            let _ = writeln!(self.out, "<Q{q}_x> = {:.6}  <Q{q}_y> = {:.6}  <Q{q}_z> = {:.6}", e.x, e.y, e.z);
        }
        let _ = writeln!(self.out, "Expectation values finished: {cumulative:.6} {delta:.6}");
    }

    fn measurement_result(&mut self, value: usize, cumulative: f64, delta: f64) {
        let _ = writeln!(self.out, "Measurement result: {value}");
        let _ = writeln!(self.out, "Measurement finished: {cumulative:.6} {delta:.6}");
    }

    fn events(&mut self, values: &[usize], cumulative: f64, delta: f64) {
        let _ = writeln!(self.out, "Events:");
        for (i, &v) in values.iter().enumerate() {
            let _ = writeln!(self.out, "{i} {v:0width$b}", width = self.num_qubits);
        }
        let _ = writeln!(self.out, "Events finished: {cumulative:.6} {delta:.6}");
    }

    fn fidelity(&mut self, reference_index: usize, value: f64, _cumulative: f64, _delta: f64) {
        let _ = writeln!(self.out, "Fidelity against {reference_index}: {value:.9}");
    }
}

fn run(args: CliArgs) -> Result<(), EngineError> {
    let num_page_qubits = args.num_page_qubits.unwrap_or(if args.world_size > 1 { 2 } else { 0 });
    let cfg = RunConfig {
        num_qubits: args.num_qubits,
        world_size: args.world_size,
        mode: match args.mode {
            CliPartitionMode::Simple => PartitionMode::Simple,
            CliPartitionMode::Unit => PartitionMode::Unit,
        },
        num_unit_qubits: args.num_unit_qubits,
        num_processes_per_unit: args.num_processes_per_unit,
        num_threads_per_process: args.num_threads_per_process,
        num_page_qubits,
        seed: args.seed,
    };

    let raw = match &args.input {
        Some(path) => std::fs::read_to_string(path).map_err(EngineError::Io)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).map_err(EngineError::Io)?;
            buf
        }
    };
    let gates: Vec<GateRecord> = serde_json::from_str(&raw).map_err(|e| EngineError::MalformedGate {
        detail: format!("gate-stream JSON could not be parsed: {e}"),
    })?;

    let mut ctx = EngineContext::new(&cfg, args.initial_k, args.log_timings)?;
    let mut output = StdoutOutput {
        out: std::io::stdout().lock(),
        num_qubits: args.num_qubits,
    };
    Interpreter::run(&mut ctx, gates, &mut output)
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ampvec-run: {err}");
            ExitCode::FAILURE
        }
    }
}
