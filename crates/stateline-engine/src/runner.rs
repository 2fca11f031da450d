//! Program execution against the real system.
//!
//! The runner only observes: it substitutes handles, calls the real
//! commands, and records what happened. Judging the observations against
//! the model is the linearizer's job.

use stateline_core::{
    substitute, Bindings, Caught, EngineError, ExecOutcome, Handle, Invocation, Program, Spec,
    Value,
};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;
use tracing::{debug, warn};

/// What one invocation did: the captured outcome plus a string form of it
/// taken immediately after execution. The snapshot is compared against a
/// later rendering to flag objects mutated after the fact.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub outcome: ExecOutcome,
    pub snapshot: String,
}

/// The full execution trace of one program run.
#[derive(Debug, Clone)]
pub struct RunTrace {
    /// The concrete setup result, when the spec has a setup callback.
    pub setup: Option<Value>,
    pub sequential: Vec<StepRecord>,
    pub threads: Vec<Vec<StepRecord>>,
}

/// Failure to execute a program at all. User-command failures are not
/// errors — they are captured in the trace as [`ExecOutcome::Caught`].
#[derive(Debug, Error)]
pub enum RunError {
    #[error("setup failed: {0}")]
    Setup(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Execute a program: setup, the sequential prefix in order, then every
/// parallel thread concurrently on its own OS thread. Cleanup runs on
/// every exit path; a cleanup failure is logged and never masks the
/// run's outcome.
pub fn run_program<S: Clone>(
    spec: &Spec<S>,
    program: &Program<S>,
    stacktrace: bool,
) -> Result<RunTrace, RunError> {
    let mut bindings = Bindings::new();
    let mut setup_value = None;
    if let Some(result) = spec.setup() {
        match result {
            Ok(v) => {
                bindings.bind(Handle::SETUP, ExecOutcome::Ok(v.clone()));
                setup_value = Some(v);
            }
            Err(message) => return Err(RunError::Setup(message)),
        }
    }

    let result = execute(program, &mut bindings, stacktrace);

    if spec.has_cleanup() {
        let cleaned = catch_unwind(AssertUnwindSafe(|| spec.cleanup(setup_value.as_ref())));
        if cleaned.is_err() {
            warn!("cleanup panicked; preserving the run's outcome");
        }
    }

    let (sequential, threads) = result?;
    Ok(RunTrace {
        setup: setup_value,
        sequential,
        threads,
    })
}

fn execute<S>(
    program: &Program<S>,
    bindings: &mut Bindings,
    stacktrace: bool,
) -> Result<(Vec<StepRecord>, Vec<Vec<StepRecord>>), EngineError> {
    let mut sequential = Vec::with_capacity(program.sequential.len());
    for inv in &program.sequential {
        let record = run_invocation(inv, bindings, stacktrace)?;
        bindings.bind(inv.handle, record.outcome.clone());
        sequential.push(record);
    }

    // All sequential bindings are published before any thread starts;
    // spawning inside the scope gives each thread the happens-before it
    // needs to read them. Threads bind only their own results.
    let threads: Vec<Result<Vec<StepRecord>, EngineError>> =
        if program.threads.iter().any(|t| !t.is_empty()) {
            let shared: &Bindings = bindings;
            std::thread::scope(|scope| {
                let joins: Vec<_> = program
                    .threads
                    .iter()
                    .map(|invs| scope.spawn(move || run_thread(invs, shared, stacktrace)))
                    .collect();
                joins
                    .into_iter()
                    .map(|j| j.join().expect("runner thread panicked"))
                    .collect()
            })
        } else {
            program.threads.iter().map(|_| Ok(Vec::new())).collect()
        };
    let threads = threads.into_iter().collect::<Result<Vec<_>, _>>()?;

    Ok((sequential, threads))
}

fn run_thread<S>(
    invocations: &[Invocation<S>],
    shared: &Bindings,
    stacktrace: bool,
) -> Result<Vec<StepRecord>, EngineError> {
    let mut local = shared.clone();
    let mut records = Vec::with_capacity(invocations.len());
    for inv in invocations {
        let record = run_invocation(inv, &local, stacktrace)?;
        local.bind(inv.handle, record.outcome.clone());
        records.push(record);
    }
    Ok(records)
}

fn run_invocation<S>(
    inv: &Invocation<S>,
    bindings: &Bindings,
    stacktrace: bool,
) -> Result<StepRecord, EngineError> {
    let concrete = substitute(inv.args(), bindings)?;
    let outcome = match catch_unwind(AssertUnwindSafe(|| inv.command.run(&concrete))) {
        Ok(Ok(value)) => ExecOutcome::Ok(value),
        Ok(Err(message)) => ExecOutcome::Caught(caught(message, stacktrace)),
        Err(payload) => ExecOutcome::Caught(caught(panic_message(payload), stacktrace)),
    };
    // Snapshot before anything else can touch the returned object.
    let snapshot = outcome.to_string();
    debug!(invocation = %inv, outcome = %snapshot, "executed");
    Ok(StepRecord { outcome, snapshot })
}

fn caught(message: String, stacktrace: bool) -> Caught {
    let c = Caught::new(message);
    if stacktrace {
        c.with_backtrace(std::backtrace::Backtrace::force_capture().to_string())
    } else {
        c
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
