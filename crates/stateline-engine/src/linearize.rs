//! Linearizability checking.
//!
//! Given a program and its captured execution trace, walk the sequential
//! prefix, then search the interleavings of the parallel threads
//! depth-first in fixed thread order. A step is viable when its captured
//! outcome is a value, its concrete precondition holds and its
//! postcondition holds against the model transition; the run is accepted
//! iff some complete interleaving is viable and the terminal invariant
//! holds at its end.

use crate::runner::{RunTrace, StepRecord};
use smallvec::{smallvec, SmallVec};
use stateline_core::{
    substitute, Bindings, EngineError, ExecOutcome, Handle, Invocation, Program, Spec, SymValue,
};
use tracing::debug;

/// Why a run failed linearization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// A sequential invocation threw; no interleaving can absorb it.
    SequentialException { index: usize },
    /// A sequential pre- or postcondition failed; the prefix is common
    /// to every interleaving.
    SequentialStep { index: usize },
    /// A parallel invocation threw; every interleaving contains it.
    ParallelException { thread: usize, index: usize },
    /// All interleavings exhausted without satisfying the postconditions.
    NoValidInterleaving,
    /// The terminal spec postcondition failed.
    FinalInvariant,
}

/// Verdict of the linearizability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinearizeOutcome {
    Accepted,
    Rejected(RejectReason),
}

impl LinearizeOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, LinearizeOutcome::Accepted)
    }
}

type Slot<'a, S> = (&'a Invocation<S>, &'a StepRecord);

/// Check a run. Enumeration order is fixed (thread index order), so the
/// verdict for a given program and trace is deterministic.
pub fn linearize<S: Clone>(
    spec: &Spec<S>,
    program: &Program<S>,
    trace: &RunTrace,
) -> Result<LinearizeOutcome, EngineError> {
    debug_assert_eq!(program.sequential.len(), trace.sequential.len());
    debug_assert_eq!(program.threads.len(), trace.threads.len());

    let setup_sym = trace.setup.clone().map(SymValue::Concrete);
    let mut state = spec.initial_state(setup_sym.as_ref());
    let mut bindings = Bindings::new();
    if let Some(v) = &trace.setup {
        bindings.bind(Handle::SETUP, ExecOutcome::Ok(v.clone()));
    }

    // The prefix is shared by every interleaving: any failure here is
    // final.
    for (index, (inv, rec)) in program
        .sequential
        .iter()
        .zip(&trace.sequential)
        .enumerate()
    {
        if rec.outcome.is_caught() {
            return Ok(LinearizeOutcome::Rejected(
                RejectReason::SequentialException { index },
            ));
        }
        match step(&state, &bindings, inv, rec)? {
            Some(next) => {
                bindings.bind(inv.handle, rec.outcome.clone());
                state = next;
            }
            None => {
                return Ok(LinearizeOutcome::Rejected(RejectReason::SequentialStep {
                    index,
                }))
            }
        }
    }

    // An exception anywhere in the suffix poisons every interleaving.
    for (t, records) in trace.threads.iter().enumerate() {
        for (index, rec) in records.iter().enumerate() {
            if rec.outcome.is_caught() {
                return Ok(LinearizeOutcome::Rejected(
                    RejectReason::ParallelException { thread: t, index },
                ));
            }
        }
    }

    let threads: Vec<Vec<Slot<'_, S>>> = program
        .threads
        .iter()
        .zip(&trace.threads)
        .map(|(invs, recs)| invs.iter().zip(recs).collect())
        .collect();

    if threads.iter().all(Vec::is_empty) {
        return Ok(if spec.postcondition(&state) {
            LinearizeOutcome::Accepted
        } else {
            LinearizeOutcome::Rejected(RejectReason::FinalInvariant)
        });
    }

    let mut cursors: SmallVec<[usize; 4]> = smallvec![0; threads.len()];
    if search(spec, &threads, state, bindings, &mut cursors)? {
        Ok(LinearizeOutcome::Accepted)
    } else {
        debug!("no valid interleaving");
        Ok(LinearizeOutcome::Rejected(RejectReason::NoValidInterleaving))
    }
}

/// Try one invocation against the model: substitute, check the concrete
/// precondition, advance, check the postcondition. `None` means the step
/// is not viable at this point.
fn step<S: Clone>(
    state: &S,
    bindings: &Bindings,
    inv: &Invocation<S>,
    rec: &StepRecord,
) -> Result<Option<S>, EngineError> {
    let args = substitute(inv.args(), bindings)?;
    if !inv.command.precondition(state, &args) {
        return Ok(None);
    }
    let value = match &rec.outcome {
        ExecOutcome::Ok(v) => v,
        ExecOutcome::Caught(_) => return Ok(None),
    };
    let next = inv
        .command
        .next_state(state, &args, &SymValue::Concrete(value.clone()));
    if !inv.command.postcondition(state, &next, &args, value) {
        return Ok(None);
    }
    Ok(Some(next))
}

fn search<S: Clone>(
    spec: &Spec<S>,
    threads: &[Vec<Slot<'_, S>>],
    state: S,
    bindings: Bindings,
    cursors: &mut SmallVec<[usize; 4]>,
) -> Result<bool, EngineError> {
    if threads.iter().enumerate().all(|(t, th)| cursors[t] == th.len()) {
        return Ok(spec.postcondition(&state));
    }
    for t in 0..threads.len() {
        let c = cursors[t];
        if c == threads[t].len() {
            continue;
        }
        let (inv, rec) = threads[t][c];
        if let Some(next) = step(&state, &bindings, inv, rec)? {
            let mut next_bindings = bindings.clone();
            next_bindings.bind(inv.handle, rec.outcome.clone());
            cursors[t] += 1;
            let found = search(spec, threads, next, next_bindings, cursors)?;
            cursors[t] -= 1;
            if found {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stateline_core::{ArgTree, Caught, Command, HandleMint, Value};
    use stateline_harness::Tree;

    /// Model: a counter whose `put` must observe `prev + 1`.
    fn counter_spec() -> Spec<i64> {
        Spec::new(|_| 0).command(
            Command::new("put", |_| Ok(Value::none()))
                .with_next_state(|s: &i64, _: &ArgTree, _| s + 1)
                .with_postcondition(|prev: &i64, _: &i64, _: &ArgTree, result: &Value| {
                    result.as_int() == Some(prev + 1)
                }),
        )
    }

    fn inv(spec: &Spec<i64>, handle: Handle) -> Invocation<i64> {
        Invocation::new(
            handle,
            spec.get("put").unwrap().clone(),
            Tree::leaf(ArgTree::unit()),
        )
    }

    fn ok(n: i64) -> StepRecord {
        StepRecord {
            outcome: ExecOutcome::Ok(Value::int(n)),
            snapshot: n.to_string(),
        }
    }

    fn caught(msg: &str) -> StepRecord {
        let outcome = ExecOutcome::Caught(Caught::new(msg));
        StepRecord {
            snapshot: outcome.to_string(),
            outcome,
        }
    }

    fn trace(
        setup: Option<Value>,
        sequential: Vec<StepRecord>,
        threads: Vec<Vec<StepRecord>>,
    ) -> RunTrace {
        RunTrace {
            setup,
            sequential,
            threads,
        }
    }

    #[test]
    fn test_sequential_accept() {
        let spec = counter_spec();
        let mut mint = HandleMint::new();
        let program = Program {
            sequential: vec![inv(&spec, mint.mint()), inv(&spec, mint.mint())],
            threads: Vec::new(),
        };
        let t = trace(None, vec![ok(1), ok(2)], Vec::new());
        assert!(linearize(&spec, &program, &t).unwrap().is_accepted());
    }

    #[test]
    fn test_sequential_postcondition_reject() {
        let spec = counter_spec();
        let mut mint = HandleMint::new();
        let program = Program {
            sequential: vec![inv(&spec, mint.mint()), inv(&spec, mint.mint())],
            threads: Vec::new(),
        };
        let t = trace(None, vec![ok(1), ok(5)], Vec::new());
        assert_eq!(
            linearize(&spec, &program, &t).unwrap(),
            LinearizeOutcome::Rejected(RejectReason::SequentialStep { index: 1 })
        );
    }

    #[test]
    fn test_sequential_exception_rejects_immediately() {
        let spec = counter_spec();
        let mut mint = HandleMint::new();
        let program = Program {
            sequential: vec![inv(&spec, mint.mint())],
            threads: Vec::new(),
        };
        let t = trace(None, vec![caught("boom")], Vec::new());
        assert_eq!(
            linearize(&spec, &program, &t).unwrap(),
            LinearizeOutcome::Rejected(RejectReason::SequentialException { index: 0 })
        );
    }

    #[test]
    fn test_empty_program_checks_final_invariant() {
        let passing = counter_spec();
        let empty = Program::empty();
        let t = trace(None, Vec::new(), Vec::new());
        assert!(linearize(&passing, &empty, &t).unwrap().is_accepted());

        let failing = counter_spec().with_postcondition(|_| false);
        assert_eq!(
            linearize(&failing, &empty, &t).unwrap(),
            LinearizeOutcome::Rejected(RejectReason::FinalInvariant)
        );
    }

    #[test]
    fn test_parallel_acceptance_is_existential() {
        let spec = counter_spec();
        let mut mint = HandleMint::new();
        let program = Program {
            sequential: Vec::new(),
            threads: vec![vec![inv(&spec, mint.mint())], vec![inv(&spec, mint.mint())]],
        };
        // Thread A observed 2, thread B observed 1: only the B-then-A
        // order explains it.
        let t = trace(None, Vec::new(), vec![vec![ok(2)], vec![ok(1)]]);
        assert!(linearize(&spec, &program, &t).unwrap().is_accepted());
    }

    #[test]
    fn test_parallel_no_valid_interleaving() {
        let spec = counter_spec();
        let mut mint = HandleMint::new();
        let program = Program {
            sequential: Vec::new(),
            threads: vec![vec![inv(&spec, mint.mint())], vec![inv(&spec, mint.mint())]],
        };
        // Both observed 1: whichever goes second should have seen 2.
        let t = trace(None, Vec::new(), vec![vec![ok(1)], vec![ok(1)]]);
        assert_eq!(
            linearize(&spec, &program, &t).unwrap(),
            LinearizeOutcome::Rejected(RejectReason::NoValidInterleaving)
        );
    }

    #[test]
    fn test_parallel_exception_rejects() {
        let spec = counter_spec();
        let mut mint = HandleMint::new();
        let program = Program {
            sequential: Vec::new(),
            threads: vec![vec![inv(&spec, mint.mint())], vec![inv(&spec, mint.mint())]],
        };
        let t = trace(None, Vec::new(), vec![vec![ok(1)], vec![caught("late")]]);
        assert_eq!(
            linearize(&spec, &program, &t).unwrap(),
            LinearizeOutcome::Rejected(RejectReason::ParallelException { thread: 1, index: 0 })
        );
    }

    #[test]
    fn test_concrete_precondition_prunes_interleavings() {
        // Only one `put` fits: the concrete precondition forbids a second.
        let spec: Spec<i64> = Spec::new(|_| 0).command(
            Command::new("put", |_| Ok(Value::none()))
                .with_precondition(|s: &i64, _: &ArgTree| *s < 1)
                .with_next_state(|s: &i64, _: &ArgTree, _| s + 1),
        );
        let mk = |mint: &mut HandleMint| {
            Invocation::new(
                mint.mint(),
                spec.get("put").unwrap().clone(),
                Tree::leaf(ArgTree::unit()),
            )
        };
        let mut mint = HandleMint::new();
        let program = Program {
            sequential: Vec::new(),
            threads: vec![vec![mk(&mut mint)], vec![mk(&mut mint)]],
        };
        let t = trace(None, Vec::new(), vec![vec![ok(0)], vec![ok(0)]]);
        assert_eq!(
            linearize(&spec, &program, &t).unwrap(),
            LinearizeOutcome::Rejected(RejectReason::NoValidInterleaving)
        );
    }

    #[test]
    fn test_setup_value_feeds_initial_state() {
        let spec: Spec<i64> = Spec::new(|setup: Option<&SymValue>| match setup {
            Some(SymValue::Concrete(v)) => v.as_int().unwrap_or(0),
            _ => 0,
        })
        .with_setup(|| Ok(Value::int(10)))
        .command(
            Command::new("put", |_| Ok(Value::none()))
                .with_next_state(|s: &i64, _: &ArgTree, _| s + 1)
                .with_postcondition(|prev: &i64, _: &i64, _: &ArgTree, result: &Value| {
                    result.as_int() == Some(prev + 1)
                }),
        );
        let mut mint = HandleMint::new();
        let program = Program {
            sequential: vec![Invocation::new(
                mint.mint(),
                spec.get("put").unwrap().clone(),
                Tree::leaf(ArgTree::unit()),
            )],
            threads: Vec::new(),
        };
        let t = trace(Some(Value::int(10)), vec![ok(11)], Vec::new());
        assert!(linearize(&spec, &program, &t).unwrap().is_accepted());
    }
}
