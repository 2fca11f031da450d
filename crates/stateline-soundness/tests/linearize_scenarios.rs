//! The queue scenarios: sequential S1–S4 and parallel P1/P2.

use stateline_core::{ArgTree, Caught, ExecOutcome, HandleMint, Invocation, Program, Spec, Value};
use stateline_engine::{
    linearize, run_program, LinearizeOutcome, RejectReason, RunTrace, StepRecord,
};
use stateline_harness::Tree;
use stateline_soundness::{queue_spec, QueueModel};
use std::sync::Arc;

fn inv(
    spec: &Arc<Spec<QueueModel>>,
    mint: &mut HandleMint,
    name: &str,
    args: ArgTree,
) -> Invocation<QueueModel> {
    Invocation::new(
        mint.mint(),
        spec.get(name).expect("known command").clone(),
        Tree::leaf(args),
    )
}

/// `new; push 4; push 2; pop` with handles `#<1>..#<4>`.
fn s1_program(spec: &Arc<Spec<QueueModel>>) -> Program<QueueModel> {
    let mut mint = HandleMint::new();
    let new = inv(spec, &mut mint, "new", ArgTree::unit());
    let q = new.handle;
    let push4 = inv(
        spec,
        &mut mint,
        "push",
        ArgTree::Tuple(vec![ArgTree::Ref(q), ArgTree::Lit(Value::int(4))]),
    );
    let push2 = inv(
        spec,
        &mut mint,
        "push",
        ArgTree::Tuple(vec![ArgTree::Ref(q), ArgTree::Lit(Value::int(2))]),
    );
    let pop = inv(spec, &mut mint, "pop", ArgTree::Tuple(vec![ArgTree::Ref(q)]));
    Program {
        sequential: vec![new, push4, push2, pop],
        threads: Vec::new(),
    }
}

fn ok(v: Value) -> StepRecord {
    let outcome = ExecOutcome::Ok(v);
    StepRecord {
        snapshot: outcome.to_string(),
        outcome,
    }
}

#[test]
fn s1_real_queue_pop_returns_first_pushed() {
    let spec = queue_spec(false);
    let program = s1_program(&spec);
    let trace = run_program(&spec, &program, false).unwrap();
    // queue, nil, nil, 4
    assert_eq!(trace.sequential[1].outcome, ExecOutcome::Ok(Value::none()));
    assert_eq!(trace.sequential[3].outcome, ExecOutcome::Ok(Value::int(4)));
    assert!(linearize(&spec, &program, &trace).unwrap().is_accepted());
}

#[test]
fn s2_buggy_pop_is_rejected() {
    let spec = queue_spec(true);
    let program = s1_program(&spec);
    let trace = run_program(&spec, &program, false).unwrap();
    // The buggy pop hands back the queue object itself.
    assert!(matches!(
        &trace.sequential[3].outcome,
        ExecOutcome::Ok(Value::Opaque(_))
    ));
    assert_eq!(
        linearize(&spec, &program, &trace).unwrap(),
        LinearizeOutcome::Rejected(RejectReason::SequentialStep { index: 3 })
    );
}

#[test]
fn s4_empty_program_passes_trivially() {
    let spec = queue_spec(false);
    let program = Program::empty();
    let trace = run_program(&spec, &program, false).unwrap();
    assert!(linearize(&spec, &program, &trace).unwrap().is_accepted());
}

#[test]
fn sequential_verdict_matches_model_simulation() {
    // For a purely sequential program the linearizer must agree with a
    // plain model walk: the real run above passes, and a doctored trace
    // whose pop observed the wrong element must fail.
    let spec = queue_spec(false);
    let program = s1_program(&spec);
    let queue = Value::opaque(stateline_soundness::TestQueue::new());
    let trace = RunTrace {
        setup: None,
        sequential: vec![
            ok(queue),
            ok(Value::none()),
            ok(Value::none()),
            ok(Value::int(2)), // model says 4
        ],
        threads: Vec::new(),
    };
    assert_eq!(
        linearize(&spec, &program, &trace).unwrap(),
        LinearizeOutcome::Rejected(RejectReason::SequentialStep { index: 3 })
    );
}

#[test]
fn sequential_exception_fails_immediately() {
    let spec = queue_spec(false);
    let program = s1_program(&spec);
    let queue = Value::opaque(stateline_soundness::TestQueue::new());
    let outcome = ExecOutcome::Caught(Caught::new("disk on fire"));
    let trace = RunTrace {
        setup: None,
        sequential: vec![
            ok(queue),
            StepRecord {
                snapshot: outcome.to_string(),
                outcome,
            },
            ok(Value::none()),
            ok(Value::int(4)),
        ],
        threads: Vec::new(),
    };
    assert_eq!(
        linearize(&spec, &program, &trace).unwrap(),
        LinearizeOutcome::Rejected(RejectReason::SequentialException { index: 1 })
    );
}

/// P1/P2 share this shape: seq `new`; thread A `push 1`; thread B `pop`.
fn p_program(spec: &Arc<Spec<QueueModel>>) -> Program<QueueModel> {
    let mut mint = HandleMint::new();
    let new = inv(spec, &mut mint, "new", ArgTree::unit());
    let q = new.handle;
    let push = inv(
        spec,
        &mut mint,
        "push",
        ArgTree::Tuple(vec![ArgTree::Ref(q), ArgTree::Lit(Value::int(1))]),
    );
    let pop = inv(spec, &mut mint, "pop", ArgTree::Tuple(vec![ArgTree::Ref(q)]));
    Program {
        sequential: vec![new],
        threads: vec![vec![push], vec![pop]],
    }
}

#[test]
fn p1_some_interleaving_explains_the_run() {
    let spec = queue_spec(false);
    let program = p_program(&spec);
    let queue = Value::opaque(stateline_soundness::TestQueue::new());
    // A observed nil, B observed 1: push-then-pop explains it.
    let trace = RunTrace {
        setup: None,
        sequential: vec![ok(queue)],
        threads: vec![vec![ok(Value::none())], vec![ok(Value::int(1))]],
    };
    assert!(linearize(&spec, &program, &trace).unwrap().is_accepted());
}

#[test]
fn p2_no_interleaving_explains_the_run() {
    let spec = queue_spec(false);
    let program = p_program(&spec);
    let queue = Value::opaque(stateline_soundness::TestQueue::new());
    // B observed 2, but only 1 was ever pushed.
    let trace = RunTrace {
        setup: None,
        sequential: vec![ok(queue)],
        threads: vec![vec![ok(Value::none())], vec![ok(Value::int(2))]],
    };
    assert_eq!(
        linearize(&spec, &program, &trace).unwrap(),
        LinearizeOutcome::Rejected(RejectReason::NoValidInterleaving)
    );
}
