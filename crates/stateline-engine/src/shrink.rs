//! Program shrinking.
//!
//! Shrink candidates, in order: single-invocation removals (prefix first,
//! then each thread), dependency-closed removal sets where a single
//! removal would dangle, moving a thread's head invocation into the
//! sequential prefix, and per-invocation argument shrinks. Every
//! candidate is replayed against the model before it is offered; an
//! ill-formed or precondition-violating candidate is dropped silently.
//! Repeated descent composes single steps into arbitrary subsequence
//! removals.

use stateline_core::{referenced_handles, Handle, Invocation, Program, Spec, SymValue};
use stateline_harness::Tree;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::trace;

/// Position of an invocation within a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Pos {
    Seq(usize),
    Thread(usize, usize),
}

/// The shrink tree for a program: the program at the root, candidates
/// (recursively shrinkable) below it.
pub fn program_tree<S>(spec: Arc<Spec<S>>, program: Program<S>) -> Tree<Program<S>>
where
    S: Clone + 'static,
{
    let prog = program.clone();
    Tree::with_children(program, move || {
        shrink_candidates(&spec, &prog)
            .into_iter()
            .map(|candidate| program_tree(spec.clone(), candidate))
            .collect()
    })
}

/// All valid one-step shrink candidates, in deterministic order.
pub fn shrink_candidates<S>(spec: &Spec<S>, program: &Program<S>) -> Vec<Program<S>>
where
    S: Clone,
{
    let mut out = Vec::new();
    let positions = all_positions(program);

    // Single removals, then dependency closures for the singles that
    // dangle. A closure is the smallest valid superset of its seed
    // removal, so singles still come first overall.
    let mut closures = Vec::new();
    for &pos in &positions {
        let single = remove(program, &[pos]);
        if is_well_formed(spec, &single) {
            out.push(single);
        } else {
            let closed = dependency_closure(program, pos);
            if closed.len() > 1 {
                closures.push(closed);
            }
        }
    }
    for set in closures {
        let candidate = remove(program, &set);
        if is_well_formed(spec, &candidate) {
            out.push(candidate);
        }
    }

    // Move a thread head into the sequential suffix.
    for t in 0..program.threads.len() {
        if program.threads[t].is_empty() {
            continue;
        }
        let mut candidate = program.clone();
        let inv = candidate.threads[t].remove(0);
        candidate.sequential.push(inv);
        if is_well_formed(spec, &candidate) {
            out.push(candidate);
        }
    }

    // Argument shrinks, one invocation at a time.
    for &pos in &positions {
        let inv = at(program, pos);
        for child in inv.args.children() {
            let mut candidate = program.clone();
            *at_mut(&mut candidate, pos) = inv.with_args(child);
            if is_well_formed(spec, &candidate) {
                out.push(candidate);
            }
        }
    }

    trace!(candidates = out.len(), "shrink step");
    out
}

/// Replay a program's model trajectory, checking the two structural
/// invariants: every referenced handle is bound by an earlier invocation
/// visible at that point (the sequential prefix for thread starts, plus
/// the thread's own earlier invocations), and every precondition holds
/// along the trajectory. Also rejects duplicate handles.
pub fn is_well_formed<S: Clone>(spec: &Spec<S>, program: &Program<S>) -> bool {
    let setup_ref = spec.has_setup().then_some(SymValue::Sym(Handle::SETUP));
    let mut state = spec.initial_state(setup_ref.as_ref());

    let mut bound: BTreeSet<Handle> = BTreeSet::new();
    if spec.has_setup() {
        bound.insert(Handle::SETUP);
    }
    let mut seen: BTreeSet<Handle> = bound.clone();

    for inv in &program.sequential {
        if !seen.insert(inv.handle) {
            return false;
        }
        if !step_ok(&mut state, &bound, inv) {
            return false;
        }
        bound.insert(inv.handle);
    }

    for thread in &program.threads {
        let mut thread_state = state.clone();
        let mut thread_bound = bound.clone();
        for inv in thread {
            if !seen.insert(inv.handle) {
                return false;
            }
            if !step_ok(&mut thread_state, &thread_bound, inv) {
                return false;
            }
            thread_bound.insert(inv.handle);
        }
    }
    true
}

fn step_ok<S: Clone>(state: &mut S, bound: &BTreeSet<Handle>, inv: &Invocation<S>) -> bool {
    if referenced_handles(inv.args())
        .iter()
        .any(|h| !bound.contains(h))
    {
        return false;
    }
    if !inv.command.precondition(state, inv.args()) {
        return false;
    }
    *state = inv
        .command
        .next_state(state, inv.args(), &SymValue::Sym(inv.handle));
    true
}

fn all_positions<S>(program: &Program<S>) -> Vec<Pos> {
    let mut out: Vec<Pos> = (0..program.sequential.len()).map(Pos::Seq).collect();
    for (t, thread) in program.threads.iter().enumerate() {
        out.extend((0..thread.len()).map(|i| Pos::Thread(t, i)));
    }
    out
}

fn at<S>(program: &Program<S>, pos: Pos) -> &Invocation<S> {
    match pos {
        Pos::Seq(i) => &program.sequential[i],
        Pos::Thread(t, i) => &program.threads[t][i],
    }
}

fn at_mut<S>(program: &mut Program<S>, pos: Pos) -> &mut Invocation<S> {
    match pos {
        Pos::Seq(i) => &mut program.sequential[i],
        Pos::Thread(t, i) => &mut program.threads[t][i],
    }
}

/// The removal set containing `seed` and every invocation that
/// (transitively) references a handle minted inside the set. Dependencies
/// only point backward, so one pass in program order closes the set.
fn dependency_closure<S>(program: &Program<S>, seed: Pos) -> Vec<Pos> {
    let mut handles: BTreeSet<Handle> = BTreeSet::new();
    handles.insert(at(program, seed).handle);
    let mut set = vec![seed];
    for pos in all_positions(program) {
        if pos == seed {
            continue;
        }
        let inv = at(program, pos);
        if referenced_handles(inv.args())
            .iter()
            .any(|h| handles.contains(h))
        {
            handles.insert(inv.handle);
            set.push(pos);
        }
    }
    set.sort();
    set
}

fn remove<S>(program: &Program<S>, positions: &[Pos]) -> Program<S> {
    let keep = |pos: Pos| !positions.contains(&pos);
    Program {
        sequential: program
            .sequential
            .iter()
            .enumerate()
            .filter(|(i, _)| keep(Pos::Seq(*i)))
            .map(|(_, inv)| inv.clone())
            .collect(),
        threads: program
            .threads
            .iter()
            .enumerate()
            .map(|(t, thread)| {
                thread
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| keep(Pos::Thread(t, *i)))
                    .map(|(_, inv)| inv.clone())
                    .collect()
            })
            .collect(),
    }
}
