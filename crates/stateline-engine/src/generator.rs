//! Symbolic program generation under model simulation.
//!
//! Programs are generated by walking the model forward: each step picks a
//! command eligible in the current model state, realizes its arguments,
//! checks the precondition on the symbolic argument tree, and advances the
//! model with a symbolic result. Impossible command sequences are pruned
//! here, before anything touches the real system.

use crate::shrink;
use stateline_core::{
    realize, ArgTree, GenConfig, Handle, HandleMint, Invocation, Program, Spec, SymValue,
};
use stateline_harness::{Gen, Seed, Size, Tree};
use rand::Rng;
use std::sync::Arc;
use tracing::trace;

/// How many argument/precondition attempts a single program slot gets
/// before the current phase stops.
const PRECONDITION_RETRIES: usize = 10;

/// A generator of programs for the given spec.
///
/// The shrink tree of the produced program follows the program shrink
/// contract (see [`crate::shrink`]); every tree node is well-formed and
/// precondition-respecting.
pub fn programs<S>(spec: Arc<Spec<S>>, config: GenConfig) -> Gen<Program<S>>
where
    S: Clone + 'static,
{
    Gen::from_fn(move |seed, size| {
        let program = generate_program(&spec, &config, seed, size);
        shrink::program_tree(spec.clone(), program)
    })
}

fn generate_program<S: Clone>(
    spec: &Spec<S>,
    config: &GenConfig,
    seed: Seed,
    size: Size,
) -> Program<S> {
    let mut seed = seed;
    let arg_size = size.min(config.max_size);
    let max_length = config.max_length.unwrap_or_else(|| (size.get() / 2).max(1));

    let setup_ref = spec.has_setup().then_some(SymValue::Sym(Handle::SETUP));
    let mut state = spec.initial_state(setup_ref.as_ref());
    let mut mint = HandleMint::new();

    let mut sequential = Vec::new();
    while sequential.len() < max_length {
        if stop_early(&mut seed, max_length - sequential.len()) {
            break;
        }
        match generate_invocation(spec, &state, &mut mint, &mut seed, arg_size) {
            Some((invocation, next)) => {
                trace!(%invocation, "generated");
                state = next;
                sequential.push(invocation);
            }
            None => break,
        }
    }

    // Each thread starts from the shared post-sequential state; model
    // transitions inside one thread are never visible to another.
    let mut threads = Vec::new();
    for _ in 0..config.effective_threads() {
        let mut thread_state = state.clone();
        let mut invocations = Vec::new();
        while invocations.len() < max_length {
            if stop_early(&mut seed, max_length - invocations.len()) {
                break;
            }
            match generate_invocation(spec, &thread_state, &mut mint, &mut seed, arg_size) {
                Some((invocation, next)) => {
                    thread_state = next;
                    invocations.push(invocation);
                }
                None => break,
            }
        }
        threads.push(invocations);
    }

    Program {
        sequential,
        threads,
    }
}

/// Size-weighted early-termination coin: stop with probability
/// 1/(remaining+1), so small sizes yield short programs.
fn stop_early(seed: &mut Seed, remaining: usize) -> bool {
    let (s, rest) = seed.split();
    *seed = rest;
    s.rng().gen_range(0..=remaining as u64) == 0
}

fn generate_invocation<S: Clone>(
    spec: &Spec<S>,
    state: &S,
    mint: &mut HandleMint,
    seed: &mut Seed,
    arg_size: Size,
) -> Option<(Invocation<S>, S)> {
    for _ in 0..PRECONDITION_RETRIES {
        let name = match pick_command(spec, state, seed, arg_size) {
            Some(name) => name,
            None => return None,
        };
        let Some(command) = spec.get(&name) else {
            trace!(name, "generate_command produced an unknown command");
            continue;
        };
        if !command.requires(state) {
            continue;
        }

        let (s, rest) = seed.split();
        *seed = rest;
        let args: Tree<ArgTree> = realize(&command.args(state)).run(s, arg_size);
        if !command.precondition(state, args.root()) {
            trace!(name, "precondition rejected generated arguments");
            continue;
        }

        let handle = mint.mint();
        let next = command.next_state(state, args.root(), &SymValue::Sym(handle));
        return Some((Invocation::new(handle, command.clone(), args), next));
    }
    None
}

/// Pick a command name: the spec's `generate_command` when present,
/// otherwise uniform over the eligible catalogue. `None` when nothing is
/// eligible.
fn pick_command<S: Clone>(
    spec: &Spec<S>,
    state: &S,
    seed: &mut Seed,
    size: Size,
) -> Option<String> {
    let (s, rest) = seed.split();
    *seed = rest;
    if let Some(gen) = spec.generate_command(state) {
        return Some(gen.run(s, size).root().clone());
    }
    let eligible = spec.eligible(state);
    if eligible.is_empty() {
        return None;
    }
    let idx = s.rng().gen_range(0..eligible.len());
    Some(eligible[idx].name().to_string())
}
