//! Command definitions and specifications.
//!
//! A command is a record of callbacks, not a trait object hierarchy: the
//! engine treats commands as data and calls whichever callbacks are set,
//! falling back to defined defaults for the rest.

use crate::args::{ArgSpec, ArgTree};
use crate::symbolic::SymValue;
use crate::value::Value;
use stateline_harness::Gen;
use std::sync::Arc;

type RequiresFn<S> = Arc<dyn Fn(&S) -> bool + Send + Sync>;
type ArgsFn<S> = Arc<dyn Fn(&S) -> ArgSpec + Send + Sync>;
type PreconditionFn<S> = Arc<dyn Fn(&S, &ArgTree) -> bool + Send + Sync>;
type NextStateFn<S> = Arc<dyn Fn(&S, &ArgTree, &SymValue) -> S + Send + Sync>;
type RunFn = Arc<dyn Fn(&ArgTree) -> Result<Value, String> + Send + Sync>;
type PostconditionFn<S> = Arc<dyn Fn(&S, &S, &ArgTree, &Value) -> bool + Send + Sync>;
type InitialStateFn<S> = Arc<dyn Fn(Option<&SymValue>) -> S + Send + Sync>;
type SetupFn = Arc<dyn Fn() -> Result<Value, String> + Send + Sync>;
type CleanupFn = Arc<dyn Fn(Option<&Value>) + Send + Sync>;
type GenerateCommandFn<S> = Arc<dyn Fn(&S) -> Gen<String> + Send + Sync>;
type SpecPostconditionFn<S> = Arc<dyn Fn(&S) -> bool + Send + Sync>;

/// One named operation on the system under test, paired with its model
/// description. Only `run` is required; every other callback has a
/// defined default.
pub struct Command<S> {
    name: String,
    requires: Option<RequiresFn<S>>,
    args: Option<ArgsFn<S>>,
    precondition: Option<PreconditionFn<S>>,
    next_state: Option<NextStateFn<S>>,
    run: RunFn,
    postcondition: Option<PostconditionFn<S>>,
}

impl<S> Command<S> {
    pub fn new<F>(name: impl Into<String>, run: F) -> Self
    where
        F: Fn(&ArgTree) -> Result<Value, String> + Send + Sync + 'static,
    {
        Command {
            name: name.into(),
            requires: None,
            args: None,
            precondition: None,
            next_state: None,
            run: Arc::new(run),
            postcondition: None,
        }
    }

    /// Static eligibility for generation (default: always eligible).
    pub fn with_requires<F>(mut self, f: F) -> Self
    where
        F: Fn(&S) -> bool + Send + Sync + 'static,
    {
        self.requires = Some(Arc::new(f));
        self
    }

    /// Argument specification (default: empty tuple).
    pub fn with_args<F>(mut self, f: F) -> Self
    where
        F: Fn(&S) -> ArgSpec + Send + Sync + 'static,
    {
        self.args = Some(Arc::new(f));
        self
    }

    /// Precondition over realized arguments: symbolic at generation time,
    /// concrete at linearization time (default: true).
    pub fn with_precondition<F>(mut self, f: F) -> Self
    where
        F: Fn(&S, &ArgTree) -> bool + Send + Sync + 'static,
    {
        self.precondition = Some(Arc::new(f));
        self
    }

    /// Model transition (default: state unchanged).
    pub fn with_next_state<F>(mut self, f: F) -> Self
    where
        F: Fn(&S, &ArgTree, &SymValue) -> S + Send + Sync + 'static,
    {
        self.next_state = Some(Arc::new(f));
        self
    }

    /// Postcondition over the observed result, in the canonical
    /// 4-argument form `(prev_state, next_state, args, result)`
    /// (default: true).
    pub fn with_postcondition<F>(mut self, f: F) -> Self
    where
        F: Fn(&S, &S, &ArgTree, &Value) -> bool + Send + Sync + 'static,
    {
        self.postcondition = Some(Arc::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn requires(&self, state: &S) -> bool {
        self.requires.as_ref().map_or(true, |f| f(state))
    }

    pub fn args(&self, state: &S) -> ArgSpec {
        self.args
            .as_ref()
            .map_or_else(ArgSpec::unit, |f| f(state))
    }

    pub fn precondition(&self, state: &S, args: &ArgTree) -> bool {
        self.precondition.as_ref().map_or(true, |f| f(state, args))
    }

    pub fn run(&self, args: &ArgTree) -> Result<Value, String> {
        (self.run)(args)
    }

    pub fn postcondition(&self, prev: &S, next: &S, args: &ArgTree, result: &Value) -> bool {
        self.postcondition
            .as_ref()
            .map_or(true, |f| f(prev, next, args, result))
    }
}

impl<S: Clone> Command<S> {
    pub fn next_state(&self, state: &S, args: &ArgTree, result: &SymValue) -> S {
        match &self.next_state {
            Some(f) => f(state, args, result),
            None => state.clone(),
        }
    }
}

/// A full system specification: the command catalogue plus spec-level
/// callbacks. Lookup is pure; the spec carries no state.
pub struct Spec<S> {
    commands: Vec<Arc<Command<S>>>,
    initial_state: InitialStateFn<S>,
    setup: Option<SetupFn>,
    cleanup: Option<CleanupFn>,
    generate_command: Option<GenerateCommandFn<S>>,
    postcondition: Option<SpecPostconditionFn<S>>,
}

impl<S: Clone> Spec<S> {
    /// Create a spec from its initial-state callback. The callback
    /// receives the setup result when a `setup` callback is configured:
    /// symbolic during generation, concrete during linearization.
    pub fn new<F>(initial_state: F) -> Self
    where
        F: Fn(Option<&SymValue>) -> S + Send + Sync + 'static,
    {
        Spec {
            commands: Vec::new(),
            initial_state: Arc::new(initial_state),
            setup: None,
            cleanup: None,
            generate_command: None,
            postcondition: None,
        }
    }

    pub fn command(mut self, command: Command<S>) -> Self {
        debug_assert!(
            self.get(command.name()).is_none(),
            "duplicate command name {}",
            command.name()
        );
        self.commands.push(Arc::new(command));
        self
    }

    /// Resource acquisition before each run; the result is bound to the
    /// reserved setup handle.
    pub fn with_setup<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Result<Value, String> + Send + Sync + 'static,
    {
        self.setup = Some(Arc::new(f));
        self
    }

    /// Resource release after each run, on every exit path.
    pub fn with_cleanup<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&Value>) + Send + Sync + 'static,
    {
        self.cleanup = Some(Arc::new(f));
        self
    }

    /// Command-name generator (default: uniform choice over commands
    /// whose `requires` holds).
    pub fn with_generate_command<F>(mut self, f: F) -> Self
    where
        F: Fn(&S) -> Gen<String> + Send + Sync + 'static,
    {
        self.generate_command = Some(Arc::new(f));
        self
    }

    /// Terminal invariant over the final model state (default: true).
    pub fn with_postcondition<F>(mut self, f: F) -> Self
    where
        F: Fn(&S) -> bool + Send + Sync + 'static,
    {
        self.postcondition = Some(Arc::new(f));
        self
    }

    pub fn commands(&self) -> &[Arc<Command<S>>] {
        &self.commands
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Command<S>>> {
        self.commands.iter().find(|c| c.name() == name)
    }

    /// Commands whose `requires` holds in the given state, in catalogue
    /// order.
    pub fn eligible(&self, state: &S) -> Vec<&Arc<Command<S>>> {
        self.commands.iter().filter(|c| c.requires(state)).collect()
    }

    pub fn initial_state(&self, setup: Option<&SymValue>) -> S {
        (self.initial_state)(setup)
    }

    pub fn has_setup(&self) -> bool {
        self.setup.is_some()
    }

    pub fn setup(&self) -> Option<Result<Value, String>> {
        self.setup.as_ref().map(|f| f())
    }

    pub fn cleanup(&self, setup_value: Option<&Value>) {
        if let Some(f) = &self.cleanup {
            f(setup_value);
        }
    }

    pub fn has_cleanup(&self) -> bool {
        self.cleanup.is_some()
    }

    pub fn generate_command(&self, state: &S) -> Option<Gen<String>> {
        self.generate_command.as_ref().map(|f| f(state))
    }

    pub fn postcondition(&self, state: &S) -> bool {
        self.postcondition.as_ref().map_or(true, |f| f(state))
    }
}

/// Hard cap on parallel threads; interleaving enumeration is factorial in
/// the thread count.
pub const MAX_THREADS: usize = 4;

/// Program generation options.
#[derive(Debug, Clone)]
pub struct GenConfig {
    /// Number of parallel threads (0 = purely sequential). Clamped to
    /// [`MAX_THREADS`].
    pub threads: usize,
    /// Maximum invocations per thread and for the sequential prefix.
    /// `None` derives the bound from the harness size parameter.
    pub max_length: Option<usize>,
    /// Size cap passed to argument sub-generators.
    pub max_size: usize,
}

impl Default for GenConfig {
    fn default() -> Self {
        GenConfig {
            threads: 0,
            max_length: None,
            max_size: 200,
        }
    }
}

impl GenConfig {
    pub fn effective_threads(&self) -> usize {
        self.threads.min(MAX_THREADS)
    }
}

/// Test-run options.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Programs to try.
    pub num_tests: u32,
    /// Runs per program before declaring it passing; any failing run
    /// fails the program.
    pub max_tries: u32,
    /// Master seed; `None` derives one from the wall clock.
    pub seed: Option<u64>,
    /// Also render the first (non-shrunk) failing case.
    pub first_case: bool,
    /// Capture backtraces for caught panics.
    pub stacktrace: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            num_tests: 200,
            max_tries: 1,
            seed: None,
            first_case: false,
            stacktrace: false,
        }
    }
}
