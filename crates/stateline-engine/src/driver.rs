//! Driver: every generated program must linearize.

use crate::generator::programs;
use crate::linearize::{linearize, LinearizeOutcome};
use crate::report::{reason_line, render_failure};
use crate::runner::{run_program, RunError};
use stateline_core::{GenConfig, Program, RunConfig, Spec};
use stateline_harness::{for_all, quick_check, CheckOutcome, Config, Property, TestResult};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// The property "every generated program passes linearization".
///
/// Each test case runs the program up to `max_tries` times, each run in
/// its own setup/cleanup scope; any failing run fails the case and is
/// rendered with both traces. An engine invariant violation is not a test
/// failure — it panics.
pub fn property<S>(spec: Arc<Spec<S>>, gen_config: GenConfig, run_config: RunConfig) -> Property
where
    S: Clone + 'static,
{
    let generator = programs(spec.clone(), gen_config);
    let tries = run_config.max_tries.max(1);
    let test = move |program: &Program<S>| -> TestResult {
        for attempt in 0..tries {
            let trace = match run_program(&spec, program, run_config.stacktrace) {
                Ok(trace) => trace,
                Err(RunError::Setup(message)) => {
                    return TestResult::Fail(format!("setup failed: {message}"))
                }
                Err(RunError::Engine(e)) => panic!("engine invariant violated: {e}"),
            };
            match linearize(&spec, program, &trace) {
                Ok(LinearizeOutcome::Accepted) => {}
                Ok(LinearizeOutcome::Rejected(reason)) => {
                    debug!(attempt, "linearization rejected the run");
                    return TestResult::Fail(format!(
                        "{}\n{}",
                        reason_line(&reason),
                        render_failure(program, &trace, run_config.stacktrace)
                    ));
                }
                Err(e) => panic!("engine invariant violated: {e}"),
            }
        }
        TestResult::Pass
    };
    for_all(generator, test)
}

/// Generate, run, linearize and shrink. The entry point for a spec.
pub fn check<S>(spec: Arc<Spec<S>>, gen_config: GenConfig, run_config: RunConfig) -> CheckOutcome
where
    S: Clone + 'static,
{
    let seed = run_config.seed.unwrap_or_else(wall_clock_seed);
    info!(seed, num_tests = run_config.num_tests, "checking spec");
    let config = Config {
        num_tests: run_config.num_tests,
        seed,
        ..Config::default()
    };
    let outcome = quick_check(&property(spec, gen_config, run_config), &config);
    match &outcome {
        CheckOutcome::Passed { tests, discards } => {
            info!(tests, discards, "spec passed");
        }
        CheckOutcome::Failed(failure) => {
            info!(
                tests = failure.tests,
                shrinks = failure.shrinks,
                "spec failed"
            );
        }
    }
    outcome
}

fn wall_clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stateline_core::{ArgTree, Command, Value};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// A counter whose model and implementation agree.
    fn honest_spec() -> Arc<Spec<i64>> {
        let spec = Spec::new(|_| 0).command(
            Command::new("tick", |_| Ok(Value::none()))
                .with_next_state(|s: &i64, _: &ArgTree, _| s + 1),
        );
        Arc::new(spec)
    }

    /// A counter whose implementation always reports 7.
    fn lying_spec() -> Arc<Spec<i64>> {
        let spec = Spec::new(|_| 0).command(
            Command::new("put", |_| Ok(Value::int(7)))
                .with_next_state(|s: &i64, _: &ArgTree, _| s + 1)
                .with_postcondition(|prev: &i64, _: &i64, _: &ArgTree, result: &Value| {
                    result.as_int() == Some(prev + 1)
                }),
        );
        Arc::new(spec)
    }

    fn run_config(seed: u64, num_tests: u32) -> RunConfig {
        RunConfig {
            num_tests,
            seed: Some(seed),
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_honest_spec_passes() {
        let outcome = check(honest_spec(), GenConfig::default(), run_config(5, 30));
        assert!(outcome.is_passed(), "unexpected failure: {outcome:?}");
    }

    #[test]
    fn test_lying_spec_fails_and_shrinks_to_one_put() {
        let outcome = check(lying_spec(), GenConfig::default(), run_config(5, 50));
        let failure = outcome.failure().expect("the lying spec must fail");
        let puts = failure.minimal.matches("(put)").count();
        assert_eq!(puts, 1, "minimal case should be a single put:\n{}", failure.minimal);
    }

    #[test]
    fn test_check_is_reproducible() {
        let a = check(lying_spec(), GenConfig::default(), run_config(11, 50));
        let b = check(lying_spec(), GenConfig::default(), run_config(11, 50));
        let fa = a.failure().expect("must fail");
        let fb = b.failure().expect("must fail");
        assert_eq!(fa.minimal, fb.minimal);
        assert_eq!(fa.original, fb.original);
        assert_eq!(fa.shrinks, fb.shrinks);
    }

    #[test]
    fn test_max_tries_runs_the_program_repeatedly() {
        let runs = Arc::new(AtomicU32::new(0));
        let counter = runs.clone();
        let spec: Arc<Spec<i64>> = Arc::new(Spec::new(|_| 0).command(Command::new(
            "op",
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::none())
            },
        )));
        let config = RunConfig {
            max_tries: 3,
            ..run_config(2, 10)
        };
        let outcome = check(spec, GenConfig::default(), config);
        assert!(outcome.is_passed());
        // Every non-empty generated program executed three times.
        assert_eq!(runs.load(Ordering::SeqCst) % 3, 0);
    }
}
