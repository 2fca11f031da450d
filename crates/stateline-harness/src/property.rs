//! Properties and the quick_check runner.

use crate::gen::Gen;
use crate::seed::{Seed, Size};
use crate::tree::Tree;
use tracing::debug;

/// Outcome of one test-case evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestResult {
    Pass,
    /// The case was not applicable; it counts against neither side.
    Discard,
    /// Failed, with a rendered description of the failing case.
    Fail(String),
}

/// A property is a generator of test outcomes: running it produces the
/// outcome for the generated case at the root, and the outcomes for the
/// case's shrinks as lazy children.
pub struct Property(Gen<TestResult>);

/// Build a property from a generator and a test function.
///
/// The test function runs once per tree node actually visited: once for
/// the generated case, once per shrink candidate tried.
pub fn for_all<T, F>(gen: Gen<T>, test: F) -> Property
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&T) -> TestResult + Send + Sync + Clone + 'static,
{
    Property(gen.map(move |case| test(case)))
}

/// quick_check configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of test cases to run.
    pub num_tests: u32,
    /// Largest size passed to the generator; sizes ramp up to this.
    pub max_size: usize,
    /// Maximum number of shrink steps on failure.
    pub max_shrinks: u32,
    /// Master seed.
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            num_tests: 200,
            max_size: 100,
            max_shrinks: 1000,
            seed: 0,
        }
    }
}

/// A failed check: the first failure found and its shrunk form.
#[derive(Debug, Clone)]
pub struct Failure {
    pub seed: u64,
    pub size: usize,
    /// Tests that passed before the failure.
    pub tests: u32,
    /// Shrink steps taken.
    pub shrinks: u32,
    /// Rendering of the originally generated failing case.
    pub original: String,
    /// Rendering of the smallest failing case found.
    pub minimal: String,
}

/// Result of a quick_check run.
#[derive(Debug, Clone)]
pub enum CheckOutcome {
    Passed { tests: u32, discards: u32 },
    Failed(Failure),
}

impl CheckOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, CheckOutcome::Passed { .. })
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            CheckOutcome::Failed(f) => Some(f),
            CheckOutcome::Passed { .. } => None,
        }
    }
}

/// Run a property over `num_tests` cases with sizes ramping from 1 to
/// `max_size`. On the first failure, descend the shrink tree greedily
/// (first failing child, repeatedly) and report both the original and the
/// minimal failing case.
pub fn quick_check(property: &Property, config: &Config) -> CheckOutcome {
    let mut seed = Seed::from_u64(config.seed);
    let mut discards = 0u32;
    for test in 0..config.num_tests {
        let (s, rest) = seed.split();
        seed = rest;
        let size = ramp(test, config.num_tests, config.max_size);
        let tree = property.0.run(s, size);
        match tree.root() {
            TestResult::Pass => {}
            TestResult::Discard => discards += 1,
            TestResult::Fail(original) => {
                debug!(test, size = size.0, "failure found, shrinking");
                let original = original.clone();
                let (minimal, shrinks) = shrink(tree, config.max_shrinks);
                return CheckOutcome::Failed(Failure {
                    seed: config.seed,
                    size: size.0,
                    tests: test,
                    shrinks,
                    original,
                    minimal,
                });
            }
        }
    }
    CheckOutcome::Passed {
        tests: config.num_tests - discards,
        discards,
    }
}

fn ramp(test: u32, num_tests: u32, max_size: usize) -> Size {
    let num = num_tests.max(1) as usize;
    Size(1 + (test as usize * max_size.saturating_sub(1)) / num)
}

fn shrink(tree: Tree<TestResult>, max_shrinks: u32) -> (String, u32) {
    let mut current = tree;
    let mut shrinks = 0u32;
    'outer: while shrinks < max_shrinks {
        for child in current.children() {
            if matches!(child.root(), TestResult::Fail(_)) {
                current = child;
                shrinks += 1;
                continue 'outer;
            }
        }
        break;
    }
    match current.root() {
        TestResult::Fail(msg) => (msg.clone(), shrinks),
        _ => unreachable!("shrink started from a failing node"),
    }
}
