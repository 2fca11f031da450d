//! Search engine for Stateline specifications.
//!
//! Couples four mechanisms: a symbolic program [generator] simulating the
//! model under preconditions, a well-formedness-preserving [shrinker]
//! (`shrink`), a [runner] executing programs against the real system, and
//! a [linearizer] (`linearize`) that accepts a run iff at least one
//! interleaving of the parallel suffix satisfies every postcondition.
//! The [driver] ties them to the property harness.
//!
//! [generator]: generator::programs
//! [shrinker]: shrink
//! [runner]: runner::run_program
//! [linearizer]: linearize::linearize
//! [driver]: driver::check

pub mod driver;
pub mod generator;
pub mod linearize;
pub mod report;
pub mod runner;
pub mod shrink;

pub use driver::{check, property};
pub use generator::programs;
pub use linearize::{linearize, LinearizeOutcome, RejectReason};
pub use report::{failure_report, outcome_report, reason_line, render_failure};
pub use runner::{run_program, RunError, RunTrace, StepRecord};
pub use shrink::{is_well_formed, shrink_candidates};
