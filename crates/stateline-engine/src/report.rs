//! Failure rendering.
//!
//! One line per invocation: `#<k> = (name args…) = outcome`, grouped
//! under the sequential prefix and lettered thread headings. When the
//! current string form of a result no longer matches the snapshot taken
//! right after execution, the current form is appended with a mutation
//! note.

use crate::linearize::RejectReason;
use crate::runner::{RunTrace, StepRecord};
use stateline_core::{thread_label, ExecOutcome, Handle, Invocation, Program};
use stateline_harness::{CheckOutcome, Failure};
use std::fmt::Write;

/// Render the full trace of a failing run.
pub fn render_failure<S>(program: &Program<S>, trace: &RunTrace, stacktrace: bool) -> String {
    let mut out = String::new();
    if let Some(setup) = &trace.setup {
        let _ = writeln!(out, "{} = (setup) = {}", Handle::SETUP, setup);
    }
    let _ = writeln!(out, "Sequential prefix:");
    for (inv, rec) in program.sequential.iter().zip(&trace.sequential) {
        render_step(&mut out, inv, rec, stacktrace);
    }
    for (t, (invs, recs)) in program.threads.iter().zip(&trace.threads).enumerate() {
        let _ = writeln!(out, "Thread {}:", thread_label(t));
        for (inv, rec) in invs.iter().zip(recs) {
            render_step(&mut out, inv, rec, stacktrace);
        }
    }
    out
}

fn render_step<S>(out: &mut String, inv: &Invocation<S>, rec: &StepRecord, stacktrace: bool) {
    let _ = write!(out, "  {} = {}", inv, rec.snapshot);
    let now = rec.outcome.to_string();
    if now != rec.snapshot {
        let _ = write!(out, " (object may have been mutated later: {})", now);
    }
    let _ = writeln!(out);
    if stacktrace {
        if let ExecOutcome::Caught(c) = &rec.outcome {
            if let Some(bt) = &c.backtrace {
                for line in bt.lines() {
                    let _ = writeln!(out, "      {}", line);
                }
            }
        }
    }
}

/// One-line summary of a rejection.
pub fn reason_line(reason: &RejectReason) -> String {
    match reason {
        RejectReason::SequentialException { index } => {
            format!("sequential command at position {index} threw")
        }
        RejectReason::SequentialStep { index } => {
            format!("model rejected the sequential prefix at position {index}")
        }
        RejectReason::ParallelException { thread, index } => {
            format!(
                "command at position {index} on thread {} threw",
                thread_label(*thread)
            )
        }
        RejectReason::NoValidInterleaving => {
            "no valid interleaving satisfies the postconditions".to_string()
        }
        RejectReason::FinalInvariant => "terminal postcondition failed".to_string(),
    }
}

/// Render a check outcome for display: `None` when it passed.
pub fn outcome_report(outcome: &CheckOutcome, first_case: bool) -> Option<String> {
    outcome.failure().map(|f| failure_report(f, first_case))
}

/// Render a harness failure: the shrunk case, optionally preceded by the
/// first (non-shrunk) one.
pub fn failure_report(failure: &Failure, first_case: bool) -> String {
    let mut out = String::new();
    if first_case {
        let _ = writeln!(out, "First failing case:");
        let _ = writeln!(out, "{}", failure.original.trim_end());
        let _ = writeln!(out);
    }
    let _ = writeln!(out, "Smallest failing case:");
    let _ = writeln!(out, "{}", failure.minimal.trim_end());
    let _ = write!(
        out,
        "(seed {}, size {}, {} passing tests, {} shrink steps)",
        failure.seed, failure.size, failure.tests, failure.shrinks
    );
    out
}
