//! Test tooling for the mutation summary engine.
//!
//! - [`scenario`]: TOML fixtures that script a tree, a set of queries and
//!   batches of operations, and replay them through a `MutationSummary`.
//! - [`render`]: stable, name-based rendering of summaries for expectations
//!   and the replay CLI.
//! - [`validator`]: a brute-force oracle that diffs whole-tree snapshots and
//!   checks a summary against the result.

pub mod render;
pub mod scenario;
pub mod validator;

pub use render::RenderedSummary;
pub use scenario::{Batch, BatchOutcome, FixtureError, Replay, Scenario, run_scenario};
pub use validator::{SnapshotValidator, ValidationMismatch};

use std::fmt::Write;

/// Line-oriented report of where `actual` departs from `expected`.
///
/// Shows every differing line with one line of context around each run of
/// differences, followed by the line counts. Empty when both sides agree.
pub fn diff_lines(expected: &[String], actual: &[String]) -> String {
    const MISSING: &str = "<missing>";
    let max = expected.len().max(actual.len());
    let differs = |i: usize| expected.get(i) != actual.get(i);
    if !(0..max).any(differs) {
        return String::new();
    }

    let mut out = String::new();
    let mut last_shown = None;
    for i in 0..max {
        let near_difference = (i.saturating_sub(1)..=(i + 1).min(max - 1)).any(differs);
        if !near_difference {
            continue;
        }
        if last_shown.is_some_and(|last: usize| last + 1 != i) {
            let _ = writeln!(&mut out, "  ...");
        }
        last_shown = Some(i);
        let left = expected.get(i).map(String::as_str).unwrap_or(MISSING);
        let right = actual.get(i).map(String::as_str).unwrap_or(MISSING);
        if differs(i) {
            let _ = writeln!(&mut out, "> {:>4}  expected: {left}", i + 1);
            let _ = writeln!(&mut out, "> {:>4}    actual: {right}", i + 1);
        } else {
            let _ = writeln!(&mut out, "  {:>4}            {left}", i + 1);
        }
    }
    let _ = writeln!(
        &mut out,
        "expected {} lines, actual {} lines",
        expected.len(),
        actual.len()
    );
    out
}
