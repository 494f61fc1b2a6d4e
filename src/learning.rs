//! Evaluation and learning: fold a human rating back into the library.
//!
//! Only genuinely adapted cases get here. The rating labels the new case,
//! reweights the parent's outcome history (by the score's magnitude, so a
//! 9 moves the needle more than a 6), recomputes the parent's utility, and
//! commits the new case into the collection next to its category peers. The
//! whole collection is persisted at the end; a write failure propagates
//! with in-memory state ahead of durable state.

use crate::error::CbrError;
use crate::library::CaseLibrary;
use crate::types::{Case, Evaluation};
use tracing::info;

/// Minimum human score for an adaptation to count as a success.
pub const DEFAULT_SUCCESS_THRESHOLD: f64 = 8.0;

/// Label the adapted case, update the parent's utility, and commit.
///
/// Returns the parent's recomputed utility.
pub fn commit(
    library: &mut CaseLibrary,
    parent_name: &str,
    mut adapted: Case,
    score: f64,
    success_threshold: f64,
) -> Result<f64, CbrError> {
    let success = score >= success_threshold;
    adapted.evaluation = if success {
        Evaluation::Success
    } else {
        Evaluation::Failure
    };

    // Parent bookkeeping: score-weighted counters, then the utility
    // recurrence (successes - failures + 1) / 2.
    let (successes, failures) = library.record_outcome(parent_name, success, score);
    let utility = (successes - failures + 1.0) / 2.0;
    let old_utility = library.case(parent_name).map(|c| c.utility);

    if utility == 0.0 {
        // A collapsed parent is relabeled, never removed: descendants still
        // point at it through `derivation`.
        info!(parent = %parent_name, "utility collapsed to zero, flagging failure");
        library.mark_failure(parent_name);
        library.set_utility(parent_name, utility);
    } else if old_utility != Some(utility) {
        library.set_utility(parent_name, utility);
    }

    // The new case starts with the reputation its rating earned it.
    adapted.utility = score;

    if !success {
        library.add_failure_lineage(&adapted.name);
    }

    info!(
        case = %adapted.name,
        parent = %parent_name,
        score,
        success,
        parent_utility = utility,
        "learning outcome"
    );

    library.commit(adapted);
    library.persist()?;
    Ok(utility)
}
