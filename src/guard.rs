//! Failure guard: refuse adaptations that rediscover a known-bad recipe.
//!
//! The check mirrors the adapted case back into a throwaway constraint set
//! and scores every stored case of the same category against it. If the
//! maximum lands above a high similarity threshold and any of the cases
//! tied at that maximum is labeled `Failure`, the adaptation is a repeat of
//! something already proven bad and the cycle must retry.

use crate::library::CaseLibrary;
use crate::similarity::{score, SimilarityWeights};
use crate::types::{Case, Constraints, Evaluation};
use std::collections::BTreeSet;
use tracing::debug;

/// Similarity above which an adapted case counts as a twin of a stored one.
pub const DEFAULT_GUARD_THRESHOLD: f64 = 0.95;

/// True if `adapted` is near-identical to a previously failed case of its
/// category.
pub fn is_known_failure(
    library: &CaseLibrary,
    weights: &SimilarityWeights,
    adapted: &Case,
    threshold: f64,
) -> bool {
    let mirror = mirror_constraints(adapted);
    let peers = library.cases_in_category(&adapted.category);
    if peers.is_empty() {
        return false;
    }

    let scored: Vec<(&Case, f64)> = peers
        .iter()
        .map(|case| (*case, score(weights, library, &mirror, case)))
        .collect();
    let best = scored
        .iter()
        .map(|(_, s)| *s)
        .fold(f64::NEG_INFINITY, f64::max);

    if best <= threshold {
        return false;
    }

    let failed_twin = scored
        .iter()
        .filter(|(_, s)| *s == best)
        .any(|(case, _)| case.evaluation == Evaluation::Failure);
    if failed_twin {
        debug!(case = %adapted.name, best, "adaptation matches a known failure");
    }
    failed_twin
}

/// Constraints that describe the adapted case exactly.
fn mirror_constraints(case: &Case) -> Constraints {
    let alc_types: BTreeSet<String> = case
        .ingredients
        .iter()
        .filter(|i| i.is_alcoholic())
        .map(|i| i.alc_type.clone())
        .collect();
    let basic_tastes: BTreeSet<String> = case
        .ingredients
        .iter()
        .filter(|i| !i.is_alcoholic())
        .map(|i| i.basic_taste.clone())
        .collect();

    Constraints {
        name: String::new(),
        category: vec![case.category.clone()],
        glass_type: vec![case.glass_type.clone()],
        ingredients: case.ingredients.iter().map(|i| i.name.clone()).collect(),
        alc_type: alc_types.into_iter().collect(),
        basic_taste: basic_tastes.into_iter().collect(),
        exc_ingredients: Vec::new(),
        exc_alc_type: Vec::new(),
        exc_basic_taste: Vec::new(),
    }
}
