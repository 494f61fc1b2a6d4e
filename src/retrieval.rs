//! Retrieval: pick the best-matching case for a constraint set.
//!
//! Candidates come from the requested categories (or the whole library when
//! the category filter is empty). Every candidate is scored; cases that are
//! themselves marked `Failure` or sit in the failure lineage stay scorable
//! for bookkeeping but are never returned. Ties at the maximum are broken
//! uniformly at random, deliberately trading determinism for variety.

use crate::error::CbrError;
use crate::library::CaseLibrary;
use crate::similarity::{score, SimilarityWeights};
use crate::types::{Case, Constraints, Evaluation};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

/// Retrieve the most similar eligible case, with its score.
pub fn retrieve<R: Rng>(
    library: &CaseLibrary,
    weights: &SimilarityWeights,
    constraints: &Constraints,
    rng: &mut R,
) -> Result<(Case, f64), CbrError> {
    let pool: Vec<&Case> = if constraints.category.is_empty() {
        library.cases().iter().collect()
    } else {
        constraints
            .category
            .iter()
            .flat_map(|cat| library.cases_in_category(cat))
            .collect()
    };

    let scored: Vec<(&Case, f64)> = pool
        .iter()
        .map(|case| (*case, score(weights, library, constraints, case)))
        .collect();

    for (case, s) in &scored {
        debug!(case = %case.name, score = s, "candidate scored");
    }

    let eligible: Vec<(&Case, f64)> = scored
        .into_iter()
        .filter(|(case, _)| {
            case.evaluation != Evaluation::Failure
                && !library.failure_lineage().contains(&case.name)
        })
        .collect();

    if eligible.is_empty() {
        return Err(CbrError::NoEligibleCase {
            category: if constraints.category.is_empty() {
                "any".to_string()
            } else {
                constraints.category.join(", ")
            },
        });
    }

    let best = eligible
        .iter()
        .map(|(_, s)| *s)
        .fold(f64::NEG_INFINITY, f64::max);
    let winners: Vec<(&Case, f64)> = eligible
        .iter()
        .copied()
        .filter(|(_, s)| *s == best)
        .collect();
    // winners is non-empty because eligible was.
    let (winner, winner_score) = winners.choose(rng).copied().unwrap_or(eligible[0]);

    debug!(case = %winner.name, score = winner_score, ties = winners.len(), "case retrieved");
    Ok((winner.clone(), winner_score))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Ingredient, ORIGINAL};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn ingr(name: &str, id: &str, alc: &str, taste: &str) -> Ingredient {
        Ingredient {
            name: name.to_string(),
            id: id.to_string(),
            alc_type: alc.to_string(),
            basic_taste: taste.to_string(),
            measure: "1 oz".to_string(),
            quantity: "1".to_string(),
            unit: "oz".to_string(),
        }
    }

    fn case(name: &str, category: &str, ingredients: Vec<Ingredient>) -> Case {
        Case {
            name: name.to_string(),
            category: category.to_string(),
            glass_type: "highball".to_string(),
            ingredients,
            preparation: vec!["Stir.".to_string()],
            utility: 1.0,
            derivation: ORIGINAL.to_string(),
            evaluation: Evaluation::Success,
            created_at: None,
        }
    }

    fn library() -> CaseLibrary {
        CaseLibrary::from_cases(vec![
            case(
                "Rum Punch",
                "cocktail",
                vec![ingr("white rum", "ingr1", "rum", "")],
            ),
            case(
                "Screwdriver",
                "cocktail",
                vec![ingr("vodka", "ingr1", "vodka", "")],
            ),
            case(
                "Kamikaze",
                "shot",
                vec![ingr("vodka", "ingr1", "vodka", "")],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_empty_category_searches_whole_library() {
        let lib = library();
        let weights = SimilarityWeights::default();
        let mut rng = StdRng::seed_from_u64(1);
        let constraints = Constraints {
            alc_type: vec!["rum".to_string()],
            ..Default::default()
        };
        // Rum only exists in the cocktail category; retrieval must find it
        // without a category filter.
        let (case, _) = retrieve(&lib, &weights, &constraints, &mut rng).unwrap();
        assert_eq!(case.name, "Rum Punch");
    }

    #[test]
    fn test_category_filter_limits_pool() {
        let lib = library();
        let weights = SimilarityWeights::default();
        let mut rng = StdRng::seed_from_u64(1);
        let constraints = Constraints {
            category: vec!["shot".to_string()],
            alc_type: vec!["rum".to_string()],
            ..Default::default()
        };
        // The only shot carries no rum, but it is still the best of its pool.
        let (case, _) = retrieve(&lib, &weights, &constraints, &mut rng).unwrap();
        assert_eq!(case.name, "Kamikaze");
    }

    #[test]
    fn test_failure_tainted_cases_never_win() {
        let mut lib = library();
        lib.mark_failure("Rum Punch");
        let weights = SimilarityWeights::default();
        let mut rng = StdRng::seed_from_u64(1);
        let constraints = Constraints {
            alc_type: vec!["rum".to_string()],
            ..Default::default()
        };
        let (case, _) = retrieve(&lib, &weights, &constraints, &mut rng).unwrap();
        assert_ne!(case.name, "Rum Punch");
    }

    #[test]
    fn test_empty_eligible_pool_is_an_error() {
        let mut lib = library();
        lib.mark_failure("Kamikaze");
        let weights = SimilarityWeights::default();
        let mut rng = StdRng::seed_from_u64(1);
        let constraints = Constraints {
            category: vec!["shot".to_string()],
            ..Default::default()
        };
        let err = retrieve(&lib, &weights, &constraints, &mut rng).unwrap_err();
        assert!(matches!(err, CbrError::NoEligibleCase { category } if category == "shot"));
    }

    #[test]
    fn test_tie_break_is_random_over_trials() {
        let lib = library();
        let weights = SimilarityWeights::default();
        let mut rng = StdRng::seed_from_u64(42);
        // Screwdriver and Kamikaze both carry vodka and tie at the maximum.
        let constraints = Constraints {
            alc_type: vec!["vodka".to_string()],
            ..Default::default()
        };

        let mut seen: HashSet<String> = HashSet::new();
        for _ in 0..200 {
            let (case, _) = retrieve(&lib, &weights, &constraints, &mut rng).unwrap();
            seen.insert(case.name);
        }
        assert!(seen.contains("Screwdriver"));
        assert!(seen.contains("Kamikaze"));
    }
}
