//! The CBR cycle: retrieve, adapt, guard, and (on request) learn.
//!
//! `CbrEngine` owns the library, the weight table, and a seedable random
//! source, and drives one request at a time. The cycle retries retrieval
//! and adaptation until the failure guard stops objecting or the retry
//! budget runs out. The engine is strictly single-threaded; callers that
//! need concurrent cycles must serialize access or shard libraries.

use crate::adaptation::adapt;
use crate::error::CbrError;
use crate::guard::{is_known_failure, DEFAULT_GUARD_THRESHOLD};
use crate::learning::{self, DEFAULT_SUCCESS_THRESHOLD};
use crate::library::CaseLibrary;
use crate::retrieval::retrieve;
use crate::similarity::SimilarityWeights;
use crate::types::{Case, Constraints};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

/// How many retrieve-adapt-guard rounds to attempt before giving up.
pub const DEFAULT_RETRY_BUDGET: usize = 10;

/// Result of one cycle: the source case, its adaptation, and how far the
/// adaptation strayed.
#[derive(Debug, Clone)]
pub struct Recommendation {
    pub retrieved: Case,
    pub adapted: Case,
    pub edit_count: usize,
    /// Similarity score the retrieved case won with.
    pub retrieval_score: f64,
}

impl Recommendation {
    /// True when the retrieved case already satisfied the constraints and
    /// no adaptation occurred. Such results skip evaluation entirely.
    pub fn is_original(&self) -> bool {
        self.edit_count == 0
    }
}

/// The case-based reasoning engine.
pub struct CbrEngine {
    library: CaseLibrary,
    weights: SimilarityWeights,
    rng: StdRng,
    retry_budget: usize,
    success_threshold: f64,
    guard_threshold: f64,
}

impl CbrEngine {
    pub fn new(library: CaseLibrary) -> Self {
        Self::with_rng(library, StdRng::from_entropy())
    }

    /// Engine with a pinned random source, for reproducible traces.
    pub fn with_seed(library: CaseLibrary, seed: u64) -> Self {
        Self::with_rng(library, StdRng::seed_from_u64(seed))
    }

    fn with_rng(library: CaseLibrary, rng: StdRng) -> Self {
        Self {
            library,
            weights: SimilarityWeights::default(),
            rng,
            retry_budget: DEFAULT_RETRY_BUDGET,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            guard_threshold: DEFAULT_GUARD_THRESHOLD,
        }
    }

    pub fn library(&self) -> &CaseLibrary {
        &self.library
    }

    /// Swap the similarity weight table. Operators tune emphasis here; the
    /// scorer itself carries no literals.
    pub fn set_weights(&mut self, weights: SimilarityWeights) {
        self.weights = weights;
    }

    pub fn set_retry_budget(&mut self, budget: usize) {
        self.retry_budget = budget;
    }

    pub fn set_success_threshold(&mut self, threshold: f64) {
        self.success_threshold = threshold;
    }

    /// Run one full cycle for a constraint set.
    ///
    /// Validates the constraints against the library catalogs, then loops
    /// retrieve -> adapt -> guard. Guard rejections are labeled failures,
    /// learned with a zero score, and retried; a zero-edit adaptation is
    /// accepted immediately.
    pub fn recommend(&mut self, constraints: &Constraints) -> Result<Recommendation, CbrError> {
        self.library.validate_constraints(constraints)?;

        for attempt in 1..=self.retry_budget {
            let (retrieved, retrieval_score) =
                retrieve(&self.library, &self.weights, constraints, &mut self.rng)?;
            let (adapted, edit_count) =
                adapt(&self.library, constraints, &retrieved, &mut self.rng);

            if edit_count == 0 {
                info!(case = %retrieved.name, attempt, "retrieved case already satisfies constraints");
                return Ok(Recommendation {
                    retrieved: retrieved.clone(),
                    adapted,
                    edit_count,
                    retrieval_score,
                });
            }

            if is_known_failure(&self.library, &self.weights, &adapted, self.guard_threshold) {
                warn!(case = %adapted.name, attempt, "adaptation repeats a known failure, retrying");
                learning::commit(
                    &mut self.library,
                    &retrieved.name,
                    adapted,
                    0.0,
                    self.success_threshold,
                )?;
                continue;
            }

            info!(
                case = %adapted.name,
                parent = %retrieved.name,
                edit_count,
                attempt,
                "adaptation accepted"
            );
            return Ok(Recommendation {
                retrieved,
                adapted,
                edit_count,
                retrieval_score,
            });
        }

        Err(CbrError::RetryBudgetExhausted {
            budget: self.retry_budget,
        })
    }

    /// Feed a human rating (0-10) for a genuinely adapted recommendation
    /// back into the library. Returns the parent case's recomputed utility.
    pub fn evaluate(
        &mut self,
        recommendation: &Recommendation,
        score: f64,
    ) -> Result<f64, CbrError> {
        if recommendation.is_original() {
            warn!(case = %recommendation.retrieved.name, "original case needs no evaluation");
            return Ok(recommendation.retrieved.utility);
        }
        learning::commit(
            &mut self.library,
            &recommendation.retrieved.name,
            recommendation.adapted.clone(),
            score,
            self.success_threshold,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{contains_word, Evaluation, Ingredient, ORIGINAL};

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

    fn case(name: &str, category: &str, glass: &str, ingredients: Vec<Ingredient>) -> Case {
        let preparation = ingredients
            .iter()
            .map(|i| format!("Pour {} into the glass.", i.id))
            .collect();
        Case {
            name: name.to_string(),
            category: category.to_string(),
            glass_type: glass.to_string(),
            ingredients,
            preparation,
            utility: 1.0,
            derivation: ORIGINAL.to_string(),
            evaluation: Evaluation::Success,
            created_at: None,
        }
    }

    fn rum_punch() -> Case {
        Case {
            name: "Rum Punch".to_string(),
            category: "cocktail".to_string(),
            glass_type: "highball".to_string(),
            ingredients: vec![
                ingr("white rum", "ingr1", "rum", ""),
                ingr("pineapple juice", "ingr2", "", "sweet"),
            ],
            preparation: vec![
                "Shake ingr1 and ingr2 with ice.".to_string(),
                "Garnish with ingr2.".to_string(),
            ],
            utility: 1.0,
            derivation: ORIGINAL.to_string(),
            evaluation: Evaluation::Success,
            created_at: None,
        }
    }

    fn engine() -> CbrEngine {
        // The vodka donor sits in another category, so cocktail-scoped
        // requests always retrieve Rum Punch but can still draw vodka from
        // the catalog.
        let library = CaseLibrary::from_cases(vec![
            rum_punch(),
            case(
                "Kamikaze",
                "shot",
                "shot glass",
                vec![
                    ingr("vodka", "ingr1", "vodka", ""),
                    ingr("lime juice", "ingr2", "", "sour"),
                ],
            ),
        ])
        .unwrap();
        CbrEngine::with_seed(library, 11)
    }

    #[test]
    fn test_end_to_end_exclusion_and_family_request() {
        let mut engine = engine();
        let constraints = Constraints {
            category: vec!["cocktail".to_string()],
            exc_ingredients: vec!["pineapple juice".to_string()],
            alc_type: vec!["vodka".to_string()],
            ..Default::default()
        };
        let rec = engine.recommend(&constraints).unwrap();

        assert_eq!(rec.retrieved.name, "Rum Punch");
        assert!(rec.edit_count >= 2);
        assert!(!rec.adapted.has_ingredient("pineapple juice"));
        assert!(rec.adapted.has_alc_type("vodka"));
        // The sole-reference garnish step is gone, the shared step survives
        // without the removed token, and the new vodka slot has a step.
        assert!(!rec.adapted.preparation.iter().any(|s| s.contains("Garnish")));
        let vodka_id = &rec
            .adapted
            .ingredients
            .iter()
            .find(|i| i.alc_type == "vodka")
            .unwrap()
            .id;
        assert!(rec
            .adapted
            .preparation
            .iter()
            .any(|s| contains_word(s, vodka_id)));
        assert!(constraints.violations(&rec.adapted).is_empty());
    }

    #[test]
    fn test_requesting_present_ingredient_changes_nothing() {
        let mut engine = engine();
        let base = Constraints {
            category: vec!["cocktail".to_string()],
            exc_ingredients: vec!["pineapple juice".to_string()],
            ..Default::default()
        };
        let with_present = Constraints {
            category: vec!["cocktail".to_string()],
            exc_ingredients: vec!["pineapple juice".to_string()],
            ingredients: vec!["white rum".to_string()],
            ..Default::default()
        };
        let rec_base = engine.recommend(&base).unwrap();
        let rec_present = engine.recommend(&with_present).unwrap();
        assert_eq!(rec_base.edit_count, rec_present.edit_count);
    }

    #[test]
    fn test_unknown_constraint_values_rejected_before_retrieval() {
        let mut engine = engine();
        let constraints = Constraints {
            ingredients: vec!["plutonium".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            engine.recommend(&constraints),
            Err(CbrError::Validation(_))
        ));
    }

    #[test]
    fn test_satisfied_constraints_return_original_without_evaluation() {
        let mut engine = engine();
        let constraints = Constraints {
            ingredients: vec!["white rum".to_string()],
            glass_type: vec!["highball".to_string()],
            ..Default::default()
        };
        let rec = engine.recommend(&constraints).unwrap();
        assert!(rec.is_original());
        assert_eq!(rec.adapted.derivation, ORIGINAL);

        // Evaluation of an original is a no-op.
        let before = engine.library().cases().len();
        engine.evaluate(&rec, 9.0).unwrap();
        assert_eq!(engine.library().cases().len(), before);
    }

    #[test]
    fn test_evaluation_commits_and_reweights_parent() {
        let mut engine = engine();
        let constraints = Constraints {
            name: "Vodka Splash".to_string(),
            category: vec!["cocktail".to_string()],
            exc_ingredients: vec!["pineapple juice".to_string()],
            alc_type: vec!["vodka".to_string()],
            ..Default::default()
        };
        let rec = engine.recommend(&constraints).unwrap();
        let parent_utility = engine.evaluate(&rec, 9.0).unwrap();

        // history (9, 0) -> (9 - 0 + 1) / 2
        assert_eq!(parent_utility, 5.0);
        let committed = engine.library().case("Vodka Splash").unwrap();
        assert_eq!(committed.evaluation, Evaluation::Success);
        assert_eq!(committed.derivation, rec.retrieved.name);
    }

    #[test]
    fn test_guard_rejection_exhausts_retry_budget() {
        // A failed twin of Rum Punch differing only by glass: requesting
        // that glass forces every adaptation into the failed shape.
        let mut failed_twin = rum_punch();
        failed_twin.name = "Bad Punch".to_string();
        failed_twin.glass_type = "collins glass".to_string();
        failed_twin.evaluation = Evaluation::Failure;

        let library = CaseLibrary::from_cases(vec![rum_punch(), failed_twin]).unwrap();
        let mut engine = CbrEngine::with_seed(library, 5);
        engine.set_retry_budget(3);

        let constraints = Constraints {
            glass_type: vec!["collins glass".to_string()],
            ..Default::default()
        };
        let err = engine.recommend(&constraints).unwrap_err();
        assert!(matches!(err, CbrError::RetryBudgetExhausted { budget: 3 }));

        // Each rejected attempt was learned as a zero-score failure.
        assert_eq!(engine.library().cases().len(), 5);
        let failures = engine
            .library()
            .cases()
            .iter()
            .filter(|c| c.evaluation == Evaluation::Failure)
            .count();
        assert_eq!(failures, 4);
    }

    #[test]
    fn test_guard_failures_taint_lineage() {
        let mut failed_twin = rum_punch();
        failed_twin.name = "Bad Punch".to_string();
        failed_twin.glass_type = "collins glass".to_string();
        failed_twin.evaluation = Evaluation::Failure;

        let library = CaseLibrary::from_cases(vec![rum_punch(), failed_twin]).unwrap();
        let mut engine = CbrEngine::with_seed(library, 5);
        engine.set_retry_budget(1);

        let constraints = Constraints {
            glass_type: vec!["collins glass".to_string()],
            ..Default::default()
        };
        let _ = engine.recommend(&constraints).unwrap_err();
        assert!(engine.library().failure_lineage().contains("Rum Punch v2"));
    }
}
