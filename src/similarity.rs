//! Weighted similarity between a constraint set and one case.
//!
//! The score is a hand-weighted linear model, used only for ranking. The
//! raw signed sum is normalized by the magnitudes of the conditions that
//! were evaluated, so cases judged under different numbers of active
//! constraints stay comparable, then multiplied by the case's utility. A
//! case matching every constraint exactly lands at `1.0 * utility`.

use crate::library::CaseLibrary;
use crate::types::{Case, Constraints};
use serde::{Deserialize, Serialize};

/// The weight table. Operators can retune emphasis by deserializing a
/// replacement table and handing it to the engine; values are never
/// hard-coded at call sites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityWeights {
    /// Desired ingredient present by exact name.
    pub ingr_match: f64,
    /// Desired ingredient absent, but its alcohol family represented.
    pub ingr_alc_type_match: f64,
    /// Desired ingredient absent, non-alcoholic, its basic taste represented.
    pub ingr_basic_taste_match: f64,
    /// Requested alcohol type present, per matching ingredient.
    pub alc_type_match: f64,
    /// Requested basic taste present, per matching ingredient.
    pub basic_taste_match: f64,
    /// Case glass among the requested glasses.
    pub glass_type_match: f64,
    /// Excluded ingredient present by exact name.
    pub exc_ingr_match: f64,
    /// Excluded ingredient absent but its family represented.
    pub exc_ingr_family_match: f64,
    /// Excluded alcohol type present, per matching ingredient.
    pub exc_alc_type_match: f64,
    /// Excluded basic taste present, per matching ingredient.
    pub exc_basic_taste_match: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            ingr_match: 1.0,
            ingr_alc_type_match: 0.6,
            ingr_basic_taste_match: 0.6,
            alc_type_match: 0.8,
            basic_taste_match: 0.8,
            glass_type_match: 0.4,
            exc_ingr_match: -1.0,
            exc_ingr_family_match: -0.6,
            exc_alc_type_match: -1.0,
            exc_basic_taste_match: -1.0,
        }
    }
}

/// Score one case against the constraints.
///
/// Monotonically increasing in constraint satisfaction; no absolute meaning
/// beyond ranking.
pub fn score(
    weights: &SimilarityWeights,
    library: &CaseLibrary,
    constraints: &Constraints,
    case: &Case,
) -> f64 {
    let mut raw = 0.0;
    let mut norm = 0.0;

    // Desired ingredients: exact name, then family fallback. The condition
    // always normalizes by the exact-match weight, so a family hit scores
    // strictly below an exact hit.
    for name in &constraints.ingredients {
        norm += weights.ingr_match.abs();
        if case.has_ingredient(name) {
            raw += weights.ingr_match;
        } else if let Some(family) = library.alcohol_family_of(name) {
            if case.has_alc_type(family) {
                raw += weights.ingr_alc_type_match;
            }
        } else if let Some(family) = library.basic_taste_family_of(name) {
            if case.has_basic_taste(family) {
                raw += weights.ingr_basic_taste_match;
            }
        }
    }

    // Requested families, rewarded per matching ingredient.
    for alc in &constraints.alc_type {
        let matching = case.ingredients.iter().filter(|i| &i.alc_type == alc).count();
        if matching > 0 {
            raw += weights.alc_type_match * matching as f64;
            norm += weights.alc_type_match.abs() * matching as f64;
        } else {
            norm += weights.alc_type_match.abs();
        }
    }
    for taste in &constraints.basic_taste {
        let matching = case
            .ingredients
            .iter()
            .filter(|i| &i.basic_taste == taste)
            .count();
        if matching > 0 {
            raw += weights.basic_taste_match * matching as f64;
            norm += weights.basic_taste_match.abs() * matching as f64;
        } else {
            norm += weights.basic_taste_match.abs();
        }
    }

    // Glass.
    if !constraints.glass_type.is_empty() {
        norm += weights.glass_type_match.abs();
        if constraints.glass_type.contains(&case.glass_type) {
            raw += weights.glass_type_match;
        }
    }

    // Excluded ingredients: exact hit penalized hardest, family hit softer.
    for name in &constraints.exc_ingredients {
        norm += weights.exc_ingr_match.abs();
        if case.has_ingredient(name) {
            raw += weights.exc_ingr_match;
        } else {
            let family_hit = match library.alcohol_family_of(name) {
                Some(family) => case.has_alc_type(family),
                None => library
                    .basic_taste_family_of(name)
                    .map_or(false, |family| case.has_basic_taste(family)),
            };
            if family_hit {
                raw += weights.exc_ingr_family_match;
            }
        }
    }

    // Excluded families, penalized per matching ingredient.
    for alc in &constraints.exc_alc_type {
        let matching = case.ingredients.iter().filter(|i| &i.alc_type == alc).count();
        if matching > 0 {
            raw += weights.exc_alc_type_match * matching as f64;
            norm += weights.exc_alc_type_match.abs() * matching as f64;
        } else {
            norm += weights.exc_alc_type_match.abs();
        }
    }
    for taste in &constraints.exc_basic_taste {
        let matching = case
            .ingredients
            .iter()
            .filter(|i| &i.basic_taste == taste)
            .count();
        if matching > 0 {
            raw += weights.exc_basic_taste_match * matching as f64;
            norm += weights.exc_basic_taste_match.abs() * matching as f64;
        } else {
            norm += weights.exc_basic_taste_match.abs();
        }
    }

    let normalized = if norm > 0.0 { raw / norm } else { 0.0 };
    normalized * case.utility
}
