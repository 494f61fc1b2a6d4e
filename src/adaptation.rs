//! Adaptation: mutate a retrieved case until it fits the constraints.
//!
//! Works on a deep copy and never touches the input. Edits run in a fixed
//! order, because later steps assume earlier ones are settled: naming, then
//! glass, then exclusions (which shrink the ingredient set), then mandatory
//! families, then mandatory ingredients (which may substitute into surviving
//! slots). Every mutation increments the edit count; a zero count means the
//! retrieved case already satisfied the request and nothing needs human
//! evaluation.

use crate::library::CaseLibrary;
use crate::types::{contains_word, strip_word, Case, Constraints, Evaluation, Ingredient, ORIGINAL};
use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Adapt `source` to the constraints. Returns the new case and the number
/// of edits applied.
pub fn adapt<R: Rng>(
    library: &CaseLibrary,
    constraints: &Constraints,
    source: &Case,
    rng: &mut R,
) -> (Case, usize) {
    let mut case = source.clone();
    let mut edits = 0usize;

    // 1. Naming and provenance.
    case.name = if constraints.name.is_empty() {
        versioned_name(library, &source.name)
    } else if library.case(&constraints.name).is_some() {
        versioned_name(library, &constraints.name)
    } else {
        constraints.name.clone()
    };
    case.derivation = source.name.clone();
    case.evaluation = Evaluation::Unset;
    case.utility = 1.0;
    case.created_at = Some(Utc::now());

    // 2. Glass.
    if !constraints.glass_type.is_empty() && !constraints.glass_type.contains(&case.glass_type) {
        if let Some(glass) = constraints.glass_type.choose(rng) {
            debug!(from = %case.glass_type, to = %glass, "replacing glass");
            case.glass_type = glass.clone();
            edits += 1;
        }
    }

    // 3. Exclusions: names, then alcohol types, then basic tastes.
    edits += remove_matching(&mut case, |i| constraints.exc_ingredients.contains(&i.name));
    edits += remove_matching(&mut case, |i| constraints.exc_alc_type.contains(&i.alc_type));
    edits += remove_matching(&mut case, |i| {
        constraints.exc_basic_taste.contains(&i.basic_taste)
    });

    // 4. Mandatory families not yet represented.
    let excluded_names: HashSet<String> = constraints.exc_ingredients.iter().cloned().collect();
    for alc in &constraints.alc_type {
        if case.has_alc_type(alc) {
            continue;
        }
        match library.random_ingredient_with(rng, Some(alc.as_str()), None, &excluded_names) {
            Some(pick) => {
                append_ingredient(&mut case, pick.clone());
                edits += 1;
            }
            None => warn!(alc_type = %alc, "no catalog ingredient available for requested family"),
        }
    }
    for taste in &constraints.basic_taste {
        if case.has_basic_taste(taste) {
            continue;
        }
        match library.random_ingredient_with(rng, None, Some(taste.as_str()), &excluded_names) {
            Some(pick) => {
                append_ingredient(&mut case, pick.clone());
                edits += 1;
            }
            None => warn!(basic_taste = %taste, "no catalog ingredient available for requested taste"),
        }
    }

    // 5. Mandatory ingredients: prefer substituting a same-family slot over
    //    growing the recipe.
    for name in &constraints.ingredients {
        if case.has_ingredient(name) {
            continue;
        }
        let entries = library.catalog_entries(name);
        let Some(template) = entries.choose(rng).copied() else {
            warn!(ingredient = %name, "requested ingredient missing from catalog");
            continue;
        };

        let victim = case.ingredients.iter().position(|i| {
            i.name != *name
                && i.family() == template.family()
                && i.is_alcoholic() == template.is_alcoholic()
                && !constraints.ingredients.contains(&i.name)
        });

        match victim {
            Some(pos) => {
                let keep_id = case.ingredients[pos].id.clone();
                debug!(out = %case.ingredients[pos].name, in_ = %template.name, "substituting ingredient");
                case.ingredients[pos] = Ingredient {
                    id: keep_id,
                    ..template.clone()
                };
                edits += 1;
            }
            None => {
                append_ingredient(&mut case, template.clone());
                edits += 1;
            }
        }
    }

    // 6. Nothing changed: hand the source back untouched and signal it.
    if edits == 0 {
        case.name = source.name.clone();
        case.derivation = ORIGINAL.to_string();
        case.evaluation = source.evaluation;
        case.utility = source.utility;
        case.created_at = source.created_at;
    }

    (case, edits)
}

/// First version suffix of `base` not yet present in the library. Keeps
/// repeated adaptations of one source from colliding on name.
fn versioned_name(library: &CaseLibrary, base: &str) -> String {
    let mut n = 2;
    loop {
        let candidate = format!("{} v{}", base, n);
        if library.case(&candidate).is_none() {
            return candidate;
        }
        n += 1;
    }
}

/// Remove every ingredient matching the predicate, excising each from the
/// preparation text. Returns the number of removals.
fn remove_matching<F>(case: &mut Case, matches: F) -> usize
where
    F: Fn(&Ingredient) -> bool,
{
    let mut removed = 0;
    while let Some(pos) = case.ingredients.iter().position(&matches) {
        remove_ingredient(case, pos);
        removed += 1;
    }
    removed
}

/// Remove the ingredient at `pos` and repair the preparation: steps whose
/// only referenced id was the removed one are deleted; steps also naming
/// surviving ids just lose the removed token.
fn remove_ingredient(case: &mut Case, pos: usize) {
    let removed = case.ingredients.remove(pos);
    debug!(ingredient = %removed.name, id = %removed.id, "removing ingredient");

    let survivors: Vec<String> = case.ingredients.iter().map(|i| i.id.clone()).collect();
    case.preparation.retain_mut(|step| {
        if !contains_word(step, &removed.id) {
            return true;
        }
        if survivors.iter().any(|id| contains_word(step, id)) {
            *step = strip_word(step, &removed.id);
            true
        } else {
            false
        }
    });
}

/// Append an ingredient under a freshly minted id, with a preparation step
/// referencing it.
fn append_ingredient(case: &mut Case, mut ingredient: Ingredient) {
    let id = case.mint_ingredient_id();
    debug!(ingredient = %ingredient.name, id = %id, "appending ingredient");
    ingredient.id = id.clone();
    case.ingredients.push(ingredient);
    case.preparation.push(format!("Add {} to the mix.", id));
}
