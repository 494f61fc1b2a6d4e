//! Core value types for the mixcase CBR engine.
//!
//! A `Case` is a stored cocktail recipe plus its provenance (`derivation`)
//! and quality metadata (`utility`, `evaluation`). A `Constraints` value is
//! one user request. Both are plain serde structs decoupled from the storage
//! carrier; the library boundary (de)serializes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Derivation marker for seed cases and for adaptations that ended up
/// changing nothing.
pub const ORIGINAL: &str = "Original";

/// Outcome label of a case.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Evaluation {
    /// Adapted but not yet scored by a human.
    #[default]
    Unset,
    Success,
    Failure,
}

/// One ingredient slot of a case.
///
/// `id` is unique within its owning case and may appear as a whole-word
/// token inside preparation steps. Exactly one of `alc_type` / `basic_taste`
/// is non-empty (enforced at library load).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ingredient {
    pub name: String,
    pub id: String,
    pub alc_type: String,
    pub basic_taste: String,
    pub measure: String,
    pub quantity: String,
    pub unit: String,
}

impl Ingredient {
    pub fn is_alcoholic(&self) -> bool {
        !self.alc_type.is_empty()
    }

    /// The family used for fuzzy matching and substitution: alcohol type
    /// for alcoholic ingredients, basic taste otherwise.
    pub fn family(&self) -> &str {
        if self.is_alcoholic() {
            &self.alc_type
        } else {
            &self.basic_taste
        }
    }
}

/// A cocktail recipe in the case library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    pub name: String,
    pub category: String,
    pub glass_type: String,
    pub ingredients: Vec<Ingredient>,
    pub preparation: Vec<String>,
    pub utility: f64,
    pub derivation: String,
    pub evaluation: Evaluation,
    /// Stamped on cases produced by adaptation; seed data carries none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Case {
    pub fn is_original(&self) -> bool {
        self.derivation == ORIGINAL
    }

    pub fn has_ingredient(&self, name: &str) -> bool {
        self.ingredients.iter().any(|i| i.name == name)
    }

    pub fn has_alc_type(&self, alc_type: &str) -> bool {
        self.ingredients.iter().any(|i| i.alc_type == alc_type)
    }

    pub fn has_basic_taste(&self, taste: &str) -> bool {
        self.ingredients.iter().any(|i| i.basic_taste == taste)
    }

    /// Mint an ingredient id that collides with nothing in this case.
    ///
    /// The counter starts above the current slot count, so freshly appended
    /// ingredients never reuse an id freed by an earlier removal.
    pub fn mint_ingredient_id(&self) -> String {
        let mut counter = self.ingredients.len() + 1;
        loop {
            let candidate = format!("ingr{}", counter);
            if !self.ingredients.iter().any(|i| i.id == candidate) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Preparation steps with ingredient id tokens substituted by names,
    /// ready for display.
    pub fn render_preparation(&self) -> Vec<String> {
        self.preparation
            .iter()
            .map(|step| {
                let mut text = step.clone();
                for ingr in &self.ingredients {
                    text = replace_word(&text, &ingr.id, &ingr.name);
                }
                text
            })
            .collect()
    }

    /// Ingredient list as display lines, one per slot.
    pub fn render_ingredients(&self) -> Vec<String> {
        self.ingredients
            .iter()
            .map(|i| format!("{} {}", i.measure, i.name).trim().to_string())
            .collect()
    }
}

/// A user request: what the recommended cocktail must and must not contain.
///
/// Every set-valued field defaults to empty, meaning "no constraint".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Constraints {
    /// Desired name for the new case; empty means derive one from the source.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub glass_type: Vec<String>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub alc_type: Vec<String>,
    #[serde(default)]
    pub basic_taste: Vec<String>,
    #[serde(default)]
    pub exc_ingredients: Vec<String>,
    #[serde(default)]
    pub exc_alc_type: Vec<String>,
    #[serde(default)]
    pub exc_basic_taste: Vec<String>,
}

impl Constraints {
    /// Audit a case against these constraints and report every violation.
    ///
    /// An empty result means the case fulfills the request. Used by the CLI
    /// after adaptation and by tests; adaptation itself never branches on
    /// this.
    pub fn violations(&self, case: &Case) -> Vec<String> {
        let mut errs = Vec::new();

        if !self.glass_type.is_empty() && !self.glass_type.contains(&case.glass_type) {
            errs.push(format!(
                "glass type '{}' not among requested",
                case.glass_type
            ));
        }
        for name in &self.ingredients {
            if !case.has_ingredient(name) {
                errs.push(format!("missing requested ingredient '{}'", name));
            }
        }
        for alc in &self.alc_type {
            if !case.has_alc_type(alc) {
                errs.push(format!("missing requested alcohol type '{}'", alc));
            }
        }
        for taste in &self.basic_taste {
            if !case.has_basic_taste(taste) {
                errs.push(format!("missing requested basic taste '{}'", taste));
            }
        }
        for name in &self.exc_ingredients {
            if case.has_ingredient(name) {
                errs.push(format!("excluded ingredient '{}' present", name));
            }
        }
        for alc in &self.exc_alc_type {
            if case.has_alc_type(alc) {
                errs.push(format!("excluded alcohol type '{}' present", alc));
            }
        }
        for taste in &self.exc_basic_taste {
            if case.has_basic_taste(taste) {
                errs.push(format!("excluded basic taste '{}' present", taste));
            }
        }

        errs
    }
}

/// True if `word` occurs in `text` as a whole token, i.e. not flanked by
/// alphanumerics on either side. Guards against `ingr1` matching inside
/// `ingr10`.
pub(crate) fn contains_word(text: &str, word: &str) -> bool {
    word_ranges(text, word).next().is_some()
}

/// Replace every whole-word occurrence of `word` in `text` with `with`.
pub(crate) fn replace_word(text: &str, word: &str, with: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (start, end) in word_ranges(text, word) {
        out.push_str(&text[last..start]);
        out.push_str(with);
        last = end;
    }
    out.push_str(&text[last..]);
    out
}

/// Remove every whole-word occurrence of `word`, collapsing the whitespace
/// left behind.
pub(crate) fn strip_word(text: &str, word: &str) -> String {
    let stripped = replace_word(text, word, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn word_ranges<'a>(text: &'a str, word: &'a str) -> impl Iterator<Item = (usize, usize)> + 'a {
    text.match_indices(word).filter_map(move |(start, _)| {
        let end = start + word.len();
        let left_ok = text[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let right_ok = text[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        (left_ok && right_ok).then_some((start, end))
    })
}
