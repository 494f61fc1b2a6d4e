//! Case library storage and derived indices.
//!
//! The backing store is an ordered JSON array of case records, kept
//! category-contiguous on disk. Everything else here is derived and rebuilt
//! whenever the collection changes: family dictionaries, the ingredient
//! catalog, per-category groupings, per-case outcome history, and the
//! failure lineage used to steer retrieval away from known-bad cases.
//!
//! The library is an owned value passed by reference to the engines, never
//! ambient state; multiple independent libraries can coexist in one process.

use crate::error::CbrError;
use crate::types::{Case, Constraints, Evaluation, Ingredient};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The case collection plus every derived index.
#[derive(Debug)]
pub struct CaseLibrary {
    cases: Vec<Case>,
    path: Option<PathBuf>,

    categories: HashSet<String>,
    glass_types: HashSet<String>,
    alcohol_types: HashSet<String>,
    basic_tastes: HashSet<String>,
    /// alcohol type -> ingredient names of that type
    alcohol_dict: HashMap<String, HashSet<String>>,
    /// basic taste -> ingredient names of that taste
    basic_dict: HashMap<String, HashSet<String>>,
    /// Every ingredient instance appearing anywhere; the pool for
    /// additions and substitutions.
    catalog: Vec<Ingredient>,
    /// category -> indices into `cases`, in storage order
    by_category: HashMap<String, Vec<usize>>,
    /// case name -> (success mass, failure mass), weighted by human scores
    case_history: HashMap<String, (f64, f64)>,
    /// Names of cases known to have produced a failed adaptation.
    failure_lineage: HashSet<String>,
}

impl CaseLibrary {
    /// Load a case library from its JSON store and build the index.
    ///
    /// Malformed records and invariant violations are fatal: no record is
    /// silently dropped.
    pub fn load(path: &Path) -> Result<Self, CbrError> {
        let raw = fs::read_to_string(path)?;
        let cases: Vec<Case> = serde_json::from_str(&raw)?;
        let mut library = Self::from_cases(cases)?;
        library.path = Some(path.to_path_buf());
        info!(
            cases = library.cases.len(),
            categories = library.categories.len(),
            "case library loaded"
        );
        Ok(library)
    }

    /// Build a library from an in-memory collection (tests, ingestion).
    pub fn from_cases(cases: Vec<Case>) -> Result<Self, CbrError> {
        validate_collection(&cases)?;
        let mut library = Self {
            cases,
            path: None,
            categories: HashSet::new(),
            glass_types: HashSet::new(),
            alcohol_types: HashSet::new(),
            basic_tastes: HashSet::new(),
            alcohol_dict: HashMap::new(),
            basic_dict: HashMap::new(),
            catalog: Vec::new(),
            by_category: HashMap::new(),
            case_history: HashMap::new(),
            failure_lineage: HashSet::new(),
        };
        library.rebuild_index();
        Ok(library)
    }

    /// Serialize the collection back to the given path, preserving order.
    pub fn save(&self, path: &Path) -> Result<(), CbrError> {
        let json = serde_json::to_string_pretty(&self.cases)?;
        fs::write(path, json)?;
        debug!(cases = self.cases.len(), ?path, "case library saved");
        Ok(())
    }

    /// Write back to the path the library was loaded from. A no-op for
    /// in-memory libraries.
    pub fn persist(&self) -> Result<(), CbrError> {
        match &self.path {
            Some(path) => self.save(path),
            None => Ok(()),
        }
    }

    fn rebuild_index(&mut self) {
        self.categories.clear();
        self.glass_types.clear();
        self.alcohol_types.clear();
        self.basic_tastes.clear();
        self.alcohol_dict.clear();
        self.basic_dict.clear();
        self.catalog.clear();
        self.by_category.clear();
        self.failure_lineage.clear();

        for (idx, case) in self.cases.iter().enumerate() {
            self.categories.insert(case.category.clone());
            self.glass_types.insert(case.glass_type.clone());
            self.by_category
                .entry(case.category.clone())
                .or_default()
                .push(idx);
            self.case_history.entry(case.name.clone()).or_insert((0.0, 0.0));

            if case.evaluation == Evaluation::Failure {
                self.failure_lineage.insert(case.name.clone());
            }

            for ingr in &case.ingredients {
                if ingr.is_alcoholic() {
                    self.alcohol_types.insert(ingr.alc_type.clone());
                    self.alcohol_dict
                        .entry(ingr.alc_type.clone())
                        .or_default()
                        .insert(ingr.name.clone());
                } else {
                    self.basic_tastes.insert(ingr.basic_taste.clone());
                    self.basic_dict
                        .entry(ingr.basic_taste.clone())
                        .or_default()
                        .insert(ingr.name.clone());
                }
                self.catalog.push(ingr.clone());
            }
        }
    }

    pub fn cases(&self) -> &[Case] {
        &self.cases
    }

    pub fn case(&self, name: &str) -> Option<&Case> {
        self.cases.iter().find(|c| c.name == name)
    }

    /// Cases of one category in storage order.
    pub fn cases_in_category(&self, category: &str) -> Vec<&Case> {
        self.by_category
            .get(category)
            .map(|idxs| idxs.iter().map(|&i| &self.cases[i]).collect())
            .unwrap_or_default()
    }

    pub fn categories(&self) -> &HashSet<String> {
        &self.categories
    }

    pub fn glass_types(&self) -> &HashSet<String> {
        &self.glass_types
    }

    pub fn alcohol_types(&self) -> &HashSet<String> {
        &self.alcohol_types
    }

    pub fn basic_tastes(&self) -> &HashSet<String> {
        &self.basic_tastes
    }

    /// Alcohol family of an ingredient name, if it is alcoholic.
    pub fn alcohol_family_of(&self, name: &str) -> Option<&str> {
        self.alcohol_dict
            .iter()
            .find(|(_, names)| names.contains(name))
            .map(|(family, _)| family.as_str())
    }

    /// Basic-taste family of an ingredient name, if it is non-alcoholic.
    pub fn basic_taste_family_of(&self, name: &str) -> Option<&str> {
        self.basic_dict
            .iter()
            .find(|(_, names)| names.contains(name))
            .map(|(family, _)| family.as_str())
    }

    pub fn knows_ingredient(&self, name: &str) -> bool {
        self.alcohol_family_of(name).is_some() || self.basic_taste_family_of(name).is_some()
    }

    /// Catalog entries carrying the given ingredient name.
    pub fn catalog_entries(&self, name: &str) -> Vec<&Ingredient> {
        self.catalog.iter().filter(|i| i.name == name).collect()
    }

    /// Pick a random catalog ingredient matching the requested family,
    /// skipping excluded names. Returns `None` when every candidate is
    /// excluded.
    pub fn random_ingredient_with<R: Rng>(
        &self,
        rng: &mut R,
        alc_type: Option<&str>,
        basic_taste: Option<&str>,
        excluding: &HashSet<String>,
    ) -> Option<&Ingredient> {
        let candidates: Vec<&Ingredient> = self
            .catalog
            .iter()
            .filter(|i| alc_type.map_or(true, |t| i.alc_type == t))
            .filter(|i| basic_taste.map_or(true, |t| i.basic_taste == t))
            .filter(|i| !excluding.contains(&i.name))
            .collect();
        candidates.choose(rng).copied()
    }

    /// Check every constraint value against the library catalogs, collecting
    /// all offenders into one validation error.
    pub fn validate_constraints(&self, constraints: &Constraints) -> Result<(), CbrError> {
        let mut errs = Vec::new();

        for cat in &constraints.category {
            if !self.categories.contains(cat) {
                errs.push(format!("unknown category '{}'", cat));
            }
        }
        for glass in &constraints.glass_type {
            if !self.glass_types.contains(glass) {
                errs.push(format!("unknown glass type '{}'", glass));
            }
        }
        for name in constraints
            .ingredients
            .iter()
            .chain(&constraints.exc_ingredients)
        {
            if !self.knows_ingredient(name) {
                errs.push(format!("unknown ingredient '{}'", name));
            }
        }
        for alc in constraints.alc_type.iter().chain(&constraints.exc_alc_type) {
            if !self.alcohol_types.contains(alc) {
                errs.push(format!("unknown alcohol type '{}'", alc));
            }
        }
        for taste in constraints
            .basic_taste
            .iter()
            .chain(&constraints.exc_basic_taste)
        {
            if !self.basic_tastes.contains(taste) {
                errs.push(format!("unknown basic taste '{}'", taste));
            }
        }
        for name in &constraints.ingredients {
            if constraints.exc_ingredients.contains(name) {
                errs.push(format!("ingredient '{}' both requested and excluded", name));
            }
        }

        if errs.is_empty() {
            Ok(())
        } else {
            Err(CbrError::Validation(errs.join("; ")))
        }
    }

    /// Score-weighted outcome history of a case.
    pub fn history(&self, name: &str) -> (f64, f64) {
        self.case_history.get(name).copied().unwrap_or((0.0, 0.0))
    }

    /// Add a scored outcome to a case's history and return the new counters.
    /// The increment is the score magnitude, so strong ratings weigh more.
    pub fn record_outcome(&mut self, name: &str, success: bool, score: f64) -> (f64, f64) {
        let entry = self.case_history.entry(name.to_string()).or_insert((0.0, 0.0));
        if success {
            entry.0 += score;
        } else {
            entry.1 += score;
        }
        *entry
    }

    /// Overwrite the stored utility of a case.
    pub fn set_utility(&mut self, name: &str, utility: f64) {
        if let Some(case) = self.cases.iter_mut().find(|c| c.name == name) {
            case.utility = utility;
        }
    }

    /// Flag a stored case as a failure in place. The case stays in the
    /// collection so `derivation` back-references from its descendants keep
    /// resolving.
    pub fn mark_failure(&mut self, name: &str) {
        if let Some(case) = self.cases.iter_mut().find(|c| c.name == name) {
            case.evaluation = Evaluation::Failure;
        }
        self.failure_lineage.insert(name.to_string());
    }

    pub fn add_failure_lineage(&mut self, name: &str) {
        self.failure_lineage.insert(name.to_string());
    }

    pub fn failure_lineage(&self) -> &HashSet<String> {
        &self.failure_lineage
    }

    /// Insert a new case immediately after the last member of its category,
    /// or at the end for an unseen category, then rebuild the index.
    pub fn commit(&mut self, case: Case) {
        let insert_at = self
            .by_category
            .get(&case.category)
            .and_then(|idxs| idxs.last())
            .map(|&last| last + 1)
            .unwrap_or(self.cases.len());
        info!(name = %case.name, category = %case.category, insert_at, "committing case");
        self.cases.insert(insert_at, case);
        self.rebuild_index();
    }
}

/// Load-time invariant checks over the raw collection.
fn validate_collection(cases: &[Case]) -> Result<(), CbrError> {
    let mut names = HashSet::new();
    for case in cases {
        if !names.insert(case.name.as_str()) {
            return Err(CbrError::Configuration(format!(
                "duplicate case name '{}'",
                case.name
            )));
        }

        let mut ids = HashSet::new();
        for ingr in &case.ingredients {
            if !ids.insert(ingr.id.as_str()) {
                return Err(CbrError::Configuration(format!(
                    "case '{}': duplicate ingredient id '{}'",
                    case.name, ingr.id
                )));
            }
            match (ingr.alc_type.is_empty(), ingr.basic_taste.is_empty()) {
                (false, false) => {
                    return Err(CbrError::Configuration(format!(
                        "ingredient '{}' tagged with both an alcohol type and a basic taste",
                        ingr.name
                    )))
                }
                (true, true) => {
                    return Err(CbrError::Configuration(format!(
                        "ingredient '{}' tagged with neither an alcohol type nor a basic taste",
                        ingr.name
                    )))
                }
                _ => {}
            }
        }
    }
    Ok(())
}
