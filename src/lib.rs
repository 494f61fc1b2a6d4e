//! mixcase - case-based reasoning for cocktail recipes.
//!
//! Instead of generating recipes from scratch, mixcase reuses prior ones:
//! it retrieves the stored case most similar to the user's constraints,
//! adapts its ingredients and preparation until the constraints hold,
//! refuses adaptations that rediscover recipes already proven bad, and
//! learns from human ratings by reweighting the parent case's utility and
//! growing the library with the new case.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use mixcase::{CaseLibrary, CbrEngine, Constraints};
//!
//! let library = CaseLibrary::load(&path)?;
//! let mut engine = CbrEngine::new(library);
//!
//! let rec = engine.recommend(&constraints)?;
//! for step in rec.adapted.render_preparation() {
//!     println!("{step}");
//! }
//!
//! // Close the loop with a human rating (skipped when nothing changed).
//! if !rec.is_original() {
//!     engine.evaluate(&rec, score)?;
//! }
//! ```
//!
//! # The cycle
//!
//! ```text
//! constraints
//!     │ validate against library catalogs
//!     ▼
//! Retrieval ──► Adaptation ──► Failure Guard ──► recommendation
//!     ▲                             │ rejected (retry budget bounded)
//!     └─────────────────────────────┘
//!                       human score ──► Learning ──► library + store
//! ```

pub mod adaptation;
pub mod cbr;
pub mod error;
pub mod guard;
pub mod learning;
pub mod library;
pub mod retrieval;
pub mod similarity;
pub mod types;

pub use cbr::{CbrEngine, Recommendation, DEFAULT_RETRY_BUDGET};
pub use error::CbrError;
pub use guard::DEFAULT_GUARD_THRESHOLD;
pub use learning::DEFAULT_SUCCESS_THRESHOLD;
pub use library::CaseLibrary;
pub use similarity::SimilarityWeights;
pub use types::{Case, Constraints, Evaluation, Ingredient, ORIGINAL};
