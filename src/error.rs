//! Error taxonomy for the CBR core.
//!
//! Validation problems are recoverable (the constraint-acquisition
//! collaborator can correct and resubmit); everything else is fatal to the
//! current request or, for configuration errors, to startup. No error here
//! is used for control flow inside scoring or adaptation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CbrError {
    /// Constraints reference values unknown to the library's catalogs.
    /// Carries every offending value, not just the first.
    #[error("invalid constraints: {0}")]
    Validation(String),

    /// The retrieval pool is empty once failure-tainted cases are excluded.
    #[error("no eligible case for category '{category}'")]
    NoEligibleCase { category: String },

    /// The failure guard rejected every adaptation within the retry budget.
    #[error("retry budget of {budget} exhausted without a viable adaptation")]
    RetryBudgetExhausted { budget: usize },

    /// Library invariant violation at load time. Never silently drops
    /// records.
    #[error("case library configuration error: {0}")]
    Configuration(String),

    /// Persistence failure. In-memory state is ahead of durable state when
    /// this propagates out of learning; the caller decides whether to retry
    /// the save.
    #[error("case library store error: {0}")]
    Store(#[from] std::io::Error),

    #[error("case library parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
