//! Domain models for Gradebook.
//!
//! - `EvaluationCreate`: evaluation form submitted by an evaluator
//! - `EvaluationResultItem` / `EvaluationResults`: derived per-participant aggregates
//! - `GradebookError`: the domain error taxonomy

pub mod error;
pub mod evaluation;
pub mod scoring;

// Re-export main types and errors
pub use error::{GradebookError, Result};
pub use evaluation::{validate_scores, EvaluationCreate};
pub use scoring::{aggregate_results, compute_total, EvaluationResultItem, EvaluationResults};
