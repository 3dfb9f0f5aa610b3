//! Structured observability hooks for Gradebook domain events.
//!
//! This module provides:
//! - Project-scoped tracing spans via the `ProjectSpan` RAII guard
//! - Emission functions for the events worth auditing: evaluation created,
//!   results computed, criterion created, defense registration changes
//!
//! Events are emitted at `info!` level (filter with `RUST_LOG`).
//! For JSON output, pass `--json` to the CLI.

use tracing::info;

/// RAII guard that enters a project-scoped tracing span.
///
/// # Example
///
/// ```ignore
/// let _span = ProjectSpan::enter(42);
/// // Now all tracing calls are associated with project_id = 42
/// ```
pub struct ProjectSpan {
    _span: tracing::span::EnteredSpan,
}

impl ProjectSpan {
    /// Create and enter a span tagged with the project id.
    pub fn enter(project_id: i64) -> Self {
        let span = tracing::info_span!("gradebook.project", project_id = project_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: evaluation stored with its computed total.
///
/// # Example
///
/// ```ignore
/// emit_evaluation_created(7, 1, 10, 3, 15);
/// // logs: event=evaluation.created evaluation_id=7 project_id=1 ...
/// ```
pub fn emit_evaluation_created(
    evaluation_id: i64,
    project_id: i64,
    participant_id: i64,
    evaluator_id: i64,
    total_score: i64,
) {
    info!(
        event = "evaluation.created",
        evaluation_id = evaluation_id,
        project_id = project_id,
        participant_id = participant_id,
        evaluator_id = evaluator_id,
        total_score = total_score,
    );
}

/// Emit event: project results aggregated.
pub fn emit_results_computed(project_id: i64, evaluations: usize, participants: usize) {
    info!(
        event = "results.computed",
        project_id = project_id,
        evaluations = evaluations,
        participants = participants,
    );
}

/// Emit event: grading criterion added to a project type.
pub fn emit_criterion_created(criterion_id: i64, project_type_id: i64, name: &str) {
    info!(
        event = "criterion.created",
        criterion_id = criterion_id,
        project_type_id = project_type_id,
        name = %name,
    );
}

/// Emit event: user registered for a defense slot.
pub fn emit_defense_registered(slot_id: i64, user_id: i64, registrations_count: u32) {
    info!(
        event = "defense.registered",
        slot_id = slot_id,
        user_id = user_id,
        registrations_count = registrations_count,
    );
}

/// Emit event: user removed from a defense slot.
pub fn emit_defense_unregistered(slot_id: i64, user_id: i64) {
    info!(event = "defense.unregistered", slot_id = slot_id, user_id = user_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_span_create() {
        // Just ensure ProjectSpan::enter doesn't panic
        let _span = ProjectSpan::enter(42);
        emit_results_computed(42, 0, 0);
    }

    #[test]
    fn test_project_span_is_current_until_dropped() {
        tracing::subscriber::with_default(tracing_subscriber::registry(), || {
            let span = ProjectSpan::enter(7);
            let current = tracing::Span::current();
            assert_eq!(current.metadata().map(|m| m.name()), Some("gradebook.project"));

            drop(span);
            assert!(tracing::Span::current().is_none());
        });
    }
}
