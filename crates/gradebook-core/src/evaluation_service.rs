//! Evaluation creation and results aggregation.

use gradebook_state::{
    CriteriaStore, Evaluation, EvaluationStore, NewEvaluation, ProjectStore,
};
use tracing::{debug, instrument};

use crate::config::GradebookConfig;
use crate::domain::{
    aggregate_results, compute_total, validate_scores, EvaluationCreate, EvaluationResults,
    GradebookError, Result,
};
use crate::obs::{self, ProjectSpan};

/// Service layer over the evaluation, project and criteria stores.
pub struct EvaluationService<E, P, C> {
    evaluations: E,
    projects: P,
    criteria: C,
    config: GradebookConfig,
}

impl<E, P, C> EvaluationService<E, P, C>
where
    E: EvaluationStore,
    P: ProjectStore,
    C: CriteriaStore,
{
    pub fn new(evaluations: E, projects: P, criteria: C, config: GradebookConfig) -> Self {
        Self {
            evaluations,
            projects,
            criteria,
            config,
        }
    }

    /// Record one evaluator's scoring of a participant.
    ///
    /// The project must exist; this is checked before anything is written.
    /// `total_score` is always recomputed from `form.scores`, and a total
    /// outside the `i64` range is rejected without writing. Every call
    /// inserts a new evaluation, identical repeats included.
    #[instrument(skip(self, form), fields(project_id = form.project_id, participant_id = form.participant_id))]
    pub async fn create_evaluation(
        &self,
        form: EvaluationCreate,
        evaluator_id: i64,
    ) -> Result<Evaluation> {
        let project = self
            .projects
            .get_project(form.project_id)
            .await?
            .ok_or_else(|| GradebookError::not_found("Project", form.project_id))?;

        if self.config.strict_criteria {
            let project_type_id = project.project_type_id.ok_or_else(|| {
                GradebookError::Validation(format!(
                    "project {} has no project type to validate scores against",
                    project.id
                ))
            })?;
            let criteria = self.criteria.list_by_project_type(project_type_id).await?;
            validate_scores(&form.scores, &criteria)?;
        }

        let total_score = compute_total(&form.scores)?;
        let evaluation = self
            .evaluations
            .create_evaluation(NewEvaluation {
                project_id: form.project_id,
                participant_id: form.participant_id,
                evaluator_id,
                scores: form.scores,
                comment: form.comment,
                total_score,
            })
            .await?;

        let _span = ProjectSpan::enter(evaluation.project_id);
        obs::emit_evaluation_created(
            evaluation.id,
            evaluation.project_id,
            evaluation.participant_id,
            evaluation.evaluator_id,
            evaluation.total_score,
        );
        Ok(evaluation)
    }

    pub async fn get_evaluation(&self, id: i64) -> Result<Option<Evaluation>> {
        Ok(self.evaluations.get_evaluation(id).await?)
    }

    pub async fn project_evaluations(&self, project_id: i64) -> Result<Vec<Evaluation>> {
        Ok(self.evaluations.list_by_project(project_id).await?)
    }

    pub async fn participant_evaluations(
        &self,
        project_id: i64,
        participant_id: i64,
    ) -> Result<Vec<Evaluation>> {
        Ok(self
            .evaluations
            .list_by_project_and_participant(project_id, participant_id)
            .await?)
    }

    /// Per-participant average total score and evaluation count.
    ///
    /// Recomputed on every call. A project without evaluations (or an
    /// unknown project id) yields no items.
    #[instrument(skip(self))]
    pub async fn results_for_project(&self, project_id: i64) -> Result<EvaluationResults> {
        let evaluations = self.evaluations.list_by_project(project_id).await?;

        let _span = ProjectSpan::enter(project_id);
        let results = aggregate_results(project_id, &evaluations);

        debug!(items = results.items.len(), "aggregated project results");
        obs::emit_results_computed(project_id, evaluations.len(), results.items.len());
        Ok(results)
    }
}
