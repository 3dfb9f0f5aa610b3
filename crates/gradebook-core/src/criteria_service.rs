//! Grading criteria management per project type.

use gradebook_state::{
    CriteriaStore, CriterionUpdate, DefenseStore, GradingCriterion, NewCriterion,
};
use tracing::instrument;

use crate::domain::{GradebookError, Result};
use crate::obs;

fn check_positive(field: &str, value: i64) -> Result<()> {
    if value <= 0 {
        return Err(GradebookError::Validation(format!(
            "{field} must be greater than 0, got {value}"
        )));
    }
    Ok(())
}

fn check_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(GradebookError::Validation(
            "criterion name must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Service layer over the criteria store.
///
/// Project types live in the defense store, which is consulted only to
/// confirm that a criterion's project type exists.
pub struct CriteriaService<C, D> {
    criteria: C,
    defense: D,
}

impl<C, D> CriteriaService<C, D>
where
    C: CriteriaStore,
    D: DefenseStore,
{
    pub fn new(criteria: C, defense: D) -> Self {
        Self { criteria, defense }
    }

    #[instrument(skip(self, criterion), fields(project_type_id = criterion.project_type_id, name = %criterion.name))]
    pub async fn create_criterion(&self, criterion: NewCriterion) -> Result<GradingCriterion> {
        check_name(&criterion.name)?;
        check_positive("max_score", criterion.max_score)?;
        check_positive("weight", criterion.weight)?;

        if self
            .defense
            .get_project_type(criterion.project_type_id)
            .await?
            .is_none()
        {
            return Err(GradebookError::not_found(
                "Project type",
                criterion.project_type_id,
            ));
        }
        if self
            .criteria
            .exists_by_name(criterion.project_type_id, &criterion.name, None)
            .await?
        {
            return Err(GradebookError::Conflict(format!(
                "criterion '{}' already exists for project type {}",
                criterion.name, criterion.project_type_id
            )));
        }

        let created = self.criteria.create_criterion(criterion).await?;
        obs::emit_criterion_created(created.id, created.project_type_id, &created.name);
        Ok(created)
    }

    /// Apply a partial update. Renaming onto another criterion of the same
    /// project type is a conflict; keeping the current name is not.
    #[instrument(skip(self, update))]
    pub async fn update_criterion(
        &self,
        id: i64,
        update: CriterionUpdate,
    ) -> Result<GradingCriterion> {
        let current = self
            .criteria
            .get_criterion(id)
            .await?
            .ok_or_else(|| GradebookError::not_found("Grading criterion", id))?;

        if let Some(name) = &update.name {
            check_name(name)?;
            if self
                .criteria
                .exists_by_name(current.project_type_id, name, Some(id))
                .await?
            {
                return Err(GradebookError::Conflict(format!(
                    "criterion '{}' already exists for project type {}",
                    name, current.project_type_id
                )));
            }
        }
        if let Some(max_score) = update.max_score {
            check_positive("max_score", max_score)?;
        }
        if let Some(weight) = update.weight {
            check_positive("weight", weight)?;
        }

        Ok(self.criteria.update_criterion(id, update).await?)
    }

    pub async fn get_criterion(&self, id: i64) -> Result<GradingCriterion> {
        self.criteria
            .get_criterion(id)
            .await?
            .ok_or_else(|| GradebookError::not_found("Grading criterion", id))
    }

    /// Criteria of a project type in display order.
    pub async fn list_criteria(&self, project_type_id: i64) -> Result<Vec<GradingCriterion>> {
        Ok(self.criteria.list_by_project_type(project_type_id).await?)
    }

    /// Highest reachable weighted score for a project type.
    pub async fn total_max_score(&self, project_type_id: i64) -> Result<i64> {
        Ok(self.criteria.total_max_score(project_type_id).await?)
    }
}
