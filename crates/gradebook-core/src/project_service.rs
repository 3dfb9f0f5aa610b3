use gradebook_state::{DefenseStore, NewProject, Project, ProjectParticipation, ProjectStore};
use tracing::instrument;

use crate::domain::{GradebookError, Result};

/// Thin API layer over project and participation storage.
///
/// The defense store is only consulted to confirm a project's type exists.
pub struct ProjectService<P, D> {
    projects: P,
    defense: D,
}

impl<P, D> ProjectService<P, D>
where
    P: ProjectStore,
    D: DefenseStore,
{
    pub fn new(projects: P, defense: D) -> Self {
        Self { projects, defense }
    }

    #[instrument(skip(self, project), fields(name = %project.name))]
    pub async fn create_project(&self, project: NewProject) -> Result<Project> {
        if project.name.trim().is_empty() {
            return Err(GradebookError::Validation(
                "project name must not be empty".to_string(),
            ));
        }
        if let Some(type_id) = project.project_type_id {
            if self.defense.get_project_type(type_id).await?.is_none() {
                return Err(GradebookError::not_found("Project type", type_id));
            }
        }
        Ok(self.projects.create_project(project).await?)
    }

    pub async fn get_project(&self, id: i64) -> Result<Project> {
        self.projects
            .get_project(id)
            .await?
            .ok_or_else(|| GradebookError::not_found("Project", id))
    }

    #[instrument(skip(self))]
    pub async fn add_participant(
        &self,
        project_id: i64,
        participant_id: i64,
    ) -> Result<ProjectParticipation> {
        self.get_project(project_id).await?;
        Ok(self
            .projects
            .add_participant(project_id, participant_id)
            .await?)
    }

    pub async fn participants(&self, project_id: i64) -> Result<Vec<ProjectParticipation>> {
        self.get_project(project_id).await?;
        Ok(self.projects.list_participants(project_id).await?)
    }
}
