//! SurrealDB-backed implementations of the storage traits
//!
//! Uses the row types in `schema` for persistence, converting to/from
//! `storage_traits` types at the boundary. Application-level uniqueness
//! checks give readable conflicts; the UNIQUE indexes from `migrations`
//! catch anything that races past them (mapped to `StorageError::Conflict`).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::StorageError;
use crate::handle::SurrealHandle;
use crate::schema::{
    CriterionRow, DefenseDayRow, EvaluationRow, ParticipationRow, ProjectRow, ProjectTypeRow,
    RegistrationRow, SlotRow,
};
use crate::storage_traits::*;

/// Registration count per slot, as returned by the GROUP BY query
#[derive(Debug, Deserialize)]
struct SlotCountRow {
    slot_id: i64,
    registrations_count: u32,
}

fn created<T>(row: Option<T>, table: &str) -> StorageResult<T> {
    row.ok_or_else(|| StorageError::Backend(format!("failed to create {table} record")))
}

// ---------------------------------------------------------------------------
// ProjectStore
// ---------------------------------------------------------------------------

#[async_trait]
impl ProjectStore for SurrealHandle {
    #[instrument(skip(self, project), fields(name = %project.name))]
    async fn create_project(&self, project: NewProject) -> StorageResult<Project> {
        let id = self.next_id("projects").await?;
        let row = ProjectRow::new(id, project);

        let saved: Option<ProjectRow> = self.db.create("projects").content(row).await?;
        debug!(project_id = id, "project created");
        created(saved, "project").map(Project::from)
    }

    #[instrument(skip(self))]
    async fn get_project(&self, id: i64) -> StorageResult<Option<Project>> {
        let mut result = self
            .db
            .query("SELECT * FROM projects WHERE project_id = $id")
            .bind(("id", id))
            .await?;

        let rows: Vec<ProjectRow> = result.take(0)?;
        Ok(rows.into_iter().next().map(Project::from))
    }

    #[instrument(skip(self))]
    async fn add_participant(
        &self,
        project_id: i64,
        participant_id: i64,
    ) -> StorageResult<ProjectParticipation> {
        if self.get_project(project_id).await?.is_none() {
            return Err(StorageError::ProjectNotFound { id: project_id });
        }

        let mut result = self
            .db
            .query(
                "SELECT * FROM project_participants \
                 WHERE project_id = $pid AND participant_id = $uid",
            )
            .bind(("pid", project_id))
            .bind(("uid", participant_id))
            .await?;
        let existing: Vec<ParticipationRow> = result.take(0)?;
        if !existing.is_empty() {
            return Err(StorageError::Conflict(format!(
                "participant {participant_id} already in project {project_id}"
            )));
        }

        let row = ParticipationRow::new(project_id, participant_id);
        let saved: Option<ParticipationRow> =
            self.db.create("project_participants").content(row).await?;
        created(saved, "participation").map(ProjectParticipation::from)
    }

    #[instrument(skip(self))]
    async fn list_participants(&self, project_id: i64) -> StorageResult<Vec<ProjectParticipation>> {
        let mut result = self
            .db
            .query("SELECT * FROM project_participants WHERE project_id = $pid ORDER BY joined_at ASC")
            .bind(("pid", project_id))
            .await?;

        let rows: Vec<ParticipationRow> = result.take(0)?;
        Ok(rows.into_iter().map(ProjectParticipation::from).collect())
    }
}

// ---------------------------------------------------------------------------
// EvaluationStore
// ---------------------------------------------------------------------------

#[async_trait]
impl EvaluationStore for SurrealHandle {
    #[instrument(skip(self, evaluation), fields(project_id = evaluation.project_id, participant_id = evaluation.participant_id))]
    async fn create_evaluation(&self, evaluation: NewEvaluation) -> StorageResult<Evaluation> {
        let id = self.next_id("evaluations").await?;
        let row = EvaluationRow::new(id, evaluation);

        let saved: Option<EvaluationRow> = self.db.create("evaluations").content(row).await?;
        debug!(evaluation_id = id, "evaluation stored");
        created(saved, "evaluation").map(Evaluation::from)
    }

    #[instrument(skip(self))]
    async fn get_evaluation(&self, id: i64) -> StorageResult<Option<Evaluation>> {
        let mut result = self
            .db
            .query("SELECT * FROM evaluations WHERE evaluation_id = $id")
            .bind(("id", id))
            .await?;

        let rows: Vec<EvaluationRow> = result.take(0)?;
        Ok(rows.into_iter().next().map(Evaluation::from))
    }

    #[instrument(skip(self))]
    async fn list_by_project(&self, project_id: i64) -> StorageResult<Vec<Evaluation>> {
        let mut result = self
            .db
            .query("SELECT * FROM evaluations WHERE project_id = $pid ORDER BY evaluation_id ASC")
            .bind(("pid", project_id))
            .await?;

        let rows: Vec<EvaluationRow> = result.take(0)?;
        Ok(rows.into_iter().map(Evaluation::from).collect())
    }

    #[instrument(skip(self))]
    async fn list_by_project_and_participant(
        &self,
        project_id: i64,
        participant_id: i64,
    ) -> StorageResult<Vec<Evaluation>> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM evaluations \
                 WHERE project_id = $pid AND participant_id = $uid \
                 ORDER BY evaluation_id ASC",
            )
            .bind(("pid", project_id))
            .bind(("uid", participant_id))
            .await?;

        let rows: Vec<EvaluationRow> = result.take(0)?;
        Ok(rows.into_iter().map(Evaluation::from).collect())
    }
}

// ---------------------------------------------------------------------------
// CriteriaStore
// ---------------------------------------------------------------------------

#[async_trait]
impl CriteriaStore for SurrealHandle {
    #[instrument(skip(self, criterion), fields(project_type_id = criterion.project_type_id, name = %criterion.name))]
    async fn create_criterion(&self, criterion: NewCriterion) -> StorageResult<GradingCriterion> {
        let id = self.next_id("grading_criteria").await?;
        let row = CriterionRow::new(id, criterion);

        let saved: Option<CriterionRow> = self.db.create("grading_criteria").content(row).await?;
        created(saved, "grading criterion").map(GradingCriterion::from)
    }

    #[instrument(skip(self))]
    async fn get_criterion(&self, id: i64) -> StorageResult<Option<GradingCriterion>> {
        let mut result = self
            .db
            .query("SELECT * FROM grading_criteria WHERE criterion_id = $id")
            .bind(("id", id))
            .await?;

        let rows: Vec<CriterionRow> = result.take(0)?;
        Ok(rows.into_iter().next().map(GradingCriterion::from))
    }

    #[instrument(skip(self, update))]
    async fn update_criterion(
        &self,
        id: i64,
        update: CriterionUpdate,
    ) -> StorageResult<GradingCriterion> {
        let mut criterion = self
            .get_criterion(id)
            .await?
            .ok_or(StorageError::CriterionNotFound { id })?;
        update.apply(&mut criterion);

        let row = CriterionRow::from(criterion.clone());
        self.db
            .query("UPDATE grading_criteria CONTENT $row WHERE criterion_id = $id")
            .bind(("row", row))
            .bind(("id", id))
            .await?
            .check()?;

        Ok(criterion)
    }

    #[instrument(skip(self))]
    async fn list_by_project_type(
        &self,
        project_type_id: i64,
    ) -> StorageResult<Vec<GradingCriterion>> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM grading_criteria WHERE project_type_id = $pt \
                 ORDER BY order_index ASC, criterion_id ASC",
            )
            .bind(("pt", project_type_id))
            .await?;

        let rows: Vec<CriterionRow> = result.take(0)?;
        Ok(rows.into_iter().map(GradingCriterion::from).collect())
    }

    #[instrument(skip(self))]
    async fn total_max_score(&self, project_type_id: i64) -> StorageResult<i64> {
        let criteria = self.list_by_project_type(project_type_id).await?;
        Ok(criteria.iter().map(|c| c.max_score * c.weight).sum())
    }

    #[instrument(skip(self))]
    async fn exists_by_name(
        &self,
        project_type_id: i64,
        name: &str,
        exclude_id: Option<i64>,
    ) -> StorageResult<bool> {
        let mut result = self
            .db
            .query("SELECT * FROM grading_criteria WHERE project_type_id = $pt AND name = $name")
            .bind(("pt", project_type_id))
            .bind(("name", name.to_string()))
            .await?;

        let rows: Vec<CriterionRow> = result.take(0)?;
        Ok(rows.iter().any(|row| Some(row.criterion_id) != exclude_id))
    }
}

// ---------------------------------------------------------------------------
// DefenseStore
// ---------------------------------------------------------------------------

impl SurrealHandle {
    async fn registration_counts(&self) -> StorageResult<HashMap<i64, u32>> {
        let mut result = self
            .db
            .query(
                "SELECT slot_id, count() AS registrations_count \
                 FROM defense_registrations GROUP BY slot_id",
            )
            .await?;

        let rows: Vec<SlotCountRow> = result.take(0)?;
        Ok(rows
            .into_iter()
            .map(|row| (row.slot_id, row.registrations_count))
            .collect())
    }
}

#[async_trait]
impl DefenseStore for SurrealHandle {
    #[instrument(skip(self, project_type), fields(name = %project_type.name))]
    async fn create_project_type(
        &self,
        project_type: NewProjectType,
    ) -> StorageResult<ProjectType> {
        let mut result = self
            .db
            .query("SELECT * FROM project_types WHERE name = $name")
            .bind(("name", project_type.name.clone()))
            .await?;
        let existing: Vec<ProjectTypeRow> = result.take(0)?;
        if !existing.is_empty() {
            return Err(StorageError::Conflict(format!(
                "project type '{}' already exists",
                project_type.name
            )));
        }

        let id = self.next_id("project_types").await?;
        let row = ProjectTypeRow::new(id, project_type);
        let saved: Option<ProjectTypeRow> = self.db.create("project_types").content(row).await?;
        created(saved, "project type").map(ProjectType::from)
    }

    #[instrument(skip(self))]
    async fn get_project_type(&self, id: i64) -> StorageResult<Option<ProjectType>> {
        let mut result = self
            .db
            .query("SELECT * FROM project_types WHERE project_type_id = $id")
            .bind(("id", id))
            .await?;

        let rows: Vec<ProjectTypeRow> = result.take(0)?;
        Ok(rows.into_iter().next().map(ProjectType::from))
    }

    #[instrument(skip(self))]
    async fn list_project_types(&self) -> StorageResult<Vec<ProjectType>> {
        let mut result = self
            .db
            .query("SELECT * FROM project_types ORDER BY name ASC")
            .await?;

        let rows: Vec<ProjectTypeRow> = result.take(0)?;
        Ok(rows.into_iter().map(ProjectType::from).collect())
    }

    #[instrument(skip(self))]
    async fn create_day(&self, date: NaiveDate) -> StorageResult<DefenseDay> {
        if self.get_day_by_date(date).await?.is_some() {
            return Err(StorageError::Conflict(format!(
                "defense day {date} already exists"
            )));
        }

        let id = self.next_id("defense_days").await?;
        let row = DefenseDayRow::new(id, date);
        let saved: Option<DefenseDayRow> = self.db.create("defense_days").content(row).await?;
        created(saved, "defense day").map(DefenseDay::from)
    }

    #[instrument(skip(self))]
    async fn get_day(&self, id: i64) -> StorageResult<Option<DefenseDay>> {
        let mut result = self
            .db
            .query("SELECT * FROM defense_days WHERE day_id = $id")
            .bind(("id", id))
            .await?;

        let rows: Vec<DefenseDayRow> = result.take(0)?;
        Ok(rows.into_iter().next().map(DefenseDay::from))
    }

    #[instrument(skip(self))]
    async fn get_day_by_date(&self, date: NaiveDate) -> StorageResult<Option<DefenseDay>> {
        let mut result = self
            .db
            .query("SELECT * FROM defense_days WHERE date = $date")
            .bind(("date", date))
            .await?;

        let rows: Vec<DefenseDayRow> = result.take(0)?;
        Ok(rows.into_iter().next().map(DefenseDay::from))
    }

    #[instrument(skip(self))]
    async fn list_days(&self) -> StorageResult<Vec<DefenseDay>> {
        let mut result = self
            .db
            .query("SELECT * FROM defense_days ORDER BY date ASC")
            .await?;

        let rows: Vec<DefenseDayRow> = result.take(0)?;
        Ok(rows.into_iter().map(DefenseDay::from).collect())
    }

    #[instrument(skip(self, slot), fields(defense_day_id = slot.defense_day_id, slot_index = slot.slot_index))]
    async fn create_slot(&self, slot: NewDefenseSlot) -> StorageResult<DefenseSlot> {
        let mut result = self
            .db
            .query("SELECT * FROM defense_slots WHERE defense_day_id = $day AND slot_index = $idx")
            .bind(("day", slot.defense_day_id))
            .bind(("idx", slot.slot_index))
            .await?;
        let existing: Vec<SlotRow> = result.take(0)?;
        if !existing.is_empty() {
            return Err(StorageError::Conflict(format!(
                "slot {} already exists on defense day {}",
                slot.slot_index, slot.defense_day_id
            )));
        }

        let id = self.next_id("defense_slots").await?;
        let row = SlotRow::new(id, slot);
        let saved: Option<SlotRow> = self.db.create("defense_slots").content(row).await?;
        created(saved, "defense slot").map(DefenseSlot::from)
    }

    #[instrument(skip(self))]
    async fn get_slot(&self, id: i64) -> StorageResult<Option<DefenseSlot>> {
        let mut result = self
            .db
            .query("SELECT * FROM defense_slots WHERE slot_id = $id")
            .bind(("id", id))
            .await?;

        let rows: Vec<SlotRow> = result.take(0)?;
        Ok(rows.into_iter().next().map(DefenseSlot::from))
    }

    #[instrument(skip(self))]
    async fn list_slots(&self, filter: SlotFilter) -> StorageResult<Vec<SlotWithCount>> {
        let mut conditions = Vec::new();
        if filter.defense_day_id.is_some() {
            conditions.push("defense_day_id = $day");
        }
        if filter.project_type_id.is_some() {
            conditions.push("project_type_id = $pt");
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        let sql = format!(
            "SELECT * FROM defense_slots{} ORDER BY start_at ASC, slot_index ASC",
            where_clause
        );

        let mut query = self.db.query(sql);
        if let Some(day) = filter.defense_day_id {
            query = query.bind(("day", day));
        }
        if let Some(pt) = filter.project_type_id {
            query = query.bind(("pt", pt));
        }
        let mut result = query.await?;
        let rows: Vec<SlotRow> = result.take(0)?;

        let counts = self.registration_counts().await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let registrations_count = counts.get(&row.slot_id).copied().unwrap_or(0);
                SlotWithCount {
                    slot: DefenseSlot::from(row),
                    registrations_count,
                }
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn create_registration(
        &self,
        slot_id: i64,
        user_id: i64,
    ) -> StorageResult<DefenseRegistration> {
        if self.find_registration(slot_id, user_id).await?.is_some() {
            return Err(StorageError::Conflict(format!(
                "user {user_id} already registered for slot {slot_id}"
            )));
        }

        let id = self.next_id("defense_registrations").await?;
        let row = RegistrationRow::new(id, slot_id, user_id);
        let saved: Option<RegistrationRow> = self
            .db
            .create("defense_registrations")
            .content(row)
            .await?;
        created(saved, "registration").map(DefenseRegistration::from)
    }

    #[instrument(skip(self))]
    async fn find_registration(
        &self,
        slot_id: i64,
        user_id: i64,
    ) -> StorageResult<Option<DefenseRegistration>> {
        let mut result = self
            .db
            .query("SELECT * FROM defense_registrations WHERE slot_id = $sid AND user_id = $uid")
            .bind(("sid", slot_id))
            .bind(("uid", user_id))
            .await?;

        let rows: Vec<RegistrationRow> = result.take(0)?;
        Ok(rows.into_iter().next().map(DefenseRegistration::from))
    }

    #[instrument(skip(self))]
    async fn delete_registration(&self, slot_id: i64, user_id: i64) -> StorageResult<()> {
        let mut result = self
            .db
            .query(
                "DELETE defense_registrations \
                 WHERE slot_id = $sid AND user_id = $uid RETURN BEFORE",
            )
            .bind(("sid", slot_id))
            .bind(("uid", user_id))
            .await?;

        let deleted: Vec<RegistrationRow> = result.take(0)?;
        if deleted.is_empty() {
            return Err(StorageError::RegistrationNotFound { slot_id, user_id });
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_registrations_by_user(
        &self,
        user_id: i64,
    ) -> StorageResult<Vec<DefenseRegistration>> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM defense_registrations WHERE user_id = $uid \
                 ORDER BY registration_id ASC",
            )
            .bind(("uid", user_id))
            .await?;

        let rows: Vec<RegistrationRow> = result.take(0)?;
        Ok(rows.into_iter().map(DefenseRegistration::from).collect())
    }

    #[instrument(skip(self))]
    async fn count_registrations(&self, slot_id: i64) -> StorageResult<u32> {
        let mut result = self
            .db
            .query("SELECT * FROM defense_registrations WHERE slot_id = $sid")
            .bind(("sid", slot_id))
            .await?;

        let rows: Vec<RegistrationRow> = result.take(0)?;
        Ok(rows.len() as u32)
    }
}
