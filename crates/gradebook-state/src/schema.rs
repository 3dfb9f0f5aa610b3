//! Row types for the Gradebook SurrealDB tables
//!
//! Tables:
//! - projects / project_participants
//! - evaluations
//! - grading_criteria
//! - project_types / defense_days / defense_slots / defense_registrations
//! - counters: per-table integer id sequences
//!
//! Every row carries its integer id in a dedicated field (`project_id`,
//! `evaluation_id`, ...) so lookups never depend on SurrealDB record ids.
//! Rows convert into the `storage_traits` types at the boundary.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::storage_traits::{
    DefenseDay, DefenseRegistration, DefenseSlot, Evaluation, GradingCriterion, NewCriterion,
    NewDefenseSlot, NewEvaluation, NewProject, NewProjectType, Project, ProjectParticipation,
    ProjectType, Scores,
};

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Project row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRow {
    pub project_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub author_id: i64,
    pub project_type_id: Option<i64>,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "surreal_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl ProjectRow {
    pub fn new(project_id: i64, project: NewProject) -> Self {
        let now = Utc::now();
        ProjectRow {
            project_id,
            name: project.name,
            description: project.description,
            author_id: project.author_id,
            project_type_id: project.project_type_id,
            created_at: now,
            updated_at: now,
        }
    }
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Project {
            id: row.project_id,
            name: row.name,
            description: row.description,
            author_id: row.author_id,
            project_type_id: row.project_type_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Project participation row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipationRow {
    pub project_id: i64,
    pub participant_id: i64,
    #[serde(with = "surreal_datetime")]
    pub joined_at: DateTime<Utc>,
}

impl ParticipationRow {
    pub fn new(project_id: i64, participant_id: i64) -> Self {
        ParticipationRow {
            project_id,
            participant_id,
            joined_at: Utc::now(),
        }
    }
}

impl From<ParticipationRow> for ProjectParticipation {
    fn from(row: ParticipationRow) -> Self {
        ProjectParticipation {
            project_id: row.project_id,
            participant_id: row.participant_id,
            joined_at: row.joined_at,
        }
    }
}

/// Evaluation row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRow {
    pub evaluation_id: i64,
    pub project_id: i64,
    pub participant_id: i64,
    pub evaluator_id: i64,
    /// Criterion key -> score (stored as an object)
    pub scores: Scores,
    pub comment: Option<String>,
    pub total_score: i64,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "surreal_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl EvaluationRow {
    pub fn new(evaluation_id: i64, evaluation: NewEvaluation) -> Self {
        let now = Utc::now();
        EvaluationRow {
            evaluation_id,
            project_id: evaluation.project_id,
            participant_id: evaluation.participant_id,
            evaluator_id: evaluation.evaluator_id,
            scores: evaluation.scores,
            comment: evaluation.comment,
            total_score: evaluation.total_score,
            created_at: now,
            updated_at: now,
        }
    }
}

impl From<EvaluationRow> for Evaluation {
    fn from(row: EvaluationRow) -> Self {
        Evaluation {
            id: row.evaluation_id,
            project_id: row.project_id,
            participant_id: row.participant_id,
            evaluator_id: row.evaluator_id,
            scores: row.scores,
            comment: row.comment,
            total_score: row.total_score,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Grading criterion row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionRow {
    pub criterion_id: i64,
    pub project_type_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub max_score: i64,
    pub weight: i64,
    pub order_index: i32,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
}

impl CriterionRow {
    pub fn new(criterion_id: i64, criterion: NewCriterion) -> Self {
        CriterionRow {
            criterion_id,
            project_type_id: criterion.project_type_id,
            name: criterion.name,
            description: criterion.description,
            max_score: criterion.max_score,
            weight: criterion.weight,
            order_index: criterion.order_index,
            created_at: Utc::now(),
        }
    }
}

impl From<GradingCriterion> for CriterionRow {
    fn from(c: GradingCriterion) -> Self {
        CriterionRow {
            criterion_id: c.id,
            project_type_id: c.project_type_id,
            name: c.name,
            description: c.description,
            max_score: c.max_score,
            weight: c.weight,
            order_index: c.order_index,
            created_at: c.created_at,
        }
    }
}

impl From<CriterionRow> for GradingCriterion {
    fn from(row: CriterionRow) -> Self {
        GradingCriterion {
            id: row.criterion_id,
            project_type_id: row.project_type_id,
            name: row.name,
            description: row.description,
            max_score: row.max_score,
            weight: row.weight,
            order_index: row.order_index,
            created_at: row.created_at,
        }
    }
}

/// Project type row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectTypeRow {
    pub project_type_id: i64,
    pub name: String,
    pub description: Option<String>,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
}

impl ProjectTypeRow {
    pub fn new(project_type_id: i64, project_type: NewProjectType) -> Self {
        ProjectTypeRow {
            project_type_id,
            name: project_type.name,
            description: project_type.description,
            created_at: Utc::now(),
        }
    }
}

impl From<ProjectTypeRow> for ProjectType {
    fn from(row: ProjectTypeRow) -> Self {
        ProjectType {
            id: row.project_type_id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

/// Defense day row; `date` is stored as an ISO `YYYY-MM-DD` string
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefenseDayRow {
    pub day_id: i64,
    pub date: NaiveDate,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
}

impl DefenseDayRow {
    pub fn new(day_id: i64, date: NaiveDate) -> Self {
        DefenseDayRow {
            day_id,
            date,
            created_at: Utc::now(),
        }
    }
}

impl From<DefenseDayRow> for DefenseDay {
    fn from(row: DefenseDayRow) -> Self {
        DefenseDay {
            id: row.day_id,
            date: row.date,
            created_at: row.created_at,
        }
    }
}

/// Defense slot row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotRow {
    pub slot_id: i64,
    pub defense_day_id: i64,
    pub slot_index: i32,
    pub project_type_id: i64,
    pub title: String,
    #[serde(with = "surreal_datetime")]
    pub start_at: DateTime<Utc>,
    #[serde(with = "surreal_datetime")]
    pub end_at: DateTime<Utc>,
    pub location: Option<String>,
    pub capacity: u32,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
}

impl SlotRow {
    pub fn new(slot_id: i64, slot: NewDefenseSlot) -> Self {
        SlotRow {
            slot_id,
            defense_day_id: slot.defense_day_id,
            slot_index: slot.slot_index,
            project_type_id: slot.project_type_id,
            title: slot.title,
            start_at: slot.start_at,
            end_at: slot.end_at,
            location: slot.location,
            capacity: slot.capacity,
            created_at: Utc::now(),
        }
    }
}

impl From<SlotRow> for DefenseSlot {
    fn from(row: SlotRow) -> Self {
        DefenseSlot {
            id: row.slot_id,
            defense_day_id: row.defense_day_id,
            slot_index: row.slot_index,
            project_type_id: row.project_type_id,
            title: row.title,
            start_at: row.start_at,
            end_at: row.end_at,
            location: row.location,
            capacity: row.capacity,
            created_at: row.created_at,
        }
    }
}

/// Defense registration row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationRow {
    pub registration_id: i64,
    pub slot_id: i64,
    pub user_id: i64,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
}

impl RegistrationRow {
    pub fn new(registration_id: i64, slot_id: i64, user_id: i64) -> Self {
        RegistrationRow {
            registration_id,
            slot_id,
            user_id,
            created_at: Utc::now(),
        }
    }
}

impl From<RegistrationRow> for DefenseRegistration {
    fn from(row: RegistrationRow) -> Self {
        DefenseRegistration {
            id: row.registration_id,
            slot_id: row.slot_id,
            user_id: row.user_id,
            created_at: row.created_at,
        }
    }
}

/// Current value of an id sequence in the `counters` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterRow {
    pub value: i64,
}
