//! Storage trait definitions for Gradebook
//!
//! These traits define the repositories the services are written against:
//! - `ProjectStore`: projects and project participation
//! - `EvaluationStore`: evaluation records (append-only)
//! - `CriteriaStore`: grading criteria per project type
//! - `DefenseStore`: project types, defense days, slots and registrations
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module; `SurrealHandle` implements every
//! trait against SurrealDB.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Per-criterion scores of one evaluation, keyed by criterion key.
pub type Scores = BTreeMap<String, i64>;

// ---------------------------------------------------------------------------
// ProjectStore
// ---------------------------------------------------------------------------

/// A student project that can be evaluated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// User who owns the project
    pub author_id: i64,
    /// Project type, which selects the grading criteria
    pub project_type_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub author_id: i64,
    pub project_type_id: Option<i64>,
}

/// Membership of a participant in a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectParticipation {
    pub project_id: i64,
    pub participant_id: i64,
    pub joined_at: DateTime<Utc>,
}

/// Project repository.
///
/// Guarantees:
/// - `get_project` returns `Ok(None)` for unknown ids (absence is not an error).
/// - A participant joins a project at most once.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Persist a new project and return it with its assigned id.
    async fn create_project(&self, project: NewProject) -> StorageResult<Project>;

    /// Look up a project by id.
    async fn get_project(&self, id: i64) -> StorageResult<Option<Project>>;

    /// Add a participant. `ProjectNotFound` for unknown projects, `Conflict` on duplicates.
    async fn add_participant(
        &self,
        project_id: i64,
        participant_id: i64,
    ) -> StorageResult<ProjectParticipation>;

    /// List the participants of a project in join order.
    async fn list_participants(&self, project_id: i64) -> StorageResult<Vec<ProjectParticipation>>;
}

// ---------------------------------------------------------------------------
// EvaluationStore
// ---------------------------------------------------------------------------

/// One evaluator's scoring of one participant on one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: i64,
    pub project_id: i64,
    pub participant_id: i64,
    pub evaluator_id: i64,
    pub scores: Scores,
    pub comment: Option<String>,
    /// Sum of `scores`, computed when the evaluation was created
    pub total_score: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row to insert; `total_score` is filled in by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvaluation {
    pub project_id: i64,
    pub participant_id: i64,
    pub evaluator_id: i64,
    pub scores: Scores,
    pub comment: Option<String>,
    pub total_score: i64,
}

/// Evaluation repository.
///
/// Guarantees:
/// - Every `create_evaluation` call inserts a new row with a fresh id.
/// - Listings are ordered by id (insertion order).
#[async_trait]
pub trait EvaluationStore: Send + Sync {
    async fn create_evaluation(&self, evaluation: NewEvaluation) -> StorageResult<Evaluation>;

    async fn get_evaluation(&self, id: i64) -> StorageResult<Option<Evaluation>>;

    /// All evaluations recorded for a project.
    async fn list_by_project(&self, project_id: i64) -> StorageResult<Vec<Evaluation>>;

    /// Evaluations of one participant within a project.
    async fn list_by_project_and_participant(
        &self,
        project_id: i64,
        participant_id: i64,
    ) -> StorageResult<Vec<Evaluation>>;
}

// ---------------------------------------------------------------------------
// CriteriaStore
// ---------------------------------------------------------------------------

/// A named dimension of assessment for a project type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradingCriterion {
    pub id: i64,
    pub project_type_id: i64,
    /// Also the key used in an evaluation's score mapping
    pub name: String,
    pub description: Option<String>,
    pub max_score: i64,
    pub weight: i64,
    pub order_index: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCriterion {
    pub project_type_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub max_score: i64,
    pub weight: i64,
    pub order_index: i32,
}

/// Partial update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub max_score: Option<i64>,
    pub weight: Option<i64>,
    pub order_index: Option<i32>,
}

impl CriterionUpdate {
    /// Apply the update to an existing criterion.
    pub fn apply(&self, criterion: &mut GradingCriterion) {
        if let Some(name) = &self.name {
            criterion.name = name.clone();
        }
        if let Some(description) = &self.description {
            criterion.description = Some(description.clone());
        }
        if let Some(max_score) = self.max_score {
            criterion.max_score = max_score;
        }
        if let Some(weight) = self.weight {
            criterion.weight = weight;
        }
        if let Some(order_index) = self.order_index {
            criterion.order_index = order_index;
        }
    }
}

/// Grading criteria repository.
#[async_trait]
pub trait CriteriaStore: Send + Sync {
    async fn create_criterion(&self, criterion: NewCriterion) -> StorageResult<GradingCriterion>;

    async fn get_criterion(&self, id: i64) -> StorageResult<Option<GradingCriterion>>;

    /// Update a criterion in place. `CriterionNotFound` if absent.
    async fn update_criterion(
        &self,
        id: i64,
        update: CriterionUpdate,
    ) -> StorageResult<GradingCriterion>;

    /// Criteria of a project type, ordered by `order_index`.
    async fn list_by_project_type(&self, project_type_id: i64)
        -> StorageResult<Vec<GradingCriterion>>;

    /// Sum of `max_score * weight` over the project type's criteria (0 when none).
    async fn total_max_score(&self, project_type_id: i64) -> StorageResult<i64>;

    /// Whether a criterion named `name` exists for the project type, ignoring
    /// the criterion whose id is `exclude_id`.
    async fn exists_by_name(
        &self,
        project_type_id: i64,
        name: &str,
        exclude_id: Option<i64>,
    ) -> StorageResult<bool>;
}

// ---------------------------------------------------------------------------
// DefenseStore
// ---------------------------------------------------------------------------

/// Kind of project being defended (e.g. coursework, thesis)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectType {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProjectType {
    pub name: String,
    pub description: Option<String>,
}

/// A calendar day on which defenses take place
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefenseDay {
    pub id: i64,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// A numbered time slot within a defense day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefenseSlot {
    pub id: i64,
    pub defense_day_id: i64,
    pub slot_index: i32,
    pub project_type_id: i64,
    pub title: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub location: Option<String>,
    /// Maximum number of registrations
    pub capacity: u32,
    pub created_at: DateTime<Utc>,
}

impl DefenseSlot {
    /// Whether the two slots share any instant (touching ends do not overlap).
    pub fn overlaps(&self, other: &DefenseSlot) -> bool {
        self.start_at < other.end_at && other.start_at < self.end_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDefenseSlot {
    pub defense_day_id: i64,
    pub slot_index: i32,
    pub project_type_id: i64,
    pub title: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub location: Option<String>,
    pub capacity: u32,
}

/// A slot together with how many users are registered for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotWithCount {
    #[serde(flatten)]
    pub slot: DefenseSlot,
    pub registrations_count: u32,
}

/// Optional filters for slot listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotFilter {
    pub defense_day_id: Option<i64>,
    pub project_type_id: Option<i64>,
}

impl SlotFilter {
    pub fn matches(&self, slot: &DefenseSlot) -> bool {
        self.defense_day_id
            .map(|d| slot.defense_day_id == d)
            .unwrap_or(true)
            && self
                .project_type_id
                .map(|t| slot.project_type_id == t)
                .unwrap_or(true)
    }
}

/// A user's registration for a defense slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefenseRegistration {
    pub id: i64,
    pub slot_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Defense scheduling repository.
///
/// Guarantees:
/// - Project type names and defense day dates are unique (`Conflict`).
/// - `slot_index` is unique within a defense day (`Conflict`).
/// - A user holds at most one registration per slot (`Conflict`).
#[async_trait]
pub trait DefenseStore: Send + Sync {
    async fn create_project_type(&self, project_type: NewProjectType)
        -> StorageResult<ProjectType>;

    async fn get_project_type(&self, id: i64) -> StorageResult<Option<ProjectType>>;

    /// All project types ordered by name.
    async fn list_project_types(&self) -> StorageResult<Vec<ProjectType>>;

    async fn create_day(&self, date: NaiveDate) -> StorageResult<DefenseDay>;

    async fn get_day(&self, id: i64) -> StorageResult<Option<DefenseDay>>;

    async fn get_day_by_date(&self, date: NaiveDate) -> StorageResult<Option<DefenseDay>>;

    /// All defense days ordered by date.
    async fn list_days(&self) -> StorageResult<Vec<DefenseDay>>;

    async fn create_slot(&self, slot: NewDefenseSlot) -> StorageResult<DefenseSlot>;

    async fn get_slot(&self, id: i64) -> StorageResult<Option<DefenseSlot>>;

    /// Slots matching `filter` with their registration counts, ordered by
    /// start time then slot index.
    async fn list_slots(&self, filter: SlotFilter) -> StorageResult<Vec<SlotWithCount>>;

    async fn create_registration(
        &self,
        slot_id: i64,
        user_id: i64,
    ) -> StorageResult<DefenseRegistration>;

    async fn find_registration(
        &self,
        slot_id: i64,
        user_id: i64,
    ) -> StorageResult<Option<DefenseRegistration>>;

    /// Remove a registration. `RegistrationNotFound` if absent.
    async fn delete_registration(&self, slot_id: i64, user_id: i64) -> StorageResult<()>;

    /// Registrations of a user ordered by id.
    async fn list_registrations_by_user(
        &self,
        user_id: i64,
    ) -> StorageResult<Vec<DefenseRegistration>>;

    async fn count_registrations(&self, slot_id: i64) -> StorageResult<u32>;
}
