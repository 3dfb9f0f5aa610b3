//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryProjectStore`, `MemoryEvaluationStore`, `MemoryCriteriaStore`
//! and `MemoryDefenseStore` that satisfy the trait contracts without any
//! external dependencies. Each fake is cheaply cloneable and clones share
//! state, so a test can keep a handle while a service owns another.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use crate::error::StorageError;
use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemoryProjectStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ProjectState {
    next_id: i64,
    projects: BTreeMap<i64, Project>,
    participants: Vec<ProjectParticipation>,
}

/// In-memory project store backed by a `BTreeMap<id, Project>`.
#[derive(Debug, Clone, Default)]
pub struct MemoryProjectStore {
    state: Arc<Mutex<ProjectState>>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn create_project(&self, project: NewProject) -> StorageResult<Project> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let now = Utc::now();
        let record = Project {
            id: state.next_id,
            name: project.name,
            description: project.description,
            author_id: project.author_id,
            project_type_id: project.project_type_id,
            created_at: now,
            updated_at: now,
        };
        state.projects.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_project(&self, id: i64) -> StorageResult<Option<Project>> {
        let state = self.state.lock().unwrap();
        Ok(state.projects.get(&id).cloned())
    }

    async fn add_participant(
        &self,
        project_id: i64,
        participant_id: i64,
    ) -> StorageResult<ProjectParticipation> {
        let mut state = self.state.lock().unwrap();
        if !state.projects.contains_key(&project_id) {
            return Err(StorageError::ProjectNotFound { id: project_id });
        }
        if state
            .participants
            .iter()
            .any(|p| p.project_id == project_id && p.participant_id == participant_id)
        {
            return Err(StorageError::Conflict(format!(
                "participant {participant_id} already in project {project_id}"
            )));
        }
        let participation = ProjectParticipation {
            project_id,
            participant_id,
            joined_at: Utc::now(),
        };
        state.participants.push(participation.clone());
        Ok(participation)
    }

    async fn list_participants(&self, project_id: i64) -> StorageResult<Vec<ProjectParticipation>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .participants
            .iter()
            .filter(|p| p.project_id == project_id)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MemoryEvaluationStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct EvaluationState {
    next_id: i64,
    evaluations: BTreeMap<i64, Evaluation>,
}

/// In-memory evaluation store backed by a `BTreeMap<id, Evaluation>`.
#[derive(Debug, Clone, Default)]
pub struct MemoryEvaluationStore {
    state: Arc<Mutex<EvaluationState>>,
}

impl MemoryEvaluationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored evaluations across all projects.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().evaluations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EvaluationStore for MemoryEvaluationStore {
    async fn create_evaluation(&self, evaluation: NewEvaluation) -> StorageResult<Evaluation> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let now = Utc::now();
        let record = Evaluation {
            id: state.next_id,
            project_id: evaluation.project_id,
            participant_id: evaluation.participant_id,
            evaluator_id: evaluation.evaluator_id,
            scores: evaluation.scores,
            comment: evaluation.comment,
            total_score: evaluation.total_score,
            created_at: now,
            updated_at: now,
        };
        state.evaluations.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_evaluation(&self, id: i64) -> StorageResult<Option<Evaluation>> {
        let state = self.state.lock().unwrap();
        Ok(state.evaluations.get(&id).cloned())
    }

    async fn list_by_project(&self, project_id: i64) -> StorageResult<Vec<Evaluation>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .evaluations
            .values()
            .filter(|e| e.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn list_by_project_and_participant(
        &self,
        project_id: i64,
        participant_id: i64,
    ) -> StorageResult<Vec<Evaluation>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .evaluations
            .values()
            .filter(|e| e.project_id == project_id && e.participant_id == participant_id)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MemoryCriteriaStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct CriteriaState {
    next_id: i64,
    criteria: BTreeMap<i64, GradingCriterion>,
}

/// In-memory grading criteria store.
#[derive(Debug, Clone, Default)]
pub struct MemoryCriteriaStore {
    state: Arc<Mutex<CriteriaState>>,
}

impl MemoryCriteriaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CriteriaStore for MemoryCriteriaStore {
    async fn create_criterion(&self, criterion: NewCriterion) -> StorageResult<GradingCriterion> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let record = GradingCriterion {
            id: state.next_id,
            project_type_id: criterion.project_type_id,
            name: criterion.name,
            description: criterion.description,
            max_score: criterion.max_score,
            weight: criterion.weight,
            order_index: criterion.order_index,
            created_at: Utc::now(),
        };
        state.criteria.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_criterion(&self, id: i64) -> StorageResult<Option<GradingCriterion>> {
        let state = self.state.lock().unwrap();
        Ok(state.criteria.get(&id).cloned())
    }

    async fn update_criterion(
        &self,
        id: i64,
        update: CriterionUpdate,
    ) -> StorageResult<GradingCriterion> {
        let mut state = self.state.lock().unwrap();
        let criterion = state
            .criteria
            .get_mut(&id)
            .ok_or(StorageError::CriterionNotFound { id })?;
        update.apply(criterion);
        Ok(criterion.clone())
    }

    async fn list_by_project_type(
        &self,
        project_type_id: i64,
    ) -> StorageResult<Vec<GradingCriterion>> {
        let state = self.state.lock().unwrap();
        let mut criteria: Vec<GradingCriterion> = state
            .criteria
            .values()
            .filter(|c| c.project_type_id == project_type_id)
            .cloned()
            .collect();
        criteria.sort_by_key(|c| (c.order_index, c.id));
        Ok(criteria)
    }

    async fn total_max_score(&self, project_type_id: i64) -> StorageResult<i64> {
        let state = self.state.lock().unwrap();
        Ok(state
            .criteria
            .values()
            .filter(|c| c.project_type_id == project_type_id)
            .map(|c| c.max_score * c.weight)
            .sum())
    }

    async fn exists_by_name(
        &self,
        project_type_id: i64,
        name: &str,
        exclude_id: Option<i64>,
    ) -> StorageResult<bool> {
        let state = self.state.lock().unwrap();
        Ok(state.criteria.values().any(|c| {
            c.project_type_id == project_type_id && c.name == name && Some(c.id) != exclude_id
        }))
    }
}

// ---------------------------------------------------------------------------
// MemoryDefenseStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct DefenseState {
    next_id: i64,
    project_types: BTreeMap<i64, ProjectType>,
    days: BTreeMap<i64, DefenseDay>,
    slots: BTreeMap<i64, DefenseSlot>,
    registrations: BTreeMap<i64, DefenseRegistration>,
}

impl DefenseState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn count_for(&self, slot_id: i64) -> u32 {
        self.registrations
            .values()
            .filter(|r| r.slot_id == slot_id)
            .count() as u32
    }
}

/// In-memory defense scheduling store.
#[derive(Debug, Clone, Default)]
pub struct MemoryDefenseStore {
    state: Arc<Mutex<DefenseState>>,
}

impl MemoryDefenseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DefenseStore for MemoryDefenseStore {
    async fn create_project_type(
        &self,
        project_type: NewProjectType,
    ) -> StorageResult<ProjectType> {
        let mut state = self.state.lock().unwrap();
        if state
            .project_types
            .values()
            .any(|t| t.name == project_type.name)
        {
            return Err(StorageError::Conflict(format!(
                "project type '{}' already exists",
                project_type.name
            )));
        }
        let record = ProjectType {
            id: state.allocate_id(),
            name: project_type.name,
            description: project_type.description,
            created_at: Utc::now(),
        };
        state.project_types.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_project_type(&self, id: i64) -> StorageResult<Option<ProjectType>> {
        let state = self.state.lock().unwrap();
        Ok(state.project_types.get(&id).cloned())
    }

    async fn list_project_types(&self) -> StorageResult<Vec<ProjectType>> {
        let state = self.state.lock().unwrap();
        let mut types: Vec<ProjectType> = state.project_types.values().cloned().collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(types)
    }

    async fn create_day(&self, date: NaiveDate) -> StorageResult<DefenseDay> {
        let mut state = self.state.lock().unwrap();
        if state.days.values().any(|d| d.date == date) {
            return Err(StorageError::Conflict(format!(
                "defense day {date} already exists"
            )));
        }
        let record = DefenseDay {
            id: state.allocate_id(),
            date,
            created_at: Utc::now(),
        };
        state.days.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_day(&self, id: i64) -> StorageResult<Option<DefenseDay>> {
        let state = self.state.lock().unwrap();
        Ok(state.days.get(&id).cloned())
    }

    async fn get_day_by_date(&self, date: NaiveDate) -> StorageResult<Option<DefenseDay>> {
        let state = self.state.lock().unwrap();
        Ok(state.days.values().find(|d| d.date == date).cloned())
    }

    async fn list_days(&self) -> StorageResult<Vec<DefenseDay>> {
        let state = self.state.lock().unwrap();
        let mut days: Vec<DefenseDay> = state.days.values().cloned().collect();
        days.sort_by_key(|d| d.date);
        Ok(days)
    }

    async fn create_slot(&self, slot: NewDefenseSlot) -> StorageResult<DefenseSlot> {
        let mut state = self.state.lock().unwrap();
        if state
            .slots
            .values()
            .any(|s| s.defense_day_id == slot.defense_day_id && s.slot_index == slot.slot_index)
        {
            return Err(StorageError::Conflict(format!(
                "slot {} already exists on defense day {}",
                slot.slot_index, slot.defense_day_id
            )));
        }
        let record = DefenseSlot {
            id: state.allocate_id(),
            defense_day_id: slot.defense_day_id,
            slot_index: slot.slot_index,
            project_type_id: slot.project_type_id,
            title: slot.title,
            start_at: slot.start_at,
            end_at: slot.end_at,
            location: slot.location,
            capacity: slot.capacity,
            created_at: Utc::now(),
        };
        state.slots.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_slot(&self, id: i64) -> StorageResult<Option<DefenseSlot>> {
        let state = self.state.lock().unwrap();
        Ok(state.slots.get(&id).cloned())
    }

    async fn list_slots(&self, filter: SlotFilter) -> StorageResult<Vec<SlotWithCount>> {
        let state = self.state.lock().unwrap();
        let mut slots: Vec<SlotWithCount> = state
            .slots
            .values()
            .filter(|s| filter.matches(s))
            .map(|s| SlotWithCount {
                slot: s.clone(),
                registrations_count: state.count_for(s.id),
            })
            .collect();
        slots.sort_by_key(|s| (s.slot.start_at, s.slot.slot_index));
        Ok(slots)
    }

    async fn create_registration(
        &self,
        slot_id: i64,
        user_id: i64,
    ) -> StorageResult<DefenseRegistration> {
        let mut state = self.state.lock().unwrap();
        if state
            .registrations
            .values()
            .any(|r| r.slot_id == slot_id && r.user_id == user_id)
        {
            return Err(StorageError::Conflict(format!(
                "user {user_id} already registered for slot {slot_id}"
            )));
        }
        let record = DefenseRegistration {
            id: state.allocate_id(),
            slot_id,
            user_id,
            created_at: Utc::now(),
        };
        state.registrations.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_registration(
        &self,
        slot_id: i64,
        user_id: i64,
    ) -> StorageResult<Option<DefenseRegistration>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .registrations
            .values()
            .find(|r| r.slot_id == slot_id && r.user_id == user_id)
            .cloned())
    }

    async fn delete_registration(&self, slot_id: i64, user_id: i64) -> StorageResult<()> {
        let mut state = self.state.lock().unwrap();
        let id = state
            .registrations
            .values()
            .find(|r| r.slot_id == slot_id && r.user_id == user_id)
            .map(|r| r.id)
            .ok_or(StorageError::RegistrationNotFound { slot_id, user_id })?;
        state.registrations.remove(&id);
        Ok(())
    }

    async fn list_registrations_by_user(
        &self,
        user_id: i64,
    ) -> StorageResult<Vec<DefenseRegistration>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .registrations
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn count_registrations(&self, slot_id: i64) -> StorageResult<u32> {
        let state = self.state.lock().unwrap();
        Ok(state.count_for(slot_id))
    }
}
