//! Defense scheduling: project types, days, slots and registrations.

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::try_join_all;
use gradebook_state::{
    DefenseDay, DefenseRegistration, DefenseSlot, DefenseStore, NewDefenseSlot, NewProjectType,
    ProjectType, SlotFilter, SlotWithCount,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::{GradebookError, Result};
use crate::obs;
use crate::pagination::{Page, PageRequest};

/// Filters shared by the slot listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotQuery {
    pub date: Option<NaiveDate>,
    pub project_type_id: Option<i64>,
}

/// Short project type reference embedded in registration listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectTypeInfo {
    pub id: i64,
    pub name: String,
}

impl From<ProjectType> for ProjectTypeInfo {
    fn from(project_type: ProjectType) -> Self {
        Self {
            id: project_type.id,
            name: project_type.name,
        }
    }
}

/// One of the caller's own defense registrations with its slot details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MyDefenseItem {
    pub registration_id: i64,
    pub slot_id: i64,
    pub defense_day_id: i64,
    pub slot_index: i32,
    pub title: String,
    pub project_type: ProjectTypeInfo,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub location: Option<String>,
    pub defense_date: NaiveDate,
}

/// Service layer over the defense store.
pub struct DefenseService<D> {
    store: D,
}

impl<D> DefenseService<D>
where
    D: DefenseStore,
{
    pub fn new(store: D) -> Self {
        Self { store }
    }

    // -- Project types ------------------------------------------------------

    pub async fn list_project_types(&self) -> Result<Vec<ProjectType>> {
        Ok(self.store.list_project_types().await?)
    }

    #[instrument(skip(self, project_type), fields(name = %project_type.name))]
    pub async fn create_project_type(&self, project_type: NewProjectType) -> Result<ProjectType> {
        if project_type.name.trim().is_empty() {
            return Err(GradebookError::Validation(
                "project type name must not be empty".to_string(),
            ));
        }
        if self
            .store
            .list_project_types()
            .await?
            .iter()
            .any(|t| t.name == project_type.name)
        {
            return Err(GradebookError::Conflict(format!(
                "project type '{}' already exists",
                project_type.name
            )));
        }
        Ok(self.store.create_project_type(project_type).await?)
    }

    // -- Days ---------------------------------------------------------------

    pub async fn days_paginated(&self, page: u32, limit: u32) -> Result<Page<DefenseDay>> {
        let request = PageRequest::new(page, limit)?;
        Ok(request.slice(self.store.list_days().await?))
    }

    pub async fn get_day(&self, id: i64) -> Result<DefenseDay> {
        self.store
            .get_day(id)
            .await?
            .ok_or_else(|| GradebookError::not_found("Defense day", id))
    }

    #[instrument(skip(self))]
    pub async fn create_day(&self, date: NaiveDate) -> Result<DefenseDay> {
        if self.store.get_day_by_date(date).await?.is_some() {
            return Err(GradebookError::Conflict(format!(
                "defense day {date} already exists"
            )));
        }
        Ok(self.store.create_day(date).await?)
    }

    // -- Slots --------------------------------------------------------------

    #[instrument(skip(self, slot), fields(defense_day_id = slot.defense_day_id, slot_index = slot.slot_index))]
    pub async fn create_slot(&self, slot: NewDefenseSlot) -> Result<DefenseSlot> {
        let day = self.get_day(slot.defense_day_id).await?;
        if self
            .store
            .get_project_type(slot.project_type_id)
            .await?
            .is_none()
        {
            return Err(GradebookError::not_found(
                "Project type",
                slot.project_type_id,
            ));
        }

        if slot.title.trim().is_empty() {
            return Err(GradebookError::Validation(
                "slot title must not be empty".to_string(),
            ));
        }
        if slot.end_at <= slot.start_at {
            return Err(GradebookError::Validation(
                "slot must end after it starts".to_string(),
            ));
        }
        if slot.start_at.date_naive() != day.date {
            return Err(GradebookError::Validation(format!(
                "slot starts on {} but defense day {} is {}",
                slot.start_at.date_naive(),
                day.id,
                day.date
            )));
        }
        if slot.capacity < 1 {
            return Err(GradebookError::Validation(
                "slot capacity must be at least 1".to_string(),
            ));
        }

        let taken = self
            .store
            .list_slots(SlotFilter {
                defense_day_id: Some(day.id),
                project_type_id: None,
            })
            .await?
            .iter()
            .any(|s| s.slot.slot_index == slot.slot_index);
        if taken {
            return Err(GradebookError::Conflict(format!(
                "slot {} already exists on defense day {}",
                slot.slot_index, day.id
            )));
        }

        Ok(self.store.create_slot(slot).await?)
    }

    pub async fn get_slot(&self, id: i64) -> Result<DefenseSlot> {
        self.store
            .get_slot(id)
            .await?
            .ok_or_else(|| GradebookError::not_found("Defense slot", id))
    }

    /// Resolve a query into a store filter; `None` when the date has no
    /// defense day, so nothing can match.
    async fn slot_filter(&self, query: SlotQuery) -> Result<Option<SlotFilter>> {
        let defense_day_id = match query.date {
            Some(date) => match self.store.get_day_by_date(date).await? {
                Some(day) => Some(day.id),
                None => return Ok(None),
            },
            None => None,
        };
        Ok(Some(SlotFilter {
            defense_day_id,
            project_type_id: query.project_type_id,
        }))
    }

    async fn matching_slots(&self, query: SlotQuery) -> Result<Vec<SlotWithCount>> {
        match self.slot_filter(query).await? {
            Some(filter) => Ok(self.store.list_slots(filter).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Slots that still have room, ordered by start time.
    pub async fn available_slots_paginated(
        &self,
        page: u32,
        limit: u32,
        query: SlotQuery,
    ) -> Result<Page<DefenseSlot>> {
        let request = PageRequest::new(page, limit)?;
        let available: Vec<DefenseSlot> = self
            .matching_slots(query)
            .await?
            .into_iter()
            .filter(|s| s.registrations_count < s.slot.capacity)
            .map(|s| s.slot)
            .collect();
        Ok(request.slice(available))
    }

    /// Slots with at least one registration, with their counts.
    pub async fn scheduled_defenses_paginated(
        &self,
        page: u32,
        limit: u32,
        query: SlotQuery,
    ) -> Result<Page<SlotWithCount>> {
        let request = PageRequest::new(page, limit)?;
        let scheduled: Vec<SlotWithCount> = self
            .matching_slots(query)
            .await?
            .into_iter()
            .filter(|s| s.registrations_count > 0)
            .collect();
        Ok(request.slice(scheduled))
    }

    // -- Registrations ------------------------------------------------------

    /// Register `user_id` for a slot.
    ///
    /// Rejected when the user already holds this slot, the slot is full, or
    /// another of the user's slots overlaps it in time.
    ///
    /// No database constraint covers capacity. The count is checked again
    /// after the insert and the new registration is withdrawn when a
    /// concurrent registration took the last seat, so a slot is never left
    /// over capacity (both racers may be rejected).
    #[instrument(skip(self))]
    pub async fn register(&self, user_id: i64, slot_id: i64) -> Result<DefenseRegistration> {
        let slot = self.get_slot(slot_id).await?;

        if self.store.find_registration(slot_id, user_id).await?.is_some() {
            return Err(GradebookError::Conflict(format!(
                "user {user_id} is already registered for slot {slot_id}"
            )));
        }

        let count = self.store.count_registrations(slot_id).await?;
        if count >= slot.capacity {
            return Err(GradebookError::Conflict(format!(
                "slot {slot_id} is full ({count}/{})",
                slot.capacity
            )));
        }

        for registration in self.store.list_registrations_by_user(user_id).await? {
            let Some(other) = self.store.get_slot(registration.slot_id).await? else {
                continue;
            };
            if other.overlaps(&slot) {
                return Err(GradebookError::Conflict(format!(
                    "slot {slot_id} overlaps slot {} the user is already registered for",
                    other.id
                )));
            }
        }

        let registration = self.store.create_registration(slot_id, user_id).await?;

        let count = self.store.count_registrations(slot_id).await?;
        if count > slot.capacity {
            self.store.delete_registration(slot_id, user_id).await?;
            return Err(GradebookError::Conflict(format!(
                "slot {slot_id} is full ({}/{})",
                slot.capacity, slot.capacity
            )));
        }

        obs::emit_defense_registered(slot_id, user_id, count);
        Ok(registration)
    }

    #[instrument(skip(self))]
    pub async fn unregister(&self, user_id: i64, slot_id: i64) -> Result<()> {
        if self.store.find_registration(slot_id, user_id).await?.is_none() {
            return Err(GradebookError::not_found(
                "Registration",
                format!("slot {slot_id}, user {user_id}"),
            ));
        }
        self.store.delete_registration(slot_id, user_id).await?;
        obs::emit_defense_unregistered(slot_id, user_id);
        Ok(())
    }

    async fn describe_registration(
        &self,
        registration: &DefenseRegistration,
    ) -> Result<MyDefenseItem> {
        let slot = self.get_slot(registration.slot_id).await?;
        let day = self.get_day(slot.defense_day_id).await?;
        let project_type = self
            .store
            .get_project_type(slot.project_type_id)
            .await?
            .ok_or_else(|| GradebookError::not_found("Project type", slot.project_type_id))?;

        Ok(MyDefenseItem {
            registration_id: registration.id,
            slot_id: slot.id,
            defense_day_id: slot.defense_day_id,
            slot_index: slot.slot_index,
            title: slot.title,
            project_type: project_type.into(),
            start_at: slot.start_at,
            end_at: slot.end_at,
            location: slot.location,
            defense_date: day.date,
        })
    }

    /// The user's registrations ordered by slot start time.
    #[instrument(skip(self))]
    pub async fn my_registrations(&self, user_id: i64) -> Result<Vec<MyDefenseItem>> {
        let registrations = self.store.list_registrations_by_user(user_id).await?;
        let mut items = try_join_all(
            registrations
                .iter()
                .map(|registration| self.describe_registration(registration)),
        )
        .await?;
        items.sort_by_key(|item| (item.start_at, item.slot_id));

        debug!(count = items.len(), "listed user registrations");
        Ok(items)
    }
}
