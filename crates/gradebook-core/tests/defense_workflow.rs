//! Defense scheduling workflow: days, slots, availability, registrations
//! and the caller's own schedule.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use gradebook_core::{DefenseService, GradebookError, NewDefenseSlot, SlotQuery};
use gradebook_state::fakes::MemoryDefenseStore;
use gradebook_state::storage_traits::*;
use gradebook_state::SurrealHandle;

fn june(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, day).unwrap()
}

fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, day, hour, minute, 0).unwrap()
}

struct Fixture<D> {
    service: DefenseService<D>,
    thesis: i64,
    coursework: i64,
    day1: i64,
    day2: i64,
}

async fn fixture<D: DefenseStore>(store: D) -> Fixture<D> {
    let service = DefenseService::new(store);
    let thesis = service
        .create_project_type(NewProjectType {
            name: "thesis".to_string(),
            description: None,
        })
        .await
        .unwrap()
        .id;
    let coursework = service
        .create_project_type(NewProjectType {
            name: "coursework".to_string(),
            description: None,
        })
        .await
        .unwrap()
        .id;
    let day1 = service.create_day(june(1)).await.unwrap().id;
    let day2 = service.create_day(june(2)).await.unwrap().id;
    Fixture {
        service,
        thesis,
        coursework,
        day1,
        day2,
    }
}

fn slot(
    day_id: i64,
    day: u32,
    index: i32,
    project_type_id: i64,
    start: (u32, u32),
    end: (u32, u32),
    capacity: u32,
) -> NewDefenseSlot {
    NewDefenseSlot {
        defense_day_id: day_id,
        slot_index: index,
        project_type_id,
        title: format!("Defense #{index}"),
        start_at: at(day, start.0, start.1),
        end_at: at(day, end.0, end.1),
        location: Some("Aula 3".to_string()),
        capacity,
    }
}

#[tokio::test]
async fn duplicate_type_and_day_conflict() {
    let f = fixture(MemoryDefenseStore::new()).await;

    let err = f
        .service
        .create_project_type(NewProjectType {
            name: "thesis".to_string(),
            description: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, GradebookError::Conflict(_)));

    let err = f.service.create_day(june(1)).await.unwrap_err();
    assert!(matches!(err, GradebookError::Conflict(_)));

    let names: Vec<String> = f
        .service
        .list_project_types()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["coursework", "thesis"]);
}

#[tokio::test]
async fn days_are_paginated_by_date() {
    let f = fixture(MemoryDefenseStore::new()).await;
    f.service.create_day(june(5)).await.unwrap();

    let page = f.service.days_paginated(1, 2).await.unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.total_pages, 2);
    let dates: Vec<NaiveDate> = page.items.iter().map(|d| d.date).collect();
    assert_eq!(dates, vec![june(1), june(2)]);

    let page = f.service.days_paginated(2, 2).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].date, june(5));

    assert!(matches!(
        f.service.days_paginated(0, 10).await.unwrap_err(),
        GradebookError::Validation(_)
    ));
    assert!(matches!(
        f.service.days_paginated(1, 101).await.unwrap_err(),
        GradebookError::Validation(_)
    ));

    assert!(f.service.get_day(9999).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn slot_creation_rules() {
    let f = fixture(MemoryDefenseStore::new()).await;

    f.service
        .create_slot(slot(f.day1, 1, 1, f.thesis, (9, 0), (9, 30), 1))
        .await
        .unwrap();

    // Same index on the same day
    let err = f
        .service
        .create_slot(slot(f.day1, 1, 1, f.thesis, (10, 0), (10, 30), 1))
        .await
        .unwrap_err();
    assert!(matches!(err, GradebookError::Conflict(_)));

    // Same index on another day is fine
    assert!(f
        .service
        .create_slot(slot(f.day2, 2, 1, f.thesis, (9, 0), (9, 30), 1))
        .await
        .is_ok());

    // Unknown day / project type
    let err = f
        .service
        .create_slot(slot(9999, 1, 2, f.thesis, (9, 0), (9, 30), 1))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    let err = f
        .service
        .create_slot(slot(f.day1, 1, 2, 9999, (9, 0), (9, 30), 1))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    // End before start, wrong date, zero capacity
    for bad in [
        slot(f.day1, 1, 3, f.thesis, (10, 0), (9, 0), 1),
        slot(f.day1, 2, 3, f.thesis, (9, 0), (10, 0), 1),
        slot(f.day1, 1, 3, f.thesis, (9, 0), (10, 0), 0),
    ] {
        let err = f.service.create_slot(bad).await.unwrap_err();
        assert!(matches!(err, GradebookError::Validation(_)), "{err}");
    }
}

#[tokio::test]
async fn available_and_scheduled_listings() {
    let f = fixture(MemoryDefenseStore::new()).await;
    let s1 = f
        .service
        .create_slot(slot(f.day1, 1, 1, f.thesis, (9, 0), (9, 30), 1))
        .await
        .unwrap();
    let s2 = f
        .service
        .create_slot(slot(f.day1, 1, 2, f.thesis, (10, 0), (10, 30), 2))
        .await
        .unwrap();
    let s3 = f
        .service
        .create_slot(slot(f.day2, 2, 1, f.coursework, (9, 0), (9, 30), 1))
        .await
        .unwrap();

    f.service.register(100, s1.id).await.unwrap();
    f.service.register(101, s2.id).await.unwrap();

    let all = SlotQuery::default();
    let available = f.service.available_slots_paginated(1, 10, all).await.unwrap();
    let ids: Vec<i64> = available.items.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![s2.id, s3.id]);

    let scheduled = f.service.scheduled_defenses_paginated(1, 10, all).await.unwrap();
    assert_eq!(scheduled.total, 2);
    assert_eq!(scheduled.items[0].slot.id, s1.id);
    assert_eq!(scheduled.items[0].registrations_count, 1);
    assert_eq!(scheduled.items[1].registrations_count, 1);

    let by_date = SlotQuery {
        date: Some(june(2)),
        project_type_id: None,
    };
    let available = f.service.available_slots_paginated(1, 10, by_date).await.unwrap();
    assert_eq!(available.items.len(), 1);
    assert_eq!(available.items[0].id, s3.id);

    let by_type = SlotQuery {
        date: None,
        project_type_id: Some(f.thesis),
    };
    let available = f.service.available_slots_paginated(1, 10, by_type).await.unwrap();
    assert_eq!(available.total, 1);

    let no_day = SlotQuery {
        date: Some(june(20)),
        project_type_id: None,
    };
    let page = f.service.available_slots_paginated(1, 10, no_day).await.unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total_pages, 0);
}

#[tokio::test]
async fn registration_rules() {
    let f = fixture(MemoryDefenseStore::new()).await;
    let solo = f
        .service
        .create_slot(slot(f.day1, 1, 1, f.thesis, (9, 0), (10, 0), 1))
        .await
        .unwrap();
    let overlapping = f
        .service
        .create_slot(slot(f.day1, 1, 2, f.thesis, (9, 30), (10, 30), 3))
        .await
        .unwrap();
    let adjacent = f
        .service
        .create_slot(slot(f.day1, 1, 3, f.thesis, (10, 0), (11, 0), 3))
        .await
        .unwrap();

    f.service.register(100, solo.id).await.unwrap();

    // Twice in the same slot
    let err = f.service.register(100, solo.id).await.unwrap_err();
    assert!(matches!(err, GradebookError::Conflict(ref msg) if msg.contains("already registered")));

    // Full
    let err = f.service.register(101, solo.id).await.unwrap_err();
    assert!(matches!(err, GradebookError::Conflict(ref msg) if msg.contains("full")));

    // Overlaps the user's existing slot
    let err = f.service.register(100, overlapping.id).await.unwrap_err();
    assert!(matches!(err, GradebookError::Conflict(ref msg) if msg.contains("overlaps")));

    // Touching end/start does not overlap
    f.service.register(100, adjacent.id).await.unwrap();

    // Unknown slot
    assert!(f.service.register(100, 9999).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn unregister_frees_the_slot() {
    let f = fixture(MemoryDefenseStore::new()).await;
    let s = f
        .service
        .create_slot(slot(f.day1, 1, 1, f.thesis, (9, 0), (10, 0), 1))
        .await
        .unwrap();

    f.service.register(100, s.id).await.unwrap();
    f.service.unregister(100, s.id).await.unwrap();

    let err = f.service.unregister(100, s.id).await.unwrap_err();
    assert!(err.is_not_found());

    f.service.register(101, s.id).await.unwrap();
}

/// Defense store whose next capacity count misses registrations made by
/// another writer in the meantime.
#[derive(Clone, Default)]
struct StaleCountStore {
    inner: MemoryDefenseStore,
    stale_once: Arc<AtomicBool>,
}

#[async_trait]
impl DefenseStore for StaleCountStore {
    async fn create_project_type(&self, project_type: NewProjectType) -> StorageResult<ProjectType> {
        self.inner.create_project_type(project_type).await
    }

    async fn get_project_type(&self, id: i64) -> StorageResult<Option<ProjectType>> {
        self.inner.get_project_type(id).await
    }

    async fn list_project_types(&self) -> StorageResult<Vec<ProjectType>> {
        self.inner.list_project_types().await
    }

    async fn create_day(&self, date: NaiveDate) -> StorageResult<DefenseDay> {
        self.inner.create_day(date).await
    }

    async fn get_day(&self, id: i64) -> StorageResult<Option<DefenseDay>> {
        self.inner.get_day(id).await
    }

    async fn get_day_by_date(&self, date: NaiveDate) -> StorageResult<Option<DefenseDay>> {
        self.inner.get_day_by_date(date).await
    }

    async fn list_days(&self) -> StorageResult<Vec<DefenseDay>> {
        self.inner.list_days().await
    }

    async fn create_slot(&self, slot: NewDefenseSlot) -> StorageResult<DefenseSlot> {
        self.inner.create_slot(slot).await
    }

    async fn get_slot(&self, id: i64) -> StorageResult<Option<DefenseSlot>> {
        self.inner.get_slot(id).await
    }

    async fn list_slots(&self, filter: SlotFilter) -> StorageResult<Vec<SlotWithCount>> {
        self.inner.list_slots(filter).await
    }

    async fn create_registration(
        &self,
        slot_id: i64,
        user_id: i64,
    ) -> StorageResult<DefenseRegistration> {
        self.inner.create_registration(slot_id, user_id).await
    }

    async fn find_registration(
        &self,
        slot_id: i64,
        user_id: i64,
    ) -> StorageResult<Option<DefenseRegistration>> {
        self.inner.find_registration(slot_id, user_id).await
    }

    async fn delete_registration(&self, slot_id: i64, user_id: i64) -> StorageResult<()> {
        self.inner.delete_registration(slot_id, user_id).await
    }

    async fn list_registrations_by_user(
        &self,
        user_id: i64,
    ) -> StorageResult<Vec<DefenseRegistration>> {
        self.inner.list_registrations_by_user(user_id).await
    }

    async fn count_registrations(&self, slot_id: i64) -> StorageResult<u32> {
        if self.stale_once.swap(false, Ordering::SeqCst) {
            return Ok(0);
        }
        self.inner.count_registrations(slot_id).await
    }
}

#[tokio::test]
async fn racing_registration_for_last_seat_is_withdrawn() {
    let store = StaleCountStore::default();
    let f = fixture(store.clone()).await;
    let s = f
        .service
        .create_slot(slot(f.day1, 1, 1, f.thesis, (9, 0), (10, 0), 1))
        .await
        .unwrap();

    // Another writer takes the only seat after the capacity check has read 0
    store.inner.create_registration(s.id, 101).await.unwrap();
    store.stale_once.store(true, Ordering::SeqCst);

    let err = f.service.register(100, s.id).await.unwrap_err();
    assert!(matches!(err, GradebookError::Conflict(ref msg) if msg.contains("full")));

    assert_eq!(store.inner.count_registrations(s.id).await.unwrap(), 1);
    assert!(store.inner.find_registration(s.id, 100).await.unwrap().is_none());
    assert!(store.inner.find_registration(s.id, 101).await.unwrap().is_some());
}

#[tokio::test]
async fn my_registrations_are_ordered_by_start() {
    let f = fixture(MemoryDefenseStore::new()).await;
    let late = f
        .service
        .create_slot(slot(f.day2, 2, 1, f.coursework, (14, 0), (15, 0), 2))
        .await
        .unwrap();
    let early = f
        .service
        .create_slot(slot(f.day1, 1, 1, f.thesis, (9, 0), (10, 0), 2))
        .await
        .unwrap();

    f.service.register(100, late.id).await.unwrap();
    f.service.register(100, early.id).await.unwrap();
    f.service.register(200, early.id).await.unwrap();

    let mine = f.service.my_registrations(100).await.unwrap();
    assert_eq!(mine.len(), 2);
    assert_eq!(mine[0].slot_id, early.id);
    assert_eq!(mine[0].defense_date, june(1));
    assert_eq!(mine[0].project_type.name, "thesis");
    assert_eq!(mine[1].slot_id, late.id);
    assert_eq!(mine[1].project_type.name, "coursework");

    assert!(f.service.my_registrations(300).await.unwrap().is_empty());
}

#[tokio::test]
async fn surreal_backend_registration_flow() {
    let handle = SurrealHandle::in_memory().await.expect("in_memory() failed");
    let f = fixture(handle).await;
    let s = f
        .service
        .create_slot(slot(f.day1, 1, 1, f.thesis, (9, 0), (10, 0), 1))
        .await
        .unwrap();

    f.service.register(100, s.id).await.unwrap();
    assert!(f.service.register(101, s.id).await.unwrap_err().is_conflict());

    let scheduled = f
        .service
        .scheduled_defenses_paginated(1, 10, SlotQuery::default())
        .await
        .unwrap();
    assert_eq!(scheduled.items.len(), 1);
    assert_eq!(scheduled.items[0].registrations_count, 1);

    let mine = f.service.my_registrations(100).await.unwrap();
    assert_eq!(mine[0].defense_date, june(1));

    f.service.unregister(100, s.id).await.unwrap();
    let available = f
        .service
        .available_slots_paginated(1, 10, SlotQuery::default())
        .await
        .unwrap();
    assert_eq!(available.items.len(), 1);
}
