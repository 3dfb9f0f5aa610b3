//! SurrealDB schema initialization
//!
//! Defines every Gradebook table with its indexes. Uniqueness rules that the
//! storage traits promise are backed by UNIQUE indexes here, so concurrent
//! writers cannot slip a duplicate past the application-level checks.

use crate::error::StateError;
use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all Gradebook tables in SurrealDB
///
/// Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing Gradebook SurrealDB schema");

    init_counters_table(db).await?;
    init_projects_tables(db).await?;
    init_evaluations_table(db).await?;
    init_criteria_table(db).await?;
    init_defense_tables(db).await?;

    info!("Gradebook schema initialization complete");
    Ok(())
}

async fn run(db: &Surreal<Any>, table: &str, sql: &str) -> Result<()> {
    debug!("Initializing {} table", table);
    db.query(sql)
        .await
        .and_then(|response| response.check())
        .map_err(|e| StateError::SchemaSetup(format!("{table}: {e}")))?;
    info!("✓ {} table initialized", table);
    Ok(())
}

/// `counters` holds one record per table (`counters:evaluations`, ...) whose
/// `value` is the last id handed out.
async fn init_counters_table(db: &Surreal<Any>) -> Result<()> {
    let sql = r#"
        DEFINE TABLE IF NOT EXISTS counters SCHEMALESS;
    "#;
    run(db, "counters", sql).await
}

/// Schema:
/// ```text
/// TABLE projects {
///   project_id:      INT (unique)
///   name:            STRING
///   description:     STRING?
///   author_id:       INT
///   project_type_id: INT?
///   created_at:      DATETIME
///   updated_at:      DATETIME
/// }
/// TABLE project_participants {
///   project_id, participant_id: INT (unique together)
///   joined_at: DATETIME
/// }
/// ```
async fn init_projects_tables(db: &Surreal<Any>) -> Result<()> {
    let sql = r#"
        DEFINE TABLE IF NOT EXISTS projects SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_project_id ON TABLE projects COLUMNS project_id UNIQUE;

        DEFINE TABLE IF NOT EXISTS project_participants SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_participation ON TABLE project_participants
            COLUMNS project_id, participant_id UNIQUE;
    "#;
    run(db, "projects", sql).await
}

/// Schema:
/// ```text
/// TABLE evaluations {
///   evaluation_id:  INT (unique)
///   project_id:     INT (indexed)
///   participant_id: INT
///   evaluator_id:   INT
///   scores:         OBJECT (criterion key -> INT)
///   comment:        STRING?
///   total_score:    INT
///   created_at:     DATETIME
///   updated_at:     DATETIME
/// }
/// ```
///
/// No uniqueness on (project, participant, evaluator): repeated evaluations
/// accumulate.
async fn init_evaluations_table(db: &Surreal<Any>) -> Result<()> {
    let sql = r#"
        DEFINE TABLE IF NOT EXISTS evaluations SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR read FULL
                FOR update NONE
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_evaluation_id ON TABLE evaluations COLUMNS evaluation_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_evaluation_project ON TABLE evaluations COLUMNS project_id;
        DEFINE INDEX IF NOT EXISTS idx_evaluation_project_participant ON TABLE evaluations
            COLUMNS project_id, participant_id;
    "#;
    run(db, "evaluations", sql).await
}

/// Schema:
/// ```text
/// TABLE grading_criteria {
///   criterion_id:    INT (unique)
///   project_type_id: INT
///   name:            STRING (unique per project type)
///   description:     STRING?
///   max_score:       INT
///   weight:          INT
///   order_index:     INT
///   created_at:      DATETIME
/// }
/// ```
async fn init_criteria_table(db: &Surreal<Any>) -> Result<()> {
    let sql = r#"
        DEFINE TABLE IF NOT EXISTS grading_criteria SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_criterion_id ON TABLE grading_criteria COLUMNS criterion_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_criterion_type_name ON TABLE grading_criteria
            COLUMNS project_type_id, name UNIQUE;
    "#;
    run(db, "grading_criteria", sql).await
}

/// Schema:
/// ```text
/// TABLE project_types         { project_type_id (unique), name (unique), description?, created_at }
/// TABLE defense_days          { day_id (unique), date (unique, YYYY-MM-DD), created_at }
/// TABLE defense_slots         { slot_id (unique), defense_day_id, slot_index, project_type_id,
///                               title, start_at, end_at, location?, capacity, created_at }
/// TABLE defense_registrations { registration_id (unique), slot_id, user_id, created_at }
/// ```
///
/// Constraints:
/// - `(defense_day_id, slot_index)` is unique
/// - `(slot_id, user_id)` is unique: a user cannot register twice for one slot
///
/// Slot capacity has no index; `DefenseService::register` enforces it.
async fn init_defense_tables(db: &Surreal<Any>) -> Result<()> {
    let sql = r#"
        DEFINE TABLE IF NOT EXISTS project_types SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_project_type_id ON TABLE project_types COLUMNS project_type_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_project_type_name ON TABLE project_types COLUMNS name UNIQUE;

        DEFINE TABLE IF NOT EXISTS defense_days SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_day_id ON TABLE defense_days COLUMNS day_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_day_date ON TABLE defense_days COLUMNS date UNIQUE;

        DEFINE TABLE IF NOT EXISTS defense_slots SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_slot_id ON TABLE defense_slots COLUMNS slot_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_slot_day_index ON TABLE defense_slots
            COLUMNS defense_day_id, slot_index UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_slot_project_type ON TABLE defense_slots COLUMNS project_type_id;

        DEFINE TABLE IF NOT EXISTS defense_registrations SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_registration_id ON TABLE defense_registrations
            COLUMNS registration_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_registration_slot_user ON TABLE defense_registrations
            COLUMNS slot_id, user_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_registration_user ON TABLE defense_registrations COLUMNS user_id;
    "#;
    run(db, "defense", sql).await
}
