//! Gradebook Core Library
//!
//! Domain rules and services for project evaluation and defense scheduling:
//! evaluation totals, per-participant result aggregation, grading criteria,
//! defense days, slots and registrations.
//!
//! Services are generic over the `gradebook_state` store traits, so they run
//! unchanged against SurrealDB or the in-memory fakes.

pub mod config;
pub mod criteria_service;
pub mod defense_service;
pub mod domain;
pub mod evaluation_service;
pub mod obs;
pub mod pagination;
pub mod project_service;
pub mod telemetry;

pub use config::GradebookConfig;
pub use criteria_service::CriteriaService;
pub use defense_service::{DefenseService, MyDefenseItem, ProjectTypeInfo, SlotQuery};
pub use domain::{
    aggregate_results, compute_total, EvaluationCreate, EvaluationResultItem, EvaluationResults,
    GradebookError, Result,
};
pub use evaluation_service::EvaluationService;
pub use obs::ProjectSpan;
pub use pagination::{Page, PageRequest};
pub use project_service::ProjectService;
pub use telemetry::init_tracing;

// Re-export the state layer so front ends need only one dependency
pub use gradebook_state::{
    CriterionUpdate, DbConfig, DefenseDay, DefenseRegistration, DefenseSlot, Evaluation,
    GradingCriterion, NewCriterion, NewDefenseSlot, NewProject, NewProjectType, Project,
    ProjectParticipation, ProjectType, Scores, SlotWithCount, StorageError, SurrealHandle,
};
