//! Gradebook-State: SurrealDB Backend for Gradebook
//!
//! This crate provides the persistence layer for project evaluation and
//! defense scheduling. It handles all I/O with SurrealDB behind a set of
//! async repository traits, so services can run against the database or
//! against in-memory fakes.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: Data integrity, uniqueness constraints and id allocation.
//!
//! ## Key Components
//!
//! - `SurrealHandle`: Manages the connection and implements every store trait
//! - `ProjectStore` / `EvaluationStore` / `CriteriaStore` / `DefenseStore`:
//!   the repository seams
//! - `fakes`: in-memory implementations for tests

mod error;
pub mod fakes;
mod handle;
mod migrations;
mod schema;
pub mod storage_traits;
mod surreal_store;

pub use error::{StateError, StorageError};
pub use handle::{DbConfig, SurrealHandle, DEFAULT_DATABASE, DEFAULT_LOCAL_PATH, DEFAULT_NAMESPACE};
pub use storage_traits::{
    CriteriaStore, CriterionUpdate, DefenseDay, DefenseRegistration, DefenseSlot, DefenseStore,
    Evaluation, EvaluationStore, GradingCriterion, NewCriterion, NewDefenseSlot, NewEvaluation,
    NewProject, NewProjectType, Project, ProjectParticipation, ProjectStore, ProjectType, Scores,
    SlotFilter, SlotWithCount, StorageResult,
};

/// Result type for gradebook-state operations
pub type Result<T> = std::result::Result<T, StateError>;
