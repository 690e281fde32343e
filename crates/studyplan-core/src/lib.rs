//! # Studyplan Core Library
//!
//! This library provides the core logic of Studyplan, a study scheduling
//! assistant. Given the courses a student follows, peer ratings of those
//! courses and a set of study-time constraints, it builds a calendar of study
//! and pause blocks over a date range. The CLI binary is a thin layer over the
//! same library.
//!
//! ## Architecture
//!
//! - **Estimator**: averages peer ratings into per-course workload statistics
//! - **Scheduler**: allocates courses to daily study slots, then attaches
//!   concrete times to every study and pause block
//! - **Storage**: SQLite storage for courses, ratings and schedules, and a
//!   TOML configuration file
//! - **Export**: iCalendar rendering of a schedule
//!
//! ## Key Components
//!
//! - [`Planner`]: validated entry point for a scheduling run
//! - [`estimate`]: workload statistics for one course
//! - [`ScheduleDb`]: persistence of courses, ratings and schedules
//! - [`Config`]: application configuration management

pub mod course;
pub mod error;
pub mod estimator;
pub mod export;
pub mod scheduler;
pub mod storage;

pub use course::{Course, EnrollmentStatus, Faculty, Rating, University};
pub use error::{ConfigError, CoreError, DatabaseError, EstimateError, ValidationError};
pub use estimator::{estimate, estimate_many, rank, CourseBatch, CourseWorkload, RankBy, WorkloadStats};
pub use export::IcsExport;
pub use scheduler::{
    allocate, materialize, BlockKind, CourseCoverage, DayEndPolicy, DayPlan, Interval, PlanEntry,
    Planner, ScheduleRange, SelectedCourse, StudyDayPolicy, StudyParameters, StudyPlan,
    TrailingPause,
};
pub use storage::{Config, Schedule, ScheduleDb, ScheduleSummary};
