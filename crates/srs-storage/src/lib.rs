//! Result storage (PostgreSQL + in-memory) and the shift calendar client for SRS.

pub mod calendar;
pub mod error;
pub mod http;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod repos;
pub mod store;

pub use calendar::{find_shift, HttpScheduleCalendar, ScheduleCalendar, Shift, StaticScheduleCalendar};
pub use error::{StoreError, StoreResult};
pub use http::{BackoffPolicy, FetchError, HttpClientConfig, HttpFetcher};
pub use memory::MemoryStore;
pub use model::{
    EnemyTotals, GradeRecord, JobTotals, OutcomeBucket, ResultGraph, ScenarioCodeFilter,
    ScenarioCodeSummary, ScenarioWave, StoredResult, StoredSchedule, UploaderPatch, UpsertOutcome,
    UpsertPlan, UpsertStatus,
};
pub use postgres::PgResultStore;
pub use repos::{ResultRepo, ScheduleRepo, StatsRepo};
pub use store::ResultStore;

pub const CRATE_NAME: &str = "srs-storage";
