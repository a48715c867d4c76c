//! Repository traits implemented by every result store.

use async_trait::async_trait;
use srs_core::ScheduleKey;

use crate::error::StoreResult;
use crate::model::{
    EnemyTotals, GradeRecord, JobTotals, OutcomeBucket, ScenarioCodeFilter, ScenarioCodeSummary,
    StoredResult, StoredSchedule, UpsertOutcome, UpsertPlan,
};

#[async_trait]
pub trait ScheduleRepo: Send + Sync {
    /// Lookup-or-create by the full dedup key. Returns the schedule id.
    async fn find_or_create_schedule(&self, key: &ScheduleKey) -> StoreResult<i64>;

    async fn get_schedule(&self, schedule_id: i64) -> StoreResult<Option<StoredSchedule>>;

    /// Most recent schedules first.
    async fn list_schedules(&self, limit: usize) -> StoreResult<Vec<StoredSchedule>>;
}

#[async_trait]
pub trait ResultRepo: Send + Sync {
    /// Creates the full graph for an unseen match id, or applies the uploader
    /// patch to an existing one.
    async fn upsert_result(&self, plan: &UpsertPlan) -> StoreResult<UpsertOutcome>;

    /// Same as [`ResultRepo::upsert_result`] for every plan, committed as one unit.
    async fn upsert_results_atomic(&self, plans: &[UpsertPlan]) -> StoreResult<Vec<UpsertOutcome>>;

    async fn get_result(&self, match_id: &str) -> StoreResult<Option<StoredResult>>;

    /// One entry per distinct scenario code, highest danger rate first.
    async fn list_scenario_codes(
        &self,
        filter: &ScenarioCodeFilter,
    ) -> StoreResult<Vec<ScenarioCodeSummary>>;
}

#[async_trait]
pub trait StatsRepo: Send + Sync {
    async fn outcome_buckets(&self, schedule_id: i64) -> StoreResult<Vec<OutcomeBucket>>;

    async fn enemy_totals(&self, schedule_id: i64) -> StoreResult<EnemyTotals>;

    async fn job_totals(&self, schedule_id: i64) -> StoreResult<JobTotals>;

    /// Best `(grade_id, grade_point)` per player, ordered by grade desc then
    /// pid, at most `limit` rows.
    async fn best_grades(&self, schedule_id: i64, limit: usize) -> StoreResult<Vec<GradeRecord>>;
}
