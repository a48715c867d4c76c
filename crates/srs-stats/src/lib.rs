//! Per-schedule statistics over committed results.

pub mod aggregate;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use srs_storage::{ResultStore, ScenarioCodeFilter, ScenarioCodeSummary, StoreError, StoredSchedule};
use thiserror::Error;
use tracing::{debug, info_span, Instrument};

pub use aggregate::{
    dense_rank, enemy_tally, job_aggregate, wave_funnel, EnemyTally, JobAggregate,
    LeaderboardEntry, WaveFunnelStep, LEADERBOARD_CAP,
};

pub const CRATE_NAME: &str = "srs-stats";

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("unknown schedule {0}")]
    UnknownSchedule(i64),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleStatistics {
    pub schedule: StoredSchedule,
    pub wave_funnel: Vec<WaveFunnelStep>,
    pub enemies: Vec<EnemyTally>,
    pub job: JobAggregate,
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Clone)]
pub struct StatsService {
    store: Arc<dyn ResultStore>,
}

impl StatsService {
    pub fn new(store: Arc<dyn ResultStore>) -> Self {
        Self { store }
    }

    pub async fn get_statistics(&self, schedule_id: i64) -> Result<ScheduleStatistics, StatsError> {
        async {
            let schedule = self
                .store
                .get_schedule(schedule_id)
                .await?
                .ok_or(StatsError::UnknownSchedule(schedule_id))?;

            let (buckets, enemies, jobs, grades) = tokio::try_join!(
                self.store.outcome_buckets(schedule_id),
                self.store.enemy_totals(schedule_id),
                self.store.job_totals(schedule_id),
                self.store.best_grades(schedule_id, LEADERBOARD_CAP),
            )?;
            debug!(shifts = jobs.shifts, players = grades.len(), "schedule aggregates loaded");

            Ok(ScheduleStatistics {
                schedule,
                wave_funnel: wave_funnel(&buckets),
                enemies: enemy_tally(&enemies),
                job: job_aggregate(&jobs),
                leaderboard: dense_rank(grades),
            })
        }
        .instrument(info_span!("schedule_statistics", schedule_id))
        .await
    }

    pub async fn scenario_codes(
        &self,
        filter: &ScenarioCodeFilter,
    ) -> Result<Vec<ScenarioCodeSummary>, StatsError> {
        Ok(self.store.list_scenario_codes(filter).await?)
    }
}
