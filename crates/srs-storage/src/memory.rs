//! In-process result store backing tests and database-less runs.

use std::collections::HashMap;

use async_trait::async_trait;
use srs_core::{ScheduleKey, ENEMY_SLOTS};
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::model::{
    EnemyTotals, GradeRecord, JobTotals, OutcomeBucket, ScenarioCodeFilter, ScenarioCodeSummary,
    StoredResult, StoredSchedule, UpsertOutcome, UpsertPlan, UpsertStatus,
};
use crate::repos::{ResultRepo, ScheduleRepo, StatsRepo};
use crate::store::ResultStore;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    /// Schedule id `n` lives at index `n - 1`.
    schedules: Vec<ScheduleKey>,
    /// Sequence id `n` lives at index `n - 1`.
    results: Vec<StoredResult>,
}

impl MemoryState {
    fn schedule_id(&mut self, key: &ScheduleKey) -> i64 {
        match self.schedules.iter().position(|s| s == key) {
            Some(idx) => idx as i64 + 1,
            None => {
                self.schedules.push(key.clone());
                self.schedules.len() as i64
            }
        }
    }

    fn schedule(&self, schedule_id: i64) -> Option<&ScheduleKey> {
        usize::try_from(schedule_id - 1)
            .ok()
            .and_then(|idx| self.schedules.get(idx))
    }

    fn upsert(&mut self, plan: &UpsertPlan) -> StoreResult<UpsertOutcome> {
        let match_id = plan.match_id();
        if let Some(stored) = self
            .results
            .iter_mut()
            .find(|r| r.result.match_id == match_id)
        {
            let patch = &plan.on_conflict;
            let player = stored
                .result
                .players
                .iter_mut()
                .find(|p| p.pid == patch.pid)
                .ok_or_else(|| {
                    StoreError::NotFound(format!("player {} in match {match_id}", patch.pid))
                })?;
            patch.apply(player);
            return Ok(UpsertOutcome {
                match_id: match_id.to_string(),
                sequence_id: stored.sequence_id,
                status: UpsertStatus::Updated,
            });
        }

        let schedule_id = self.schedule_id(&plan.create.schedule);
        let sequence_id = self.results.len() as i64 + 1;
        let mut result = plan.create.result.clone();
        result.schedule.start_time = Some(plan.create.schedule.start_time);
        result.schedule.end_time = Some(plan.create.schedule.end_time);
        self.results.push(StoredResult {
            sequence_id,
            schedule_id,
            result,
        });
        Ok(UpsertOutcome {
            match_id: match_id.to_string(),
            sequence_id,
            status: UpsertStatus::Created,
        })
    }

    fn in_schedule(&self, schedule_id: i64) -> impl Iterator<Item = &StoredResult> {
        self.results
            .iter()
            .filter(move |r| r.schedule_id == schedule_id)
    }
}

/// Result store holding everything in memory. Atomic batches are applied to
/// a copy of the state that replaces the live state only when every plan succeeds.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn result_count(&self) -> usize {
        self.state.read().await.results.len()
    }
}

#[async_trait]
impl ScheduleRepo for MemoryStore {
    async fn find_or_create_schedule(&self, key: &ScheduleKey) -> StoreResult<i64> {
        Ok(self.state.write().await.schedule_id(key))
    }

    async fn get_schedule(&self, schedule_id: i64) -> StoreResult<Option<StoredSchedule>> {
        let state = self.state.read().await;
        Ok(state.schedule(schedule_id).map(|key| StoredSchedule {
            id: schedule_id,
            key: key.clone(),
        }))
    }

    async fn list_schedules(&self, limit: usize) -> StoreResult<Vec<StoredSchedule>> {
        let state = self.state.read().await;
        let mut schedules: Vec<StoredSchedule> = state
            .schedules
            .iter()
            .enumerate()
            .map(|(idx, key)| StoredSchedule {
                id: idx as i64 + 1,
                key: key.clone(),
            })
            .collect();
        schedules.sort_by(|a, b| {
            b.key
                .start_time
                .cmp(&a.key.start_time)
                .then(b.id.cmp(&a.id))
        });
        schedules.truncate(limit);
        Ok(schedules)
    }
}

#[async_trait]
impl ResultRepo for MemoryStore {
    async fn upsert_result(&self, plan: &UpsertPlan) -> StoreResult<UpsertOutcome> {
        self.state.write().await.upsert(plan)
    }

    async fn upsert_results_atomic(&self, plans: &[UpsertPlan]) -> StoreResult<Vec<UpsertOutcome>> {
        let mut state = self.state.write().await;
        let mut staged = state.clone();
        let outcomes = plans
            .iter()
            .map(|plan| staged.upsert(plan))
            .collect::<StoreResult<Vec<_>>>()?;
        *state = staged;
        Ok(outcomes)
    }

    async fn get_result(&self, match_id: &str) -> StoreResult<Option<StoredResult>> {
        let state = self.state.read().await;
        Ok(state
            .results
            .iter()
            .find(|r| r.result.match_id == match_id)
            .cloned())
    }

    async fn list_scenario_codes(
        &self,
        filter: &ScenarioCodeFilter,
    ) -> StoreResult<Vec<ScenarioCodeSummary>> {
        let state = self.state.read().await;
        let mut best: HashMap<&str, (&StoredResult, &ScheduleKey)> = HashMap::new();
        for stored in &state.results {
            let Some(schedule) = state.schedule(stored.schedule_id) else {
                continue;
            };
            let Some(code) = stored.result.scenario_code.as_deref() else {
                continue;
            };
            if !filter.matches(schedule, &stored.result) {
                continue;
            }
            let entry = best.entry(code).or_insert((stored, schedule));
            if stored.result.danger_rate > entry.0.result.danger_rate {
                *entry = (stored, schedule);
            }
        }

        let mut summaries: Vec<ScenarioCodeSummary> = best
            .into_values()
            .filter_map(|(stored, schedule)| ScenarioCodeSummary::of(schedule, &stored.result))
            .collect();
        summaries.sort_by(|a, b| {
            b.danger_rate
                .total_cmp(&a.danger_rate)
                .then_with(|| a.scenario_code.cmp(&b.scenario_code))
        });
        Ok(summaries
            .into_iter()
            .skip(filter.offset)
            .take(filter.effective_limit())
            .collect())
    }
}

#[async_trait]
impl StatsRepo for MemoryStore {
    async fn outcome_buckets(&self, schedule_id: i64) -> StoreResult<Vec<OutcomeBucket>> {
        let state = self.state.read().await;
        let mut counts: HashMap<(Option<u8>, Option<bool>), u64> = HashMap::new();
        for stored in state.in_schedule(schedule_id) {
            let key = (stored.result.failure_wave, stored.result.is_boss_defeated);
            *counts.entry(key).or_default() += 1;
        }
        let mut buckets: Vec<OutcomeBucket> = counts
            .into_iter()
            .map(|((failure_wave, is_boss_defeated), count)| OutcomeBucket {
                failure_wave,
                is_boss_defeated,
                count,
            })
            .collect();
        buckets.sort_by_key(|b| (b.failure_wave, b.is_boss_defeated));
        Ok(buckets)
    }

    async fn enemy_totals(&self, schedule_id: i64) -> StoreResult<EnemyTotals> {
        let state = self.state.read().await;
        let mut totals = EnemyTotals::default();
        for stored in state.in_schedule(schedule_id) {
            for slot in 0..ENEMY_SLOTS {
                totals.appearances[slot] += u64::from(stored.result.boss_counts[slot]);
                totals.team_kills[slot] += u64::from(stored.result.boss_kill_counts[slot]);
            }
        }
        Ok(totals)
    }

    async fn job_totals(&self, schedule_id: i64) -> StoreResult<JobTotals> {
        let state = self.state.read().await;
        let mut totals = JobTotals::default();
        for stored in state.in_schedule(schedule_id) {
            let result = &stored.result;
            totals.shifts += 1;
            totals.clears += u64::from(result.is_clear);
            totals.ikura_num += u64::from(result.ikura_num);
            totals.golden_ikura_num += u64::from(result.golden_ikura_num);
            totals.golden_ikura_assist_num += u64::from(result.golden_ikura_assist_num);
            totals.boss_appearances += u64::from(result.is_boss_defeated.is_some());
            totals.boss_defeats += u64::from(result.is_boss_defeated == Some(true));
        }
        Ok(totals)
    }

    async fn best_grades(&self, schedule_id: i64, limit: usize) -> StoreResult<Vec<GradeRecord>> {
        let state = self.state.read().await;
        let mut best: HashMap<&str, GradeRecord> = HashMap::new();
        for stored in state.in_schedule(schedule_id) {
            for player in &stored.result.players {
                let Some(grade_id) = player.stats.grade_id else {
                    continue;
                };
                let grade_point = player.stats.grade_point.unwrap_or(0);
                let candidate = GradeRecord {
                    pid: player.pid.clone(),
                    name: player.name.clone(),
                    grade_id,
                    grade_point,
                };
                best.entry(player.pid.as_str())
                    .and_modify(|current| {
                        if (grade_id, grade_point) > (current.grade_id, current.grade_point) {
                            *current = candidate.clone();
                        }
                    })
                    .or_insert(candidate);
            }
        }
        let mut records: Vec<GradeRecord> = best.into_values().collect();
        records.sort_by(|a, b| {
            (b.grade_id, b.grade_point)
                .cmp(&(a.grade_id, a.grade_point))
                .then_with(|| a.pid.cmp(&b.pid))
        });
        records.truncate(limit);
        Ok(records)
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn migrate(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use srs_core::{
        CoopResult, Mode, Player, Rule, ScheduleDraft, Species, TextColor, UploaderStats, Wave,
        UNKNOWN_KILL_TALLY,
    };

    use super::*;
    use crate::model::{ResultGraph, UploaderPatch};

    fn player(pid: &str, is_myself: bool, grade: Option<(i32, u32)>) -> Player {
        Player {
            pid: pid.to_string(),
            is_myself,
            name: pid.to_uppercase(),
            byname: String::new(),
            name_id: "0001".to_string(),
            badges: [None; 3],
            nameplate: 1,
            text_color: TextColor {
                r: 1.0,
                g: 1.0,
                b: 1.0,
                a: 1.0,
            },
            uniform: 1,
            species: Species::Inkling,
            weapon_list: vec![0],
            special_id: 20006,
            special_counts: vec![0, 0, 0],
            rescue_count: 0,
            rescued_count: 0,
            ikura_num: 100,
            golden_ikura_num: 10,
            golden_ikura_assist_num: 1,
            defeat_enemy_count: 5,
            boss_kill_counts: if is_myself {
                [Some(1); ENEMY_SLOTS]
            } else {
                UNKNOWN_KILL_TALLY
            },
            stats: UploaderStats {
                grade_id: grade.map(|g| g.0),
                grade_point: grade.map(|g| g.1),
                ..Default::default()
            },
        }
    }

    fn result(match_id: &str, danger_rate: f64, scenario_code: Option<&str>) -> CoopResult {
        CoopResult {
            match_id: match_id.to_string(),
            played_time: DateTime::<Utc>::UNIX_EPOCH,
            danger_rate,
            ikura_num: 200,
            golden_ikura_num: 20,
            golden_ikura_assist_num: 2,
            boss_counts: [2; ENEMY_SLOTS],
            boss_kill_counts: [1; ENEMY_SLOTS],
            night_less: true,
            is_clear: true,
            failure_wave: None,
            is_boss_defeated: None,
            boss_id: None,
            scenario_code: scenario_code.map(str::to_string),
            schedule: ScheduleDraft {
                stage_id: 1,
                weapon_list: vec![0, 1, 2, 3],
                mode: Mode::PrivateScenario,
                rule: Rule::Regular,
                start_time: None,
                end_time: None,
            },
            waves: (1..=3)
                .map(|n| Wave {
                    wave_number: n,
                    water_level: 1,
                    event_type: 0,
                    golden_ikura_num: Some(7),
                    golden_ikura_pop_num: 10,
                    quota_num: Some(5),
                    is_clear: true,
                    special_usage: Vec::new(),
                })
                .collect(),
            players: vec![
                player("me", true, Some((8, 300))),
                player("mate", false, None),
            ],
            members: vec!["mate".to_string(), "me".to_string()],
        }
    }

    fn plan(result: CoopResult) -> UpsertPlan {
        let patch = UploaderPatch::from_uploader(result.uploader().unwrap());
        UpsertPlan {
            create: ResultGraph {
                schedule: result.schedule.with_sentinel_defaults(),
                result,
            },
            on_conflict: patch,
        }
    }

    #[tokio::test]
    async fn resubmission_only_patches_the_uploader() {
        let store = MemoryStore::new();
        let first = store.upsert_result(&plan(result("m1", 1.0, None))).await.unwrap();
        assert_eq!(first.status, UpsertStatus::Created);

        let before = store.get_result("m1").await.unwrap().unwrap().result;
        let mut again = result("m1", 3.0, None);
        again.players[0].stats.grade_point = Some(420);
        again.players[1].name = "RENAMED".to_string();
        again.players[1].ikura_num = 1;
        again.waves[0].water_level = 2;
        again.waves[2].golden_ikura_num = None;
        let second = store.upsert_result(&plan(again)).await.unwrap();
        assert_eq!(second.status, UpsertStatus::Updated);
        assert_eq!(second.sequence_id, first.sequence_id);

        let stored = store.get_result("m1").await.unwrap().unwrap();
        assert_eq!(stored.result.danger_rate, 1.0);
        assert_eq!(stored.result.players[0].stats.grade_point, Some(420));
        assert_eq!(stored.result.players[1], before.players[1]);
        assert_eq!(stored.result.waves, before.waves);
        assert_eq!(store.result_count().await, 1);
    }

    #[tokio::test]
    async fn atomic_batches_roll_back_on_failure() {
        let store = MemoryStore::new();
        store.upsert_result(&plan(result("m1", 1.0, None))).await.unwrap();

        let mut stranger = plan(result("m1", 1.0, None));
        stranger.on_conflict.pid = "nobody".to_string();
        let batch = vec![plan(result("m2", 1.0, None)), stranger];
        let err = store.upsert_results_atomic(&batch).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(store.result_count().await, 1);
        assert!(store.get_result("m2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn schedules_are_created_once_per_key() {
        let store = MemoryStore::new();
        let a = store.upsert_result(&plan(result("m1", 1.0, None))).await.unwrap();
        let b = store.upsert_result(&plan(result("m2", 1.0, None))).await.unwrap();
        let first = store.get_result(&a.match_id).await.unwrap().unwrap();
        let second = store.get_result(&b.match_id).await.unwrap().unwrap();
        assert_eq!(first.schedule_id, second.schedule_id);
        assert_eq!(store.list_schedules(10).await.unwrap().len(), 1);
        assert_eq!(
            first.result.schedule.start_time,
            Some(ScheduleKey::sentinel_time())
        );
    }

    #[tokio::test]
    async fn scenario_codes_are_distinct_and_sorted_by_danger() {
        let store = MemoryStore::new();
        for (id, danger, code) in [
            ("m1", 1.5, Some("AAAA")),
            ("m2", 2.5, Some("AAAA")),
            ("m3", 2.0, Some("BBBB")),
            ("m4", 3.0, None),
        ] {
            store.upsert_result(&plan(result(id, danger, code))).await.unwrap();
        }

        let all = store
            .list_scenario_codes(&ScenarioCodeFilter::default())
            .await
            .unwrap();
        let codes: Vec<(&str, f64)> = all
            .iter()
            .map(|s| (s.scenario_code.as_str(), s.danger_rate))
            .collect();
        assert_eq!(codes, vec![("AAAA", 2.5), ("BBBB", 2.0)]);
        assert_eq!(all[0].waves.len(), 3);

        let filtered = store
            .list_scenario_codes(&ScenarioCodeFilter {
                min_danger_rate: Some(2.6),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(filtered.is_empty());

        let paged = store
            .list_scenario_codes(&ScenarioCodeFilter {
                offset: 1,
                weapons: vec![1, 3],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].scenario_code, "BBBB");
    }
}
