//! Types exchanged with the storage collaborator.

use serde::{Deserialize, Serialize};
use srs_core::{CoopResult, KillTally, Mode, Player, Rule, ScheduleKey, ENEMY_SLOTS};

/// Value persisted for an unknown kill slot or an unequipped badge.
pub const DB_UNKNOWN: i32 = -1;

pub const DEFAULT_PAGE_LIMIT: usize = 25;
pub const MAX_PAGE_LIMIT: usize = 200;

/// Everything written when a match id is seen for the first time.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultGraph {
    pub schedule: ScheduleKey,
    pub result: CoopResult,
}

/// Uploader fields a resubmission is allowed to overwrite.
#[derive(Debug, Clone, PartialEq)]
pub struct UploaderPatch {
    pub pid: String,
    pub boss_kill_counts: KillTally,
    pub grade_id: Option<i32>,
    pub grade_point: Option<u32>,
    pub job_bonus: Option<u32>,
    pub job_rate: Option<f64>,
    pub job_score: Option<u32>,
    pub kuma_point: Option<u32>,
    pub smell_meter: Option<u32>,
}

impl UploaderPatch {
    pub fn from_uploader(player: &Player) -> Self {
        Self {
            pid: player.pid.clone(),
            boss_kill_counts: player.boss_kill_counts,
            grade_id: player.stats.grade_id,
            grade_point: player.stats.grade_point,
            job_bonus: player.stats.job_bonus,
            job_rate: player.stats.job_rate,
            job_score: player.stats.job_score,
            kuma_point: player.stats.kuma_point,
            smell_meter: player.stats.smell_meter,
        }
    }

    pub fn apply(&self, player: &mut Player) {
        player.boss_kill_counts = self.boss_kill_counts;
        player.stats.grade_id = self.grade_id;
        player.stats.grade_point = self.grade_point;
        player.stats.job_bonus = self.job_bonus;
        player.stats.job_rate = self.job_rate;
        player.stats.job_score = self.job_score;
        player.stats.kuma_point = self.kuma_point;
        player.stats.smell_meter = self.smell_meter;
    }
}

/// Create-or-patch instruction for one match.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertPlan {
    pub create: ResultGraph,
    pub on_conflict: UploaderPatch,
}

impl UpsertPlan {
    pub fn match_id(&self) -> &str {
        &self.create.result.match_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertStatus {
    Created,
    Updated,
}

impl UpsertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpsertStatus::Created => "created",
            UpsertStatus::Updated => "updated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertOutcome {
    pub match_id: String,
    pub sequence_id: i64,
    pub status: UpsertStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSchedule {
    pub id: i64,
    pub key: ScheduleKey,
}

/// A persisted match. `result.schedule` carries the resolved shift bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResult {
    pub sequence_id: i64,
    pub schedule_id: i64,
    pub result: CoopResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioCodeFilter {
    pub min_danger_rate: Option<f64>,
    /// `Some(true)` keeps codes whose match reached the boss wave.
    pub has_extra_wave: Option<bool>,
    pub mode: Option<Mode>,
    pub rule: Option<Rule>,
    pub stage_id: Option<i32>,
    /// Every listed weapon must be part of the schedule's weapon list.
    pub weapons: Vec<i32>,
    pub offset: usize,
    pub limit: usize,
}

impl Default for ScenarioCodeFilter {
    fn default() -> Self {
        Self {
            min_danger_rate: None,
            has_extra_wave: None,
            mode: None,
            rule: None,
            stage_id: None,
            weapons: Vec::new(),
            offset: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl ScenarioCodeFilter {
    pub fn effective_limit(&self) -> usize {
        self.limit.min(MAX_PAGE_LIMIT)
    }

    pub fn matches(&self, schedule: &ScheduleKey, result: &CoopResult) -> bool {
        if result.scenario_code.is_none() {
            return false;
        }
        if self.min_danger_rate.is_some_and(|min| result.danger_rate < min) {
            return false;
        }
        if self
            .has_extra_wave
            .is_some_and(|extra| extra != result.is_boss_defeated.is_some())
        {
            return false;
        }
        if self.mode.is_some_and(|mode| mode != schedule.mode)
            || self.rule.is_some_and(|rule| rule != schedule.rule)
            || self.stage_id.is_some_and(|stage| stage != schedule.stage_id)
        {
            return false;
        }
        self.weapons
            .iter()
            .all(|weapon| schedule.weapon_list.contains(weapon))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioWave {
    pub water_level: u8,
    pub event_type: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioCodeSummary {
    pub scenario_code: String,
    pub stage_id: i32,
    pub weapon_list: Vec<i32>,
    pub danger_rate: f64,
    pub night_less: bool,
    pub has_extra_wave: bool,
    pub mode: Mode,
    pub rule: Rule,
    pub waves: Vec<ScenarioWave>,
}

impl ScenarioCodeSummary {
    pub fn of(schedule: &ScheduleKey, result: &CoopResult) -> Option<Self> {
        Some(Self {
            scenario_code: result.scenario_code.clone()?,
            stage_id: schedule.stage_id,
            weapon_list: schedule.weapon_list.clone(),
            danger_rate: result.danger_rate,
            night_less: result.night_less,
            has_extra_wave: result.is_boss_defeated.is_some(),
            mode: schedule.mode,
            rule: schedule.rule,
            waves: result
                .waves
                .iter()
                .map(|w| ScenarioWave {
                    water_level: w.water_level,
                    event_type: w.event_type,
                })
                .collect(),
        })
    }
}

/// Number of matches in a schedule sharing one outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeBucket {
    pub failure_wave: Option<u8>,
    pub is_boss_defeated: Option<bool>,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnemyTotals {
    pub appearances: [u64; ENEMY_SLOTS],
    pub team_kills: [u64; ENEMY_SLOTS],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobTotals {
    pub shifts: u64,
    pub clears: u64,
    pub ikura_num: u64,
    pub golden_ikura_num: u64,
    pub golden_ikura_assist_num: u64,
    pub boss_appearances: u64,
    pub boss_defeats: u64,
}

/// Best grade a player reached within one schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeRecord {
    pub pid: String,
    pub name: String,
    pub grade_id: i32,
    pub grade_point: u32,
}

pub(crate) fn count_to_db(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

pub(crate) fn count_from_db(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

pub(crate) fn tally_to_db(tally: &KillTally) -> Vec<i32> {
    tally
        .iter()
        .map(|slot| slot.map(count_to_db).unwrap_or(DB_UNKNOWN))
        .collect()
}

pub(crate) fn tally_from_db(values: &[i32]) -> KillTally {
    let mut out = [None; ENEMY_SLOTS];
    for (slot, value) in out.iter_mut().zip(values) {
        *slot = u32::try_from(*value).ok();
    }
    out
}

#[cfg(test)]
mod tests {
    use srs_core::UNKNOWN_KILL_TALLY;

    use super::*;

    #[test]
    fn unknown_kill_slots_persist_as_negative_one() {
        let mut tally = UNKNOWN_KILL_TALLY;
        tally[0] = Some(3);
        let stored = tally_to_db(&tally);
        assert_eq!(stored.len(), ENEMY_SLOTS);
        assert_eq!(stored[0], 3);
        assert!(stored[1..].iter().all(|v| *v == DB_UNKNOWN));
        assert_eq!(tally_from_db(&stored), tally);
    }

    #[test]
    fn page_limit_is_capped() {
        let filter = ScenarioCodeFilter {
            limit: 1_000,
            ..Default::default()
        };
        assert_eq!(filter.effective_limit(), MAX_PAGE_LIMIT);
        assert_eq!(ScenarioCodeFilter::default().effective_limit(), 25);
    }
}
