//! Format-neutral shape both upstream adapters convert into.

use chrono::{DateTime, Utc};
use srs_core::{Rule, Scale, Species, TextColor};

use crate::enemy::EnemyEncounter;

#[derive(Debug, Clone, PartialEq)]
pub struct RawCoopResult {
    /// Opaque result envelope, decoded by the identity codec.
    pub id: String,
    pub played_time: DateTime<Utc>,
    pub danger_rate: f64,
    /// 0 = cleared, 1..=3 = failed at that wave.
    pub outcome_code: i32,
    pub boss: Option<RawBoss>,
    pub scenario_code: Option<String>,
    /// Grade after the match. Absent in private rooms.
    pub after_grade: Option<RawGrade>,
    pub job: RawJobStats,
    pub enemies: Vec<EnemyEncounter>,
    pub waves: Vec<RawWave>,
    pub players: Vec<RawPlayer>,
    pub stage_id: i32,
    pub rule: Rule,
    pub weapon_list: Vec<i32>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawBoss {
    pub boss_id: Option<i32>,
    pub defeated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawGrade {
    pub id: i32,
    pub point: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawJobStats {
    pub kuma_point: Option<u32>,
    pub job_score: Option<u32>,
    pub job_rate: Option<f64>,
    pub job_bonus: Option<u32>,
    pub smell_meter: Option<u32>,
    pub scale: Scale,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawWave {
    pub wave_number: i32,
    pub water_level: u8,
    pub event_type: u8,
    pub team_deliver_count: Option<u32>,
    pub golden_pop_count: u32,
    pub deliver_norm: Option<u32>,
    /// One special weapon id per use.
    pub special_weapons: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawPlayer {
    /// Opaque player envelope, decoded by the identity codec.
    pub id: String,
    pub name: String,
    pub byname: String,
    pub name_id: String,
    pub badges: [Option<i32>; 3],
    pub nameplate: i32,
    pub text_color: TextColor,
    pub uniform: i32,
    pub species: Species,
    pub weapon_list: Vec<i32>,
    pub special_id: i32,
    /// Per-wave special uses when the source reports them directly.
    pub reported_special_counts: Option<Vec<u32>>,
    pub rescue_count: u32,
    pub rescued_count: u32,
    pub deliver_count: u32,
    pub golden_deliver_count: u32,
    pub golden_assist_count: u32,
    pub defeat_enemy_count: u32,
}
