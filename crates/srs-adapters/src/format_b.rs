//! Companion-app export (snake_case, plain integer ids, dense enemy arrays).

use chrono::{DateTime, Utc};
use serde::Deserialize;
use srs_core::{Rule, Scale, Species, TextColor, CANONICAL_ENEMY_IDS, ENEMY_SLOTS};

use crate::enemy::EnemyEncounter;
use crate::error::NormalizeError;
use crate::raw::{RawBoss, RawCoopResult, RawGrade, RawJobStats, RawPlayer, RawWave};

/// Dense enemy arrays carry one trailing slot beyond the canonical ones.
pub const COMPANION_TALLY_LEN: usize = 15;

#[derive(Debug, Clone, Deserialize)]
pub struct CompanionAppResult {
    pub id: String,
    /// Unix seconds.
    pub play_time: i64,
    pub danger_rate: f64,
    pub rule: Rule,
    pub scenario_code: Option<String>,
    pub schedule: CompanionSchedule,
    pub boss_counts: Vec<u32>,
    pub boss_kill_counts: Vec<u32>,
    pub grade_id: Option<i32>,
    pub grade_point: Option<u32>,
    pub kuma_point: Option<u32>,
    pub job_score: Option<u32>,
    pub job_rate: Option<f64>,
    pub job_bonus: Option<u32>,
    pub smell_meter: Option<u32>,
    /// Gold, silver, bronze.
    #[serde(default)]
    pub scale: Vec<Option<u32>>,
    pub job_result: CompanionJobResult,
    pub my_result: CompanionPlayer,
    #[serde(default)]
    pub other_results: Vec<CompanionPlayer>,
    pub wave_details: Vec<CompanionWave>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompanionSchedule {
    pub stage_id: i32,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub weapon_list: Vec<i32>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CompanionJobResult {
    pub is_clear: bool,
    pub failure_wave: Option<i32>,
    pub is_boss_defeated: Option<bool>,
    pub boss_id: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompanionPlayer {
    pub id: String,
    pub name: String,
    pub byname: String,
    pub name_id: String,
    pub nameplate: CompanionNameplate,
    pub uniform: i32,
    pub species: Species,
    pub weapon_list: Vec<i32>,
    pub special_id: i32,
    /// Uses per wave.
    pub special_counts: Vec<u32>,
    pub help_count: u32,
    pub dead_count: u32,
    pub ikura_num: u32,
    pub golden_ikura_num: u32,
    pub golden_ikura_assist_num: u32,
    pub boss_kill_counts_total: u32,
    pub boss_kill_counts: Vec<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompanionNameplate {
    pub badges: Vec<Option<i32>>,
    pub background: i32,
    pub text_color: TextColor,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CompanionWave {
    pub id: i32,
    pub water_level: u8,
    pub event_type: u8,
    pub golden_ikura_num: Option<u32>,
    pub golden_ikura_pop_num: u32,
    pub quota_num: Option<u32>,
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, NormalizeError> {
    DateTime::from_timestamp(secs, 0).ok_or(NormalizeError::InvalidTimestamp(secs))
}

fn dense_tally(field: &'static str, values: &[u32]) -> Result<[u32; ENEMY_SLOTS], NormalizeError> {
    if values.len() != COMPANION_TALLY_LEN {
        return Err(NormalizeError::MalformedTally {
            field,
            expected: COMPANION_TALLY_LEN,
            len: values.len(),
        });
    }
    let mut out = [0; ENEMY_SLOTS];
    out.copy_from_slice(&values[..ENEMY_SLOTS]);
    Ok(out)
}

pub fn from_format_b(item: &CompanionAppResult) -> Result<RawCoopResult, NormalizeError> {
    let counts = dense_tally("boss_counts", &item.boss_counts)?;
    let kill_counts = dense_tally("boss_kill_counts", &item.boss_kill_counts)?;
    let my_kill_counts = dense_tally("my_result.boss_kill_counts", &item.my_result.boss_kill_counts)?;

    let enemies = CANONICAL_ENEMY_IDS
        .iter()
        .enumerate()
        .map(|(slot, enemy_id)| EnemyEncounter {
            enemy_id: *enemy_id,
            pop_count: counts[slot],
            team_defeat_count: kill_counts[slot],
            defeat_count: my_kill_counts[slot],
        })
        .collect();

    let everyone: Vec<&CompanionPlayer> = std::iter::once(&item.my_result)
        .chain(&item.other_results)
        .collect();

    for player in &everyone {
        if player.special_counts.len() != item.wave_details.len() {
            return Err(NormalizeError::MalformedTally {
                field: "special_counts",
                expected: item.wave_details.len(),
                len: player.special_counts.len(),
            });
        }
    }

    let job = item.job_result;
    let outcome_code = if job.is_clear {
        0
    } else {
        job.failure_wave.unwrap_or(-1)
    };

    Ok(RawCoopResult {
        id: item.id.clone(),
        played_time: timestamp(item.play_time)?,
        danger_rate: item.danger_rate,
        outcome_code,
        boss: job.is_boss_defeated.map(|defeated| RawBoss {
            boss_id: job.boss_id,
            defeated,
        }),
        scenario_code: item.scenario_code.clone(),
        after_grade: item.grade_id.map(|id| RawGrade {
            id,
            point: item.grade_point,
        }),
        job: RawJobStats {
            kuma_point: item.kuma_point,
            job_score: item.job_score,
            job_rate: item.job_rate,
            job_bonus: item.job_bonus,
            smell_meter: item.smell_meter,
            scale: Scale {
                gold: item.scale.first().copied().flatten(),
                silver: item.scale.get(1).copied().flatten(),
                bronze: item.scale.get(2).copied().flatten(),
            },
        },
        enemies,
        waves: item
            .wave_details
            .iter()
            .map(|wave| raw_wave(wave, &everyone))
            .collect::<Result<_, _>>()?,
        players: everyone.iter().map(|p| raw_player(p)).collect(),
        stage_id: item.schedule.stage_id,
        rule: item.rule,
        weapon_list: item.schedule.weapon_list.clone(),
        start_time: item.schedule.start_time.map(timestamp).transpose()?,
        end_time: item.schedule.end_time.map(timestamp).transpose()?,
    })
}

/// Rebuilds the per-wave special log from each player's per-wave counts.
/// Counts are indexed by wave number, so every id must fall inside them.
fn raw_wave(wave: &CompanionWave, players: &[&CompanionPlayer]) -> Result<RawWave, NormalizeError> {
    let index = wave
        .id
        .checked_sub(1)
        .and_then(|idx| usize::try_from(idx).ok())
        .filter(|idx| players.iter().all(|p| *idx < p.special_counts.len()))
        .ok_or(NormalizeError::InvalidWaveNumber(wave.id))?;
    let special_weapons = players
        .iter()
        .flat_map(|p| std::iter::repeat(p.special_id).take(p.special_counts[index] as usize))
        .collect();

    Ok(RawWave {
        wave_number: wave.id,
        water_level: wave.water_level,
        event_type: wave.event_type,
        team_deliver_count: wave.golden_ikura_num,
        golden_pop_count: wave.golden_ikura_pop_num,
        deliver_norm: wave.quota_num,
        special_weapons,
    })
}

fn raw_player(player: &CompanionPlayer) -> RawPlayer {
    let mut badges = [None; 3];
    for (slot, badge) in badges.iter_mut().zip(&player.nameplate.badges) {
        *slot = *badge;
    }

    RawPlayer {
        id: player.id.clone(),
        name: player.name.clone(),
        byname: player.byname.clone(),
        name_id: player.name_id.clone(),
        badges,
        nameplate: player.nameplate.background,
        text_color: player.nameplate.text_color,
        uniform: player.uniform,
        species: player.species,
        weapon_list: player.weapon_list.clone(),
        special_id: player.special_id,
        reported_special_counts: Some(player.special_counts.clone()),
        rescue_count: player.help_count,
        rescued_count: player.dead_count,
        deliver_count: player.ikura_num,
        golden_deliver_count: player.golden_ikura_num,
        golden_assist_count: player.golden_ikura_assist_num,
        defeat_enemy_count: player.boss_kill_counts_total,
    }
}
