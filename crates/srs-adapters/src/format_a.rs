//! Game-client export (`{data:{coopHistoryDetail:{..}}}`, camelCase, opaque ids).

use chrono::{DateTime, Utc};
use serde::Deserialize;
use srs_core::{Rule, Scale, Species, TextColor};

use crate::enemy::EnemyEncounter;
use crate::error::NormalizeError;
use crate::identity::decode_integer_id;
use crate::raw::{RawBoss, RawCoopResult, RawGrade, RawJobStats, RawPlayer, RawWave};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientExportItem {
    pub data: ClientExportData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientExportData {
    pub coop_history_detail: CoopHistoryDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpaqueId {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoopHistoryDetail {
    pub id: String,
    pub after_grade: Option<OpaqueId>,
    pub after_grade_point: Option<u32>,
    pub result_wave: i32,
    pub played_time: DateTime<Utc>,
    pub rule: Rule,
    pub coop_stage: OpaqueId,
    pub danger_rate: f64,
    pub scenario_code: Option<String>,
    pub my_result: MemberResult,
    #[serde(default)]
    pub member_results: Vec<MemberResult>,
    pub boss_result: Option<BossResult>,
    #[serde(default)]
    pub enemy_results: Vec<EnemyResult>,
    pub wave_results: Vec<WaveResult>,
    pub weapons: Vec<OpaqueId>,
    pub job_point: Option<u32>,
    pub job_score: Option<u32>,
    pub job_rate: Option<f64>,
    pub job_bonus: Option<u32>,
    pub smell_meter: Option<u32>,
    pub scale: Option<ScaleCounts>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScaleCounts {
    pub gold: Option<u32>,
    pub silver: Option<u32>,
    pub bronze: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberResult {
    pub player: PlayerProfile,
    pub weapons: Vec<OpaqueId>,
    pub special_weapon: SpecialWeaponRef,
    pub defeat_enemy_count: u32,
    pub deliver_count: u32,
    pub golden_assist_count: u32,
    pub golden_deliver_count: u32,
    pub rescue_count: u32,
    pub rescued_count: u32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialWeaponRef {
    pub weapon_id: i32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
    pub id: String,
    pub name: String,
    pub byname: String,
    pub name_id: String,
    pub nameplate: Nameplate,
    pub uniform: OpaqueId,
    pub species: Species,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nameplate {
    pub badges: Vec<Option<OpaqueId>>,
    pub background: NameplateBackground,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameplateBackground {
    pub id: String,
    pub text_color: TextColor,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BossResult {
    pub has_defeat_boss: bool,
    pub boss: OpaqueId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnemyResult {
    pub enemy: OpaqueId,
    pub pop_count: u32,
    pub team_defeat_count: u32,
    pub defeat_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaveResult {
    pub wave_number: i32,
    pub water_level: u8,
    pub event_wave: Option<OpaqueId>,
    pub deliver_norm: Option<u32>,
    pub golden_pop_count: u32,
    pub team_deliver_count: Option<u32>,
    #[serde(default)]
    pub special_weapons: Vec<OpaqueId>,
}

pub fn from_format_a(item: &ClientExportItem) -> Result<RawCoopResult, NormalizeError> {
    let detail = &item.data.coop_history_detail;

    let mut players = Vec::with_capacity(1 + detail.member_results.len());
    players.push(raw_player(&detail.my_result)?);
    for member in &detail.member_results {
        players.push(raw_player(member)?);
    }

    let after_grade = match &detail.after_grade {
        Some(grade) => Some(RawGrade {
            id: decode_integer_id(&grade.id)?,
            point: detail.after_grade_point,
        }),
        None => None,
    };

    let boss = match &detail.boss_result {
        Some(result) => Some(RawBoss {
            boss_id: Some(decode_integer_id(&result.boss.id)?),
            defeated: result.has_defeat_boss,
        }),
        None => None,
    };

    Ok(RawCoopResult {
        id: detail.id.clone(),
        played_time: detail.played_time,
        danger_rate: detail.danger_rate,
        outcome_code: detail.result_wave,
        boss,
        scenario_code: detail.scenario_code.clone(),
        after_grade,
        job: RawJobStats {
            kuma_point: detail.job_point,
            job_score: detail.job_score,
            job_rate: detail.job_rate,
            job_bonus: detail.job_bonus,
            smell_meter: detail.smell_meter,
            scale: detail
                .scale
                .map(|s| Scale {
                    gold: s.gold,
                    silver: s.silver,
                    bronze: s.bronze,
                })
                .unwrap_or_default(),
        },
        enemies: detail
            .enemy_results
            .iter()
            .map(|e| {
                Ok(EnemyEncounter {
                    enemy_id: decode_integer_id(&e.enemy.id)?,
                    pop_count: e.pop_count,
                    team_defeat_count: e.team_defeat_count,
                    defeat_count: e.defeat_count,
                })
            })
            .collect::<Result<_, NormalizeError>>()?,
        waves: detail
            .wave_results
            .iter()
            .map(raw_wave)
            .collect::<Result<_, _>>()?,
        players,
        stage_id: decode_integer_id(&detail.coop_stage.id)?,
        rule: detail.rule,
        weapon_list: decode_ids(&detail.weapons)?,
        start_time: None,
        end_time: None,
    })
}

fn decode_ids(ids: &[OpaqueId]) -> Result<Vec<i32>, NormalizeError> {
    ids.iter().map(|w| decode_integer_id(&w.id)).collect()
}

fn raw_wave(wave: &WaveResult) -> Result<RawWave, NormalizeError> {
    Ok(RawWave {
        wave_number: wave.wave_number,
        water_level: wave.water_level,
        event_type: match &wave.event_wave {
            Some(event) => u8::try_from(decode_integer_id(&event.id)?)
                .map_err(|_| NormalizeError::malformed(&event.id, "event id out of range"))?,
            None => 0,
        },
        team_deliver_count: wave.team_deliver_count,
        golden_pop_count: wave.golden_pop_count,
        deliver_norm: wave.deliver_norm,
        special_weapons: decode_ids(&wave.special_weapons)?,
    })
}

fn raw_player(member: &MemberResult) -> Result<RawPlayer, NormalizeError> {
    let profile = &member.player;
    let mut badges = [None; 3];
    for (slot, badge) in badges.iter_mut().zip(&profile.nameplate.badges) {
        *slot = match badge {
            Some(badge) => Some(decode_integer_id(&badge.id)?),
            None => None,
        };
    }

    Ok(RawPlayer {
        id: profile.id.clone(),
        name: profile.name.clone(),
        byname: profile.byname.clone(),
        name_id: profile.name_id.clone(),
        badges,
        nameplate: decode_integer_id(&profile.nameplate.background.id)?,
        text_color: profile.nameplate.background.text_color,
        uniform: decode_integer_id(&profile.uniform.id)?,
        species: profile.species,
        weapon_list: decode_ids(&member.weapons)?,
        special_id: member.special_weapon.weapon_id,
        reported_special_counts: None,
        rescue_count: member.rescue_count,
        rescued_count: member.rescued_count,
        deliver_count: member.deliver_count,
        golden_deliver_count: member.golden_deliver_count,
        golden_assist_count: member.golden_assist_count,
        defeat_enemy_count: member.defeat_enemy_count,
    })
}
