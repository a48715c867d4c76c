//! Composition of the canonical [`CoopResult`] from a validated raw shape.

use srs_core::{CoopResult, Mode, ScheduleDraft};

use crate::enemy::canonicalize;
use crate::error::NormalizeError;
use crate::identity::decode_match_id;
use crate::player::normalize_players;
use crate::raw::{RawCoopResult, RawGrade};
use crate::wave::{normalize_waves, Outcome};

pub fn infer_mode(scenario_code: Option<&str>, after_grade: Option<&RawGrade>) -> Mode {
    match (scenario_code, after_grade) {
        (Some(_), _) => Mode::PrivateScenario,
        (None, None) => Mode::PrivateCustom,
        (None, Some(_)) => Mode::Regular,
    }
}

pub fn normalize(raw: RawCoopResult) -> Result<CoopResult, NormalizeError> {
    let match_id = decode_match_id(&raw.id)?;
    let outcome = Outcome::from_code(raw.outcome_code)?;
    let waves = normalize_waves(&raw.waves, outcome, raw.boss.as_ref())?;
    let enemies = canonicalize(&raw.enemies);
    let players = normalize_players(
        &raw.players,
        &waves,
        &enemies,
        &raw.job,
        raw.after_grade.as_ref(),
    )?;

    let mut members: Vec<String> = players.iter().map(|p| p.pid.clone()).collect();
    members.sort();

    let mode = infer_mode(raw.scenario_code.as_deref(), raw.after_grade.as_ref());
    let boss_wave_played = waves.iter().any(|w| w.is_boss_wave());

    Ok(CoopResult {
        match_id,
        played_time: raw.played_time,
        danger_rate: raw.danger_rate,
        ikura_num: players.iter().map(|p| p.ikura_num).sum(),
        golden_ikura_num: waves.iter().filter_map(|w| w.golden_ikura_num).sum(),
        golden_ikura_assist_num: players.iter().map(|p| p.golden_ikura_assist_num).sum(),
        boss_counts: enemies.counts,
        boss_kill_counts: enemies.kill_counts,
        night_less: waves.iter().all(|w| w.event_type == 0),
        is_clear: outcome.is_clear(),
        failure_wave: outcome.failure_wave(),
        is_boss_defeated: raw.boss.filter(|_| boss_wave_played).map(|b| b.defeated),
        boss_id: raw.boss.and_then(|b| b.boss_id),
        scenario_code: raw.scenario_code,
        schedule: ScheduleDraft {
            stage_id: raw.stage_id,
            weapon_list: raw.weapon_list,
            mode,
            rule: raw.rule,
            start_time: raw.start_time,
            end_time: raw.end_time,
        },
        waves,
        players,
        members,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_follows_scenario_code_then_grade() {
        let grade = RawGrade {
            id: 8,
            point: Some(100),
        };
        assert_eq!(infer_mode(Some("S1A2B3C4D5E6"), Some(&grade)), Mode::PrivateScenario);
        assert_eq!(infer_mode(Some("S1A2B3C4D5E6"), None), Mode::PrivateScenario);
        assert_eq!(infer_mode(None, None), Mode::PrivateCustom);
        assert_eq!(infer_mode(None, Some(&grade)), Mode::Regular);
    }
}
