//! Wave validation and clear-flag derivation.

use srs_core::{Wave, BOSS_WAVE};

use crate::error::NormalizeError;
use crate::raw::{RawBoss, RawWave};

/// Match outcome decoded from the upstream result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Cleared,
    FailedAt(u8),
}

impl Outcome {
    pub fn from_code(code: i32) -> Result<Self, NormalizeError> {
        match code {
            0 => Ok(Outcome::Cleared),
            1..=3 => Ok(Outcome::FailedAt(code as u8)),
            other => Err(NormalizeError::InvalidOutcomeCode(other)),
        }
    }

    pub fn is_clear(self) -> bool {
        matches!(self, Outcome::Cleared)
    }

    pub fn failure_wave(self) -> Option<u8> {
        match self {
            Outcome::Cleared => None,
            Outcome::FailedAt(wave) => Some(wave),
        }
    }
}

/// Every wave of a cleared match is clear; otherwise the boss wave follows
/// the boss result.
pub fn wave_clear(outcome: Outcome, wave_number: u8, boss_defeated: bool) -> bool {
    match (wave_number, outcome) {
        (_, Outcome::Cleared) => true,
        (BOSS_WAVE, _) => boss_defeated,
        (n, Outcome::FailedAt(failed)) => n != failed,
    }
}

pub fn special_usage(wave: &Wave, special_id: i32) -> u32 {
    wave.special_usage
        .iter()
        .filter(|id| **id == special_id)
        .count() as u32
}

/// Validated waves ordered by wave number.
pub fn normalize_waves(
    raw: &[RawWave],
    outcome: Outcome,
    boss: Option<&RawBoss>,
) -> Result<Vec<Wave>, NormalizeError> {
    if !(3..=4).contains(&raw.len()) {
        return Err(NormalizeError::InvalidWaveCount(raw.len()));
    }

    let mut ordered: Vec<&RawWave> = raw.iter().collect();
    ordered.sort_by_key(|w| w.wave_number);
    for (expected, wave) in (1..).zip(&ordered) {
        if wave.wave_number != expected {
            return Err(NormalizeError::InvalidWaveNumber(wave.wave_number));
        }
    }

    let has_boss_wave = raw.len() == usize::from(BOSS_WAVE);
    let boss_defeated = match (has_boss_wave, boss, outcome) {
        (true, Some(boss), Outcome::Cleared) => boss.defeated,
        (false, None, _) => false,
        _ => return Err(NormalizeError::BossWaveMismatch),
    };

    Ok(ordered
        .into_iter()
        .map(|w| {
            let wave_number = w.wave_number as u8;
            Wave {
                wave_number,
                water_level: w.water_level,
                event_type: w.event_type,
                golden_ikura_num: w.team_deliver_count,
                golden_ikura_pop_num: w.golden_pop_count,
                quota_num: w.deliver_norm,
                is_clear: wave_clear(outcome, wave_number, boss_defeated),
                special_usage: w.special_weapons.clone(),
            }
        })
        .collect())
}
