//! Canonical Salmon Run domain model shared by every SRS crate.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "srs-core";

/// Number of canonical enemy slots carried by every tally array.
pub const ENEMY_SLOTS: usize = 14;

/// Canonical enemy ids in slot order. Index `i` of every tally array in the
/// system refers to `CANONICAL_ENEMY_IDS[i]`.
pub const CANONICAL_ENEMY_IDS: [i32; ENEMY_SLOTS] = [
    4,  // Steelhead
    5,  // Flyfish
    6,  // Scrapper
    7,  // Steel Eel
    8,  // Stinger
    9,  // Maws
    10, // Drizzler
    11, // Fish Stick
    12, // Flipper-Flopper
    13, // Big Shot
    14, // Slammin' Lid
    15, // Goldie
    17, // Griller
    20, // Mudmouth
];

/// Wave number of the optional boss wave.
pub const BOSS_WAVE: u8 = 4;

/// Slot index for an enemy id, if the id is one of the canonical enemies.
pub fn enemy_slot(enemy_id: i32) -> Option<usize> {
    CANONICAL_ENEMY_IDS.iter().position(|id| *id == enemy_id)
}

/// Per-slot kill counts where `None` means "not observable".
pub type KillTally = [Option<u32>; ENEMY_SLOTS];

/// Tally of a teammate: individual kills are never visible to the uploader.
pub const UNKNOWN_KILL_TALLY: KillTally = [None; ENEMY_SLOTS];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} `{}`", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    Regular,
    PrivateCustom,
    PrivateScenario,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Regular => "REGULAR",
            Mode::PrivateCustom => "PRIVATE_CUSTOM",
            Mode::PrivateScenario => "PRIVATE_SCENARIO",
        }
    }

    /// Private rooms are not published in the public rotation calendar.
    pub fn is_private(&self) -> bool {
        !matches!(self, Mode::Regular)
    }
}

impl FromStr for Mode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REGULAR" => Ok(Mode::Regular),
            "PRIVATE_CUSTOM" => Ok(Mode::PrivateCustom),
            "PRIVATE_SCENARIO" => Ok(Mode::PrivateScenario),
            other => Err(UnknownVariant {
                kind: "mode",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rule {
    Regular,
    BigRun,
}

impl Rule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rule::Regular => "REGULAR",
            Rule::BigRun => "BIG_RUN",
        }
    }
}

impl FromStr for Rule {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REGULAR" => Ok(Rule::Regular),
            "BIG_RUN" => Ok(Rule::BigRun),
            other => Err(UnknownVariant {
                kind: "rule",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Species {
    Inkling,
    Octoling,
}

impl Species {
    pub fn as_str(&self) -> &'static str {
        match self {
            Species::Inkling => "INKLING",
            Species::Octoling => "OCTOLING",
        }
    }
}

impl FromStr for Species {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INKLING" => Ok(Species::Inkling),
            "OCTOLING" => Ok(Species::Octoling),
            other => Err(UnknownVariant {
                kind: "species",
                value: other.to_string(),
            }),
        }
    }
}

/// Schedule reference as known from a submission, before shift bounds are resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDraft {
    pub stage_id: i32,
    pub weapon_list: Vec<i32>,
    pub mode: Mode,
    pub rule: Rule,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl ScheduleDraft {
    /// Key with every missing bound replaced by [`ScheduleKey::sentinel_time`].
    pub fn with_sentinel_defaults(&self) -> ScheduleKey {
        ScheduleKey {
            stage_id: self.stage_id,
            weapon_list: self.weapon_list.clone(),
            mode: self.mode,
            rule: self.rule,
            start_time: self.start_time.unwrap_or_else(ScheduleKey::sentinel_time),
            end_time: self.end_time.unwrap_or_else(ScheduleKey::sentinel_time),
        }
    }

    pub fn with_bounds(&self, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> ScheduleKey {
        ScheduleKey {
            stage_id: self.stage_id,
            weapon_list: self.weapon_list.clone(),
            mode: self.mode,
            rule: self.rule,
            start_time,
            end_time,
        }
    }
}

/// Dedup key of a persisted schedule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduleKey {
    pub stage_id: i32,
    pub weapon_list: Vec<i32>,
    pub mode: Mode,
    pub rule: Rule,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl ScheduleKey {
    /// Stand-in bound for sources that do not report shift times.
    pub fn sentinel_time() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextColor {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl TextColor {
    pub fn to_rgba(self) -> [f64; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Scale {
    pub gold: Option<u32>,
    pub silver: Option<u32>,
    pub bronze: Option<u32>,
}

/// Fields only the uploader can observe about themselves. All `None` for teammates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UploaderStats {
    pub job_bonus: Option<u32>,
    pub job_score: Option<u32>,
    pub job_rate: Option<f64>,
    pub kuma_point: Option<u32>,
    pub grade_id: Option<i32>,
    pub grade_point: Option<u32>,
    pub smell_meter: Option<u32>,
    pub scale: Scale,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wave {
    pub wave_number: u8,
    pub water_level: u8,
    pub event_type: u8,
    pub golden_ikura_num: Option<u32>,
    pub golden_ikura_pop_num: u32,
    pub quota_num: Option<u32>,
    pub is_clear: bool,
    /// Special weapon id of every special used during the wave.
    pub special_usage: Vec<i32>,
}

impl Wave {
    pub fn is_boss_wave(&self) -> bool {
        self.wave_number == BOSS_WAVE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub pid: String,
    pub is_myself: bool,
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
    /// Uses of `special_id` per wave, in wave order.
    pub special_counts: Vec<u32>,
    pub rescue_count: u32,
    pub rescued_count: u32,
    pub ikura_num: u32,
    pub golden_ikura_num: u32,
    pub golden_ikura_assist_num: u32,
    pub defeat_enemy_count: u32,
    pub boss_kill_counts: KillTally,
    pub stats: UploaderStats,
}

impl Player {
    pub fn is_kill_tally_redacted(&self) -> bool {
        self.boss_kill_counts.iter().all(Option::is_none)
    }
}

/// Canonical, format-independent match record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoopResult {
    pub match_id: String,
    pub played_time: DateTime<Utc>,
    pub danger_rate: f64,
    pub ikura_num: u32,
    pub golden_ikura_num: u32,
    pub golden_ikura_assist_num: u32,
    pub boss_counts: [u32; ENEMY_SLOTS],
    pub boss_kill_counts: [u32; ENEMY_SLOTS],
    pub night_less: bool,
    pub is_clear: bool,
    pub failure_wave: Option<u8>,
    /// `None` when the boss wave never happened.
    pub is_boss_defeated: Option<bool>,
    pub boss_id: Option<i32>,
    pub scenario_code: Option<String>,
    pub schedule: ScheduleDraft,
    pub waves: Vec<Wave>,
    pub players: Vec<Player>,
    /// Sorted player ids of every participant.
    pub members: Vec<String>,
}

impl CoopResult {
    pub fn uploader(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.is_myself)
    }

    pub fn teammates(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| !p.is_myself)
    }

    pub fn mode(&self) -> Mode {
        self.schedule.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enemy_slot_table_is_ordered_and_unique() {
        assert_eq!(enemy_slot(4), Some(0));
        assert_eq!(enemy_slot(15), Some(11));
        assert_eq!(enemy_slot(20), Some(ENEMY_SLOTS - 1));
        assert_eq!(enemy_slot(16), None);
        assert_eq!(enemy_slot(23), None);

        let mut sorted = CANONICAL_ENEMY_IDS.to_vec();
        sorted.dedup();
        assert_eq!(sorted.len(), ENEMY_SLOTS);
        assert!(CANONICAL_ENEMY_IDS.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn modes_and_rules_round_trip_through_their_db_names() {
        for mode in [Mode::Regular, Mode::PrivateCustom, Mode::PrivateScenario] {
            assert_eq!(mode.as_str().parse::<Mode>().unwrap(), mode);
        }
        for rule in [Rule::Regular, Rule::BigRun] {
            assert_eq!(rule.as_str().parse::<Rule>().unwrap(), rule);
        }
        let err = "TEAM_CONTEST".parse::<Rule>().unwrap_err();
        assert_eq!(err.to_string(), "unknown rule `TEAM_CONTEST`");
    }

    #[test]
    fn mode_serializes_in_upstream_casing() {
        let json = serde_json::to_string(&Mode::PrivateScenario).unwrap();
        assert_eq!(json, "\"PRIVATE_SCENARIO\"");
    }

    #[test]
    fn missing_shift_bounds_default_to_the_epoch() {
        let draft = ScheduleDraft {
            stage_id: 1,
            weapon_list: vec![0, 10, 20, 30],
            mode: Mode::Regular,
            rule: Rule::Regular,
            start_time: None,
            end_time: None,
        };
        let key = draft.with_sentinel_defaults();
        assert_eq!(key.start_time, ScheduleKey::sentinel_time());
        assert_eq!(key.end_time.timestamp(), 0);
        assert_eq!(key.weapon_list, draft.weapon_list);
    }
}
