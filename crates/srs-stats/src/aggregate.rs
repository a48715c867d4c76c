//! Pure reductions from stored aggregates to the published statistics.

use serde::{Deserialize, Serialize};
use srs_core::{BOSS_WAVE, CANONICAL_ENEMY_IDS, ENEMY_SLOTS};
use srs_storage::{EnemyTotals, GradeRecord, JobTotals, OutcomeBucket};

pub const LEADERBOARD_CAP: usize = 100;

/// How many matches reached, cleared and failed one wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveFunnelStep {
    pub wave_number: u8,
    pub reached: u64,
    pub cleared: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyTally {
    pub enemy_id: i32,
    pub appearances: u64,
    pub team_kills: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JobAggregate {
    pub shifts: u64,
    pub clear_ratio: f64,
    pub ikura_num: u64,
    pub golden_ikura_num: u64,
    pub golden_ikura_assist_num: u64,
    pub boss_appearances: u64,
    pub boss_defeat_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// Dense rank starting at 1.
    pub rank: u32,
    pub pid: String,
    pub name: String,
    pub grade_id: i32,
    pub grade_point: u32,
}

/// Waves 1-3 cascade from the match total; the boss wave only counts
/// matches that cleared wave 3 and faced the boss.
pub fn wave_funnel(buckets: &[OutcomeBucket]) -> Vec<WaveFunnelStep> {
    let total: u64 = buckets.iter().map(|b| b.count).sum();
    let failed_at = |wave: u8| -> u64 {
        buckets
            .iter()
            .filter(|b| b.failure_wave == Some(wave))
            .map(|b| b.count)
            .sum()
    };

    let mut steps = Vec::with_capacity(usize::from(BOSS_WAVE));
    let mut reached = total;
    for wave_number in 1..BOSS_WAVE {
        let failed = failed_at(wave_number).min(reached);
        let cleared = reached - failed;
        steps.push(WaveFunnelStep {
            wave_number,
            reached,
            cleared,
            failed,
        });
        reached = cleared;
    }

    let (mut boss_reached, mut boss_cleared) = (0, 0);
    for bucket in buckets.iter().filter(|b| b.failure_wave.is_none()) {
        if let Some(defeated) = bucket.is_boss_defeated {
            boss_reached += bucket.count;
            if defeated {
                boss_cleared += bucket.count;
            }
        }
    }
    steps.push(WaveFunnelStep {
        wave_number: BOSS_WAVE,
        reached: boss_reached,
        cleared: boss_cleared,
        failed: boss_reached - boss_cleared,
    });
    steps
}

pub fn enemy_tally(totals: &EnemyTotals) -> Vec<EnemyTally> {
    (0..ENEMY_SLOTS)
        .map(|slot| EnemyTally {
            enemy_id: CANONICAL_ENEMY_IDS[slot],
            appearances: totals.appearances[slot],
            team_kills: totals.team_kills[slot],
        })
        .collect()
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

pub fn job_aggregate(totals: &JobTotals) -> JobAggregate {
    JobAggregate {
        shifts: totals.shifts,
        clear_ratio: ratio(totals.clears, totals.shifts),
        ikura_num: totals.ikura_num,
        golden_ikura_num: totals.golden_ikura_num,
        golden_ikura_assist_num: totals.golden_ikura_assist_num,
        boss_appearances: totals.boss_appearances,
        boss_defeat_ratio: ratio(totals.boss_defeats, totals.boss_appearances),
    }
}

/// Dense ranking by grade id then grade point, both descending. Ties keep
/// the same rank and are ordered by player id.
pub fn dense_rank(mut records: Vec<GradeRecord>) -> Vec<LeaderboardEntry> {
    records.sort_by(|a, b| {
        (b.grade_id, b.grade_point)
            .cmp(&(a.grade_id, a.grade_point))
            .then_with(|| a.pid.cmp(&b.pid))
    });
    records.truncate(LEADERBOARD_CAP);

    let mut rank = 0;
    let mut previous = None;
    records
        .into_iter()
        .map(|record| {
            let key = (record.grade_id, record.grade_point);
            if previous != Some(key) {
                rank += 1;
                previous = Some(key);
            }
            LeaderboardEntry {
                rank,
                pid: record.pid,
                name: record.name,
                grade_id: record.grade_id,
                grade_point: record.grade_point,
            }
        })
        .collect()
}
