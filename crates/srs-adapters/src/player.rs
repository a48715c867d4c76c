//! Participants, uploader detection and teammate redaction.

use srs_core::{Player, UploaderStats, Wave, UNKNOWN_KILL_TALLY};

use crate::enemy::CanonicalEnemies;
use crate::error::NormalizeError;
use crate::identity::{decode_player_ref, is_uploader};
use crate::raw::{RawGrade, RawJobStats, RawPlayer};
use crate::wave::special_usage;

pub fn normalize_players(
    raw: &[RawPlayer],
    waves: &[Wave],
    enemies: &CanonicalEnemies,
    job: &RawJobStats,
    grade: Option<&RawGrade>,
) -> Result<Vec<Player>, NormalizeError> {
    if !(1..=4).contains(&raw.len()) {
        return Err(NormalizeError::InvalidPlayerCount(raw.len()));
    }

    let flags: Vec<Option<bool>> = raw.iter().map(|p| is_uploader(&p.id).ok()).collect();
    let flagged = flags.iter().filter(|f| **f == Some(true)).count();
    let undetermined = flags.iter().filter(|f| f.is_none()).count();
    if flagged != 1 || undetermined > 0 {
        return Err(NormalizeError::AmbiguousUploader {
            flagged,
            undetermined,
        });
    }

    let uploader_stats = UploaderStats {
        job_bonus: job.job_bonus,
        job_score: job.job_score,
        job_rate: job.job_rate,
        kuma_point: job.kuma_point,
        grade_id: grade.map(|g| g.id),
        grade_point: grade.and_then(|g| g.point),
        smell_meter: job.smell_meter,
        scale: job.scale,
    };

    raw.iter()
        .zip(flags)
        .map(|(p, flag)| {
            let is_myself = flag == Some(true);
            Ok(Player {
                pid: decode_player_ref(&p.id)?,
                is_myself,
                name: p.name.clone(),
                byname: p.byname.clone(),
                name_id: p.name_id.clone(),
                badges: p.badges,
                nameplate: p.nameplate,
                text_color: p.text_color,
                uniform: p.uniform,
                species: p.species,
                weapon_list: p.weapon_list.clone(),
                special_id: p.special_id,
                special_counts: special_counts(p, waves)?,
                rescue_count: p.rescue_count,
                rescued_count: p.rescued_count,
                ikura_num: p.deliver_count,
                golden_ikura_num: p.golden_deliver_count,
                golden_ikura_assist_num: p.golden_assist_count,
                defeat_enemy_count: p.defeat_enemy_count,
                boss_kill_counts: if is_myself {
                    enemies.uploader_kill_counts.map(Some)
                } else {
                    UNKNOWN_KILL_TALLY
                },
                stats: if is_myself {
                    uploader_stats.clone()
                } else {
                    UploaderStats::default()
                },
            })
        })
        .collect()
}

/// Reported counts win; otherwise each wave's log is counted for the player's special.
fn special_counts(player: &RawPlayer, waves: &[Wave]) -> Result<Vec<u32>, NormalizeError> {
    match &player.reported_special_counts {
        Some(reported) if reported.len() != waves.len() => Err(NormalizeError::MalformedTally {
            field: "special_counts",
            expected: waves.len(),
            len: reported.len(),
        }),
        Some(reported) => Ok(reported.clone()),
        None => Ok(waves
            .iter()
            .map(|wave| special_usage(wave, player.special_id))
            .collect()),
    }
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use srs_core::{Species, TextColor, ENEMY_SLOTS};

    use super::*;

    const OWNER: &str = "abcdefghij0123456789";
    const STAMP: &str = "20240105T123456_1b2c3d4e-5f60-4a7b-8c9d-0e1f2a3b4c5d";

    fn envelope(actor: &str) -> String {
        STANDARD.encode(format!("CoopPlayer-u-{OWNER}:{STAMP}:u-{actor}"))
    }

    fn raw_player(id: String, special_id: i32) -> RawPlayer {
        RawPlayer {
            id,
            name: "Ika".to_string(),
            byname: "Profreshional".to_string(),
            name_id: "1234".to_string(),
            badges: [Some(5000), None, None],
            nameplate: 1,
            text_color: TextColor {
                r: 1.0,
                g: 1.0,
                b: 1.0,
                a: 1.0,
            },
            uniform: 3,
            species: Species::Inkling,
            weapon_list: vec![0, 10, 20],
            special_id,
            reported_special_counts: None,
            rescue_count: 1,
            rescued_count: 2,
            deliver_count: 900,
            golden_deliver_count: 30,
            golden_assist_count: 5,
            defeat_enemy_count: 12,
        }
    }

    fn wave(wave_number: u8, special_usage: Vec<i32>) -> Wave {
        Wave {
            wave_number,
            water_level: 1,
            event_type: 0,
            golden_ikura_num: Some(30),
            golden_ikura_pop_num: 50,
            quota_num: Some(25),
            is_clear: true,
            special_usage,
        }
    }

    fn enemies() -> CanonicalEnemies {
        let mut out = CanonicalEnemies::default();
        out.uploader_kill_counts[0] = 4;
        out.uploader_kill_counts[11] = 2;
        out
    }

    fn job() -> RawJobStats {
        RawJobStats {
            kuma_point: Some(620),
            job_score: Some(210),
            job_rate: Some(3.25),
            job_bonus: Some(100),
            smell_meter: Some(4),
            ..Default::default()
        }
    }

    #[test]
    fn teammates_are_redacted_and_uploader_keeps_own_stats() {
        let raw = vec![
            raw_player(envelope(OWNER), 20006),
            raw_player(envelope("k1m2n3p4q5r6s7t8u9v0"), 20010),
        ];
        let waves = vec![
            wave(1, vec![20006, 20010]),
            wave(2, vec![20006, 20006]),
            wave(3, vec![]),
        ];
        let grade = RawGrade {
            id: 8,
            point: Some(400),
        };
        let players = normalize_players(&raw, &waves, &enemies(), &job(), Some(&grade)).unwrap();

        let me = &players[0];
        assert!(me.is_myself);
        assert_eq!(me.pid, OWNER);
        assert_eq!(me.stats.grade_id, Some(8));
        assert_eq!(me.stats.grade_point, Some(400));
        assert_eq!(me.stats.kuma_point, Some(620));
        assert_eq!(me.boss_kill_counts[0], Some(4));
        assert_eq!(me.boss_kill_counts[1], Some(0));
        assert_eq!(me.special_counts, vec![1, 2, 0]);
        assert!(!me.is_kill_tally_redacted());

        let mate = &players[1];
        assert!(!mate.is_myself);
        assert_eq!(mate.boss_kill_counts, [None; ENEMY_SLOTS]);
        assert_eq!(mate.stats, UploaderStats::default());
        assert_eq!(mate.special_counts, vec![1, 0, 0]);
    }

    #[test]
    fn reported_special_counts_take_precedence_over_the_log() {
        let mut raw = raw_player(envelope(OWNER), 20006);
        raw.reported_special_counts = Some(vec![1, 1]);
        let waves = vec![
            wave(1, vec![20006, 20006]),
            wave(2, vec![20006]),
            wave(3, vec![20006]),
        ];
        let players = normalize_players(&[raw], &waves, &enemies(), &job(), None).unwrap();
        assert_eq!(players[0].special_counts, vec![1, 1, 0]);
    }

    #[test]
    fn exactly_one_uploader_is_required() {
        let waves = vec![wave(1, vec![]), wave(2, vec![]), wave(3, vec![])];
        let none = vec![raw_player(envelope("k1m2n3p4q5r6s7t8u9v0"), 1)];
        assert_eq!(
            normalize_players(&none, &waves, &enemies(), &job(), None),
            Err(NormalizeError::AmbiguousUploader {
                flagged: 0,
                undetermined: 0
            })
        );

        let twice = vec![raw_player(envelope(OWNER), 1), raw_player(envelope(OWNER), 2)];
        assert!(matches!(
            normalize_players(&twice, &waves, &enemies(), &job(), None),
            Err(NormalizeError::AmbiguousUploader { flagged: 2, .. })
        ));

        let once = STANDARD.encode(format!("CoopPlayer-{STAMP}:u-{OWNER}"));
        let undetermined = vec![raw_player(envelope(OWNER), 1), raw_player(once, 2)];
        assert_eq!(
            normalize_players(&undetermined, &waves, &enemies(), &job(), None),
            Err(NormalizeError::AmbiguousUploader {
                flagged: 1,
                undetermined: 1
            })
        );
    }

    #[test]
    fn player_count_is_bounded() {
        let waves = vec![wave(1, vec![]), wave(2, vec![]), wave(3, vec![])];
        assert_eq!(
            normalize_players(&[], &waves, &enemies(), &job(), None),
            Err(NormalizeError::InvalidPlayerCount(0))
        );
        let five: Vec<_> = (0..5).map(|_| raw_player(envelope(OWNER), 1)).collect();
        assert_eq!(
            normalize_players(&five, &waves, &enemies(), &job(), None),
            Err(NormalizeError::InvalidPlayerCount(5))
        );
    }

    #[test]
    fn reported_special_counts_must_cover_every_wave() {
        let mut uploader = raw_player(envelope(OWNER), 20006);
        uploader.reported_special_counts = Some(vec![2, 1]);
        let waves = vec![wave(1, vec![]), wave(2, vec![]), wave(3, vec![])];
        let err = normalize_players(&[uploader], &waves, &enemies(), &job(), None).unwrap_err();
        assert_eq!(
            err,
            NormalizeError::MalformedTally {
                field: "special_counts",
                expected: 3,
                len: 2
            }
        );
    }
}
