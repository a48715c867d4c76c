use std::path::{Path, PathBuf};
use std::sync::Arc;

use srs_adapters::UploadFormat;
use srs_ingest::IngestPipeline;
use srs_stats::{StatsError, StatsService};
use srs_storage::{
    MemoryStore, ResultRepo, ScenarioCodeFilter, ScheduleRepo, StaticScheduleCalendar,
};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

async fn seeded_store() -> Arc<MemoryStore> {
    let root = workspace_root();
    let store = Arc::new(MemoryStore::new());
    let calendar = StaticScheduleCalendar::from_json_file(&root.join("fixtures/calendar/shifts.json"))
        .expect("calendar fixture");
    let pipeline = IngestPipeline::new(store.clone(), Arc::new(calendar));

    for (dir, format) in [
        ("client-export", UploadFormat::ClientExport),
        ("companion-app", UploadFormat::CompanionApp),
    ] {
        let raw = std::fs::read(root.join(format!("fixtures/{dir}/sample/batch.json")))
            .expect("fixture batch");
        pipeline
            .normalize_and_upsert(&raw, format)
            .await
            .expect("fixture ingests");
    }
    store
}

async fn schedule_on_stage(store: &MemoryStore, stage_id: i32) -> i64 {
    store
        .list_schedules(50)
        .await
        .unwrap()
        .into_iter()
        .find(|s| s.key.stage_id == stage_id)
        .map(|s| s.id)
        .expect("schedule for stage")
}

#[tokio::test]
async fn cleared_boss_match_fills_every_funnel_step() {
    let store = seeded_store().await;
    let schedule_id = schedule_on_stage(&store, 7).await;
    let stats = StatsService::new(store.clone())
        .get_statistics(schedule_id)
        .await
        .unwrap();

    let shape: Vec<(u64, u64, u64)> = stats
        .wave_funnel
        .iter()
        .map(|s| (s.reached, s.cleared, s.failed))
        .collect();
    assert_eq!(shape, vec![(1, 1, 0), (1, 1, 0), (1, 1, 0), (1, 1, 0)]);
    assert_eq!(stats.job.shifts, 1);
    assert_eq!(stats.job.clear_ratio, 1.0);
    assert_eq!(stats.job.boss_defeat_ratio, 1.0);
    assert_eq!(stats.job.golden_ikura_num, 97);

    let stored = store
        .get_result("20240105T123456_1b2c3d4e-5f60-4a7b-8c9d-0e1f2a3b4c5d")
        .await
        .unwrap()
        .unwrap();
    for (slot, tally) in stats.enemies.iter().enumerate() {
        assert_eq!(tally.appearances, u64::from(stored.result.boss_counts[slot]));
        assert_eq!(tally.team_kills, u64::from(stored.result.boss_kill_counts[slot]));
    }

    assert_eq!(stats.leaderboard.len(), 1);
    let top = &stats.leaderboard[0];
    assert_eq!((top.rank, top.pid.as_str()), (1, "abcdefghij0123456789"));
    assert_eq!((top.grade_id, top.grade_point), (8, 400));
}

#[tokio::test]
async fn wave_two_failure_stops_the_funnel() {
    let store = seeded_store().await;
    let schedule_id = schedule_on_stage(&store, 2).await;
    let stats = StatsService::new(store).get_statistics(schedule_id).await.unwrap();

    let shape: Vec<(u64, u64, u64)> = stats
        .wave_funnel
        .iter()
        .map(|s| (s.reached, s.cleared, s.failed))
        .collect();
    assert_eq!(shape, vec![(1, 1, 0), (1, 0, 1), (0, 0, 0), (0, 0, 0)]);
    assert_eq!(stats.job.clear_ratio, 0.0);
    assert_eq!(stats.job.boss_appearances, 0);
    assert_eq!(stats.leaderboard[0].grade_id, 7);
}

#[tokio::test]
async fn unknown_schedules_are_reported() {
    let store = seeded_store().await;
    let err = StatsService::new(store).get_statistics(999).await.unwrap_err();
    assert!(matches!(err, StatsError::UnknownSchedule(999)));
}

#[tokio::test]
async fn scenario_codes_filter_on_boss_wave_presence() {
    let store = seeded_store().await;
    let service = StatsService::new(store);

    let with_boss = service
        .scenario_codes(&ScenarioCodeFilter {
            has_extra_wave: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(with_boss.len(), 1);
    assert_eq!(with_boss[0].scenario_code, "SABC-DEFG-HIJK-LMNO");
    assert_eq!(with_boss[0].waves.len(), 4);

    let without_boss = service
        .scenario_codes(&ScenarioCodeFilter {
            has_extra_wave: Some(false),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(without_boss.is_empty());
}
