//! Turns a normalized match into the create-or-patch plan the store executes.

use srs_adapters::{NormalizeError, UploadFormat};
use srs_core::{CoopResult, ScheduleKey};
use srs_storage::{find_shift, ResultGraph, Shift, UploaderPatch, UpsertPlan};

use crate::error::IngestError;

/// Whether resolving this match's schedule needs the shift calendar.
pub fn needs_calendar(result: &CoopResult, format: UploadFormat) -> bool {
    format == UploadFormat::ClientExport && !result.mode().is_private()
}

pub fn resolve_schedule(
    result: &CoopResult,
    format: UploadFormat,
    shifts: &[Shift],
) -> Result<ScheduleKey, IngestError> {
    let draft = &result.schedule;
    if !needs_calendar(result, format) {
        return Ok(draft.with_sentinel_defaults());
    }

    find_shift(shifts, result.played_time, draft.stage_id, draft.rule)
        .map(|shift| draft.with_bounds(shift.start_time, shift.end_time))
        .ok_or(IngestError::ScheduleNotFound {
            stage_id: draft.stage_id,
            rule: draft.rule,
            played_time: result.played_time,
        })
}

pub fn plan_upsert(
    result: CoopResult,
    format: UploadFormat,
    shifts: &[Shift],
) -> Result<UpsertPlan, IngestError> {
    let schedule = resolve_schedule(&result, format, shifts)?;
    let on_conflict = result
        .uploader()
        .map(UploaderPatch::from_uploader)
        .ok_or(NormalizeError::AmbiguousUploader {
            flagged: 0,
            undetermined: 0,
        })?;

    Ok(UpsertPlan {
        create: ResultGraph { schedule, result },
        on_conflict,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use srs_core::{Mode, Rule};

    use super::*;

    fn ts(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    fn shift() -> Shift {
        Shift {
            stage_id: 7,
            start_time: ts("2024-01-05T08:00:00Z"),
            end_time: ts("2024-01-06T00:00:00Z"),
            weapon_list: vec![0, 1010, 2030, 4020],
            rare_weapon: Some(20900),
            mode: Mode::Regular,
            rule: Rule::Regular,
        }
    }

    fn result(mode: Mode, start_time: Option<DateTime<Utc>>) -> CoopResult {
        let raw = std::fs::read_to_string(
            std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
                .join("../..")
                .join("fixtures/client-export/sample/batch.json"),
        )
        .unwrap();
        let batch: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let mut result = srs_adapters::normalize_value(
            UploadFormat::ClientExport,
            batch["results"][0].clone(),
        )
        .unwrap()
        .unwrap();
        result.schedule.mode = mode;
        result.schedule.start_time = start_time;
        result
    }

    #[test]
    fn client_exports_take_bounds_from_the_covering_shift() {
        let key = resolve_schedule(&result(Mode::Regular, None), UploadFormat::ClientExport, &[shift()])
            .unwrap();
        assert_eq!(key.start_time, ts("2024-01-05T08:00:00Z"));
        assert_eq!(key.end_time, ts("2024-01-06T00:00:00Z"));
    }

    #[test]
    fn client_exports_without_a_shift_are_rejected() {
        let err = resolve_schedule(&result(Mode::Regular, None), UploadFormat::ClientExport, &[])
            .unwrap_err();
        assert!(matches!(err, IngestError::ScheduleNotFound { stage_id: 7, .. }));
    }

    #[test]
    fn private_modes_and_companion_uploads_use_sentinel_defaults() {
        let private = result(Mode::PrivateCustom, None);
        assert!(!needs_calendar(&private, UploadFormat::ClientExport));
        let key = resolve_schedule(&private, UploadFormat::ClientExport, &[]).unwrap();
        assert_eq!(key.start_time, ScheduleKey::sentinel_time());

        let start = ts("2024-01-07T12:00:00Z");
        let companion = result(Mode::Regular, Some(start));
        let key = resolve_schedule(&companion, UploadFormat::CompanionApp, &[]).unwrap();
        assert_eq!(key.start_time, start);
        assert_eq!(key.end_time, ScheduleKey::sentinel_time());
    }

    #[test]
    fn the_conflict_patch_targets_the_uploader() {
        let plan = plan_upsert(result(Mode::Regular, None), UploadFormat::ClientExport, &[shift()])
            .unwrap();
        let uploader = plan.create.result.uploader().unwrap();
        assert_eq!(plan.on_conflict.pid, uploader.pid);
        assert_eq!(plan.on_conflict.grade_id, Some(8));
    }
}
