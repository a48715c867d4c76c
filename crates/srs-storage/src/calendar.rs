//! Shift rotation calendar published by an external schedule service.

use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use srs_core::{Mode, Rule};
use uuid::Uuid;

use crate::http::{FetchError, HttpClientConfig, HttpFetcher};

/// One published shift. Times are a half-open `[start_time, end_time)` window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub stage_id: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub weapon_list: Vec<i32>,
    pub rare_weapon: Option<i32>,
    pub mode: Mode,
    pub rule: Rule,
}

impl Shift {
    pub fn covers(&self, played_time: DateTime<Utc>, stage_id: i32, rule: Rule) -> bool {
        self.start_time <= played_time
            && played_time < self.end_time
            && self.stage_id == stage_id
            && self.rule == rule
    }
}

pub fn find_shift(
    shifts: &[Shift],
    played_time: DateTime<Utc>,
    stage_id: i32,
    rule: Rule,
) -> Option<&Shift> {
    shifts.iter().find(|s| s.covers(played_time, stage_id, rule))
}

#[async_trait]
pub trait ScheduleCalendar: Send + Sync {
    async fn shifts(&self) -> Result<Vec<Shift>, FetchError>;
}

pub struct HttpScheduleCalendar {
    fetcher: HttpFetcher,
    url: String,
}

impl HttpScheduleCalendar {
    pub fn new(url: impl Into<String>, config: HttpClientConfig) -> anyhow::Result<Self> {
        Ok(Self {
            fetcher: HttpFetcher::new(config)?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ScheduleCalendar for HttpScheduleCalendar {
    async fn shifts(&self) -> Result<Vec<Shift>, FetchError> {
        let shifts: Vec<Shift> = self.fetcher.fetch_json(Uuid::new_v4(), &self.url).await?;
        tracing::debug!(count = shifts.len(), url = %self.url, "fetched shift calendar");
        Ok(shifts)
    }
}

/// Fixed calendar, loaded up front.
#[derive(Debug, Clone, Default)]
pub struct StaticScheduleCalendar {
    shifts: Vec<Shift>,
}

impl StaticScheduleCalendar {
    pub fn new(shifts: Vec<Shift>) -> Self {
        Self { shifts }
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading shift calendar {}", path.display()))?;
        let shifts = serde_json::from_str(&raw)
            .with_context(|| format!("parsing shift calendar {}", path.display()))?;
        Ok(Self { shifts })
    }
}

#[async_trait]
impl ScheduleCalendar for StaticScheduleCalendar {
    async fn shifts(&self) -> Result<Vec<Shift>, FetchError> {
        Ok(self.shifts.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .expect("ts")
            .with_timezone(&Utc)
    }

    fn shift(stage_id: i32, start: &str, end: &str) -> Shift {
        Shift {
            stage_id,
            start_time: ts(start),
            end_time: ts(end),
            weapon_list: vec![0, 1010, 2030, 4020],
            rare_weapon: None,
            mode: Mode::Regular,
            rule: Rule::Regular,
        }
    }

    #[test]
    fn shift_window_is_half_open_and_keyed_by_stage_and_rule() {
        let shifts = vec![
            shift(7, "2024-01-05T08:00:00Z", "2024-01-06T00:00:00Z"),
            shift(1, "2024-01-06T00:00:00Z", "2024-01-06T16:00:00Z"),
        ];

        let found = find_shift(&shifts, ts("2024-01-05T12:34:56Z"), 7, Rule::Regular);
        assert_eq!(found.map(|s| s.stage_id), Some(7));

        assert!(find_shift(&shifts, ts("2024-01-06T00:00:00Z"), 7, Rule::Regular).is_none());
        assert!(find_shift(&shifts, ts("2024-01-06T00:00:00Z"), 1, Rule::Regular).is_some());
        assert!(find_shift(&shifts, ts("2024-01-05T12:34:56Z"), 7, Rule::BigRun).is_none());
        assert!(find_shift(&shifts, ts("2024-01-05T12:34:56Z"), 1, Rule::Regular).is_none());
    }

    #[test]
    fn calendar_json_uses_snake_case_keys() {
        let raw = r#"[{
            "stage_id": 7,
            "start_time": "2024-01-05T08:00:00Z",
            "end_time": "2024-01-06T00:00:00Z",
            "weapon_list": [0, 1010, 2030, 4020],
            "rare_weapon": null,
            "mode": "REGULAR",
            "rule": "REGULAR"
        }]"#;
        let shifts: Vec<Shift> = serde_json::from_str(raw).unwrap();
        assert_eq!(shifts, vec![shift(7, "2024-01-05T08:00:00Z", "2024-01-06T00:00:00Z")]);
    }

    #[tokio::test]
    async fn static_calendar_serves_its_shifts() {
        let calendar = StaticScheduleCalendar::new(vec![shift(
            7,
            "2024-01-05T08:00:00Z",
            "2024-01-06T00:00:00Z",
        )]);
        assert_eq!(calendar.shifts().await.unwrap().len(), 1);
    }
}
